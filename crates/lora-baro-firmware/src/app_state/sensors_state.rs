//! Barometer construction and reporting

use log::info;
use lora_baro_core::sampling::Sample;
use lora_baro_core::sensors::Bmp280;
use lora_baro_core::sensors::bmp280::I2C_ADDRESS_1;

use super::I2cBus;

pub type BarometerSensor = Bmp280<I2cBus, embassy_time::Delay>;

/// The breakout straps SDO high.
pub fn create_barometer(i2c: I2cBus) -> BarometerSensor {
    Bmp280::new(i2c, embassy_time::Delay, I2C_ADDRESS_1)
}

pub fn log_sample(sample: &Sample) {
    let m = &sample.measurement;
    match m.humidity_percent {
        Some(humidity) => info!(
            "Pressure: {:.2} Pa, Temperature: {:.2} C, Humidity: {:.2}",
            m.pressure_pa, m.temperature_celsius, humidity
        ),
        None => info!(
            "Pressure: {:.2} Pa, Temperature: {:.2} C",
            m.pressure_pa, m.temperature_celsius
        ),
    }
}
