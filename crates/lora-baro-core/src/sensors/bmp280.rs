//! Async driver for the Bosch BMP280 barometer and its BME280 sibling
//!
//! Both parts share the register map for temperature and pressure; the BME280
//! adds a humidity channel. The variant is detected from the chip id at init
//! time and humidity is only reported when it is present.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, warn};

use super::{Sensor, SensorError};
use crate::telemetry::Measurement;

const SENSOR: &str = "BMP280";

/// Address with SDO pulled low.
pub const I2C_ADDRESS_0: u8 = 0x76;
/// Address with SDO pulled high.
pub const I2C_ADDRESS_1: u8 = 0x77;

pub const BMP280_CHIP_ID: u8 = 0x58;
pub const BME280_CHIP_ID: u8 = 0x60;

mod reg {
    pub const CALIB_TP: u8 = 0x88;
    pub const CALIB_H1: u8 = 0xA1;
    pub const ID: u8 = 0xD0;
    pub const RESET: u8 = 0xE0;
    pub const CALIB_H2: u8 = 0xE1;
    pub const CTRL_HUM: u8 = 0xF2;
    pub const STATUS: u8 = 0xF3;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const DATA: u8 = 0xF7;
}

const RESET_COMMAND: u8 = 0xB6;
const STATUS_IM_UPDATE: u8 = 0x01;
const STATUS_MEASURING: u8 = 0x08;

const NVM_COPY_POLLS: u32 = 50;
const NVM_COPY_POLL_MS: u32 = 2;
const MEASUREMENT_POLLS: u32 = 50;
const MEASUREMENT_POLL_MS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipVariant {
    Bmp280,
    Bme280,
}

impl ChipVariant {
    pub const fn from_chip_id(chip_id: u8) -> Option<Self> {
        match chip_id {
            BMP280_CHIP_ID => Some(Self::Bmp280),
            BME280_CHIP_ID => Some(Self::Bme280),
            _ => None,
        }
    }

    pub const fn has_humidity(self) -> bool {
        matches!(self, Self::Bme280)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bmp280 => "BMP280",
            Self::Bme280 => "BME280",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No conversions, lowest power.
    Sleep = 0,
    /// One conversion per read, then back to sleep.
    Forced = 1,
    /// Continuous conversions separated by the standby time.
    Normal = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversampling {
    Skipped = 0,
    UltraLowPower = 1,
    LowPower = 2,
    Standard = 3,
    HighRes = 4,
    UltraHighRes = 5,
}

/// Inactive time between two conversions in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standby {
    Ms0_5 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    Ms1000 = 5,
    Ms2000 = 6,
    Ms4000 = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub mode: Mode,
    pub filter: Filter,
    pub oversampling_pressure: Oversampling,
    pub oversampling_temperature: Oversampling,
    /// Ignored on the BMP280.
    pub oversampling_humidity: Oversampling,
    pub standby: Standby,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            filter: Filter::Off,
            oversampling_pressure: Oversampling::Standard,
            oversampling_temperature: Oversampling::Standard,
            oversampling_humidity: Oversampling::Standard,
            standby: Standby::Ms250,
        }
    }
}

impl Params {
    const fn config_register(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2)
    }

    const fn ctrl_meas_register(&self, mode: Mode) -> u8 {
        ((self.oversampling_temperature as u8) << 5)
            | ((self.oversampling_pressure as u8) << 2)
            | mode as u8
    }

    const fn ctrl_hum_register(&self) -> u8 {
        self.oversampling_humidity as u8
    }
}

/// Factory trimming parameters burnt into the sensor's NVM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Decode the temperature and pressure block starting at `0x88`.
    pub fn from_registers(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);

        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            ..Self::default()
        }
    }

    /// Add the BME280 humidity parameters: `h1` from `0xA1` and the packed
    /// block starting at `0xE1`.
    pub fn with_humidity(mut self, h1: u8, raw: &[u8; 7]) -> Self {
        self.h1 = h1;
        self.h2 = i16::from_le_bytes([raw[0], raw[1]]);
        self.h3 = raw[2];
        // H4 and H5 are 12-bit values sharing the nibbles of 0xE5.
        self.h4 = ((raw[3] as i8 as i16) << 4) | (raw[4] & 0x0F) as i16;
        self.h5 = ((raw[5] as i8 as i16) << 4) | (raw[4] >> 4) as i16;
        self.h6 = raw[6] as i8;
        self
    }

    /// Returns the temperature in 0.01 °C and the `t_fine` carry used by the
    /// pressure and humidity compensation.
    pub fn compensate_temperature(&self, adc_t: i32) -> (i32, i32) {
        let adc_t = adc_t as i64;
        let t1 = self.t1 as i64;
        let var1 = (((adc_t >> 3) - (t1 << 1)) * self.t2 as i64) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * self.t3 as i64) >> 14;
        // |t_fine| stays below 2^23 for any 20-bit reading and calibration.
        let t_fine = var1 + var2;

        (((t_fine * 5 + 128) >> 8) as i32, t_fine as i32)
    }

    /// Returns the pressure in Pa as Q24.8 fixed point.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> u32 {
        let mut var1 = t_fine as i64 - 128_000;
        let mut var2 = var1 * var1 * self.p6 as i64;
        var2 += (var1 * self.p5 as i64) << 17;
        var2 += (self.p4 as i64) << 35;
        var1 = ((var1 * var1 * self.p3 as i64) >> 8) + ((var1 * self.p2 as i64) << 12);
        var1 = (((1_i64 << 47) + var1) * self.p1 as i64) >> 33;

        if var1 == 0 {
            // Avoid a division by zero on a blank NVM.
            return 0;
        }

        let mut p = 1_048_576 - adc_p as i64;
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (self.p9 as i64 * (p >> 13) * (p >> 13)) >> 25;
        var2 = (self.p8 as i64 * p) >> 19;
        p = ((p + var1 + var2) >> 8) + ((self.p7 as i64) << 4);

        p as u32
    }

    /// Returns the relative humidity in % as Q22.10 fixed point.
    pub fn compensate_humidity(&self, adc_h: i32, t_fine: i32) -> u32 {
        let adc_h = adc_h as i64;
        let mut v = t_fine as i64 - 76_800;

        v = (((adc_h << 14) - ((self.h4 as i64) << 20) - (self.h5 as i64 * v) + 16_384) >> 15)
            * (((((((v * self.h6 as i64) >> 10) * (((v * self.h3 as i64) >> 11) + 32_768)) >> 10)
                + 2_097_152)
                * self.h2 as i64
                + 8192)
                >> 14);
        v -= ((((v >> 15) * (v >> 15)) >> 7) * self.h1 as i64) >> 4;
        v = v.clamp(0, 419_430_400);

        (v >> 12) as u32
    }
}

/// Compensated readings in the sensor's native fixed-point units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReading {
    /// 0.01 °C
    pub temperature_centi_celsius: i32,
    /// Pa, Q24.8
    pub pressure_q24_8: u32,
    /// %RH, Q22.10
    pub humidity_q22_10: Option<u32>,
}

impl FixedReading {
    pub fn to_measurement(self) -> Measurement {
        Measurement {
            temperature_celsius: self.temperature_centi_celsius as f32 / 100.0,
            pressure_pa: self.pressure_q24_8 as f32 / 256.0,
            humidity_percent: self.humidity_q22_10.map(|h| h as f32 / 1024.0),
        }
    }
}

pub struct Bmp280<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    params: Params,
    device: Option<(ChipVariant, Calibration)>,
}

impl<I: I2c, D: DelayNs> Bmp280<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            params: Params::default(),
            device: None,
        }
    }

    /// The detected chip, once initialized.
    pub fn variant(&self) -> Option<ChipVariant> {
        self.device.map(|(variant, _)| variant)
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.device.as_ref().map(|(_, calibration)| calibration)
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    async fn read_registers(
        &mut self,
        register: u8,
        buf: &mut [u8],
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .await
            .map_err(|e| {
                debug!("{} register 0x{:02x} read failed: {:?}", SENSOR, register, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                    details: "I2C communication error or sensor not responding",
                }
            })
    }

    async fn write_register(
        &mut self,
        register: u8,
        value: u8,
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(|e| {
                debug!("{} register 0x{:02x} write failed: {:?}", SENSOR, register, e);
                SensorError::WriteFailed {
                    sensor: SENSOR,
                    operation,
                    details: "I2C communication error or sensor not responding",
                }
            })
    }

    /// Detect the chip, reset it, load its calibration and apply `params`.
    pub async fn init(&mut self, params: Params) -> Result<ChipVariant, SensorError> {
        self.device = None;

        let mut id = [0u8; 1];
        self.read_registers(reg::ID, &mut id, "read chip id").await?;
        let variant = ChipVariant::from_chip_id(id[0]).ok_or(SensorError::UnsupportedChip {
            sensor: SENSOR,
            chip_id: id[0],
        })?;

        self.write_register(reg::RESET, RESET_COMMAND, "soft reset")
            .await?;
        self.wait_for_status_clear(STATUS_IM_UPDATE, NVM_COPY_POLLS, NVM_COPY_POLL_MS)
            .await
            .map_err(|e| match e {
                SensorError::Timeout { .. } => SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "NVM calibration copy did not complete",
                },
                other => other,
            })?;

        let mut raw = [0u8; 24];
        self.read_registers(reg::CALIB_TP, &mut raw, "read calibration")
            .await?;
        let mut calibration = Calibration::from_registers(&raw);

        if variant.has_humidity() {
            let mut h1 = [0u8; 1];
            self.read_registers(reg::CALIB_H1, &mut h1, "read humidity calibration")
                .await?;
            let mut raw_h = [0u8; 7];
            self.read_registers(reg::CALIB_H2, &mut raw_h, "read humidity calibration")
                .await?;
            calibration = calibration.with_humidity(h1[0], &raw_h);
        }

        self.write_register(reg::CONFIG, params.config_register(), "write config")
            .await?;

        if variant.has_humidity() {
            // ctrl_hum only latches on the next ctrl_meas write.
            self.write_register(reg::CTRL_HUM, params.ctrl_hum_register(), "write ctrl_hum")
                .await?;
        }

        // Forced mode parks the sensor until a read triggers a conversion.
        let mode = match params.mode {
            Mode::Forced => Mode::Sleep,
            mode => mode,
        };
        self.write_register(reg::CTRL_MEAS, params.ctrl_meas_register(mode), "write ctrl_meas")
            .await?;

        self.params = params;
        self.device = Some((variant, calibration));

        Ok(variant)
    }

    /// Keep trying [`Self::init`] until the sensor answers.
    pub async fn init_with_retry(&mut self, params: Params, retry_delay_ms: u32) -> ChipVariant {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.init(params).await {
                Ok(variant) => {
                    debug!("{}: found {} after {} attempt(s)", SENSOR, variant.name(), attempt);
                    return variant;
                }
                Err(e) => {
                    warn!("Could not init {}, err: {}", SENSOR, e);
                    self.delay.delay_ms(retry_delay_ms).await;
                }
            }
        }
    }

    async fn wait_for_status_clear(
        &mut self,
        mask: u8,
        polls: u32,
        poll_ms: u32,
    ) -> Result<(), SensorError> {
        for _ in 0..polls {
            let mut status = [0u8; 1];
            self.read_registers(reg::STATUS, &mut status, "read status")
                .await?;
            if status[0] & mask == 0 {
                return Ok(());
            }
            self.delay.delay_ms(poll_ms).await;
        }

        Err(SensorError::Timeout {
            sensor: SENSOR,
            operation: "wait for status bit to clear",
        })
    }

    /// Read and compensate one sample.
    pub async fn read_fixed(&mut self) -> Result<FixedReading, SensorError> {
        let (variant, calibration) = self
            .device
            .ok_or(SensorError::NotInitialized { sensor: SENSOR })?;

        if self.params.mode == Mode::Forced {
            let ctrl_meas = self.params.ctrl_meas_register(Mode::Forced);
            self.write_register(reg::CTRL_MEAS, ctrl_meas, "start forced measurement")
                .await?;
            self.delay.delay_ms(MEASUREMENT_POLL_MS).await;
            self.wait_for_status_clear(STATUS_MEASURING, MEASUREMENT_POLLS, MEASUREMENT_POLL_MS)
                .await
                .inspect_err(|_| error!("{}: forced measurement did not complete", SENSOR))?;
        }

        let mut data = [0u8; 8];
        let len = if variant.has_humidity() { 8 } else { 6 };
        self.read_registers(reg::DATA, &mut data[..len], "read measurement")
            .await?;

        let adc_p = ((data[0] as i32) << 12) | ((data[1] as i32) << 4) | ((data[2] as i32) >> 4);
        let adc_t = ((data[3] as i32) << 12) | ((data[4] as i32) << 4) | ((data[5] as i32) >> 4);

        let (temperature_centi_celsius, t_fine) = calibration.compensate_temperature(adc_t);
        let pressure_q24_8 = calibration.compensate_pressure(adc_p, t_fine);
        let humidity_q22_10 = variant.has_humidity().then(|| {
            let adc_h = ((data[6] as i32) << 8) | data[7] as i32;
            calibration.compensate_humidity(adc_h, t_fine)
        });

        Ok(FixedReading {
            temperature_centi_celsius,
            pressure_q24_8,
            humidity_q22_10,
        })
    }

    /// Read one sample converted to floating point units.
    pub async fn read_float(&mut self) -> Result<Measurement, SensorError> {
        self.read_fixed().await.map(FixedReading::to_measurement)
    }
}

impl<I: I2c, D: DelayNs> Sensor for Bmp280<I, D> {
    type Readings = Measurement;

    async fn read(&mut self) -> Result<Measurement, SensorError> {
        self.read_float().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, Operation};

    /// Register-file model of the sensor: a write sets the register pointer
    /// and stores any following bytes, a read streams from the pointer.
    pub(crate) struct FakeBus {
        pub registers: [u8; 256],
        pub fail_transactions: usize,
        /// Reject every register write, reads still succeed.
        pub fail_writes: bool,
        pub transactions: usize,
        pointer: u8,
    }

    impl FakeBus {
        pub(crate) fn new(chip_id: u8) -> Self {
            let mut registers = [0u8; 256];
            registers[reg::ID as usize] = chip_id;
            registers[0x88..0x88 + 24].copy_from_slice(&datasheet_calibration());
            Self {
                registers,
                fail_transactions: 0,
                fail_writes: false,
                transactions: 0,
                pointer: 0,
            }
        }

        /// BMP280 with the datasheet calibration and the datasheet sample
        /// (adc_T = 519888, adc_P = 415148) in the data registers.
        pub(crate) fn bmp280() -> Self {
            let mut bus = Self::new(BMP280_CHIP_ID);
            bus.registers[0xF7..0xFD].copy_from_slice(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00]);
            bus
        }

        pub(crate) fn bme280() -> Self {
            let mut bus = Self::bmp280();
            bus.registers[reg::ID as usize] = BME280_CHIP_ID;
            bus.registers[0xA1] = 75;
            bus.registers[0xE1..0xE8].copy_from_slice(&humidity_calibration());
            // adc_H = 30000
            bus.registers[0xFD] = 0x75;
            bus.registers[0xFE] = 0x30;
            bus
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            self.transactions += 1;
            if self.fail_transactions > 0 {
                self.fail_transactions -= 1;
                return Err(ErrorKind::Other);
            }

            let writes_data = operations
                .iter()
                .any(|op| matches!(op, Operation::Write(bytes) if bytes.len() > 1));
            if self.fail_writes && writes_data {
                return Err(ErrorKind::Other);
            }

            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if let Some((&register, values)) = bytes.split_first() {
                            self.pointer = register;
                            for value in values {
                                self.registers[self.pointer as usize] = *value;
                                self.pointer = self.pointer.wrapping_add(1);
                            }
                        }
                    }
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.registers[self.pointer as usize];
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    pub(crate) struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    fn datasheet_calibration() -> [u8; 24] {
        let words: [u16; 12] = [
            27504,
            26435,
            -1000_i16 as u16,
            36477,
            -10685_i16 as u16,
            3024,
            2855,
            140,
            -7_i16 as u16,
            15500,
            -14600_i16 as u16,
            6000,
        ];
        let mut raw = [0u8; 24];
        for (chunk, word) in raw.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        raw
    }

    // H2 = 362, H3 = 0, H4 = 324, H5 = 50, H6 = 30
    fn humidity_calibration() -> [u8; 7] {
        let h2 = 362_i16.to_le_bytes();
        [h2[0], h2[1], 0, 0x14, 0x24, 0x03, 30]
    }

    #[test]
    fn test_calibration_decoding() {
        let calibration = Calibration::from_registers(&datasheet_calibration());
        assert_eq!(calibration.t1, 27504);
        assert_eq!(calibration.t3, -1000);
        assert_eq!(calibration.p1, 36477);
        assert_eq!(calibration.p6, -7);
        assert_eq!(calibration.p9, 6000);

        let calibration = calibration.with_humidity(75, &humidity_calibration());
        assert_eq!(calibration.h1, 75);
        assert_eq!(calibration.h2, 362);
        assert_eq!(calibration.h4, 324);
        assert_eq!(calibration.h5, 50);
        assert_eq!(calibration.h6, 30);
    }

    #[test]
    fn test_negative_h4_h5_sign_extend() {
        // H4 = -5 (0xFFB), H5 = -3 (0xFFD)
        let calibration = Calibration::default().with_humidity(0, &[0, 0, 0, 0xFF, 0xDB, 0xFF, 0]);
        assert_eq!(calibration.h4, -5);
        assert_eq!(calibration.h5, -3);
    }

    #[test]
    fn test_datasheet_compensation() {
        let calibration = Calibration::from_registers(&datasheet_calibration());

        let (temperature, t_fine) = calibration.compensate_temperature(519_888);
        assert_eq!(t_fine, 128_422);
        assert_eq!(temperature, 2508);

        assert_eq!(calibration.compensate_pressure(415_148, t_fine), 25_767_233);
    }

    #[test]
    fn test_humidity_compensation() {
        let calibration = Calibration::from_registers(&datasheet_calibration())
            .with_humidity(75, &humidity_calibration());
        assert_eq!(calibration.compensate_humidity(30_000, 128_422), 52_306);
    }

    #[test]
    fn test_humidity_is_clamped() {
        let calibration = Calibration::from_registers(&datasheet_calibration())
            .with_humidity(75, &humidity_calibration());
        assert_eq!(calibration.compensate_humidity(0, 128_422), 0);
        assert!(calibration.compensate_humidity(0xFFFF, 128_422) <= 100 * 1024);
    }

    #[test]
    fn test_temperature_survives_extreme_inputs() {
        let blank = Calibration::default();
        assert_eq!(blank.compensate_temperature(0xFFFFF), (0, 0));

        let calibration = Calibration {
            t1: 27504,
            t2: i16::MAX,
            ..Calibration::default()
        };
        assert_eq!(calibration.compensate_temperature(0xFFFFF), (23_769, 1_216_970));

        let calibration = Calibration {
            t1: 0,
            t2: i16::MAX,
            t3: i16::MAX,
            ..Calibration::default()
        };
        let (temperature, t_fine) = calibration.compensate_temperature(0xFFFFF);
        assert_eq!(temperature, (t_fine * 5 + 128) >> 8);
    }

    #[test]
    fn test_blank_calibration_does_not_divide_by_zero() {
        let calibration = Calibration::default();
        assert_eq!(calibration.compensate_pressure(415_148, 0), 0);
    }

    #[test]
    fn test_init_detects_bmp280_and_configures() {
        let mut sensor = Bmp280::new(FakeBus::bmp280(), NoDelay, I2C_ADDRESS_1);
        let variant = block_on(sensor.init(Params::default())).unwrap();
        assert_eq!(variant, ChipVariant::Bmp280);
        assert_eq!(sensor.variant(), Some(ChipVariant::Bmp280));

        let (bus, _) = sensor.release();
        assert_eq!(bus.registers[reg::RESET as usize], RESET_COMMAND);
        // standby 250 ms, filter off
        assert_eq!(bus.registers[reg::CONFIG as usize], 0b011_000_00);
        // x4 temperature, x4 pressure, normal mode
        assert_eq!(bus.registers[reg::CTRL_MEAS as usize], 0b011_011_11);
        assert_eq!(bus.registers[reg::CTRL_HUM as usize], 0);
    }

    #[test]
    fn test_init_writes_ctrl_hum_on_bme280() {
        let mut sensor = Bmp280::new(FakeBus::bme280(), NoDelay, I2C_ADDRESS_0);
        let variant = block_on(sensor.init(Params::default())).unwrap();
        assert_eq!(variant, ChipVariant::Bme280);
        assert_eq!(sensor.calibration().map(|c| c.h2), Some(362));

        let (bus, _) = sensor.release();
        assert_eq!(bus.registers[reg::CTRL_HUM as usize], Oversampling::Standard as u8);
    }

    #[test]
    fn test_init_rejects_unknown_chip() {
        let mut sensor = Bmp280::new(FakeBus::new(0x55), NoDelay, I2C_ADDRESS_1);
        let err = block_on(sensor.init(Params::default())).unwrap_err();
        assert_eq!(
            err,
            SensorError::UnsupportedChip {
                sensor: "BMP280",
                chip_id: 0x55
            }
        );
        assert_eq!(sensor.variant(), None);
    }

    #[test]
    fn test_init_times_out_when_nvm_copy_hangs() {
        let mut bus = FakeBus::bmp280();
        bus.registers[reg::STATUS as usize] = STATUS_IM_UPDATE;
        let mut sensor = Bmp280::new(bus, NoDelay, I2C_ADDRESS_1);
        let err = block_on(sensor.init(Params::default())).unwrap_err();
        assert!(matches!(err, SensorError::InitializationFailed { .. }));
    }

    #[test]
    fn test_write_errors_are_reported_as_writes() {
        let mut bus = FakeBus::bmp280();
        bus.fail_writes = true;
        let mut sensor = Bmp280::new(bus, NoDelay, I2C_ADDRESS_1);
        let err = block_on(sensor.init(Params::default())).unwrap_err();
        assert_eq!(
            err,
            SensorError::WriteFailed {
                sensor: "BMP280",
                operation: "soft reset",
                details: "I2C communication error or sensor not responding",
            }
        );
    }

    #[test]
    fn test_read_before_init_fails() {
        let mut sensor = Bmp280::new(FakeBus::bmp280(), NoDelay, I2C_ADDRESS_1);
        let err = block_on(sensor.read_fixed()).unwrap_err();
        assert_eq!(err, SensorError::NotInitialized { sensor: "BMP280" });
    }

    #[test]
    fn test_read_fixed_matches_datasheet() {
        let mut sensor = Bmp280::new(FakeBus::bmp280(), NoDelay, I2C_ADDRESS_1);
        block_on(sensor.init(Params::default())).unwrap();

        let reading = block_on(sensor.read_fixed()).unwrap();
        assert_eq!(reading.temperature_centi_celsius, 2508);
        assert_eq!(reading.pressure_q24_8, 25_767_233);
        assert_eq!(reading.humidity_q22_10, None);
    }

    #[test]
    fn test_read_float_with_humidity() {
        let mut sensor = Bmp280::new(FakeBus::bme280(), NoDelay, I2C_ADDRESS_1);
        block_on(sensor.init(Params::default())).unwrap();

        let measurement = block_on(sensor.read()).unwrap();
        assert!((measurement.temperature_celsius - 25.08).abs() < 0.001);
        assert!((measurement.pressure_pa - 100_653.25).abs() < 0.01);
        let humidity = measurement.humidity_percent.unwrap();
        assert!((humidity - 51.08).abs() < 0.01);
    }

    #[test]
    fn test_forced_mode_sleeps_then_triggers_per_read() {
        let params = Params {
            mode: Mode::Forced,
            ..Params::default()
        };
        let mut sensor = Bmp280::new(FakeBus::bmp280(), NoDelay, I2C_ADDRESS_1);
        block_on(sensor.init(params)).unwrap();
        assert_eq!(sensor.i2c.registers[reg::CTRL_MEAS as usize] & 0b11, Mode::Sleep as u8);

        let reading = block_on(sensor.read_fixed()).unwrap();
        assert_eq!(reading.temperature_centi_celsius, 2508);
        assert_eq!(sensor.i2c.registers[reg::CTRL_MEAS as usize] & 0b11, Mode::Forced as u8);
    }

    #[test]
    fn test_forced_mode_times_out() {
        let params = Params {
            mode: Mode::Forced,
            ..Params::default()
        };
        let mut sensor = Bmp280::new(FakeBus::bmp280(), NoDelay, I2C_ADDRESS_1);
        block_on(sensor.init(params)).unwrap();

        // Keep the measuring bit latched for every poll.
        sensor.i2c.registers[reg::STATUS as usize] = STATUS_MEASURING;

        let err = block_on(sensor.read_fixed()).unwrap_err();
        assert!(matches!(err, SensorError::Timeout { .. }));
    }

    #[test]
    fn test_init_with_retry_survives_bus_errors() {
        let mut bus = FakeBus::bmp280();
        bus.fail_transactions = 3;
        let mut sensor = Bmp280::new(bus, NoDelay, I2C_ADDRESS_1);

        let variant = block_on(sensor.init_with_retry(Params::default(), 250));
        assert_eq!(variant, ChipVariant::Bmp280);

        let (bus, _) = sensor.release();
        assert_eq!(bus.fail_transactions, 0);
        assert!(bus.transactions > 3);
    }
}
