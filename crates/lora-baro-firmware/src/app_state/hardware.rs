//! Hardware initialization for the node
//!
//! Pinout (ESP32 with an SX1276 module and a BMP280 breakout):
//! - I2C0: SDA GPIO21, SCL GPIO22
//! - SPI2 (HSPI): SCLK GPIO18, MOSI GPIO23, MISO GPIO19, NSS GPIO5
//! - radio RST GPIO14, DIO0 GPIO33; DIO1 (GPIO32) is wired but unused by the
//!   PHY driver, and there is no RX/TX antenna switch.

use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::peripherals::{GPIO5, GPIO14, GPIO18, GPIO19, GPIO21, GPIO22, GPIO23, GPIO33, I2C0, SPI2};
use esp_hal::spi::Mode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use log::info;
use lora_phy::LoRa;
use lora_phy::iv::GenericSx127xInterfaceVariant;
use lora_phy::lorawan_radio::LorawanRadio;
use lora_phy::sx127x::{self, Sx127x, Sx1276};

use super::{AppError, describe};

/// Highest TX power the radio is allowed to use, in dBm.
pub const MAX_TX_POWER: u8 = 14;

const I2C_FREQ_KHZ: u32 = 100;
const SPI_FREQ_MHZ: u32 = 2;

pub type I2cBus = I2c<'static, esp_hal::Async>;
pub type RadioSpi = ExclusiveDevice<Spi<'static, esp_hal::Async>, Output<'static>, embassy_time::Delay>;
pub type RadioInterface = GenericSx127xInterfaceVariant<Output<'static>, Input<'static>>;
pub type RadioChip = Sx127x<RadioSpi, RadioInterface, Sx1276>;
pub type Radio = LorawanRadio<RadioChip, embassy_time::Delay, MAX_TX_POWER>;

/// Create the async I2C bus the barometer sits on.
pub fn create_i2c_bus(
    i2c0: I2C0<'static>,
    sda: GPIO21<'static>,
    scl: GPIO22<'static>,
) -> Result<I2cBus, AppError> {
    let bus = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(I2C_FREQ_KHZ)),
    )
    .map_err(|e| AppError::Hardware(describe(&e)))?
    .with_sda(sda)
    .with_scl(scl)
    .into_async();

    Ok(bus)
}

/// Create the SPI bus for the radio and wrap it as a device owning NSS.
pub fn create_radio_spi(
    spi2: SPI2<'static>,
    sclk: GPIO18<'static>,
    mosi: GPIO23<'static>,
    miso: GPIO19<'static>,
    nss: GPIO5<'static>,
) -> Result<RadioSpi, AppError> {
    let bus = Spi::new(
        spi2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(SPI_FREQ_MHZ))
            .with_mode(Mode::_0),
    )
    .map_err(|e| AppError::Hardware(describe(&e)))?
    .with_sck(sclk)
    .with_mosi(mosi)
    .with_miso(miso)
    .into_async();

    let cs = Output::new(nss, Level::High, OutputConfig::default());

    ExclusiveDevice::new(bus, cs, embassy_time::Delay).map_err(|e| AppError::Hardware(describe(&e)))
}

/// Reset and configure the SX1276 and hand it over as a LoRaWAN radio.
pub async fn init_radio(
    spi: RadioSpi,
    reset: GPIO14<'static>,
    dio0: GPIO33<'static>,
) -> Result<Radio, AppError> {
    let reset = Output::new(reset, Level::High, OutputConfig::default());
    let dio0 = Input::new(dio0, InputConfig::default().with_pull(Pull::None));

    let iv = GenericSx127xInterfaceVariant::new(reset, dio0, None, None)
        .map_err(|e| AppError::Radio(describe(&e)))?;

    // RFM95-style modules route the PA through PA_BOOST.
    let config = sx127x::Config {
        chip: Sx1276,
        tcxo_used: false,
        tx_boost: true,
        rx_boost: false,
    };

    let lora = LoRa::new(Sx127x::new(spi, iv, config), true, embassy_time::Delay)
        .await
        .map_err(|e| AppError::Radio(describe(&e)))?;
    info!("SX1276 radio ready");

    Ok(LorawanRadio::from(lora))
}
