//! Provisioning values baked in by `build.rs`.

use lora_baro_core::config::{ConfigError, Region};
use lora_baro_core::credentials::{Credentials, CredentialsError};

pub const DEV_EUI: &str = env!("LORAWAN_DEV_EUI");
pub const APP_EUI: &str = env!("LORAWAN_APP_EUI");
pub const APP_KEY: &str = env!("LORAWAN_APP_KEY");
pub const REGION: &str = env!("LORAWAN_REGION");

pub fn credentials() -> Result<Credentials, CredentialsError> {
    Credentials::from_hex(DEV_EUI, APP_EUI, APP_KEY)
}

pub fn region() -> Result<Region, ConfigError> {
    REGION.parse()
}
