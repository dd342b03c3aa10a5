//! OTAA provisioning credentials
//!
//! The network console shows the device EUI, join EUI and app key as
//! MSB-first hex strings. Over the air the two EUIs travel LSB-first while the
//! key is used as-is, so the EUIs are reversed here once at provisioning time.

use thiserror_no_std::Error;

/// Sample credentials used when nothing is provisioned at build time.
pub const SAMPLE_DEV_EUI: &str = "0007f0000a7c5ac4";
pub const SAMPLE_APP_EUI: &str = "0000000000000005";
pub const SAMPLE_APP_KEY: &str = "10101010101010101010101010101010";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("{field}: expected {expected} hex digits, found {found}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{field}: not a hex string")]
    InvalidHex { field: &'static str },
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    /// Device EUI, LSB first.
    pub dev_eui: [u8; 8],
    /// Join (application) EUI, LSB first.
    pub app_eui: [u8; 8],
    /// Root application key, MSB first.
    pub app_key: [u8; 16],
}

impl Credentials {
    pub fn from_hex(dev_eui: &str, app_eui: &str, app_key: &str) -> Result<Self, CredentialsError> {
        let mut dev_eui = parse_hex::<8>("DevEUI", dev_eui)?;
        let mut app_eui = parse_hex::<8>("AppEUI", app_eui)?;
        let app_key = parse_hex::<16>("AppKey", app_key)?;

        dev_eui.reverse();
        app_eui.reverse();

        Ok(Self {
            dev_eui,
            app_eui,
            app_key,
        })
    }

    /// The credentials the sample ships with.
    pub fn sample() -> Result<Self, CredentialsError> {
        Self::from_hex(SAMPLE_DEV_EUI, SAMPLE_APP_EUI, SAMPLE_APP_KEY)
    }
}

// Keep the app key out of logs.
impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("dev_eui", &self.dev_eui)
            .field("app_eui", &self.app_eui)
            .field("app_key", &"<redacted>")
            .finish()
    }
}

fn parse_hex<const N: usize>(field: &'static str, text: &str) -> Result<[u8; N], CredentialsError> {
    let text = text.trim();
    if text.len() != N * 2 {
        return Err(CredentialsError::InvalidLength {
            field,
            expected: N * 2,
            found: text.len(),
        });
    }

    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out).map_err(|_| CredentialsError::InvalidHex { field })?;
    Ok(out)
}
