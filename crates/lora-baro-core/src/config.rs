//! Node configuration
//!
//! Runtime settings for the sampling and uplink loops and for joining the
//! network. Credentials live in [`crate::credentials`].

use core::str::FromStr;

use embassy_time::Duration;
use thiserror_no_std::Error;

/// Interval between two uplinks, and between two sensor samples.
pub const TX_INTERVAL: Duration = Duration::from_secs(30);

/// Delay between two attempts at bringing the sensor up.
pub const INIT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Application port used for telemetry uplinks.
pub const DEFAULT_UPLINK_PORT: u8 = 1;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown region: expected EU868, US915 or AU915")]
    UnknownRegion,
    #[error("Invalid sub-band {0}: expected 1..=8")]
    InvalidSubband(u8),
    #[error("Malformed sub-band suffix")]
    MalformedSubband,
    #[error("Uplink port {0} is reserved")]
    ReservedPort(u8),
}

/// LoRaWAN frequency plan the radio operates in.
///
/// The US and AU plans have 64 uplink channels split in eight sub-bands of
/// eight; gateways usually only listen on one of them, so the join is biased
/// towards `subband`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Eu868,
    Us915 { subband: u8 },
    Au915 { subband: u8 },
}

impl Region {
    /// Get a short label for logging
    pub const fn label(self) -> &'static str {
        match self {
            Self::Eu868 => "EU868",
            Self::Us915 { .. } => "US915",
            Self::Au915 { .. } => "AU915",
        }
    }

    /// Sub-band the join is biased towards, if the plan has any.
    pub const fn subband(self) -> Option<u8> {
        match self {
            Self::Eu868 => None,
            Self::Us915 { subband } | Self::Au915 { subband } => Some(subband),
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::Eu868
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    /// Parses `EU868`, `US915`, `US915:2`, `AU915:1` (case-insensitive).
    /// Sub-band defaults to 2 for US915 and 1 for AU915.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, subband) = match s.split_once(':') {
            Some((name, band)) => {
                let band = band
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| ConfigError::MalformedSubband)?;
                (name.trim(), Some(band))
            }
            None => (s, None),
        };

        if let Some(band) = subband {
            if !(1..=8).contains(&band) {
                return Err(ConfigError::InvalidSubband(band));
            }
        }

        if name.eq_ignore_ascii_case("EU868") {
            if subband.is_some() {
                return Err(ConfigError::MalformedSubband);
            }
            Ok(Self::Eu868)
        } else if name.eq_ignore_ascii_case("US915") {
            Ok(Self::Us915 {
                subband: subband.unwrap_or(2),
            })
        } else if name.eq_ignore_ascii_case("AU915") {
            Ok(Self::Au915 {
                subband: subband.unwrap_or(1),
            })
        } else {
            Err(ConfigError::UnknownRegion)
        }
    }
}

/// How hard to try joining before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPolicy {
    /// Number of join attempts; 0 retries forever.
    pub max_attempts: u8,
    pub retry_delay: Duration,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub tx_interval: Duration,
    pub sample_interval: Duration,
    pub init_retry_delay: Duration,
    pub uplink_port: u8,
    pub confirmed_uplinks: bool,
    pub region: Region,
    pub join: JoinPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tx_interval: TX_INTERVAL,
            sample_interval: TX_INTERVAL,
            init_retry_delay: INIT_RETRY_DELAY,
            uplink_port: DEFAULT_UPLINK_PORT,
            confirmed_uplinks: false,
            region: Region::default(),
            join: JoinPolicy::default(),
        }
    }
}

impl NodeConfig {
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Set the application port for uplinks.
    ///
    /// Port 0 carries MAC commands only and 224..=255 are reserved by the
    /// LoRaWAN specification.
    pub fn with_uplink_port(mut self, port: u8) -> Result<Self, ConfigError> {
        if port == 0 || port >= 224 {
            return Err(ConfigError::ReservedPort(port));
        }
        self.uplink_port = port;
        Ok(self)
    }
}
