//! Telemetry frame sent in every uplink
//!
//! The payload is plain text, pipe separated:
//!
//! ```text
//! |<temperature °C>|<pressure Pa>|0.00|<b>|<e>|<pa>
//! ```
//!
//! Floats carry two decimals. The third slot is always `0.00`, even on a
//! BME280; humidity only goes to the log. The three trailing integer slots
//! are kept at zero for the backend decoder. The frame lives in a 40-byte buffer of which
//! the first 39 bytes go on air, zero padded after the text.

use core::fmt::Write;

use thiserror_no_std::Error;

/// Size of the message buffer.
pub const FRAME_CAPACITY: usize = 40;

/// Bytes transmitted per uplink.
pub const UPLINK_LEN: usize = FRAME_CAPACITY - 1;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Telemetry frame does not fit in the uplink payload")]
    FrameOverflow,
}

/// One compensated sensor sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature_celsius: f32,
    pub pressure_pa: f32,
    pub humidity_percent: Option<f32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    bytes: [u8; FRAME_CAPACITY],
    len: usize,
}

impl TelemetryFrame {
    /// Third slot, fixed for the backend decoder.
    pub const RESERVED_SLOT: &'static str = "0.00";

    /// Trailing integer slots, always zero.
    pub const TRAILER: [i32; 3] = [0, 0, 0];

    pub fn encode(measurement: &Measurement) -> Result<Self, TelemetryError> {
        let mut text = heapless::String::<UPLINK_LEN>::new();
        let [b, e, pa] = Self::TRAILER;
        write!(
            text,
            "|{:.2}|{:.2}|{}|{}|{}|{}",
            measurement.temperature_celsius,
            measurement.pressure_pa,
            Self::RESERVED_SLOT,
            b,
            e,
            pa
        )
        .map_err(|_| TelemetryError::FrameOverflow)?;

        let mut bytes = [0u8; FRAME_CAPACITY];
        bytes[..text.len()].copy_from_slice(text.as_bytes());

        Ok(Self {
            bytes,
            len: text.len(),
        })
    }

    /// The rendered text, without padding.
    pub fn as_text(&self) -> &str {
        // Only ever filled from a `heapless::String`.
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// The fixed-size payload handed to the radio.
    pub fn uplink_payload(&self) -> &[u8] {
        &self.bytes[..UPLINK_LEN]
    }
}

impl core::fmt::Debug for TelemetryFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("TelemetryFrame").field(&self.as_text()).finish()
    }
}
