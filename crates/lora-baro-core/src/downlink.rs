//! Formatting for messages received from the network

use core::fmt;

/// Renders a byte slice as space separated lowercase hex, each byte preceded
/// by a space (` 01 ab ff`).
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, " {:02x}", byte)?;
        }
        Ok(())
    }
}

/// Application payload delivered in a downlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downlink<'a> {
    pub port: u8,
    pub payload: &'a [u8],
}

impl<'a> Downlink<'a> {
    pub const fn new(port: u8, payload: &'a [u8]) -> Self {
        Self { port, payload }
    }
}

impl fmt::Display for Downlink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message of {} bytes received on port {}:{}",
            self.payload.len(),
            self.port,
            HexBytes(self.payload)
        )
    }
}
