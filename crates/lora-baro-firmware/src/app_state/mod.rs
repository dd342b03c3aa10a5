//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `lora_baro_core` and
//! adds ESP32-specific hardware initialization and sensor construction.

mod hardware;
mod sensors_state;

pub use hardware::*;
pub use sensors_state::*;

// Re-export all shared app state types from lora-baro-core
pub use lora_baro_core::app_state::*;

use log::error;

/// Unwrap a bring-up result or halt the firmware. There is nothing sensible
/// to fall back to when a peripheral cannot be configured.
pub fn abort_on_error<T>(result: Result<T, AppError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!("Fatal: {}", e);
            panic!("{}", e);
        }
    }
}
