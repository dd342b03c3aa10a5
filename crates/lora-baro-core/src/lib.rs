//! Hardware-independent core library for lora-baro
//!
//! This crate contains all platform-agnostic logic for the LoRaWAN barometer
//! node: the BMP280/BME280 driver and sensor trait, telemetry frame encoding,
//! the shared latest-reading slot, the LoRaWAN receive-window timer,
//! credential provisioning, node configuration and link supervision.
//!
//! It is `#![no_std]` so it compiles on both the ESP32 target and desktop
//! hosts (for tests).

#![no_std]

pub mod app_state;
pub mod config;
pub mod credentials;
pub mod downlink;
pub mod link_timer;
pub mod sampling;
pub mod sensors;
pub mod telemetry;
