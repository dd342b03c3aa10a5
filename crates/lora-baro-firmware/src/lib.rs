//! ESP32 firmware-specific modules for lora-baro
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization, the SX1276 radio and LoRaWAN
//! device setup, compile-time provisioning and the embassy tasks.

#![no_std]

pub mod app_state;
pub mod lorawan_secrets;
pub mod network;
pub mod tasks;
