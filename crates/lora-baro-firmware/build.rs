//! Exports the LoRaWAN provisioning values to the firmware at compile time.
//!
//! Values come from the environment or from a `.env` file next to this
//! crate. Anything missing falls back to the sample credentials so the
//! firmware always builds; such a device will not join a real network.

use std::env;

const PROVISIONING: [(&str, &str); 4] = [
    ("LORAWAN_DEV_EUI", "0007f0000a7c5ac4"),
    ("LORAWAN_APP_EUI", "0000000000000005"),
    ("LORAWAN_APP_KEY", "10101010101010101010101010101010"),
    ("LORAWAN_REGION", "EU868"),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    let _ = dotenvy::dotenv();

    for (key, sample) in PROVISIONING {
        println!("cargo:rerun-if-env-changed={key}");
        let value = env::var(key).unwrap_or_else(|_| {
            println!("cargo:warning={key} is not set, using the sample value");
            sample.to_string()
        });
        println!("cargo:rustc-env={key}={value}");
    }
}
