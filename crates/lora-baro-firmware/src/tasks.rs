//! The two periodic tasks of the node
//!
//! The sampling task owns the barometer and publishes frames to the shared
//! [`LatestFrame`]; the uplink task owns the LoRaWAN device and transmits
//! whatever frame is newest when its timer fires.

use embassy_time::Timer;
use log::{debug, error, info, warn};
use lora_baro_core::app_state::{LinkSupervisor, UplinkDecision};
use lora_baro_core::config::NodeConfig;
use lora_baro_core::sampling::{LatestFrame, sample_once};
use lora_baro_core::sensors::bmp280::Params;
use lorawan_device::async_device::JoinMode;

use crate::app_state::{BarometerSensor, log_sample};
use crate::network::{self, LorawanDevice};

#[embassy_executor::task]
pub async fn sampling_task(
    mut sensor: BarometerSensor,
    latest: &'static LatestFrame,
    config: NodeConfig,
) {
    let retry_ms = config.init_retry_delay.as_millis() as u32;
    let variant = sensor.init_with_retry(Params::default(), retry_ms).await;
    info!("BMP280: found {}", variant.name());

    loop {
        Timer::after(config.sample_interval).await;

        match sample_once(&mut sensor, latest).await {
            Ok(sample) => log_sample(&sample),
            Err(e) => error!("Temperature/pressure reading failed: {}", e),
        }
    }
}

#[embassy_executor::task]
pub async fn uplink_task(
    mut device: LorawanDevice,
    join_mode: JoinMode,
    mut supervisor: LinkSupervisor,
    latest: &'static LatestFrame,
    config: NodeConfig,
) {
    let mut last_sent = None;

    loop {
        match latest.latest() {
            None => warn!("No sensor reading yet, skipping uplink"),
            Some(sample) => {
                if last_sent == Some(sample.sequence) {
                    warn!("No fresh reading, repeating sample #{}", sample.sequence);
                }

                info!("Sending message...");
                let outcome = network::send_uplink(
                    &mut device,
                    sample.frame.uplink_payload(),
                    config.uplink_port,
                    config.confirmed_uplinks,
                )
                .await;

                if outcome.is_success() {
                    info!("Message sent.");
                    last_sent = Some(sample.sequence);
                } else {
                    warn!("Transmission failed. ({:?})", outcome);
                }

                let decision = supervisor.on_uplink(outcome);
                let stats = supervisor.stats();
                debug!(
                    "Uplinks sent: {}, failed: {}, downlinks: {}",
                    stats.uplinks_sent, stats.uplinks_failed, stats.downlinks
                );

                if decision == UplinkDecision::Rejoin
                    && !network::join_network(&mut device, &join_mode, &mut supervisor).await
                {
                    error!("Rejoin failed. Goodbye");
                    return;
                }
            }
        }

        Timer::after(config.tx_interval).await;
    }
}
