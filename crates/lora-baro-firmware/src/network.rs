//! LoRaWAN device setup, join and uplink handling

use embassy_time::Timer;
use log::{error, info, warn};
use lora_baro_core::app_state::{JoinDecision, LinkSupervisor, UplinkOutcome};
use lora_baro_core::config::Region;
use lora_baro_core::credentials::Credentials;
use lora_baro_core::downlink::Downlink;
use lora_baro_core::link_timer::LorawanTimer;
use lorawan_device::async_device::{Device, JoinMode, JoinResponse, SendResponse};
use lorawan_device::default_crypto::DefaultFactory;
use lorawan_device::region::{self, Subband};
use lorawan_device::{AppEui, AppKey, DevEui};
use rand_core::RngCore;

use crate::app_state::Radio;

/// Feeds the LoRaWAN stack (DevNonce, channel hopping) from the ESP32 RNG.
pub struct HardwareRng(esp_hal::rng::Rng);

impl HardwareRng {
    pub fn new(rng: esp_hal::rng::Rng) -> Self {
        Self(rng)
    }
}

impl RngCore for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

pub type LorawanDevice = Device<Radio, DefaultFactory, LorawanTimer, HardwareRng>;

fn subband(index: u8) -> Option<Subband> {
    Some(match index {
        1 => Subband::_1,
        2 => Subband::_2,
        3 => Subband::_3,
        4 => Subband::_4,
        5 => Subband::_5,
        6 => Subband::_6,
        7 => Subband::_7,
        8 => Subband::_8,
        _ => return None,
    })
}

fn region_configuration(region: Region) -> region::Configuration {
    match region {
        Region::Eu868 => region::Configuration::new(region::Region::EU868),
        Region::Us915 { subband: index } => {
            let mut plan = region::US915::new();
            if let Some(band) = subband(index) {
                plan.set_join_bias(band);
            }
            plan.into()
        }
        Region::Au915 { subband: index } => {
            let mut plan = region::AU915::new();
            if let Some(band) = subband(index) {
                plan.set_join_bias(band);
            }
            plan.into()
        }
    }
}

pub fn create_device(radio: Radio, region: Region, rng: esp_hal::rng::Rng) -> LorawanDevice {
    info!(
        "LoRaWAN region {} (sub-band {:?})",
        region.label(),
        region.subband()
    );
    Device::new(
        region_configuration(region),
        radio,
        LorawanTimer::new(),
        HardwareRng::new(rng),
    )
}

pub fn join_mode(credentials: &Credentials) -> JoinMode {
    JoinMode::OTAA {
        deveui: DevEui::from(credentials.dev_eui),
        appeui: AppEui::from(credentials.app_eui),
        appkey: AppKey::from(credentials.app_key),
    }
}

/// Run OTAA joins until the supervisor reports success or gives up.
pub async fn join_network(
    device: &mut LorawanDevice,
    join_mode: &JoinMode,
    supervisor: &mut LinkSupervisor,
) -> bool {
    loop {
        let attempt = supervisor.begin_join();
        info!("OTAA join attempt {}", attempt);

        let joined = match device.join(join_mode).await {
            Ok(JoinResponse::JoinSuccess) => true,
            Ok(JoinResponse::NoJoinAccept) => {
                warn!("No join accept received");
                false
            }
            Err(e) => {
                error!("Join error: {:?}", e);
                false
            }
        };

        match supervisor.on_join_result(joined) {
            JoinDecision::Joined => {
                info!("Joined.");
                return true;
            }
            JoinDecision::RetryAfter(delay) => Timer::after(delay).await,
            JoinDecision::GiveUp => return false,
        }
    }
}

/// Transmit `payload` on `port` and report any application downlink that
/// arrived in the receive windows.
pub async fn send_uplink(
    device: &mut LorawanDevice,
    payload: &[u8],
    port: u8,
    confirmed: bool,
) -> UplinkOutcome {
    match device.send(payload, port, confirmed).await {
        Ok(SendResponse::DownlinkReceived(_)) => match device.take_downlink() {
            Some(downlink) => {
                info!("{}", Downlink::new(downlink.fport, &downlink.data));
                UplinkOutcome::SentWithDownlink
            }
            // MAC-only downlink, nothing for the application.
            None => UplinkOutcome::Sent,
        },
        Ok(SendResponse::RxComplete) => UplinkOutcome::Sent,
        Ok(SendResponse::NoAck) => UplinkOutcome::NoAck,
        Ok(SendResponse::SessionExpired) => UplinkOutcome::SessionExpired,
        Err(e) => {
            error!("Uplink error: {:?}", e);
            UplinkOutcome::Failed
        }
    }
}
