#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use static_cell::StaticCell;

use lora_baro_core::app_state::LinkSupervisor;
use lora_baro_core::config::{NodeConfig, Region};
use lora_baro_core::sampling::LatestFrame;
use lora_baro_firmware::app_state::{
    AppError, abort_on_error, create_barometer, create_i2c_bus, create_radio_spi, init_radio,
};
use lora_baro_firmware::{lorawan_secrets, network, tasks};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

static LATEST_FRAME: StaticCell<LatestFrame> = StaticCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "the LoRaWAN device is built on the main stack before moving into its task"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let credentials = abort_on_error(lorawan_secrets::credentials().map_err(AppError::from));
    let region = lorawan_secrets::region().unwrap_or_else(|e| {
        warn!("{}, falling back to EU868", AppError::from(e));
        Region::Eu868
    });
    let node_config = NodeConfig::default().with_region(region);

    let i2c = abort_on_error(create_i2c_bus(
        peripherals.I2C0,
        peripherals.GPIO21,
        peripherals.GPIO22,
    ));
    let barometer = create_barometer(i2c);

    let spi = abort_on_error(create_radio_spi(
        peripherals.SPI2,
        peripherals.GPIO18,
        peripherals.GPIO23,
        peripherals.GPIO19,
        peripherals.GPIO5,
    ));
    let radio = abort_on_error(init_radio(spi, peripherals.GPIO14, peripherals.GPIO33).await);
    let mut device = network::create_device(radio, node_config.region, Rng::new());
    let join_mode = network::join_mode(&credentials);
    let mut supervisor = LinkSupervisor::new(node_config.join);

    let latest: &'static LatestFrame = LATEST_FRAME.init(LatestFrame::new());

    info!("Joining...");
    abort_on_error(
        spawner
            .spawn(tasks::sampling_task(barometer, latest, node_config))
            .map_err(|_| AppError::Spawn("sampling")),
    );

    if network::join_network(&mut device, &join_mode, &mut supervisor).await {
        abort_on_error(
            spawner
                .spawn(tasks::uplink_task(
                    device,
                    join_mode,
                    supervisor,
                    latest,
                    node_config,
                ))
                .map_err(|_| AppError::Spawn("uplink")),
        );
    } else {
        error!("Join failed. Goodbye");
    }

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
