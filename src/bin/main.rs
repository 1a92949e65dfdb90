#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::{Duration, Instant, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, rng::Rng, timer::timg::TimerGroup};
use esp_radio::{Controller, wifi::WifiDevice};
use log::{error, info};
use static_cell::StaticCell;

use wlt::{
    config::{self, ConfigError},
    hardware::{self, Bme280Sensor, ModeStrap, RgbLed},
    led::{Blinker, BootFailure, FAILURE_BLINK_HALF_MS, RgbColor},
    logic::{NodeLogic, STRAP_SAMPLE_INTERVAL_MS, STRAP_SAMPLES, select_wifi_mode},
    model::{NodeContext, WifiMode},
    net::{self, SOCKET_BUF_LEN, StackListener},
    server::HttpServer,
    traits::{EnvironmentSensor, StatusLed},
    wifi,
};

/// Longest the loop waits for a client before doing its housekeeping.
const ACCEPT_WAIT_MS: u64 = 1_000;

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Blink the failure color forever.
async fn halt(led: &mut RgbLed<'_>, failure: BootFailure) -> ! {
    error!("boot: {}, halting", failure);
    let mut blink = Blinker::new(failure.color());
    loop {
        blink.tick(led);
        Timer::after(Duration::from_millis(FAILURE_BLINK_HALF_MS)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 72 * 1024);

    esp_println::println!("=== WLT sensor node ===");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // R = GPIO4, G = GPIO5, B = GPIO6
    let mut led = RgbLed::new(peripherals.GPIO4, peripherals.GPIO5, peripherals.GPIO6);
    led.set_color(RgbColor::Blue);

    // Mode strap on GPIO7
    let strap = ModeStrap::new(peripherals.GPIO7);
    let mut samples = [false; STRAP_SAMPLES];
    for sample in samples.iter_mut() {
        *sample = strap.is_high();
        Timer::after(Duration::from_millis(STRAP_SAMPLE_INTERVAL_MS)).await;
    }
    let mode = match select_wifi_mode(&samples) {
        Ok(mode) => mode,
        Err(failure) => halt(&mut led, failure).await,
    };
    info!("boot: mode {}", mode.as_str());

    let mut ctx = NodeContext::default();
    ctx.config.net.mode = mode;

    // EEPROM: SDA = GPIO2, SCL = GPIO1
    let mut eeprom = match hardware::eeprom(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1)
    {
        Ok(eeprom) => eeprom,
        Err(e) => {
            error!("boot: eeprom bus: {:?}", e);
            halt(&mut led, BootFailure::EepromRead).await
        }
    };
    match config::load_or_install_defaults(&mut eeprom, &mut ctx.config) {
        Ok(source) => info!("boot: configuration {:?}", source),
        Err(ConfigError::Persistence(_)) => halt(&mut led, BootFailure::EepromRead).await,
        Err(ConfigError::Integrity) => halt(&mut led, BootFailure::ConfigIntegrity).await,
    }

    // BME280: SDA = GPIO8, SCL = GPIO9
    let mut sensor = match Bme280Sensor::new(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9)
    {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("boot: sensor bus: {:?}", e);
            halt(&mut led, BootFailure::SensorAbsent).await
        }
    };
    if sensor.init().is_err() {
        halt(&mut led, BootFailure::SensorAbsent).await;
    }
    ctx.config.settings.set_sensor_available(true);

    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => {
            error!("boot: radio init: {:?}", e);
            halt(&mut led, BootFailure::WifiAssociation).await
        }
    };
    let (mut controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()) {
            Ok(v) => v,
            Err(e) => {
                error!("boot: wifi driver: {:?}", e);
                halt(&mut led, BootFailure::WifiAssociation).await
            }
        };
    let device = match mode {
        WifiMode::Station => interfaces.sta,
        WifiMode::AccessPoint => interfaces.ap,
    };

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        device,
        wifi::ip_config(mode),
        NET_RESOURCES.init(StackResources::<3>::new()),
        seed,
    );
    if let Err(e) = spawner.spawn(net_task(runner)) {
        error!("boot: failed to spawn net task: {:?}", e);
        halt(&mut led, BootFailure::WifiAssociation).await;
    }

    let started = match mode {
        WifiMode::Station => wifi::start_station(&mut controller, &ctx.config.net).await,
        WifiMode::AccessPoint => wifi::start_access_point(&mut controller).await,
    };
    if let Err(e) = started {
        error!("boot: {}", e);
        halt(&mut led, BootFailure::WifiAssociation).await;
    }
    let deadline = Instant::now() + wifi::STA_CONNECT_TIMEOUT;
    if let Err(e) = wifi::wait_for_address(stack, &mut ctx.config.net, deadline).await {
        error!("boot: {}", e);
        halt(&mut led, BootFailure::WifiAssociation).await;
    }

    let mut server = HttpServer::new(StackListener::new(stack));
    if server.open().is_err() {
        halt(&mut led, BootFailure::WifiAssociation).await;
    }

    let status = match mode {
        WifiMode::Station => RgbColor::Green,
        WifiMode::AccessPoint => RgbColor::Cyan,
    };
    led.set_color(status);
    let mut logic = NodeLogic::new(status);

    let mut rx_buffer = [0u8; SOCKET_BUF_LEN];
    let mut tx_buffer = [0u8; SOCKET_BUF_LEN];
    let accept_wait = Duration::from_millis(ACCEPT_WAIT_MS);

    loop {
        if let Some(mut socket) = server
            .listener()
            .accept(&mut rx_buffer, &mut tx_buffer, accept_wait)
            .await
        {
            net::serve(&mut server, &mut socket, &mut ctx).await;
        }
        // EEPROM writes only happen here, never while a socket is being served.
        logic.housekeeping(
            Instant::now().as_millis(),
            &mut ctx,
            &mut sensor,
            &mut eeprom,
            &mut led,
        );
    }
}
