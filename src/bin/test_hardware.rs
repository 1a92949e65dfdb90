#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use wlt::{
    config::{self, PersistedConfigRecord},
    content,
    eeprom::{EEPROM_MEM_LEN, EEPROM_PAGE_LEN},
    hardware::{self, Bme280Sensor, RgbLed},
    http::Route,
    led::{Blinker, RgbColor},
    logic::select_wifi_mode,
    model::{NodeContext, TempUnit, WifiMode},
    traits::{ByteStore, EnvironmentSensor, StatusLed},
};

/// Last page of the part, never used by the configuration record.
const SCRATCH_ADDR: u16 = (EEPROM_MEM_LEN - EEPROM_PAGE_LEN) as u16;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn assert_close(&mut self, value: f32, expected: f32, tolerance: f32, test_name: &str) {
        self.total += 1;
        if (value - expected).abs() < tolerance {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!(
                "  ✗ {} FAILED: {:.2} not close to {:.2} (tolerance: {:.2})",
                test_name,
                value,
                expected,
                tolerance
            );
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

fn test_node_logic(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Node logic");

    results.assert_eq(
        select_wifi_mode(&[false, false, false]).ok(),
        Some(WifiMode::AccessPoint),
        "strap low selects AP",
    );
    results.assert(
        select_wifi_mode(&[true, false, false]).is_err(),
        "mixed strap is rejected",
    );
    results.assert_close(
        TempUnit::Fahrenheit.convert(100.0),
        212.0,
        0.01,
        "celsius to fahrenheit",
    );

    let defaults = config::factory_defaults();
    let record = PersistedConfigRecord::capture_from_runtime(&defaults);
    let decoded = PersistedConfigRecord::from_bytes(&record.to_bytes());
    results.assert(decoded.is_signature_valid(), "record signature survives");
    results.assert_eq(
        decoded.settings.poll_interval(),
        defaults.settings.poll_interval(),
        "record keeps poll interval",
    );

    let mut ctx = NodeContext::new(defaults);
    let mut body = [0u8; 1152];
    let len = content::build(Route::ApiInfo, None, &mut ctx, &mut body);
    results.assert(len > 0, "api info fits the body buffer");
    results.assert(body[..len].starts_with(b"{"), "api info is a JSON object");
}

fn test_eeprom<S: ByteStore>(results: &mut TestResults, eeprom: &mut S) {
    esp_println::println!("\n[TEST] EEPROM");

    let mut saved = [0u8; EEPROM_PAGE_LEN];
    match eeprom.read(SCRATCH_ADDR, &mut saved) {
        Ok(()) => results.assert(true, "read scratch page"),
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "read scratch page");
            return;
        }
    }

    let mut pattern = [0u8; EEPROM_PAGE_LEN];
    for (i, b) in pattern.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(7) ^ 0xA5;
    }
    results.assert(
        eeprom.write(SCRATCH_ADDR, &pattern).is_ok(),
        "write scratch page",
    );

    let mut back = [0u8; EEPROM_PAGE_LEN];
    results.assert(
        eeprom.read(SCRATCH_ADDR, &mut back).is_ok(),
        "read back scratch page",
    );
    results.assert(back == pattern, "scratch page matches");

    results.assert(
        eeprom.write(SCRATCH_ADDR, &saved).is_ok(),
        "restore scratch page",
    );

    match config::load(eeprom) {
        Ok(record) => esp_println::println!("    stored device: {}", record.device_name),
        Err(e) => esp_println::println!("    no stored record ({})", e),
    }
}

async fn test_sensor<S: EnvironmentSensor>(results: &mut TestResults, sensor: &mut S) {
    esp_println::println!("\n[TEST] BME280");

    if let Err(e) = sensor.init() {
        esp_println::println!("  Failed to initialize sensor: {}", e);
        results.assert(false, "sensor initialization");
        return;
    }
    results.assert(true, "sensor initialization");

    esp_println::println!("  Reading 5 samples...");
    let mut temps = heapless::Vec::<f32, 5>::new();
    for i in 0..5 {
        Timer::after(Duration::from_millis(100)).await;
        match sensor.read() {
            Ok(r) => {
                esp_println::println!(
                    "    Sample {}: {:.2}°C {:.1}% {:.1}hPa",
                    i + 1,
                    r.temperature,
                    r.humidity,
                    r.pressure
                );
                results.assert(
                    (0.0..=100.0).contains(&r.humidity),
                    "humidity in valid range",
                );
                results.assert(
                    r.pressure > 300.0 && r.pressure < 1100.0,
                    "pressure in valid range",
                );
                let _ = temps.push(r.temperature);
            }
            Err(e) => esp_println::println!("    Failed to read sensor: {}", e),
        }
    }

    results.assert_eq(temps.len(), 5, "collected 5 samples");
    if temps.len() == 5 {
        for temp in temps.iter() {
            results.assert(*temp > -40.0 && *temp < 85.0, "temperature in valid range");
        }
        let min_temp = temps.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max_temp = temps.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        results.assert(
            max_temp - min_temp < 2.0,
            "temperature readings stable (within 2°C)",
        );
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    test_node_logic(&mut results);

    let mut led = RgbLed::new(peripherals.GPIO4, peripherals.GPIO5, peripherals.GPIO6);
    for color in [RgbColor::Red, RgbColor::Green, RgbColor::Blue, RgbColor::Off] {
        led.set_color(color);
        Delay::new().delay_millis(200);
    }

    let i2c0 = peripherals.I2C0;
    let gpio8 = peripherals.GPIO8;
    let gpio9 = peripherals.GPIO9;

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    match hardware::eeprom(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1) {
        Ok(mut eeprom) => test_eeprom(&mut results, &mut eeprom),
        Err(e) => {
            esp_println::println!("  EEPROM bus config failed: {:?}", e);
            results.assert(false, "EEPROM bus");
        }
    }

    match Bme280Sensor::new(i2c0, gpio8, gpio9) {
        Ok(mut sensor) => test_sensor(&mut results, &mut sensor).await,
        Err(e) => {
            esp_println::println!("  Sensor bus config failed: {:?}", e);
            results.assert(false, "sensor bus");
        }
    }

    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    let (color, half_ms) = if results.failed == 0 {
        (RgbColor::Green, 200)
    } else {
        (RgbColor::Red, 1_000)
    };
    let mut blink = Blinker::new(color);
    loop {
        blink.tick(&mut led);
        Timer::after(Duration::from_millis(half_ms)).await;
    }
}
