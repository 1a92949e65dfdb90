//! Print the whole 24LC256 as hex, one 64-byte page per line.
//!
//! Following pins are used:
//! - SDA => GPIO2
//! - SCL => GPIO1

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use wlt::{config::CONFIG_SIGNATURE, eeprom::EEPROM_MEM_LEN, hardware};

esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    match hardware::eeprom(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1) {
        Ok(mut eeprom) => {
            esp_println::println!("EEPROM dump start ({} bytes)", EEPROM_MEM_LEN);
            let result = eeprom.dump(|addr, page| {
                esp_println::print!("{:04X}:", addr);
                for b in page {
                    esp_println::print!(" {:02X}", b);
                }
                if addr == 0 && page.starts_with(&CONFIG_SIGNATURE) {
                    esp_println::print!("  <config>");
                }
                esp_println::println!("");
            });
            match result {
                Ok(()) => esp_println::println!("EEPROM dump done"),
                Err(e) => esp_println::println!("EEPROM dump aborted: {}", e),
            }
        }
        Err(e) => esp_println::println!("I2C config failed: {:?}", e),
    }

    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
