use bme280::i2c::BME280;
use esp_hal::gpio::AnyPin;
use esp_hal::{
    Blocking,
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, ConfigError, I2c},
    peripherals::{I2C0, I2C1},
    time::Rate,
};
use log::{info, warn};

use crate::eeprom::Eeprom24lc256;
use crate::led::RgbColor;
use crate::model::SensorReading;
use crate::traits::{EnvironmentSensor, SensorError, StatusLed};

const SENSOR_I2C_KHZ: u32 = 100;
const EEPROM_I2C_KHZ: u32 = 400;

pub type BoardEeprom<'a> = Eeprom24lc256<I2c<'a, Blocking>, Delay>;

/// Open the EEPROM bus.
pub fn eeprom<'a, SDA, SCL>(
    i2c_periph: I2C1<'a>,
    sda: SDA,
    scl: SCL,
) -> Result<BoardEeprom<'a>, ConfigError>
where
    SDA: Into<AnyPin<'a>>,
    SCL: Into<AnyPin<'a>>,
{
    let i2c = I2c::new(
        i2c_periph,
        I2cConfig::default().with_frequency(Rate::from_khz(EEPROM_I2C_KHZ)),
    )?
    .with_sda(sda.into())
    .with_scl(scl.into());

    Ok(Eeprom24lc256::new(i2c, Delay::new()))
}

/// Three discrete channels, active high.
pub struct RgbLed<'a> {
    red: Output<'a>,
    green: Output<'a>,
    blue: Output<'a>,
}

impl<'a> RgbLed<'a> {
    pub fn new<R, G, B>(red: R, green: G, blue: B) -> Self
    where
        R: Into<AnyPin<'a>>,
        G: Into<AnyPin<'a>>,
        B: Into<AnyPin<'a>>,
    {
        Self {
            red: Output::new(red.into(), Level::Low, OutputConfig::default()),
            green: Output::new(green.into(), Level::Low, OutputConfig::default()),
            blue: Output::new(blue.into(), Level::Low, OutputConfig::default()),
        }
    }
}

impl StatusLed for RgbLed<'_> {
    fn set_color(&mut self, color: RgbColor) {
        let (r, g, b) = color.channels();
        self.red.set_level(r.into());
        self.green.set_level(g.into());
        self.blue.set_level(b.into());
    }
}

/// Mode strap: jumper to ground selects the access point.
pub struct ModeStrap<'a> {
    pin: Input<'a>,
}

impl<'a> ModeStrap<'a> {
    pub fn new<P: Into<AnyPin<'a>>>(pin: P) -> Self {
        let pin = Input::new(pin.into(), InputConfig::default().with_pull(Pull::Up));
        Self { pin }
    }

    pub fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

pub struct Bme280Sensor<'a> {
    dev: BME280<I2c<'a, Blocking>>,
    delay: Delay,
    ready: bool,
}

impl<'a> Bme280Sensor<'a> {
    pub fn new<SDA, SCL>(i2c_periph: I2C0<'a>, sda: SDA, scl: SCL) -> Result<Self, ConfigError>
    where
        SDA: Into<AnyPin<'a>>,
        SCL: Into<AnyPin<'a>>,
    {
        let i2c = I2c::new(
            i2c_periph,
            I2cConfig::default().with_frequency(Rate::from_khz(SENSOR_I2C_KHZ)),
        )?
        .with_sda(sda.into())
        .with_scl(scl.into());

        // SDO tied low: 0x76
        Ok(Self {
            dev: BME280::new_primary(i2c),
            delay: Delay::new(),
            ready: false,
        })
    }
}

impl EnvironmentSensor for Bme280Sensor<'_> {
    fn init(&mut self) -> Result<(), SensorError> {
        self.dev.init(&mut self.delay).map_err(|e| {
            warn!("bme280: init failed: {:?}", e);
            SensorError::Bus
        })?;
        self.ready = true;
        info!("bme280: ready");
        Ok(())
    }

    fn read(&mut self) -> Result<SensorReading, SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialized);
        }
        let m = self.dev.measure(&mut self.delay).map_err(|e| {
            warn!("bme280: measure failed: {:?}", e);
            SensorError::Bus
        })?;
        Ok(SensorReading {
            temperature: m.temperature,
            humidity: m.humidity,
            // Pa
            pressure: m.pressure / 100.0,
        })
    }
}
