// Model of the data kept by the node at run time

use core::net::Ipv4Addr;

use heapless::String;

pub const DEVICE_NAME_MAX_LEN: usize = 31;
pub const SSID_MAX_LEN: usize = 32;
pub const PASS_MAX_LEN: usize = 64;
pub const PASS_MIN_LEN: usize = 8;

pub const DEFAULT_DEVICE_NAME: &str = "WiFi Sensor";

pub const POLL_INTERVAL_MIN: u8 = 1;
pub const POLL_INTERVAL_MAX: u8 = 63;
pub const POLL_INTERVAL_DEFAULT: u8 = 30;
pub const HYSTERESIS_MAX: u8 = 7;
pub const HYSTERESIS_DEFAULT: u8 = 3;

pub type DeviceName = String<DEVICE_NAME_MAX_LEN>;
pub type Ssid = String<SSID_MAX_LEN>;
pub type Passphrase = String<PASS_MAX_LEN>;

/// Copy `src` into a bounded string, dropping whatever does not fit.
///
/// Truncation happens on a character boundary so the result is always valid
/// UTF-8 and never longer than `N` bytes.
pub fn bounded<const N: usize>(src: &str) -> String<N> {
    let mut out = String::new();
    for ch in src.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    Station,
    AccessPoint,
}

impl WifiMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            WifiMode::Station => "STA",
            WifiMode::AccessPoint => "AP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub device_name: DeviceName,
    pub mode: WifiMode,
    pub ssid: Ssid,
    /// Never rendered back to a client.
    pub password: Passphrase,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            device_name: bounded(DEFAULT_DEVICE_NAME),
            mode: WifiMode::Station,
            ssid: String::new(),
            password: String::new(),
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl NetworkConfig {
    /// Record the address the stack obtained. Only a station records it;
    /// in AP mode the fields are left as they were and `false` is returned.
    pub fn record_station_address(
        &mut self,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
    ) -> bool {
        if self.mode != WifiMode::Station {
            return false;
        }
        self.ip = ip;
        self.netmask = netmask;
        self.gateway = gateway;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempUnit {
    Celsius,
    Fahrenheit,
}

impl TempUnit {
    /// Convert a Celsius reading into this unit.
    pub fn convert(self, celsius: f32) -> f32 {
        match self {
            TempUnit::Celsius => celsius,
            TempUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
        }
    }

    pub const fn letter(self) -> &'static str {
        match self {
            TempUnit::Celsius => "C",
            TempUnit::Fahrenheit => "F",
        }
    }

    pub const fn html_symbol(self) -> &'static str {
        match self {
            TempUnit::Celsius => "&deg;C",
            TempUnit::Fahrenheit => "&deg;F",
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Txt,
}

impl OutputFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Csv => "CSV",
            OutputFormat::Txt => "TXT",
        }
    }
}

/// Packed option word, persisted as-is.
///
/// | bits  | field                                   |
/// |-------|-----------------------------------------|
/// | 0     | temperature unit (0 = C, 1 = F)         |
/// | 1     | output format (0 = CSV, 1 = TXT)        |
/// | 2..8  | poll interval in seconds                |
/// | 8..11 | trigger hysteresis (consecutive reads)  |
/// | 11    | sensor available (runtime only)         |
/// | 12    | last reading valid (runtime only)       |
/// | 13..16| reserved                                |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings(u16);

impl Settings {
    const UNIT_BIT: u16 = 1 << 0;
    const FORMAT_BIT: u16 = 1 << 1;
    const POLL_SHIFT: u16 = 2;
    const POLL_MASK: u16 = 0x3F;
    const HYST_SHIFT: u16 = 8;
    const HYST_MASK: u16 = 0x07;
    const SENSOR_BIT: u16 = 1 << 11;
    const VALID_BIT: u16 = 1 << 12;

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    fn set_flag(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn unit(self) -> TempUnit {
        if self.0 & Self::UNIT_BIT == 0 {
            TempUnit::Celsius
        } else {
            TempUnit::Fahrenheit
        }
    }

    pub fn set_unit(&mut self, unit: TempUnit) {
        self.set_flag(Self::UNIT_BIT, unit == TempUnit::Fahrenheit);
    }

    pub fn format(self) -> OutputFormat {
        if self.0 & Self::FORMAT_BIT == 0 {
            OutputFormat::Csv
        } else {
            OutputFormat::Txt
        }
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.set_flag(Self::FORMAT_BIT, format == OutputFormat::Txt);
    }

    pub fn poll_interval(self) -> u8 {
        ((self.0 >> Self::POLL_SHIFT) & Self::POLL_MASK) as u8
    }

    /// Returns `false` and leaves the field untouched when `secs` is outside
    /// `POLL_INTERVAL_MIN..=POLL_INTERVAL_MAX`.
    pub fn set_poll_interval(&mut self, secs: u8) -> bool {
        if !(POLL_INTERVAL_MIN..=POLL_INTERVAL_MAX).contains(&secs) {
            return false;
        }
        self.0 &= !(Self::POLL_MASK << Self::POLL_SHIFT);
        self.0 |= (secs as u16) << Self::POLL_SHIFT;
        true
    }

    pub fn hysteresis(self) -> u8 {
        ((self.0 >> Self::HYST_SHIFT) & Self::HYST_MASK) as u8
    }

    pub fn set_hysteresis(&mut self, count: u8) {
        let count = count.min(HYSTERESIS_MAX) as u16;
        self.0 &= !(Self::HYST_MASK << Self::HYST_SHIFT);
        self.0 |= count << Self::HYST_SHIFT;
    }

    pub fn sensor_available(self) -> bool {
        self.0 & Self::SENSOR_BIT != 0
    }

    pub fn set_sensor_available(&mut self, on: bool) {
        self.set_flag(Self::SENSOR_BIT, on);
    }

    pub fn data_valid(self) -> bool {
        self.0 & Self::VALID_BIT != 0
    }

    pub fn set_data_valid(&mut self, on: bool) {
        self.set_flag(Self::VALID_BIT, on);
    }

    /// Force the runtime-only flags to "not available / not valid".
    pub fn clear_runtime_flags(&mut self) {
        self.set_flag(Self::SENSOR_BIT, false);
        self.set_flag(Self::VALID_BIT, false);
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Settings(0);
        settings.set_unit(TempUnit::Celsius);
        settings.set_format(OutputFormat::Csv);
        settings.set_poll_interval(POLL_INTERVAL_DEFAULT);
        settings.set_hysteresis(HYSTERESIS_DEFAULT);
        settings
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    None = 0,
    High = 1,
    Low = 2,
    Both = 3,
}

impl Trigger {
    /// Unknown codes decode as `None`.
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Trigger::High,
            2 => Trigger::Low,
            3 => Trigger::Both,
            _ => Trigger::None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn code(self) -> &'static str {
        match self {
            Trigger::High => "H",
            Trigger::Low => "L",
            Trigger::Both => "B",
            Trigger::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub value: f32,
    pub trigger: Trigger,
}

impl Threshold {
    pub const fn new(value: f32) -> Self {
        Self {
            value,
            trigger: Trigger::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSet {
    pub temperature: Threshold,
    pub humidity: Threshold,
    /// Reserved: the fitted sensor reports pressure but nothing consumes it.
    pub pressure: Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub high: ThresholdSet,
    pub low: ThresholdSet,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: ThresholdSet {
                temperature: Threshold::new(30.0),
                humidity: Threshold::new(70.0),
                pressure: Threshold::new(1020.0),
            },
            low: ThresholdSet {
                temperature: Threshold::new(15.0),
                humidity: Threshold::new(30.0),
                pressure: Threshold::new(980.0),
            },
        }
    }
}

/// Last values delivered by the sensor, temperature in Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuntimeConfig {
    pub net: NetworkConfig,
    pub reading: SensorReading,
    pub settings: Settings,
    pub thresholds: Thresholds,
}

/// The single mutable state shared by the request handlers and the main loop.
///
/// Handlers never touch the EEPROM; they raise a save request that the main
/// loop services between transport dispatches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeContext {
    pub config: RuntimeConfig,
    save_requested: bool,
}

impl NodeContext {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            save_requested: false,
        }
    }

    pub fn request_save(&mut self) {
        self.save_requested = true;
    }

    pub fn save_requested(&self) -> bool {
        self.save_requested
    }

    /// Returns whether a save was pending and clears the request.
    pub fn take_save_request(&mut self) -> bool {
        core::mem::replace(&mut self.save_requested, false)
    }
}
