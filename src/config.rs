//! EEPROM-resident configuration record and the boot load policy

use core::fmt;

use log::{info, warn};

use crate::eeprom::EepromError;
use crate::model::{
    bounded, DeviceName, Passphrase, RuntimeConfig, Settings, Ssid, Threshold, ThresholdSet,
    Thresholds, Trigger, DEVICE_NAME_MAX_LEN, PASS_MAX_LEN, SSID_MAX_LEN,
};
use crate::traits::ByteStore;

pub const CONFIG_BASE_ADDR: u16 = 0x0000;
pub const CONFIG_SIGNATURE: [u8; SIGNATURE_LEN] = *b"WifiLightThermo\0";
pub const SIGNATURE_LEN: usize = 16;

// String fields carry one extra byte so a NUL always follows the text.
const DEVNAME_FIELD_LEN: usize = DEVICE_NAME_MAX_LEN + 1;
const SSID_FIELD_LEN: usize = SSID_MAX_LEN + 1;
const PASS_FIELD_LEN: usize = PASS_MAX_LEN + 1;
const THRESHOLD_LEN: usize = 5;

// Layout:
// 0..16     signature
// 16..48    device name (NUL padded)
// 48..81    ssid        (NUL padded)
// 81..146   passphrase  (NUL padded)
// 146..148  settings    (u16 LE)
// 148..178  thresholds  high{t,h,p} low{t,h,p}, each f32 LE + trigger u8
const OFF_SIGNATURE: usize = 0;
const OFF_DEVNAME: usize = OFF_SIGNATURE + SIGNATURE_LEN;
const OFF_SSID: usize = OFF_DEVNAME + DEVNAME_FIELD_LEN;
const OFF_PASS: usize = OFF_SSID + SSID_FIELD_LEN;
const OFF_SETTINGS: usize = OFF_PASS + PASS_FIELD_LEN;
const OFF_THRESHOLDS: usize = OFF_SETTINGS + 2;

pub const RECORD_LEN: usize = OFF_THRESHOLDS + 6 * THRESHOLD_LEN;

/// Station credentials baked in at build time, used only for factory defaults.
const BUILD_WIFI_SSID: Option<&str> = option_env!("WLT_WIFI_SSID");
const BUILD_WIFI_PASS: Option<&str> = option_env!("WLT_WIFI_PASS");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    Persistence(EepromError),
    /// Signature mismatch.
    Integrity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Persistence(e) => write!(f, "config persistence: {}", e),
            ConfigError::Integrity => f.write_str("config signature mismatch"),
        }
    }
}

impl From<EepromError> for ConfigError {
    fn from(e: EepromError) -> Self {
        ConfigError::Persistence(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedConfigRecord {
    pub signature: [u8; SIGNATURE_LEN],
    pub device_name: DeviceName,
    pub ssid: Ssid,
    pub password: Passphrase,
    pub settings: Settings,
    pub thresholds: Thresholds,
}

impl PersistedConfigRecord {
    pub fn is_signature_valid(&self) -> bool {
        self.signature == CONFIG_SIGNATURE
    }

    /// Copy the persisted fields into `runtime`. Addressing, mode and the
    /// last reading are left alone.
    pub fn apply_to_runtime(&self, runtime: &mut RuntimeConfig) {
        runtime.net.device_name = self.device_name.clone();
        runtime.net.ssid = self.ssid.clone();
        runtime.net.password = self.password.clone();
        runtime.settings = self.settings;
        runtime.thresholds = self.thresholds;
    }

    /// Snapshot `runtime` as a save-ready record. The runtime-only flags are
    /// always written as "not available / not valid".
    pub fn capture_from_runtime(runtime: &RuntimeConfig) -> Self {
        let mut settings = runtime.settings;
        settings.clear_runtime_flags();
        Self {
            signature: CONFIG_SIGNATURE,
            device_name: runtime.net.device_name.clone(),
            ssid: runtime.net.ssid.clone(),
            password: runtime.net.password.clone(),
            settings,
            thresholds: runtime.thresholds,
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[OFF_SIGNATURE..OFF_DEVNAME].copy_from_slice(&self.signature);
        put_str(&mut out[OFF_DEVNAME..OFF_SSID], &self.device_name);
        put_str(&mut out[OFF_SSID..OFF_PASS], &self.ssid);
        put_str(&mut out[OFF_PASS..OFF_SETTINGS], &self.password);
        out[OFF_SETTINGS..OFF_THRESHOLDS].copy_from_slice(&self.settings.bits().to_le_bytes());

        let t = &self.thresholds;
        let entries = [
            t.high.temperature,
            t.high.humidity,
            t.high.pressure,
            t.low.temperature,
            t.low.humidity,
            t.low.pressure,
        ];
        for (i, entry) in entries.iter().enumerate() {
            let dst = OFF_THRESHOLDS + i * THRESHOLD_LEN;
            out[dst..dst + 4].copy_from_slice(&entry.value.to_le_bytes());
            out[dst + 4] = entry.trigger.as_u8();
        }
        out
    }

    /// Decode without validating; check [`is_signature_valid`](Self::is_signature_valid).
    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[OFF_SIGNATURE..OFF_DEVNAME]);

        let threshold = |i: usize| {
            let src = OFF_THRESHOLDS + i * THRESHOLD_LEN;
            Threshold {
                value: f32::from_le_bytes([
                    bytes[src],
                    bytes[src + 1],
                    bytes[src + 2],
                    bytes[src + 3],
                ]),
                trigger: Trigger::from_u8(bytes[src + 4]),
            }
        };

        Self {
            signature,
            device_name: get_str(&bytes[OFF_DEVNAME..OFF_SSID]),
            ssid: get_str(&bytes[OFF_SSID..OFF_PASS]),
            password: get_str(&bytes[OFF_PASS..OFF_SETTINGS]),
            settings: Settings::from_bits(u16::from_le_bytes([
                bytes[OFF_SETTINGS],
                bytes[OFF_SETTINGS + 1],
            ])),
            thresholds: Thresholds {
                high: ThresholdSet {
                    temperature: threshold(0),
                    humidity: threshold(1),
                    pressure: threshold(2),
                },
                low: ThresholdSet {
                    temperature: threshold(3),
                    humidity: threshold(4),
                    pressure: threshold(5),
                },
            },
        }
    }
}

/// Compiled-in configuration used whenever no valid record exists.
pub fn factory_defaults() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    if let Some(ssid) = BUILD_WIFI_SSID {
        config.net.ssid = bounded(ssid);
    }
    if let Some(pass) = BUILD_WIFI_PASS {
        config.net.password = bounded(pass);
    }
    config
}

pub fn load<S: ByteStore>(store: &mut S) -> Result<PersistedConfigRecord, ConfigError> {
    let mut raw = [0u8; RECORD_LEN];
    store.read(CONFIG_BASE_ADDR, &mut raw)?;
    let record = PersistedConfigRecord::from_bytes(&raw);
    if !record.is_signature_valid() {
        return Err(ConfigError::Integrity);
    }
    Ok(record)
}

/// One-shot: failures are logged and returned, nothing is retried.
pub fn save<S: ByteStore>(store: &mut S, record: &PersistedConfigRecord) -> Result<(), ConfigError> {
    store
        .write(CONFIG_BASE_ADDR, &record.to_bytes())
        .map_err(|e| {
            warn!("config: save failed: {}", e);
            ConfigError::Persistence(e)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Stored,
    /// No valid record was found; defaults were installed and written back.
    Defaults,
}

/// Boot-time load.
///
/// A signature mismatch is read again once. If the record is still invalid
/// the factory defaults are installed and written back; a failing write-back
/// is reported as [`ConfigError::Integrity`]. A transfer failure on read is
/// reported as [`ConfigError::Persistence`].
pub fn load_or_install_defaults<S: ByteStore>(
    store: &mut S,
    runtime: &mut RuntimeConfig,
) -> Result<ConfigSource, ConfigError> {
    let record = match load(store) {
        Err(ConfigError::Integrity) => {
            warn!("config: signature mismatch, reading again");
            load(store)
        }
        other => other,
    };

    match record {
        Ok(record) => {
            record.apply_to_runtime(runtime);
            info!(
                "config: loaded device '{}' ssid '{}' (pass {} chars)",
                runtime.net.device_name,
                runtime.net.ssid,
                runtime.net.password.len()
            );
            Ok(ConfigSource::Stored)
        }
        Err(ConfigError::Integrity) => {
            warn!("config: no valid record, installing defaults");
            let mode = runtime.net.mode;
            *runtime = factory_defaults();
            runtime.net.mode = mode;
            save(store, &PersistedConfigRecord::capture_from_runtime(runtime))
                .map_err(|_| ConfigError::Integrity)?;
            Ok(ConfigSource::Defaults)
        }
        Err(e) => Err(e),
    }
}

fn put_str(field: &mut [u8], s: &str) {
    // Leave the last byte of the field as the terminator.
    let len = s.len().min(field.len() - 1);
    field[..len].copy_from_slice(&s.as_bytes()[..len]);
}

fn get_str<const N: usize>(field: &[u8]) -> heapless::String<N> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = match core::str::from_utf8(&field[..end]) {
        Ok(s) => s,
        // Keep the valid prefix of a damaged field.
        Err(e) => core::str::from_utf8(&field[..e.valid_up_to()]).unwrap_or(""),
    };
    bounded(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeprom::tests::{mock_eeprom, MockBus, MockDelay};
    use crate::eeprom::Eeprom24lc256;
    use crate::model::{OutputFormat, TempUnit, WifiMode};

    fn sample_runtime() -> RuntimeConfig {
        let mut rt = RuntimeConfig::default();
        rt.net.device_name = bounded("Kitchen");
        rt.net.ssid = bounded("HomeNet");
        rt.net.password = bounded("correct horse");
        rt.settings.set_unit(TempUnit::Fahrenheit);
        rt.settings.set_format(OutputFormat::Txt);
        rt.settings.set_poll_interval(12);
        rt.thresholds.high.temperature = Threshold {
            value: 28.5,
            trigger: Trigger::High,
        };
        rt.thresholds.low.humidity = Threshold {
            value: 25.0,
            trigger: Trigger::Both,
        };
        rt
    }

    #[test]
    fn record_layout_is_fixed() {
        assert_eq!(RECORD_LEN, 178);
        let record = PersistedConfigRecord::capture_from_runtime(&sample_runtime());
        let bytes = record.to_bytes();
        assert_eq!(&bytes[..16], b"WifiLightThermo\0");
        assert_eq!(&bytes[16..23], b"Kitchen");
        assert_eq!(bytes[23], 0);
        let settings = u16::from_le_bytes([bytes[146], bytes[147]]);
        assert_eq!(settings, record.settings.bits());
        assert_eq!(&bytes[148..152], &28.5f32.to_le_bytes());
        assert_eq!(bytes[152], Trigger::High.as_u8());
    }

    #[test]
    fn bytes_roundtrip() {
        let record = PersistedConfigRecord::capture_from_runtime(&sample_runtime());
        let decoded = PersistedConfigRecord::from_bytes(&record.to_bytes());
        assert_eq!(decoded, record);
        assert!(decoded.is_signature_valid());
    }

    #[test]
    fn capture_after_apply_forces_runtime_flags_off() {
        let mut record = PersistedConfigRecord::capture_from_runtime(&sample_runtime());
        record.settings.set_sensor_available(true);
        record.settings.set_data_valid(true);

        let mut rt = RuntimeConfig::default();
        record.apply_to_runtime(&mut rt);
        // Copied verbatim on the way in.
        assert!(rt.settings.sensor_available());

        let back = PersistedConfigRecord::capture_from_runtime(&rt);
        assert!(!back.settings.sensor_available());
        assert!(!back.settings.data_valid());

        let mut expected = record.clone();
        expected.settings.clear_runtime_flags();
        assert_eq!(back, expected);
    }

    #[test]
    fn any_signature_byte_flip_invalidates() {
        let record = PersistedConfigRecord::capture_from_runtime(&sample_runtime());
        let bytes = record.to_bytes();
        for i in 0..SIGNATURE_LEN {
            let mut corrupted = bytes;
            corrupted[i] ^= 0x01;
            assert!(!PersistedConfigRecord::from_bytes(&corrupted).is_signature_valid());
        }
    }

    #[test]
    fn full_length_strings_keep_a_terminator() {
        let mut rt = RuntimeConfig::default();
        rt.net.device_name = bounded(&"n".repeat(40));
        rt.net.ssid = bounded(&"s".repeat(SSID_MAX_LEN));
        rt.net.password = bounded(&"p".repeat(PASS_MAX_LEN));
        assert_eq!(rt.net.device_name.len(), DEVICE_NAME_MAX_LEN);

        let bytes = PersistedConfigRecord::capture_from_runtime(&rt).to_bytes();
        assert_eq!(bytes[OFF_SSID - 1], 0);
        assert_eq!(bytes[OFF_PASS - 1], 0);
        assert_eq!(bytes[OFF_SETTINGS - 1], 0);

        let decoded = PersistedConfigRecord::from_bytes(&bytes);
        assert_eq!(decoded.ssid.len(), SSID_MAX_LEN);
        assert_eq!(decoded.password.len(), PASS_MAX_LEN);
    }

    #[test]
    fn save_then_load_through_eeprom() {
        let mut eeprom = mock_eeprom();
        let record = PersistedConfigRecord::capture_from_runtime(&sample_runtime());
        save(&mut eeprom, &record).unwrap();
        assert_eq!(load(&mut eeprom).unwrap(), record);
    }

    #[test]
    fn blank_eeprom_installs_and_writes_defaults() {
        let mut eeprom = mock_eeprom();
        let mut rt = RuntimeConfig::default();
        rt.net.mode = WifiMode::AccessPoint;

        let source = load_or_install_defaults(&mut eeprom, &mut rt).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(rt.net.mode, WifiMode::AccessPoint);
        assert_eq!(rt.settings.poll_interval(), 30);
        assert_eq!(rt.net.device_name, "WiFi Sensor");

        let stored = load(&mut eeprom).unwrap();
        assert_eq!(stored.device_name, "WiFi Sensor");
        assert_eq!(stored.settings, Settings::default());
    }

    #[test]
    fn stored_record_is_applied() {
        let mut eeprom = mock_eeprom();
        let record = PersistedConfigRecord::capture_from_runtime(&sample_runtime());
        save(&mut eeprom, &record).unwrap();

        let mut rt = RuntimeConfig::default();
        let source = load_or_install_defaults(&mut eeprom, &mut rt).unwrap();
        assert_eq!(source, ConfigSource::Stored);
        assert_eq!(rt.net.ssid, "HomeNet");
        assert_eq!(rt.settings.poll_interval(), 12);
        assert_eq!(rt.thresholds.low.humidity.trigger, Trigger::Both);
    }

    #[test]
    fn read_failure_is_a_persistence_error() {
        let mut bus = MockBus::new();
        bus.fail = true;
        let mut eeprom = Eeprom24lc256::new(bus, MockDelay::default());
        let mut rt = RuntimeConfig::default();
        assert_eq!(
            load_or_install_defaults(&mut eeprom, &mut rt),
            Err(ConfigError::Persistence(EepromError::Transfer))
        );
    }

    /// Reads succeed, writes fail.
    struct ReadOnlyStore;

    impl ByteStore for ReadOnlyStore {
        fn read(&mut self, _addr: u16, buf: &mut [u8]) -> Result<(), EepromError> {
            buf.fill(0xFF);
            Ok(())
        }

        fn write(&mut self, _addr: u16, _data: &[u8]) -> Result<(), EepromError> {
            Err(EepromError::Transfer)
        }
    }

    #[test]
    fn failed_default_write_back_is_an_integrity_error() {
        let mut rt = RuntimeConfig::default();
        assert_eq!(
            load_or_install_defaults(&mut ReadOnlyStore, &mut rt),
            Err(ConfigError::Integrity)
        );
    }
}
