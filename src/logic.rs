//! Main-loop logic (hardware-independent)

use log::{debug, info, warn};

use crate::config::{self, ConfigError, PersistedConfigRecord};
use crate::led::{Blinker, BootFailure, RgbColor};
use crate::model::{NodeContext, RuntimeConfig, WifiMode, POLL_INTERVAL_MIN};
use crate::traits::{ByteStore, EnvironmentSensor, StatusLed};

pub const STRAP_SAMPLES: usize = 3;
pub const STRAP_SAMPLE_INTERVAL_MS: u64 = 300;
pub const HEARTBEAT_MS: u64 = 1_000;

/// Decide the Wi-Fi mode from the strap samples (`true` = pin high).
///
/// All low selects the access point, all high selects station mode.
pub fn select_wifi_mode(samples: &[bool; STRAP_SAMPLES]) -> Result<WifiMode, BootFailure> {
    if samples.iter().all(|high| !high) {
        Ok(WifiMode::AccessPoint)
    } else if samples.iter().all(|high| *high) {
        Ok(WifiMode::Station)
    } else {
        warn!("logic: mode strap unstable {:?}", samples);
        Err(BootFailure::ModeUndecided)
    }
}

/// Take one reading. A failed read clears the valid flag so the pages show
/// the "unavailable" variant.
pub fn sample_sensor<S: EnvironmentSensor>(sensor: &mut S, config: &mut RuntimeConfig) {
    match sensor.read() {
        Ok(reading) => {
            debug!(
                "logic: T={:.2}C H={:.2}% P={:.1}hPa",
                reading.temperature, reading.humidity, reading.pressure
            );
            config.reading = reading;
            config.settings.set_data_valid(true);
        }
        Err(e) => {
            warn!("logic: {}", e);
            config.settings.set_data_valid(false);
        }
    }
}

/// Write the configuration back if a handler asked for it. A failed save is
/// logged and the in-memory edit is kept.
pub fn persist_if_requested<B: ByteStore>(
    ctx: &mut NodeContext,
    store: &mut B,
) -> Option<Result<(), ConfigError>> {
    if !ctx.take_save_request() {
        return None;
    }
    let record = PersistedConfigRecord::capture_from_runtime(&ctx.config);
    let result = config::save(store, &record);
    match result {
        Ok(()) => info!("logic: configuration saved"),
        Err(e) => warn!("logic: configuration kept in memory only ({})", e),
    }
    Some(result)
}

/// Timers of the cooperative main loop.
pub struct NodeLogic {
    next_poll_ms: u64,
    next_heartbeat_ms: u64,
    status: Blinker,
}

impl NodeLogic {
    /// `status` is the color the heartbeat blinks; the first poll is due at once.
    pub fn new(status: RgbColor) -> Self {
        Self {
            next_poll_ms: 0,
            next_heartbeat_ms: 0,
            status: Blinker::new(status),
        }
    }

    pub fn status_color(&self) -> RgbColor {
        self.status.color()
    }

    /// Whether the sensor is due at `now_ms`; schedules the next poll if so.
    pub fn poll_due(&mut self, now_ms: u64, config: &RuntimeConfig) -> bool {
        if now_ms < self.next_poll_ms {
            return false;
        }
        let secs = config.settings.poll_interval().max(POLL_INTERVAL_MIN) as u64;
        self.next_poll_ms = now_ms + secs * 1_000;
        true
    }

    pub fn heartbeat<L: StatusLed>(&mut self, now_ms: u64, led: &mut L) {
        if now_ms < self.next_heartbeat_ms {
            return;
        }
        self.next_heartbeat_ms = now_ms + HEARTBEAT_MS;
        self.status.tick(led);
    }

    /// Everything the main loop does between two network dispatches.
    pub fn housekeeping<S, B, L>(
        &mut self,
        now_ms: u64,
        ctx: &mut NodeContext,
        sensor: &mut S,
        store: &mut B,
        led: &mut L,
    ) where
        S: EnvironmentSensor,
        B: ByteStore,
        L: StatusLed,
    {
        let _ = persist_if_requested(ctx, store);
        if self.poll_due(now_ms, &ctx.config) {
            sample_sensor(sensor, &mut ctx.config);
        }
        self.heartbeat(now_ms, led);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeprom::EepromError;
    use crate::model::{bounded, SensorReading};
    use crate::traits::SensorError;
    use std::vec::Vec;

    struct ScriptedSensor {
        results: Vec<Result<SensorReading, SensorError>>,
        reads: usize,
    }

    impl EnvironmentSensor for ScriptedSensor {
        fn init(&mut self) -> Result<(), SensorError> {
            Ok(())
        }

        fn read(&mut self) -> Result<SensorReading, SensorError> {
            let r = self.results[self.reads % self.results.len()];
            self.reads += 1;
            r
        }
    }

    #[derive(Default)]
    struct MemStore {
        data: Vec<u8>,
        writes: usize,
        fail: bool,
    }

    impl ByteStore for MemStore {
        fn read(&mut self, _addr: u16, buf: &mut [u8]) -> Result<(), EepromError> {
            buf.copy_from_slice(&self.data[..buf.len()]);
            Ok(())
        }

        fn write(&mut self, _addr: u16, data: &[u8]) -> Result<(), EepromError> {
            if self.fail {
                return Err(EepromError::Transfer);
            }
            self.writes += 1;
            self.data = data.to_vec();
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingLed(usize);

    impl StatusLed for CountingLed {
        fn set_color(&mut self, _color: RgbColor) {
            self.0 += 1;
        }
    }

    const READING: SensorReading = SensorReading {
        temperature: 21.0,
        humidity: 45.0,
        pressure: 1001.0,
    };

    #[test]
    fn strap_needs_three_agreeing_samples() {
        assert_eq!(select_wifi_mode(&[false; 3]), Ok(WifiMode::AccessPoint));
        assert_eq!(select_wifi_mode(&[true; 3]), Ok(WifiMode::Station));
        assert_eq!(
            select_wifi_mode(&[true, false, true]),
            Err(BootFailure::ModeUndecided)
        );
    }

    #[test]
    fn failed_read_clears_valid_flag() {
        let mut sensor = ScriptedSensor {
            results: std::vec![Ok(READING), Err(SensorError::Bus)],
            reads: 0,
        };
        let mut config = RuntimeConfig::default();
        sample_sensor(&mut sensor, &mut config);
        assert!(config.settings.data_valid());
        assert_eq!(config.reading, READING);

        sample_sensor(&mut sensor, &mut config);
        assert!(!config.settings.data_valid());
        // Last good values are kept but no longer shown.
        assert_eq!(config.reading, READING);
    }

    #[test]
    fn poll_follows_configured_interval() {
        let mut logic = NodeLogic::new(RgbColor::Green);
        let mut config = RuntimeConfig::default();
        config.settings.set_poll_interval(10);

        assert!(logic.poll_due(0, &config));
        assert!(!logic.poll_due(9_999, &config));
        assert!(logic.poll_due(10_000, &config));

        // A zero read from a foreign record still polls at least every second.
        let config = RuntimeConfig {
            settings: crate::model::Settings::from_bits(0),
            ..RuntimeConfig::default()
        };
        let mut logic = NodeLogic::new(RgbColor::Green);
        assert!(logic.poll_due(0, &config));
        assert!(logic.poll_due(1_000, &config));
    }

    #[test]
    fn save_happens_once_per_request() {
        let mut ctx = NodeContext::default();
        let mut store = MemStore::default();
        assert!(persist_if_requested(&mut ctx, &mut store).is_none());

        ctx.config.net.device_name = bounded("Porch");
        ctx.config.settings.set_data_valid(true);
        ctx.request_save();
        assert_eq!(persist_if_requested(&mut ctx, &mut store), Some(Ok(())));
        assert!(persist_if_requested(&mut ctx, &mut store).is_none());
        assert_eq!(store.writes, 1);

        let stored = config::load(&mut store).unwrap();
        assert_eq!(stored.device_name, "Porch");
        assert!(!stored.settings.data_valid());
    }

    #[test]
    fn failed_save_keeps_the_edit() {
        let mut ctx = NodeContext::default();
        let mut store = MemStore {
            fail: true,
            ..Default::default()
        };
        ctx.config.net.device_name = bounded("Porch");
        ctx.request_save();
        assert!(matches!(
            persist_if_requested(&mut ctx, &mut store),
            Some(Err(ConfigError::Persistence(EepromError::Transfer)))
        ));
        assert_eq!(ctx.config.net.device_name, "Porch");
        assert!(!ctx.save_requested());
    }

    #[test]
    fn housekeeping_runs_every_duty() {
        let mut logic = NodeLogic::new(RgbColor::Cyan);
        let mut ctx = NodeContext::default();
        let mut sensor = ScriptedSensor {
            results: std::vec![Ok(READING)],
            reads: 0,
        };
        let mut store = MemStore::default();
        let mut led = CountingLed::default();

        ctx.request_save();
        logic.housekeeping(0, &mut ctx, &mut sensor, &mut store, &mut led);
        assert_eq!((sensor.reads, store.writes, led.0), (1, 1, 1));

        logic.housekeeping(500, &mut ctx, &mut sensor, &mut store, &mut led);
        assert_eq!((sensor.reads, store.writes, led.0), (1, 1, 1));

        logic.housekeeping(1_000, &mut ctx, &mut sensor, &mut store, &mut led);
        assert_eq!(led.0, 2);
        assert_eq!(logic.status_color(), RgbColor::Cyan);
    }
}
