//! RGB status LED colors and blink patterns

use core::fmt;

use crate::traits::StatusLed;

/// Half period of the failure blink (2 Hz).
pub const FAILURE_BLINK_HALF_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbColor {
    Red,
    Green,
    Blue,
    Yellow,
    Magenta,
    Cyan,
    White,
    Off,
}

impl RgbColor {
    /// `(red, green, blue)` channel states.
    pub const fn channels(self) -> (bool, bool, bool) {
        match self {
            RgbColor::Red => (true, false, false),
            RgbColor::Green => (false, true, false),
            RgbColor::Blue => (false, false, true),
            RgbColor::Yellow => (true, true, false),
            RgbColor::Magenta => (true, false, true),
            RgbColor::Cyan => (false, true, true),
            RgbColor::White => (true, true, true),
            RgbColor::Off => (false, false, false),
        }
    }
}

/// Boot failures that halt the node in a blinking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootFailure {
    EepromRead,
    /// Record still invalid after a retry and the defaults could not be stored.
    ConfigIntegrity,
    SensorAbsent,
    WifiAssociation,
    /// The mode strap read neither steadily low nor steadily high.
    ModeUndecided,
}

impl BootFailure {
    pub const fn color(self) -> RgbColor {
        match self {
            BootFailure::EepromRead => RgbColor::Red,
            BootFailure::ConfigIntegrity => RgbColor::Magenta,
            BootFailure::SensorAbsent => RgbColor::Yellow,
            BootFailure::WifiAssociation => RgbColor::White,
            BootFailure::ModeUndecided => RgbColor::Blue,
        }
    }
}

impl fmt::Display for BootFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BootFailure::EepromRead => "eeprom read failed",
            BootFailure::ConfigIntegrity => "configuration invalid",
            BootFailure::SensorAbsent => "sensor not found",
            BootFailure::WifiAssociation => "wifi association failed",
            BootFailure::ModeUndecided => "wifi mode strap undecided",
        };
        f.write_str(msg)
    }
}

/// Alternates between a color and off on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blinker {
    color: RgbColor,
    lit: bool,
}

impl Blinker {
    pub const fn new(color: RgbColor) -> Self {
        Self { color, lit: false }
    }

    pub fn color(&self) -> RgbColor {
        self.color
    }

    /// Change the color; the next tick lights it.
    pub fn set_color(&mut self, color: RgbColor) {
        self.color = color;
        self.lit = false;
    }

    pub fn tick<L: StatusLed>(&mut self, led: &mut L) {
        self.lit = !self.lit;
        led.set_color(if self.lit { self.color } else { RgbColor::Off });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingLed(Vec<RgbColor>);

    impl StatusLed for RecordingLed {
        fn set_color(&mut self, color: RgbColor) {
            self.0.push(color);
        }
    }

    #[test]
    fn mixed_colors_light_two_channels() {
        assert_eq!(RgbColor::Yellow.channels(), (true, true, false));
        assert_eq!(RgbColor::Magenta.channels(), (true, false, true));
        assert_eq!(RgbColor::Cyan.channels(), (false, true, true));
        assert_eq!(RgbColor::Off.channels(), (false, false, false));
    }

    #[test]
    fn failure_classes_have_distinct_colors() {
        let all = [
            BootFailure::EepromRead,
            BootFailure::ConfigIntegrity,
            BootFailure::SensorAbsent,
            BootFailure::WifiAssociation,
            BootFailure::ModeUndecided,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.color(), b.color());
            }
            assert_ne!(a.color(), RgbColor::Green);
            assert_ne!(a.color(), RgbColor::Cyan);
        }
    }

    #[test]
    fn blinker_alternates() {
        let mut led = RecordingLed::default();
        let mut blink = Blinker::new(RgbColor::Red);
        for _ in 0..4 {
            blink.tick(&mut led);
        }
        blink.set_color(RgbColor::Green);
        blink.tick(&mut led);
        assert_eq!(
            led.0,
            [
                RgbColor::Red,
                RgbColor::Off,
                RgbColor::Red,
                RgbColor::Off,
                RgbColor::Green
            ]
        );
    }
}
