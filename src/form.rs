//! Query-string form handling for the settings pages
//!
//! Browsers submit the forms with GET, so every value arrives URL encoded in
//! the query string. Parsing validates the whole submission before anything
//! is handed back; a rejected submission never mutates the configuration.

use core::fmt;

use heapless::{String, Vec};

use crate::model::{
    bounded, DeviceName, OutputFormat, Passphrase, RuntimeConfig, Ssid, TempUnit, PASS_MAX_LEN,
    PASS_MIN_LEN, POLL_INTERVAL_MAX, POLL_INTERVAL_MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    NoParameters,
    Invalid,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::NoParameters => f.write_str("no parameters"),
            FormError::Invalid => f.write_str("invalid parameters"),
        }
    }
}

/// `key=value` pairs of a query string. A bare `key` yields an empty value.
pub fn params(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
}

/// Value of the last occurrence of `key`.
pub fn param<'q>(query: &'q str, key: &str) -> Option<&'q str> {
    params(query).filter(|(k, _)| *k == key).map(|(_, v)| v).last()
}

/// Decode `+` and `%XX` escapes into `out`. Returns `false` when the
/// decoded value did not fit. Malformed escapes are kept literally.
fn decode_bytes<const N: usize>(raw: &str, out: &mut Vec<u8, N>) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = match bytes[i] {
            b'+' => b' ',
            b'%' => {
                match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        i += 2;
                        hi << 4 | lo
                    }
                    _ => b'%',
                }
            }
            other => other,
        };
        if out.push(b).is_err() {
            return false;
        }
        i += 1;
    }
    true
}

/// Decode `+` and `%XX` escapes, truncating to `N` bytes on a character
/// boundary.
///
/// Escapes that decode to bytes which are not UTF-8 are
/// [`FormError::Invalid`]; only a character split by the capacity limit is
/// dropped.
pub fn url_decode<const N: usize>(raw: &str) -> Result<String<N>, FormError> {
    let mut out: Vec<u8, N> = Vec::new();
    let complete = decode_bytes(raw, &mut out);
    match core::str::from_utf8(&out) {
        Ok(text) => Ok(bounded(text)),
        Err(e) if !complete && e.error_len().is_none() => {
            let text = core::str::from_utf8(&out[..e.valid_up_to()]).map_err(|_| FormError::Invalid)?;
            Ok(bounded(text))
        }
        Err(_) => Err(FormError::Invalid),
    }
}

/// Decode the `pwd` field without any truncation. Over-long or non-ASCII
/// input is [`FormError::Invalid`] before the length rules run.
fn decode_password(raw: &str) -> Result<PasswordCheck, FormError> {
    let mut out: Vec<u8, { PASS_MAX_LEN + 1 }> = Vec::new();
    if !decode_bytes(raw, &mut out) {
        return Err(FormError::Invalid);
    }
    let text = core::str::from_utf8(&out).map_err(|_| FormError::Invalid)?;
    Ok(check_wifi_password(text))
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match b? {
        c @ b'0'..=b'9' => Some(c - b'0'),
        c @ b'a'..=b'f' => Some(c - b'a' + 10),
        c @ b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    /// Empty field: keep the stored passphrase.
    NotChanged,
    Invalid,
    Valid,
}

pub fn check_wifi_password(password: &str) -> PasswordCheck {
    if password.is_empty() {
        return PasswordCheck::NotChanged;
    }
    if !(PASS_MIN_LEN..=PASS_MAX_LEN).contains(&password.len()) {
        return PasswordCheck::Invalid;
    }
    if !password.bytes().all(|b| (b' '..=b'~').contains(&b)) {
        return PasswordCheck::Invalid;
    }
    PasswordCheck::Valid
}

/// A fully validated Wi-Fi/display settings submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub ssid: Ssid,
    /// `None` keeps the current passphrase.
    pub password: Option<Passphrase>,
    pub device_name: DeviceName,
    pub unit: TempUnit,
    pub format: OutputFormat,
}

impl SettingsUpdate {
    pub fn apply(self, config: &mut RuntimeConfig) {
        config.net.ssid = self.ssid;
        if let Some(password) = self.password {
            config.net.password = password;
        }
        config.net.device_name = self.device_name;
        config.settings.set_unit(self.unit);
        config.settings.set_format(self.format);
    }
}

const SETTINGS_KEYS: [&str; 5] = ["ssid", "pwd", "devname", "scale", "oform"];

/// Parse `ssid`, `pwd`, `devname`, `scale` and `oform`.
///
/// No query, or none of the keys present, is [`FormError::NoParameters`].
/// A partial key set or any bad value is [`FormError::Invalid`].
pub fn parse_settings(query: Option<&str>) -> Result<SettingsUpdate, FormError> {
    let query = query.ok_or(FormError::NoParameters)?;
    if !params(query).any(|(k, _)| SETTINGS_KEYS.contains(&k)) {
        return Err(FormError::NoParameters);
    }

    let field = |key| param(query, key).ok_or(FormError::Invalid);
    let ssid = field("ssid")?;
    let pwd = field("pwd")?;
    let devname = field("devname")?;
    let scale = field("scale")?;
    let oform = field("oform")?;

    let password = match decode_password(pwd)? {
        PasswordCheck::NotChanged => None,
        PasswordCheck::Invalid => return Err(FormError::Invalid),
        PasswordCheck::Valid => Some(url_decode(pwd)?),
    };

    let unit = match scale {
        "C" => TempUnit::Celsius,
        "F" => TempUnit::Fahrenheit,
        _ => return Err(FormError::Invalid),
    };
    let format = match oform {
        "CSV" => OutputFormat::Csv,
        "TXT" => OutputFormat::Txt,
        _ => return Err(FormError::Invalid),
    };

    Ok(SettingsUpdate {
        ssid: url_decode(ssid)?,
        password,
        device_name: url_decode(devname)?,
        unit,
        format,
    })
}

/// Parse the `ptime` field of the advanced form; accepts 1..=63 seconds.
pub fn parse_poll_interval(query: Option<&str>) -> Result<u8, FormError> {
    let query = query.ok_or(FormError::NoParameters)?;
    if params(query).next().is_none() {
        return Err(FormError::NoParameters);
    }
    let raw = param(query, "ptime").ok_or(FormError::Invalid)?;
    let secs: u8 = raw.trim().parse().map_err(|_| FormError::Invalid)?;
    if !(POLL_INTERVAL_MIN..=POLL_INTERVAL_MAX).contains(&secs) {
        return Err(FormError::Invalid);
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DEVICE_NAME_MAX_LEN, SSID_MAX_LEN};

    #[test]
    fn query_pairs() {
        let pairs: std::vec::Vec<_> = params("a=1&&b=&c").collect();
        assert_eq!(pairs, [("a", "1"), ("b", ""), ("c", "")]);
        assert_eq!(param("x=1&x=2", "x"), Some("2"));
        assert_eq!(param("x=1", "y"), None);
    }

    #[test]
    fn device_name_decoding() {
        let s: DeviceName = url_decode("My%20Sensor").unwrap();
        assert_eq!(s, "My Sensor");
        let s: DeviceName = url_decode("My+Sensor").unwrap();
        assert_eq!(s, "My Sensor");
        let s: DeviceName = url_decode("50%25+off%2").unwrap();
        assert_eq!(s, "50% off%2");
        let s: DeviceName = url_decode("caf%C3%A9").unwrap();
        assert_eq!(s, "café");
    }

    #[test]
    fn non_utf8_escapes_are_rejected() {
        assert_eq!(url_decode::<31>("Caf%E9+Bar"), Err(FormError::Invalid));
        assert_eq!(url_decode::<31>("%FF"), Err(FormError::Invalid));
        // A lead byte with nothing after it is malformed, not a capacity cut.
        assert_eq!(url_decode::<31>("Caf%C3"), Err(FormError::Invalid));
    }

    #[test]
    fn decoding_truncates_at_capacity() {
        let long = "x".repeat(DEVICE_NAME_MAX_LEN + 5);
        let s: DeviceName = url_decode(&long).unwrap();
        assert_eq!(s.len(), DEVICE_NAME_MAX_LEN);

        // A multi-byte character cut by the limit is dropped whole.
        let mut raw = "y".repeat(DEVICE_NAME_MAX_LEN - 1);
        raw.push_str("%C3%A9");
        let s: DeviceName = url_decode(&raw).unwrap();
        assert_eq!(s.len(), DEVICE_NAME_MAX_LEN - 1);
    }

    #[test]
    fn password_rules() {
        assert_eq!(check_wifi_password(""), PasswordCheck::NotChanged);
        assert_eq!(check_wifi_password("1234567"), PasswordCheck::Invalid);
        assert_eq!(check_wifi_password("12345678"), PasswordCheck::Valid);
        assert_eq!(check_wifi_password(&"a".repeat(64)), PasswordCheck::Valid);
        assert_eq!(check_wifi_password(&"a".repeat(65)), PasswordCheck::Invalid);
        assert_eq!(check_wifi_password("pass\tword"), PasswordCheck::Invalid);
        assert_eq!(check_wifi_password("päss-word"), PasswordCheck::Invalid);
        assert_eq!(check_wifi_password("with space~ok"), PasswordCheck::Valid);
    }

    #[test]
    fn settings_submission_is_parsed() {
        let update = parse_settings(Some(
            "ssid=Home+Net&pwd=secret123&devname=My%20Sensor&scale=F&oform=TXT",
        ))
        .unwrap();
        assert_eq!(update.ssid, "Home Net");
        assert_eq!(update.password.as_deref(), Some("secret123"));
        assert_eq!(update.device_name, "My Sensor");
        assert_eq!(update.unit, TempUnit::Fahrenheit);
        assert_eq!(update.format, OutputFormat::Txt);

        let mut rt = RuntimeConfig::default();
        rt.net.password = bounded("oldpassword");
        update.apply(&mut rt);
        assert_eq!(rt.net.password, "secret123");
        assert_eq!(rt.settings.unit(), TempUnit::Fahrenheit);
    }

    #[test]
    fn empty_password_keeps_the_old_one() {
        let update =
            parse_settings(Some("ssid=Net&pwd=&devname=N&scale=C&oform=CSV")).unwrap();
        assert_eq!(update.password, None);
        let mut rt = RuntimeConfig::default();
        rt.net.password = bounded("oldpassword");
        update.apply(&mut rt);
        assert_eq!(rt.net.password, "oldpassword");
    }

    #[test]
    fn settings_rejections() {
        assert_eq!(parse_settings(None), Err(FormError::NoParameters));
        assert_eq!(parse_settings(Some("")), Err(FormError::NoParameters));
        assert_eq!(parse_settings(Some("foo=bar")), Err(FormError::NoParameters));
        assert_eq!(parse_settings(Some("ssid=Net&pwd=")), Err(FormError::Invalid));
        assert_eq!(
            parse_settings(Some("ssid=Net&pwd=short&devname=N&scale=C&oform=CSV")),
            Err(FormError::Invalid)
        );
        assert_eq!(
            parse_settings(Some("ssid=Net&pwd=&devname=N&scale=K&oform=CSV")),
            Err(FormError::Invalid)
        );
        assert_eq!(
            parse_settings(Some("ssid=Net&pwd=&devname=N&scale=C&oform=XML")),
            Err(FormError::Invalid)
        );
        let long_pwd = std::format!(
            "ssid=Net&pwd={}&devname=N&scale=C&oform=CSV",
            "a".repeat(65)
        );
        assert_eq!(parse_settings(Some(&long_pwd)), Err(FormError::Invalid));
    }

    #[test]
    fn undecodable_fields_reject_the_submission() {
        for q in [
            "ssid=Net&pwd=abcdefgh%FF&devname=N&scale=C&oform=CSV",
            "ssid=Net&pwd=%FF%FE&devname=N&scale=C&oform=CSV",
            "ssid=Net&pwd=abcdefgh%7F&devname=N&scale=C&oform=CSV",
            "ssid=Net&pwd=&devname=Caf%E9+Bar&scale=C&oform=CSV",
            "ssid=Caf%E9&pwd=&devname=N&scale=C&oform=CSV",
        ] {
            assert_eq!(parse_settings(Some(q)), Err(FormError::Invalid), "{}", q);
        }
    }

    #[test]
    fn password_is_never_cut_to_fit() {
        // 64 printable bytes followed by a two-byte character.
        let q = std::format!(
            "ssid=Net&pwd={}%C3%A9&devname=N&scale=C&oform=CSV",
            "a".repeat(64)
        );
        assert_eq!(parse_settings(Some(&q)), Err(FormError::Invalid));

        let q = std::format!(
            "ssid=Net&pwd={}&devname=N&scale=C&oform=CSV",
            "%41".repeat(64)
        );
        let update = parse_settings(Some(&q)).unwrap();
        assert_eq!(update.password.as_deref(), Some("A".repeat(64).as_str()));
    }

    #[test]
    fn long_ssid_is_truncated() {
        let q = std::format!(
            "ssid={}&pwd=&devname=N&scale=C&oform=CSV",
            "s".repeat(SSID_MAX_LEN + 8)
        );
        assert_eq!(parse_settings(Some(&q)).unwrap().ssid.len(), SSID_MAX_LEN);
    }

    #[test]
    fn poll_interval_bounds() {
        assert_eq!(parse_poll_interval(Some("ptime=1")), Ok(1));
        assert_eq!(parse_poll_interval(Some("ptime=63")), Ok(63));
        assert_eq!(parse_poll_interval(Some("ptime=0")), Err(FormError::Invalid));
        assert_eq!(parse_poll_interval(Some("ptime=64")), Err(FormError::Invalid));
        assert_eq!(parse_poll_interval(Some("ptime=300")), Err(FormError::Invalid));
        assert_eq!(parse_poll_interval(Some("ptime=abc")), Err(FormError::Invalid));
        assert_eq!(parse_poll_interval(Some("other=5")), Err(FormError::Invalid));
        assert_eq!(parse_poll_interval(Some("")), Err(FormError::NoParameters));
        assert_eq!(parse_poll_interval(None), Err(FormError::NoParameters));
    }
}
