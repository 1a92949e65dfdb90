//! Static fragments of the web UI
//!
//! Dynamic values are spliced in by [`crate::content`]; everything here is
//! fixed text or a fixed asset.

macro_rules! asset {
    ($name:literal) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/", $name))
    };
}

pub const STYLE_CSS: &[u8] = asset!("style.css");
pub const STYLE_INFO_CSS: &[u8] = asset!("style_info.css");
pub const FAVICON_ICO: &[u8] = asset!("favicon.ico");

pub const HEAD_START: &str = "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">\
<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\"><title>";
pub const HEAD_STYLE: &str = "</title><link rel=\"stylesheet\" href=\"/style.css\">";
pub const HEAD_STYLE_INFO: &str = "</title><link rel=\"stylesheet\" href=\"/style_info.css\">\
<script>setTimeout(()=>location.reload(),10000)</script>";
pub const BODY_START: &str = "</head><body><div class=\"box\">";
pub const PAGE_END: &str = "</div></body></html>";

pub const INFO_TITLE: &str = "Sensor info";
pub const INFO_DATA_START: &str = "<div class=\"data\"><span class=\"v\">";
pub const INFO_DATA_SEP: &str = "</span><span class=\"v\">";
pub const INFO_DATA_END: &str = " %RH</span></div><p id=\"ts\"></p>\
<script>document.getElementById('ts').textContent=new Date().toLocaleString()</script>";
pub const INFO_NOT_VALID: &str = "<p>Sensor not available or last reading not valid.</p>";

pub const SETTINGS_TITLE: &str = "Configuration";
pub const SETTINGS_FORM_START: &str = "<h2>Sensor configuration</h2>\
<form action=\"/setparams\" method=\"get\"><h3>Wi-Fi (STA mode)</h3>\
<label for=\"ssid\">SSID</label><input type=\"text\" id=\"ssid\" name=\"ssid\" value=\"";
pub const SETTINGS_FORM_PWD: &str = "\"><label for=\"pwd\">Password</label>\
<input type=\"password\" id=\"pwd\" name=\"pwd\" placeholder=\"unchanged\">\
<label for=\"devname\">Device name</label><input type=\"text\" id=\"devname\" name=\"devname\" value=\"";
pub const SETTINGS_FORM_SCALE: &str = "\"><h3>Display</h3><p>Temperature in:</p>";
pub const SETTINGS_FORM_OFORM: &str = "<p>Output format:</p>";
pub const SETTINGS_FORM_END: &str = "<input type=\"submit\" value=\"Save\"></form>\
<p>Advanced settings <a href=\"/advparams\">here</a></p>";

pub const RADIO_START: &str = "<label><input type=\"radio\" name=\"";
pub const RADIO_CHECKED: &str = " checked";

pub const ADVANCED_TITLE: &str = "Advanced configuration";
pub const ADVANCED_FORM_START: &str = "<h2>Advanced configuration</h2>\
<form action=\"/setadvparams\" method=\"get\"><h3>Sensor</h3><label for=\"ptime\">Polling timer [s]</label>\
<input type=\"number\" id=\"ptime\" name=\"ptime\" step=\"1\"";
pub const ADVANCED_FORM_END: &str = "><input type=\"submit\" value=\"Save\"></form><h3>Thresholds</h3>\
<p>High temperature <a href=\"/sethightemp\">here</a></p>\
<p>Low temperature <a href=\"/setlowtemp\">here</a></p>\
<p>High humidity <a href=\"/sethighhum\">here</a></p>\
<p>Low humidity <a href=\"/setlowhum\">here</a></p>\
<p>Back to <a href=\"/settings\">settings</a></p>";

/// A fixed one-box page.
pub struct Notice {
    pub title: &'static str,
    pub heading: &'static str,
    /// Raw HTML below the heading.
    pub detail: &'static str,
}

pub const SETTINGS_STA_ONLY: Notice = Notice {
    title: SETTINGS_TITLE,
    heading: "The configuration page is only available in AP mode",
    detail: "<h3>Switch the device to AP mode and reboot it to configure.</h3>",
};

pub const SETTINGS_SAVED: Notice = Notice {
    title: "Configuration saved",
    heading: "Settings saved!",
    detail: "<h3><a href=\"/info\">Show sensor data</a></h3>",
};

pub const SETTINGS_INVALID: Notice = Notice {
    title: "Configuration error",
    heading: "Invalid Parameters!",
    detail: "<h3><a href=\"/settings\">Back to configuration</a></h3>",
};

pub const SETTINGS_NO_PARAMS: Notice = Notice {
    title: "Configuration error",
    heading: "No Parameters found!",
    detail: "<h3><a href=\"/settings\">Back to configuration</a></h3>",
};

pub const ADVANCED_SAVED: Notice = Notice {
    title: "Configuration saved",
    heading: "Advanced settings saved!",
    detail: "<h3><a href=\"/info\">Show sensor data</a></h3>",
};

pub const ADVANCED_INVALID: Notice = Notice {
    title: "Configuration error",
    heading: "Invalid Parameters!",
    detail: "<h3><a href=\"/advparams\">Back to advanced configuration</a></h3>",
};

pub const ADVANCED_NO_PARAMS: Notice = Notice {
    title: "Configuration error",
    heading: "No Parameters found!",
    detail: "<h3><a href=\"/advparams\">Back to advanced configuration</a></h3>",
};

pub const NOT_IMPLEMENTED: Notice = Notice {
    title: "Advice",
    heading: "Sorry, this page is not implemented yet!",
    detail: "",
};

pub const API_NOT_IMPLEMENTED: &str = "not_implemented_yet";
