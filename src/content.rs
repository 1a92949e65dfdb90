//! Response body builder
//!
//! Every route renders through a [`BoundedWriter`] over the connection's body
//! buffer. [`build`] returns the body length, or 0 when the body would not
//! fit; the caller must not send the buffer in that case.

use core::fmt::Write as _;
use core::net::Ipv4Addr;

use heapless::String;
use log::{debug, info, warn};

use crate::buffer::{BoundedWriter, Overflow};
use crate::form::{self, FormError};
use crate::http::Route;
use crate::json::JsonWriter;
use crate::model::{
    NodeContext, OutputFormat, TempUnit, Threshold, WifiMode, POLL_INTERVAL_MAX, POLL_INTERVAL_MIN,
};
use crate::pages::{self, Notice};

/// Render `route` into `body`. Returns the number of bytes written, 0 on
/// overflow.
pub fn build(route: Route, query: Option<&str>, ctx: &mut NodeContext, body: &mut [u8]) -> usize {
    let mut out = BoundedWriter::new(body);
    match render(route, query, ctx, &mut out) {
        Ok(()) => out.len(),
        Err(Overflow) => {
            warn!(
                "content: {} does not fit in {} bytes",
                route.path(),
                out.capacity()
            );
            0
        }
    }
}

pub fn render(
    route: Route,
    query: Option<&str>,
    ctx: &mut NodeContext,
    out: &mut BoundedWriter<'_>,
) -> Result<(), Overflow> {
    match route {
        Route::Style => out.push_bytes(pages::STYLE_CSS),
        Route::StyleInfo => out.push_bytes(pages::STYLE_INFO_CSS),
        Route::Favicon => out.push_bytes(pages::FAVICON_ICO),
        Route::Info => info_page(ctx, out),
        Route::Settings => {
            if ctx.config.net.mode == WifiMode::AccessPoint {
                settings_form(ctx, out)
            } else {
                debug!("content: settings page refused in STA mode");
                notice(out, &pages::SETTINGS_STA_ONLY)
            }
        }
        Route::SetParams => {
            let page = apply_settings(query, ctx);
            notice(out, page)
        }
        Route::Advanced => advanced_form(ctx, out),
        Route::SetAdvParams => {
            let page = apply_poll_interval(query, ctx);
            notice(out, page)
        }
        Route::SetHighTemp
        | Route::SetHighTempForm
        | Route::SetLowTemp
        | Route::SetLowTempForm
        | Route::SetHighHum
        | Route::SetHighHumForm
        | Route::SetLowHum
        | Route::SetLowHumForm => notice(out, &pages::NOT_IMPLEMENTED),
        Route::ApiInfo => api_info(ctx, out),
        Route::ApiSettings => api_settings(ctx, out),
        Route::ApiSetParams
        | Route::ApiSetAdvParams
        | Route::ApiSetHighTemp
        | Route::ApiSetLowTemp
        | Route::ApiSetHighHum
        | Route::ApiSetLowHum => {
            let mut json = JsonWriter::new(out);
            json.begin_object()?;
            json.field_str("status", pages::API_NOT_IMPLEMENTED)?;
            json.end_object()
        }
    }
}

fn page_start(out: &mut BoundedWriter<'_>, title: &str, head_tail: &str) -> Result<(), Overflow> {
    out.push_str(pages::HEAD_START)?;
    out.push_str(title)?;
    out.push_str(head_tail)?;
    out.push_str(pages::BODY_START)
}

fn notice(out: &mut BoundedWriter<'_>, page: &Notice) -> Result<(), Overflow> {
    page_start(out, page.title, pages::HEAD_STYLE)?;
    out.push_str("<h2>")?;
    out.push_str(page.heading)?;
    out.push_str("</h2>")?;
    out.push_str(page.detail)?;
    out.push_str(pages::PAGE_END)
}

fn info_page(ctx: &NodeContext, out: &mut BoundedWriter<'_>) -> Result<(), Overflow> {
    let config = &ctx.config;
    page_start(out, pages::INFO_TITLE, pages::HEAD_STYLE_INFO)?;
    out.push_str("<h2>")?;
    out.push_html_escaped(&config.net.device_name)?;
    out.push_str("</h2>")?;

    if config.settings.data_valid() {
        let unit = config.settings.unit();
        out.push_str(pages::INFO_DATA_START)?;
        out.push_fmt(format_args!(
            "{:.2} {}",
            unit.convert(config.reading.temperature),
            unit.html_symbol()
        ))?;
        out.push_str(pages::INFO_DATA_SEP)?;
        out.push_fmt(format_args!("{:.2}", config.reading.humidity))?;
        out.push_str(pages::INFO_DATA_END)?;
    } else {
        out.push_str(pages::INFO_NOT_VALID)?;
    }
    out.push_str(pages::PAGE_END)
}

fn radio(
    out: &mut BoundedWriter<'_>,
    name: &str,
    value: &str,
    label: &str,
    checked: bool,
) -> Result<(), Overflow> {
    out.push_str(pages::RADIO_START)?;
    out.push_fmt(format_args!("{}\" value=\"{}\"", name, value))?;
    if checked {
        out.push_str(pages::RADIO_CHECKED)?;
    }
    out.push_str(">")?;
    out.push_str(label)?;
    out.push_str("</label>")
}

fn settings_form(ctx: &NodeContext, out: &mut BoundedWriter<'_>) -> Result<(), Overflow> {
    let config = &ctx.config;
    let unit = config.settings.unit();
    let format = config.settings.format();

    page_start(out, pages::SETTINGS_TITLE, pages::HEAD_STYLE)?;
    out.push_str(pages::SETTINGS_FORM_START)?;
    out.push_html_escaped(&config.net.ssid)?;
    out.push_str(pages::SETTINGS_FORM_PWD)?;
    out.push_html_escaped(&config.net.device_name)?;
    out.push_str(pages::SETTINGS_FORM_SCALE)?;
    radio(out, "scale", "C", "&deg;C", unit == TempUnit::Celsius)?;
    radio(out, "scale", "F", "&deg;F", unit == TempUnit::Fahrenheit)?;
    out.push_str(pages::SETTINGS_FORM_OFORM)?;
    radio(out, "oform", "TXT", "TXT", format == OutputFormat::Txt)?;
    radio(out, "oform", "CSV", "CSV", format == OutputFormat::Csv)?;
    out.push_str(pages::SETTINGS_FORM_END)?;
    out.push_str(pages::PAGE_END)
}

fn advanced_form(ctx: &NodeContext, out: &mut BoundedWriter<'_>) -> Result<(), Overflow> {
    page_start(out, pages::ADVANCED_TITLE, pages::HEAD_STYLE)?;
    out.push_str(pages::ADVANCED_FORM_START)?;
    out.push_fmt(format_args!(
        " min=\"{}\" max=\"{}\" value=\"{}\"",
        POLL_INTERVAL_MIN,
        POLL_INTERVAL_MAX,
        ctx.config.settings.poll_interval()
    ))?;
    out.push_str(pages::ADVANCED_FORM_END)?;
    out.push_str(pages::PAGE_END)
}

fn apply_settings(query: Option<&str>, ctx: &mut NodeContext) -> &'static Notice {
    match form::parse_settings(query) {
        Ok(update) => {
            info!(
                "content: settings update ssid '{}' device '{}' pass {}",
                update.ssid,
                update.device_name,
                if update.password.is_some() { "changed" } else { "kept" }
            );
            update.apply(&mut ctx.config);
            ctx.request_save();
            &pages::SETTINGS_SAVED
        }
        Err(FormError::NoParameters) => &pages::SETTINGS_NO_PARAMS,
        Err(FormError::Invalid) => {
            warn!("content: settings submission rejected");
            &pages::SETTINGS_INVALID
        }
    }
}

fn apply_poll_interval(query: Option<&str>, ctx: &mut NodeContext) -> &'static Notice {
    match form::parse_poll_interval(query) {
        Ok(secs) => {
            info!("content: poll interval set to {} s", secs);
            ctx.config.settings.set_poll_interval(secs);
            ctx.request_save();
            &pages::ADVANCED_SAVED
        }
        Err(FormError::NoParameters) => &pages::ADVANCED_NO_PARAMS,
        Err(FormError::Invalid) => {
            warn!("content: poll interval rejected");
            &pages::ADVANCED_INVALID
        }
    }
}

fn api_info(ctx: &NodeContext, out: &mut BoundedWriter<'_>) -> Result<(), Overflow> {
    let config = &ctx.config;
    let unit = config.settings.unit();
    let mut json = JsonWriter::new(out);
    json.begin_object()?;
    json.field_f32("T", unit.convert(config.reading.temperature))?;
    json.field_str("TF", unit.letter())?;
    json.field_f32("H", config.reading.humidity)?;
    json.end_object()
}

fn ip_string(ip: Ipv4Addr) -> String<15> {
    let mut s = String::new();
    // 15 bytes always hold a dotted quad.
    let _ = write!(s, "{}", ip);
    s
}

fn threshold(json: &mut JsonWriter<'_, '_>, key: &str, t: &Threshold) -> Result<(), Overflow> {
    json.begin_field_object(key)?;
    json.field_f32("VAL", t.value)?;
    json.field_str("TR", t.trigger.code())?;
    json.end_object()
}

fn api_settings(ctx: &NodeContext, out: &mut BoundedWriter<'_>) -> Result<(), Overflow> {
    let config = &ctx.config;
    let net = &config.net;
    let settings = config.settings;
    let th = &config.thresholds;

    let mut json = JsonWriter::new(out);
    json.begin_object()?;

    json.begin_field_object("WIFI")?;
    json.field_str("DEVNAME", &net.device_name)?;
    json.field_str("SSID", &net.ssid)?;
    json.field_str("MODE", net.mode.as_str())?;
    json.field_str("IPADDR", &ip_string(net.ip))?;
    json.field_str("NET", &ip_string(net.netmask))?;
    json.field_str("GW", &ip_string(net.gateway))?;
    json.end_object()?;

    json.begin_field_object("PARAMS")?;
    json.field_str("TF", settings.unit().letter())?;
    json.field_str("OF", settings.format().as_str())?;
    json.field_u32("PT", settings.poll_interval() as u32)?;
    json.field_u32("TH", settings.hysteresis() as u32)?;
    json.end_object()?;

    json.begin_field_object("THRESH")?;
    threshold(&mut json, "HTT", &th.high.temperature)?;
    threshold(&mut json, "HTH", &th.high.humidity)?;
    threshold(&mut json, "HTP", &th.high.pressure)?;
    threshold(&mut json, "LTT", &th.low.temperature)?;
    threshold(&mut json, "LTH", &th.low.humidity)?;
    threshold(&mut json, "LTP", &th.low.pressure)?;
    json.end_object()?;

    json.end_object()
}
