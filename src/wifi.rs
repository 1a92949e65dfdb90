//! Radio bring-up for the two node modes.
//!
//! Station mode joins the stored network and takes its addressing from DHCP.
//! Access-point mode raises a fixed WPA2 network at a fixed address; clients
//! must configure themselves (no DHCP server runs on the node).

use core::fmt;
use core::net::Ipv4Addr;

use alloc::string::String;
use embassy_net::{Config as NetConfig, DhcpConfig, Ipv4Cidr, Stack, StaticConfigV4};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use esp_radio::wifi::{AccessPointConfig, AuthMethod, ClientConfig, ModeConfig, WifiController};
use log::{info, warn};

use crate::model::{NetworkConfig, WifiMode};

pub const AP_SSID: &str = "WLT-SENSOR";
pub const AP_PASSWORD: &str = "WltSensorPass";
pub const AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const AP_PREFIX_LEN: u8 = 24;

pub const STA_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const ADDRESS_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    Configure,
    Start,
    Associate,
    /// No association or no address within the connect timeout.
    Timeout,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiError::Configure => f.write_str("wifi configuration rejected"),
            WifiError::Start => f.write_str("wifi start failed"),
            WifiError::Associate => f.write_str("wifi association failed"),
            WifiError::Timeout => f.write_str("wifi connect timed out"),
        }
    }
}

/// Network-layer configuration for `mode`.
pub fn ip_config(mode: WifiMode) -> NetConfig {
    match mode {
        WifiMode::Station => NetConfig::dhcpv4(DhcpConfig::default()),
        WifiMode::AccessPoint => NetConfig::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(AP_ADDRESS, AP_PREFIX_LEN),
            gateway: Some(AP_ADDRESS),
            dns_servers: Default::default(),
        }),
    }
}

/// Join the network named in `net`.
pub async fn start_station(
    controller: &mut WifiController<'static>,
    net: &NetworkConfig,
) -> Result<(), WifiError> {
    let config = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(String::from(net.ssid.as_str()))
            .with_password(String::from(net.password.as_str())),
    );
    controller.set_config(&config).map_err(|e| {
        warn!("wifi: set_config: {:?}", e);
        WifiError::Configure
    })?;
    controller.start_async().await.map_err(|e| {
        warn!("wifi: start: {:?}", e);
        WifiError::Start
    })?;

    info!(
        "wifi: joining '{}' (pass {} chars)",
        net.ssid,
        net.password.len()
    );
    match with_timeout(STA_CONNECT_TIMEOUT, controller.connect_async()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            warn!("wifi: connect: {:?}", e);
            Err(WifiError::Associate)
        }
        Err(_) => Err(WifiError::Timeout),
    }
}

pub async fn start_access_point(controller: &mut WifiController<'static>) -> Result<(), WifiError> {
    let config = ModeConfig::AccessPoint(
        AccessPointConfig::default()
            .with_ssid(String::from(AP_SSID))
            .with_password(String::from(AP_PASSWORD))
            .with_auth_method(AuthMethod::Wpa2Personal),
    );
    controller.set_config(&config).map_err(|e| {
        warn!("wifi: set_config: {:?}", e);
        WifiError::Configure
    })?;
    controller.start_async().await.map_err(|e| {
        warn!("wifi: start: {:?}", e);
        WifiError::Start
    })?;
    info!("wifi: access point '{}' up at {}", AP_SSID, AP_ADDRESS);
    Ok(())
}

/// Wait for the stack to carry an IPv4 address. A station copies it into `net`.
pub async fn wait_for_address(
    stack: Stack<'_>,
    net: &mut NetworkConfig,
    deadline: Instant,
) -> Result<(), WifiError> {
    loop {
        if let Some(cfg) = stack.config_v4() {
            let ip = cfg.address.address();
            let netmask = cfg.address.netmask();
            let gateway = cfg.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED);
            let recorded = net.record_station_address(ip, netmask, gateway);
            info!(
                "wifi: {} ip={} mask={} gw={} recorded={}",
                net.mode.as_str(),
                ip,
                netmask,
                gateway,
                recorded
            );
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(WifiError::Timeout);
        }
        Timer::after(ADDRESS_POLL).await;
    }
}
