//! Connection configuration
//!
//! Timeouts, retry counts and the network info advertised to the
//! controller during the handshake.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use econet_wire::{EncryptionType, EthernetParameters, NetworkInfo, WirelessParameters};

/// Protocol timing constants
pub mod timeouts {
    /// Default request/response timeout
    pub const REQUEST_TIMEOUT_MS: u64 = 15_000;
    /// Per-step handshake timeout
    pub const HANDSHAKE_STEP_TIMEOUT_MS: u64 = 10_000;
    /// Idle window before the connection is considered dead
    pub const KEEPALIVE_IDLE_MS: u64 = 60_000;
    /// Reconnect backoff cap
    pub const RECONNECT_MAX_BACKOFF_MS: u64 = 30_000;
    /// Initial reconnect backoff
    pub const RECONNECT_INITIAL_BACKOFF_MS: u64 = 1_000;
    /// Transport connect timeout
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
}

/// Request attempts before a timeout is surfaced
pub const REQUEST_RETRIES: u32 = 3;

fn default_request_timeout_ms() -> u64 {
    timeouts::REQUEST_TIMEOUT_MS
}

fn default_keepalive_idle_ms() -> u64 {
    timeouts::KEEPALIVE_IDLE_MS
}

fn default_reconnect() -> bool {
    true
}

fn is_default_request_timeout(v: &u64) -> bool {
    *v == default_request_timeout_ms()
}

fn is_default_keepalive(v: &u64) -> bool {
    *v == default_keepalive_idle_ms()
}

fn is_default_reconnect(v: &bool) -> bool {
    *v == default_reconnect()
}

/// Connection-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Network info reported in the DeviceAvailable handshake response
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip_serializing_if = "is_default_request_timeout")]
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(skip_serializing_if = "is_default_keepalive")]
    #[serde(default = "default_keepalive_idle_ms")]
    pub keepalive_idle_ms: u64,

    /// Reconnect automatically after transport errors (default: true)
    #[serde(skip_serializing_if = "is_default_reconnect")]
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,

    #[serde(skip_serializing_if = "is_default_initial_backoff")]
    #[serde(default = "default_initial_backoff_ms")]
    pub reconnect_initial_backoff_ms: u64,

    #[serde(skip_serializing_if = "is_default_max_backoff")]
    #[serde(default = "default_max_backoff_ms")]
    pub reconnect_max_backoff_ms: u64,
}

fn default_initial_backoff_ms() -> u64 {
    timeouts::RECONNECT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    timeouts::RECONNECT_MAX_BACKOFF_MS
}

fn is_default_initial_backoff(v: &u64) -> bool {
    *v == default_initial_backoff_ms()
}

fn is_default_max_backoff(v: &u64) -> bool {
    *v == default_max_backoff_ms()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self {
            network: NetworkConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
            keepalive_idle_ms: default_keepalive_idle_ms(),
            reconnect: default_reconnect(),
            reconnect_initial_backoff_ms: default_initial_backoff_ms(),
            reconnect_max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// One wired interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    #[serde(default = "default_status")]
    pub status: bool,
}

fn default_status() -> bool {
    true
}

fn default_signal_quality() -> u8 {
    100
}

/// One wireless interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirelessConfig {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    #[serde(default = "default_status")]
    pub status: bool,
    pub ssid: String,
    #[serde(default)]
    pub encryption: EncryptionType,
    /// Signal strength in percent (0..=100)
    #[serde(default = "default_signal_quality")]
    pub signal_quality: u8,
}

/// Network info advertised to the controller
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth: Option<InterfaceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wlan: Option<WirelessConfig>,
}

impl NetworkConfig {
    /// Build the wire structure the handshake response carries
    pub fn to_network_info(&self) -> NetworkInfo {
        let eth = match &self.eth {
            Some(eth) => EthernetParameters {
                status: eth.status,
                ip: eth.ip,
                netmask: eth.netmask,
                gateway: eth.gateway,
            },
            None => EthernetParameters::default(),
        };
        let wlan = match &self.wlan {
            Some(wlan) => WirelessParameters {
                status: wlan.status,
                ip: wlan.ip,
                netmask: wlan.netmask,
                gateway: wlan.gateway,
                signal_quality: wlan.signal_quality.min(100),
                encryption: wlan.encryption,
                ssid: wlan.ssid.clone(),
            },
            None => WirelessParameters::default(),
        };
        NetworkInfo {
            eth,
            wlan,
            server_status: true,
            wan_type: 0,
        }
    }
}

/// Serial port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. "/dev/ttyUSB0")
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_parity() -> String {
    "None".to_string()
}

impl SerialConfig {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: default_parity(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::new();
        assert_eq!(config.request_timeout_ms, 15_000);
        assert_eq!(config.keepalive_idle_ms, 60_000);
        assert!(config.reconnect);
    }

    #[test]
    fn test_config_deserialization_minimal() {
        let json = r#"{}"#;
        let config: ConnectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.request_timeout_ms, 15_000);
        assert!(config.network.eth.is_none());
        assert!(config.network.wlan.is_none());
    }

    #[test]
    fn test_network_config_to_info() {
        let json = r#"{
            "wlan": {
                "ip": "10.10.0.12",
                "netmask": "255.255.255.0",
                "gateway": "10.10.0.1",
                "ssid": "boiler-room",
                "encryption": "Wpa2",
                "signal_quality": 85
            }
        }"#;
        let config: NetworkConfig = serde_json::from_str(json).unwrap();
        let info = config.to_network_info();

        assert!(config.wlan.as_ref().unwrap().status);
        assert_eq!(info.wlan.ssid, "boiler-room");
        assert_eq!(info.wlan.encryption, EncryptionType::Wpa2);
        assert_eq!(info.wlan.signal_quality, 85);
        // No ethernet section: disabled defaults
        assert!(!info.eth.status);
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0", 115_200);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, "None");
    }

    #[test]
    fn test_config_skip_serializing_defaults() {
        let config = ConnectionConfig::new();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("request_timeout_ms"));
        assert!(!json.contains("keepalive_idle_ms"));
        assert!(!json.contains("reconnect"));
    }
}
