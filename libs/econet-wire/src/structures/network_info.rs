//! Network info structure
//!
//! Carried in the DeviceAvailable response so the controller can show the
//! gateway's connectivity on its display. The client fills it from
//! configuration; the controller never echoes it back.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::{Result, WireError};

pub const DEFAULT_IP: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 0);
pub const DEFAULT_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Wireless encryption standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EncryptionType {
    Unknown,
    #[default]
    None,
    Wep,
    Wpa,
    Wpa2,
}

impl EncryptionType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => EncryptionType::None,
            2 => EncryptionType::Wep,
            3 => EncryptionType::Wpa,
            4 => EncryptionType::Wpa2,
            _ => EncryptionType::Unknown,
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            EncryptionType::Unknown => 0,
            EncryptionType::None => 1,
            EncryptionType::Wep => 2,
            EncryptionType::Wpa => 3,
            EncryptionType::Wpa2 => 4,
        }
    }
}

/// Ethernet interface parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetParameters {
    pub status: bool,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for EthernetParameters {
    fn default() -> Self {
        Self {
            status: false,
            ip: DEFAULT_IP,
            netmask: DEFAULT_NETMASK,
            gateway: DEFAULT_IP,
        }
    }
}

/// Wireless interface parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirelessParameters {
    pub status: bool,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    /// Signal strength in percent (0..=100)
    pub signal_quality: u8,
    pub encryption: EncryptionType,
    pub ssid: String,
}

impl Default for WirelessParameters {
    fn default() -> Self {
        Self {
            status: false,
            ip: DEFAULT_IP,
            netmask: DEFAULT_NETMASK,
            gateway: DEFAULT_IP,
            signal_quality: 100,
            encryption: EncryptionType::None,
            ssid: String::new(),
        }
    }
}

/// Network parameters shown on the controller panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkInfo {
    pub eth: EthernetParameters,
    pub wlan: WirelessParameters,
    pub server_status: bool,
    pub wan_type: u8,
}

pub fn decode(cursor: &mut Cursor<'_>) -> Result<NetworkInfo> {
    let eth = EthernetParameters {
        status: cursor.read_u8()? != 0,
        ip: cursor.read_ipv4()?,
        netmask: cursor.read_ipv4()?,
        gateway: cursor.read_ipv4()?,
    };
    let wlan_status = cursor.read_u8()? != 0;
    let wlan_ip = cursor.read_ipv4()?;
    let wlan_netmask = cursor.read_ipv4()?;
    let wlan_gateway = cursor.read_ipv4()?;
    let signal_quality = cursor.read_u8()?;
    if signal_quality > 100 {
        return Err(WireError::malformed(format!(
            "signal quality out of range: {signal_quality}"
        )));
    }
    let encryption = EncryptionType::from_byte(cursor.read_u8()?);
    let ssid = cursor.read_var_string()?;
    let server_status = cursor.read_u8()? != 0;
    let wan_type = cursor.read_u8()?;

    Ok(NetworkInfo {
        eth,
        wlan: WirelessParameters {
            status: wlan_status,
            ip: wlan_ip,
            netmask: wlan_netmask,
            gateway: wlan_gateway,
            signal_quality,
            encryption,
            ssid,
        },
        server_status,
        wan_type,
    })
}

pub fn encode(writer: &mut PayloadWriter, info: &NetworkInfo) {
    writer.put_u8(info.eth.status.into());
    writer.put_ipv4(info.eth.ip);
    writer.put_ipv4(info.eth.netmask);
    writer.put_ipv4(info.eth.gateway);
    writer.put_u8(info.wlan.status.into());
    writer.put_ipv4(info.wlan.ip);
    writer.put_ipv4(info.wlan.netmask);
    writer.put_ipv4(info.wlan.gateway);
    writer.put_u8(info.wlan.signal_quality);
    writer.put_u8(info.wlan.encryption.as_byte());
    writer.put_var_string(&info.wlan.ssid);
    writer.put_u8(info.server_status.into());
    writer.put_u8(info.wan_type);
}
