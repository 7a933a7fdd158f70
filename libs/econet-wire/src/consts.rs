//! Protocol constants
//!
//! Addresses, delimiters and state enumerations shared across the codec.

use serde::{Deserialize, Serialize};

/// Frame start delimiter
pub const FRAME_START: u8 = 0x68;
/// Frame end delimiter
pub const FRAME_END: u8 = 0x16;
/// Header size: start delimiter, u16 length, recipient, sender, sender type, version
pub const HEADER_SIZE: usize = 7;
/// Sender type carried by every frame
pub const ECONET_TYPE: u8 = 0x30;
/// Protocol version carried by every frame
pub const ECONET_VERSION: u8 = 0x05;

/// Shortest well-formed frame: header + type + CRC + end delimiter
pub const MIN_FRAME_LENGTH: usize = 10;
/// Longest frame the codec will accept
pub const MAX_FRAME_LENGTH: usize = 1000;

/// Marker byte for absent values
pub const BYTE_UNDEFINED: u8 = 0xFF;

/// Switch state rendered to callers
pub const STATE_ON: &str = "on";
/// Switch state rendered to callers
pub const STATE_OFF: &str = "off";

/// Device addresses on the ecoNET bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceAddress {
    /// Broadcast to every bus participant
    Broadcast = 0x00,
    /// The ecoMAX controller
    Ecomax = 0x45,
    /// An attached ecoSTER room panel
    Ecoster = 0x51,
    /// This library
    Econet = 0x56,
}

impl DeviceAddress {
    /// Look up a known address
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(DeviceAddress::Broadcast),
            0x45 => Some(DeviceAddress::Ecomax),
            0x51 => Some(DeviceAddress::Ecoster),
            0x56 => Some(DeviceAddress::Econet),
            _ => None,
        }
    }
}

impl From<DeviceAddress> for u8 {
    fn from(address: DeviceAddress) -> Self {
        address as u8
    }
}

/// Operating states reported in the sensor data state byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Off,
    Stabilization,
    Kindling,
    Working,
    Supervision,
    Paused,
    Standby,
    BurningOff,
    Alert,
    Manual,
    Unsealing,
    Other(u8),
}

impl DeviceState {
    /// Decode a state byte.
    ///
    /// A few firmware lines report model-specific stabilization codes;
    /// those fold into the common variant.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => DeviceState::Off,
            1 | 12 | 23 => DeviceState::Stabilization,
            2 => DeviceState::Kindling,
            3 => DeviceState::Working,
            4 => DeviceState::Supervision,
            5 => DeviceState::Paused,
            6 => DeviceState::Standby,
            7 => DeviceState::BurningOff,
            8 => DeviceState::Alert,
            9 => DeviceState::Manual,
            10 => DeviceState::Unsealing,
            other => DeviceState::Other(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            DeviceState::Off => 0,
            DeviceState::Stabilization => 1,
            DeviceState::Kindling => 2,
            DeviceState::Working => 3,
            DeviceState::Supervision => 4,
            DeviceState::Paused => 5,
            DeviceState::Standby => 6,
            DeviceState::BurningOff => 7,
            DeviceState::Alert => 8,
            DeviceState::Manual => 9,
            DeviceState::Unsealing => 10,
            DeviceState::Other(other) => *other,
        }
    }
}

/// Lambda probe states reported in the sensor data lambda block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LambdaState {
    Stop,
    Start,
    Working,
    Other(u8),
}

impl LambdaState {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => LambdaState::Stop,
            1 => LambdaState::Start,
            3 => LambdaState::Working,
            other => LambdaState::Other(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            LambdaState::Stop => 0,
            LambdaState::Start => 1,
            LambdaState::Working => 3,
            LambdaState::Other(other) => *other,
        }
    }
}

/// Product lines reported in the UID response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    /// Pellet boiler controllers
    EcomaxP,
    /// Installation controllers
    EcomaxI,
    Other(u8),
}

impl ProductType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => ProductType::EcomaxP,
            1 => ProductType::EcomaxI,
            other => ProductType::Other(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            ProductType::EcomaxP => 0,
            ProductType::EcomaxI => 1,
            ProductType::Other(other) => *other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_address_values() {
        assert_eq!(u8::from(DeviceAddress::Broadcast), 0x00);
        assert_eq!(u8::from(DeviceAddress::Ecomax), 0x45);
        assert_eq!(u8::from(DeviceAddress::Ecoster), 0x51);
        assert_eq!(u8::from(DeviceAddress::Econet), 0x56);
    }

    #[test]
    fn test_device_address_lookup() {
        assert_eq!(DeviceAddress::from_byte(0x45), Some(DeviceAddress::Ecomax));
        assert_eq!(DeviceAddress::from_byte(0x7F), None);
    }

    #[test]
    fn test_device_state_extra_codes() {
        // Model-specific stabilization codes
        assert_eq!(DeviceState::from_byte(12), DeviceState::Stabilization);
        assert_eq!(DeviceState::from_byte(23), DeviceState::Stabilization);
        assert_eq!(DeviceState::from_byte(11), DeviceState::Other(11));
    }

    #[test]
    fn test_device_state_roundtrip() {
        for byte in [0u8, 2, 3, 7, 10, 42] {
            let state = DeviceState::from_byte(byte);
            if !matches!(state, DeviceState::Stabilization) {
                assert_eq!(state.as_byte(), byte);
            }
        }
    }

    #[test]
    fn test_lambda_state() {
        assert_eq!(LambdaState::from_byte(3), LambdaState::Working);
        assert_eq!(LambdaState::from_byte(2), LambdaState::Other(2));
    }
}
