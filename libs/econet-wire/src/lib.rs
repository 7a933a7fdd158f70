//! ecoNET wire codec
//!
//! Pure encode/decode support for the serial/TCP protocol spoken by Plum
//! ecoMAX heating controllers and their sub-devices. This crate performs
//! no I/O; the companion `econet-client` crate owns transports, the
//! protocol driver and the device model.
//!
//! # Layers
//!
//! - [`cursor`] / [`bits`]: bounds-checked little-endian primitives and
//!   packed-boolean streams
//! - [`frame`]: the envelope with delimiters, header and XOR checksum
//! - [`frames`]: one enum variant per known frame type
//! - [`structures`]: the payload sub-codecs
//!
//! Decoders never panic on wire data; malformed input surfaces as
//! [`WireError`].

pub mod bits;
pub mod consts;
pub mod cursor;
pub mod datatypes;
pub mod error;
pub mod frame;
pub mod frames;
pub mod structures;
pub mod uid;
pub mod value;

pub use consts::{DeviceAddress, DeviceState, ProductType, STATE_OFF, STATE_ON};
pub use error::{Result, WireError};
pub use frame::Frame;
pub use frames::{DecodeContext, FrameData, FrameType};
pub use structures::network_info::{
    EncryptionType, EthernetParameters, NetworkInfo, WirelessParameters,
};
pub use structures::parameters::ParameterValues;
pub use value::Value;
