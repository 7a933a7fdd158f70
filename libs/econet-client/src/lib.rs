//! ecoNET client
//!
//! Async client for Plum ecoMAX heating controllers speaking the ecoNET
//! serial/TCP protocol. The driver keeps a live model of the controller
//! and its mixer/thermostat sub-devices: sensor broadcasts land in data
//! cells, editable parameters validate their bounds locally, weekly
//! schedules commit as a whole, and a version-tracked pull keeps slow
//! frames fresh.
//!
//! ```no_run
//! use econet_client::{Connection, ConnectionConfig, Device};
//!
//! # async fn run() -> econet_client::Result<()> {
//! let connection = Connection::tcp("10.10.0.30", 8899, ConnectionConfig::new());
//! connection.connect().await?;
//!
//! let ecomax = connection.ecomax(Some(std::time::Duration::from_secs(30))).await?;
//! let temp = ecomax.get("heating_temp", None).await?;
//! println!("heating temperature: {temp:?}");
//!
//! ecomax.set("heating_target_temp", 65.into()).await?;
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod events;
pub mod filters;
pub mod protocol;
pub mod stats;
pub mod stream;
pub mod transport;

pub use config::{ConnectionConfig, NetworkConfig, SerialConfig};
pub use connection::{Connection, MemoryHub};
pub use device::parameter::{Parameter, ParameterKind};
pub use device::schedule::{TimeOfDay, Weekday};
pub use device::{Device, DeviceKind, EcoMax, Mixer, Thermostat};
pub use error::{Error, Result};
pub use events::{Subscriber, SubscriptionId};
pub use protocol::ConnectionState;
pub use stats::Statistics;
pub use stream::RawLink;
pub use transport::Transport;

// The wire vocabulary applications need alongside the client
pub use econet_wire::{
    DeviceAddress, DeviceState, FrameData, FrameType, Value, STATE_OFF, STATE_ON,
};
