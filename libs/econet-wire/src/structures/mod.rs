//! Payload sub-codecs
//!
//! Each structure is an independent encode/decode pair over the byte
//! cursor. Structures are pure: no I/O, no clock, no global state.
//! Decoders tolerate unknown trailing bytes; encoders emit exactly the
//! bytes the matching decoder consumes.

pub mod alerts;
pub mod frame_versions;
pub mod network_info;
pub mod parameters;
pub mod product_info;
pub mod program_version;
pub mod regulator_data;
pub mod schedules;
pub mod sensor_data;
