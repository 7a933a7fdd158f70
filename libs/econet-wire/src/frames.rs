//! Frame types and payload dispatch
//!
//! Every known frame is a variant of [`FrameData`]; the registry is the
//! `match` in [`FrameData::decode`] / [`FrameData::encode`]. Unknown
//! codes decode to [`FrameData::Unknown`] with the raw payload retained.

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;
use crate::structures::alerts::{self, Alerts, AlertsRequest};
use crate::structures::network_info::{self, NetworkInfo};
use crate::structures::parameters::{
    self, EcomaxParameters, MixerParameters, ThermostatParameters,
};
use crate::structures::product_info::{self, ProductInfo};
use crate::structures::program_version::{self, VersionInfo};
use crate::structures::regulator_data::{self, RegulatorData, RegulatorDataSchema};
use crate::structures::schedules::{self, Schedules, SetSchedule};
use crate::structures::sensor_data::{self, SensorData};

/// Response codes set the high bit of the paired request code
pub const RESPONSE_BIT: u8 = 0x80;

/// Known frame type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameType {
    // Requests
    StopMaster = 24,
    StartMaster = 25,
    CheckDevice = 48,
    EcomaxParameters = 49,
    MixerParameters = 50,
    SetEcomaxParameter = 51,
    SetMixerParameter = 52,
    Uid = 57,
    Password = 58,
    EcomaxControl = 59,
    Alerts = 61,
    ProgramVersion = 64,
    Schedules = 70,
    SetSchedule = 71,
    ThermostatParameters = 82,
    SetThermostatParameter = 83,
    RegulatorDataSchema = 85,

    // Responses
    DeviceAvailableResponse = 176,
    EcomaxParametersResponse = 177,
    MixerParametersResponse = 178,
    SetEcomaxParameterResponse = 179,
    SetMixerParameterResponse = 180,
    UidResponse = 185,
    PasswordResponse = 186,
    EcomaxControlResponse = 187,
    AlertsResponse = 189,
    ProgramVersionResponse = 192,
    SchedulesResponse = 198,
    SetScheduleResponse = 199,
    ThermostatParametersResponse = 210,
    SetThermostatParameterResponse = 211,
    RegulatorDataSchemaResponse = 213,

    // Messages
    RegulatorData = 8,
    SensorData = 53,
}

impl FrameType {
    /// Look up a known frame type code
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            24 => FrameType::StopMaster,
            25 => FrameType::StartMaster,
            48 => FrameType::CheckDevice,
            49 => FrameType::EcomaxParameters,
            50 => FrameType::MixerParameters,
            51 => FrameType::SetEcomaxParameter,
            52 => FrameType::SetMixerParameter,
            57 => FrameType::Uid,
            58 => FrameType::Password,
            59 => FrameType::EcomaxControl,
            61 => FrameType::Alerts,
            64 => FrameType::ProgramVersion,
            70 => FrameType::Schedules,
            71 => FrameType::SetSchedule,
            82 => FrameType::ThermostatParameters,
            83 => FrameType::SetThermostatParameter,
            85 => FrameType::RegulatorDataSchema,
            176 => FrameType::DeviceAvailableResponse,
            177 => FrameType::EcomaxParametersResponse,
            178 => FrameType::MixerParametersResponse,
            179 => FrameType::SetEcomaxParameterResponse,
            180 => FrameType::SetMixerParameterResponse,
            185 => FrameType::UidResponse,
            186 => FrameType::PasswordResponse,
            187 => FrameType::EcomaxControlResponse,
            189 => FrameType::AlertsResponse,
            192 => FrameType::ProgramVersionResponse,
            198 => FrameType::SchedulesResponse,
            199 => FrameType::SetScheduleResponse,
            210 => FrameType::ThermostatParametersResponse,
            211 => FrameType::SetThermostatParameterResponse,
            213 => FrameType::RegulatorDataSchemaResponse,
            8 => FrameType::RegulatorData,
            53 => FrameType::SensorData,
            _ => return None,
        })
    }

    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Unsolicited broadcast messages
    pub fn is_message(&self) -> bool {
        matches!(self, FrameType::RegulatorData | FrameType::SensorData)
    }

    pub fn is_response(&self) -> bool {
        !self.is_message() && self.as_byte() & RESPONSE_BIT != 0
    }

    pub fn is_request(&self) -> bool {
        !self.is_message() && !self.is_response()
    }

    /// The response code paired with this request
    pub fn response(&self) -> Option<FrameType> {
        if !self.is_request() {
            return None;
        }
        FrameType::from_byte(self.as_byte() | RESPONSE_BIT)
    }
}

/// Context a few payload decoders need from the device model
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    /// Schema for regulator data values, when already fetched
    pub regdata_schema: Option<RegulatorDataSchema>,
    /// Thermostat slots announced in sensor data
    pub thermostat_count: u8,
}

/// Decoded frame payload, one variant per known frame type
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    // Requests
    StopMaster,
    StartMaster,
    CheckDevice,
    EcomaxParametersRequest { start: u8, count: u8 },
    MixerParametersRequest { start: u8, count: u8 },
    SetEcomaxParameter { index: u8, value: u16 },
    SetMixerParameter { device_index: u8, index: u8, value: u16 },
    UidRequest,
    PasswordRequest,
    EcomaxControl { value: u8 },
    AlertsRequest(AlertsRequest),
    ProgramVersionRequest,
    SchedulesRequest,
    SetSchedule(SetSchedule),
    ThermostatParametersRequest { start: u8, count: u8 },
    SetThermostatParameter { index: u8, value: u16, size: u8 },
    RegulatorDataSchemaRequest,

    // Responses
    DeviceAvailable(NetworkInfo),
    EcomaxParameters(EcomaxParameters),
    MixerParameters(MixerParameters),
    SetEcomaxParameterAck,
    SetMixerParameterAck,
    Uid(ProductInfo),
    Password(Option<String>),
    EcomaxControlAck,
    Alerts(Alerts),
    ProgramVersion(VersionInfo),
    Schedules(Schedules),
    SetScheduleAck,
    ThermostatParameters(ThermostatParameters),
    SetThermostatParameterAck,
    RegulatorDataSchema(RegulatorDataSchema),

    // Messages
    RegulatorData(RegulatorData),
    SensorData(SensorData),

    /// Retained verbatim; not an error
    Unknown { frame_type: u8, payload: Vec<u8> },
}

impl FrameData {
    /// The frame type this payload travels under
    pub fn frame_type(&self) -> Option<FrameType> {
        Some(match self {
            FrameData::StopMaster => FrameType::StopMaster,
            FrameData::StartMaster => FrameType::StartMaster,
            FrameData::CheckDevice => FrameType::CheckDevice,
            FrameData::EcomaxParametersRequest { .. } => FrameType::EcomaxParameters,
            FrameData::MixerParametersRequest { .. } => FrameType::MixerParameters,
            FrameData::SetEcomaxParameter { .. } => FrameType::SetEcomaxParameter,
            FrameData::SetMixerParameter { .. } => FrameType::SetMixerParameter,
            FrameData::UidRequest => FrameType::Uid,
            FrameData::PasswordRequest => FrameType::Password,
            FrameData::EcomaxControl { .. } => FrameType::EcomaxControl,
            FrameData::AlertsRequest(_) => FrameType::Alerts,
            FrameData::ProgramVersionRequest => FrameType::ProgramVersion,
            FrameData::SchedulesRequest => FrameType::Schedules,
            FrameData::SetSchedule(_) => FrameType::SetSchedule,
            FrameData::ThermostatParametersRequest { .. } => FrameType::ThermostatParameters,
            FrameData::SetThermostatParameter { .. } => FrameType::SetThermostatParameter,
            FrameData::RegulatorDataSchemaRequest => FrameType::RegulatorDataSchema,
            FrameData::DeviceAvailable(_) => FrameType::DeviceAvailableResponse,
            FrameData::EcomaxParameters(_) => FrameType::EcomaxParametersResponse,
            FrameData::MixerParameters(_) => FrameType::MixerParametersResponse,
            FrameData::SetEcomaxParameterAck => FrameType::SetEcomaxParameterResponse,
            FrameData::SetMixerParameterAck => FrameType::SetMixerParameterResponse,
            FrameData::Uid(_) => FrameType::UidResponse,
            FrameData::Password(_) => FrameType::PasswordResponse,
            FrameData::EcomaxControlAck => FrameType::EcomaxControlResponse,
            FrameData::Alerts(_) => FrameType::AlertsResponse,
            FrameData::ProgramVersion(_) => FrameType::ProgramVersionResponse,
            FrameData::Schedules(_) => FrameType::SchedulesResponse,
            FrameData::SetScheduleAck => FrameType::SetScheduleResponse,
            FrameData::ThermostatParameters(_) => FrameType::ThermostatParametersResponse,
            FrameData::SetThermostatParameterAck => FrameType::SetThermostatParameterResponse,
            FrameData::RegulatorDataSchema(_) => FrameType::RegulatorDataSchemaResponse,
            FrameData::RegulatorData(_) => FrameType::RegulatorData,
            FrameData::SensorData(_) => FrameType::SensorData,
            FrameData::Unknown { .. } => return None,
        })
    }

    /// Raw frame type byte, also valid for unknown frames
    pub fn frame_type_byte(&self) -> u8 {
        match self {
            FrameData::Unknown { frame_type, .. } => *frame_type,
            other => other.frame_type().map(|t| t.as_byte()).unwrap_or(0),
        }
    }

    /// Decode a payload for the given frame type code
    pub fn decode(frame_type: u8, payload: &[u8], context: &DecodeContext) -> Result<FrameData> {
        let Some(known) = FrameType::from_byte(frame_type) else {
            return Ok(FrameData::Unknown {
                frame_type,
                payload: payload.to_vec(),
            });
        };

        let cursor = &mut Cursor::new(payload);
        Ok(match known {
            FrameType::StopMaster => FrameData::StopMaster,
            FrameType::StartMaster => FrameData::StartMaster,
            FrameType::CheckDevice => FrameData::CheckDevice,
            FrameType::EcomaxParameters => FrameData::EcomaxParametersRequest {
                count: cursor.read_u8()?,
                start: cursor.read_u8()?,
            },
            FrameType::MixerParameters => FrameData::MixerParametersRequest {
                count: cursor.read_u8()?,
                start: cursor.read_u8()?,
            },
            FrameType::SetEcomaxParameter => FrameData::SetEcomaxParameter {
                index: cursor.read_u8()?,
                value: cursor.read_uint(1)?,
            },
            FrameType::SetMixerParameter => FrameData::SetMixerParameter {
                device_index: cursor.read_u8()?,
                index: cursor.read_u8()?,
                value: cursor.read_uint(1)?,
            },
            FrameType::Uid => FrameData::UidRequest,
            FrameType::Password => FrameData::PasswordRequest,
            FrameType::EcomaxControl => FrameData::EcomaxControl {
                value: cursor.read_u8()?,
            },
            FrameType::Alerts => FrameData::AlertsRequest(alerts::decode_request(cursor)?),
            FrameType::ProgramVersion => FrameData::ProgramVersionRequest,
            FrameType::Schedules => FrameData::SchedulesRequest,
            FrameType::SetSchedule => FrameData::SetSchedule(schedules::decode_set(cursor)?),
            FrameType::ThermostatParameters => FrameData::ThermostatParametersRequest {
                count: cursor.read_u8()?,
                start: cursor.read_u8()?,
            },
            FrameType::SetThermostatParameter => {
                let index = cursor.read_u8()?;
                let size = if cursor.remaining() >= 2 { 2 } else { 1 };
                FrameData::SetThermostatParameter {
                    index,
                    value: cursor.read_uint(size)?,
                    size: size as u8,
                }
            },
            FrameType::RegulatorDataSchema => FrameData::RegulatorDataSchemaRequest,

            FrameType::DeviceAvailableResponse => {
                cursor.skip(1)?;
                FrameData::DeviceAvailable(network_info::decode(cursor)?)
            },
            FrameType::EcomaxParametersResponse => {
                FrameData::EcomaxParameters(parameters::decode_ecomax(cursor)?)
            },
            FrameType::MixerParametersResponse => {
                FrameData::MixerParameters(parameters::decode_mixer(cursor)?)
            },
            FrameType::SetEcomaxParameterResponse => FrameData::SetEcomaxParameterAck,
            FrameType::SetMixerParameterResponse => FrameData::SetMixerParameterAck,
            FrameType::UidResponse => FrameData::Uid(product_info::decode(cursor)?),
            FrameType::PasswordResponse => {
                let password = cursor.read_var_string()?;
                FrameData::Password((!password.is_empty()).then_some(password))
            },
            FrameType::EcomaxControlResponse => FrameData::EcomaxControlAck,
            FrameType::AlertsResponse => FrameData::Alerts(alerts::decode(cursor)?),
            FrameType::ProgramVersionResponse => {
                FrameData::ProgramVersion(program_version::decode(cursor)?)
            },
            FrameType::SchedulesResponse => FrameData::Schedules(schedules::decode(cursor)?),
            FrameType::SetScheduleResponse => FrameData::SetScheduleAck,
            FrameType::ThermostatParametersResponse => FrameData::ThermostatParameters(
                parameters::decode_thermostat(cursor, context.thermostat_count)?,
            ),
            FrameType::SetThermostatParameterResponse => FrameData::SetThermostatParameterAck,
            FrameType::RegulatorDataSchemaResponse => {
                FrameData::RegulatorDataSchema(regulator_data::decode_schema(cursor)?)
            },

            FrameType::RegulatorData => FrameData::RegulatorData(regulator_data::decode(
                cursor,
                context.regdata_schema.as_ref(),
            )?),
            FrameType::SensorData => FrameData::SensorData(sensor_data::decode(cursor)?),
        })
    }

    /// Encode the payload bytes for this frame
    pub fn encode(&self, context: &DecodeContext) -> Result<Vec<u8>> {
        let mut writer = PayloadWriter::new();
        match self {
            FrameData::StopMaster
            | FrameData::StartMaster
            | FrameData::CheckDevice
            | FrameData::UidRequest
            | FrameData::PasswordRequest
            | FrameData::ProgramVersionRequest
            | FrameData::SchedulesRequest
            | FrameData::RegulatorDataSchemaRequest
            | FrameData::SetEcomaxParameterAck
            | FrameData::SetMixerParameterAck
            | FrameData::EcomaxControlAck
            | FrameData::SetScheduleAck
            | FrameData::SetThermostatParameterAck => {},

            FrameData::EcomaxParametersRequest { start, count }
            | FrameData::MixerParametersRequest { start, count }
            | FrameData::ThermostatParametersRequest { start, count } => {
                writer.put_u8(*count);
                writer.put_u8(*start);
            },
            FrameData::SetEcomaxParameter { index, value } => {
                writer.put_u8(*index);
                writer.put_uint(*value, 1);
            },
            FrameData::SetMixerParameter {
                device_index,
                index,
                value,
            } => {
                writer.put_u8(*device_index);
                writer.put_u8(*index);
                writer.put_uint(*value, 1);
            },
            FrameData::EcomaxControl { value } => writer.put_u8(*value),
            FrameData::AlertsRequest(request) => alerts::encode_request(&mut writer, request),
            FrameData::SetSchedule(set) => schedules::encode_set(&mut writer, set),
            FrameData::SetThermostatParameter { index, value, size } => {
                writer.put_u8(*index);
                writer.put_uint(*value, usize::from(*size));
            },

            FrameData::DeviceAvailable(info) => {
                writer.put_u8(1);
                network_info::encode(&mut writer, info);
            },
            FrameData::EcomaxParameters(parameters) => {
                parameters::encode_ecomax(&mut writer, parameters)
            },
            FrameData::MixerParameters(parameters) => {
                parameters::encode_mixer(&mut writer, parameters)
            },
            FrameData::Uid(info) => product_info::encode(&mut writer, info),
            FrameData::Password(password) => {
                writer.put_var_string(password.as_deref().unwrap_or(""))
            },
            FrameData::Alerts(alerts) => alerts::encode(&mut writer, alerts),
            FrameData::ProgramVersion(info) => program_version::encode(&mut writer, info),
            FrameData::Schedules(schedules) => schedules::encode(&mut writer, schedules),
            FrameData::ThermostatParameters(parameters) => {
                parameters::encode_thermostat(&mut writer, parameters)
            },
            FrameData::RegulatorDataSchema(schema) => {
                regulator_data::encode_schema(&mut writer, schema)
            },

            FrameData::RegulatorData(data) => {
                regulator_data::encode(&mut writer, data, context.regdata_schema.as_ref())
            },
            FrameData::SensorData(data) => sensor_data::encode(&mut writer, data),

            FrameData::Unknown { payload, .. } => writer.put_bytes(payload),
        }
        Ok(writer.into_bytes())
    }

    /// Embedded frame versions, for messages that carry them
    pub fn frame_versions(&self) -> Option<&[(u16, u16)]> {
        match self {
            FrameData::SensorData(data) => Some(&data.frame_versions),
            FrameData::RegulatorData(data) => Some(&data.frame_versions),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Frame types may be compared against raw codes in version tables
impl PartialEq<u16> for FrameType {
    fn eq(&self, other: &u16) -> bool {
        u16::from(self.as_byte()) == *other
    }
}

impl FrameData {
    /// Convenience check used by tests and diagnostics
    pub fn is_unknown(&self) -> bool {
        matches!(self, FrameData::Unknown { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: FrameData) {
        let context = DecodeContext::default();
        let payload = data.encode(&context).unwrap();
        let decoded = FrameData::decode(data.frame_type_byte(), &payload, &context).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_frame_type_codes() {
        assert_eq!(FrameType::CheckDevice.as_byte(), 48);
        assert_eq!(FrameType::ProgramVersion.as_byte(), 64);
        assert_eq!(FrameType::Schedules.as_byte(), 70);
        assert_eq!(FrameType::SetSchedule.as_byte(), 71);
        assert_eq!(FrameType::ThermostatParameters.as_byte(), 82);
        assert_eq!(FrameType::SetThermostatParameter.as_byte(), 83);
        assert_eq!(FrameType::RegulatorData.as_byte(), 8);
        assert_eq!(FrameType::SensorData.as_byte(), 53);
    }

    #[test]
    fn test_response_pairing() {
        assert_eq!(
            FrameType::EcomaxParameters.response(),
            Some(FrameType::EcomaxParametersResponse)
        );
        assert_eq!(
            FrameType::ProgramVersion.response(),
            Some(FrameType::ProgramVersionResponse)
        );
        assert_eq!(
            FrameType::Schedules.response(),
            Some(FrameType::SchedulesResponse)
        );
        // Responses and messages have no paired response
        assert_eq!(FrameType::UidResponse.response(), None);
        assert_eq!(FrameType::SensorData.response(), None);
    }

    #[test]
    fn test_direction_classification() {
        assert!(FrameType::Uid.is_request());
        assert!(FrameType::UidResponse.is_response());
        assert!(FrameType::SensorData.is_message());
        assert!(!FrameType::SensorData.is_request());
        // RegulatorData code 8 has no response bit but is a message
        assert!(FrameType::RegulatorData.is_message());
        assert!(!FrameType::RegulatorData.is_request());
    }

    #[test]
    fn test_request_payload_roundtrips() {
        roundtrip(FrameData::StartMaster);
        roundtrip(FrameData::EcomaxParametersRequest { start: 0, count: 255 });
        roundtrip(FrameData::MixerParametersRequest { start: 5, count: 10 });
        roundtrip(FrameData::SetEcomaxParameter { index: 4, value: 65 });
        roundtrip(FrameData::SetMixerParameter {
            device_index: 1,
            index: 2,
            value: 40,
        });
        roundtrip(FrameData::EcomaxControl { value: 1 });
        roundtrip(FrameData::AlertsRequest(AlertsRequest::default()));
        roundtrip(FrameData::SetThermostatParameter {
            index: 3,
            value: 225,
            size: 2,
        });
    }

    #[test]
    fn test_password_roundtrip() {
        roundtrip(FrameData::Password(Some("0000".to_string())));
        roundtrip(FrameData::Password(None));
    }

    #[test]
    fn test_unknown_frame_retained() {
        let context = DecodeContext::default();
        let decoded = FrameData::decode(0x7B, &[1, 2, 3], &context).unwrap();
        assert_eq!(
            decoded,
            FrameData::Unknown {
                frame_type: 0x7B,
                payload: vec![1, 2, 3],
            }
        );
        assert!(decoded.is_unknown());
        assert_eq!(decoded.encode(&context).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_device_available_roundtrip() {
        roundtrip(FrameData::DeviceAvailable(NetworkInfo::default()));
    }

    #[test]
    fn test_program_version_roundtrip() {
        roundtrip(FrameData::ProgramVersion(VersionInfo {
            address: 0x45,
            ..Default::default()
        }));
    }
}
