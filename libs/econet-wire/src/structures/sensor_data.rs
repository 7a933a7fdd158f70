//! Sensor data structure
//!
//! The periodic broadcast with the controller's live state: output
//! relays, temperatures, targets, module firmware versions, the lambda
//! probe and per-sub-device blocks for thermostats and mixers. Absent
//! readings are NaN floats or 0xFF bytes and are dropped on decode.

use serde::{Deserialize, Serialize};

use crate::consts::{DeviceState, LambdaState, BYTE_UNDEFINED};
use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;
use crate::structures::frame_versions::{self, FrameVersion};
use crate::value::Value;

/// Output relay names, one per bit of the outputs word
pub const OUTPUTS: &[&str] = &[
    "fan",
    "feeder",
    "heating_pump",
    "water_heater_pump",
    "circulation_pump",
    "lighter",
    "alarm",
    "outer_boiler",
    "fan2_exhaust",
    "feeder2",
    "outer_feeder",
    "solar_pump",
    "fireplace_pump",
    "gcz_contact",
    "blow_fan1",
    "blow_fan2",
];

/// Temperature sensor names, indexed by the wire index
pub const TEMPERATURES: &[&str] = &[
    "heating_temp",
    "feeder_temp",
    "water_heater_temp",
    "outside_temp",
    "return_temp",
    "exhaust_temp",
    "optical_temp",
    "upper_buffer_temp",
    "lower_buffer_temp",
    "upper_solar_temp",
    "lower_solar_temp",
    "fireplace_temp",
    "total_gain",
    "hydraulic_coupler_temp",
    "exchanger_temp",
    "air_in_temp",
    "air_out_temp",
];

/// Status byte names, in wire order
pub const STATUSES: &[&str] = &[
    "heating_target",
    "heating_status",
    "water_heater_target",
    "water_heater_status",
];

/// Fuel level readings of 101 and above carry this offset
const FUEL_LEVEL_OFFSET: u8 = 101;

/// Firmware version of one connected module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    /// Vendor suffix, module A only
    pub vendor: Option<(u8, u8)>,
}

impl ModuleVersion {
    pub fn to_version_string(&self) -> String {
        let base = format!("{}.{}.{}", self.major, self.minor, self.patch);
        match self.vendor {
            Some((code, version)) => format!("{base}.{}{version}", char::from(code)),
            None => base,
        }
    }
}

/// Firmware versions of every connected module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectedModules {
    pub module_a: Option<ModuleVersion>,
    pub module_b: Option<ModuleVersion>,
    pub module_c: Option<ModuleVersion>,
    pub ecolambda: Option<ModuleVersion>,
    pub ecoster: Option<ModuleVersion>,
    pub panel: Option<ModuleVersion>,
}

/// Lambda probe block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaSensor {
    pub state: LambdaState,
    pub target: u8,
    /// Oxygen level in percent (wire value is tenths)
    pub level: f64,
}

/// One thermostat's sensor block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermostatSensors {
    pub state: u8,
    pub current_temp: f32,
    pub target_temp: f32,
    pub contacts: bool,
    pub schedule: bool,
}

/// One mixer's sensor block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerSensors {
    pub current_temp: f32,
    pub target_temp: u8,
    pub pump: bool,
}

/// Decoded sensor data broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SensorData {
    pub frame_versions: Vec<FrameVersion>,
    pub state: u8,
    /// Output relay states, index-aligned with [`OUTPUTS`]
    pub outputs: u32,
    pub output_flags: u32,
    /// Present temperatures as (wire index, reading)
    pub temperatures: Vec<(u8, f32)>,
    /// Status bytes, index-aligned with [`STATUSES`]
    pub statuses: [u8; 4],
    pub pending_alerts: u8,
    pub fuel_level: Option<u8>,
    pub transmission: u8,
    pub fan_power: Option<f32>,
    pub boiler_load: Option<u8>,
    pub boiler_power: Option<f32>,
    pub fuel_consumption: Option<f32>,
    pub thermostat: u8,
    pub modules: ConnectedModules,
    pub lambda: Option<LambdaSensor>,
    /// Thermostat slots announced by the controller; absent when the
    /// block is missing entirely
    pub thermostats_available: Option<u8>,
    pub thermostat_sensors: Vec<(u8, ThermostatSensors)>,
    pub mixers_available: u8,
    pub mixer_sensors: Vec<(u8, MixerSensors)>,
}

fn decode_module(cursor: &mut Cursor<'_>, with_vendor: bool) -> Result<Option<ModuleVersion>> {
    let first = cursor.read_u8()?;
    if first == BYTE_UNDEFINED {
        return Ok(None);
    }
    let minor = cursor.read_u8()?;
    let patch = cursor.read_u8()?;
    let vendor = if with_vendor {
        Some((cursor.read_u8()?, cursor.read_u8()?))
    } else {
        None
    };
    Ok(Some(ModuleVersion {
        major: first,
        minor,
        patch,
        vendor,
    }))
}

fn encode_module(writer: &mut PayloadWriter, module: &Option<ModuleVersion>, with_vendor: bool) {
    match module {
        None => writer.put_u8(BYTE_UNDEFINED),
        Some(version) => {
            writer.put_u8(version.major);
            writer.put_u8(version.minor);
            writer.put_u8(version.patch);
            if with_vendor {
                let (code, vendor_version) = version.vendor.unwrap_or((b'A', 0));
                writer.put_u8(code);
                writer.put_u8(vendor_version);
            }
        },
    }
}

fn read_optional_f32(cursor: &mut Cursor<'_>) -> Result<Option<f32>> {
    let value = cursor.read_f32()?;
    Ok(if value.is_nan() { None } else { Some(value) })
}

fn put_optional_f32(writer: &mut PayloadWriter, value: Option<f32>) {
    writer.put_f32(value.unwrap_or(f32::NAN));
}

pub fn decode(cursor: &mut Cursor<'_>) -> Result<SensorData> {
    let frame_versions = frame_versions::decode(cursor)?;
    let state = cursor.read_u8()?;
    let outputs = cursor.read_u32()?;
    let output_flags = cursor.read_u32()?;

    let temperature_count = cursor.read_u8()?;
    let mut temperatures = Vec::new();
    for _ in 0..temperature_count {
        let index = cursor.read_u8()?;
        let value = cursor.read_f32()?;
        if !value.is_nan() && usize::from(index) < TEMPERATURES.len() {
            temperatures.push((index, value));
        }
    }

    let mut statuses = [0u8; 4];
    for status in statuses.iter_mut() {
        *status = cursor.read_u8()?;
    }

    let pending_alerts = cursor.read_u8()?;
    cursor.skip(usize::from(pending_alerts))?;

    let fuel_level = match cursor.read_u8()? {
        BYTE_UNDEFINED => None,
        level if level >= FUEL_LEVEL_OFFSET => Some(level - FUEL_LEVEL_OFFSET),
        level => Some(level),
    };

    let transmission = cursor.read_u8()?;
    let fan_power = read_optional_f32(cursor)?;
    let boiler_load = match cursor.read_u8()? {
        BYTE_UNDEFINED => None,
        load => Some(load),
    };
    let boiler_power = read_optional_f32(cursor)?;
    let fuel_consumption = read_optional_f32(cursor)?;
    let thermostat = cursor.read_u8()?;

    let modules = ConnectedModules {
        module_a: decode_module(cursor, true)?,
        module_b: decode_module(cursor, false)?,
        module_c: decode_module(cursor, false)?,
        ecolambda: decode_module(cursor, false)?,
        ecoster: decode_module(cursor, false)?,
        panel: decode_module(cursor, false)?,
    };

    let lambda = match cursor.read_u8()? {
        BYTE_UNDEFINED => None,
        lambda_state => {
            let target = cursor.read_u8()?;
            let level = cursor.read_u16()?;
            Some(LambdaSensor {
                state: LambdaState::from_byte(lambda_state),
                target,
                level: f64::from(level) / 10.0,
            })
        },
    };

    let mut thermostats_available = None;
    let mut thermostat_sensors = Vec::new();
    let contacts = cursor.read_u8()?;
    if contacts != BYTE_UNDEFINED {
        let available = cursor.read_u8()?;
        thermostats_available = Some(available);
        let mut contact_mask = 1u8;
        let mut schedule_mask = 1u8 << 3;
        for index in 0..available {
            let state = cursor.read_u8()?;
            let current_temp = cursor.read_f32()?;
            let target_temp = cursor.read_f32()?;
            let contact_state = contacts & contact_mask != 0;
            let schedule_state = contacts & schedule_mask != 0;
            contact_mask <<= 1;
            schedule_mask <<= 1;
            if !current_temp.is_nan() && target_temp > 0.0 {
                thermostat_sensors.push((
                    index,
                    ThermostatSensors {
                        state,
                        current_temp,
                        target_temp,
                        contacts: contact_state,
                        schedule: schedule_state,
                    },
                ));
            }
        }
    }

    let mixers_available = cursor.read_u8()?;
    let mut mixer_sensors = Vec::new();
    for index in 0..mixers_available {
        let current_temp = cursor.read_f32()?;
        let target_temp = cursor.read_u8()?;
        cursor.skip(1)?;
        let flags = cursor.read_u8()?;
        cursor.skip(1)?;
        if !current_temp.is_nan() {
            mixer_sensors.push((
                index,
                MixerSensors {
                    current_temp,
                    target_temp,
                    pump: flags & 0x01 != 0,
                },
            ));
        }
    }

    Ok(SensorData {
        frame_versions,
        state,
        outputs,
        output_flags,
        temperatures,
        statuses,
        pending_alerts,
        fuel_level,
        transmission,
        fan_power,
        boiler_load,
        boiler_power,
        fuel_consumption,
        thermostat,
        modules,
        lambda,
        thermostats_available,
        thermostat_sensors,
        mixers_available,
        mixer_sensors,
    })
}

pub fn encode(writer: &mut PayloadWriter, data: &SensorData) {
    frame_versions::encode(writer, &data.frame_versions);
    writer.put_u8(data.state);
    writer.put_u32(data.outputs);
    writer.put_u32(data.output_flags);

    writer.put_u8(data.temperatures.len() as u8);
    for (index, value) in &data.temperatures {
        writer.put_u8(*index);
        writer.put_f32(*value);
    }

    for status in data.statuses {
        writer.put_u8(status);
    }

    writer.put_u8(data.pending_alerts);
    for _ in 0..data.pending_alerts {
        writer.put_u8(0);
    }

    writer.put_u8(match data.fuel_level {
        None => BYTE_UNDEFINED,
        Some(level) => level,
    });
    writer.put_u8(data.transmission);
    put_optional_f32(writer, data.fan_power);
    writer.put_u8(data.boiler_load.unwrap_or(BYTE_UNDEFINED));
    put_optional_f32(writer, data.boiler_power);
    put_optional_f32(writer, data.fuel_consumption);
    writer.put_u8(data.thermostat);

    encode_module(writer, &data.modules.module_a, true);
    encode_module(writer, &data.modules.module_b, false);
    encode_module(writer, &data.modules.module_c, false);
    encode_module(writer, &data.modules.ecolambda, false);
    encode_module(writer, &data.modules.ecoster, false);
    encode_module(writer, &data.modules.panel, false);

    match &data.lambda {
        None => writer.put_u8(BYTE_UNDEFINED),
        Some(lambda) => {
            writer.put_u8(lambda.state.as_byte());
            writer.put_u8(lambda.target);
            writer.put_u16((lambda.level * 10.0).round() as u16);
        },
    }

    match data.thermostats_available {
        None => writer.put_u8(BYTE_UNDEFINED),
        Some(available) => {
            // Three contact bits, then three schedule bits
            let mut contacts = 0u8;
            for (index, sensors) in data.thermostat_sensors.iter().filter(|(i, _)| *i < 3) {
                if sensors.contacts {
                    contacts |= 1 << index;
                }
                if sensors.schedule {
                    contacts |= 1 << (index + 3);
                }
            }
            writer.put_u8(contacts);
            writer.put_u8(available);
            for index in 0..available {
                match data.thermostat_sensors.iter().find(|(i, _)| *i == index) {
                    Some((_, sensors)) => {
                        writer.put_u8(sensors.state);
                        writer.put_f32(sensors.current_temp);
                        writer.put_f32(sensors.target_temp);
                    },
                    None => {
                        writer.put_u8(0);
                        writer.put_f32(f32::NAN);
                        writer.put_f32(f32::NAN);
                    },
                }
            }
        },
    }

    writer.put_u8(data.mixers_available);
    for index in 0..data.mixers_available {
        match data.mixer_sensors.iter().find(|(i, _)| *i == index) {
            Some((_, sensors)) => {
                writer.put_f32(sensors.current_temp);
                writer.put_u8(sensors.target_temp);
                writer.put_u8(0);
                writer.put_u8(u8::from(sensors.pump));
                writer.put_u8(0);
            },
            None => {
                writer.put_f32(f32::NAN);
                writer.put_u8(0);
                writer.put_u8(0);
                writer.put_u8(0);
                writer.put_u8(0);
            },
        }
    }
}

impl SensorData {
    /// Flatten the broadcast into named data cells.
    ///
    /// Cell names follow the controller's vocabulary and are the keys
    /// applications subscribe to.
    pub fn named_values(&self) -> Vec<(String, Value)> {
        let mut cells: Vec<(String, Value)> = Vec::new();

        cells.push(("state".to_string(), Value::from(self.state)));
        for (index, name) in OUTPUTS.iter().enumerate() {
            cells.push((name.to_string(), Value::Bool(self.outputs & (1 << index) != 0)));
        }
        cells.push(("heating_pump_flag".to_string(), Value::Bool(self.output_flags & 0x04 != 0)));
        cells.push(("water_heater_pump_flag".to_string(), Value::Bool(self.output_flags & 0x08 != 0)));
        cells.push(("circulation_pump_flag".to_string(), Value::Bool(self.output_flags & 0x10 != 0)));
        cells.push(("solar_pump_flag".to_string(), Value::Bool(self.output_flags & 0x800 != 0)));

        for (index, value) in &self.temperatures {
            cells.push((TEMPERATURES[usize::from(*index)].to_string(), Value::from(*value)));
        }
        for (index, name) in STATUSES.iter().enumerate() {
            cells.push((name.to_string(), Value::from(self.statuses[index])));
        }

        cells.push(("pending_alerts".to_string(), Value::from(self.pending_alerts)));
        if let Some(fuel_level) = self.fuel_level {
            cells.push(("fuel_level".to_string(), Value::from(fuel_level)));
        }
        cells.push(("transmission".to_string(), Value::from(self.transmission)));
        if let Some(fan_power) = self.fan_power {
            cells.push(("fan_power".to_string(), Value::from(fan_power)));
        }
        if let Some(boiler_load) = self.boiler_load {
            cells.push(("boiler_load".to_string(), Value::from(boiler_load)));
        }
        if let Some(boiler_power) = self.boiler_power {
            cells.push(("boiler_power".to_string(), Value::from(boiler_power)));
        }
        if let Some(fuel_consumption) = self.fuel_consumption {
            cells.push(("fuel_consumption".to_string(), Value::from(fuel_consumption)));
        }
        cells.push(("thermostat".to_string(), Value::from(self.thermostat)));
        cells.push(("modules".to_string(), Value::Modules(self.modules.clone())));

        if let Some(lambda) = &self.lambda {
            cells.push(("lambda_state".to_string(), Value::from(lambda.state.as_byte())));
            cells.push(("lambda_target".to_string(), Value::from(lambda.target)));
            cells.push(("lambda_level".to_string(), Value::from(lambda.level)));
        }

        if let Some(available) = self.thermostats_available {
            cells.push(("thermostats_available".to_string(), Value::from(available)));
            cells.push((
                "thermostats_connected".to_string(),
                Value::from(self.thermostat_sensors.len() as u8),
            ));
        }
        cells.push(("mixers_available".to_string(), Value::from(self.mixers_available)));
        cells.push((
            "mixers_connected".to_string(),
            Value::from(self.mixer_sensors.len() as u8),
        ));

        cells
    }

    /// The controller's device state decoded from the state byte
    pub fn device_state(&self) -> DeviceState {
        DeviceState::from_byte(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorData {
        SensorData {
            frame_versions: vec![(49, 37), (50, 37)],
            state: 3,
            outputs: 0b0000_0000_0010_0011,
            output_flags: 0x04 | 0x800,
            temperatures: vec![(0, 64.5), (1, 32.0), (3, -4.25)],
            statuses: [65, 1, 50, 0],
            pending_alerts: 2,
            fuel_level: Some(87),
            transmission: 0,
            fan_power: Some(68.0),
            boiler_load: Some(42),
            boiler_power: Some(16.25),
            fuel_consumption: Some(1.5),
            thermostat: 1,
            modules: ConnectedModules {
                module_a: Some(ModuleVersion {
                    major: 18,
                    minor: 11,
                    patch: 58,
                    vendor: Some((b'K', 1)),
                }),
                panel: Some(ModuleVersion {
                    major: 6,
                    minor: 30,
                    patch: 36,
                    vendor: None,
                }),
                ..Default::default()
            },
            lambda: Some(LambdaSensor {
                state: LambdaState::Working,
                target: 2,
                level: 4.4,
            }),
            thermostats_available: Some(2),
            thermostat_sensors: vec![(
                0,
                ThermostatSensors {
                    state: 1,
                    current_temp: 22.5,
                    target_temp: 21.0,
                    contacts: true,
                    schedule: false,
                },
            )],
            mixers_available: 2,
            mixer_sensors: vec![(
                1,
                MixerSensors {
                    current_temp: 40.5,
                    target_temp: 42,
                    pump: true,
                },
            )],
        }
    }

    #[test]
    fn test_roundtrip() {
        let data = sample();
        let mut writer = PayloadWriter::new();
        encode(&mut writer, &data);

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        let decoded = decode(&mut cursor).unwrap();
        assert_eq!(decoded, data);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_minimal_roundtrip() {
        let data = SensorData::default();
        let mut writer = PayloadWriter::new();
        encode(&mut writer, &data);

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        // A default has thermostats_available == None encoded as 0xFF
        let decoded = decode(&mut cursor).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_named_values() {
        let data = sample();
        let cells = data.named_values();
        let lookup = |name: &str| {
            cells
                .iter()
                .find(|(cell, _)| cell == name)
                .map(|(_, value)| value.clone())
        };

        assert_eq!(lookup("state"), Some(Value::Int(3)));
        assert_eq!(lookup("fan"), Some(Value::Bool(true)));
        assert_eq!(lookup("feeder"), Some(Value::Bool(true)));
        assert_eq!(lookup("heating_pump"), Some(Value::Bool(false)));
        assert_eq!(lookup("lighter"), Some(Value::Bool(true)));
        assert_eq!(lookup("heating_temp"), Some(Value::Float(64.5)));
        assert_eq!(lookup("heating_target"), Some(Value::Int(65)));
        assert_eq!(lookup("fuel_level"), Some(Value::Int(87)));
        assert_eq!(lookup("mixers_connected"), Some(Value::Int(1)));
        assert_eq!(lookup("lambda_level"), Some(Value::Float(4.4)));
        // Absent readings produce no cell
        assert_eq!(lookup("outside_temp"), None);
    }

    #[test]
    fn test_fuel_level_offset() {
        let mut data = SensorData::default();
        data.fuel_level = Some(87);

        let mut writer = PayloadWriter::new();
        encode(&mut writer, &data);
        let mut bytes = writer.into_bytes();

        // Patch the encoded fuel level to the offset form: 87 + 101
        let fuel_offset = 1 + 1 + 4 + 4 + 1 + 4 + 1;
        assert_eq!(bytes[fuel_offset], 87);
        bytes[fuel_offset] = 87 + FUEL_LEVEL_OFFSET;

        let mut cursor = Cursor::new(&bytes);
        let decoded = decode(&mut cursor).unwrap();
        assert_eq!(decoded.fuel_level, Some(87));
    }

    #[test]
    fn test_module_version_string() {
        let version = ModuleVersion {
            major: 1,
            minor: 2,
            patch: 3,
            vendor: Some((b'A', 5)),
        };
        assert_eq!(version.to_version_string(), "1.2.3.A5");

        let version = ModuleVersion {
            major: 6,
            minor: 30,
            patch: 36,
            vendor: None,
        };
        assert_eq!(version.to_version_string(), "6.30.36");
    }
}
