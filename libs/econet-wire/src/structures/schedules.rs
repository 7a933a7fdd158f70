//! Schedule payloads
//!
//! A schedule covers 7 weekdays of 48 half-hour slots each. Days pack
//! MSB-first into 6 bytes, 42 bytes per schedule, day order starting on
//! Sunday. A set-schedule frame carries the complete schedule set; the
//! controller replaces its whole table on every write.

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;
use crate::structures::parameters::{pack_parameter, unpack_parameter, ParameterValues};

/// Days per schedule
pub const SCHEDULE_DAYS: usize = 7;
/// Half-hour slots per day
pub const SLOTS_PER_DAY: usize = 48;
/// Encoded size of one schedule bitfield
pub const SCHEDULE_SIZE: usize = SCHEDULE_DAYS * SLOTS_PER_DAY / 8;

/// Known schedule names, in wire index order
pub const SCHEDULE_NAMES: &[&str] = &[
    "heating",
    "water_heater",
    "circulation_pump",
    "boiler_work",
    "boiler_clean",
    "heat_exchanger_clean",
    "mixer_1",
    "mixer_2",
    "mixer_3",
    "mixer_4",
    "mixer_5",
    "mixer_6",
    "mixer_7",
    "mixer_8",
    "mixer_9",
    "mixer_10",
    "thermostat_1",
    "thermostat_2",
    "thermostat_3",
    "circuit_1",
    "circuit_2",
    "circuit_3",
    "circuit_4",
    "circuit_5",
    "circuit_6",
    "circuit_7",
    "panel_1",
    "panel_2",
    "panel_3",
    "panel_4",
    "panel_5",
    "panel_6",
    "panel_7",
    "main_heater_solar",
    "heating_circulation",
    "internal_thermostat",
    "heater",
    "water_heater_2",
    "intake",
    "intake_summer",
];

/// Name for a schedule wire index
pub fn schedule_name(index: u8) -> Option<&'static str> {
    SCHEDULE_NAMES.get(usize::from(index)).copied()
}

/// Wire index for a schedule name
pub fn schedule_index(name: &str) -> Option<u8> {
    SCHEDULE_NAMES
        .iter()
        .position(|candidate| *candidate == name)
        .map(|index| index as u8)
}

/// 7 x 48 slot matrix, `true` = active ("day") slot
pub type ScheduleMatrix = [[bool; SLOTS_PER_DAY]; SCHEDULE_DAYS];

/// One schedule as reported by the schedules response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub index: u8,
    /// Master switch for the schedule, reported as a 0..=1 parameter
    pub switch: ParameterValues,
    /// Associated numeric parameter, absent on some schedules
    pub parameter: Option<ParameterValues>,
    #[serde(with = "serde_matrix")]
    pub schedule: ScheduleMatrix,
}

/// Payload of the schedules response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schedules {
    pub start: u8,
    pub entries: Vec<ScheduleEntry>,
}

/// One schedule inside a set-schedule request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScheduleEntry {
    pub index: u8,
    pub switch: u8,
    pub parameter: u8,
    #[serde(with = "serde_matrix")]
    pub schedule: ScheduleMatrix,
}

/// Payload of the set-schedule request: the full schedule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SetSchedule {
    pub entries: Vec<SetScheduleEntry>,
}

fn decode_matrix(cursor: &mut Cursor<'_>) -> Result<ScheduleMatrix> {
    let bytes = cursor.read_bytes(SCHEDULE_SIZE)?;
    let mut matrix = [[false; SLOTS_PER_DAY]; SCHEDULE_DAYS];
    for (bit_index, slot) in matrix.iter_mut().flatten().enumerate() {
        let byte = bytes[bit_index / 8];
        // MSB-first within each byte
        *slot = byte & (0x80 >> (bit_index % 8)) != 0;
    }
    Ok(matrix)
}

fn encode_matrix(writer: &mut PayloadWriter, matrix: &ScheduleMatrix) {
    let mut byte = 0u8;
    for (bit_index, slot) in matrix.iter().flatten().enumerate() {
        if *slot {
            byte |= 0x80 >> (bit_index % 8);
        }
        if bit_index % 8 == 7 {
            writer.put_u8(byte);
            byte = 0;
        }
    }
}

pub fn decode(cursor: &mut Cursor<'_>) -> Result<Schedules> {
    cursor.skip(1)?;
    let start = cursor.read_u8()?;
    let count = cursor.read_u8()?;

    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let index = cursor.read_u8()?;
        let switch = ParameterValues::new(u16::from(cursor.read_u8()?), 0, 1);
        let parameter = unpack_parameter(cursor, 1)?;
        let schedule = decode_matrix(cursor)?;
        entries.push(ScheduleEntry {
            index,
            switch,
            parameter,
            schedule,
        });
    }

    Ok(Schedules { start, entries })
}

pub fn encode(writer: &mut PayloadWriter, schedules: &Schedules) {
    writer.put_u8(1);
    writer.put_u8(schedules.start);
    writer.put_u8(schedules.entries.len() as u8);
    for entry in &schedules.entries {
        writer.put_u8(entry.index);
        writer.put_u8(entry.switch.value as u8);
        pack_parameter(writer, entry.parameter.as_ref(), 1);
        encode_matrix(writer, &entry.schedule);
    }
}

pub fn decode_set(cursor: &mut Cursor<'_>) -> Result<SetSchedule> {
    let count = cursor.read_u8()?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let index = cursor.read_u8()?;
        let switch = cursor.read_u8()?;
        let parameter = cursor.read_u8()?;
        let schedule = decode_matrix(cursor)?;
        entries.push(SetScheduleEntry {
            index,
            switch,
            parameter,
            schedule,
        });
    }
    Ok(SetSchedule { entries })
}

pub fn encode_set(writer: &mut PayloadWriter, set: &SetSchedule) {
    writer.put_u8(set.entries.len() as u8);
    for entry in &set.entries {
        writer.put_u8(entry.index);
        writer.put_u8(entry.switch);
        writer.put_u8(entry.parameter);
        encode_matrix(writer, &entry.schedule);
    }
}

/// serde support for the fixed-size slot matrix
mod serde_matrix {
    use super::{ScheduleMatrix, SCHEDULE_DAYS, SLOTS_PER_DAY};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(matrix: &ScheduleMatrix, serializer: S) -> Result<S::Ok, S::Error> {
        let days: Vec<Vec<bool>> = matrix.iter().map(|day| day.to_vec()).collect();
        serde::Serialize::serialize(&days, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScheduleMatrix, D::Error> {
        let days: Vec<Vec<bool>> = Deserialize::deserialize(deserializer)?;
        if days.len() != SCHEDULE_DAYS || days.iter().any(|day| day.len() != SLOTS_PER_DAY) {
            return Err(D::Error::custom("schedule matrix must be 7 x 48"));
        }
        let mut matrix = [[false; SLOTS_PER_DAY]; SCHEDULE_DAYS];
        for (target, source) in matrix.iter_mut().zip(days) {
            target.copy_from_slice(&source);
        }
        Ok(matrix)
    }
}
