//! Parameter payloads
//!
//! Parameter responses carry runs of (value, min, max) triples indexed
//! from a start offset. A triple of all-0xFF bytes means the controller
//! does not expose that slot; absent slots are filtered out on decode and
//! re-emitted as 0xFF runs on encode so indices stay aligned.

use serde::{Deserialize, Serialize};

use crate::consts::BYTE_UNDEFINED;
use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;

/// Raw parameter triple as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValues {
    pub value: u16,
    pub min_value: u16,
    pub max_value: u16,
}

impl ParameterValues {
    pub fn new(value: u16, min_value: u16, max_value: u16) -> Self {
        Self {
            value,
            min_value,
            max_value,
        }
    }

    /// Check a candidate raw value against the inclusive range
    pub fn in_range(&self, value: u16) -> bool {
        value >= self.min_value && value <= self.max_value
    }
}

/// Read one triple of the given width, `None` when the slot is absent
pub fn unpack_parameter(cursor: &mut Cursor<'_>, size: usize) -> Result<Option<ParameterValues>> {
    let raw = cursor.read_bytes(size * 3)?;
    if raw.iter().all(|byte| *byte == BYTE_UNDEFINED) {
        return Ok(None);
    }

    let word = |chunk: &[u8]| -> u16 {
        match size {
            1 => u16::from(chunk[0]),
            _ => u16::from_le_bytes([chunk[0], chunk[1]]),
        }
    };

    Ok(Some(ParameterValues {
        value: word(&raw[0..size]),
        min_value: word(&raw[size..2 * size]),
        max_value: word(&raw[2 * size..3 * size]),
    }))
}

/// Write one triple, or an absence marker
pub fn pack_parameter(writer: &mut PayloadWriter, values: Option<&ParameterValues>, size: usize) {
    match values {
        Some(values) => {
            writer.put_uint(values.value, size);
            writer.put_uint(values.min_value, size);
            writer.put_uint(values.max_value, size);
        },
        None => {
            for _ in 0..size * 3 {
                writer.put_u8(BYTE_UNDEFINED);
            }
        },
    }
}

/// Sparse run of parameters indexed from `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParameterRun {
    pub start: u8,
    /// Number of slots in the run, present or not
    pub count: u8,
    /// Present slots as (absolute index, values)
    pub values: Vec<(u8, ParameterValues)>,
}

fn decode_run(cursor: &mut Cursor<'_>, start: u8, count: u8) -> Result<Vec<(u8, ParameterValues)>> {
    let mut values = Vec::new();
    for index in start..start.saturating_add(count) {
        if let Some(parameter) = unpack_parameter(cursor, 1)? {
            values.push((index, parameter));
        }
    }
    Ok(values)
}

fn encode_run(writer: &mut PayloadWriter, run: &ParameterRun) {
    for index in run.start..run.start.saturating_add(run.count) {
        let slot = run
            .values
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, values)| values);
        pack_parameter(writer, slot, 1);
    }
}

// ============================================================================
// ecoMAX parameters
// ============================================================================

/// Payload of the ecoMAX parameters response
pub type EcomaxParameters = ParameterRun;

pub fn decode_ecomax(cursor: &mut Cursor<'_>) -> Result<EcomaxParameters> {
    cursor.skip(1)?;
    let start = cursor.read_u8()?;
    let count = cursor.read_u8()?;
    Ok(ParameterRun {
        start,
        count,
        values: decode_run(cursor, start, count)?,
    })
}

pub fn encode_ecomax(writer: &mut PayloadWriter, parameters: &EcomaxParameters) {
    writer.put_u8(0);
    writer.put_u8(parameters.start);
    writer.put_u8(parameters.count);
    encode_run(writer, parameters);
}

// ============================================================================
// Mixer parameters
// ============================================================================

/// Payload of the mixer parameters response: one run per attached mixer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MixerParameters {
    pub start: u8,
    pub count: u8,
    /// Runs keyed by mixer index; mixers with no present slots are dropped
    pub mixers: Vec<(u8, Vec<(u8, ParameterValues)>)>,
    /// Total mixer slots announced by the controller
    pub mixer_count: u8,
}

pub fn decode_mixer(cursor: &mut Cursor<'_>) -> Result<MixerParameters> {
    cursor.skip(1)?;
    let start = cursor.read_u8()?;
    let count = cursor.read_u8()?;
    let mixer_count = cursor.read_u8()?;

    let mut mixers = Vec::new();
    for index in 0..mixer_count {
        let values = decode_run(cursor, start, count)?;
        if !values.is_empty() {
            mixers.push((index, values));
        }
    }

    Ok(MixerParameters {
        start,
        count,
        mixers,
        mixer_count,
    })
}

pub fn encode_mixer(writer: &mut PayloadWriter, parameters: &MixerParameters) {
    writer.put_u8(0);
    writer.put_u8(parameters.start);
    writer.put_u8(parameters.count);
    writer.put_u8(parameters.mixer_count);
    for index in 0..parameters.mixer_count {
        let run = ParameterRun {
            start: parameters.start,
            count: parameters.count,
            values: parameters
                .mixers
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, values)| values.clone())
                .unwrap_or_default(),
        };
        encode_run(writer, &run);
    }
}

// ============================================================================
// Thermostat parameters
// ============================================================================

/// Per-slot byte widths for the thermostat catalogue; slots beyond the
/// table are single-byte.
pub const THERMOSTAT_PARAMETER_SIZES: &[usize] = &[1, 2, 2, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 1, 1];

fn thermostat_slot_size(index: u8) -> usize {
    THERMOSTAT_PARAMETER_SIZES
        .get(usize::from(index))
        .copied()
        .unwrap_or(1)
}

/// Payload of the thermostat parameters response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ThermostatParameters {
    pub start: u8,
    pub count: u8,
    /// The profile parameter set at the controller level
    pub profile: Option<ParameterValues>,
    /// Runs keyed by thermostat index
    pub thermostats: Vec<(u8, Vec<(u8, ParameterValues)>)>,
    /// Number of thermostats the payload is divided between
    pub thermostat_count: u8,
}

/// Decode a thermostat parameters payload.
///
/// The (start + count) range spans all attached thermostats; the caller
/// supplies the thermostat count learned from sensor data.
pub fn decode_thermostat(cursor: &mut Cursor<'_>, thermostat_count: u8) -> Result<ThermostatParameters> {
    cursor.skip(1)?;
    let start = cursor.read_u8()?;
    let count = cursor.read_u8()?;
    let profile = unpack_parameter(cursor, 1)?;

    let mut thermostats = Vec::new();
    if thermostat_count > 0 {
        // The (start + count) range spans every device's block
        let slots_end = (usize::from(start) + usize::from(count)) / usize::from(thermostat_count);
        for index in 0..thermostat_count {
            let mut values = Vec::new();
            for slot in usize::from(start)..slots_end {
                let slot = slot as u8;
                if let Some(parameter) = unpack_parameter(cursor, thermostat_slot_size(slot))? {
                    values.push((slot, parameter));
                }
            }
            if !values.is_empty() {
                thermostats.push((index, values));
            }
        }
    }

    Ok(ThermostatParameters {
        start,
        count,
        profile,
        thermostats,
        thermostat_count,
    })
}

pub fn encode_thermostat(writer: &mut PayloadWriter, parameters: &ThermostatParameters) {
    writer.put_u8(0);
    writer.put_u8(parameters.start);
    writer.put_u8(parameters.count);
    pack_parameter(writer, parameters.profile.as_ref(), 1);

    if parameters.thermostat_count == 0 {
        return;
    }
    let slots_end = (usize::from(parameters.start) + usize::from(parameters.count))
        / usize::from(parameters.thermostat_count);
    for index in 0..parameters.thermostat_count {
        let values = parameters
            .thermostats
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[]);
        for slot in usize::from(parameters.start)..slots_end {
            let slot = slot as u8;
            let entry = values.iter().find(|(i, _)| *i == slot).map(|(_, v)| v);
            pack_parameter(writer, entry, thermostat_slot_size(slot));
        }
    }
}
