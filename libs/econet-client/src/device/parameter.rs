//! Parameters
//!
//! A parameter is a controller-editable scalar with validated bounds.
//! The wire carries raw integers; a per-catalogue descriptor supplies
//! name, kind, scale and offset. Rendered value = raw x scale + offset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use econet_wire::consts::{STATE_OFF, STATE_ON};
use econet_wire::{ParameterValues, Value};

use crate::error::{Error, Result};

/// Parameter kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Scaled numeric value
    Number,
    /// Binary on/off value
    Switch,
}

/// Static description of one catalogue slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub kind: ParameterKind,
    /// Rendered = raw x scale + offset
    pub scale: f64,
    pub offset: f64,
    /// Wire width in bytes (1 or 2)
    pub size: u8,
    pub unit: Option<&'static str>,
}

impl ParameterDescriptor {
    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: ParameterKind::Number,
            scale: 1.0,
            offset: 0.0,
            size: 1,
            unit: None,
        }
    }

    pub const fn switch(name: &'static str) -> Self {
        Self {
            name,
            kind: ParameterKind::Switch,
            scale: 1.0,
            offset: 0.0,
            size: 1,
            unit: None,
        }
    }

    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub const fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub const fn wide(mut self) -> Self {
        self.size = 2;
        self
    }

    /// Raw wire value to rendered value
    pub fn render(&self, raw: u16) -> f64 {
        f64::from(raw) * self.scale + self.offset
    }

    /// Rendered value back to the raw wire value
    pub fn unrender(&self, rendered: f64) -> f64 {
        ((rendered - self.offset) / self.scale).round()
    }
}

/// A live parameter: descriptor plus last-known wire values
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub descriptor: ParameterDescriptor,
    /// Slot index within the owning catalogue
    pub index: u8,
    pub values: ParameterValues,
    /// A write has been sent but not yet confirmed
    pub pending_write: bool,
    pub updated_at: DateTime<Utc>,
}

impl Parameter {
    pub fn new(descriptor: ParameterDescriptor, index: u8, values: ParameterValues) -> Self {
        Self {
            descriptor,
            index,
            values,
            pending_write: false,
            updated_at: Utc::now(),
        }
    }

    /// Refresh from an inbound parameters frame
    pub fn update(&mut self, values: ParameterValues) {
        self.values = values;
        self.pending_write = false;
        self.updated_at = Utc::now();
    }

    pub fn value(&self) -> f64 {
        self.descriptor.render(self.values.value)
    }

    pub fn min_value(&self) -> f64 {
        self.descriptor.render(self.values.min_value)
    }

    pub fn max_value(&self) -> f64 {
        self.descriptor.render(self.values.max_value)
    }

    /// The cell value subscribers observe
    pub fn cell_value(&self) -> Value {
        match self.descriptor.kind {
            ParameterKind::Switch => Value::Bool(self.values.value != 0),
            ParameterKind::Number => Value::Float(self.value()),
        }
    }

    /// Convert a caller-supplied value to a validated raw wire value.
    ///
    /// Fails with [`Error::OutOfRange`] before any frame is sent.
    pub fn raw_for(&self, value: &Value) -> Result<u16> {
        let rendered = match (self.descriptor.kind, value) {
            (ParameterKind::Switch, Value::String(state)) => match state.as_ref() {
                s if s == STATE_ON => 1.0,
                s if s == STATE_OFF => 0.0,
                other => {
                    return Err(Error::invalid_data(format!(
                        "invalid switch state: {other:?}"
                    )))
                },
            },
            (ParameterKind::Switch, Value::Bool(b)) => f64::from(u8::from(*b)),
            (_, value) => value.as_f64().ok_or_else(|| {
                Error::invalid_data(format!(
                    "cannot set '{}' from {value:?}",
                    self.descriptor.name
                ))
            })?,
        };

        let raw = self.descriptor.unrender(rendered);
        if raw < f64::from(self.values.min_value) || raw > f64::from(self.values.max_value) {
            return Err(Error::OutOfRange {
                value: rendered,
                min: self.min_value(),
                max: self.max_value(),
            });
        }
        Ok(raw as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(values: ParameterValues) -> Parameter {
        Parameter::new(ParameterDescriptor::number("test_param"), 0, values)
    }

    // ========== scaling ==========

    #[test]
    fn test_plain_render() {
        let param = plain(ParameterValues::new(65, 0, 100));
        assert_eq!(param.value(), 65.0);
        assert_eq!(param.min_value(), 0.0);
        assert_eq!(param.max_value(), 100.0);
    }

    #[test]
    fn test_scaled_render() {
        let descriptor = ParameterDescriptor::number("heating_curve").with_scale(0.1);
        let param = Parameter::new(descriptor, 5, ParameterValues::new(13, 1, 40));
        assert!((param.value() - 1.3).abs() < 1e-9);
        assert_eq!(param.raw_for(&Value::Float(2.0)).unwrap(), 20);
    }

    #[test]
    fn test_offset_render() {
        // Temperature shift stored as 0..40 meaning -20..20
        let descriptor = ParameterDescriptor::number("heating_curve_shift").with_offset(-20.0);
        let param = Parameter::new(descriptor, 6, ParameterValues::new(20, 0, 40));
        assert_eq!(param.value(), 0.0);
        assert_eq!(param.min_value(), -20.0);
        assert_eq!(param.raw_for(&Value::Float(-5.0)).unwrap(), 15);
    }

    // ========== validation ==========

    #[test]
    fn test_out_of_range_rejected() {
        let param = plain(ParameterValues::new(50, 0, 100));
        let err = param.raw_for(&Value::Int(150)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
        assert_eq!(param.raw_for(&Value::Int(100)).unwrap(), 100);
        assert_eq!(param.raw_for(&Value::Int(0)).unwrap(), 0);
    }

    #[test]
    fn test_switch_states() {
        let param = Parameter::new(
            ParameterDescriptor::switch("fuzzy_logic"),
            18,
            ParameterValues::new(0, 0, 1),
        );
        assert_eq!(param.raw_for(&Value::from(STATE_ON)).unwrap(), 1);
        assert_eq!(param.raw_for(&Value::from(STATE_OFF)).unwrap(), 0);
        assert_eq!(param.raw_for(&Value::Bool(true)).unwrap(), 1);
        assert!(param.raw_for(&Value::from("auto")).is_err());
        assert_eq!(param.cell_value(), Value::Bool(false));
    }

    #[test]
    fn test_update_clears_pending() {
        let mut param = plain(ParameterValues::new(10, 0, 100));
        param.pending_write = true;
        param.update(ParameterValues::new(20, 0, 100));
        assert!(!param.pending_write);
        assert_eq!(param.values.value, 20);
    }
}
