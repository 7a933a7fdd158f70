//! Device model
//!
//! The ecoMAX controller is the root device; mixers and thermostats are
//! sub-devices created lazily when the first payload mentioning their
//! index arrives and destroyed with the connection. All three expose the
//! same capability surface through the [`Device`] trait, backed by a
//! shared [`DeviceBase`].

pub mod parameter;
pub mod params;
pub mod schedule;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use econet_wire::structures::parameters::{
    EcomaxParameters, MixerParameters, ParameterValues, ThermostatParameters,
};
use econet_wire::structures::regulator_data::{RegulatorData, RegulatorDataSchema};
use econet_wire::structures::schedules::{schedule_name, Schedules, SetSchedule, SetScheduleEntry};
use econet_wire::structures::sensor_data::SensorData;
use econet_wire::structures::{alerts::Alerts, product_info::ProductInfo};
use econet_wire::{DeviceAddress, Frame, FrameData, FrameType, Value};

use crate::error::{Error, Result};
use crate::events::{EventBus, Subscriber, SubscriptionId};
use crate::protocol::LinkHandle;
use crate::stats::DeviceTimes;

use parameter::{Parameter, ParameterDescriptor, ParameterKind};
use params::{descriptor_for, ECOMAX_CONTROL, THERMOSTAT_PROFILE};
use schedule::{Schedule, TimeOfDay, Weekday};

/// Device variants in the model tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Ecomax,
    Mixer,
    Thermostat,
}

/// State shared by every device variant
#[derive(Debug)]
pub struct DeviceBase {
    pub bus: EventBus,
    parameters: Mutex<HashMap<String, Parameter>>,
    times: Mutex<DeviceTimes>,
}

impl DeviceBase {
    fn new() -> Self {
        Self {
            bus: EventBus::new(),
            parameters: Mutex::new(HashMap::new()),
            times: Mutex::new(DeviceTimes::default()),
        }
    }

    fn record_seen(&self) {
        self.times.lock().unwrap().record_seen();
    }

    pub fn times(&self) -> DeviceTimes {
        self.times.lock().unwrap().clone()
    }

    fn parameter(&self, name: &str) -> Option<Parameter> {
        self.parameters.lock().unwrap().get(name).cloned()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.lock().unwrap().keys().cloned().collect()
    }

    /// Upsert a parameter from an inbound frame and publish its cell
    fn upsert_parameter(&self, descriptor: ParameterDescriptor, index: u8, values: ParameterValues) {
        let cell = {
            let mut parameters = self.parameters.lock().unwrap();
            let parameter = parameters
                .entry(descriptor.name.to_string())
                .and_modify(|parameter| parameter.update(values))
                .or_insert_with(|| Parameter::new(descriptor, index, values));
            parameter.cell_value()
        };
        self.bus.dispatch(descriptor.name, cell);
    }

    /// Mark a pending write and return the validated raw value
    fn prepare_write(&self, name: &str, value: &Value) -> Result<(Parameter, u16)> {
        let mut parameters = self.parameters.lock().unwrap();
        let parameter = parameters
            .get_mut(name)
            .ok_or_else(|| Error::not_available(format!("parameter '{name}'")))?;
        let raw = parameter.raw_for(value)?;
        parameter.pending_write = true;
        Ok((parameter.clone(), raw))
    }

    /// Apply the outcome of a write attempt
    fn finish_write(&self, name: &str, raw: Option<u16>) {
        let cell = {
            let mut parameters = self.parameters.lock().unwrap();
            let Some(parameter) = parameters.get_mut(name) else {
                return;
            };
            parameter.pending_write = false;
            match raw {
                Some(raw) => {
                    parameter.values.value = raw;
                    Some(parameter.cell_value())
                },
                None => None,
            }
        };
        if let Some(cell) = cell {
            self.bus.dispatch(name, cell);
        }
    }
}

/// Capability surface shared by the ecoMAX and its sub-devices
#[async_trait]
pub trait Device: Send + Sync {
    fn kind(&self) -> DeviceKind;

    fn base(&self) -> &DeviceBase;

    /// Current value, waiting up to `timeout` for the cell to appear
    async fn get(&self, name: &str, timeout: Option<Duration>) -> Result<Value> {
        self.base().bus.get(name, timeout).await
    }

    /// Current value without waiting
    fn get_nowait(&self, name: &str) -> Option<Value> {
        self.base().bus.get_nowait(name)
    }

    /// Wait until the cell exists
    async fn wait_for(&self, name: &str, timeout: Option<Duration>) -> Result<()> {
        self.base().bus.wait_for(name, timeout).await
    }

    fn subscribe(&self, name: &str, subscriber: Subscriber) -> SubscriptionId {
        self.base().bus.subscribe(name, subscriber)
    }

    fn subscribe_once(&self, name: &str, subscriber: Subscriber) -> SubscriptionId {
        self.base().bus.subscribe_once(name, subscriber)
    }

    fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        self.base().bus.unsubscribe(name, id)
    }

    /// Snapshot of every data cell
    fn data(&self) -> HashMap<String, Value> {
        self.base().bus.snapshot()
    }

    fn parameter(&self, name: &str) -> Option<Parameter> {
        self.base().parameter(name)
    }

    fn parameter_names(&self) -> Vec<String> {
        self.base().parameter_names()
    }

    /// Write a parameter; `Ok(false)` means the controller never
    /// confirmed within the retry budget
    async fn set(&self, name: &str, value: Value) -> Result<bool>;
}

// ============================================================================
// ecoMAX
// ============================================================================

pub(crate) struct EcomaxShared {
    base: DeviceBase,
    link: LinkHandle,
    mixers: Mutex<BTreeMap<u8, Arc<SubShared>>>,
    thermostats: Mutex<BTreeMap<u8, Arc<SubShared>>>,
    schedules: Mutex<BTreeMap<u8, Schedule>>,
    schema: Mutex<Option<RegulatorDataSchema>>,
}

pub(crate) struct SubShared {
    base: DeviceBase,
    kind: DeviceKind,
    index: u8,
    /// Parameter slots per device, learned from the payload split
    slot_count: Mutex<u8>,
}

/// Handle to the ecoMAX root device
#[derive(Clone)]
pub struct EcoMax {
    shared: Arc<EcomaxShared>,
}

/// Handle to a mixer sub-device
#[derive(Clone)]
pub struct Mixer {
    shared: Arc<SubShared>,
    link: LinkHandle,
}

/// Handle to a thermostat sub-device
#[derive(Clone)]
pub struct Thermostat {
    shared: Arc<SubShared>,
    link: LinkHandle,
}

impl EcoMax {
    pub(crate) fn new(link: LinkHandle) -> Self {
        Self {
            shared: Arc::new(EcomaxShared {
                base: DeviceBase::new(),
                link,
                mixers: Mutex::new(BTreeMap::new()),
                thermostats: Mutex::new(BTreeMap::new()),
                schedules: Mutex::new(BTreeMap::new()),
                schema: Mutex::new(None),
            }),
        }
    }

    /// Attached mixers, keyed by their sparse wire index
    pub fn mixers(&self) -> BTreeMap<u8, Mixer> {
        self.shared
            .mixers
            .lock()
            .unwrap()
            .iter()
            .map(|(index, shared)| {
                (
                    *index,
                    Mixer {
                        shared: shared.clone(),
                        link: self.shared.link.clone(),
                    },
                )
            })
            .collect()
    }

    /// Attached thermostats, keyed by their sparse wire index
    pub fn thermostats(&self) -> BTreeMap<u8, Thermostat> {
        self.shared
            .thermostats
            .lock()
            .unwrap()
            .iter()
            .map(|(index, shared)| {
                (
                    *index,
                    Thermostat {
                        shared: shared.clone(),
                        link: self.shared.link.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn mixer(&self, index: u8) -> Option<Mixer> {
        self.shared.mixers.lock().unwrap().get(&index).map(|shared| Mixer {
            shared: shared.clone(),
            link: self.shared.link.clone(),
        })
    }

    pub fn thermostat(&self, index: u8) -> Option<Thermostat> {
        self.shared
            .thermostats
            .lock()
            .unwrap()
            .get(&index)
            .map(|shared| Thermostat {
                shared: shared.clone(),
                link: self.shared.link.clone(),
            })
    }

    /// Names of every known schedule
    pub fn schedule_names(&self) -> Vec<String> {
        self.shared
            .schedules
            .lock()
            .unwrap()
            .values()
            .map(|schedule| schedule.name.clone())
            .collect()
    }

    /// Editing handle for one schedule
    pub fn schedule(&self, name: &str) -> Result<ScheduleHandle> {
        let schedules = self.shared.schedules.lock().unwrap();
        let index = schedules
            .values()
            .find(|schedule| schedule.name == name)
            .map(|schedule| schedule.index)
            .ok_or_else(|| Error::not_available(format!("schedule '{name}'")))?;
        Ok(ScheduleHandle {
            ecomax: self.clone(),
            index,
        })
    }

    /// Turn the controller on
    pub async fn turn_on(&self) -> Result<bool> {
        self.set(ECOMAX_CONTROL, Value::Bool(true)).await
    }

    /// Turn the controller off
    pub async fn turn_off(&self) -> Result<bool> {
        self.set(ECOMAX_CONTROL, Value::Bool(false)).await
    }

    /// Product info once the UID response arrived
    pub fn product_info(&self) -> Option<ProductInfo> {
        match self.get_nowait("product") {
            Some(Value::Product(info)) => Some(info),
            _ => None,
        }
    }

    pub fn times(&self) -> DeviceTimes {
        self.shared.base.times()
    }

    pub(crate) fn regdata_schema(&self) -> Option<RegulatorDataSchema> {
        self.shared.schema.lock().unwrap().clone()
    }

    pub(crate) fn thermostat_count(&self) -> u8 {
        self.get_nowait("thermostats_available")
            .and_then(|value| value.as_i64())
            .map(|count| count as u8)
            .unwrap_or(0)
    }

    fn sub_device(
        registry: &Mutex<BTreeMap<u8, Arc<SubShared>>>,
        kind: DeviceKind,
        index: u8,
    ) -> Arc<SubShared> {
        let mut registry = registry.lock().unwrap();
        registry
            .entry(index)
            .or_insert_with(|| {
                debug!("new {:?} sub-device at index {}", kind, index);
                Arc::new(SubShared {
                    base: DeviceBase::new(),
                    kind,
                    index,
                    slot_count: Mutex::new(0),
                })
            })
            .clone()
    }

    // ------------------------------------------------------------------
    // Frame application, called from the reader task
    // ------------------------------------------------------------------

    pub(crate) fn apply_frame(&self, data: &FrameData) {
        self.shared.base.record_seen();
        match data {
            FrameData::SensorData(sensors) => self.apply_sensor_data(sensors),
            FrameData::RegulatorData(regdata) => self.apply_regulator_data(regdata),
            FrameData::EcomaxParameters(parameters) => self.apply_ecomax_parameters(parameters),
            FrameData::MixerParameters(parameters) => self.apply_mixer_parameters(parameters),
            FrameData::ThermostatParameters(parameters) => {
                self.apply_thermostat_parameters(parameters)
            },
            FrameData::Schedules(schedules) => self.apply_schedules(schedules),
            FrameData::Alerts(alerts) => self.apply_alerts(alerts),
            FrameData::Uid(product) => self.apply_product(product),
            FrameData::Password(password) => self.apply_password(password.as_deref()),
            FrameData::RegulatorDataSchema(schema) => self.apply_schema(schema),
            FrameData::ProgramVersion(version) => {
                self.shared
                    .base
                    .bus
                    .dispatch("program_version", Value::from(version.software_string()));
            },
            FrameData::Unknown { frame_type, payload } => {
                self.shared.base.bus.dispatch(
                    "unknown_frame",
                    Value::Map(
                        [
                            ("type".to_string(), Value::from(*frame_type)),
                            (
                                "payload".to_string(),
                                Value::List(payload.iter().map(|byte| Value::from(*byte)).collect()),
                            ),
                        ]
                        .into(),
                    ),
                );
            },
            _ => {},
        }
    }

    fn apply_sensor_data(&self, sensors: &SensorData) {
        for (name, value) in sensors.named_values() {
            self.shared.base.bus.dispatch(&name, value);
        }

        // The controller's running state doubles as the control switch
        self.shared.base.upsert_parameter(
            ParameterDescriptor::switch(ECOMAX_CONTROL),
            0,
            ParameterValues::new(u16::from(sensors.state != 0), 0, 1),
        );

        for (index, readings) in &sensors.thermostat_sensors {
            let device =
                Self::sub_device(&self.shared.thermostats, DeviceKind::Thermostat, *index);
            device.base.record_seen();
            device.base.bus.dispatch("state", Value::from(readings.state));
            device
                .base
                .bus
                .dispatch("current_temp", Value::from(readings.current_temp));
            device
                .base
                .bus
                .dispatch("target_temp", Value::from(readings.target_temp));
            device.base.bus.dispatch("contacts", Value::Bool(readings.contacts));
            device.base.bus.dispatch("schedule", Value::Bool(readings.schedule));
        }

        for (index, readings) in &sensors.mixer_sensors {
            let device = Self::sub_device(&self.shared.mixers, DeviceKind::Mixer, *index);
            device.base.record_seen();
            device
                .base
                .bus
                .dispatch("current_temp", Value::from(readings.current_temp));
            device
                .base
                .bus
                .dispatch("target_temp", Value::from(readings.target_temp));
            device.base.bus.dispatch("pump", Value::Bool(readings.pump));
        }
    }

    fn apply_regulator_data(&self, regdata: &RegulatorData) {
        if regdata.values.is_empty() {
            return;
        }
        let map: std::collections::BTreeMap<String, Value> = regdata
            .values
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        self.shared.base.bus.dispatch("regdata", Value::Map(map));
    }

    fn apply_ecomax_parameters(&self, parameters: &EcomaxParameters) {
        for (index, values) in &parameters.values {
            let descriptor = descriptor_for(params::ECOMAX_PARAMETERS, *index);
            self.shared.base.upsert_parameter(descriptor, *index, *values);
        }
        self.shared
            .base
            .bus
            .dispatch("ecomax_parameters", Value::from(parameters.values.len() as i64));
    }

    fn apply_mixer_parameters(&self, parameters: &MixerParameters) {
        for (mixer_index, values) in &parameters.mixers {
            let device = Self::sub_device(&self.shared.mixers, DeviceKind::Mixer, *mixer_index);
            device.base.record_seen();
            for (index, parameter_values) in values {
                let descriptor = descriptor_for(params::MIXER_PARAMETERS, *index);
                device.base.upsert_parameter(descriptor, *index, *parameter_values);
            }
        }
        self.shared
            .base
            .bus
            .dispatch("mixer_parameters", Value::from(parameters.mixers.len() as i64));
    }

    fn apply_thermostat_parameters(&self, parameters: &ThermostatParameters) {
        if let Some(profile) = parameters.profile {
            self.shared.base.upsert_parameter(
                ParameterDescriptor::number(THERMOSTAT_PROFILE),
                0,
                profile,
            );
        }

        // Slots span start..(start + count) / thermostat_count
        let per_device = match parameters.thermostat_count {
            0 => 0,
            count => {
                ((u16::from(parameters.start) + u16::from(parameters.count)) / u16::from(count))
                    as u8
            },
        };
        for (thermostat_index, values) in &parameters.thermostats {
            let device = Self::sub_device(
                &self.shared.thermostats,
                DeviceKind::Thermostat,
                *thermostat_index,
            );
            device.base.record_seen();
            *device.slot_count.lock().unwrap() = per_device;
            for (index, parameter_values) in values {
                let descriptor = descriptor_for(params::THERMOSTAT_PARAMETERS, *index);
                device.base.upsert_parameter(descriptor, *index, *parameter_values);
            }
        }
        self.shared.base.bus.dispatch(
            "thermostat_parameters",
            Value::from(parameters.thermostats.len() as i64),
        );
    }

    fn apply_schedules(&self, schedules: &Schedules) {
        let mut known = self.shared.schedules.lock().unwrap();
        for entry in &schedules.entries {
            let name = schedule_name(entry.index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("schedule_{}", entry.index));
            let schedule = known
                .entry(entry.index)
                .or_insert_with(|| Schedule::new(name, entry.index));
            schedule.load(
                entry.schedule,
                entry.switch.value as u8,
                entry.parameter.map(|values| values.value as u8).unwrap_or(0),
            );
        }
        let names: Vec<Value> = known
            .values()
            .map(|schedule| Value::from(schedule.name.clone()))
            .collect();
        drop(known);
        self.shared.base.bus.dispatch("schedules", Value::List(names));
    }

    fn apply_alerts(&self, alerts: &Alerts) {
        self.shared
            .base
            .bus
            .dispatch("total_alerts", Value::from(alerts.total));
        self.shared
            .base
            .bus
            .dispatch("alerts", Value::Alerts(alerts.alerts.clone()));
    }

    fn apply_product(&self, product: &ProductInfo) {
        self.shared
            .base
            .bus
            .dispatch("product", Value::Product(product.clone()));
    }

    fn apply_password(&self, password: Option<&str>) {
        let value = match password {
            Some(password) => Value::from(password.to_string()),
            None => Value::Null,
        };
        self.shared.base.bus.dispatch("password", value);
    }

    fn apply_schema(&self, schema: &RegulatorDataSchema) {
        *self.shared.schema.lock().unwrap() = Some(schema.clone());
        self.shared
            .base
            .bus
            .dispatch("regdata_schema", Value::from(schema.entries.len() as i64));
    }
}

#[async_trait]
impl Device for EcoMax {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Ecomax
    }

    fn base(&self) -> &DeviceBase {
        &self.shared.base
    }

    async fn set(&self, name: &str, value: Value) -> Result<bool> {
        let (parameter, raw) = self.shared.base.prepare_write(name, &value)?;

        let (data, expect) = if name == ECOMAX_CONTROL {
            (
                FrameData::EcomaxControl { value: raw as u8 },
                FrameType::EcomaxControlResponse,
            )
        } else if name == THERMOSTAT_PROFILE {
            (
                FrameData::SetThermostatParameter {
                    index: 0,
                    value: raw,
                    size: 1,
                },
                FrameType::SetThermostatParameterResponse,
            )
        } else {
            (
                FrameData::SetEcomaxParameter {
                    index: parameter.index,
                    value: raw,
                },
                FrameType::SetEcomaxParameterResponse,
            )
        };

        let frame = Frame::new(DeviceAddress::Ecomax, data);
        match self.shared.link.request(frame, expect, None).await {
            Ok(_) => {
                self.shared.base.finish_write(name, Some(raw));
                Ok(true)
            },
            Err(Error::Timeout(_)) => {
                warn!("set '{}' was not confirmed", name);
                self.shared.base.finish_write(name, None);
                Ok(false)
            },
            Err(e) => {
                self.shared.base.finish_write(name, None);
                Err(e)
            },
        }
    }
}

impl EcoMax {
    /// Write a parameter without awaiting confirmation
    pub fn set_nowait(&self, name: &str, value: Value) {
        let this = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.set(&name, value).await {
                warn!("background set '{}' failed: {}", name, e);
            }
        });
    }
}

// ============================================================================
// Sub-devices
// ============================================================================

#[async_trait]
impl Device for Mixer {
    fn kind(&self) -> DeviceKind {
        self.shared.kind
    }

    fn base(&self) -> &DeviceBase {
        &self.shared.base
    }

    async fn set(&self, name: &str, value: Value) -> Result<bool> {
        let (parameter, raw) = self.shared.base.prepare_write(name, &value)?;
        let frame = Frame::new(
            DeviceAddress::Ecomax,
            FrameData::SetMixerParameter {
                device_index: self.shared.index,
                index: parameter.index,
                value: raw,
            },
        );
        match self
            .link
            .request(frame, FrameType::SetMixerParameterResponse, Some(self.shared.index))
            .await
        {
            Ok(_) => {
                self.shared.base.finish_write(name, Some(raw));
                Ok(true)
            },
            Err(Error::Timeout(_)) => {
                self.shared.base.finish_write(name, None);
                Ok(false)
            },
            Err(e) => {
                self.shared.base.finish_write(name, None);
                Err(e)
            },
        }
    }
}

#[async_trait]
impl Device for Thermostat {
    fn kind(&self) -> DeviceKind {
        self.shared.kind
    }

    fn base(&self) -> &DeviceBase {
        &self.shared.base
    }

    async fn set(&self, name: &str, value: Value) -> Result<bool> {
        let (parameter, raw) = self.shared.base.prepare_write(name, &value)?;

        // Slot 0 at the controller level is the thermostat profile; the
        // per-thermostat block follows, one stride per device.
        let stride = *self.shared.slot_count.lock().unwrap();
        let wire_index = 1 + parameter.index + self.shared.index * stride;
        let frame = Frame::new(
            DeviceAddress::Ecomax,
            FrameData::SetThermostatParameter {
                index: wire_index,
                value: raw,
                size: parameter.descriptor.size,
            },
        );
        match self
            .link
            .request(
                frame,
                FrameType::SetThermostatParameterResponse,
                Some(self.shared.index),
            )
            .await
        {
            Ok(_) => {
                self.shared.base.finish_write(name, Some(raw));
                Ok(true)
            },
            Err(Error::Timeout(_)) => {
                self.shared.base.finish_write(name, None);
                Ok(false)
            },
            Err(e) => {
                self.shared.base.finish_write(name, None);
                Err(e)
            },
        }
    }
}

impl Mixer {
    pub fn index(&self) -> u8 {
        self.shared.index
    }

    pub fn times(&self) -> DeviceTimes {
        self.shared.base.times()
    }

    /// Write a parameter without awaiting confirmation
    pub fn set_nowait(&self, name: &str, value: Value) {
        let this = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.set(&name, value).await {
                warn!("background set '{}' failed: {}", name, e);
            }
        });
    }
}

impl Thermostat {
    pub fn index(&self) -> u8 {
        self.shared.index
    }

    pub fn times(&self) -> DeviceTimes {
        self.shared.base.times()
    }

    /// Write a parameter without awaiting confirmation
    pub fn set_nowait(&self, name: &str, value: Value) {
        let this = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.set(&name, value).await {
                warn!("background set '{}' failed: {}", name, e);
            }
        });
    }
}

// ============================================================================
// Schedule handle
// ============================================================================

/// Editing handle bound to one schedule on the ecoMAX
pub struct ScheduleHandle {
    ecomax: EcoMax,
    index: u8,
}

impl ScheduleHandle {
    fn edit<R>(&self, edit: impl FnOnce(&mut Schedule) -> R) -> Result<R> {
        let mut schedules = self.ecomax.shared.schedules.lock().unwrap();
        let schedule = schedules
            .get_mut(&self.index)
            .ok_or_else(|| Error::not_available(format!("schedule #{}", self.index)))?;
        Ok(edit(schedule))
    }

    pub fn set_state(
        &self,
        day: Weekday,
        state: bool,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<()> {
        self.edit(|schedule| schedule.set_state(day, state, start, end))?
    }

    pub fn set_on(&self, day: Weekday, start: TimeOfDay, end: TimeOfDay) -> Result<()> {
        self.set_state(day, true, start, end)
    }

    pub fn set_off(&self, day: Weekday, start: TimeOfDay, end: TimeOfDay) -> Result<()> {
        self.set_state(day, false, start, end)
    }

    /// Master switch byte for this schedule
    pub fn set_switch(&self, enabled: bool) -> Result<()> {
        self.edit(|schedule| {
            schedule.switch = u8::from(enabled);
            schedule.dirty = true;
        })
    }

    /// Associated parameter byte for this schedule
    pub fn set_parameter(&self, value: u8) -> Result<()> {
        self.edit(|schedule| {
            schedule.parameter = value;
            schedule.dirty = true;
        })
    }

    pub fn snapshot(&self) -> Result<Schedule> {
        self.edit(|schedule| schedule.clone())
    }

    /// Send the complete schedule set to the controller.
    ///
    /// The protocol replaces the whole table on every write, so
    /// unchanged schedules are resent from last-known state.
    pub async fn commit(&self) -> Result<()> {
        let set = {
            let mut schedules = self.ecomax.shared.schedules.lock().unwrap();
            let set = SetSchedule {
                entries: schedules
                    .values()
                    .map(|schedule| SetScheduleEntry {
                        index: schedule.index,
                        switch: schedule.switch,
                        parameter: schedule.parameter,
                        schedule: schedule.matrix,
                    })
                    .collect(),
            };
            for schedule in schedules.values_mut() {
                schedule.dirty = false;
            }
            set
        };

        let frame = Frame::new(DeviceAddress::Ecomax, FrameData::SetSchedule(set));
        self.ecomax.shared.link.send(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LinkHandle;

    fn ecomax() -> EcoMax {
        EcoMax::new(LinkHandle::disconnected())
    }

    fn run(values: Vec<(u8, ParameterValues)>) -> EcomaxParameters {
        EcomaxParameters {
            start: 0,
            count: values.iter().map(|(i, _)| i + 1).max().unwrap_or(0),
            values,
        }
    }

    #[test]
    fn test_parameters_create_cells() {
        let device = ecomax();
        device.apply_ecomax_parameters(&run(vec![
            (0, ParameterValues::new(80, 0, 100)),
            (18, ParameterValues::new(1, 0, 1)),
        ]));

        assert_eq!(
            device.get_nowait("airflow_power_100"),
            Some(Value::Float(80.0))
        );
        assert_eq!(device.get_nowait("fuzzy_logic"), Some(Value::Bool(true)));

        let parameter = device.parameter("airflow_power_100").unwrap();
        assert_eq!(parameter.values.value, 80);
        assert_eq!(parameter.index, 0);
    }

    #[test]
    fn test_parameter_update_replaces_values() {
        let device = ecomax();
        device.apply_ecomax_parameters(&run(vec![(0, ParameterValues::new(80, 0, 100))]));
        device.apply_ecomax_parameters(&run(vec![(0, ParameterValues::new(85, 0, 100))]));

        assert_eq!(
            device.get_nowait("airflow_power_100"),
            Some(Value::Float(85.0))
        );
        assert!(!device.parameter("airflow_power_100").unwrap().pending_write);
    }

    #[test]
    fn test_sensor_data_creates_sub_devices() {
        use econet_wire::structures::sensor_data::{MixerSensors, ThermostatSensors};

        let device = ecomax();
        let mut sensors = SensorData::default();
        sensors.thermostats_available = Some(2);
        sensors.thermostat_sensors = vec![(
            0,
            ThermostatSensors {
                state: 1,
                current_temp: 21.5,
                target_temp: 22.0,
                contacts: true,
                schedule: false,
            },
        )];
        sensors.mixers_available = 4;
        sensors.mixer_sensors = vec![(
            3,
            MixerSensors {
                current_temp: 40.0,
                target_temp: 45,
                pump: true,
            },
        )];
        device.apply_sensor_data(&sensors);

        // Sparse indices trusted verbatim
        let mixers = device.mixers();
        assert_eq!(mixers.len(), 1);
        assert!(mixers.contains_key(&3));
        assert_eq!(
            mixers[&3].get_nowait("current_temp"),
            Some(Value::Float(40.0))
        );

        let thermostats = device.thermostats();
        assert_eq!(thermostats.len(), 1);
        assert_eq!(
            thermostats[&0].get_nowait("target_temp"),
            Some(Value::Float(22.0))
        );

        // Control switch mirrors the state byte
        assert_eq!(device.get_nowait(ECOMAX_CONTROL), Some(Value::Bool(false)));
    }

    #[test]
    fn test_schedules_loaded_by_name() {
        use econet_wire::structures::schedules::{ScheduleEntry, SLOTS_PER_DAY, SCHEDULE_DAYS};

        let device = ecomax();
        let mut matrix = [[false; SLOTS_PER_DAY]; SCHEDULE_DAYS];
        matrix[1][14] = true;
        device.apply_schedules(&Schedules {
            start: 0,
            entries: vec![ScheduleEntry {
                index: 0,
                switch: ParameterValues::new(1, 0, 1),
                parameter: Some(ParameterValues::new(10, 0, 30)),
                schedule: matrix,
            }],
        });

        assert_eq!(device.schedule_names(), vec!["heating".to_string()]);
        let handle = device.schedule("heating").unwrap();
        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.switch, 1);
        assert_eq!(snapshot.parameter, 10);
        assert!(snapshot.matrix[1][14]);
        assert!(device.schedule("no_such").is_err());
    }

    #[tokio::test]
    async fn test_set_unknown_parameter() {
        let device = ecomax();
        let err = device.set("nonexistent", Value::Int(1)).await.unwrap_err();
        assert!(matches!(err, Error::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_set_out_of_range_sends_nothing() {
        let device = ecomax();
        device.apply_ecomax_parameters(&run(vec![(0, ParameterValues::new(50, 0, 100))]));

        let err = device
            .set("airflow_power_100", Value::Int(150))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
        // Queue untouched: the disconnected link would error on send,
        // and pending flag is not left behind
        assert!(!device.parameter("airflow_power_100").unwrap().pending_write);
    }
}
