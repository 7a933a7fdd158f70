//! Parameter catalogues
//!
//! Slot tables for the pellet-boiler (P line) controllers. Table order
//! is the wire order; an entry's position is its parameter index. Slots
//! the tables don't cover are kept with synthesized names so firmware
//! additions still surface.

use super::parameter::ParameterDescriptor;

/// Virtual switch mirroring the controller's on/off state
pub const ECOMAX_CONTROL: &str = "ecomax_control";
/// Profile slot carried ahead of the thermostat parameter block
pub const THERMOSTAT_PROFILE: &str = "thermostat_profile";

/// ecoMAX P-line parameters, by wire index
pub const ECOMAX_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::number("airflow_power_100").with_unit("%"),
    ParameterDescriptor::number("airflow_power_50").with_unit("%"),
    ParameterDescriptor::number("airflow_power_30").with_unit("%"),
    ParameterDescriptor::number("boiler_power_100").with_unit("kW"),
    ParameterDescriptor::number("boiler_power_50").with_unit("kW"),
    ParameterDescriptor::number("boiler_power_30").with_unit("kW"),
    ParameterDescriptor::number("max_fan_boiler_power").with_unit("%"),
    ParameterDescriptor::number("min_fan_boiler_power").with_unit("%"),
    ParameterDescriptor::number("fuel_feeding_work_100").with_unit("s"),
    ParameterDescriptor::number("fuel_feeding_work_50").with_unit("s"),
    ParameterDescriptor::number("fuel_feeding_work_30").with_unit("s"),
    ParameterDescriptor::number("fuel_feeding_pause_100").with_unit("s"),
    ParameterDescriptor::number("fuel_feeding_pause_50").with_unit("s"),
    ParameterDescriptor::number("fuel_feeding_pause_30").with_unit("s"),
    ParameterDescriptor::number("cycle_duration").with_unit("s"),
    ParameterDescriptor::number("h2_hysteresis").with_unit("°C"),
    ParameterDescriptor::number("h1_hysteresis").with_unit("°C"),
    ParameterDescriptor::number("heating_hysteresis").with_unit("°C"),
    ParameterDescriptor::switch("fuzzy_logic"),
    ParameterDescriptor::number("min_fuzzy_logic_power").with_unit("%"),
    ParameterDescriptor::number("max_fuzzy_logic_power").with_unit("%"),
    ParameterDescriptor::number("min_boiler_power").with_unit("kW"),
    ParameterDescriptor::number("max_boiler_power").with_unit("kW"),
    ParameterDescriptor::number("min_fan_power").with_unit("%"),
    ParameterDescriptor::number("max_fan_power").with_unit("%"),
    ParameterDescriptor::number("reduction_airflow_temp").with_unit("°C"),
    ParameterDescriptor::number("fan_power_gain"),
    ParameterDescriptor::number("fuzzy_logic_fuel_flow_correction"),
    ParameterDescriptor::number("fuel_flow_correction"),
    ParameterDescriptor::number("airflow_correction_100"),
    ParameterDescriptor::number("feeder_correction_100"),
    ParameterDescriptor::number("airflow_correction_50"),
    ParameterDescriptor::number("feeder_correction_50"),
    ParameterDescriptor::number("airflow_correction_30"),
    ParameterDescriptor::number("feeder_correction_30"),
    ParameterDescriptor::number("grate_airflow_power").with_unit("%"),
    ParameterDescriptor::number("grate_heating_hysteresis").with_unit("°C"),
    ParameterDescriptor::number("grate_fan_work").with_unit("s"),
    ParameterDescriptor::number("grate_fan_pause").with_unit("s"),
    ParameterDescriptor::number("grate_heating_temp").with_unit("°C"),
    ParameterDescriptor::number("grate_fuel_detection_time").with_unit("min"),
    ParameterDescriptor::number("kindling_airflow_power").with_unit("%"),
    ParameterDescriptor::number("kindling_low_airflow_power").with_unit("%"),
    ParameterDescriptor::number("kindling_airflow_delay").with_unit("s"),
    ParameterDescriptor::number("kindling_test_time").with_unit("s"),
    ParameterDescriptor::number("kindling_feeder_work").with_unit("s"),
    ParameterDescriptor::number("kindling_feeder_dose").with_unit("g"),
    ParameterDescriptor::number("kindling_time").with_unit("min"),
];

/// Mixer parameters, by wire index
pub const MIXER_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::number("mixer_target_temp").with_unit("°C"),
    ParameterDescriptor::number("min_target_temp").with_unit("°C"),
    ParameterDescriptor::number("max_target_temp").with_unit("°C"),
    ParameterDescriptor::number("thermostat_decrease_target_temp").with_unit("°C"),
    ParameterDescriptor::switch("weather_control"),
    ParameterDescriptor::number("heating_curve").with_scale(0.1),
    ParameterDescriptor::number("heating_curve_shift")
        .with_offset(-20.0)
        .with_unit("°C"),
    ParameterDescriptor::number("weather_factor"),
    ParameterDescriptor::number("work_mode"),
    ParameterDescriptor::number("mixer_input_dead_zone")
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::switch("thermostat_operation"),
    ParameterDescriptor::number("thermostat_mode"),
    ParameterDescriptor::switch("disable_pump_on_thermostat"),
    ParameterDescriptor::switch("summer_work"),
];

/// Thermostat parameters, by wire index.
///
/// Wide slots match the sizes the payload decoder assumes.
pub const THERMOSTAT_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::number("mode"),
    ParameterDescriptor::number("party_target_temp")
        .wide()
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("holidays_target_temp")
        .wide()
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("correction").with_unit("°C"),
    ParameterDescriptor::number("away_timer").with_unit("days"),
    ParameterDescriptor::number("airing_timer").with_unit("days"),
    ParameterDescriptor::number("party_timer").with_unit("days"),
    ParameterDescriptor::number("holidays_timer").with_unit("days"),
    ParameterDescriptor::number("hysteresis")
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("day_target_temp")
        .wide()
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("night_target_temp")
        .wide()
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("antifreeze_target_temp")
        .wide()
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("heating_target_temp")
        .wide()
        .with_scale(0.1)
        .with_unit("°C"),
    ParameterDescriptor::number("heating_timer"),
    ParameterDescriptor::number("off_timer"),
];

/// Catalogue lookup with a synthesized fallback for unknown slots
pub fn descriptor_for(catalogue: &'static [ParameterDescriptor], index: u8) -> ParameterDescriptor {
    match catalogue.get(usize::from(index)) {
        Some(descriptor) => *descriptor,
        None => ParameterDescriptor {
            name: unknown_name(index),
            ..ParameterDescriptor::number("parameter")
        },
    }
}

/// Names for slots beyond the catalogue; interned so descriptors can
/// stay `'static`.
fn unknown_name(index: u8) -> &'static str {
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    static NAMES: OnceLock<Mutex<HashMap<u8, &'static str>>> = OnceLock::new();
    let names = NAMES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut names = names.lock().unwrap();
    *names
        .entry(index)
        .or_insert_with(|| Box::leak(format!("parameter_{index}").into_boxed_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::parameter::ParameterKind;

    #[test]
    fn test_catalogue_indices() {
        assert_eq!(ECOMAX_PARAMETERS[0].name, "airflow_power_100");
        assert_eq!(ECOMAX_PARAMETERS[18].name, "fuzzy_logic");
        assert_eq!(ECOMAX_PARAMETERS[18].kind, ParameterKind::Switch);
        assert_eq!(MIXER_PARAMETERS[6].name, "heating_curve_shift");
        assert_eq!(MIXER_PARAMETERS[6].offset, -20.0);
        assert_eq!(THERMOSTAT_PARAMETERS.len(), 15);
        assert_eq!(THERMOSTAT_PARAMETERS[12].name, "heating_target_temp");
        assert_eq!(THERMOSTAT_PARAMETERS[12].size, 2);
        assert_eq!(THERMOSTAT_PARAMETERS[14].name, "off_timer");
    }

    #[test]
    fn test_thermostat_sizes_match_wire_table() {
        use econet_wire::structures::parameters::THERMOSTAT_PARAMETER_SIZES;
        for (index, descriptor) in THERMOSTAT_PARAMETERS.iter().enumerate() {
            assert_eq!(
                usize::from(descriptor.size),
                THERMOSTAT_PARAMETER_SIZES[index],
                "width mismatch at thermostat slot {index}"
            );
        }
    }

    #[test]
    fn test_unknown_slot_synthesized() {
        let descriptor = descriptor_for(ECOMAX_PARAMETERS, 200);
        assert_eq!(descriptor.name, "parameter_200");
        assert_eq!(descriptor.kind, ParameterKind::Number);
        // Interned: same pointer on repeat lookups
        let again = descriptor_for(ECOMAX_PARAMETERS, 200);
        assert!(std::ptr::eq(descriptor.name, again.name));
    }

    #[test]
    fn test_known_slot_lookup() {
        let descriptor = descriptor_for(MIXER_PARAMETERS, 5);
        assert_eq!(descriptor.name, "heating_curve");
        assert_eq!(descriptor.scale, 0.1);
    }
}
