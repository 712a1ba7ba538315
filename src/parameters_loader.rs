use std::path::Path;

use ixa::prelude::*;
use serde::{Deserialize, Serialize};

use crate::efficacy::{SingleDoseEfficacy, TwoDoseEfficacy};
use crate::population_manager::AgeGroup;

/// Relative likelihood that an eligible individual in this age group is
/// selected for a dose. Weights drive selection probability, not
/// eligibility; a zero weight leaves the group unvaccinated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct UptakeWeight {
    pub age_group: AgeGroup,
    pub weight: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SingleDoseSettings {
    pub start_day: f64,
    pub doses_per_day: f64,
    pub uptake_weights: Vec<UptakeWeight>,
    pub efficacy: SingleDoseEfficacy,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TwoDoseSettings {
    pub start_day: f64,
    pub doses_per_day: f64,
    pub uptake_weights: Vec<UptakeWeight>,
    pub efficacy: TwoDoseEfficacy,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ParametersValues {
    pub population: usize,
    pub max_time: f64,
    pub seed: u64,
    pub arrival_rate: f64,
    pub primary_series: TwoDoseSettings,
    pub booster: SingleDoseSettings,
    pub output_file: String,
}
define_global_property!(Parameters, ParametersValues);

pub fn init_parameters(context: &mut Context, file_path: &Path) -> Result<(), IxaError> {
    let parameters_json = context.load_parameters_from_json::<ParametersValues>(file_path)?;
    context.set_global_property_value(Parameters, parameters_json)?;
    Ok(())
}

/// Minimal parameter set for tests that only need the population modules.
#[cfg(test)]
pub fn test_parameters(population: usize, arrival_rate: f64) -> ParametersValues {
    use crate::efficacy::VaccineEfficacy;

    ParametersValues {
        population,
        max_time: 100.0,
        seed: 42,
        arrival_rate,
        primary_series: TwoDoseSettings {
            start_day: 0.0,
            doses_per_day: 0.0,
            uptake_weights: vec![],
            efficacy: TwoDoseEfficacy {
                dose_one: VaccineEfficacy::NONE,
                dose_two: VaccineEfficacy::NONE,
                efficacy_delay: 0.0,
                efficacy_duration: f64::INFINITY,
                inter_dose_delay: 0.0,
            },
        },
        booster: SingleDoseSettings {
            start_day: 0.0,
            doses_per_day: 0.0,
            uptake_weights: vec![],
            efficacy: SingleDoseEfficacy {
                protection: VaccineEfficacy::NONE,
                efficacy_delay: 0.0,
                efficacy_duration: f64::INFINITY,
            },
        },
        output_file: "vaccination_incidence".to_string(),
    }
}
