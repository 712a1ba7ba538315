use std::path::{Path, PathBuf};

use ixa::prelude::*;

pub mod combination;
pub mod efficacy;
pub mod parameters_loader;
pub mod population_manager;
pub mod protection_status;
pub mod single_dose_manager;
pub mod two_dose_manager;
pub mod vaccination_report;
pub mod vaccine;

use crate::parameters_loader::Parameters;
use crate::population_manager::Person;
use crate::vaccine::{SingleDoseVaccine, TwoDoseVaccine};

// The shipped scenario: a two-dose primary series combined with a
// single-dose booster, acting independently on the same population.
crate::define_two_dose_vaccine!(PrimarySeries);
crate::define_single_dose_vaccine!(Booster);

pub fn initialize(context: &mut Context, output_path: &Path) -> Result<(), IxaError> {
    let input_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("input.json");
    parameters_loader::init_parameters(context, &input_path)?;

    let parameters = context
        .get_global_property_value(Parameters)
        .unwrap()
        .clone();
    context.init_random(parameters.seed);

    population_manager::init(context);
    vaccination_report::init(context, output_path)?;

    two_dose_manager::init::<PrimarySeries>(context, &parameters.primary_series);
    single_dose_manager::init::<Booster>(context, &parameters.booster);

    vaccination_report::watch_status_changes::<PrimarySeriesStatus>(context, PrimarySeries::name());
    vaccination_report::watch_status_changes::<BoosterStatus>(context, Booster::name());

    context.add_plan(parameters.max_time, |context| {
        context.shutdown();
    });
    Ok(())
}
