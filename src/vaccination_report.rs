use std::path::Path;

use ixa::entity::events::PropertyChangeEvent;
use ixa::prelude::*;
use serde::Serialize;

use crate::parameters_loader::Parameters;
use crate::population_manager::{AgeGroup, Person};

#[derive(Serialize, Clone)]
struct VaccinationReportItem {
    time: f64,
    person_id: String,
    vaccine: &'static str,
    age_group: AgeGroup,
    status: String,
}

define_report!(VaccinationReportItem);

pub fn init(context: &mut Context, output_path: &Path) -> Result<(), IxaError> {
    let parameters = context
        .get_global_property_value(Parameters)
        .unwrap()
        .clone();
    context
        .report_options()
        .directory(output_path.to_path_buf())
        .overwrite(true); // Not recommended for production.

    context.add_report::<VaccinationReportItem>(&parameters.output_file)?;
    Ok(())
}

/// Writes a report row for every protection-status transition of the given
/// vaccine's status property.
pub fn watch_status_changes<S: Property<Person>>(context: &mut Context, vaccine: &'static str) {
    context.subscribe_to_event(move |context, event: PropertyChangeEvent<Person, S>| {
        let age_group: AgeGroup = context.get_property(event.entity_id);
        context.send_report(VaccinationReportItem {
            time: context.get_current_time(),
            person_id: format!("{}", event.entity_id),
            vaccine,
            age_group,
            status: event.current.get_display(),
        });
    });
}
