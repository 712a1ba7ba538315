//! Rollout scheduling and protection transitions for single-dose vaccines.

use ixa::prelude::*;
use ixa::{trace, with};
use rand_distr::Exp;

use crate::parameters_loader::{SingleDoseSettings, UptakeWeight};
use crate::population_manager::{Person, PersonId};
use crate::protection_status::SingleDoseStatus;
use crate::vaccine::{self, Mechanism, SingleDoseVaccine};

/// The scheduled callbacks this manager issues against the simulation
/// clock. The toggle is reused for protection onset and expiry; the
/// receiving handler decides which one it means from the current status.
#[derive(Debug, Clone, Copy)]
enum RolloutEvent {
    Administer,
    ProtectionToggle(PersonId),
}

/// Starts the rollout of one single-dose vaccine. With a dose rate of zero
/// the mechanism is registered for efficacy queries but otherwise inert.
pub fn init<V: SingleDoseVaccine>(context: &mut Context, settings: &SingleDoseSettings) {
    vaccine::register_mechanism(context, Mechanism::single_dose::<V>(settings.efficacy));

    if settings.doses_per_day <= 0.0 {
        return;
    }

    context.index_property::<Person, V::Status>();

    let arrival_settings = settings.clone();
    context.subscribe_to_event(move |context, _event: EntityCreatedEvent<Person>| {
        handle_arrival::<V>(context, &arrival_settings);
    });

    schedule_event::<V>(
        context,
        settings.start_day,
        RolloutEvent::Administer,
        settings.clone(),
    );
}

fn schedule_event<V: SingleDoseVaccine>(
    context: &mut Context,
    time: f64,
    event: RolloutEvent,
    settings: SingleDoseSettings,
) {
    context.add_plan(time, move |context| {
        handle_event::<V>(context, event, settings);
    });
}

fn handle_event<V: SingleDoseVaccine>(
    context: &mut Context,
    event: RolloutEvent,
    settings: SingleDoseSettings,
) {
    match event {
        RolloutEvent::Administer => administer::<V>(context, settings),
        RolloutEvent::ProtectionToggle(person_id) => {
            toggle_protection::<V>(context, person_id, settings);
        }
    }
}

fn administer<V: SingleDoseVaccine>(context: &mut Context, settings: SingleDoseSettings) {
    let Some(person_id) = select_target::<V>(context, &settings.uptake_weights) else {
        trace!(
            "{}: no eligible targets remain, waiting for arrivals",
            V::name()
        );
        vaccine::set_awaiting_arrival(context, V::name(), true);
        return;
    };

    administer_dose::<V>(context, person_id, settings.clone());

    let next_administration = context.get_current_time()
        + context.sample_distr(V::rng(), Exp::new(settings.doses_per_day).unwrap());
    schedule_event::<V>(context, next_administration, RolloutEvent::Administer, settings);
}

/// Draws an age group proportional to `eligible count x uptake weight`, then
/// one individual uniformly from that group's eligible pool. `None` when
/// every group has zero weight or no eligible individuals.
#[allow(clippy::cast_precision_loss)]
fn select_target<V: SingleDoseVaccine>(
    context: &Context,
    uptake_weights: &[UptakeWeight],
) -> Option<PersonId> {
    let weights: Vec<f64> = uptake_weights
        .iter()
        .map(|uptake| {
            let eligible =
                context.query_entity_count(with!(Person, uptake.age_group, V::eligible()));
            eligible as f64 * uptake.weight
        })
        .collect();

    if weights.iter().sum::<f64>() <= 0.0 {
        return None;
    }

    let age_group = uptake_weights[context.sample_weighted(V::rng(), &weights)].age_group;
    context.sample_entity(V::rng(), with!(Person, age_group, V::eligible()))
}

fn administer_dose<V: SingleDoseVaccine>(
    context: &mut Context,
    person_id: PersonId,
    settings: SingleDoseSettings,
) {
    trace!("{}: administering dose to {}", V::name(), person_id);
    let efficacy = settings.efficacy;

    if efficacy.efficacy_delay > 0.0 {
        V::set_status(
            context,
            person_id,
            SingleDoseStatus::VaccinatedNotYetProtected,
        );
        schedule_event::<V>(
            context,
            context.get_current_time() + efficacy.efficacy_delay,
            RolloutEvent::ProtectionToggle(person_id),
            settings,
        );
    } else {
        V::set_status(context, person_id, SingleDoseStatus::VaccineProtected);
        if efficacy.efficacy_duration.is_finite() {
            schedule_event::<V>(
                context,
                context.get_current_time() + efficacy.efficacy_duration,
                RolloutEvent::ProtectionToggle(person_id),
                settings,
            );
        }
    }
}

fn toggle_protection<V: SingleDoseVaccine>(
    context: &mut Context,
    person_id: PersonId,
    settings: SingleDoseSettings,
) {
    let efficacy = settings.efficacy;
    match V::status(context, person_id) {
        SingleDoseStatus::VaccinatedNotYetProtected => {
            V::set_status(context, person_id, SingleDoseStatus::VaccineProtected);
            if efficacy.efficacy_duration.is_finite() {
                schedule_event::<V>(
                    context,
                    context.get_current_time() + efficacy.efficacy_duration,
                    RolloutEvent::ProtectionToggle(person_id),
                    settings,
                );
            }
        }
        SingleDoseStatus::VaccineProtected => {
            V::set_status(
                context,
                person_id,
                SingleDoseStatus::VaccinatedNoLongerProtected,
            );
        }
        status @ (SingleDoseStatus::NotVaccinated
        | SingleDoseStatus::VaccinatedNoLongerProtected) => {
            panic!(
                "{}: protection toggle fired for {} in status {:?}",
                V::name(),
                person_id,
                status
            );
        }
    }
}

fn handle_arrival<V: SingleDoseVaccine>(context: &mut Context, settings: &SingleDoseSettings) {
    if vaccine::take_awaiting_arrival(context, V::name()) {
        trace!("{}: resuming rollout after an arrival", V::name());
        handle_event::<V>(context, RolloutEvent::Administer, settings.clone());
    }
}
