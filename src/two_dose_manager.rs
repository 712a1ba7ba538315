//! Rollout scheduling and protection transitions for two-dose vaccines.
//!
//! The administration of the first dose branches on whether the efficacy
//! delay and the inter-dose gap are zero: a zero gap co-administers both
//! doses, a zero delay makes protection effective immediately. Expiry is
//! only ever scheduled once dose-two protection is reached; dose-one
//! protection does not wane on its own.

use ixa::prelude::*;
use ixa::{trace, with};
use rand_distr::Exp;

use crate::parameters_loader::{TwoDoseSettings, UptakeWeight};
use crate::population_manager::{Person, PersonId};
use crate::protection_status::TwoDoseStatus;
use crate::vaccine::{self, Mechanism, TwoDoseVaccine};

/// The scheduled callbacks this manager issues against the simulation
/// clock. The toggle is reused for protection onset and expiry; the
/// receiving handler decides which one it means from the current status.
#[derive(Debug, Clone, Copy)]
enum RolloutEvent {
    Administer,
    SecondDose(PersonId),
    ProtectionToggle(PersonId),
}

/// Starts the rollout of one two-dose vaccine. With a dose rate of zero the
/// mechanism is registered for efficacy queries but otherwise inert.
pub fn init<V: TwoDoseVaccine>(context: &mut Context, settings: &TwoDoseSettings) {
    vaccine::register_mechanism(context, Mechanism::two_dose::<V>(settings.efficacy));

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

fn schedule_event<V: TwoDoseVaccine>(
    context: &mut Context,
    time: f64,
    event: RolloutEvent,
    settings: TwoDoseSettings,
) {
    context.add_plan(time, move |context| {
        handle_event::<V>(context, event, settings);
    });
}

fn handle_event<V: TwoDoseVaccine>(
    context: &mut Context,
    event: RolloutEvent,
    settings: TwoDoseSettings,
) {
    match event {
        RolloutEvent::Administer => administer::<V>(context, settings),
        RolloutEvent::SecondDose(person_id) => {
            administer_second_dose::<V>(context, person_id, settings);
        }
        RolloutEvent::ProtectionToggle(person_id) => {
            toggle_protection::<V>(context, person_id, settings);
        }
    }
}

fn administer<V: TwoDoseVaccine>(context: &mut Context, settings: TwoDoseSettings) {
    let Some(person_id) = select_target::<V>(context, &settings.uptake_weights) else {
        trace!(
            "{}: no eligible targets remain, waiting for arrivals",
            V::name()
        );
        vaccine::set_awaiting_arrival(context, V::name(), true);
        return;
    };

    administer_first_dose::<V>(context, person_id, settings.clone());

    let next_administration = context.get_current_time()
        + context.sample_distr(V::rng(), Exp::new(settings.doses_per_day).unwrap());
    schedule_event::<V>(context, next_administration, RolloutEvent::Administer, settings);
}

/// Draws an age group proportional to `eligible count x uptake weight`, then
/// one individual uniformly from that group's eligible pool. `None` when
/// every group has zero weight or no eligible individuals.
#[allow(clippy::cast_precision_loss)]
fn select_target<V: TwoDoseVaccine>(
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

fn administer_first_dose<V: TwoDoseVaccine>(
    context: &mut Context,
    person_id: PersonId,
    settings: TwoDoseSettings,
) {
    trace!("{}: administering first dose to {}", V::name(), person_id);
    let efficacy = settings.efficacy;
    let now = context.get_current_time();

    match (
        efficacy.efficacy_delay > 0.0,
        efficacy.inter_dose_delay > 0.0,
    ) {
        (true, true) => {
            V::set_status(context, person_id, TwoDoseStatus::OneDoseNotYetProtected);
            schedule_event::<V>(
                context,
                now + efficacy.efficacy_delay,
                RolloutEvent::ProtectionToggle(person_id),
                settings.clone(),
            );
            schedule_event::<V>(
                context,
                now + efficacy.inter_dose_delay,
                RolloutEvent::SecondDose(person_id),
                settings,
            );
        }
        (true, false) => {
            // Both doses co-administered; one onset covers them.
            V::set_status(context, person_id, TwoDoseStatus::TwoDosesNotYetProtected);
            schedule_event::<V>(
                context,
                now + efficacy.efficacy_delay,
                RolloutEvent::ProtectionToggle(person_id),
                settings,
            );
        }
        (false, true) => {
            // Dose-one protection is immediate; expiry is only scheduled
            // once dose-two protection is reached.
            V::set_status(context, person_id, TwoDoseStatus::OneDoseProtected);
            schedule_event::<V>(
                context,
                now + efficacy.inter_dose_delay,
                RolloutEvent::SecondDose(person_id),
                settings,
            );
        }
        (false, false) => {
            V::set_status(context, person_id, TwoDoseStatus::TwoDosesProtected);
            if efficacy.efficacy_duration.is_finite() {
                schedule_event::<V>(
                    context,
                    now + efficacy.efficacy_duration,
                    RolloutEvent::ProtectionToggle(person_id),
                    settings,
                );
            }
        }
    }
}

/// Only reachable with a positive inter-dose gap.
fn administer_second_dose<V: TwoDoseVaccine>(
    context: &mut Context,
    person_id: PersonId,
    settings: TwoDoseSettings,
) {
    trace!("{}: administering second dose to {}", V::name(), person_id);
    let efficacy = settings.efficacy;
    let now = context.get_current_time();

    match V::status(context, person_id) {
        TwoDoseStatus::OneDoseNotYetProtected => {
            assert!(
                efficacy.efficacy_delay > 0.0,
                "{}: second dose found {} awaiting onset without an efficacy delay",
                V::name(),
                person_id
            );
            V::set_status(context, person_id, TwoDoseStatus::TwoDosesNotYetProtected);
            schedule_event::<V>(
                context,
                now + efficacy.efficacy_delay,
                RolloutEvent::ProtectionToggle(person_id),
                settings,
            );
        }
        TwoDoseStatus::OneDoseProtected => {
            if efficacy.efficacy_delay > 0.0 {
                V::set_status(
                    context,
                    person_id,
                    TwoDoseStatus::TwoDosesPartiallyProtected,
                );
                schedule_event::<V>(
                    context,
                    now + efficacy.efficacy_delay,
                    RolloutEvent::ProtectionToggle(person_id),
                    settings,
                );
            } else {
                V::set_status(context, person_id, TwoDoseStatus::TwoDosesProtected);
                if efficacy.efficacy_duration.is_finite() {
                    schedule_event::<V>(
                        context,
                        now + efficacy.efficacy_duration,
                        RolloutEvent::ProtectionToggle(person_id),
                        settings,
                    );
                }
            }
        }
        status => {
            panic!(
                "{}: second dose fired for {} in status {:?}",
                V::name(),
                person_id,
                status
            );
        }
    }
}

fn toggle_protection<V: TwoDoseVaccine>(
    context: &mut Context,
    person_id: PersonId,
    settings: TwoDoseSettings,
) {
    let efficacy = settings.efficacy;
    match V::status(context, person_id) {
        TwoDoseStatus::OneDoseNotYetProtected => {
            // Dose one becomes effective; expiry waits for dose two.
            V::set_status(context, person_id, TwoDoseStatus::OneDoseProtected);
        }
        TwoDoseStatus::TwoDosesNotYetProtected => {
            if efficacy.inter_dose_delay > 0.0 {
                // The second dose landed before dose one's onset; its own
                // onset is still pending.
                V::set_status(
                    context,
                    person_id,
                    TwoDoseStatus::TwoDosesPartiallyProtected,
                );
            } else {
                V::set_status(context, person_id, TwoDoseStatus::TwoDosesProtected);
                schedule_expiry::<V>(context, person_id, settings);
            }
        }
        TwoDoseStatus::TwoDosesPartiallyProtected => {
            V::set_status(context, person_id, TwoDoseStatus::TwoDosesProtected);
            schedule_expiry::<V>(context, person_id, settings);
        }
        TwoDoseStatus::TwoDosesProtected => {
            V::set_status(context, person_id, TwoDoseStatus::NoLongerProtected);
        }
        status @ (TwoDoseStatus::NotVaccinated
        | TwoDoseStatus::OneDoseProtected
        | TwoDoseStatus::NoLongerProtected) => {
            panic!(
                "{}: protection toggle fired for {} in status {:?}",
                V::name(),
                person_id,
                status
            );
        }
    }
}

fn schedule_expiry<V: TwoDoseVaccine>(
    context: &mut Context,
    person_id: PersonId,
    settings: TwoDoseSettings,
) {
    if settings.efficacy.efficacy_duration.is_finite() {
        schedule_event::<V>(
            context,
            context.get_current_time() + settings.efficacy.efficacy_duration,
            RolloutEvent::ProtectionToggle(person_id),
            settings,
        );
    }
}

fn handle_arrival<V: TwoDoseVaccine>(context: &mut Context, settings: &TwoDoseSettings) {
    if vaccine::take_awaiting_arrival(context, V::name()) {
        trace!("{}: resuming rollout after an arrival", V::name());
        handle_event::<V>(context, RolloutEvent::Administer, settings.clone());
    }
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;
    use ixa::prelude::*;

    use super::*;
    use crate::efficacy::{TwoDoseEfficacy, VaccineEfficacy};
    use crate::population_manager::{Age, AgeGroup};
    use crate::protection_status::TwoDoseStatus;
    use crate::vaccine::mechanism_efficacy;

    crate::define_two_dose_vaccine!(TestSeries);

    fn settings(efficacy_delay: f64, inter_dose_delay: f64) -> TwoDoseSettings {
        TwoDoseSettings {
            start_day: 0.0,
            doses_per_day: 5.0,
            uptake_weights: vec![UptakeWeight {
                age_group: AgeGroup::Adult,
                weight: 1.0,
            }],
            efficacy: TwoDoseEfficacy {
                dose_one: VaccineEfficacy {
                    ves: 0.45,
                    vei: 0.3,
                    vep: 0.5,
                },
                dose_two: VaccineEfficacy {
                    ves: 0.8,
                    vei: 0.55,
                    vep: 0.9,
                },
                efficacy_delay,
                inter_dose_delay,
                efficacy_duration: f64::INFINITY,
            },
        }
    }

    fn register(context: &mut Context, settings: &TwoDoseSettings) {
        crate::vaccine::register_mechanism(
            context,
            crate::vaccine::Mechanism::two_dose::<TestSeries>(settings.efficacy),
        );
    }

    #[test]
    fn test_co_administered_doses_protect_immediately() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();
        let dose_settings = settings(0.0, 0.0);
        register(&mut context, &dose_settings);

        context.add_plan(1.0, move |context| {
            administer_first_dose::<TestSeries>(context, person, dose_settings);
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesProtected
            );
            let efficacy = mechanism_efficacy(context, "TestSeries", person).unwrap();
            assert_approx_eq!(efficacy.ves, 0.8);
        });
        context.execute();
    }

    #[test]
    fn test_staggered_doses_upgrade_protection() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();
        let dose_settings = settings(0.0, 10.0);
        register(&mut context, &dose_settings);

        let first = dose_settings.clone();
        context.add_plan(0.0, move |context| {
            administer_first_dose::<TestSeries>(context, person, first);
            // Dose-one protection is immediate.
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::OneDoseProtected
            );
            let efficacy = mechanism_efficacy(context, "TestSeries", person).unwrap();
            assert_approx_eq!(efficacy.ves, 0.45);
        });
        // The second dose lands at t = 10 and upgrades immediately.
        context.add_plan(10.5, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesProtected
            );
            let efficacy = mechanism_efficacy(context, "TestSeries", person).unwrap();
            assert_approx_eq!(efficacy.ves, 0.8);
        });
        context.execute();
    }

    #[test]
    fn test_delayed_staggered_doses_pass_through_partial_protection() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();
        let dose_settings = settings(14.0, 21.0);
        register(&mut context, &dose_settings);

        let first = dose_settings.clone();
        context.add_plan(0.0, move |context| {
            administer_first_dose::<TestSeries>(context, person, first);
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::OneDoseNotYetProtected
            );
        });
        // Dose-one onset at t = 14.
        context.add_plan(15.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::OneDoseProtected
            );
        });
        // Second dose at t = 21; dose-one protection still applies.
        context.add_plan(22.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesPartiallyProtected
            );
            let efficacy = mechanism_efficacy(context, "TestSeries", person).unwrap();
            assert_approx_eq!(efficacy.ves, 0.45);
        });
        // Dose-two onset at t = 21 + 14.
        context.add_plan(36.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesProtected
            );
        });
        context.execute();
    }

    #[test]
    fn test_second_dose_before_first_onset() {
        // Gap shorter than the efficacy delay: the second dose arrives while
        // the first is still ramping in.
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();
        let dose_settings = settings(14.0, 7.0);
        register(&mut context, &dose_settings);

        let first = dose_settings.clone();
        context.add_plan(0.0, move |context| {
            administer_first_dose::<TestSeries>(context, person, first);
        });
        context.add_plan(8.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesNotYetProtected
            );
        });
        // Dose-one onset at t = 14 only brings partial protection; dose
        // two's own onset is still pending until t = 7 + 14.
        context.add_plan(15.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesPartiallyProtected
            );
        });
        context.add_plan(22.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesProtected
            );
        });
        context.execute();
    }

    #[test]
    fn test_finite_duration_expires_after_full_protection() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();
        let mut dose_settings = settings(0.0, 0.0);
        dose_settings.efficacy.efficacy_duration = 30.0;
        register(&mut context, &dose_settings);

        let first = dose_settings.clone();
        context.add_plan(0.0, move |context| {
            administer_first_dose::<TestSeries>(context, person, first);
        });
        context.add_plan(29.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::TwoDosesProtected
            );
        });
        context.add_plan(31.0, move |context| {
            assert_eq!(
                TestSeries::status(context, person),
                TwoDoseStatus::NoLongerProtected
            );
            assert_eq!(
                mechanism_efficacy(context, "TestSeries", person).unwrap(),
                VaccineEfficacy::NONE
            );
        });
        context.execute();
    }

    #[test]
    #[should_panic(expected = "second dose")]
    fn test_second_dose_on_unvaccinated_person_fails_fast() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();

        administer_second_dose::<TestSeries>(&mut context, person, settings(0.0, 10.0));
    }

    #[test]
    #[should_panic(expected = "without an efficacy delay")]
    fn test_second_dose_awaiting_onset_without_delay_fails_fast() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();

        // This state is unreachable through scheduling; force it to check
        // the consistency guard.
        TestSeries::set_status(&mut context, person, TwoDoseStatus::OneDoseNotYetProtected);
        administer_second_dose::<TestSeries>(&mut context, person, settings(0.0, 10.0));
    }

    #[test]
    #[should_panic(expected = "protection toggle")]
    fn test_toggle_on_one_dose_protected_fails_fast() {
        let mut context = Context::new();
        context.init_random(42);
        let person = context.add_entity((Age(30),)).unwrap();

        TestSeries::set_status(&mut context, person, TwoDoseStatus::OneDoseProtected);
        toggle_protection::<TestSeries>(&mut context, person, settings(0.0, 10.0));
    }

    #[test]
    fn test_rollout_reaches_whole_population() {
        let mut context = Context::new();
        context.init_random(42);
        for _ in 0..4 {
            context.add_entity((Age(30),)).unwrap();
        }

        init::<TestSeries>(&mut context, &settings(0.0, 5.0));
        context.add_plan(40.0, |context| {
            context.shutdown();
        });
        context.execute();

        let fully_protected = context.query_entity_count(with!(
            Person,
            TestSeriesStatus(TwoDoseStatus::TwoDosesProtected)
        ));
        assert_eq!(fully_protected, 4);
    }
}
