use serde::{Deserialize, Serialize};

use crate::protection_status::{SingleDoseStatus, TwoDoseStatus};

/// Point-in-time protective effect of a vaccine: reduction in susceptibility
/// (`ves`), in infectiousness (`vei`), and in progression to severe outcome
/// (`vep`), each a probability in `[0, 1]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VaccineEfficacy {
    pub ves: f64,
    pub vei: f64,
    pub vep: f64,
}

impl VaccineEfficacy {
    pub const NONE: VaccineEfficacy = VaccineEfficacy {
        ves: 0.0,
        vei: 0.0,
        vep: 0.0,
    };
}

fn unlimited_duration() -> f64 {
    f64::INFINITY
}

/// Protective values and timing of a single-dose vaccine. Loaded once from
/// configuration and never mutated. Delay and duration are in days relative
/// to the administration of the dose; a missing duration means protection
/// never wanes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SingleDoseEfficacy {
    pub protection: VaccineEfficacy,
    pub efficacy_delay: f64,
    #[serde(default = "unlimited_duration")]
    pub efficacy_duration: f64,
}

/// Protective values and timing of a two-dose vaccine. `dose_one` applies
/// while only the first dose is effective, `dose_two` once full protection
/// is reached. `inter_dose_delay` is the scheduled gap between doses; zero
/// means both doses are co-administered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TwoDoseEfficacy {
    pub dose_one: VaccineEfficacy,
    pub dose_two: VaccineEfficacy,
    pub efficacy_delay: f64,
    #[serde(default = "unlimited_duration")]
    pub efficacy_duration: f64,
    pub inter_dose_delay: f64,
}

/// Efficacy of a single-dose vaccine for an individual in the given state.
/// Pure in (status, efficacy); protection applies only while the vaccine is
/// actively protective.
pub fn single_dose_efficacy(
    status: SingleDoseStatus,
    efficacy: &SingleDoseEfficacy,
) -> VaccineEfficacy {
    match status {
        SingleDoseStatus::VaccineProtected => efficacy.protection,
        SingleDoseStatus::NotVaccinated
        | SingleDoseStatus::VaccinatedNotYetProtected
        | SingleDoseStatus::VaccinatedNoLongerProtected => VaccineEfficacy::NONE,
    }
}

/// Efficacy of a two-dose vaccine for an individual in the given state.
/// While the second dose is administered but not yet effective, dose-one
/// protection still applies.
pub fn two_dose_efficacy(status: TwoDoseStatus, efficacy: &TwoDoseEfficacy) -> VaccineEfficacy {
    match status {
        TwoDoseStatus::TwoDosesProtected => efficacy.dose_two,
        TwoDoseStatus::OneDoseProtected | TwoDoseStatus::TwoDosesPartiallyProtected => {
            efficacy.dose_one
        }
        TwoDoseStatus::NotVaccinated
        | TwoDoseStatus::OneDoseNotYetProtected
        | TwoDoseStatus::TwoDosesNotYetProtected
        | TwoDoseStatus::NoLongerProtected => VaccineEfficacy::NONE,
    }
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn single_dose() -> SingleDoseEfficacy {
        SingleDoseEfficacy {
            protection: VaccineEfficacy {
                ves: 0.6,
                vei: 0.4,
                vep: 0.7,
            },
            efficacy_delay: 7.0,
            efficacy_duration: 180.0,
        }
    }

    fn two_dose() -> TwoDoseEfficacy {
        TwoDoseEfficacy {
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
            efficacy_delay: 14.0,
            efficacy_duration: 180.0,
            inter_dose_delay: 21.0,
        }
    }

    #[test]
    fn single_dose_only_protected_state_has_effect() {
        let efficacy = single_dose();
        assert_eq!(
            single_dose_efficacy(SingleDoseStatus::VaccineProtected, &efficacy),
            efficacy.protection
        );
        for status in [
            SingleDoseStatus::NotVaccinated,
            SingleDoseStatus::VaccinatedNotYetProtected,
            SingleDoseStatus::VaccinatedNoLongerProtected,
        ] {
            assert_eq!(
                single_dose_efficacy(status, &efficacy),
                VaccineEfficacy::NONE
            );
        }
    }

    #[test]
    fn two_dose_effect_follows_active_dose() {
        let efficacy = two_dose();
        assert_eq!(
            two_dose_efficacy(TwoDoseStatus::TwoDosesProtected, &efficacy),
            efficacy.dose_two
        );
        assert_eq!(
            two_dose_efficacy(TwoDoseStatus::OneDoseProtected, &efficacy),
            efficacy.dose_one
        );
        assert_eq!(
            two_dose_efficacy(TwoDoseStatus::TwoDosesPartiallyProtected, &efficacy),
            efficacy.dose_one
        );
        for status in [
            TwoDoseStatus::NotVaccinated,
            TwoDoseStatus::OneDoseNotYetProtected,
            TwoDoseStatus::TwoDosesNotYetProtected,
            TwoDoseStatus::NoLongerProtected,
        ] {
            assert_eq!(two_dose_efficacy(status, &efficacy), VaccineEfficacy::NONE);
        }
    }

    #[test]
    fn efficacy_query_is_pure() {
        let efficacy = two_dose();
        let first = two_dose_efficacy(TwoDoseStatus::TwoDosesProtected, &efficacy);
        let second = two_dose_efficacy(TwoDoseStatus::TwoDosesProtected, &efficacy);
        assert_eq!(first, second);
        assert_approx_eq!(first.ves, 0.8);
    }

    #[test]
    fn missing_duration_means_protection_never_wanes() {
        let parsed: SingleDoseEfficacy = serde_json::from_str(
            r#"{
                "protection": {"ves": 0.5, "vei": 0.5, "vep": 0.5},
                "efficacy_delay": 0.0
            }"#,
        )
        .unwrap();
        assert!(parsed.efficacy_duration.is_infinite());
    }
}
