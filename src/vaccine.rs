//! The seam between vaccine mechanisms and the managers that drive them.
//!
//! Each distinct vaccine gets its own person property (so that several
//! mechanisms can act on the same individual independently), its own named
//! random stream (so that combined vaccines stay reproducible and
//! independent of each other's draw sequences), and one entry in an ordered
//! registry used to compose efficacies across mechanisms.
//!
//! Mechanisms are declared with [`define_single_dose_vaccine!`] or
//! [`define_two_dose_vaccine!`], which generate the property, the stream,
//! and a marker type implementing the matching trait.

use ixa::prelude::*;
use ixa::random::RngId;
use rand::rngs::SmallRng;

use crate::efficacy::{
    single_dose_efficacy, two_dose_efficacy, SingleDoseEfficacy, TwoDoseEfficacy, VaccineEfficacy,
};
use crate::population_manager::{Person, PersonId};
use crate::protection_status::{SingleDoseStatus, TwoDoseStatus};

/// A single-dose vaccine mechanism: a protection-status property plus a
/// named random stream. Implemented by [`define_single_dose_vaccine!`].
pub trait SingleDoseVaccine: 'static {
    type Status: Property<Person> + From<SingleDoseStatus> + Into<SingleDoseStatus>;
    type Rng: RngId<RngType = SmallRng> + Copy + 'static;

    fn name() -> &'static str;
    fn rng() -> Self::Rng;

    fn status(context: &Context, person_id: PersonId) -> SingleDoseStatus {
        context.get_property::<Person, Self::Status>(person_id).into()
    }

    fn set_status(context: &mut Context, person_id: PersonId, status: SingleDoseStatus) {
        context.set_property(person_id, Self::Status::from(status));
    }

    /// The property value that marks an individual as a valid target.
    fn eligible() -> Self::Status {
        Self::Status::from(SingleDoseStatus::NotVaccinated)
    }
}

/// A two-dose vaccine mechanism. Implemented by [`define_two_dose_vaccine!`].
pub trait TwoDoseVaccine: 'static {
    type Status: Property<Person> + From<TwoDoseStatus> + Into<TwoDoseStatus>;
    type Rng: RngId<RngType = SmallRng> + Copy + 'static;

    fn name() -> &'static str;
    fn rng() -> Self::Rng;

    fn status(context: &Context, person_id: PersonId) -> TwoDoseStatus {
        context.get_property::<Person, Self::Status>(person_id).into()
    }

    fn set_status(context: &mut Context, person_id: PersonId, status: TwoDoseStatus) {
        context.set_property(person_id, Self::Status::from(status));
    }

    fn eligible() -> Self::Status {
        Self::Status::from(TwoDoseStatus::NotVaccinated)
    }
}

pub(crate) enum MechanismKind {
    SingleDose {
        efficacy: SingleDoseEfficacy,
        status_of: fn(&Context, PersonId) -> SingleDoseStatus,
    },
    TwoDose {
        efficacy: TwoDoseEfficacy,
        status_of: fn(&Context, PersonId) -> TwoDoseStatus,
    },
}

/// One registered vaccine mechanism: its immutable efficacy values plus a
/// reader for the per-person protection status it owns.
pub(crate) struct Mechanism {
    pub(crate) name: &'static str,
    pub(crate) kind: MechanismKind,
    /// Set when the rollout found no eligible targets and parked itself;
    /// cleared when an arrival resumes it.
    pub(crate) awaiting_arrival: bool,
}

impl Mechanism {
    pub(crate) fn single_dose<V: SingleDoseVaccine>(efficacy: SingleDoseEfficacy) -> Self {
        Mechanism {
            name: V::name(),
            kind: MechanismKind::SingleDose {
                efficacy,
                status_of: V::status,
            },
            awaiting_arrival: false,
        }
    }

    pub(crate) fn two_dose<V: TwoDoseVaccine>(efficacy: TwoDoseEfficacy) -> Self {
        Mechanism {
            name: V::name(),
            kind: MechanismKind::TwoDose {
                efficacy,
                status_of: V::status,
            },
            awaiting_arrival: false,
        }
    }

    pub(crate) fn efficacy(&self, context: &Context, person_id: PersonId) -> VaccineEfficacy {
        match &self.kind {
            MechanismKind::SingleDose {
                efficacy,
                status_of,
            } => single_dose_efficacy(status_of(context, person_id), efficacy),
            MechanismKind::TwoDose {
                efficacy,
                status_of,
            } => two_dose_efficacy(status_of(context, person_id), efficacy),
        }
    }
}

define_data_plugin!(VaccineRegistry, Vec<Mechanism>, Vec::new());

/// Registers a mechanism. Registration order defines the constituent order
/// used when composing efficacies. Registering the same name twice is a
/// wiring bug and fails fast.
pub(crate) fn register_mechanism(context: &mut Context, mechanism: Mechanism) {
    let registry = context.get_data_mut(VaccineRegistry);
    assert!(
        registry.iter().all(|m| m.name != mechanism.name),
        "vaccine mechanism {} is already registered",
        mechanism.name
    );
    registry.push(mechanism);
}

pub(crate) fn mechanisms(context: &Context) -> &[Mechanism] {
    context.get_data(VaccineRegistry)
}

pub(crate) fn set_awaiting_arrival(context: &mut Context, name: &str, awaiting: bool) {
    let registry = context.get_data_mut(VaccineRegistry);
    let mechanism = registry
        .iter_mut()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("vaccine mechanism {name} is not registered"));
    mechanism.awaiting_arrival = awaiting;
}

/// Clears and returns the awaiting-arrival flag for the named mechanism.
pub(crate) fn take_awaiting_arrival(context: &mut Context, name: &str) -> bool {
    let registry = context.get_data_mut(VaccineRegistry);
    let mechanism = registry
        .iter_mut()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("vaccine mechanism {name} is not registered"));
    std::mem::take(&mut mechanism.awaiting_arrival)
}

/// Current efficacy of one named mechanism for one individual. Fails if no
/// such mechanism is registered.
pub fn mechanism_efficacy(
    context: &Context,
    name: &str,
    person_id: PersonId,
) -> Result<VaccineEfficacy, IxaError> {
    let mechanism = mechanisms(context)
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| IxaError::from(format!("vaccine mechanism {name} is not registered")))?;
    Ok(mechanism.efficacy(context, person_id))
}

/// Declares a single-dose vaccine mechanism: a `<Name>Status` person
/// property defaulting to `NotVaccinated`, a `<Name>Rng` random stream, and
/// a marker type `Name` implementing [`SingleDoseVaccine`]. `Person` must be
/// in scope at the call site.
#[macro_export]
macro_rules! define_single_dose_vaccine {
    ($vaccine:ident) => {
        paste::paste! {
            #[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Serialize)]
            pub struct [<$vaccine Status>](pub $crate::protection_status::SingleDoseStatus);

            ixa::impl_property_with_options!(
                [<$vaccine Status>],
                Person,
                default_const = [<$vaccine Status>](
                    $crate::protection_status::SingleDoseStatus::NotVaccinated
                ),
                display_impl = |value: &[<$vaccine Status>]| format!("{:?}", value.0)
            );

            impl From<$crate::protection_status::SingleDoseStatus> for [<$vaccine Status>] {
                fn from(status: $crate::protection_status::SingleDoseStatus) -> Self {
                    Self(status)
                }
            }

            impl From<[<$vaccine Status>]> for $crate::protection_status::SingleDoseStatus {
                fn from(status: [<$vaccine Status>]) -> Self {
                    status.0
                }
            }

            #[derive(Copy, Clone)]
            pub struct [<$vaccine Rng>];

            impl ixa::random::RngId for [<$vaccine Rng>] {
                type RngType = rand::rngs::SmallRng;

                fn get_name() -> &'static str {
                    stringify!([<$vaccine Rng>])
                }
            }

            #[derive(Debug, Clone, Copy)]
            pub struct $vaccine;

            impl $crate::vaccine::SingleDoseVaccine for $vaccine {
                type Status = [<$vaccine Status>];
                type Rng = [<$vaccine Rng>];

                fn name() -> &'static str {
                    stringify!($vaccine)
                }

                fn rng() -> Self::Rng {
                    [<$vaccine Rng>]
                }
            }
        }
    };
}

/// Two-dose counterpart of [`define_single_dose_vaccine!`].
#[macro_export]
macro_rules! define_two_dose_vaccine {
    ($vaccine:ident) => {
        paste::paste! {
            #[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Serialize)]
            pub struct [<$vaccine Status>](pub $crate::protection_status::TwoDoseStatus);

            ixa::impl_property_with_options!(
                [<$vaccine Status>],
                Person,
                default_const = [<$vaccine Status>](
                    $crate::protection_status::TwoDoseStatus::NotVaccinated
                ),
                display_impl = |value: &[<$vaccine Status>]| format!("{:?}", value.0)
            );

            impl From<$crate::protection_status::TwoDoseStatus> for [<$vaccine Status>] {
                fn from(status: $crate::protection_status::TwoDoseStatus) -> Self {
                    Self(status)
                }
            }

            impl From<[<$vaccine Status>]> for $crate::protection_status::TwoDoseStatus {
                fn from(status: [<$vaccine Status>]) -> Self {
                    status.0
                }
            }

            #[derive(Copy, Clone)]
            pub struct [<$vaccine Rng>];

            impl ixa::random::RngId for [<$vaccine Rng>] {
                type RngType = rand::rngs::SmallRng;

                fn get_name() -> &'static str {
                    stringify!([<$vaccine Rng>])
                }
            }

            #[derive(Debug, Clone, Copy)]
            pub struct $vaccine;

            impl $crate::vaccine::TwoDoseVaccine for $vaccine {
                type Status = [<$vaccine Status>];
                type Rng = [<$vaccine Rng>];

                fn name() -> &'static str {
                    stringify!($vaccine)
                }

                fn rng() -> Self::Rng {
                    [<$vaccine Rng>]
                }
            }
        }
    };
}
