use serde::{Deserialize, Serialize};

/// Protection state of an individual under a single-dose vaccine. Every
/// individual starts at `NotVaccinated`; the owning manager advances the
/// state through scheduled callbacks and never resets it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum SingleDoseStatus {
    NotVaccinated,
    VaccinatedNotYetProtected,
    VaccineProtected,
    /// Absorbing: protection has waned and no further transition occurs.
    VaccinatedNoLongerProtected,
}

/// Protection state of an individual under a two-dose vaccine.
///
/// `TwoDosesPartiallyProtected` means the second dose has been administered
/// but only dose-one protection is active while the dose-two effect ramps in.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum TwoDoseStatus {
    NotVaccinated,
    OneDoseNotYetProtected,
    OneDoseProtected,
    TwoDosesNotYetProtected,
    TwoDosesPartiallyProtected,
    TwoDosesProtected,
    /// Absorbing: protection has waned and no further transition occurs.
    NoLongerProtected,
}
