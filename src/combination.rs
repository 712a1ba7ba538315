//! Composition of independently-acting vaccine mechanisms into one net
//! protective effect per individual.
//!
//! Mechanisms are assumed independent: the chance that all of them fail is
//! the product of their individual failure probabilities, applied uniformly
//! to susceptibility, infectiousness, and progression.

use ixa::prelude::*;

use crate::efficacy::VaccineEfficacy;
use crate::population_manager::PersonId;
use crate::vaccine;

/// Net efficacy across every registered vaccine mechanism, in registration
/// order. Fails when no constituent can report an efficacy, rather than
/// silently understating population protection.
pub fn combined_efficacy(
    context: &Context,
    person_id: PersonId,
) -> Result<VaccineEfficacy, IxaError> {
    let mechanisms = vaccine::mechanisms(context);
    if mechanisms.is_empty() {
        return Err(IxaError::from(
            "cannot compose efficacy: no vaccine mechanisms are registered",
        ));
    }

    let mut fails_susceptibility = 1.0;
    let mut fails_infectiousness = 1.0;
    let mut fails_progression = 1.0;
    for mechanism in mechanisms {
        let efficacy = mechanism.efficacy(context, person_id);
        fails_susceptibility *= 1.0 - efficacy.ves;
        fails_infectiousness *= 1.0 - efficacy.vei;
        fails_progression *= 1.0 - efficacy.vep;
    }

    Ok(VaccineEfficacy {
        ves: 1.0 - fails_susceptibility,
        vei: 1.0 - fails_infectiousness,
        vep: 1.0 - fails_progression,
    })
}

/// Reduction in death probability given infection for combined vaccines.
/// No composition rule is defined for this measure; it is fixed at zero.
pub fn combined_ved(_context: &Context, _person_id: PersonId) -> f64 {
    0.0
}

/// Probability that vaccination fails to block a transmission from `source`
/// to `target`: the source stays infectious with probability `1 - VEI` and
/// the target stays susceptible with probability `1 - VES`. Transmission
/// models may substitute their own formulation.
pub fn probability_vaccine_fails_to_prevent_transmission(
    context: &Context,
    source: PersonId,
    target: PersonId,
) -> Result<f64, IxaError> {
    let source_efficacy = combined_efficacy(context, source)?;
    let target_efficacy = combined_efficacy(context, target)?;
    Ok((1.0 - source_efficacy.vei) * (1.0 - target_efficacy.ves))
}
