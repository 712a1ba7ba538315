use std::fmt;

use ixa::impl_derived_property;
use ixa::prelude::*;
use rand_distr::Exp;

use crate::parameters_loader::Parameters;

define_rng!(PeopleRng);

static MAX_AGE: u8 = 100;

define_entity!(Person);

define_property!(
    struct Age(pub u8),
    Person
);

// We declare the type ourselves so we can derive `Hash` and `Deserialize`;
// uptake-weight tables in the parameters file are keyed by age group.
#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum AgeGroup {
    Child,
    Adult,
    OlderAdult,
}

impl_derived_property!(AgeGroup, Person, [Age], [], |age| {
    if age.0 < 18 {
        AgeGroup::Child
    } else if age.0 < 65 {
        AgeGroup::Adult
    } else {
        AgeGroup::OlderAdult
    }
});

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

fn schedule_arrival(context: &mut Context) {
    let parameters = context
        .get_global_property_value(Parameters)
        .unwrap()
        .clone();
    context.add_entity((Age(0),)).unwrap();

    let next_arrival_event = context.get_current_time()
        + context.sample_distr(PeopleRng, Exp::new(parameters.arrival_rate).unwrap());
    context.add_plan(next_arrival_event, |context| {
        schedule_arrival(context);
    });
}

pub fn init(context: &mut Context) {
    let parameters = context
        .get_global_property_value(Parameters)
        .unwrap()
        .clone();

    for _ in 0..parameters.population {
        let age: u8 = context.sample_range(PeopleRng, 0..MAX_AGE);
        context.add_entity((Age(age),)).unwrap();
    }

    // Plan for new entrants to the population
    if parameters.arrival_rate > 0.0 {
        context.add_plan(0.0, |context| {
            schedule_arrival(context);
        });
    }
}
