use std::{convert::Infallible, str::FromStr};

use crate::models::BggId;

/// A comma separated list of BGG ids, e.g. `926, 325`.
///
/// Entries that are not positive integers are dropped rather than rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdList(pub Vec<BggId>);

impl FromStr for IdList {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ids = s
            .split(',')
            .filter_map(|part| part.trim().parse::<u32>().ok())
            .filter(|id| *id > 0)
            .map(BggId)
            .collect();

        Ok(IdList(ids))
    }
}
