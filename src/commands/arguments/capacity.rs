use std::str::FromStr;

use super::{invalid_argument, ArgumentError};

/// Seat count for a hosted table. Blank input means "use the game's max players",
/// which the backend receives as `0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capacity(pub u32);

impl FromStr for Capacity {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Ok(Capacity(0));
        }

        s.parse()
            .map(Capacity)
            .map_err(|_| invalid_argument(format!("Invalid seat count: `{}`.", s.escape_default())))
    }
}
