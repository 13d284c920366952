use std::str::FromStr;

use lazy_regex::regex_captures;
use time::{Date, Month, PrimitiveDateTime, Time, UtcOffset};

use super::ArgumentError;
use crate::models::types::UtcDateTime;

const EXAMPLE_1: &str = "2026-01-05 18:00";
const EXAMPLE_2: &str = "2025-12-28 14:00 UTC-6";

fn invalid_argument(message: String) -> ArgumentError {
    super::invalid_argument(format!(
        "{message}\nDatetime examples: `{EXAMPLE_1}`, `{EXAMPLE_2}`."
    ))
}

/// A date and time typed by a person, e.g. `2026-01-05 18:00 UTC+2`.
///
/// Without an explicit offset the time is read in the configured display offset.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HumanDateTime {
    date: Date,
    time: Time,
    utc_offset: Option<UtcOffset>,
}

impl HumanDateTime {
    pub fn to_utc(&self, default_offset: UtcOffset) -> UtcDateTime {
        let offset = self.utc_offset.unwrap_or(default_offset);
        UtcDateTime::from(PrimitiveDateTime::new(self.date, self.time).assume_offset(offset))
    }
}

impl FromStr for HumanDateTime {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut date = None;
        let mut time = None;
        let mut utc_offset = None;

        let tokens = s.split_whitespace().filter(|s| !s.is_empty());
        for token in tokens {
            if let Some((_, year, month, day)) =
                regex_captures!(r"^(\d{4})-(\d{2})-(\d{2})$", token)
            {
                if date.is_some() {
                    return Err(invalid_argument(format!("Duplicate date: `{token}`.")));
                }

                let year = year
                    .parse()
                    .map_err(|_| invalid_argument(format!("Invalid year: `{year}`.")))?;
                let month: u8 = month
                    .parse()
                    .map_err(|_| invalid_argument(format!("Invalid month: `{month}`.")))?;
                let day = day
                    .parse()
                    .map_err(|_| invalid_argument(format!("Invalid day: `{day}`.")))?;

                date = Some(
                    Date::from_calendar_date(
                        year,
                        Month::try_from(month)
                            .map_err(|_| invalid_argument(format!("Invalid month: `{month}`.")))?,
                        day,
                    )
                    .map_err(|_| invalid_argument(format!("Invalid date: `{token}`.")))?,
                );
            } else if let Some((_, hour, minute, _, second)) =
                regex_captures!(r"^(\d{1,2}):(\d{2})(:(\d{2}))?$", token)
            {
                if time.is_some() {
                    return Err(invalid_argument(format!("Duplicate time: `{token}`.")));
                }

                let hour = hour
                    .parse()
                    .map_err(|_| invalid_argument(format!("Invalid hour: `{hour}`.")))?;
                let minute = minute
                    .parse()
                    .map_err(|_| invalid_argument(format!("Invalid minute: `{minute}`.")))?;
                let second = if second.is_empty() {
                    0
                } else {
                    second
                        .parse()
                        .map_err(|_| invalid_argument(format!("Invalid second: `{second}`.")))?
                };

                time = Some(
                    Time::from_hms(hour, minute, second)
                        .map_err(|_| invalid_argument(format!("Invalid time: `{token}`.")))?,
                );
            } else if token.starts_with("UTC") {
                if utc_offset.is_some() {
                    return Err(invalid_argument(format!(
                        "Duplicate UTC offset: `{token}`."
                    )));
                }

                utc_offset = Some(parse_utc_offset(token)?);
            } else {
                return Err(invalid_argument(format!("Invalid token: `{token}`.")));
            }
        }

        match (date, time) {
            (Some(date), Some(time)) => Ok(HumanDateTime {
                date,
                time,
                utc_offset,
            }),
            (None, _) => Err(invalid_argument("The date is missing.".to_string())),
            (_, None) => Err(invalid_argument("The time is missing.".to_string())),
        }
    }
}

/// Parses `UTC`, `UTC+7`, `UTC-2:30` and the like.
pub fn parse_utc_offset(token: &str) -> Result<UtcOffset, ArgumentError> {
    let Some((_, _, sign, hour, _, minute)) =
        regex_captures!(r"^UTC(([+-])(\d{1,2})(:(\d{2}))?)?$", token.trim())
    else {
        return Err(invalid_argument(format!("Invalid UTC offset: `{token}`.")));
    };

    if sign.is_empty() {
        return Ok(UtcOffset::UTC);
    }

    let sign = if sign == "+" { 1 } else { -1 };

    let hour: i8 = hour
        .parse()
        .map_err(|_| invalid_argument(format!("Invalid hour: `{hour}`.")))?;
    let minute: i8 = if minute.is_empty() {
        0
    } else {
        minute
            .parse()
            .map_err(|_| invalid_argument(format!("Invalid minute: `{minute}`.")))?
    };

    UtcOffset::from_hms(hour * sign, minute * sign, 0)
        .map_err(|_| invalid_argument(format!("Invalid UTC offset: `{token}`.")))
}
