use std::{convert::Infallible, str::FromStr};

use super::{invalid_argument, ArgumentError};

/// A free-text form field, such as a game day title or an email address.
/// Surrounding whitespace is never kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormText(String);

impl FormText {
    /// The text, or an error naming `field` when nothing but whitespace was typed.
    pub fn required(self, field: &str) -> Result<String, ArgumentError> {
        if self.0.is_empty() {
            return Err(invalid_argument(format!("{field} is required.")));
        }

        Ok(self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for FormText {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FormText(s.trim().to_owned()))
    }
}

impl From<&str> for FormText {
    fn from(value: &str) -> Self {
        FormText(value.trim().to_owned())
    }
}
