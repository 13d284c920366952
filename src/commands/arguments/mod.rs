use thiserror::Error;

mod capacity;
mod form_text;
mod human_datetime;
mod id_list;

pub use capacity::Capacity;
pub use form_text::FormText;
pub use human_datetime::{parse_utc_offset, HumanDateTime};
pub use id_list::IdList;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ArgumentError {
    pub message: String,
}

pub fn invalid_argument(message: String) -> ArgumentError {
    ArgumentError { message }
}
