use time::macros::format_description;
use time::{format_description, OffsetDateTime, UtcOffset};

use crate::models::types::UtcDateTime;

const DATETIME_FORMAT: &[format_description::FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Formats in the configured display offset, or nothing for a missing time.
pub fn format_local(date_time: Option<UtcDateTime>, offset: UtcOffset) -> String {
    let Some(date_time) = date_time else {
        return String::new();
    };

    OffsetDateTime::from(date_time)
        .to_offset(offset)
        .format(DATETIME_FORMAT)
        .expect("Hard-coded format should be correct")
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, UtcOffset};

    use super::format_local;
    use crate::models::types::UtcDateTime;

    #[test]
    fn local() {
        let starts_at = UtcDateTime::from(datetime!(2026-01-06 00:30 UTC));
        let central = UtcOffset::from_hms(-6, 0, 0).unwrap();

        assert_eq!(format_local(Some(starts_at), central), "2026-01-05 18:30");
        assert_eq!(format_local(None, central), "");
    }
}
