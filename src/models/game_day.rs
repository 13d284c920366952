use std::fmt::Display;

use strum::{AsRefStr, Display as StrumDisplay, EnumString};

use super::types::UtcDateTime;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameDayId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostId(pub String);

impl Display for GameDayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `status` field stored with a game day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Published,
}

/// Where a game day is listed. Derived from the start time, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayPhase {
    Upcoming,
    Archived,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameDay {
    pub id: GameDayId,
    pub title: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<UtcDateTime>,
    pub status: PublicationStatus,
}

impl GameDay {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled Game Day")
    }

    /// A day is archived once its start time has passed; days without one stay upcoming.
    pub fn phase(&self, now: UtcDateTime) -> DayPhase {
        match self.starts_at {
            Some(starts_at) if starts_at.is_before(now) => DayPhase::Archived,
            _ => DayPhase::Upcoming,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub id: TableId,
    pub host_uid: Option<String>,
    pub host_display_name: Option<String>,
    pub game_name: Option<String>,
    pub bgg_url: Option<String>,
    pub thumb_url: Option<String>,
    pub start_time: Option<UtcDateTime>,
    pub capacity: u32,
    pub confirmed_names: Vec<String>,
    pub waitlist_names: Vec<String>,
    pub expansion_names: Vec<String>,
    pub notes: Option<String>,
}

impl Table {
    pub fn is_hosted_by(&self, uid: &str) -> bool {
        !uid.is_empty() && self.host_uid.as_deref() == Some(uid)
    }

    pub fn open_seats(&self) -> u32 {
        self.capacity
            .saturating_sub(self.confirmed_names.len() as u32)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WantToPlay {
    pub id: PostId,
    pub created_by_uid: Option<String>,
    pub created_by_display_name: Option<String>,
    pub game_name: Option<String>,
    pub bgg_url: Option<String>,
    pub thumb_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<UtcDateTime>,
}
