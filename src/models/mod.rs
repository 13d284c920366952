mod bgg;
mod game;
mod game_day;

pub mod types;

pub use bgg::{ExpansionRef, SearchItem, Thing};
pub use game::{BggId, Game, NOT_AVAILABLE, UNKNOWN};
pub use game_day::{
    DayPhase, GameDay, GameDayId, PostId, PublicationStatus, Table, TableId, WantToPlay,
};
