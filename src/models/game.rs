use std::fmt::Display;

pub const UNKNOWN: &str = "Unknown";
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BggId(pub u32);

impl BggId {
    /// Link to the game's page, for positive ids only.
    pub fn game_url(&self) -> Option<String> {
        (self.0 > 0).then(|| format!("https://boardgamegeek.com/boardgame/{}", self.0))
    }
}

impl Display for BggId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A game owned by a BGG user, as parsed from the collection and thing endpoints.
///
/// Everything but the id is optional in the XML, so the display helpers
/// substitute placeholders instead of the parser guessing values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Game {
    pub id: Option<BggId>,
    pub name: Option<String>,
    pub year: Option<String>,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub playing_time: Option<u32>,
    pub mechanics: Vec<String>,
    /// The username whose collection this game was fetched from.
    pub owner: String,
}

impl Game {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn display_year(&self) -> &str {
        self.year.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn display_min_players(&self) -> String {
        display_number(self.min_players)
    }

    pub fn display_max_players(&self) -> String {
        display_number(self.max_players)
    }

    pub fn display_playing_time(&self) -> String {
        display_number(self.playing_time)
    }

    /// The image to show on a card, preferring the full image over the thumbnail.
    pub fn display_image(&self) -> &str {
        self.image
            .as_deref()
            .or(self.thumbnail.as_deref())
            .unwrap_or_default()
    }

    pub fn supports_player_count(&self, players: u32) -> bool {
        match (self.min_players, self.max_players) {
            (Some(min), Some(max)) => min <= players && players <= max,
            _ => false,
        }
    }
}

fn display_number(value: Option<u32>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => NOT_AVAILABLE.to_owned(),
    }
}
