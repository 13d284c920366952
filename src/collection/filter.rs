use deunicode::deunicode;

use crate::models::Game;

/// Client-side filters for a fetched collection. The default filter keeps everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    /// Substring of the game name. Case and diacritics are ignored.
    pub search: String,
    /// Keep games whose inclusive player range contains this count.
    pub players: Option<u32>,
    /// Keep games that play in at most this many minutes.
    pub max_play_time: Option<u32>,
    /// Substring of any of the game's mechanics.
    pub mechanic: Option<String>,
}

impl CollectionFilter {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.players.is_none()
            && self.max_play_time.is_none()
            && self.mechanic.as_deref().map_or(true, |m| m.trim().is_empty())
    }

    pub fn matches(&self, game: &Game) -> bool {
        let search = normalize(&self.search);
        if !search.is_empty() && !normalize(game.display_name()).contains(&search) {
            return false;
        }

        if let Some(players) = self.players {
            if !game.supports_player_count(players) {
                return false;
            }
        }

        if let Some(limit) = self.max_play_time {
            match game.playing_time {
                Some(time) if time <= limit => (),
                _ => return false,
            }
        }

        if let Some(mechanic) = self.mechanic.as_deref().map(normalize) {
            if !mechanic.is_empty()
                && !game
                    .mechanics
                    .iter()
                    .any(|m| normalize(m).contains(&mechanic))
            {
                return false;
            }
        }

        true
    }
}

/// Keeps the games matching `filter`, in their original order.
pub fn filter_games<'a>(games: &'a [Game], filter: &CollectionFilter) -> Vec<&'a Game> {
    games.iter().filter(|game| filter.matches(game)).collect()
}

fn normalize(text: &str) -> String {
    deunicode(text.trim()).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(name: &str, players: Option<(u32, u32)>, time: Option<u32>) -> Game {
        Game {
            name: Some(name.to_owned()),
            min_players: players.map(|p| p.0),
            max_players: players.map(|p| p.1),
            playing_time: time,
            ..Default::default()
        }
    }

    fn shelf() -> Vec<Game> {
        vec![
            game("Wingspan", Some((1, 5)), Some(70)),
            game("Catan", Some((3, 4)), Some(120)),
            game("Pokémon Master Trainer", Some((2, 6)), None),
            game("Mystery Box", None, None),
        ]
    }

    fn names<'a>(games: &[&'a Game]) -> Vec<&'a str> {
        games.iter().map(|g| g.display_name()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let games = shelf();
        let filter = CollectionFilter {
            search: "   ".to_owned(),
            ..Default::default()
        };

        assert!(filter.is_empty());
        assert_eq!(
            names(&filter_games(&games, &filter)),
            vec!["Wingspan", "Catan", "Pokémon Master Trainer", "Mystery Box"]
        );
    }

    #[test]
    fn search_ignores_case_and_accents() {
        let games = shelf();
        let filter = CollectionFilter {
            search: "POKEMON".to_owned(),
            ..Default::default()
        };

        assert_eq!(names(&filter_games(&games, &filter)), vec!["Pokémon Master Trainer"]);
    }

    #[test]
    fn player_count_uses_inclusive_range() {
        let games = shelf();

        let at = |players| CollectionFilter {
            players: Some(players),
            ..Default::default()
        };

        assert_eq!(names(&filter_games(&games, &at(1))), vec!["Wingspan"]);
        assert_eq!(
            names(&filter_games(&games, &at(4))),
            vec!["Wingspan", "Catan", "Pokémon Master Trainer"]
        );
        assert_eq!(names(&filter_games(&games, &at(6))), vec!["Pokémon Master Trainer"]);
        assert!(filter_games(&games, &at(7)).is_empty());
    }

    #[test]
    fn play_time_requires_a_known_time() {
        let games = shelf();
        let filter = CollectionFilter {
            max_play_time: Some(90),
            ..Default::default()
        };

        assert_eq!(names(&filter_games(&games, &filter)), vec!["Wingspan"]);
    }

    #[test]
    fn mechanic_substring() {
        let mut games = shelf();
        games[1].mechanics = vec!["Dice Rolling".to_owned(), "Trading".to_owned()];

        let filter = CollectionFilter {
            mechanic: Some("dice".to_owned()),
            ..Default::default()
        };

        assert_eq!(names(&filter_games(&games, &filter)), vec!["Catan"]);
    }

    #[test]
    fn filters_combine() {
        let games = shelf();
        let filter = CollectionFilter {
            search: "a".to_owned(),
            players: Some(3),
            ..Default::default()
        };

        assert_eq!(
            names(&filter_games(&games, &filter)),
            vec!["Wingspan", "Catan", "Pokémon Master Trainer"]
        );
    }
}
