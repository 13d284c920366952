use indoc::formatdoc;

use super::escape_html;
use crate::models::Game;

pub const EMPTY_COLLECTION: &str =
    "No games found or BGG API is taking too long. Try again later.";

const COLLECTION_ERROR: &str = "Could not load the collection from BGG. Try again later.";

pub fn render_collection(games: &[&Game]) -> String {
    if games.is_empty() {
        return format!("<p>{EMPTY_COLLECTION}</p>");
    }

    games
        .iter()
        .map(|game| render_card(game))
        .collect::<Vec<String>>()
        .join("\n")
}

pub fn render_collection_error() -> String {
    format!(r#"<p class="error">{COLLECTION_ERROR}</p>"#)
}

fn render_card(game: &Game) -> String {
    let name = escape_html(game.display_name());

    let mut details = String::new();
    if let Some(minutes) = game.playing_time {
        details.push_str(&format!("\n    <p>Playing time: {minutes} min</p>"));
    }
    if !game.mechanics.is_empty() {
        details.push_str(&format!(
            "\n    <p class=\"mechanics\">{}</p>",
            escape_html(&game.mechanics.join(", "))
        ));
    }

    formatdoc! {
        r#"
            <div class="game-card">
                <img src="{image}" alt="{name}" />
                <h3>{name} ({year})</h3>
                <p>Players: {min} - {max}</p>{details}
            </div>"#,
        image = escape_html(game.display_image()),
        name = name,
        year = escape_html(game.display_year()),
        min = game.display_min_players(),
        max = game.display_max_players(),
        details = details,
    }
}
