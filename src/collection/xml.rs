use quick_xml::{
    events::{attributes::AttrError, BytesStart, Event},
    Reader,
};
use thiserror::Error;

use crate::models::{BggId, Game};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid XML attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("Empty response")]
    Empty,
    #[error("BGG returned an error: {0}")]
    Api(String),
    #[error("Unexpected root element <{0}>")]
    UnexpectedRoot(String),
}

/// Details from the `thing` endpoint used to enrich collection entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThingDetails {
    pub id: Option<BggId>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub playing_time: Option<u32>,
    pub mechanics: Vec<String>,
}

/// Parses a `/collection` response. Expansions are skipped even when BGG
/// includes them despite `excludesubtype`.
pub fn parse_collection(xml: &str, owner: &str) -> Result<Vec<Game>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut games = Vec::new();
    let mut current: Option<Game> = None;
    let mut skip_current = false;
    let mut path: Vec<String> = Vec::new();
    let mut root_seen = false;
    let mut error_message = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element_name(&element);
                check_root(&mut root_seen, &name, "items")?;

                on_collection_element(&element, &name, &mut current, &mut skip_current, owner)?;
                path.push(name);
            }

            Event::Empty(element) => {
                let name = element_name(&element);
                check_root(&mut root_seen, &name, "items")?;

                on_collection_element(&element, &name, &mut current, &mut skip_current, owner)?;
                if name == "item" {
                    finish_item(&mut current, skip_current, &mut games);
                }
            }

            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                let parent = path.last().map(String::as_str);
                let in_item_child = path.len() >= 2 && path[path.len() - 2] == "item";

                match (parent, current.as_mut()) {
                    (Some("name"), Some(game)) if in_item_child => game.name = Some(text),
                    (Some("yearpublished"), Some(game)) if in_item_child => game.year = Some(text),
                    (Some("image"), Some(game)) if in_item_child => game.image = Some(text),
                    (Some("thumbnail"), Some(game)) if in_item_child => game.thumbnail = Some(text),
                    (Some("message"), _) => error_message.push_str(&text),
                    _ => (),
                }
            }

            Event::CData(data) => {
                if path.last().map(String::as_str) == Some("message") {
                    error_message.push_str(&String::from_utf8_lossy(&data));
                }
            }

            Event::End(_) => {
                if path.pop().as_deref() == Some("item") {
                    finish_item(&mut current, skip_current, &mut games);
                }
            }

            Event::Eof => break,

            _ => (),
        }
    }

    if !error_message.is_empty() {
        return Err(ParseError::Api(error_message.trim().to_owned()));
    }

    if !root_seen {
        return Err(ParseError::Empty);
    }

    Ok(games)
}

/// Parses a `/thing` response into per-id details.
pub fn parse_things(xml: &str) -> Result<Vec<ThingDetails>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut things = Vec::new();
    let mut current: Option<ThingDetails> = None;
    let mut depth_in_item = 0usize;
    let mut root_seen = false;
    let mut in_message = false;
    let mut error_message = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element_name(&element);
                check_root(&mut root_seen, &name, "items")?;

                if name == "item" {
                    current = Some(ThingDetails {
                        id: attribute(&element, "id")?.and_then(|id| id.parse().ok()).map(BggId),
                        ..Default::default()
                    });
                    depth_in_item = 0;
                } else if current.is_some() {
                    depth_in_item += 1;
                } else if name == "message" {
                    in_message = true;
                }
            }

            Event::Empty(element) => {
                let name = element_name(&element);
                check_root(&mut root_seen, &name, "items")?;

                if name == "item" && current.is_none() {
                    things.push(ThingDetails {
                        id: attribute(&element, "id")?.and_then(|id| id.parse().ok()).map(BggId),
                        ..Default::default()
                    });
                } else if let (Some(thing), 0) = (current.as_mut(), depth_in_item) {
                    // Only direct children of <item> describe the game itself.
                    on_thing_property(&element, &name, thing)?;
                }
            }

            Event::Text(text) => {
                if in_message {
                    error_message.push_str(&text.unescape()?);
                }
            }

            Event::End(element) => {
                if current.is_some() {
                    if depth_in_item == 0 && element.name().as_ref() == b"item" {
                        things.extend(current.take());
                    } else {
                        depth_in_item = depth_in_item.saturating_sub(1);
                    }
                } else if element.name().as_ref() == b"message" {
                    in_message = false;
                }
            }

            Event::Eof => break,

            _ => (),
        }
    }

    if !error_message.is_empty() {
        return Err(ParseError::Api(error_message.trim().to_owned()));
    }

    if !root_seen {
        return Err(ParseError::Empty);
    }

    Ok(things)
}

fn on_collection_element(
    element: &BytesStart,
    name: &str,
    current: &mut Option<Game>,
    skip_current: &mut bool,
    owner: &str,
) -> Result<(), ParseError> {
    match name {
        "item" => {
            *skip_current = attribute(element, "subtype")?.as_deref() == Some("boardgameexpansion");
            *current = Some(Game {
                id: attribute(element, "objectid")?
                    .and_then(|id| id.parse().ok())
                    .map(BggId),
                owner: owner.to_owned(),
                ..Default::default()
            });
        }

        "stats" => {
            if let Some(game) = current.as_mut() {
                game.min_players = number_attribute(element, "minplayers")?;
                game.max_players = number_attribute(element, "maxplayers")?;
                game.playing_time = number_attribute(element, "playingtime")?;
            }
        }

        _ => (),
    }

    Ok(())
}

fn on_thing_property(
    element: &BytesStart,
    name: &str,
    thing: &mut ThingDetails,
) -> Result<(), ParseError> {
    match name {
        "minplayers" => thing.min_players = number_attribute(element, "value")?,
        "maxplayers" => thing.max_players = number_attribute(element, "value")?,
        "playingtime" => thing.playing_time = number_attribute(element, "value")?,
        "link" if attribute(element, "type")?.as_deref() == Some("boardgamemechanic") => {
            thing.mechanics.extend(attribute(element, "value")?);
        }
        _ => (),
    }

    Ok(())
}

fn finish_item(current: &mut Option<Game>, skip: bool, games: &mut Vec<Game>) {
    if let Some(game) = current.take() {
        if !skip {
            games.push(game);
        }
    }
}

fn check_root(root_seen: &mut bool, name: &str, expected: &str) -> Result<(), ParseError> {
    if *root_seen {
        return Ok(());
    }

    *root_seen = true;
    match name {
        name if name == expected => Ok(()),
        // BGG reports failures as <errors><error><message> or a bare <message>
        "errors" | "message" => Ok(()),
        other => Err(ParseError::UnexpectedRoot(other.to_owned())),
    }
}

fn element_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>, ParseError> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == name.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }

    Ok(None)
}

/// Missing, empty and non-numeric values (BGG uses `0` for unknown) become `None`.
fn number_attribute(element: &BytesStart, name: &str) -> Result<Option<u32>, ParseError> {
    Ok(attribute(element, name)?
        .and_then(|value| value.trim().parse().ok())
        .filter(|value| *value > 0))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const COLLECTION: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8" standalone="yes"?>
        <items totalitems="3" termsofuse="https://boardgamegeek.com/xmlapi/termsofuse">
            <item objecttype="thing" objectid="13" subtype="boardgame" collid="1">
                <name sortindex="1">Catan</name>
                <yearpublished>1995</yearpublished>
                <image>https://cf.geekdo-images.com/catan.jpg</image>
                <thumbnail>https://cf.geekdo-images.com/catan_t.jpg</thumbnail>
                <stats minplayers="3" maxplayers="4" minplaytime="60" maxplaytime="120" playingtime="120" numowned="1">
                    <rating value="N/A">
                        <average value="7.1" />
                    </rating>
                </stats>
                <status own="1" />
                <numplays>0</numplays>
            </item>
            <item objecttype="thing" objectid="926" subtype="boardgameexpansion" collid="2">
                <name sortindex="1">Catan: Seafarers</name>
            </item>
            <item objecttype="thing" objectid="555" subtype="boardgame" collid="3">
                <name sortindex="1">Dungeons &amp; Dice</name>
            </item>
        </items>
    "#};

    #[test]
    fn parses_collection_items() {
        let games = parse_collection(COLLECTION, "traditz").unwrap();

        assert_eq!(games.len(), 2);

        let catan = &games[0];
        assert_eq!(catan.id, Some(BggId(13)));
        assert_eq!(catan.display_name(), "Catan");
        assert_eq!(catan.display_year(), "1995");
        assert_eq!(catan.image.as_deref(), Some("https://cf.geekdo-images.com/catan.jpg"));
        assert_eq!(catan.min_players, Some(3));
        assert_eq!(catan.max_players, Some(4));
        assert_eq!(catan.playing_time, Some(120));
        assert_eq!(catan.owner, "traditz");
    }

    #[test]
    fn missing_fields_fall_back_to_placeholders() {
        let games = parse_collection(COLLECTION, "traditz").unwrap();
        let bare = &games[1];

        assert_eq!(bare.display_name(), "Dungeons & Dice");
        assert_eq!(bare.display_year(), "Unknown");
        assert_eq!(bare.display_min_players(), "N/A");
        assert_eq!(bare.display_max_players(), "N/A");
    }

    #[test]
    fn reports_api_errors() {
        let xml = r#"<errors><error><message>Invalid username specified</message></error></errors>"#;

        match parse_collection(xml, "nobody") {
            Err(ParseError::Api(message)) => assert_eq!(message, "Invalid username specified"),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_foreign_documents() {
        assert!(matches!(parse_collection("", "u"), Err(ParseError::Empty)));
        assert!(matches!(
            parse_collection("<html><body/></html>", "u"),
            Err(ParseError::UnexpectedRoot(root)) if root == "html"
        ));
    }

    #[test]
    fn empty_collection_is_not_an_error() {
        let games = parse_collection(r#"<items totalitems="0"></items>"#, "u").unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn parses_thing_details() {
        let xml = indoc! {r#"
            <items termsofuse="https://boardgamegeek.com/xmlapi/termsofuse">
                <item type="boardgame" id="13">
                    <thumbnail>https://cf.geekdo-images.com/catan_t.jpg</thumbnail>
                    <name type="primary" sortindex="1" value="Catan" />
                    <minplayers value="3" />
                    <maxplayers value="4" />
                    <playingtime value="120" />
                    <link type="boardgamecategory" id="1026" value="Negotiation" />
                    <link type="boardgamemechanic" id="2072" value="Dice Rolling" />
                    <link type="boardgamemechanic" id="2940" value="Trading" />
                    <statistics page="1">
                        <ratings>
                            <usersrated value="120000" />
                        </ratings>
                    </statistics>
                </item>
                <item type="boardgame" id="822">
                    <minplayers value="0" />
                </item>
            </items>
        "#};

        let things = parse_things(xml).unwrap();

        assert_eq!(
            things,
            vec![
                ThingDetails {
                    id: Some(BggId(13)),
                    min_players: Some(3),
                    max_players: Some(4),
                    playing_time: Some(120),
                    mechanics: vec!["Dice Rolling".to_owned(), "Trading".to_owned()],
                },
                ThingDetails {
                    id: Some(BggId(822)),
                    ..Default::default()
                },
            ]
        );
    }

    #[test]
    fn bare_message_is_an_api_error() {
        let xml = "<message>Your request for this collection has been accepted and will be processed.</message>";

        match parse_collection(xml, "traditz") {
            Err(ParseError::Api(message)) => assert!(message.starts_with("Your request")),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn thing_errors_are_reported() {
        let xml = r#"<errors><error><message>Rate limit exceeded.</message></error></errors>"#;

        match parse_things(xml) {
            Err(ParseError::Api(message)) => assert_eq!(message, "Rate limit exceeded."),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn self_closing_things_keep_their_id() {
        let xml = r#"<items><item type="boardgame" id="13"/><item id="822"><minplayers value="2"/></item></items>"#;

        let things = parse_things(xml).unwrap();

        assert_eq!(
            things,
            vec![
                ThingDetails {
                    id: Some(BggId(13)),
                    ..Default::default()
                },
                ThingDetails {
                    id: Some(BggId(822)),
                    min_players: Some(2),
                    ..Default::default()
                },
            ]
        );
    }
}
