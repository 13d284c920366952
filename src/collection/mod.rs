mod filter;
mod xml;

use std::{collections::HashMap, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
    config::CollectionConfig,
    http::{FetchError, HttpRequest, HttpTransport},
    models::{BggId, Game},
};

pub use filter::{filter_games, CollectionFilter};
pub use xml::{parse_collection, parse_things, ParseError, ThingDetails};

/// BGG answers 202 while it prepares a collection for export.
const STATUS_PROCESSING: u16 = 202;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Invalid BGG API URL: {0}")]
    Url(#[from] url::ParseError),
}

pub struct CollectionClient {
    transport: Arc<dyn HttpTransport>,
    api_base: Url,
    api_token: Option<String>,
    retry_delay: Duration,
    batch_size: usize,
    batch_delay: Duration,
}

impl CollectionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &CollectionConfig,
    ) -> Result<CollectionClient, CollectionError> {
        // A trailing slash makes `join` append instead of replacing the last segment.
        let mut api_base = config.bgg_api_base.clone();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        Ok(CollectionClient {
            transport,
            api_base: Url::parse(&api_base)?,
            api_token: config.bgg_api_token.clone(),
            retry_delay: Duration::from_millis(config.bgg_retry_delay_ms),
            batch_size: config.bgg_detail_batch_size.max(1),
            batch_delay: Duration::from_millis(config.bgg_batch_delay_ms),
        })
    }

    /// Fetches the games `username` owns, expansions excluded.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_collection(&self, username: &str) -> Result<Vec<Game>, CollectionError> {
        let mut url = self.api_base.join("collection")?;
        url.query_pairs_mut()
            .append_pair("username", username)
            .append_pair("own", "1")
            .append_pair("stats", "1")
            .append_pair("excludesubtype", "boardgameexpansion");

        let body = self.get_when_ready(url).await?;
        let games = parse_collection(&body, username)?;

        info!("Fetched {} games owned by {username}", games.len());
        Ok(games)
    }

    /// Fills in mechanics and any missing player counts or playing times from
    /// the `thing` endpoint, a batch of ids at a time.
    #[tracing::instrument(skip_all, fields(games = games.len()))]
    pub async fn fetch_details(&self, games: &mut [Game]) -> Result<(), CollectionError> {
        let ids: Vec<BggId> = games.iter().filter_map(|game| game.id).collect();
        let mut details: HashMap<BggId, ThingDetails> = HashMap::new();

        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            if index > 0 {
                debug!("Waiting {:?} before the next detail batch", self.batch_delay);
                tokio::time::sleep(self.batch_delay).await;
            }

            let id_list = batch
                .iter()
                .map(|id| id.0.to_string())
                .collect::<Vec<String>>()
                .join(",");

            let mut url = self.api_base.join("thing")?;
            url.query_pairs_mut()
                .append_pair("id", &id_list)
                .append_pair("stats", "1");

            let body = self.get_when_ready(url).await?;
            for thing in parse_things(&body)? {
                if let Some(id) = thing.id {
                    details.insert(id, thing);
                }
            }
        }

        for game in games.iter_mut() {
            if let Some(thing) = game.id.and_then(|id| details.remove(&id)) {
                merge_details(game, thing);
            }
        }

        Ok(())
    }

    /// GETs `url`, waiting out any number of "processing" responses.
    async fn get_when_ready(&self, url: Url) -> Result<String, CollectionError> {
        loop {
            let request = HttpRequest::get(url.clone()).bearer(self.api_token.as_deref());
            let response = self.transport.send(request).await?;

            if response.status == STATUS_PROCESSING {
                info!(
                    "BGG is still processing the request, retrying in {:?}",
                    self.retry_delay
                );
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            return Ok(response.ensure_success()?.body);
        }
    }
}

fn merge_details(game: &mut Game, thing: ThingDetails) {
    game.mechanics = thing.mechanics;
    game.min_players = game.min_players.or(thing.min_players);
    game.max_players = game.max_players.or(thing.max_players);
    game.playing_time = game.playing_time.or(thing.playing_time);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::fake::ScriptedTransport;

    fn config() -> CollectionConfig {
        CollectionConfig {
            bgg_api_base: "https://boardgamegeek.com/xmlapi2".to_owned(),
            bgg_username: "traditz".to_owned(),
            bgg_api_token: None,
            bgg_retry_delay_ms: 2_000,
            bgg_detail_batch_size: 2,
            bgg_batch_delay_ms: 5_000,
        }
    }

    const PROCESSING: &str = "<message>Your request for this collection has been accepted and will be processed.  Please try again later for access.</message>";

    const ONE_GAME: &str = r#"<items totalitems="1"><item objectid="13" subtype="boardgame"><name>Catan</name></item></items>"#;

    #[test_log::test(tokio::test(start_paused = true))]
    async fn polls_until_collection_is_ready() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(202, PROCESSING)
                .respond(202, PROCESSING)
                .respond(200, ONE_GAME),
        );
        let client = CollectionClient::new(transport.clone(), &config()).unwrap();

        let games = client.fetch_collection("traditz").await.unwrap();

        assert_eq!(games.len(), 1);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn builds_collection_query() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, ONE_GAME));
        let client = CollectionClient::new(transport.clone(), &config()).unwrap();

        client.fetch_collection("board gamer&co").await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.url.path(), "/xmlapi2/collection");
        assert_eq!(
            request.url.query(),
            Some("username=board+gamer%26co&own=1&stats=1&excludesubtype=boardgameexpansion")
        );
        assert_eq!(request.bearer, None);
    }

    #[tokio::test]
    async fn sends_configured_token() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, ONE_GAME));
        let client = CollectionClient::new(
            transport.clone(),
            &CollectionConfig {
                bgg_api_token: Some("secret".to_owned()),
                ..config()
            },
        )
        .unwrap();

        client.fetch_collection("traditz").await.unwrap();

        assert_eq!(transport.requests()[0].bearer.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn server_errors_abort_without_retry() {
        let transport = Arc::new(ScriptedTransport::new().respond(500, "oops"));
        let client = CollectionClient::new(transport.clone(), &config()).unwrap();

        let result = client.fetch_collection("traditz").await;

        assert!(matches!(
            result,
            Err(CollectionError::Fetch(FetchError::Status { status: 500, .. }))
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn message_on_success_is_an_error() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, PROCESSING));
        let client = CollectionClient::new(transport.clone(), &config()).unwrap();

        let result = client.fetch_collection("traditz").await;

        assert!(matches!(
            result,
            Err(CollectionError::Parse(ParseError::Api(message))) if message.contains("accepted")
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enriches_games_in_batches() {
        let things_1 = r#"<items>
            <item type="boardgame" id="1"><link type="boardgamemechanic" id="1" value="Drafting"/></item>
            <item type="boardgame" id="2"><minplayers value="2"/><maxplayers value="5"/></item>
        </items>"#;
        let things_2 = r#"<items><item type="boardgame" id="3"><playingtime value="45"/></item></items>"#;

        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, things_1)
                .respond(202, PROCESSING)
                .respond(200, things_2),
        );
        let client = CollectionClient::new(transport.clone(), &config()).unwrap();

        let mut games: Vec<Game> = (1..=3)
            .map(|id| Game {
                id: Some(BggId(id)),
                min_players: (id == 2).then_some(1),
                ..Default::default()
            })
            .collect();

        client.fetch_details(&mut games).await.unwrap();

        assert_eq!(games[0].mechanics, vec!["Drafting".to_owned()]);
        assert_eq!(games[1].min_players, Some(1));
        assert_eq!(games[1].max_players, Some(5));
        assert_eq!(games[2].playing_time, Some(45));

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url.query(), Some("id=1%2C2&stats=1"));
        assert_eq!(requests[2].url.query(), Some("id=3&stats=1"));
    }
}
