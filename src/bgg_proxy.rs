use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    config::PlannerConfig,
    http::{FetchError, HttpRequest, HttpTransport},
    models::{BggId, SearchItem, Thing},
};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Invalid BGG proxy URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("BGG returned nothing for game {0}")]
    NotFound(BggId),
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct ThingResponse {
    #[serde(default)]
    thing: Option<Thing>,
}

/// The backend's JSON front for BGG search and game details.
pub struct BggProxyClient {
    transport: Arc<dyn HttpTransport>,
    search_url: String,
    thing_url: String,
}

impl BggProxyClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &PlannerConfig) -> BggProxyClient {
        BggProxyClient {
            transport,
            search_url: config.bgg_search_url.clone(),
            thing_url: config.bgg_thing_url.clone(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchItem>, ProxyError> {
        let mut url = Url::parse(&self.search_url)?;
        url.query_pairs_mut().append_pair("q", query.trim());

        let response = self.transport.send(HttpRequest::get(url)).await?;
        let found: SearchResponse = response.ensure_success()?.json()?;

        debug!("{} search results", found.items.len());
        Ok(found.items)
    }

    #[tracing::instrument(skip(self))]
    pub async fn thing(&self, id: BggId) -> Result<Thing, ProxyError> {
        let mut url = Url::parse(&self.thing_url)?;
        url.query_pairs_mut().append_pair("id", &id.0.to_string());

        let response = self.transport.send(HttpRequest::get(url)).await?;
        let found: ThingResponse = response.ensure_success()?.json()?;

        found.thing.ok_or(ProxyError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{config::tests::planner_config, http::fake::ScriptedTransport};

    #[tokio::test]
    async fn search_encodes_query() {
        let body = json!({
            "items": [
                { "bggId": 13, "name": "Catan", "year": 1995, "minPlayers": 3, "maxPlayers": 4, "durationMin": 90 },
                { "bggId": "926", "name": "Catan: Seafarers" },
            ]
        });
        let transport = Arc::new(ScriptedTransport::new().respond(200, body.to_string()));
        let client = BggProxyClient::new(transport.clone(), &planner_config());

        let items = client.search("  catan & co ").await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].summary(), "Catan (3-4p • 90m)");
        assert_eq!(items[1].bgg_id, BggId(926));
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://fn.example.com/bggSearch?q=catan+%26+co"
        );
    }

    #[tokio::test]
    async fn empty_search_body() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, "{}"));
        let client = BggProxyClient::new(transport, &planner_config());

        assert!(client.search("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn thing_by_id() {
        let body = json!({
            "thing": {
                "bggId": 13,
                "name": "Catan",
                "expansions": [{ "bggId": 926, "name": "Catan: Seafarers" }],
            }
        });
        let transport = Arc::new(ScriptedTransport::new().respond(200, body.to_string()));
        let client = BggProxyClient::new(transport.clone(), &planner_config());

        let thing = client.thing(BggId(13)).await.unwrap();

        assert_eq!(thing.name, "Catan");
        assert_eq!(thing.expansions[0].name, "Catan: Seafarers");
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://fn.example.com/bggThing?id=13"
        );
    }

    #[tokio::test]
    async fn missing_thing_and_failures() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, r#"{"thing":null}"#)
                .respond(502, "upstream"),
        );
        let client = BggProxyClient::new(transport, &planner_config());

        assert!(matches!(
            client.thing(BggId(1)).await,
            Err(ProxyError::NotFound(BggId(1)))
        ));
        assert!(matches!(
            client.thing(BggId(1)).await,
            Err(ProxyError::Fetch(FetchError::Status { status: 502, .. }))
        ));
    }
}
