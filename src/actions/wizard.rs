use std::mem;

use thiserror::Error;
use tracing::debug;

use super::{ActionDispatcher, ActionError, CreateTable, CreateWantToPlay};
use crate::{
    bgg_proxy::{BggProxyClient, ProxyError},
    models::{types::UtcDateTime, BggId, ExpansionRef, GameDayId, SearchItem, Thing},
};

/// How many of a game's expansions are offered when hosting.
pub const EXPANSION_CHOICES: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WizardKind {
    HostTable,
    WantToPlay,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WizardState {
    Idle,
    Searching { results: Vec<SearchItem> },
    Selected { thing: Thing },
    Submitting,
    Done(serde_json::Value),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Cannot {action} now.")]
    WrongStep { action: &'static str },
    #[error("Pick a number between 1 and {max}.")]
    InvalidChoice { max: usize },
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// What hosting needs on top of the picked game.
#[derive(Clone, Debug, PartialEq)]
pub struct TableDetails {
    pub start_time: UtcDateTime,
    pub capacity: u32,
    pub expansion_ids: Vec<BggId>,
    pub notes: String,
}

/// The shared "find a game, then post it" flow behind hosting a table and
/// asking to play something.
///
/// `Idle -> Searching -> Selected -> Submitting -> Done | Failed`. An empty
/// search cancels back to `Idle`; a bad pick leaves the results in place.
#[derive(Debug)]
pub struct Wizard {
    kind: WizardKind,
    day: GameDayId,
    state: WizardState,
}

impl Wizard {
    pub fn new(kind: WizardKind, day: GameDayId) -> Wizard {
        Wizard {
            kind,
            day,
            state: WizardState::Idle,
        }
    }

    pub fn kind(&self) -> WizardKind {
        self.kind
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// The expansions of the selected game that can be attached to a table.
    pub fn expansion_choices(&self) -> &[ExpansionRef] {
        match &self.state {
            WizardState::Selected { thing } => {
                &thing.expansions[..thing.expansions.len().min(EXPANSION_CHOICES)]
            }
            _ => &[],
        }
    }

    pub async fn search(
        &mut self,
        proxy: &BggProxyClient,
        query: &str,
    ) -> Result<&[SearchItem], WizardError> {
        if !matches!(self.state, WizardState::Idle | WizardState::Searching { .. }) {
            return Err(WizardError::WrongStep { action: "search" });
        }

        if query.trim().is_empty() {
            self.state = WizardState::Idle;
            return Ok(&[]);
        }

        let results = proxy.search(query).await?;
        debug!("{} results for {query:?}", results.len());

        self.state = WizardState::Searching { results };
        match &self.state {
            WizardState::Searching { results } => Ok(results),
            _ => Ok(&[]),
        }
    }

    /// Picks the `choice`th (1-based) search result and loads its details.
    pub async fn pick(
        &mut self,
        proxy: &BggProxyClient,
        choice: usize,
    ) -> Result<&Thing, WizardError> {
        let WizardState::Searching { results } = &self.state else {
            return Err(WizardError::WrongStep { action: "pick a game" });
        };

        let selected = choice
            .checked_sub(1)
            .and_then(|index| results.get(index))
            .ok_or(WizardError::InvalidChoice { max: results.len() })?;

        let thing = proxy.thing(selected.bgg_id).await?;

        self.state = WizardState::Selected { thing };
        match &self.state {
            WizardState::Selected { thing } => Ok(thing),
            _ => Err(WizardError::WrongStep { action: "pick a game" }),
        }
    }

    pub async fn submit_table(
        &mut self,
        actions: &ActionDispatcher,
        details: TableDetails,
    ) -> Result<serde_json::Value, WizardError> {
        if self.kind != WizardKind::HostTable {
            return Err(WizardError::WrongStep { action: "host a table" });
        }
        let thing = self.begin_submit()?;

        let request = CreateTable {
            gameday_id: self.day.0.clone(),
            base_thing: thing,
            capacity: details.capacity,
            start_time: details.start_time,
            notes: details.notes,
            expansion_ids: details.expansion_ids,
        };

        let result = actions.create_table(&request).await;
        self.finish(result)
    }

    pub async fn submit_want_to_play(
        &mut self,
        actions: &ActionDispatcher,
        notes: String,
    ) -> Result<serde_json::Value, WizardError> {
        if self.kind != WizardKind::WantToPlay {
            return Err(WizardError::WrongStep {
                action: "post a want to play",
            });
        }
        let thing = self.begin_submit()?;

        let request = CreateWantToPlay {
            gameday_id: self.day.0.clone(),
            thing,
            notes,
        };

        let result = actions.create_want_to_play(&request).await;
        self.finish(result)
    }

    fn begin_submit(&mut self) -> Result<Thing, WizardError> {
        match mem::replace(&mut self.state, WizardState::Submitting) {
            WizardState::Selected { thing } => Ok(thing),
            previous => {
                self.state = previous;
                Err(WizardError::WrongStep { action: "submit" })
            }
        }
    }

    fn finish(
        &mut self,
        result: Result<serde_json::Value, ActionError>,
    ) -> Result<serde_json::Value, WizardError> {
        match result {
            Ok(value) => {
                self.state = WizardState::Done(value.clone());
                Ok(value)
            }
            Err(err) => {
                self.state = WizardState::Failed(err.to_string());
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::{config::tests::planner_config, http::fake::ScriptedTransport};

    fn catan() -> serde_json::Value {
        json!({
            "bggId": 13,
            "name": "Catan",
            "maxPlayers": 4,
            "expansions": [{ "bggId": 926, "name": "Catan: Seafarers" }],
        })
    }

    fn search_body() -> String {
        json!({ "items": [{ "bggId": 13, "name": "Catan" }, { "bggId": 27710, "name": "Catan Dice Game" }] })
            .to_string()
    }

    fn clients(transport: &Arc<ScriptedTransport>) -> (BggProxyClient, ActionDispatcher) {
        let config = planner_config();
        (
            BggProxyClient::new(transport.clone(), &config),
            ActionDispatcher::new(transport.clone(), &config, Arc::new("id-token".to_owned())),
        )
    }

    #[tokio::test]
    async fn host_table_flow() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, search_body())
                .respond(200, json!({ "thing": catan() }).to_string())
                .respond(200, r#"{"result":{"id":"t1"}}"#),
        );
        let (proxy, actions) = clients(&transport);
        let mut wizard = Wizard::new(WizardKind::HostTable, GameDayId("gd1".to_owned()));

        assert_eq!(wizard.search(&proxy, "catan").await.unwrap().len(), 2);
        assert_eq!(wizard.pick(&proxy, 1).await.unwrap().name, "Catan");
        assert_eq!(wizard.expansion_choices().len(), 1);

        wizard
            .submit_table(
                &actions,
                TableDetails {
                    start_time: UtcDateTime::from(datetime!(2026-01-10 19:00 UTC)),
                    capacity: 0,
                    expansion_ids: vec![BggId(926)],
                    notes: "Teaching game".to_owned(),
                },
            )
            .await
            .unwrap();

        assert_eq!(wizard.state(), &WizardState::Done(json!({ "id": "t1" })));

        let request = &transport.requests()[2];
        assert_eq!(request.url.as_str(), "https://fn.example.com/createTable");
        assert_eq!(
            request.json,
            Some(json!({
                "data": {
                    "gamedayId": "gd1",
                    "baseThing": catan(),
                    "capacity": 0,
                    "startTime": "2026-01-10T19:00:00Z",
                    "notes": "Teaching game",
                    "expansionIds": [926],
                }
            }))
        );
    }

    #[tokio::test]
    async fn want_to_play_failure_is_kept() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, search_body())
                .respond(200, json!({ "thing": catan() }).to_string())
                .respond(
                    400,
                    json!({ "error": { "status": "INVALID_ARGUMENT", "message": "Game day is archived." } })
                        .to_string(),
                ),
        );
        let (proxy, actions) = clients(&transport);
        let mut wizard = Wizard::new(WizardKind::WantToPlay, GameDayId("gd1".to_owned()));

        wizard.search(&proxy, "catan").await.unwrap();
        wizard.pick(&proxy, 1).await.unwrap();
        let result = wizard.submit_want_to_play(&actions, String::new()).await;

        assert!(matches!(
            result,
            Err(WizardError::Action(ActionError::Rejected { .. }))
        ));
        assert_eq!(
            wizard.state(),
            &WizardState::Failed("Game day is archived.".to_owned())
        );
    }

    #[tokio::test]
    async fn empty_search_cancels() {
        let transport = Arc::new(ScriptedTransport::new());
        let (proxy, _) = clients(&transport);
        let mut wizard = Wizard::new(WizardKind::WantToPlay, GameDayId("gd1".to_owned()));

        assert!(wizard.search(&proxy, "   ").await.unwrap().is_empty());
        assert_eq!(wizard.state(), &WizardState::Idle);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn bad_pick_keeps_results() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, search_body()));
        let (proxy, _) = clients(&transport);
        let mut wizard = Wizard::new(WizardKind::HostTable, GameDayId("gd1".to_owned()));

        wizard.search(&proxy, "catan").await.unwrap();

        assert!(matches!(
            wizard.pick(&proxy, 0).await,
            Err(WizardError::InvalidChoice { max: 2 })
        ));
        assert!(matches!(
            wizard.pick(&proxy, 3).await,
            Err(WizardError::InvalidChoice { max: 2 })
        ));
        assert!(matches!(wizard.state(), WizardState::Searching { .. }));
    }

    #[tokio::test]
    async fn steps_cannot_be_skipped() {
        let transport = Arc::new(ScriptedTransport::new());
        let (proxy, actions) = clients(&transport);
        let mut wizard = Wizard::new(WizardKind::HostTable, GameDayId("gd1".to_owned()));

        assert!(matches!(
            wizard.pick(&proxy, 1).await,
            Err(WizardError::WrongStep { .. })
        ));
        assert!(matches!(
            wizard.submit_want_to_play(&actions, String::new()).await,
            Err(WizardError::WrongStep { .. })
        ));
        assert_eq!(wizard.state(), &WizardState::Idle);
        assert!(transport.requests().is_empty());
    }
}
