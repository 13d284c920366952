mod wizard;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::AsRefStr;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
    auth::{AuthError, IdTokenSource},
    config::PlannerConfig,
    http::{FetchError, HttpRequest, HttpTransport},
    models::{types::UtcDateTime, BggId, GameDayId, TableId, Thing},
};

pub use wizard::{TableDetails, Wizard, WizardError, WizardKind, WizardState, EXPANSION_CHOICES};

/// Backend functions the planner may call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum Callable {
    CreateGameDay,
    DeleteGameDay,
    CreateTable,
    CreateWantToPlay,
    JoinTable,
    LeaveTable,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} is required.")]
    Missing(&'static str),
    /// The backend refused the call; the message is meant for the user.
    #[error("{message}")]
    Rejected { status: String, message: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Invalid functions URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameDay {
    pub title: String,
    pub location: String,
    pub starts_at: UtcDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTable {
    pub gameday_id: String,
    pub base_thing: Thing,
    /// Zero lets the backend use the game's maximum player count.
    pub capacity: u32,
    pub start_time: UtcDateTime,
    pub notes: String,
    pub expansion_ids: Vec<BggId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWantToPlay {
    pub gameday_id: String,
    pub thing: Thing,
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableRef<'a> {
    gameday_id: &'a str,
    table_id: &'a str,
}

#[derive(Deserialize)]
struct CallableSuccess {
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct CallableFailure {
    error: CallableErrorBody,
}

#[derive(Deserialize)]
struct CallableErrorBody {
    #[serde(default)]
    status: String,
    message: String,
}

/// Calls the backend's callable functions as the signed-in user.
///
/// Only presence is checked here. Capacity, waitlists and admin rights are
/// the backend's business.
pub struct ActionDispatcher {
    transport: Arc<dyn HttpTransport>,
    functions_base_url: String,
    tokens: Arc<dyn IdTokenSource>,
}

impl ActionDispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &PlannerConfig,
        tokens: Arc<dyn IdTokenSource>,
    ) -> ActionDispatcher {
        ActionDispatcher {
            transport,
            functions_base_url: config.functions_base_url.trim_end_matches('/').to_owned(),
            tokens,
        }
    }

    pub async fn create_game_day(
        &self,
        request: &CreateGameDay,
    ) -> Result<serde_json::Value, ActionError> {
        if request.title.trim().is_empty() {
            return Err(ActionError::Missing("Title"));
        }

        self.call(Callable::CreateGameDay, request).await
    }

    pub async fn delete_game_day(&self, day: &GameDayId) -> Result<serde_json::Value, ActionError> {
        require("Game day", &day.0)?;

        self.call(Callable::DeleteGameDay, &json!({ "gamedayId": day.0 }))
            .await
    }

    pub async fn create_table(
        &self,
        request: &CreateTable,
    ) -> Result<serde_json::Value, ActionError> {
        require("Game day", &request.gameday_id)?;

        self.call(Callable::CreateTable, request).await
    }

    pub async fn create_want_to_play(
        &self,
        request: &CreateWantToPlay,
    ) -> Result<serde_json::Value, ActionError> {
        require("Game day", &request.gameday_id)?;

        self.call(Callable::CreateWantToPlay, request).await
    }

    pub async fn join_table(
        &self,
        day: &GameDayId,
        table: &TableId,
    ) -> Result<serde_json::Value, ActionError> {
        self.call(Callable::JoinTable, &table_ref(day, table)?).await
    }

    /// Leaving a table you host deletes it.
    pub async fn leave_table(
        &self,
        day: &GameDayId,
        table: &TableId,
    ) -> Result<serde_json::Value, ActionError> {
        self.call(Callable::LeaveTable, &table_ref(day, table)?).await
    }

    #[tracing::instrument(skip(self, data))]
    async fn call<T: Serialize + ?Sized>(
        &self,
        callable: Callable,
        data: &T,
    ) -> Result<serde_json::Value, ActionError> {
        let url = Url::parse(&format!("{}/{}", self.functions_base_url, callable.as_ref()))?;
        let body = json!({ "data": data });

        let id_token = self.tokens.id_token().await?;
        let request = HttpRequest::post_json(url, body).bearer(Some(&id_token));
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return match serde_json::from_str::<CallableFailure>(&response.body) {
                Ok(failure) => Err(ActionError::Rejected {
                    status: failure.error.status,
                    message: failure.error.message,
                }),
                Err(_) => Err(FetchError::Status {
                    status: response.status,
                    body: response.body,
                }
                .into()),
            };
        }

        let success: CallableSuccess = response.json()?;
        info!("{} succeeded", callable.as_ref());

        Ok(success.result)
    }
}

fn require(what: &'static str, value: &str) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        Err(ActionError::Missing(what))
    } else {
        Ok(())
    }
}

fn table_ref<'a>(day: &'a GameDayId, table: &'a TableId) -> Result<TableRef<'a>, ActionError> {
    require("Game day", &day.0)?;
    require("Table", &table.0)?;

    Ok(TableRef {
        gameday_id: &day.0,
        table_id: &table.0,
    })
}
