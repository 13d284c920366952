use std::path::PathBuf;

use serde::Deserialize;

pub const ENV_PREFIX: &str = "GAMEDAY_";

/// Settings for `gameday collection`, read from `GAMEDAY_*` variables.
#[derive(Clone, Debug, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_bgg_api_base")]
    pub bgg_api_base: String,
    #[serde(default = "default_bgg_username")]
    pub bgg_username: String,
    pub bgg_api_token: Option<String>,
    #[serde(default = "default_bgg_retry_delay_ms")]
    pub bgg_retry_delay_ms: u64,
    #[serde(default = "default_bgg_detail_batch_size")]
    pub bgg_detail_batch_size: usize,
    #[serde(default = "default_bgg_batch_delay_ms")]
    pub bgg_batch_delay_ms: u64,
}

/// Settings for `gameday planner ...`.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    pub discord_client_id: String,
    pub discord_redirect_uri: String,
    #[serde(default = "default_discord_authorize_url")]
    pub discord_authorize_url: String,
    #[serde(default = "default_discord_scope")]
    pub discord_scope: String,
    #[serde(default = "default_true")]
    pub discord_use_pkce: bool,
    pub discord_auth_function_url: String,

    pub bgg_search_url: String,
    pub bgg_thing_url: String,

    /// e.g. `https://us-central1-<project>.cloudfunctions.net`
    pub functions_base_url: String,
    pub firebase_api_key: String,
    pub firebase_project_id: String,
    #[serde(default = "default_identity_base_url")]
    pub identity_base_url: String,
    #[serde(default = "default_secure_token_url")]
    pub secure_token_url: String,
    #[serde(default = "default_firestore_base_url")]
    pub firestore_base_url: String,

    /// The uid allowed to create and delete game days.
    pub owner_uid: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Offset used to read and display local times, e.g. `UTC-6`.
    #[serde(default = "default_display_utc_offset")]
    pub display_utc_offset: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl CollectionConfig {
    pub fn from_env() -> Result<CollectionConfig, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<PlannerConfig, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }
}

fn default_bgg_api_base() -> String {
    "https://boardgamegeek.com/xmlapi2".to_owned()
}

fn default_bgg_username() -> String {
    "traditz".to_owned()
}

fn default_bgg_retry_delay_ms() -> u64 {
    2_000
}

fn default_bgg_detail_batch_size() -> usize {
    20
}

fn default_bgg_batch_delay_ms() -> u64 {
    5_000
}

fn default_discord_authorize_url() -> String {
    "https://discord.com/api/oauth2/authorize".to_owned()
}

fn default_discord_scope() -> String {
    "identify".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_identity_base_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_owned()
}

fn default_secure_token_url() -> String {
    "https://securetoken.googleapis.com/v1/token".to_owned()
}

fn default_firestore_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_display_utc_offset() -> String {
    "UTC".to_owned()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".gameday")
}
