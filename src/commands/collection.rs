use std::sync::Arc;

use clap::Args;
use tracing::info;

use super::{internal_err, CommandResult, OutputArgs};
use crate::{
    collection::{filter_games, CollectionClient, CollectionError, CollectionFilter},
    config::CollectionConfig,
    http::HttpTransport,
    models::Game,
    render::{render_collection, render_collection_error},
};

#[derive(Debug, Args)]
pub struct CollectionArgs {
    /// Whose collection to show. Defaults to GAMEDAY_BGG_USERNAME.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Only games whose name contains this text.
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Only games that support this many players.
    #[arg(short, long)]
    pub players: Option<u32>,

    /// Only games that play in at most this many minutes.
    #[arg(long)]
    pub max_time: Option<u32>,

    /// Only games with a matching mechanic. Implies --details.
    #[arg(short, long)]
    pub mechanic: Option<String>,

    /// Load mechanics from the thing endpoint. Slow for big collections.
    #[arg(short, long)]
    pub details: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl CollectionArgs {
    fn filter(&self) -> CollectionFilter {
        CollectionFilter {
            search: self.search.clone(),
            players: self.players,
            max_play_time: self.max_time,
            mechanic: self.mechanic.clone(),
        }
    }

    fn wants_details(&self) -> bool {
        self.details || self.mechanic.is_some()
    }
}

/// Fetches, filters and renders a collection. On failure the region gets the
/// static error message and the command fails.
#[tracing::instrument(skip(config, transport))]
pub async fn collection(
    config: &CollectionConfig,
    transport: Arc<dyn HttpTransport>,
    args: CollectionArgs,
) -> CommandResult {
    let client = CollectionClient::new(transport, config)
        .map_err(|err| internal_err(format!("Could not set up the BGG client: {err}")))?;
    let username = args
        .username
        .clone()
        .unwrap_or_else(|| config.bgg_username.clone());

    let games = match load(&client, &username, args.wants_details()).await {
        Ok(games) => games,
        Err(err) => {
            args.output.write(&render_collection_error()).await?;
            return Err(internal_err(format!(
                "Could not load the collection of {username}: {err}"
            )));
        }
    };

    let filter = args.filter();
    let shown = filter_games(&games, &filter);
    info!("Showing {} of {} games", shown.len(), games.len());

    args.output.write(&render_collection(&shown)).await?;

    Ok(())
}

async fn load(
    client: &CollectionClient,
    username: &str,
    details: bool,
) -> Result<Vec<Game>, CollectionError> {
    let mut games = client.fetch_collection(username).await?;

    if details {
        client.fetch_details(&mut games).await?;
    }

    Ok(games)
}
