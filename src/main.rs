#![forbid(unsafe_code)]

mod actions;
mod auth;
mod bgg_proxy;
mod collection;
mod commands;
mod config;
mod error_handler;
mod http;
mod models;
mod render;
mod store;
mod utils;

use std::{process::exit, sync::Arc};

use anyhow::Context;
use clap::Parser;
use commands::{Cli, Command};
use config::{CollectionConfig, PlannerConfig};
use error_handler::handle_error;
use http::{HttpTransport, ReqwestTransport};
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        warn!("Could not load config from .env file: {err}");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(
                    "gameday=info"
                        .parse()
                        .expect("Hard-coded default directive should be correct"),
                )
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let transport: Arc<dyn HttpTransport> = match ReqwestTransport::new()
        .context("Could not set up the HTTP client")
    {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            error!("{err:#}");
            exit(255);
        }
    };

    let result = match cli.command {
        Command::Collection(args) => match load_config(CollectionConfig::from_env) {
            Ok(config) => commands::collection(&config, transport, args).await,
            Err(err) => {
                error!("{err:#}");
                exit(255);
            }
        },

        Command::Planner { command } => match load_config(PlannerConfig::from_env) {
            Ok(config) => commands::planner(&config, transport, command).await,
            Err(err) => {
                error!("{err:#}");
                exit(255);
            }
        },
    };

    if let Err(err) = result {
        handle_error(err);
        exit(1);
    }
}

fn load_config<T>(from_env: impl FnOnce() -> Result<T, envy::Error>) -> anyhow::Result<T> {
    from_env().context("Could not load app config from GAMEDAY_* variables")
}
