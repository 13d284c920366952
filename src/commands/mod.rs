mod arguments;
mod collection;
mod planner;
mod prompt;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;

pub use collection::{collection, CollectionArgs};
pub use planner::{planner, PlannerCommand};

type CommandResult = Result<(), CommandError>;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("{message}")]
    User { message: String },
    #[error("{message}")]
    Internal { message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Prompt(#[from] dialoguer::Error),
}

impl From<arguments::ArgumentError> for CommandError {
    fn from(err: arguments::ArgumentError) -> Self {
        CommandError::User {
            message: err.message,
        }
    }
}

fn user_err(message: impl Into<String>) -> CommandError {
    CommandError::User {
        message: message.into(),
    }
}

fn internal_err(message: impl Into<String>) -> CommandError {
    CommandError::Internal {
        message: message.into(),
    }
}

/// Board game collection viewer and game day planner.
#[derive(Debug, Parser)]
#[command(name = "gameday", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a BoardGameGeek collection as HTML.
    Collection(CollectionArgs),
    /// Sign in, browse game days, host tables and join them.
    Planner {
        #[command(subcommand)]
        command: PlannerCommand,
    },
}

/// Writes a rendered region to `path`, or to stdout without one.
async fn write_output(path: Option<&Path>, html: &str) -> std::io::Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, html).await,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(html.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await
        }
    }
}

/// Where a command should put its HTML.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct OutputArgs {
    /// Write the HTML to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    async fn write(&self, html: &str) -> std::io::Result<()> {
        write_output(self.output.as_deref(), html).await
    }
}
