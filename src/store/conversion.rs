use std::str::FromStr;

use thiserror::Error;

use super::firestore::Document;
use crate::models::{GameDay, GameDayId, PostId, PublicationStatus, Table, TableId, WantToPlay};

pub trait FromDocument: Sized {
    fn from_document(document: &Document) -> Result<Self, ConversionError>;
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Failed to parse enum variant: {0}")]
    NoSuchVariant(String),
}

impl FromDocument for GameDay {
    fn from_document(document: &Document) -> Result<Self, ConversionError> {
        let status = document.string("status").unwrap_or_default();
        let status = PublicationStatus::from_str(&status)
            .map_err(|_| ConversionError::NoSuchVariant(status))?;

        Ok(GameDay {
            id: GameDayId(document.id.clone()),
            title: document.string("title"),
            location: document.string("location"),
            starts_at: document.timestamp("startsAt"),
            status,
        })
    }
}

impl FromDocument for Table {
    fn from_document(document: &Document) -> Result<Self, ConversionError> {
        Ok(Table {
            id: TableId(document.id.clone()),
            host_uid: document.string("hostUid"),
            host_display_name: document.string("hostDisplayName"),
            game_name: document.string("gameName"),
            bgg_url: document.string("bggUrl"),
            thumb_url: document.string("thumbUrl"),
            start_time: document.timestamp("startTime"),
            capacity: document.unsigned("capacity").unwrap_or(0),
            confirmed_names: document.strings("confirmedNames"),
            waitlist_names: document.strings("waitlistNames"),
            expansion_names: document.nested_strings("expansions", "name"),
            notes: document.string("notes"),
        })
    }
}

impl FromDocument for WantToPlay {
    fn from_document(document: &Document) -> Result<Self, ConversionError> {
        Ok(WantToPlay {
            id: PostId(document.id.clone()),
            created_by_uid: document.string("createdByUid"),
            created_by_display_name: document.string("createdByDisplayName"),
            game_name: document.string("gameName"),
            bgg_url: document.string("bggUrl"),
            thumb_url: document.string("thumbUrl"),
            notes: document.string("notes"),
            created_at: document.timestamp("createdAt"),
        })
    }
}
