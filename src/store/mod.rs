mod conversion;
mod firestore;

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::broadcast::{self, Receiver, Sender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    models::{GameDay, GameDayId, PublicationStatus, Table, WantToPlay},
    render::PlannerView,
};

pub use conversion::{ConversionError, FromDocument};
pub use firestore::{Document, DocumentQuery, DocumentSource, FirestoreSource, SourceError, Value};

#[cfg(test)]
pub use firestore::fake;

/// One live query the store keeps running.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubscriptionKey {
    GameDays,
    Tables(GameDayId),
    Posts(GameDayId),
}

impl SubscriptionKey {
    fn query(&self) -> DocumentQuery {
        match self {
            SubscriptionKey::GameDays => DocumentQuery::collection("gamedays")
                .where_equal("status", PublicationStatus::Published.as_ref())
                .order_by("startsAt"),
            SubscriptionKey::Tables(day) => DocumentQuery::collection("tables")
                .under(format!("gamedays/{day}"))
                .order_by("startTime"),
            SubscriptionKey::Posts(day) => DocumentQuery::collection("posts")
                .under(format!("gamedays/{day}"))
                .order_by("createdAt"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    GameDaysUpdated,
    TablesUpdated(GameDayId),
    PostsUpdated(GameDayId),
    /// The open day was collapsed because it no longer exists.
    Collapsed(GameDayId),
    LoadFailed(String),
}

#[derive(Default)]
struct StoreState {
    game_days: Option<Vec<GameDay>>,
    expanded: Option<GameDayId>,
    tables: HashMap<GameDayId, Vec<Table>>,
    wants: HashMap<GameDayId, Vec<WantToPlay>>,
    load_error: Option<String>,
}

struct Shared {
    source: Arc<dyn DocumentSource>,
    poll_interval: Duration,
    state: RwLock<StoreState>,
    listeners: Mutex<HashMap<SubscriptionKey, JoinHandle<()>>>,
    events: Sender<StoreEvent>,
}

/// Published game days, and the tables and posts of the one open day, kept
/// current by listener tasks that poll the document source.
///
/// Listeners are aborted on [`GameDayStore::dispose`] or when the store is dropped.
pub struct GameDayStore {
    shared: Arc<Shared>,
}

impl GameDayStore {
    pub fn new(source: Arc<dyn DocumentSource>, poll_interval: Duration) -> GameDayStore {
        GameDayStore {
            shared: Arc::new(Shared {
                source,
                poll_interval,
                state: RwLock::new(StoreState::default()),
                listeners: Mutex::new(HashMap::new()),
                events: broadcast::channel(128).0,
            }),
        }
    }

    pub fn events(&self) -> Receiver<StoreEvent> {
        self.shared.events.subscribe()
    }

    /// Starts listening to published game days, and to the open day if there is one.
    pub fn subscribe_game_days(&self) {
        self.shared.listen(SubscriptionKey::GameDays);

        let expanded = self.shared.state.read().expanded.clone();
        if let Some(day) = expanded {
            self.shared.listen_day(day);
        }
    }

    /// Opens `day`, closing whichever day was open before.
    ///
    /// Detail listeners only run while game days are subscribed; otherwise the
    /// day's tables and posts are loaded by [`GameDayStore::refresh`].
    pub fn expand(&self, day: GameDayId) {
        let previous = self.shared.state.write().expanded.replace(day.clone());

        if let Some(previous) = previous.filter(|previous| *previous != day) {
            self.shared.unsubscribe_day(&previous);
        }

        if self.shared.is_live() {
            self.shared.listen_day(day);
        }
    }

    pub fn collapse(&self) {
        let previous = self.shared.state.write().expanded.take();

        if let Some(previous) = previous {
            self.shared.unsubscribe_day(&previous);
        }
    }

    /// Clicking an open day closes it, clicking any other day opens that one.
    pub fn toggle(&self, day: GameDayId) {
        let is_open = self.shared.state.read().expanded.as_ref() == Some(&day);

        if is_open {
            self.collapse();
        } else {
            self.expand(day);
        }
    }

    /// Runs every query the current view needs once, without waiting for the listeners.
    pub async fn refresh(&self) -> Result<(), SourceError> {
        self.shared.poll(&SubscriptionKey::GameDays).await?;

        let expanded = self.shared.state.read().expanded.clone();
        if let Some(day) = expanded {
            self.shared.poll(&SubscriptionKey::Tables(day.clone())).await?;
            self.shared.poll(&SubscriptionKey::Posts(day)).await?;
        }

        Ok(())
    }

    pub fn snapshot(&self) -> PlannerView {
        let state = self.shared.state.read();

        let (tables, wants) = match &state.expanded {
            Some(day) => (
                state.tables.get(day).cloned().unwrap_or_default(),
                state.wants.get(day).cloned().unwrap_or_default(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        PlannerView {
            game_days: state.game_days.clone().unwrap_or_default(),
            expanded: state.expanded.clone(),
            tables,
            wants,
            load_error: state.load_error.clone(),
        }
    }

    pub fn active_subscriptions(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<SubscriptionKey> = self.shared.listeners.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn dispose(&self) {
        let mut listeners = self.shared.listeners.lock();

        for (key, listener) in listeners.drain() {
            debug!("Stopping listener {key:?}");
            listener.abort();
        }
    }
}

impl Drop for GameDayStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    /// Starts a listener for `key` unless one is already running.
    fn listen(self: &Arc<Self>, key: SubscriptionKey) {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(&key) {
            return;
        }

        debug!("Starting listener {key:?}");

        let shared = Arc::downgrade(self);
        let task_key = key.clone();
        let listener = tokio::spawn(async move {
            loop {
                // The store going away ends the listener even if the abort is missed.
                let Some(shared) = shared.upgrade() else {
                    return;
                };

                if let Err(err) = shared.poll(&task_key).await {
                    warn!("Query for {task_key:?} failed: {err}");
                }

                let poll_interval = shared.poll_interval;
                drop(shared);
                tokio::time::sleep(poll_interval).await;
            }
        });

        listeners.insert(key, listener);
    }

    fn listen_day(self: &Arc<Self>, day: GameDayId) {
        self.listen(SubscriptionKey::Tables(day.clone()));
        self.listen(SubscriptionKey::Posts(day));
    }

    fn is_live(&self) -> bool {
        self.listeners.lock().contains_key(&SubscriptionKey::GameDays)
    }

    fn unsubscribe_day(&self, day: &GameDayId) {
        let mut listeners = self.listeners.lock();
        for key in [
            SubscriptionKey::Tables(day.clone()),
            SubscriptionKey::Posts(day.clone()),
        ] {
            if let Some(listener) = listeners.remove(&key) {
                debug!("Stopping listener {key:?}");
                listener.abort();
            }
        }
        drop(listeners);

        let mut state = self.state.write();
        state.tables.remove(day);
        state.wants.remove(day);
    }

    /// Runs the query behind `key` and applies the result, announcing changes only.
    async fn poll(&self, key: &SubscriptionKey) -> Result<(), SourceError> {
        let documents = match self.source.run_query(&key.query()).await {
            Ok(documents) => documents,
            Err(err) => {
                if *key == SubscriptionKey::GameDays {
                    self.state.write().load_error = Some(err.to_string());
                    let _ = self.events.send(StoreEvent::LoadFailed(err.to_string()));
                }
                return Err(err);
            }
        };

        let events = match key {
            SubscriptionKey::GameDays => self.apply_game_days(convert_all(&documents)),
            SubscriptionKey::Tables(day) => self.apply_tables(day, convert_all(&documents)),
            SubscriptionKey::Posts(day) => self.apply_posts(day, convert_all(&documents)),
        };

        for event in events {
            let _ = self.events.send(event); // Nobody listening is fine
        }

        Ok(())
    }

    fn apply_game_days(&self, game_days: Vec<GameDay>) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        let mut state = self.state.write();

        if state.load_error.take().is_some() || state.game_days.as_ref() != Some(&game_days) {
            events.push(StoreEvent::GameDaysUpdated);
        }

        let vanished = state
            .expanded
            .clone()
            .filter(|day| !game_days.iter().any(|game_day| game_day.id == *day));
        state.game_days = Some(game_days);

        if let Some(day) = vanished {
            info!("Game day {day} is gone, closing it");
            state.expanded = None;
            drop(state);

            self.unsubscribe_day(&day);
            events.push(StoreEvent::Collapsed(day));
        }

        events
    }

    fn apply_tables(&self, day: &GameDayId, tables: Vec<Table>) -> Vec<StoreEvent> {
        let mut state = self.state.write();

        // A late answer for a day that has been closed in the meantime.
        if state.expanded.as_ref() != Some(day) {
            return Vec::new();
        }

        if state.tables.get(day) == Some(&tables) {
            return Vec::new();
        }

        state.tables.insert(day.clone(), tables);
        vec![StoreEvent::TablesUpdated(day.clone())]
    }

    fn apply_posts(&self, day: &GameDayId, wants: Vec<WantToPlay>) -> Vec<StoreEvent> {
        let mut state = self.state.write();

        if state.expanded.as_ref() != Some(day) {
            return Vec::new();
        }

        if state.wants.get(day) == Some(&wants) {
            return Vec::new();
        }

        state.wants.insert(day.clone(), wants);
        vec![StoreEvent::PostsUpdated(day.clone())]
    }
}

/// Converts every document it can, logging and skipping the rest.
fn convert_all<T: FromDocument>(documents: &[Document]) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match T::from_document(document) {
            Ok(converted) => Some(converted),
            Err(err) => {
                warn!("Skipping document {}: {err}", document.id);
                None
            }
        })
        .collect()
}
