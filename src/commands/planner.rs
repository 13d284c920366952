use std::{future::Future, str::FromStr, sync::Arc, time::Duration};

use clap::Subcommand;
use time::UtcOffset;
use tokio::{select, signal, sync::broadcast::error::RecvError};
use tracing::{info, warn};
use url::Url;

use super::{
    arguments::{parse_utc_offset, Capacity, FormText, HumanDateTime, IdList},
    internal_err,
    prompt::{Prompter, TerminalPrompter},
    user_err, CommandError, CommandResult, OutputArgs,
};
use crate::{
    actions::{
        ActionDispatcher, ActionError, CreateGameDay, TableDetails, Wizard, WizardError,
        WizardKind,
    },
    auth::{AuthError, AuthGateway, AuthSession, FileSessionStore, SessionStore},
    bgg_proxy::BggProxyClient,
    config::PlannerConfig,
    http::HttpTransport,
    models::{types::UtcDateTime, BggId, GameDayId, TableId},
    render::{render_planner, render_signed_out, Viewer},
    store::{FirestoreSource, GameDayStore},
};

#[derive(Debug, Subcommand)]
pub enum PlannerCommand {
    /// Print the Discord sign-in URL.
    LoginUrl,
    /// Finish a Discord sign-in with the URL Discord redirected back to.
    Callback { url: String },
    /// Sign in with email and password.
    SignIn {
        #[arg(long)]
        email: FormText,
    },
    /// Create an account with email and password.
    SignUp {
        #[arg(long)]
        email: FormText,
    },
    SignOut,
    /// Render the game day list once.
    Days {
        /// Also show the tables and posts of this game day.
        #[arg(long)]
        open: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Keep the game day list rendered as it changes, until Ctrl-C.
    Watch {
        #[arg(long)]
        open: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Create a game day (owner only).
    CreateDay {
        #[arg(long)]
        title: FormText,
        #[arg(long, default_value = "")]
        location: FormText,
        /// e.g. `2026-01-05 18:00`, optionally followed by `UTC-6`.
        #[arg(long)]
        starts: HumanDateTime,
    },
    /// Delete a game day with all its tables and posts (owner only).
    DeleteDay {
        day: String,
        /// Skip the confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Host a table: pick a game, then a start time and seats.
    Host {
        day: String,
        /// Expansion ids to bring, e.g. `926,325`. Asked for when left out.
        #[arg(long)]
        expansions: Option<IdList>,
    },
    /// Post a game you would like someone to host.
    Want { day: String },
    Join { day: String, table: String },
    /// Leave a table. Leaving a table you host deletes it.
    Leave { day: String, table: String },
}

#[tracing::instrument(skip(config, transport))]
pub async fn planner(
    config: &PlannerConfig,
    transport: Arc<dyn HttpTransport>,
    command: PlannerCommand,
) -> CommandResult {
    let sessions = Arc::new(FileSessionStore::new(&config.state_dir));
    Planner::new(config, transport, sessions, TerminalPrompter::default())?
        .run(command)
        .await
}

struct Planner<'a, P> {
    config: &'a PlannerConfig,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<AuthGateway>,
    offset: UtcOffset,
    prompt: P,
}

impl<'a, P: Prompter> Planner<'a, P> {
    fn new(
        config: &'a PlannerConfig,
        transport: Arc<dyn HttpTransport>,
        sessions: Arc<dyn SessionStore>,
        prompt: P,
    ) -> Result<Self, CommandError> {
        let offset = parse_utc_offset(&config.display_utc_offset)
            .map_err(|err| user_err(format!("Invalid GAMEDAY_DISPLAY_UTC_OFFSET. {err}")))?;

        Ok(Planner {
            config,
            auth: Arc::new(AuthGateway::new(transport.clone(), sessions, config)),
            transport,
            offset,
            prompt,
        })
    }

    async fn run(&mut self, command: PlannerCommand) -> CommandResult {
        match command {
            PlannerCommand::LoginUrl => self.login_url().await,
            PlannerCommand::Callback { url } => self.callback(&url).await,
            PlannerCommand::SignIn { email } => self.email_sign_in(email, false).await,
            PlannerCommand::SignUp { email } => self.email_sign_in(email, true).await,
            PlannerCommand::SignOut => {
                self.auth.sign_out().await.map_err(auth_error)?;
                self.prompt.say("Signed out.")?;
                Ok(())
            }
            PlannerCommand::Days { open, output } => self.days(open, &output).await,
            PlannerCommand::Watch { open, output } => {
                let ctrl_c = async {
                    if let Err(err) = signal::ctrl_c().await {
                        warn!("Could not listen for Ctrl-C: {err}");
                    }
                };
                self.watch(open, &output, ctrl_c).await
            }
            PlannerCommand::CreateDay {
                title,
                location,
                starts,
            } => self.create_day(title, location, starts).await,
            PlannerCommand::DeleteDay { day, yes } => self.delete_day(GameDayId(day), yes).await,
            PlannerCommand::Host { day, expansions } => {
                self.host(GameDayId(day), expansions).await
            }
            PlannerCommand::Want { day } => self.want(GameDayId(day)).await,
            PlannerCommand::Join { day, table } => {
                let actions = self.actions().await?;
                actions
                    .join_table(&GameDayId(day), &TableId(table))
                    .await
                    .map_err(|err| action_error("Join", err))?;
                self.prompt.say("Joined (or waitlisted if the table is full).")?;
                Ok(())
            }
            PlannerCommand::Leave { day, table } => {
                let actions = self.actions().await?;
                actions
                    .leave_table(&GameDayId(day), &TableId(table))
                    .await
                    .map_err(|err| action_error("Leave", err))?;
                self.prompt.say("Left the table.")?;
                Ok(())
            }
        }
    }

    async fn login_url(&mut self) -> CommandResult {
        let url = self.auth.begin_discord_sign_in().await.map_err(auth_error)?;

        self.prompt
            .say("Open this URL, then pass the address you land on to `gameday planner callback`:")?;
        self.prompt.say(url.as_str())?;
        Ok(())
    }

    async fn callback(&mut self, url: &str) -> CommandResult {
        let url = Url::parse(url.trim())
            .map_err(|err| user_err(format!("Invalid callback URL: {err}")))?;

        let session = self
            .auth
            .complete_discord_callback(&url)
            .await
            .map_err(auth_error)?;

        self.prompt.say(&format!("Signed in as {}.", session.uid))?;
        Ok(())
    }

    async fn email_sign_in(&mut self, email: FormText, sign_up: bool) -> CommandResult {
        let email = email.required("Email")?;
        let password = self.prompt.password("Password")?;
        if password.is_empty() {
            return Err(user_err("Password is required."));
        }

        let session = if sign_up {
            self.auth.sign_up_with_email(&email, &password).await
        } else {
            self.auth.sign_in_with_email(&email, &password).await
        }
        .map_err(auth_error)?;

        self.prompt.say(&format!(
            "Signed in as {}.",
            session.email.as_deref().unwrap_or(&session.uid)
        ))?;
        Ok(())
    }

    async fn days(&mut self, open: Option<String>, output: &OutputArgs) -> CommandResult {
        let Some(session) = self.auth.current_session().await.map_err(auth_error)? else {
            output.write(&render_signed_out()).await?;
            return Ok(());
        };

        let store = self.store();
        if let Some(day) = open {
            store.expand(GameDayId(day));
        }

        let refreshed = store.refresh().await;
        output.write(&self.render(&store, &session)).await?;

        refreshed.map_err(|err| internal_err(format!("Error loading gamedays: {err}")))
    }

    /// Re-renders on every store event until `shutdown` resolves.
    async fn watch(
        &mut self,
        open: Option<String>,
        output: &OutputArgs,
        shutdown: impl Future<Output = ()>,
    ) -> CommandResult {
        let Some(session) = self.auth.current_session().await.map_err(auth_error)? else {
            output.write(&render_signed_out()).await?;
            return Ok(());
        };

        let store = self.store();
        let mut events = store.events();
        if let Some(day) = open {
            store.expand(GameDayId(day));
        }
        store.subscribe_game_days();
        info!("Watching game days, press Ctrl-C to stop");

        tokio::pin!(shutdown);
        loop {
            select! {
                _ = &mut shutdown => {
                    info!("Stopped watching");
                    break;
                },

                event = events.recv() => match event {
                    Ok(event) => {
                        info!("{event:?}");
                        output.write(&self.render(&store, &session)).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Skipped {skipped} store events");
                        output.write(&self.render(&store, &session)).await?;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
        }

        store.dispose();
        Ok(())
    }

    async fn create_day(
        &mut self,
        title: FormText,
        location: FormText,
        starts: HumanDateTime,
    ) -> CommandResult {
        let session = self.session().await?;
        if !self.auth.is_admin(&session) {
            return Err(user_err("Only the owner can create game days."));
        }

        let title = title.required("Title")?;

        let request = CreateGameDay {
            title,
            location: location.into_inner(),
            starts_at: starts.to_utc(self.offset),
        };

        let result = self
            .dispatcher()
            .create_game_day(&request)
            .await
            .map_err(|err| action_error("Create", err))?;

        match result.get("id").and_then(|id| id.as_str()) {
            Some(id) => self.prompt.say(&format!("Created game day {id}."))?,
            None => self.prompt.say("Created the game day.")?,
        }
        Ok(())
    }

    async fn delete_day(&mut self, day: GameDayId, confirmed: bool) -> CommandResult {
        let session = self.session().await?;
        if !self.auth.is_admin(&session) {
            return Err(user_err("Only the owner can delete game days."));
        }

        let confirmed = confirmed
            || self.prompt.confirm(
                "Delete this Game Day? This removes all tables, signups, and want-to-play posts.",
            )?;
        if !confirmed {
            return Ok(());
        }

        self.dispatcher()
            .delete_game_day(&day)
            .await
            .map_err(|err| action_error("Delete", err))?;

        self.prompt.say(&format!("Deleted game day {day}."))?;
        Ok(())
    }

    async fn host(&mut self, day: GameDayId, expansions: Option<IdList>) -> CommandResult {
        let actions = self.actions().await?;
        let proxy = BggProxyClient::new(self.transport.clone(), self.config);
        let mut wizard = Wizard::new(WizardKind::HostTable, day);

        if !self.pick_game(&mut wizard, &proxy).await? {
            return Ok(());
        }

        let Some(start) = self
            .prompt
            .input("Start time (YYYY-MM-DD HH:MM) e.g. 2025-12-28 14:00")?
        else {
            return Ok(());
        };
        let start_time = HumanDateTime::from_str(&start)?.to_utc(self.offset);

        let capacity = self
            .prompt
            .input("Seat count (capacity). Leave blank to use game max players.")?
            .unwrap_or_default();
        let Capacity(capacity) = Capacity::from_str(&capacity)?;

        let expansion_ids = match expansions {
            Some(IdList(ids)) => ids,
            None => self.pick_expansions(&wizard)?,
        };
        let notes = self.notes()?;

        wizard
            .submit_table(
                &actions,
                TableDetails {
                    start_time,
                    capacity,
                    expansion_ids,
                    notes,
                },
            )
            .await
            .map_err(|err| wizard_error("Host table", err))?;

        self.prompt.say("Table created.")?;
        Ok(())
    }

    async fn want(&mut self, day: GameDayId) -> CommandResult {
        let actions = self.actions().await?;
        let proxy = BggProxyClient::new(self.transport.clone(), self.config);
        let mut wizard = Wizard::new(WizardKind::WantToPlay, day);

        if !self.pick_game(&mut wizard, &proxy).await? {
            return Ok(());
        }

        let notes = self.notes()?;
        wizard
            .submit_want_to_play(&actions, notes)
            .await
            .map_err(|err| wizard_error("Want to play", err))?;

        self.prompt.say("Want to Play posted.")?;
        Ok(())
    }

    /// Searches and picks a game. `false` when the person backs out.
    async fn pick_game(
        &mut self,
        wizard: &mut Wizard,
        proxy: &BggProxyClient,
    ) -> Result<bool, CommandError> {
        let what = match wizard.kind() {
            WizardKind::HostTable => "Host table",
            WizardKind::WantToPlay => "Want to play",
        };

        let Some(query) = self.prompt.input("Search BoardGameGeek (example: catan)")? else {
            return Ok(false);
        };

        let items: Vec<String> = wizard
            .search(proxy, &query)
            .await
            .map_err(|err| wizard_error(what, err))?
            .iter()
            .map(|item| item.summary())
            .collect();

        if items.is_empty() {
            self.prompt.say("No results.")?;
            return Ok(false);
        }

        let Some(index) = self.prompt.select("Pick a game", &items)? else {
            return Ok(false);
        };

        let thing = match wizard.pick(proxy, index + 1).await {
            Ok(thing) => thing,
            Err(WizardError::InvalidChoice { .. }) => return Ok(false),
            Err(err) => return Err(wizard_error(what, err)),
        };
        let picked = format!("Picked {}.", thing.name);
        self.prompt.say(&picked)?;

        Ok(true)
    }

    fn pick_expansions(&mut self, wizard: &Wizard) -> Result<Vec<BggId>, CommandError> {
        let choices = wizard.expansion_choices();
        if choices.is_empty() || !self.prompt.confirm("Add expansions?")? {
            return Ok(Vec::new());
        }

        let items: Vec<String> = choices
            .iter()
            .map(|expansion| format!("{} (id={})", expansion.name, expansion.bgg_id))
            .collect();
        let picked = self.prompt.multi_select("Expansions to bring", &items)?;

        Ok(picked
            .into_iter()
            .filter_map(|index| choices.get(index))
            .map(|expansion| expansion.bgg_id)
            .collect())
    }

    fn notes(&mut self) -> Result<String, CommandError> {
        Ok(self.prompt.input("Notes (optional)")?.unwrap_or_default())
    }

    async fn session(&self) -> Result<AuthSession, CommandError> {
        self.auth.require_session().await.map_err(auth_error)
    }

    /// Fails early when nobody is signed in, before any question is asked.
    async fn actions(&self) -> Result<ActionDispatcher, CommandError> {
        self.session().await?;
        Ok(self.dispatcher())
    }

    fn dispatcher(&self) -> ActionDispatcher {
        ActionDispatcher::new(self.transport.clone(), self.config, self.auth.clone())
    }

    fn store(&self) -> GameDayStore {
        let source = FirestoreSource::new(self.transport.clone(), self.config, self.auth.clone());

        GameDayStore::new(
            Arc::new(source),
            Duration::from_secs(self.config.poll_interval_secs.max(1)),
        )
    }

    fn render(&self, store: &GameDayStore, session: &AuthSession) -> String {
        let viewer = Viewer {
            uid: &session.uid,
            is_admin: self.auth.is_admin(session),
        };

        render_planner(&store.snapshot(), viewer, UtcDateTime::now(), self.offset)
    }
}

fn auth_error(err: AuthError) -> CommandError {
    match err {
        AuthError::NotSignedIn => user_err(
            "Not signed in. Run `gameday planner login-url` or `gameday planner sign-in` first.",
        ),
        AuthError::Fetch(_) | AuthError::Session(_) | AuthError::Url(_) => {
            internal_err(format!("Sign-in failed: {err}"))
        }
        err => user_err(format!("Sign-in failed.\n{err}")),
    }
}

fn action_error(what: &str, err: ActionError) -> CommandError {
    match err {
        ActionError::Auth(err) => auth_error(err),
        ActionError::Missing(_) | ActionError::Rejected { .. } => {
            user_err(format!("{what} failed: {err}"))
        }
        err => internal_err(format!("{what} failed: {err}")),
    }
}

fn wizard_error(what: &str, err: WizardError) -> CommandError {
    match err {
        WizardError::Action(err) => action_error(what, err),
        WizardError::Proxy(err) => internal_err(format!("{what} failed: {err}")),
        err => user_err(err.to_string()),
    }
}
