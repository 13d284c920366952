mod identity;
mod oauth;
mod session;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::{
    config::PlannerConfig,
    http::{FetchError, HttpRequest, HttpTransport},
    models::types::UtcDateTime,
};

pub use identity::IdentityClient;
pub use oauth::{CallbackParams, OAuthSettings, PendingSignIn};
pub use session::{
    AuthSession, FileSessionStore, MemorySessionStore, SessionError, SessionState, SessionStore,
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing ?code from Discord.")]
    MissingCode,
    #[error("Missing ?state from Discord.")]
    MissingState,
    #[error("State mismatch (blocked for safety). Try signing in again.")]
    StateMismatch,
    #[error("discordAuth failed: {status} {body}")]
    TokenExchange { status: u16, body: String },
    #[error("No firebaseToken in response.")]
    MissingToken,
    #[error("The id token could not be read.")]
    MalformedToken,
    /// The auth service's own error text, shown to the user unchanged.
    #[error("{0}")]
    Identity(String),
    #[error("Not signed in.")]
    NotSignedIn,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenExchangeResponse {
    #[serde(default)]
    firebase_token: Option<String>,
}

/// Hands out an id token that is valid right now.
#[async_trait]
pub trait IdTokenSource: Send + Sync {
    async fn id_token(&self) -> Result<String, AuthError>;
}

/// Both ways into the planner: Discord OAuth via the backend's token exchange,
/// and email/password straight against the auth service.
pub struct AuthGateway {
    transport: Arc<dyn HttpTransport>,
    sessions: Arc<dyn SessionStore>,
    identity: IdentityClient,
    oauth: OAuthSettings,
    owner_uid: Option<String>,
    refreshing: Mutex<()>,
}

impl AuthGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        sessions: Arc<dyn SessionStore>,
        config: &PlannerConfig,
    ) -> AuthGateway {
        AuthGateway {
            identity: IdentityClient::new(transport.clone(), config),
            transport,
            sessions,
            oauth: OAuthSettings::from(config),
            owner_uid: config.owner_uid.clone(),
            refreshing: Mutex::new(()),
        }
    }

    /// Generates and remembers a fresh anti-forgery state (and PKCE verifier),
    /// returning the URL to send the user to.
    #[tracing::instrument(skip(self))]
    pub async fn begin_discord_sign_in(&self) -> Result<Url, AuthError> {
        let pending = oauth::new_pending_sign_in(self.oauth.use_pkce);
        let url = oauth::authorize_url(&self.oauth, &pending)?;

        let mut state = self.sessions.load().await?;
        state.pending_sign_in = Some(pending);
        self.sessions.save(&state).await?;

        info!("Discord sign-in started");
        Ok(url)
    }

    /// Verifies the redirect Discord sent back and trades its code for a session.
    ///
    /// Nothing is sent to the backend unless the echoed state matches the one
    /// generated by the most recent [`AuthGateway::begin_discord_sign_in`].
    #[tracing::instrument(skip_all)]
    pub async fn complete_discord_callback(
        &self,
        callback: &Url,
    ) -> Result<AuthSession, AuthError> {
        let params = CallbackParams::from_url(callback);
        let code = params.code.ok_or(AuthError::MissingCode)?;
        let echoed_state = params.state.ok_or(AuthError::MissingState)?;

        let mut state = self.sessions.load().await?;
        let pending = match &state.pending_sign_in {
            Some(pending) if pending.state == echoed_state => pending.clone(),
            Some(_) => {
                warn!("OAuth state mismatch, refusing to exchange the code");
                return Err(AuthError::StateMismatch);
            }
            None => {
                warn!("OAuth callback without a pending sign-in");
                return Err(AuthError::StateMismatch);
            }
        };

        // The state is single-use once it has matched.
        state.pending_sign_in = None;
        self.sessions.save(&state).await?;

        let backend_token = self.exchange_code(&code, &pending).await?;
        let session = self.identity.sign_in_with_custom_token(&backend_token).await?;

        self.store_session(session).await
    }

    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let session = self
            .identity
            .sign_in_with_password(email.trim(), password)
            .await?;
        self.store_session(session).await
    }

    pub async fn sign_up_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let session = self.identity.sign_up(email.trim(), password).await?;
        self.store_session(session).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.sessions.load().await?;
        state.session = None;
        self.sessions.save(&state).await?;

        info!("Signed out");
        Ok(())
    }

    /// The stored session, refreshed first if its id token has expired.
    pub async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let state = self.sessions.load().await?;
        if !state.session.as_ref().is_some_and(|session| session.is_expired(UtcDateTime::now())) {
            return Ok(state.session);
        }

        // Listeners may all notice the expiry at once; the first one refreshes.
        let _refreshing = self.refreshing.lock().await;
        match self.sessions.load().await?.session {
            Some(session) if session.is_expired(UtcDateTime::now()) => {
                let refreshed = self.identity.refresh(&session).await?;
                Ok(Some(self.store_session(refreshed).await?))
            }
            session => Ok(session),
        }
    }

    pub async fn require_session(&self) -> Result<AuthSession, AuthError> {
        self.current_session().await?.ok_or(AuthError::NotSignedIn)
    }

    /// Only gates what the UI offers; the backend enforces admin rights itself.
    pub fn is_admin(&self, session: &AuthSession) -> bool {
        self.owner_uid.as_deref() == Some(session.uid.as_str())
    }

    async fn exchange_code(&self, code: &str, pending: &PendingSignIn) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.oauth.exchange_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("code", code)
                .append_pair("state", &pending.state)
                .append_pair("redirect", &self.oauth.redirect_uri);

            if let Some(verifier) = &pending.code_verifier {
                query.append_pair("code_verifier", verifier);
            }
        }

        let response = self.transport.send(HttpRequest::get(url)).await?;
        if !response.is_success() {
            return Err(AuthError::TokenExchange {
                status: response.status,
                body: response.body,
            });
        }

        let exchanged: TokenExchangeResponse = response.json()?;
        exchanged
            .firebase_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)
    }

    async fn store_session(&self, session: AuthSession) -> Result<AuthSession, AuthError> {
        let mut state = self.sessions.load().await?;
        state.session = Some(session.clone());
        self.sessions.save(&state).await?;

        info!("Signed in as {}", session.uid);
        Ok(session)
    }
}

#[async_trait]
impl IdTokenSource for AuthGateway {
    async fn id_token(&self) -> Result<String, AuthError> {
        Ok(self.require_session().await?.id_token)
    }
}

#[cfg(test)]
#[async_trait]
impl IdTokenSource for String {
    async fn id_token(&self) -> Result<String, AuthError> {
        Ok(self.clone())
    }
}
