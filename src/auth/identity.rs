use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use time::Duration;
use tracing::info;
use url::Url;

use super::{session::AuthSession, AuthError};
use crate::{
    config::PlannerConfig,
    http::{HttpRequest, HttpResponse, HttpTransport},
    models::types::UtcDateTime,
};

/// The managed auth service's REST API: custom-token, password and refresh sign-ins.
pub struct IdentityClient {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    identity_base_url: String,
    secure_token_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    #[serde(default)]
    local_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct TokenClaims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

impl IdentityClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &PlannerConfig) -> IdentityClient {
        IdentityClient {
            transport,
            api_key: config.firebase_api_key.clone(),
            identity_base_url: config.identity_base_url.trim_end_matches('/').to_owned(),
            secure_token_url: config.secure_token_url.clone(),
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn sign_in_with_custom_token(&self, token: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .post(
                "accounts:signInWithCustomToken",
                json!({ "token": token, "returnSecureToken": true }),
            )
            .await?;

        self.session_from(response)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let response = self
            .post(
                "accounts:signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        self.session_from(response)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .post(
                "accounts:signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        self.session_from(response)
    }

    #[tracing::instrument(skip_all, fields(uid = %session.uid))]
    pub async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let mut url = Url::parse(&self.secure_token_url)?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let request = HttpRequest::post_json(
            url,
            json!({ "grant_type": "refresh_token", "refresh_token": session.refresh_token }),
        );
        let response = identity_result(self.transport.send(request).await?)?;
        let refreshed: RefreshResponse = response.json()?;

        info!("Refreshed the id token");

        Ok(AuthSession {
            uid: refreshed.user_id,
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expires_at(&refreshed.expires_in),
            email: session.email.clone(),
        })
    }

    async fn post(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<HttpResponse, AuthError> {
        let mut url = Url::parse(&format!("{}/{method}", self.identity_base_url))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let response = self.transport.send(HttpRequest::post_json(url, body)).await?;
        identity_result(response)
    }

    fn session_from(&self, response: HttpResponse) -> Result<AuthSession, AuthError> {
        let signed_in: SignInResponse = response.json()?;

        let uid = match signed_in.local_id {
            Some(uid) => uid,
            None => uid_from_id_token(&signed_in.id_token)?,
        };

        Ok(AuthSession {
            uid,
            expires_at: expires_at(&signed_in.expires_in),
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
            email: signed_in.email,
        })
    }
}

/// Non-2xx responses carry the service's own message, which is shown as is.
fn identity_result(response: HttpResponse) -> Result<HttpResponse, AuthError> {
    if response.is_success() {
        return Ok(response);
    }

    let message = serde_json::from_str::<ErrorResponse>(&response.body)
        .map(|error| error.error.message)
        .unwrap_or(response.body);

    Err(AuthError::Identity(message))
}

fn expires_at(expires_in: &str) -> UtcDateTime {
    let seconds = expires_in.trim().parse().unwrap_or(0);
    UtcDateTime::now() + Duration::seconds(seconds)
}

/// Custom-token sign-ins do not return the uid, but the id token's claims carry it.
fn uid_from_id_token(id_token: &str) -> Result<String, AuthError> {
    let payload = id_token.split('.').nth(1).ok_or(AuthError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken)?;
    let claims: TokenClaims =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)?;

    claims
        .user_id
        .or(claims.sub)
        .ok_or(AuthError::MalformedToken)
}
