use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::PlannerConfig;

/// What has to survive between the authorize redirect and the callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSignIn {
    pub state: String,
    pub code_verifier: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OAuthSettings {
    pub authorize_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub use_pkce: bool,
    pub exchange_url: String,
}

impl From<&PlannerConfig> for OAuthSettings {
    fn from(config: &PlannerConfig) -> Self {
        OAuthSettings {
            authorize_url: config.discord_authorize_url.clone(),
            client_id: config.discord_client_id.clone(),
            redirect_uri: config.discord_redirect_uri.clone(),
            scope: config.discord_scope.clone(),
            use_pkce: config.discord_use_pkce,
            exchange_url: config.discord_auth_function_url.clone(),
        }
    }
}

/// The `code` and `state` the provider echoes back on the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> CallbackParams {
        let mut params = CallbackParams::default();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if !value.is_empty() => params.code = Some(value.into_owned()),
                "state" if !value.is_empty() => params.state = Some(value.into_owned()),
                _ => (),
            }
        }

        params
    }
}

/// 32 random bytes, base64url encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The S256 code challenge for a PKCE verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn new_pending_sign_in(use_pkce: bool) -> PendingSignIn {
    PendingSignIn {
        state: random_token(),
        code_verifier: use_pkce.then(random_token),
    }
}

pub fn authorize_url(
    settings: &OAuthSettings,
    pending: &PendingSignIn,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&settings.authorize_url)?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &settings.client_id)
            .append_pair("redirect_uri", &settings.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &settings.scope)
            .append_pair("state", &pending.state);

        if let Some(verifier) = &pending.code_verifier {
            query
                .append_pair("code_challenge", &code_challenge(verifier))
                .append_pair("code_challenge_method", "S256");
        }
    }

    Ok(url)
}
