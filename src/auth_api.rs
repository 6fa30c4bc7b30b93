//! Client for the external auth service, and the `olympus auth` commands.
//!
//! Tokens are issued elsewhere; this module only trades credentials for a
//! session and stores it in the [`SessionStore`].

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::http::{api_client, check_status, endpoint, ApiError};
use crate::state::{AuthSession, SessionStore, TokenSource, UserProfile};

/// Body of a successful `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    /// Convert to a session, anchoring the expiry at the current time.
    pub fn into_session(self) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at: Some(Utc::now() + Duration::seconds(self.expires_in)),
            user: None,
        }
    }
}

/// Short-lived token for the stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SseToken {
    pub sse_token: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
    remember_me: bool,
}

pub struct AuthClient {
    client: Client,
    config: ApiConfig,
}

impl AuthClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: api_client(config)?,
            config: config.clone(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let url = endpoint(&self.config, "/api/auth/login")?;
        let response = self
            .client
            .post(url)
            .json(&LoginBody {
                email,
                password,
                remember_me: false,
            })
            .send()
            .await?;
        let response = match check_status(response, "login").await {
            Err(ApiError::Unauthorized) => return Err(ApiError::InvalidCredentials),
            other => other?,
        };
        let tokens: TokenResponse = response.json().await?;
        Ok(tokens.into_session())
    }

    /// Revoke the session server-side.
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let url = endpoint(&self.config, "/api/auth/logout")?;
        let response = self.client.post(url).bearer_auth(token).send().await?;
        check_status(response, "logout").await?;
        Ok(())
    }

    pub async fn me(&self, token: &str) -> Result<UserProfile, ApiError> {
        let url = endpoint(&self.config, "/api/auth/me")?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let response = check_status(response, "user profile").await?;
        Ok(response.json().await?)
    }

    /// Exchange an access token for a five-minute stream token.
    pub async fn sse_token(&self, token: &str) -> Result<SseToken, ApiError> {
        let url = endpoint(&self.config, "/api/auth/sse-token")?;
        let response = self.client.post(url).bearer_auth(token).send().await?;
        let response = check_status(response, "sse token").await?;
        Ok(response.json().await?)
    }
}

/// CLI entry point for `olympus auth login`.
pub async fn run_login(
    config: &ApiConfig,
    store: &SessionStore,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password.or_else(|| std::env::var("OLYMPUS_PASSWORD").ok()) {
        Some(p) if !p.is_empty() => p,
        _ => bail!("no password given: pass --password or set OLYMPUS_PASSWORD"),
    };

    let client = AuthClient::new(config)?;
    let mut session = client.login(email, &password).await?;

    match client.me(&session.access_token).await {
        Ok(profile) => session.user = Some(profile),
        Err(e) => tracing::warn!(error = %e, "signed in but could not fetch profile"),
    }

    store.sign_in(session.clone())?;
    let who = session
        .user
        .as_ref()
        .map(|u| u.email.as_str())
        .unwrap_or(email);
    println!("Signed in as {}", who);
    if let Some(expires_at) = session.expires_at {
        println!("Token expires at {}", expires_at.to_rfc3339());
    }
    Ok(())
}

/// CLI entry point for `olympus auth logout`.
///
/// The remote call is best-effort; the local session is always cleared.
pub async fn run_logout(config: &ApiConfig, store: &SessionStore) -> Result<()> {
    if let Some(token) = store.access_token() {
        let result = match AuthClient::new(config) {
            Ok(client) => client.logout(&token).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "remote logout failed, clearing local session anyway");
        }
    }
    store.sign_out()?;
    println!("Signed out.");
    Ok(())
}

/// CLI entry point for `olympus auth status`.
pub async fn run_status(config: &ApiConfig, store: &SessionStore) -> Result<()> {
    let Some(session) = store.session() else {
        println!("Not signed in.");
        return Ok(());
    };

    let now = Utc::now();
    if session.is_expired_at(now) {
        println!("Session expired. Run `olympus auth login`.");
        return Ok(());
    }

    let profile = match &session.user {
        Some(user) => Some(user.clone()),
        None => match AuthClient::new(config)?.me(&session.access_token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch profile");
                None
            }
        },
    };

    match profile {
        Some(user) => {
            println!("Signed in as {}", user.email);
            if let Some(name) = &user.full_name {
                println!("name:       {}", name);
            }
            println!("role:       {}", user.role);
        }
        None => println!("Signed in (profile unavailable)"),
    }
    match session.expires_at {
        Some(expires_at) => {
            let left = expires_at - now;
            println!(
                "expires:    {} ({} min left)",
                expires_at.to_rfc3339(),
                left.num_minutes()
            );
        }
        None => println!("expires:    never"),
    }
    println!("session:    {}", store.path().display());
    Ok(())
}

/// CLI entry point for `olympus auth set-token`.
pub fn run_set_token(store: &SessionStore, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("token must not be empty");
    }
    store
        .sign_in(AuthSession::from_token(token))
        .context("Failed to store token")?;
    println!("Token stored in {}", store.path().display());
    Ok(())
}
