//! Persisted client state: the auth session and user preferences.
//!
//! Both stores follow the same lifecycle:
//!
//! 1. **hydrate** from a JSON file at startup (a missing file means empty
//!    state; a corrupt file is logged and treated as empty),
//! 2. mutate through explicit methods that write through to disk,
//! 3. **clear** on sign-out, which also removes the file.
//!
//! Nothing here is global. Callers construct a store and hand it to whatever
//! needs it; the stream client receives the session as an
//! `Arc<dyn TokenSource>`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Supplies the current access token.
///
/// Read synchronously at submit time; implementations must not block.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// A fixed token (or none), e.g. from `OLYMPUS_TOKEN` or an SSE token
/// exchange.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Profile of the signed-in user, as returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email_confirmed: bool,
}

fn default_role() -> String {
    "member".to_string()
}
fn default_true() -> bool {
    true
}

/// Tokens issued by the auth service, plus what we know about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthSession {
    /// A session holding only an access token (no expiry, no profile).
    pub fn from_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            user: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// Persisted auth session.
pub struct SessionStore {
    path: PathBuf,
    session: RwLock<Option<AuthSession>>,
}

impl SessionStore {
    /// Load the session persisted at `path`, if any.
    pub fn hydrate(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = load_or_warn::<AuthSession>(&path, "session");
        Self {
            path,
            session: RwLock::new(session),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current session, including an expired one.
    pub fn session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the session and persist it.
    pub fn sign_in(&self, session: AuthSession) -> Result<()> {
        save_json(&self.path, &session)?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        tracing::debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    /// Drop the in-memory session and delete the persisted file.
    pub fn sign_out(&self) -> Result<()> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
        remove_file_if_exists(&self.path)
    }
}

impl TokenSource for SessionStore {
    /// `None` when signed out or when the stored token has expired.
    fn access_token(&self) -> Option<String> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        let session = guard.as_ref()?;
        if session.is_expired_at(Utc::now()) {
            tracing::debug!("stored access token has expired");
            return None;
        }
        Some(session.access_token.clone())
    }
}

/// User preferences that outlive a single command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Space used for queries when none is given explicitly.
    #[serde(default)]
    pub active_space_id: Option<String>,
    /// Ask the backend to persist queries by default.
    #[serde(default)]
    pub persist_queries: bool,
}

/// Persisted [`Preferences`].
pub struct PreferencesStore {
    path: PathBuf,
    prefs: RwLock<Preferences>,
}

impl PreferencesStore {
    pub fn hydrate(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = load_or_warn::<Preferences>(&path, "preferences").unwrap_or_default();
        Self {
            path,
            prefs: RwLock::new(prefs),
        }
    }

    pub fn get(&self) -> Preferences {
        self.prefs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `change` and persist the result.
    pub fn update<F>(&self, change: F) -> Result<Preferences>
    where
        F: FnOnce(&mut Preferences),
    {
        let mut next = self.get();
        change(&mut next);
        save_json(&self.path, &next)?;
        *self.prefs.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        Ok(next)
    }

    /// Reset to defaults and delete the persisted file.
    pub fn clear(&self) -> Result<()> {
        *self.prefs.write().unwrap_or_else(PoisonError::into_inner) = Preferences::default();
        remove_file_if_exists(&self.path)
    }
}

fn load_or_warn<T: DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    match load_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable {} file", what);
            None
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let value = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
