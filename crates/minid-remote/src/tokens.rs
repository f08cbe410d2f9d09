//! On-disk bearer tokens and explicit login state.
//!
//! Call sites branch on [`LoginState`], never on caught errors: a missing
//! token file is `NotLoggedIn`, a stale one is `Expired`, and only genuine
//! I/O or parse failures surface as errors.

use crate::auth::AuthClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not logged in, run 'minid login' first")]
    NotLoggedIn,
    #[error("tokens expired, run 'minid login' again")]
    TokensExpired,
    #[error("login service error: {0}")]
    Http(String),
    #[error("auth I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token serialization error: {0}")]
    Serialization(String),
    #[error("login flow failed: {0}")]
    Flow(String),
}

/// Opaque bearer tokens for the registry, as issued by the login service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Current credential state, computed from the token file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    LoggedIn(TokenSet),
    Expired(TokenSet),
    NotLoggedIn,
}

/// Token file at `{config_dir}/tokens.json`.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join("tokens.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> Result<LoginState, AuthError> {
        if !self.path.exists() {
            return Ok(LoginState::NotLoggedIn);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let tokens: TokenSet = serde_json::from_str(&content)
            .map_err(|e| AuthError::Serialization(e.to_string()))?;
        if tokens.is_expired() {
            Ok(LoginState::Expired(tokens))
        } else {
            Ok(LoginState::LoggedIn(tokens))
        }
    }

    /// Atomic replace; tokens must never hit disk partially written.
    pub fn save(&self, tokens: &TokenSet) -> Result<(), AuthError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, tokens)
            .map_err(|e| AuthError::Serialization(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(&self.path).map_err(|e| AuthError::Io(e.error))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolve stored credentials into a usable token set.
///
/// Expired tokens with a refresh token are renewed and re-saved silently;
/// expired tokens without one fail with `TokensExpired`, and a missing token
/// file fails with `NotLoggedIn`.
pub fn ensure_logged_in(store: &TokenStore, auth: &AuthClient) -> Result<TokenSet, AuthError> {
    match store.state()? {
        LoginState::LoggedIn(tokens) => Ok(tokens),
        LoginState::Expired(tokens) => match tokens.refresh_token {
            Some(ref refresh) => {
                debug!("access token expired, refreshing");
                let renewed = auth.refresh(refresh)?;
                store.save(&renewed)?;
                Ok(renewed)
            }
            None => Err(AuthError::TokensExpired),
        },
        LoginState::NotLoggedIn => Err(AuthError::NotLoggedIn),
    }
}
