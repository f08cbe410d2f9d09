use crate::RemoteError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Compiled-in production registry endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "https://identifiers.fair-research.org";
/// Compiled-in login service endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://auth.fair-research.org/v2/oauth2";
/// Native-app client id registered with the login service.
pub const DEFAULT_CLIENT_ID: &str = "b61613f8-0da8-4be7-81aa-1c89f2c0fe9f";

const DEFAULT_REDIRECT_PORT: u16 = 8642;

/// Endpoints and login parameters, read from `{config_dir}/config.json`
/// when present.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub registry_url: String,
    pub auth_url: String,
    pub client_id: String,
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

fn default_redirect_port() -> u16 {
    DEFAULT_REDIRECT_PORT
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_owned(),
            auth_url: DEFAULT_AUTH_URL.to_owned(),
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            redirect_port: DEFAULT_REDIRECT_PORT,
        }
    }
}

impl ServiceConfig {
    pub fn config_path(config_dir: &Path) -> PathBuf {
        config_dir.join("config.json")
    }

    /// Load from `{config_dir}/config.json`, falling back to the compiled-in
    /// defaults when no config file exists.
    pub fn load_or_default(config_dir: &Path) -> Result<Self, RemoteError> {
        let path = Self::config_path(config_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| RemoteError::Config(format!("invalid service config: {e}")))?;
        config.normalize();
        Ok(config)
    }

    #[must_use]
    pub fn with_registry_url(mut self, url: &str) -> Self {
        self.registry_url = url.to_owned();
        self.normalize();
        self
    }

    fn normalize(&mut self) {
        self.registry_url = self.registry_url.trim_end_matches('/').to_owned();
        self.auth_url = self.auth_url.trim_end_matches('/').to_owned();
    }
}
