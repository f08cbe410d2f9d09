use super::EXIT_SUCCESS;
use minid_remote::{AuthClient, LoginState, ServiceConfig, TokenStore};
use std::path::Path;
use tracing::debug;

pub fn run(config_dir: &Path, config: &ServiceConfig) -> Result<u8, String> {
    let store = TokenStore::new(config_dir);
    let tokens = match store.state().map_err(|e| e.to_string())? {
        LoginState::NotLoggedIn => {
            println!("No user logged in, no logout necessary.");
            return Ok(EXIT_SUCCESS);
        }
        LoginState::LoggedIn(tokens) | LoginState::Expired(tokens) => tokens,
    };

    // Revocation is best effort; the tokens are cleared locally regardless.
    let auth = AuthClient::new(&config.auth_url, &config.client_id);
    if let Err(e) = auth.revoke(&tokens.access_token) {
        debug!("access token revocation failed: {e}");
    }
    if let Some(ref refresh) = tokens.refresh_token {
        if let Err(e) = auth.revoke(refresh) {
            debug!("refresh token revocation failed: {e}");
        }
    }

    store.clear().map_err(|e| e.to_string())?;
    println!("You have been logged out.");
    Ok(EXIT_SUCCESS)
}
