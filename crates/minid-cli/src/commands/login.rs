use super::EXIT_SUCCESS;
use minid_remote::{receive_auth_code, AuthClient, LoginState, ServiceConfig, TokenStore};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct LoginFlags {
    pub remember_me: bool,
    pub force: bool,
    pub no_local_server: bool,
    pub no_browser: bool,
}

pub fn run(config_dir: &Path, config: &ServiceConfig, flags: LoginFlags) -> Result<u8, String> {
    let store = TokenStore::new(config_dir);
    let auth = AuthClient::new(&config.auth_url, &config.client_id);

    if !flags.force {
        match store.state().map_err(|e| e.to_string())? {
            LoginState::LoggedIn(_) => {
                println!("You are already logged in.");
                return Ok(EXIT_SUCCESS);
            }
            LoginState::Expired(tokens) => {
                if let Some(ref refresh) = tokens.refresh_token {
                    let renewed = auth.refresh(refresh).map_err(|e| e.to_string())?;
                    store.save(&renewed).map_err(|e| e.to_string())?;
                    println!("Your login has been refreshed.");
                    return Ok(EXIT_SUCCESS);
                }
            }
            LoginState::NotLoggedIn => {}
        }
    }

    let redirect_uri = if flags.no_local_server {
        format!("{}/code", config.auth_url)
    } else {
        format!("http://127.0.0.1:{}/callback", config.redirect_port)
    };
    let url = auth.authorize_url(&redirect_uri, flags.remember_me);

    if flags.no_browser || open_browser(&url).is_err() {
        println!("Open this URL in a browser to log in:\n\n  {url}\n");
    } else {
        println!("Opening a browser to complete the login...");
    }

    let code = if flags.no_local_server {
        dialoguer::Input::<String>::new()
            .with_prompt("Paste the authorization code here")
            .interact_text()
            .map_err(|e| format!("failed to read authorization code: {e}"))?
    } else {
        receive_auth_code(config.redirect_port).map_err(|e| e.to_string())?
    };

    let tokens = auth
        .exchange_code(code.trim(), &redirect_uri)
        .map_err(|e| e.to_string())?;
    store.save(&tokens).map_err(|e| e.to_string())?;
    println!("You have been logged in.");
    Ok(EXIT_SUCCESS)
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let opener = "open";
    #[cfg(not(target_os = "macos"))]
    let opener = "xdg-open";

    std::process::Command::new(opener).arg(url).spawn()?;
    Ok(())
}
