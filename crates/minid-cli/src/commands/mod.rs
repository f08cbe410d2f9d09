pub mod batch_register;
pub mod check;
pub mod completions;
pub mod login;
pub mod logout;
pub mod man_pages;
pub mod register;
pub mod update;

use indicatif::{ProgressBar, ProgressStyle};
use minid_core::MinidClient;
use minid_remote::{
    ensure_logged_in, AuthClient, HttpRegistry, IdentifierRecord, ServiceConfig, TokenSet,
    TokenStore,
};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_AUTH_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Load the service config, applying the `--registry` override.
pub fn load_config(
    config_dir: &Path,
    registry_override: Option<&str>,
) -> Result<ServiceConfig, String> {
    let config = ServiceConfig::load_or_default(config_dir).map_err(|e| e.to_string())?;
    Ok(match registry_override {
        Some(url) => config.with_registry_url(url),
        None => config,
    })
}

pub fn make_client(config: &ServiceConfig, token: Option<String>) -> MinidClient {
    MinidClient::new(Box::new(HttpRegistry::new(config, token)))
}

/// Resolve stored credentials, refreshing expired tokens silently.
pub fn require_login(config_dir: &Path, config: &ServiceConfig) -> Result<TokenSet, String> {
    let store = TokenStore::new(config_dir);
    let auth = AuthClient::new(&config.auth_url, &config.client_id);
    ensure_logged_in(&store, &auth).map_err(|e| e.to_string())
}

pub fn print_record(record: &IdentifierRecord, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(record)?);
        return Ok(());
    }
    let id_style = console::Style::new().cyan().bold();
    println!("{}", id_style.apply_to(record.identifier.as_str()));
    if let Some(title) = record.metadata.get("erc.what") {
        println!("  title: {title}");
    }
    for checksum in &record.checksums {
        println!("  {}: {}", checksum.function, checksum.value);
    }
    for location in &record.location {
        println!("  location: {location}");
    }
    if let Some(created) = record.created {
        println!("  created: {created}");
    }
    if let Some(updated) = record.updated {
        println!("  updated: {updated}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use minid_remote::DEFAULT_REGISTRY_URL;

    #[test]
    fn json_pretty_serializes_value() {
        let val = serde_json::json!({"identifier": "minid:000001"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"identifier\""));
        assert!(result.contains("minid:000001"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_MANIFEST_ERROR);
        assert_ne!(EXIT_MANIFEST_ERROR, EXIT_AUTH_ERROR);
    }

    #[test]
    fn load_config_applies_registry_override() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path(), Some("http://127.0.0.1:9000/")).unwrap();
        assert_eq!(config.registry_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn load_config_defaults_without_override() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
    }

    #[test]
    fn require_login_without_tokens_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::default();
        let err = require_login(dir.path(), &config).unwrap_err();
        assert!(err.starts_with("not logged in"));
    }

    #[test]
    fn spinner_finishes_ok() {
        let pb = spinner("working…");
        spin_ok(&pb, "done");
    }

    #[test]
    fn spinner_finishes_fail() {
        let pb = spinner("working…");
        spin_fail(&pb, "failed");
    }
}
