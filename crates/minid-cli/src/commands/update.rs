use super::{make_client, print_record, require_login, EXIT_SUCCESS};
use minid_remote::ServiceConfig;
use std::path::Path;

pub fn run(
    config_dir: &Path,
    config: &ServiceConfig,
    identifier: &str,
    title: Option<&str>,
    locations: Option<Vec<String>>,
    json: bool,
) -> Result<u8, String> {
    let tokens = require_login(config_dir, config)?;
    let client = make_client(config, Some(tokens.access_token));

    let record = client
        .update(identifier, title, locations)
        .map_err(|e| e.to_string())?;
    print_record(&record, json)?;
    Ok(EXIT_SUCCESS)
}
