use super::{json_pretty, make_client, require_login, EXIT_FAILURE, EXIT_SUCCESS};
use minid_core::RegisterOptions;
use minid_remote::ServiceConfig;
use std::path::Path;

pub fn run(
    config_dir: &Path,
    config: &ServiceConfig,
    manifest: &Path,
    options: &RegisterOptions,
    json: bool,
) -> Result<u8, String> {
    let tokens = require_login(config_dir, config)?;
    let client = make_client(config, Some(tokens.access_token));

    let report = client
        .batch_register(manifest, options)
        .map_err(|e| e.to_string())?;

    for failure in &report.failures {
        eprintln!(
            "entry {} ({}): {}",
            failure.index,
            failure.filename.as_deref().unwrap_or("<unnamed>"),
            failure.error
        );
    }

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!(
            "{} created, {} matched, {} failed",
            report.created,
            report.matched,
            report.failures.len()
        );
        if report.interrupted {
            println!("interrupted before completing the manifest");
        }
    }

    if report.failures.is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILURE)
    }
}
