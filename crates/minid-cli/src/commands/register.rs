use super::{
    json_pretty, make_client, print_record, require_login, spin_fail, spin_ok, spinner,
    EXIT_SUCCESS,
};
use minid_core::RegisterOptions;
use minid_remote::ServiceConfig;
use std::path::Path;

pub fn run(
    config_dir: &Path,
    config: &ServiceConfig,
    file: &Path,
    options: &RegisterOptions,
    json: bool,
) -> Result<u8, String> {
    let tokens = require_login(config_dir, config)?;
    let client = make_client(config, Some(tokens.access_token));

    let pb = spinner("computing checksum and registering…");
    let outcome = client.register_file(file, options).map_err(|e| {
        spin_fail(&pb, "registration failed");
        e.to_string()
    })?;
    spin_ok(&pb, "registration complete");

    if json {
        println!("{}", json_pretty(&outcome)?);
    } else {
        if outcome.created {
            println!("minted {}", outcome.record.identifier);
        } else {
            println!("already registered as {}", outcome.record.identifier);
        }
        print_record(&outcome.record, false)?;
    }
    Ok(EXIT_SUCCESS)
}
