use super::{make_client, print_record, EXIT_FAILURE, EXIT_SUCCESS};
use minid_remote::ServiceConfig;
use minid_schema::HashAlgorithm;

pub fn run(config: &ServiceConfig, entity: &str, function: &str, json: bool) -> Result<u8, String> {
    let algorithm: HashAlgorithm = function.parse().map_err(|e: minid_schema::ChecksumError| {
        e.to_string()
    })?;
    // Lookups work unauthenticated.
    let client = make_client(config, None);

    match client.check(entity, algorithm).map_err(|e| e.to_string())? {
        Some(record) => {
            print_record(&record, json)?;
            Ok(EXIT_SUCCESS)
        }
        None => {
            println!("no identifier registered for '{entity}'");
            Ok(EXIT_FAILURE)
        }
    }
}
