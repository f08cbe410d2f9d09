use clap::Parser;
use minid_server::RegistryStore;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "minid-server", about = "Reference identifier registry server")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8337)]
    port: u16,

    /// Directory to store identifier records.
    #[arg(long, default_value = "./minid-registry-data")]
    data_dir: PathBuf,

    /// Bearer token required on mutating routes. Unset runs the server open.
    #[arg(long)]
    auth_token: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    fs::create_dir_all(&cli.data_dir).expect("failed to create data directory");

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting minid-server on {addr}");
    info!("data directory: {}", cli.data_dir.display());

    let store = Arc::new(RegistryStore::new(cli.data_dir));
    minid_server::run_server(&store, &addr, cli.auth_token.as_deref());
}
