mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{load_config, EXIT_AUTH_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use minid_core::{install_signal_handler, RegisterOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "minid",
    version,
    about = "Mint and resolve persistent identifiers bound to content checksums"
)]
struct Cli {
    /// Directory holding the service config and login tokens.
    #[arg(long, default_value = "~/.config/minid", global = true)]
    config_dir: String,

    /// Registry URL override.
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in to the identifier registry via the federated login service.
    Login {
        /// Request a refresh token so the login survives expiry.
        #[arg(long, default_value_t = false)]
        remember_me: bool,
        /// Log in again even when valid credentials exist.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Paste the authorization code instead of running a local listener.
        #[arg(long, default_value_t = false)]
        no_local_server: bool,
        /// Print the authorization URL instead of opening a browser.
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Revoke stored credentials and remove them from disk.
    Logout,
    /// Register a file: hash it and mint (or match) an identifier.
    Register {
        /// File to register.
        file: PathBuf,
        /// Human-readable title (defaults to the file name).
        #[arg(long)]
        title: Option<String>,
        /// Location URLs where the content can be fetched.
        #[arg(long)]
        locations: Vec<String>,
        /// Mint into the throwaway test namespace.
        #[arg(long, default_value_t = false)]
        test: bool,
        /// Mint a new identifier even when the checksum is already registered.
        #[arg(long, default_value_t = false)]
        force_new: bool,
    },
    /// Register every entry of a remote-file-manifest.
    BatchRegister {
        /// Path to the manifest (JSON document or one JSON object per line).
        manifest: PathBuf,
        /// Mint into the throwaway test namespace.
        #[arg(long, default_value_t = false)]
        test: bool,
        /// Mint new identifiers even for already-registered checksums.
        #[arg(long, default_value_t = false)]
        force_new: bool,
    },
    /// Resolve an identifier, checksum, or file to its registered record.
    Check {
        /// Identifier (minid:/hdl:/ark:/), bare checksum, or file path.
        entity: String,
        /// Checksum function used when hashing a file.
        #[arg(long, default_value = "sha256")]
        function: String,
    },
    /// Update the title and/or locations of an existing identifier.
    Update {
        /// Identifier to update.
        identifier: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// Replacement location URLs (omit to keep the stored ones).
        #[arg(long)]
        locations: Option<Vec<String>>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MINID_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let config_dir = expand_tilde(&cli.config_dir);
    let json_output = cli.json;

    let config = match load_config(&config_dir, cli.registry.as_deref()) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let result = match cli.command {
        Commands::Login {
            remember_me,
            force,
            no_local_server,
            no_browser,
        } => commands::login::run(
            &config_dir,
            &config,
            commands::login::LoginFlags {
                remember_me,
                force,
                no_local_server,
                no_browser,
            },
        ),
        Commands::Logout => commands::logout::run(&config_dir, &config),
        Commands::Register {
            file,
            title,
            locations,
            test,
            force_new,
        } => commands::register::run(
            &config_dir,
            &config,
            &file,
            &RegisterOptions {
                title,
                metadata: BTreeMap::new(),
                locations,
                test,
                force_new,
            },
            json_output,
        ),
        Commands::BatchRegister {
            manifest,
            test,
            force_new,
        } => commands::batch_register::run(
            &config_dir,
            &config,
            &manifest,
            &RegisterOptions {
                test,
                force_new,
                ..Default::default()
            },
            json_output,
        ),
        Commands::Check { entity, function } => {
            commands::check::run(&config, &entity, &function, json_output)
        }
        Commands::Update {
            identifier,
            title,
            locations,
        } => commands::update::run(
            &config_dir,
            &config,
            &identifier,
            title.as_deref(),
            locations,
            json_output,
        ),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("failed to parse manifest")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("not logged in") || msg.starts_with("tokens expired") {
                EXIT_AUTH_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
