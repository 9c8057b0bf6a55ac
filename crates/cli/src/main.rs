use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use convenios_cli::config::Config;
use convenios_cli::serve::{self, ServeOptions, DEFAULT_PORT, DEFAULT_RATE_LIMIT};
use convenios_cli::telemetry;
use convenios_workflow::identity::hash_token;
use tracing::error;

/// Agreement (convenio) submission and review service.
#[derive(Parser)]
#[command(name = "convenios", version, about = "Agreement submission and review service")]
struct Cli {
    /// Log level filter, overridden by RUST_LOG
    #[arg(long, global = true, env = "CONVENIOS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "CONVENIOS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default 8080)
        #[arg(long, env = "CONVENIOS_PORT")]
        port: Option<u16>,
        /// Requests per minute per client IP (default 60)
        #[arg(long, env = "CONVENIOS_RATE_LIMIT")]
        rate_limit: Option<u64>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Load and validate the configuration file, then exit
    CheckConfig,

    /// Print the SHA-256 digest of a session token for the accounts table
    HashToken {
        /// The plaintext token
        token: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Config {
    match Config::load_optional(path.map(PathBuf::as_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            rate_limit,
            tls_cert,
            tls_key,
        } => {
            telemetry::init_tracing(&cli.log_level, cli.log_json);

            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            let config = load_config(cli.config.as_ref());
            let options = ServeOptions {
                port: port.or(config.server.port).unwrap_or(DEFAULT_PORT),
                rate_limit: rate_limit
                    .or(config.server.rate_limit)
                    .unwrap_or(DEFAULT_RATE_LIMIT),
                config,
                tls_cert,
                tls_key,
            };

            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(options)) {
                error!(error = %e, "server error");
                process::exit(1);
            }
        }
        Commands::CheckConfig => {
            let Some(path) = cli.config.as_ref() else {
                eprintln!("error: no configuration file given (use --config or CONVENIOS_CONFIG)");
                process::exit(1);
            };
            let config = load_config(Some(path));
            println!(
                "configuration OK: {} account(s), {} agreement type(s)",
                config.accounts.len(),
                config.agreement_types.len()
            );
            if !config.has_admin() {
                println!("warning: no admin account configured");
            }
        }
        Commands::HashToken { token } => {
            println!("{}", hash_token(&token));
        }
    }
}
