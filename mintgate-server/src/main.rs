mod config;
mod server;

use clap::{Parser, Subcommand};
use config::Config;
use mintgate_core::LedgerStore;
use server::run_server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "mintgate")]
#[command(about = "Mint accounting and limit enforcement for time-boxed token sales")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Create the ledger schema, then exit
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mintgate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config, init } => {
            tracing::info!("Starting Mintgate server with config: {}", config);

            let cfg = match Config::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            if init {
                match LedgerStore::open(cfg.ledger.db_path.clone(), cfg.ledger.options()) {
                    Ok(_) => {
                        tracing::info!(
                            "Ledger initialized at {:?} (init-only mode)",
                            cfg.ledger.db_path
                        );
                        return;
                    }
                    Err(error) => {
                        tracing::error!("Initialization failed: {}", error);
                        std::process::exit(1);
                    }
                }
            }

            tracing::info!(
                "Bind: {}, Ledger: {:?}, Chain backend: {}",
                cfg.server.bind_addr,
                cfg.ledger.db_path,
                cfg.chain.backend
            );

            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
