use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use logdeck::cli::{
    AdminCommands, UserCommands, load_config, open_store, run_grant_root, run_init, run_user_add,
};
use logdeck::engine::ClickhouseInstances;
use logdeck::server::{AppState, create_router};
use logdeck::store::Store;

#[derive(Parser)]
#[command(name = "logdeck")]
#[command(about = "Log management console backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Path to the TOML configuration file
        #[arg(long, short, default_value = "logdeck.toml")]
        config: PathBuf,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the metadata database (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("logdeck=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { config, data_dir } => {
                run_init(&load_config(&config, data_dir)?)?;
            }
            AdminCommands::GrantRoot {
                config,
                data_dir,
                user_id,
            } => {
                run_grant_root(&load_config(&config, data_dir)?, user_id)?;
            }
            AdminCommands::User { command } => match command {
                UserCommands::Add {
                    config,
                    data_dir,
                    username,
                    nickname,
                } => {
                    run_user_add(&load_config(&config, data_dir)?, &username, nickname)?;
                }
            },
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = load_config(&config, data_dir)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let store = open_store(&config)?;
            // Schema setup is idempotent; upgrades pick up new tables here.
            store.initialize()?;
            let store: Arc<dyn Store> = Arc::new(store);

            let instances = Arc::new(ClickhouseInstances::new(store.clone()));
            let addr = config.server.socket_addr()?;
            info!(
                anonymous = config.auth.anonymous.enabled,
                proxy = config.auth.proxy.enabled,
                mode = %config.app.mode,
                "auth configured"
            );

            let state = Arc::new(AppState::new(store, config, instances));
            let app = create_router(state);

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
