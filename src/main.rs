use anyhow::Result;
use clap::{Parser, Subcommand};
use cyoa::config::AppConfig;
use cyoa::server;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// Overrides DATABASE_URL
    #[clap(short, long, global = true)]
    database: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(long, default_value = "0.0.0.0")]
        host: String,
        #[clap(short, long, default_value = "8000")]
        port: u16,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: server::MigrateDirection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(database) = args.database {
        config.database_url = database;
    }
    setup_logging(&args.log_level, config.debug);

    match args.command {
        Commands::Serve { host, port } => {
            info!("Starting server on {}:{}", host, port);
            server::start_server(config, &host, port).await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("Initializing database: {}", config.database_url);
                server::migrate_database(&config.database_url, server::MigrateDirection::Up)
                    .await?;
            }
            DbCommands::Migrate { direction } => {
                info!("Running database migration: {:?}", direction);
                server::migrate_database(&config.database_url, direction).await?;
            }
        },
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>, debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let log_level = match log_level
        .as_deref()
        .unwrap_or(default_level)
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // SQL statements only show up at debug and below.
    let sql_level = if log_level >= Level::DEBUG { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "{},sqlx={},sea_orm={}",
            log_level, sql_level, sql_level
        )))
        .without_time()
        .init();
}
