use clap::{Parser, Subcommand};
use migration::Migrator;
use sea_orm_migration::sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::env;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(version, about = "Helpdesk schema migrations", long_about = None)]
#[command(name = "migration")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations (all by default)
    Up {
        #[arg(short, long)]
        num: Option<u32>,
    },
    /// Roll back applied migrations (one by default)
    Down {
        #[arg(short, long, default_value_t = 1)]
        num: u32,
    },
    /// Show applied and pending migrations
    Status,
}

#[async_std::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rust_env = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());

    // Try .env.{environment} first, then fall back to .env
    let env_file = format!(".env.{}", rust_env);
    if dotenvy::from_filename(&env_file).is_err() {
        dotenvy::dotenv().ok();
    }

    let cli = Cli::parse();

    let Ok(db_url) = env::var("DATABASE_URL") else {
        error!("DATABASE_URL is not set");
        std::process::exit(1);
    };

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = match Database::connect(opt).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };

    info!(env = %rust_env, "Running migrations");

    let result = match cli.command.unwrap_or(Commands::Up { num: None }) {
        Commands::Up { num } => Migrator::up(&db, num).await,
        Commands::Down { num } => Migrator::down(&db, Some(num)).await,
        Commands::Status => Migrator::status(&db).await,
    };

    if let Err(e) = result {
        error!(error = %e, "Migration failed");
        std::process::exit(1);
    }

    info!("Migrations finished");
}
