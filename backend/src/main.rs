//! Violation tracker server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use violation_tracker_backend::api::routes::create_router;
use violation_tracker_backend::api::AppState;
use violation_tracker_backend::services::event_bus::{spawn_audit_log, EventBus};
use violation_tracker_backend::services::user_service::{NewUser, UserService};
use violation_tracker_backend::storage::filesystem::FilesystemBackend;
use violation_tracker_backend::Config;

const EVENT_BUS_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "violation-tracker")]
#[command(about = "Site violation tracking API server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and start the HTTP server (default)
    Serve,

    /// Apply pending database migrations and exit
    Migrate,

    /// Create a user account
    CreateUser {
        #[arg(value_name = "USERNAME")]
        username: String,

        #[arg(long, env = "NEW_USER_PASSWORD")]
        password: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        /// Group to add the user to (repeatable)
        #[arg(long = "group", value_name = "GROUP")]
        groups: Vec<String>,

        /// Mark the account as staff
        #[arg(long)]
        staff: bool,
    },
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")
}

async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("failed to run migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}

fn install_metrics_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder not installed: {}", e);
            None
        }
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    migrate(&db).await?;

    let storage = FilesystemBackend::new(config.storage_path.clone());
    storage
        .init()
        .await
        .context("failed to prepare attachment storage")?;
    tracing::info!(path = %storage.root().display(), "Attachment storage ready");

    let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
    let audit = spawn_audit_log(&event_bus);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid BIND_ADDRESS '{}'", config.bind_address))?;

    let state = Arc::new(AppState::new(
        config,
        db,
        Arc::new(storage),
        event_bus,
        install_metrics_recorder(),
    )?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            wait_for_shutdown_signal().await;
            tracing::info!("Shutdown signal received, draining connections");
        })
        .await
        .context("server error")?;

    // The router held the last event bus handle; the audit listener drains and exits.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), audit).await;
    tracing::info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => {
            let db = connect(&config).await?;
            migrate(&db).await
        }
        Commands::CreateUser {
            username,
            password,
            email,
            first_name,
            last_name,
            groups,
            staff,
        } => {
            let db = connect(&config).await?;
            migrate(&db).await?;
            let user = UserService::new(db)
                .create(NewUser {
                    username,
                    password,
                    email,
                    first_name,
                    last_name,
                    is_staff: staff,
                    groups,
                })
                .await?;
            tracing::info!(user_id = %user.id, groups = ?user.groups, "Created user {}", user.username);
            Ok(())
        }
    }
}
