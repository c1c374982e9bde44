use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use content_server::assets::AssetStore;
use content_server::config::Config;
use content_server::http::{self, AppState};
use content_server::persistence::{
    import_json_to_sqlite, Backend, BackendKind, Database, FileStore, SqlRecord, SqliteStore,
};
use content_server::service::ResourceService;
use content_server::versioning::{spawn_versioning_worker, ChangeEvent};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "content-server",
    version,
    about = "Content store for activities, events and photos"
)]
struct Cli {
    /// Defaults to `serve` when omitted.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve,
    /// Copy the JSON collections in the data directory into the SQLite
    /// database. Does nothing if the database already holds records.
    ImportJson,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with span durations
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::ImportJson => import_json(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting content server");
    tracing::info!("Using data directory: {}", config.data_dir.display());
    tracing::info!("Using upload directory: {}", config.upload_dir.display());
    tracing::info!(backend = %config.backend, auth = config.auth.scheme(), "Storage and auth selected");

    let mut changes = None;
    let mut worker = None;
    let database = match config.backend {
        BackendKind::File => {
            if let Some(vcfg) = config.versioning.clone() {
                let (tx, handle) = spawn_versioning_worker(vcfg);
                changes = Some(tx);
                worker = Some(handle);
            }
            None
        }
        BackendKind::Sqlite => {
            if config.versioning.is_some() {
                tracing::warn!("CONTENT_GIT_REPO is ignored with the sqlite backend");
            }
            let db = Database::open(&config.database_path)
                .await
                .with_context(|| format!("opening {}", config.database_path.display()))?;
            Some(db)
        }
    };

    let assets = Arc::new(AssetStore::new(config.upload_dir.clone()));
    let state = AppState {
        activities: Arc::new(ResourceService::new(
            backend(&config, database.as_ref(), changes.clone()),
            assets.clone(),
        )),
        events: Arc::new(ResourceService::new(
            backend(&config, database.as_ref(), changes.clone()),
            assets.clone(),
        )),
        photos: Arc::new(ResourceService::new(
            backend(&config, database.as_ref(), changes),
            assets.clone(),
        )),
        assets,
        auth: Arc::new(config.auth.clone()),
    };

    let app = http::router(state, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("Server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Dropping the router released every sender; let the worker drain.
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            tracing::warn!("Versioning worker ended abnormally: {}", e);
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn backend<R: SqlRecord>(
    config: &Config,
    database: Option<&Database>,
    changes: Option<mpsc::Sender<ChangeEvent>>,
) -> Backend<R> {
    match database {
        Some(db) => Backend::Sqlite(SqliteStore::new(db.pool().clone())),
        None => Backend::File(FileStore::in_dir(&config.data_dir, changes)),
    }
}

async fn import_json(config: Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let report = import_json_to_sqlite(db.pool(), &config.data_dir)
        .await
        .context("JSON import failed")?;

    if report.skipped {
        tracing::info!("Database already populated; nothing imported");
    } else {
        tracing::info!(
            activities = report.activities,
            events = report.events,
            photos = report.photos,
            "Import finished"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
