//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here.

use course_companion::adapters::backend::{HttpBackendClient, HttpFileFetcher, WsConnector};
use course_companion::adapters::persistence::{JsonSettingsStore, SqliteMaterialStore};
use course_companion::adapters::ui::tui::TuiInputPort;
use course_companion::ports::{
    BackendPort, FileFetcher, InputPort, MaterialStore, SettingsStore, TransportConnector,
};
use course_companion::shared::config::AppConfig;
use course_companion::usecases::{ChatSession, MaterialService, SessionTimeouts};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SETTINGS_FILE_NAME: &str = "settings.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    course_companion::adapters::ui::init_ui();

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "invalid configuration; using defaults");
            AppConfig::default()
        }
    };
    let backend_url = cfg.backend_url_or_default();
    info!(backend_url = %backend_url, "backend");

    let data_path = PathBuf::from(cfg.data_dir_or_default());
    tokio::fs::create_dir_all(&data_path)
        .await
        .map_err(|e| anyhow::anyhow!("create data dir {}: {}", data_path.display(), e))?;
    let data_dir_abs = data_path
        .canonicalize()
        .unwrap_or_else(|_| data_path.clone());
    info!(path = %data_dir_abs.display(), "data directory");

    // --- Local storage ---
    let sqlite_store = SqliteMaterialStore::new(&data_path);
    sqlite_store
        .open()
        .await
        .map_err(|e| anyhow::anyhow!("open {}: {}", sqlite_store.path().display(), e))?;
    let store: Arc<dyn MaterialStore> = Arc::new(sqlite_store);

    let settings_impl = JsonSettingsStore::new(data_path.join(SETTINGS_FILE_NAME));
    settings_impl
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let settings: Arc<dyn SettingsStore> = Arc::new(settings_impl);

    // --- Backend ---
    let backend: Arc<dyn BackendPort> = Arc::new(
        HttpBackendClient::new(&backend_url, cfg.request_timeout())
            .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    if cfg.lms_token().is_none() {
        info!("COURSE_COMPANION_LMS_TOKEN not set; file downloads are unauthenticated");
    }
    let fetcher: Arc<dyn FileFetcher> = Arc::new(
        HttpFileFetcher::new(cfg.lms_token(), cfg.request_timeout())
            .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let connector: Arc<dyn TransportConnector> = Arc::new(WsConnector);

    // --- Services ---
    let materials = Arc::new(MaterialService::new(
        Arc::clone(&backend),
        Arc::clone(&store),
        fetcher,
    ));
    let timeouts = SessionTimeouts {
        connect: Some(cfg.connect_timeout()),
        query: cfg.query_timeout(),
    };
    let chat = Arc::new(ChatSession::new(connector, backend_url, timeouts));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        materials,
        backend,
        chat,
        settings,
        cfg.chat_history_limit_or_default(),
    ));

    // --- Run (main menu -> import / chat / saved chats / status / settings) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
