pub mod config;
pub mod db;
pub mod embedding;
pub mod loader;
pub mod middleware;
pub mod recommend;
pub mod server;
pub mod util;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),
    #[error("Embedding error: {0}")]
    Embedding(#[from] embedding::EmbedError),
    #[error("Load error: {0}")]
    Load(#[from] loader::LoadError),
    #[error("Server error: {0}")]
    Server(String),
}

async fn open_database(config: &config::Config) -> Result<Arc<db::SqliteRepository>, ServerError> {
    let db_path = config
        .get_database_path()
        .ok_or_else(|| ServerError::Server("No database path configured".to_string()))?;

    info!("Opening database at {}", db_path);
    let db = db::SqliteRepository::new(&db_path, config.max_connections()).await?;
    Ok(Arc::new(db))
}

pub async fn run(config_path: &str) -> Result<(), ServerError> {
    let config = config::Config::from_file(config_path)?;

    info!("Using config file: {}", config_path);

    let db = open_database(&config).await?;

    let embedder = Arc::new(embedding::OnnxEmbedder::new(&config.model));
    if config.model.preload {
        embedder.preload().await?;
    } else {
        info!("Embedding model will be loaded on first request");
    }

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    let tls = match (&config.listen.tlscert, &config.listen.tlskey) {
        (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let state = server::AppState::new(config, db, embedder);
    let app = server::build_router(state);

    if let Some((cert_path, key_path)) = tls {
        info!("Loading TLS certificate from {}", cert_path);
        info!("Loading TLS key from {}", key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to load TLS config: {}", e)))?;

        info!("Serving HTTPS on {}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    } else {
        info!("Serving HTTP on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    }

    Ok(())
}

/// Import a JSON file of movies, embedding each overview.
pub async fn load(config_path: &str, file: &Path) -> Result<usize, ServerError> {
    let config = config::Config::from_file(config_path)?;
    let db = open_database(&config).await?;

    let embedder = embedding::OnnxEmbedder::new(&config.model);
    embedder.preload().await?;

    info!("Reading movies from {}", file.display());
    let records = loader::read_records(file)?;
    let stored = loader::load_movies(db.as_ref(), &embedder, records).await?;

    Ok(stored)
}
