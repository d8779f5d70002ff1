use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    buckets::BucketManager, catalog::MetadataCatalog, crypto::CryptoStore,
    object_store::ObjectStore, replication::ReplicationEngine, sbom::SbomScanner,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting sealstore with config: {:?}", cfg);

    // --- Ensure storage root and replica roots exist ---
    let root = Path::new(&cfg.storage_dir);
    if !root.exists() {
        fs::create_dir_all(root)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }
    for replica in &cfg.replicas {
        let replica_root = root.join(replica);
        if !replica_root.exists() {
            fs::create_dir_all(&replica_root)?;
            tracing::info!("Created replica root at {}", replica_root.display());
        }
    }

    // --- Initialize the storage engine ---
    let crypto = CryptoStore::new(&cfg.encryption_key)?;
    let catalog = MetadataCatalog::new(root);
    let buckets = BucketManager::new(root, cfg.replicas.clone());
    let replicator = ReplicationEngine::start(root.to_path_buf(), cfg.replicas.clone());
    let scanner = SbomScanner::new(cfg.sbom_command.clone());
    let store = ObjectStore::new(crypto, catalog, buckets, replicator, scanner);

    // --- Build router ---
    let app: Router = routes::routes().with_state(store);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
