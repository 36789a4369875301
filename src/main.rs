use anyhow::Context;
use course_portal::config::{self, StorageConfig};
use course_portal::db::{self, PgRepository};
use course_portal::extraction::TikaClient;
use course_portal::metrics::PortalMetrics;
use course_portal::search::MeiliSearchClient;
use course_portal::storage::{FilesystemObjectStore, ObjectStore, S3ObjectStore};
use course_portal::{api, logging};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();
    let config = config::get_config();

    let pool = db::connect(config)
        .await
        .context("Failed to connect to Postgres")?;
    db::migrate(&pool).await.context("Failed to run migrations")?;

    let store = build_object_store(&config.storage).await?;
    let search = MeiliSearchClient::new(&config.meili_url, config.meili_api_key.clone())
        .context("Invalid MEILI_URL")?;
    if let Err(err) = search.ensure_indexes().await {
        tracing::warn!(error = %err, "Search index setup failed; continuing without it");
    }
    let extractor =
        TikaClient::new(&config.tika_url, config.tika_timeout).context("Invalid TIKA_URL")?;

    let state = api::AppState::new(
        Arc::new(PgRepository::new(pool)),
        store,
        Arc::new(search),
        Arc::new(extractor),
        Arc::new(PortalMetrics::new()),
    );
    if let Err(err) = state.categories.seed_sentinels().await {
        tracing::error!(error = %err, "Failed to seed unassigned categories");
    }
    let app = api::create_router(state);

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.server_port))?;
    tracing::info!("Listening on http://0.0.0.0:{}", config.server_port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn build_object_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match storage {
        StorageConfig::S3(s3) => {
            let store = S3ObjectStore::new(s3).context("Invalid S3 configuration")?;
            store
                .ensure_bucket()
                .await
                .with_context(|| format!("Failed to prepare bucket '{}'", s3.bucket))?;
            Ok(Arc::new(store))
        }
        StorageConfig::Filesystem { root } => {
            tracing::info!(root = %root.display(), "Using filesystem object store");
            Ok(Arc::new(FilesystemObjectStore::new(root.clone())))
        }
    }
}
