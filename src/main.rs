//! Shelfwise server binary

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shelfwise::api::{create_router, AppState};
use shelfwise::catalog::{CatalogIndex, VectorCatalog};
use shelfwise::config::{AppConfig, LogFormat};
use shelfwise::history::StorageInteractionProvider;
use shelfwise::profile::{StorageProfileStore, TasteVectorCalculator, UserProfileIndex};
use shelfwise::recommend::{
    CollaborativeFilteringRecommender, ContentBasedRecommender, ProfileUpdater, RecommenderFacade,
};
use shelfwise::rerank::default_pipeline;
use shelfwise::storage::{create_storage, StorageBackend};
use shelfwise::types::CatalogRecord;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    let storage_config = config
        .storage
        .to_runtime()
        .context("invalid storage configuration")?;
    let storage_backend = create_storage(storage_config).await?;
    let storage: Arc<dyn StorageBackend> = Arc::from(storage_backend);

    // Build the read-only catalog side once at startup
    let records = load_catalog_records(storage.as_ref(), &config.catalog.source_key).await?;
    let catalog = Arc::new(VectorCatalog::build(records).context("failed to build catalog")?);
    let catalog_index = Arc::new(CatalogIndex::build(&catalog).context("failed to build index")?);
    tracing::info!(
        items = catalog.len(),
        dimension = catalog.dimension(),
        "Catalog ready"
    );

    // Restore the user-profile index if a persisted pair exists
    let mut profile_index = UserProfileIndex::new(
        catalog.dimension(),
        config.engine.profile_index_prefix.clone(),
    );
    let restored = profile_index.load(storage.as_ref()).await?;
    if restored {
        tracing::info!(profiles = profile_index.len(), "Profile index restored");
    } else {
        tracing::info!("Starting with an empty profile index");
    }
    let profile_index = Arc::new(RwLock::new(profile_index));

    let interactions = Arc::new(StorageInteractionProvider::new(
        storage.clone(),
        "interactions",
    ));
    let profiles = Arc::new(StorageProfileStore::new(storage.clone(), "profiles"));

    let taste = TasteVectorCalculator::new(catalog.clone());

    let content = ContentBasedRecommender::new(
        catalog.clone(),
        catalog_index.clone(),
        default_pipeline(&config.engine),
    );
    let collaborative = CollaborativeFilteringRecommender::new(
        catalog.clone(),
        profile_index.clone(),
        interactions.clone(),
        default_pipeline(&config.engine),
    );

    let updater = ProfileUpdater::new(
        interactions.clone(),
        taste.clone(),
        profiles.clone(),
        profile_index.clone(),
        storage.clone(),
    );
    let updates = updater.spawn();

    let facade = Arc::new(RecommenderFacade::new(
        catalog,
        content,
        collaborative,
        taste,
        interactions,
        profiles,
        profile_index,
        storage,
        config.engine.num_neighbors,
        updates,
    ));

    let router = create_router(AppState::new(facade));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "Listening for HTTP traffic");

    axum::serve(listener, router).await?;

    Ok(())
}

/// Read the catalog source: one JSON record per line. Malformed lines are
/// skipped with a warning; an unreadable source is fatal.
async fn load_catalog_records(
    storage: &dyn StorageBackend,
    source_key: &str,
) -> anyhow::Result<Vec<CatalogRecord>> {
    let bytes = storage
        .get(source_key)
        .await
        .with_context(|| format!("failed to read catalog source '{}'", source_key))?;

    let text = std::str::from_utf8(&bytes).context("catalog source is not valid UTF-8")?;

    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CatalogRecord>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(line = line_no + 1, error = %err, "Skipping malformed catalog row");
            }
        }
    }

    tracing::info!(records = records.len(), "Catalog source loaded");
    Ok(records)
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("shelfwise=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
