use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    analysis::{AnalysisClient, GeminiClient},
    config::AppConfig,
    db::{MySqlStore, Store},
    history::LegacyHistory,
    storage::{DiskStorage, StorageClient},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    /// `None` when no model API key is configured.
    pub analyzer: Option<Arc<dyn AnalysisClient>>,
    pub legacy_history: Arc<LegacyHistory>,
}

impl AppState {
    /// Connects to MySQL, applies migrations and prepares the data directory.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = MySqlStore::connect(&config.database).await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(db.pool()).await {
            warn!(error = %e, "migration failed; continuing");
        }

        let storage = Arc::new(DiskStorage::new(&config.storage)?) as Arc<dyn StorageClient>;
        let legacy_history = Arc::new(LegacyHistory::open(&config.storage.history_file)?);

        let analyzer = GeminiClient::from_config(&config.analysis)
            .map(|c| Arc::new(c) as Arc<dyn AnalysisClient>);
        if analyzer.is_none() {
            warn!("GOOGLE_API_KEY not set; outfit analysis is disabled");
        }

        info!(images = %config.storage.images_dir.display(), "state initialized");
        Ok(Self::from_parts(
            Arc::new(db),
            Arc::new(config),
            storage,
            analyzer,
            legacy_history,
        ))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
        analyzer: Option<Arc<dyn AnalysisClient>>,
        legacy_history: Arc<LegacyHistory>,
    ) -> Self {
        Self {
            store,
            config,
            storage,
            analyzer,
            legacy_history,
        }
    }
}
