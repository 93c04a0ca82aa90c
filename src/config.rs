use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::storage::StorageConfig;

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageSection,
    pub catalog: CatalogSection,
    pub engine: EngineSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("SHELFWISE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SHELFWISE")
                .separator("_")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        config.engine.validate().context("invalid engine section")?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackendKind,
    pub local: Option<LocalStorageSection>,
    pub s3: Option<S3StorageSection>,
}

impl StorageSection {
    pub fn to_runtime(&self) -> Result<StorageConfig> {
        match self.backend {
            StorageBackendKind::Local => {
                let local = self.local.clone().unwrap_or_default();
                Ok(StorageConfig::Local {
                    root_path: local.root_path,
                })
            }
            StorageBackendKind::S3 => {
                let s3 = self
                    .s3
                    .clone()
                    .context("storage.s3 configuration required when backend is 's3'")?;

                if s3.bucket.trim().is_empty() {
                    bail!("storage.s3.bucket must be specified");
                }
                if s3.region.trim().is_empty() {
                    bail!("storage.s3.region must be specified");
                }

                Ok(StorageConfig::S3 {
                    bucket: s3.bucket,
                    region: s3.region,
                    endpoint: s3.endpoint,
                })
            }
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            local: Some(LocalStorageSection::default()),
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalStorageSection {
    pub root_path: String,
}

impl Default for LocalStorageSection {
    fn default() -> Self {
        Self {
            root_path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct S3StorageSection {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
}

/// Where the catalog source rows live, as a storage key.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub source_key: String,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            source_key: "catalog/items.jsonl".to_string(),
        }
    }
}

/// Recommendation engine tunables.
///
/// The re-ranking weights are the only scoring knobs; candidate over-fetch
/// and the neighbor-search buffer are fixed design constants in their
/// respective modules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Bonus/malus weight per matched genre
    pub genre_weight: f32,
    /// Peak bonus for items at the user's preferred page length
    pub page_weight: f32,
    /// How many neighbor users collaborative filtering consults
    pub num_neighbors: usize,
    /// Storage prefix for the user-profile index artifacts
    pub profile_index_prefix: String,
}

impl EngineSection {
    fn validate(&self) -> Result<()> {
        if self.num_neighbors == 0 {
            bail!("engine.num_neighbors must be at least 1");
        }
        Ok(())
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            genre_weight: 0.3,
            page_weight: 0.25,
            num_neighbors: 10,
            profile_index_prefix: "profile_index".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
