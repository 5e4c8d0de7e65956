use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

use crate::Result;

/// Tunables with spec-mandated defaults (spec.md §6 "Environment
/// configuration"). Each can be overridden via `APP__TUNABLES__<NAME>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Tunables {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_drive_max")]
    pub drive_max_bytes: u64,
    #[serde(default = "default_zip_container_max")]
    pub zip_container_max_bytes: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_search_probes")]
    pub search_probes: u32,
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f32,
    #[serde(default = "default_cluster_candidates")]
    pub cluster_candidates: u32,
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,
}

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

fn default_max_file_size() -> u64 {
    50 * MIB
}
fn default_drive_max() -> u64 {
    512 * MIB
}
fn default_zip_container_max() -> u64 {
    5 * GIB
}
fn default_batch_size() -> u32 {
    50
}
fn default_max_attempts() -> u32 {
    5
}
fn default_search_probes() -> u32 {
    100
}
fn default_cluster_threshold() -> f32 {
    0.86
}
fn default_cluster_candidates() -> u32 {
    600
}
fn default_embed_dim() -> usize {
    512
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            drive_max_bytes: default_drive_max(),
            zip_container_max_bytes: default_zip_container_max(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            search_probes: default_search_probes(),
            cluster_threshold: default_cluster_threshold(),
            cluster_candidates: default_cluster_candidates(),
            embed_dim: default_embed_dim(),
        }
    }
}

impl Tunables {
    /// `BATCH_SIZE` is capped at 100 regardless of what config says.
    #[must_use]
    pub fn effective_batch_size(&self) -> u32 {
        self.batch_size.min(100)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretSettings {
    pub database_url: String,
    pub queue_url: Option<String>,
    pub embedder_url: String,
    pub object_store_bucket: String,
    pub object_store_endpoint: Option<String>,
    pub object_store_access_key: String,
    pub object_store_secret_key: String,
    pub source_oauth_client_id: String,
    pub source_oauth_client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub secrets: SecretSettings,
    #[serde(default)]
    pub tunables: Tunables,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Loads settings from a YAML file plus `APP__`-prefixed environment
/// overrides, failing fast on missing required keys (database URL,
/// embedder URL, queue URL, object-store credentials and bucket,
/// source-OAuth client id/secret), mirroring `app_state::load_settings`.
pub fn load_settings_from_path(path: &Path) -> Result<AppSettings> {
    dotenv::from_path(".env").ok();

    let builder = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

    let settings: AppSettings = builder
        .build()
        .map_err(|e| crate::Error::Internal(e.to_string()))?
        .try_deserialize()
        .map_err(|e| crate::Error::Internal(e.to_string()))?;

    Ok(settings)
}

pub fn load_app_settings() -> Result<AppSettings> {
    load_settings_from_path(Path::new("config/settings.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_is_capped_at_100() {
        let t = Tunables {
            batch_size: 500,
            ..Tunables::default()
        };
        assert_eq!(t.effective_batch_size(), 100);
    }

    #[test]
    fn defaults_match_spec() {
        let t = Tunables::default();
        assert_eq!(t.max_file_size_bytes, 50 * MIB);
        assert_eq!(t.drive_max_bytes, 512 * MIB);
        assert_eq!(t.zip_container_max_bytes, 5 * GIB);
        assert_eq!(t.batch_size, 50);
        assert_eq!(t.max_attempts, 5);
        assert_eq!(t.search_probes, 100);
        assert!((t.cluster_threshold - 0.86).abs() < f32::EPSILON);
        assert_eq!(t.cluster_candidates, 600);
        assert_eq!(t.embed_dim, 512);
    }
}
