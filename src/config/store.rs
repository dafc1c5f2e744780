use std::path::Path;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Load configuration from a JSON file
///
/// Missing sections fall back to their defaults.
pub async fn load_config(path: &Path) -> Result<AppConfig> {
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&json)
        .map_err(|e| AppError::Config(format!("invalid config {}: {}", path.display(), e)))
}

/// Load configuration if a path is given, otherwise use defaults
pub async fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config(path).await,
        None => Ok(AppConfig::default()),
    }
}
