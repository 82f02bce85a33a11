use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub port: u16,
    pub max_body_bytes: usize,
    /// Empty means any origin is allowed
    pub cors_origins: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            cors_origins: Vec::new(),
        }
    }
}

impl WebConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("DVLENS_PORT").or_else(|| lookup("PORT")) {
            config.port = port.trim().parse()?;
        }

        if let Some(max_size) = lookup("DVLENS_MAX_BODY_BYTES") {
            config.max_body_bytes = max_size.trim().parse()?;
        }

        if let Some(origins) = lookup("DVLENS_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }
}
