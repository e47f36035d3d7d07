use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base for public object links; `<public_url>/<bucket>/<key>`.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    pub encryption_key: Option<String>,
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub media_root: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let endpoint = std::env::var("STORAGE_ENDPOINT")?;
        let public_url = std::env::var("STORAGE_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/storage/v1/object/public", endpoint.trim_end_matches('/'))
        });
        let storage = StorageConfig {
            bucket: std::env::var("STORAGE_BUCKET")?,
            access_key: std::env::var("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            public_url,
        };

        // Presence of the key is checked by `Cryptography::new`.
        let crypto = CryptoConfig {
            encryption_key: std::env::var("ENCRYPTION_KEY").ok(),
            token_ttl_secs: std::env::var("ENCRYPTION_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok()),
        };

        let media_root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));

        Ok(Self {
            database_url,
            storage,
            crypto,
            media_root,
        })
    }
}
