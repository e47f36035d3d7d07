use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;
use uuid::Uuid;

/// Upload written to the local media directory, waiting for its first save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name the client sent; only its extension is kept.
    pub file_name: String,
    pub temp_path: PathBuf,
}

impl UploadedFile {
    /// Write `body` under `media_root/images/` and return the handle.
    pub async fn stage(media_root: &Path, file_name: &str, body: &[u8]) -> anyhow::Result<Self> {
        let temp_path = media_root.join(storage_key(file_name));
        if let Some(dir) = temp_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create media dir {}", dir.display()))?;
        }
        tokio::fs::write(&temp_path, body)
            .await
            .with_context(|| format!("write upload {}", temp_path.display()))?;
        debug!(path = %temp_path.display(), bytes = body.len(), "upload staged");
        Ok(Self {
            file_name: file_name.to_string(),
            temp_path,
        })
    }
}

/// `images/<32 hex>.<ext>`. The extension is whatever follows the last `.`
/// of the name's final path component; anything not alphanumeric becomes `bin`.
pub fn storage_key(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let ext = base
        .rsplit('.')
        .next()
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("images/{}.{}", Uuid::new_v4().simple(), ext)
}

pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
