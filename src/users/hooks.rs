use anyhow::Context;
use bytes::Bytes;
use tracing::{info, instrument, warn};

use super::model::{AppUser, ProfilePicture};
use super::uploads::{content_type_for, storage_key, UploadedFile};
use crate::auth::password::{hash_password, is_hashed};
use crate::storage::StorageClient;

/// Object pushed during `pre_save`, handed to `post_save` for local cleanup.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub key: String,
    pub file: UploadedFile,
}

impl AppUser {
    /// Runs before the row is written: hashes a plaintext password and pushes
    /// a fresh profile picture to storage, replacing it with the stored URL.
    #[instrument(skip_all, fields(user_id = %self.user_id))]
    pub async fn pre_save(
        &mut self,
        storage: &dyn StorageClient,
    ) -> anyhow::Result<Option<PendingUpload>> {
        if !self.password.is_empty() && !is_hashed(&self.password) {
            self.password = hash_password(&self.password).context("hash password")?;
        }

        let Some(ProfilePicture::Upload(file)) = &self.profile_picture else {
            return Ok(None);
        };
        let file = file.clone();

        let key = storage_key(&file.file_name);
        let body = tokio::fs::read(&file.temp_path)
            .await
            .with_context(|| format!("read upload {}", file.temp_path.display()))?;
        storage
            .put_object(&key, Bytes::from(body), content_type_for(&key))
            .await
            .with_context(|| format!("put_object {}", key))?;

        let url = storage.public_url(&key);
        info!(%key, %url, "profile picture uploaded");
        self.profile_picture = Some(ProfilePicture::Stored { url });

        Ok(Some(PendingUpload { key, file }))
    }

    /// Runs after a successful write. Never fails: the row is already stored.
    #[instrument(skip_all, fields(user_id = %self.user_id))]
    pub async fn post_save(&self, created: bool, upload: Option<PendingUpload>) {
        if let Some(upload) = upload {
            let path = &upload.file.temp_path;
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "local upload removed"),
                Err(e) => warn!(error = %e, path = %path.display(), "could not remove local upload"),
            }
        }

        if created {
            info!("AppUsers created: {}", self);
        } else {
            info!("AppUsers updated: {}", self);
        }
    }
}
