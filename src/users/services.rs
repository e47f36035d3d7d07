use tracing::{instrument, warn};

use super::model::{AppUser, ProfilePicture};
use super::repo::{UserStore, WriteOutcome};
use crate::storage::StorageClient;

/// Validate, run the pre-save hook, write, then run the post-save hook.
///
/// Hook or write failures abort the save. If the write fails after a picture
/// was pushed, the remote object is removed and the entity gets its pending
/// upload back so the call can be retried.
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn save_user(
    store: &dyn UserStore,
    storage: &dyn StorageClient,
    user: &mut AppUser,
) -> anyhow::Result<WriteOutcome> {
    user.validate()?;

    let upload = user.pre_save(storage).await?;

    let outcome = match store.write(user).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(upload) = upload {
                if let Err(del) = storage.delete_object(&upload.key).await {
                    warn!(error = %del, key = %upload.key, "orphaned profile picture");
                }
                user.profile_picture = Some(ProfilePicture::Upload(upload.file));
            }
            return Err(e.context("write app user"));
        }
    };

    user.created_at = Some(outcome.created_at);
    user.updated_at = Some(outcome.updated_at);
    user.post_save(outcome.created, upload).await;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::{macros::date, OffsetDateTime};
    use uuid::Uuid;

    use super::*;
    use crate::auth::password::is_hashed;
    use crate::storage::fake::FakeStorage;
    use crate::users::model::Gender;
    use crate::users::uploads::UploadedFile;

    /// Keeps written rows in memory.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<Uuid, AppUser>>,
        fail: bool,
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn write(&self, user: &AppUser) -> anyhow::Result<WriteOutcome> {
            if self.fail {
                anyhow::bail!("database unavailable");
            }
            let now = OffsetDateTime::now_utc();
            let mut rows = self.rows.lock().unwrap();
            let created_at = rows
                .get(&user.user_id)
                .and_then(|u| u.created_at)
                .unwrap_or(now);
            let created = !rows.contains_key(&user.user_id);
            let mut row = user.clone();
            row.created_at = Some(created_at);
            row.updated_at = Some(now);
            rows.insert(user.user_id, row);
            Ok(WriteOutcome {
                created,
                created_at,
                updated_at: now,
            })
        }
    }

    impl MemoryStore {
        fn stored(&self, id: Uuid) -> AppUser {
            self.rows.lock().unwrap().get(&id).cloned().expect("row")
        }
    }

    fn user() -> AppUser {
        AppUser::new(
            "alan@example.com",
            "enigma-1912",
            "Alan Turing",
            date!(1990 - 06 - 23),
            Gender::Male,
            "Manchester",
        )
    }

    #[tokio::test]
    async fn create_hashes_password() {
        let store = MemoryStore::default();
        let storage = FakeStorage::default();
        let mut u = user();

        let outcome = save_user(&store, &storage, &mut u).await.unwrap();
        assert!(outcome.created);
        assert!(u.is_persisted());

        let stored = store.stored(u.user_id);
        assert_ne!(stored.password, "enigma-1912");
        assert!(is_hashed(&stored.password));
    }

    #[tokio::test]
    async fn resave_keeps_hashed_password() {
        let store = MemoryStore::default();
        let storage = FakeStorage::default();
        let mut u = user();
        save_user(&store, &storage, &mut u).await.unwrap();
        let first = store.stored(u.user_id).password;

        u.bio = "Codebreaker".into();
        let outcome = save_user(&store, &storage, &mut u).await.unwrap();
        assert!(!outcome.created);
        assert_eq!(store.stored(u.user_id).password, first);
    }

    #[tokio::test]
    async fn create_with_picture_uploads_once_and_removes_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::stage(dir.path(), "alan.jpg", b"jpeg-bytes").await.unwrap();
        let temp_path = file.temp_path.clone();

        let store = MemoryStore::default();
        let storage = FakeStorage::default();
        let mut u = user();
        u.profile_picture = Some(ProfilePicture::Upload(file));

        let outcome = save_user(&store, &storage, &mut u).await.unwrap();
        assert!(outcome.created);
        assert_eq!(storage.put_count(), 1);
        assert!(!temp_path.exists());

        let url = store
            .stored(u.user_id)
            .profile_picture
            .and_then(|p| p.stored_url().map(str::to_owned))
            .expect("stored url");
        assert!(url.starts_with("https://fake.local/avatars/images/"));
        assert!(url.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn update_with_unchanged_picture_does_not_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::stage(dir.path(), "alan.png", b"png").await.unwrap();

        let store = MemoryStore::default();
        let storage = FakeStorage::default();
        let mut u = user();
        u.profile_picture = Some(ProfilePicture::Upload(file));
        save_user(&store, &storage, &mut u).await.unwrap();
        assert_eq!(storage.put_count(), 1);

        let mut reloaded = store.stored(u.user_id);
        reloaded.location = "Wilmslow".into();
        let outcome = save_user(&store, &storage, &mut reloaded).await.unwrap();
        assert!(!outcome.created);
        assert_eq!(storage.put_count(), 1);
        assert_eq!(reloaded.profile_picture, u.profile_picture);
    }

    #[tokio::test]
    async fn failed_upload_aborts_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::stage(dir.path(), "alan.png", b"png").await.unwrap();
        let temp_path = file.temp_path.clone();

        let store = MemoryStore::default();
        let storage = FakeStorage::failing();
        let mut u = user();
        u.profile_picture = Some(ProfilePicture::Upload(file));

        assert!(save_user(&store, &storage, &mut u).await.is_err());
        assert!(store.rows.lock().unwrap().is_empty());
        assert!(temp_path.exists());
        assert!(!u.is_persisted());
    }

    #[tokio::test]
    async fn failed_write_rolls_back_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::stage(dir.path(), "alan.png", b"png").await.unwrap();

        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };
        let storage = FakeStorage::default();
        let mut u = user();
        u.profile_picture = Some(ProfilePicture::Upload(file.clone()));

        let err = save_user(&store, &storage, &mut u).await.unwrap_err();
        assert!(format!("{err:#}").contains("database unavailable"));
        assert_eq!(storage.put_count(), 1);
        assert_eq!(storage.object_count(), 0);
        assert_eq!(u.profile_picture, Some(ProfilePicture::Upload(file.clone())));
        assert!(file.temp_path.exists());
    }

    #[tokio::test]
    async fn empty_password_is_saved_unhashed() {
        let store = MemoryStore::default();
        let storage = FakeStorage::default();
        let mut u = user();
        u.password.clear();

        let outcome = save_user(&store, &storage, &mut u).await.unwrap();
        assert!(outcome.created);
        assert_eq!(store.stored(u.user_id).password, "");
    }

    #[tokio::test]
    async fn invalid_user_is_rejected_before_hooks() {
        let store = MemoryStore::default();
        let storage = FakeStorage::default();
        let mut u = user();
        u.email = "not-an-email".into();

        assert!(save_user(&store, &storage, &mut u).await.is_err());
        assert_eq!(u.password, "enigma-1912");
        assert!(store.rows.lock().unwrap().is_empty());
    }
}
