use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{AppUser, AppUserRow, ProfilePicture};

/// Result of the underlying write.
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub created: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Persists a user row and its skill associations.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn write(&self, user: &AppUser) -> anyhow::Result<WriteOutcome>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn write(&self, user: &AppUser) -> anyhow::Result<WriteOutcome> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // `created` comes from `xmax = 0`: a freshly inserted tuple has no
        // deleting/locking transaction, while the ON CONFLICT update path
        // stamps xmax with the current xid. Relies on Postgres MVCC columns.
        let (created_at, updated_at, created) =
            sqlx::query_as::<_, (OffsetDateTime, OffsetDateTime, bool)>(
                r#"
                INSERT INTO app_users (
                    user_id, email, password, full_name, date_of_birth, gender,
                    profile_picture, bio, location, phone_number, status, rating,
                    is_verified, last_login
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (user_id) DO UPDATE SET
                    email = EXCLUDED.email,
                    password = EXCLUDED.password,
                    full_name = EXCLUDED.full_name,
                    date_of_birth = EXCLUDED.date_of_birth,
                    gender = EXCLUDED.gender,
                    profile_picture = EXCLUDED.profile_picture,
                    bio = EXCLUDED.bio,
                    location = EXCLUDED.location,
                    phone_number = EXCLUDED.phone_number,
                    status = EXCLUDED.status,
                    rating = EXCLUDED.rating,
                    is_verified = EXCLUDED.is_verified,
                    last_login = EXCLUDED.last_login,
                    updated_at = NOW()
                RETURNING created_at, updated_at, (xmax = 0) AS created
                "#,
            )
            .bind(user.user_id)
            .bind(&user.email)
            .bind(&user.password)
            .bind(&user.full_name)
            .bind(user.date_of_birth)
            .bind(user.gender)
            .bind(user.profile_picture.as_ref().and_then(ProfilePicture::stored_url))
            .bind(&user.bio)
            .bind(&user.location)
            .bind(&user.phone_number)
            .bind(user.status)
            .bind(user.rating.round_dp(2))
            .bind(user.is_verified)
            .bind(user.last_login)
            .fetch_one(&mut *tx)
            .await
            .context("upsert app_users")?;

        replace_skills_tx(&mut tx, "app_users_skills_offered", user.user_id, &user.skills_offered)
            .await?;
        replace_skills_tx(&mut tx, "app_users_skills_wanted", user.user_id, &user.skills_wanted)
            .await?;

        tx.commit().await.context("commit tx")?;

        Ok(WriteOutcome {
            created,
            created_at,
            updated_at,
        })
    }
}

async fn replace_skills_tx(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    user_id: Uuid,
    skill_ids: &[Uuid],
) -> anyhow::Result<()> {
    sqlx::query(&format!("DELETE FROM {table} WHERE appusers_id = $1"))
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("clear {table}"))?;

    if skill_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(&format!(
        "INSERT INTO {table} (appusers_id, skills_id) \
         SELECT $1, s FROM UNNEST($2::uuid[]) AS s \
         ON CONFLICT DO NOTHING"
    ))
    .bind(user_id)
    .bind(skill_ids)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("fill {table}"))?;

    Ok(())
}

const USER_COLUMNS: &str = "user_id, email, password, full_name, date_of_birth, gender, \
     profile_picture, bio, location, phone_number, status, rating, is_verified, \
     created_at, updated_at, last_login";

async fn skill_ids(db: &PgPool, table: &'static str, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(&format!(
        "SELECT skills_id FROM {table} WHERE appusers_id = $1 ORDER BY id ASC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .with_context(|| format!("load {table}"))?;
    Ok(ids)
}

async fn hydrate(db: &PgPool, row: AppUserRow) -> anyhow::Result<AppUser> {
    let offered = skill_ids(db, "app_users_skills_offered", row.user_id).await?;
    let wanted = skill_ids(db, "app_users_skills_wanted", row.user_id).await?;
    Ok(row.into_user(offered, wanted))
}

impl AppUser {
    pub async fn find_by_id(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<AppUser>> {
        let row = sqlx::query_as::<_, AppUserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        match row {
            Some(row) => Ok(Some(hydrate(db, row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<AppUser>> {
        let row = sqlx::query_as::<_, AppUserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        match row {
            Some(row) => Ok(Some(hydrate(db, row).await?)),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<AppUser>> {
        let rows = sqlx::query_as::<_, AppUserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list users")?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(hydrate(db, row).await?);
        }
        Ok(users)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM app_users WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    /// Stamp `last_login` without going through the save pipeline.
    pub async fn record_login(db: &PgPool, user_id: Uuid) -> anyhow::Result<OffsetDateTime> {
        let at = sqlx::query_scalar::<_, OffsetDateTime>(
            r#"
            UPDATE app_users
               SET last_login = NOW()
             WHERE user_id = $1
            RETURNING last_login
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("record login")?;
        Ok(at)
    }
}
