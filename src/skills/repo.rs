use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{NewSkill, Skill};

impl Skill {
    /// Insert a new skill with a generated id.
    pub async fn create(db: &PgPool, new: &NewSkill) -> anyhow::Result<Skill> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            INSERT INTO skills (skill_id, name, description, category)
            VALUES ($1, $2, $3, $4)
            RETURNING skill_id, name, description, category, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.category)
        .fetch_one(db)
        .await
        .context("insert skill")?;
        Ok(skill)
    }

    pub async fn find_by_id(db: &PgPool, skill_id: Uuid) -> anyhow::Result<Option<Skill>> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            SELECT skill_id, name, description, category, created_at
              FROM skills
             WHERE skill_id = $1
            "#,
        )
        .bind(skill_id)
        .fetch_optional(db)
        .await
        .context("find skill")?;
        Ok(skill)
    }

    /// All skills, alphabetical by name.
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Skill>> {
        let rows = sqlx::query_as::<_, Skill>(
            r#"
            SELECT skill_id, name, description, category, created_at
              FROM skills
             ORDER BY name ASC, skill_id ASC
            "#,
        )
        .fetch_all(db)
        .await
        .context("list skills")?;
        Ok(rows)
    }

    pub async fn delete(db: &PgPool, skill_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM skills WHERE skill_id = $1")
            .bind(skill_id)
            .execute(db)
            .await
            .context("delete skill")?;
        Ok(res.rows_affected() > 0)
    }

    /// Ids of users offering this skill.
    pub async fn offering_users(db: &PgPool, skill_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT appusers_id
              FROM app_users_skills_offered
             WHERE skills_id = $1
             ORDER BY id ASC
            "#,
        )
        .bind(skill_id)
        .fetch_all(db)
        .await
        .context("list offering users")?;
        Ok(ids)
    }

    /// Ids of users seeking this skill.
    pub async fn seeking_users(db: &PgPool, skill_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT appusers_id
              FROM app_users_skills_wanted
             WHERE skills_id = $1
             ORDER BY id ASC
            "#,
        )
        .bind(skill_id)
        .fetch_all(db)
        .await
        .context("list seeking users")?;
        Ok(ids)
    }
}
