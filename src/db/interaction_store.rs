//! Interaction store: append-only log of per-user interaction events,
//! queried through indexed range scans (user_id + type + created_at).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Interaction, InteractionType};

#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn insert(&self, interaction: &Interaction) -> Result<()>;

    /// Article ids the user interacted with via any of the given types
    /// since the given instant. Indexed range query, never a full scan.
    async fn article_ids_by_user(
        &self,
        user_id: Uuid,
        types: &[InteractionType],
        since: DateTime<Utc>,
    ) -> Result<Vec<Uuid>>;

    /// Total count of the user's interactions of the given types.
    async fn count_by_user(&self, user_id: Uuid, types: &[InteractionType]) -> Result<i64>;

    /// Site-wide like count since the given instant; drives the
    /// sparse-data-environment check.
    async fn count_site_wide_since(&self, since: DateTime<Utc>) -> Result<i64>;

    /// Most recent likers per article, at most `per_article_limit` each,
    /// for the whole candidate batch in one query.
    async fn likers_for_articles(
        &self,
        article_ids: &[Uuid],
        per_article_limit: usize,
    ) -> Result<HashMap<Uuid, Vec<Uuid>>>;
}

fn type_names(types: &[InteractionType]) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}

pub struct PgInteractionStore {
    pool: PgPool,
}

impl PgInteractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InteractionStore for PgInteractionStore {
    async fn insert(&self, interaction: &Interaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO interactions \
             (user_id, article_id, interaction_type, created_at, read_time_seconds, strength) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(interaction.user_id)
        .bind(interaction.article_id)
        .bind(interaction.interaction_type.as_str())
        .bind(interaction.created_at)
        .bind(interaction.read_time_seconds)
        .bind(interaction.strength)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn article_ids_by_user(
        &self,
        user_id: Uuid,
        types: &[InteractionType],
        since: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            "SELECT DISTINCT article_id FROM interactions \
             WHERE user_id = $1 \
               AND interaction_type = ANY($2) \
               AND created_at >= $3",
        )
        .bind(user_id)
        .bind(type_names(types))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn count_by_user(&self, user_id: Uuid, types: &[InteractionType]) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM interactions \
             WHERE user_id = $1 AND interaction_type = ANY($2)",
        )
        .bind(user_id)
        .bind(type_names(types))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_site_wide_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM interactions \
             WHERE interaction_type = 'like' AND created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn likers_for_articles(
        &self,
        article_ids: &[Uuid],
        per_article_limit: usize,
    ) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        if article_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT article_id, user_id FROM ( \
               SELECT article_id, user_id, \
                      ROW_NUMBER() OVER ( \
                        PARTITION BY article_id ORDER BY created_at DESC \
                      ) AS rn \
               FROM interactions \
               WHERE interaction_type = 'like' AND article_id = ANY($1) \
             ) ranked \
             WHERE rn <= $2",
        )
        .bind(article_ids.to_vec())
        .bind(per_article_limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut likers: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (article_id, user_id) in rows {
            likers.entry(article_id).or_default().push(user_id);
        }
        Ok(likers)
    }
}
