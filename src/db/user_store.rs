//! User store: reader profiles and taste embeddings. The ranking engine
//! only reads from here; profile writes belong to the user API.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{User, UserPreferences, EMBEDDING_DIM};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Taste embeddings for the given users, one batched query. Users
    /// without a (well-formed) embedding are simply absent from the map.
    async fn embeddings_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<f32>>>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<
            _,
            (
                Uuid,
                Option<serde_json::Value>,
                Option<Vec<f32>>,
                Option<f64>,
                Option<i64>,
            ),
        >(
            "SELECT id, preferences, embedding, engagement_score, articles_read \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, preferences, embedding, engagement_score, articles_read)| User {
                id,
                preferences: preferences
                    .and_then(|v| serde_json::from_value::<UserPreferences>(v).ok()),
                embedding,
                engagement_score: engagement_score.unwrap_or(0.0),
                articles_read: articles_read.unwrap_or(0),
            },
        ))
    }

    async fn embeddings_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<f32>>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, Vec<f32>)>(
            "SELECT id, embedding FROM users \
             WHERE id = ANY($1) AND embedding IS NOT NULL",
        )
        .bind(user_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|(_, embedding)| embedding.len() == EMBEDDING_DIM)
            .collect())
    }
}
