//! Article store: filtered range queries and similarity queries over the
//! ingested article corpus.
//!
//! The ranking engine only ever reads articles; engagement counter
//! increments are owned by the interaction write path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Article;
use crate::services::recommendation::scoring::cosine_similarity;

/// Ordering applied at fetch time. Both orderings carry a `random()` term
/// so identical requests do not return identical raw candidate sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrder {
    /// Recency first, popularity proxy as tiebreak. Used for the
    /// personalized candidate pool.
    RecencyWeighted,
    /// Popularity proxy first. Used by the trending fallbacks.
    Popularity,
}

impl Default for CandidateOrder {
    fn default() -> Self {
        CandidateOrder::RecencyWeighted
    }
}

/// Filter set for `ArticleStore::query`.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub categories: Option<Vec<String>>,
    /// Only uncategorized articles (used by the diverse-trending remainder).
    pub uncategorized_only: bool,
    pub source_name: Option<String>,
    pub language: Option<String>,
    /// Only articles carrying an embedding vector.
    pub has_embedding: bool,
    pub published_after: Option<DateTime<Utc>>,
    /// Safety-critical: exclusions are enforced here, inside the query,
    /// never only by post-filtering.
    pub exclude_ids: Vec<Uuid>,
    /// Cursor watermark: only articles with id strictly greater.
    pub id_after: Option<Uuid>,
    pub order: CandidateOrder,
    pub limit: i64,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Article>>;

    /// Articles most similar to the given embedding, cosine-ordered,
    /// excluding `exclude_id`.
    async fn similarity_search(
        &self,
        embedding: &[f32],
        exclude_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Article>>;

    /// Average engagement proxy per category since the given instant.
    /// One batched query; feeds the collaborative category fallback.
    async fn avg_engagement_by_category(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>>;

    async fn distinct_categories(&self, since: DateTime<Utc>) -> Result<Vec<String>>;
}

const ARTICLE_COLUMNS: &str = "id, source_id, source_name, author, title, description, content, \
     summary, url, url_to_image, published_at, fetched_at, language, category, \
     views, likes, shares, embedding";

/// Candidate pool scanned for similarity ranking. Bounded so a similarity
/// query never walks the whole corpus.
const SIMILARITY_SCAN_LIMIT: i64 = 512;

pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM articles WHERE 1=1", ARTICLE_COLUMNS));

        if let Some(categories) = &query.categories {
            qb.push(" AND category = ANY(");
            qb.push_bind(categories.clone());
            qb.push(")");
        }
        if query.uncategorized_only {
            qb.push(" AND category IS NULL");
        }
        if let Some(source) = &query.source_name {
            qb.push(" AND source_name = ");
            qb.push_bind(source.clone());
        }
        if let Some(language) = &query.language {
            qb.push(" AND language = ");
            qb.push_bind(language.clone());
        }
        if query.has_embedding {
            qb.push(" AND embedding IS NOT NULL");
        }
        if let Some(after) = query.published_after {
            qb.push(" AND published_at >= ");
            qb.push_bind(after);
        }
        if !query.exclude_ids.is_empty() {
            qb.push(" AND id <> ALL(");
            qb.push_bind(query.exclude_ids.clone());
            qb.push(")");
        }
        if let Some(id_after) = query.id_after {
            qb.push(" AND id > ");
            qb.push_bind(id_after);
        }

        match query.order {
            CandidateOrder::RecencyWeighted => {
                qb.push(
                    " ORDER BY published_at DESC NULLS LAST, \
                     (views + likes * 10 + shares * 5) DESC, random(), id",
                );
            }
            CandidateOrder::Popularity => {
                qb.push(" ORDER BY (views + likes * 10 + shares * 5) DESC, random(), id");
            }
        }

        qb.push(" LIMIT ");
        qb.push_bind(query.limit.max(0));

        let articles = qb
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {} FROM articles WHERE id = $1",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        exclude_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Article>> {
        // Scan a bounded pool of recent embedded articles and rank
        // in-process; the corpus a reader install sees is small enough
        // that this stays cheap.
        let pool = self
            .query(&ArticleQuery {
                has_embedding: true,
                exclude_ids: exclude_id.into_iter().collect(),
                order: CandidateOrder::RecencyWeighted,
                limit: SIMILARITY_SCAN_LIMIT,
                ..Default::default()
            })
            .await?;

        let mut scored: Vec<(Article, f64)> = pool
            .into_iter()
            .filter_map(|article| {
                let sim = article
                    .valid_embedding()
                    .map(|vec| cosine_similarity(embedding, vec))?;
                Some((article, sim))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);

        Ok(scored.into_iter().map(|(article, _)| article).collect())
    }

    async fn avg_engagement_by_category(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>> {
        let rows = sqlx::query_as::<_, (String, Option<f64>)>(
            "SELECT category, AVG(views + likes * 10 + shares * 5)::float8 \
             FROM articles \
             WHERE category IS NOT NULL AND published_at >= $1 \
             GROUP BY category",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(category, avg)| avg.map(|a| (category, a)))
            .collect())
    }

    async fn distinct_categories(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT DISTINCT category FROM articles \
             WHERE category IS NOT NULL AND published_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(category,)| category).collect())
    }
}
