use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimension of the semantic embedding vectors produced by the
/// (external) embedding model. Vectors with any other length are
/// rejected at the store boundary and treated as absent by the scorer.
pub const EMBEDDING_DIM: usize = 384;

/// News article as ingested into the article store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub source_id: Option<String>,
    pub source_name: String,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub shares: i64,
    /// Semantic embedding, EMBEDDING_DIM components when present.
    pub embedding: Option<Vec<f32>>,
}

impl Article {
    /// Popularity proxy used for fetch ordering and the popularity
    /// sub-score: views + likes * 10 + shares * 5.
    pub fn engagement_proxy(&self) -> i64 {
        self.views + self.likes * 10 + self.shares * 5
    }

    /// Embedding if present and well-formed, otherwise None.
    pub fn valid_embedding(&self) -> Option<&[f32]> {
        match self.embedding.as_deref() {
            Some(v) if v.len() == EMBEDDING_DIM => Some(v),
            _ => None,
        }
    }
}

/// Explicit user preferences captured at registration or profile update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub preferred_sources: Vec<String>,
    pub language: Option<String>,
    pub content_type: Option<String>,
}

/// Reader profile as far as the ranking engine cares about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub preferences: Option<UserPreferences>,
    /// Taste embedding, EMBEDDING_DIM components, refreshed by the
    /// on-device embedding sync.
    pub embedding: Option<Vec<f32>>,
    /// Exponential moving average of session engagement.
    #[serde(default)]
    pub engagement_score: f64,
    #[serde(default)]
    pub articles_read: i64,
}

impl User {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            preferences: None,
            embedding: None,
            engagement_score: 0.0,
            articles_read: 0,
        }
    }

    pub fn has_category_preferences(&self) -> bool {
        self.preferences
            .as_ref()
            .map(|p| !p.categories.is_empty())
            .unwrap_or(false)
    }

    pub fn preferred_categories(&self) -> &[String] {
        self.preferences
            .as_ref()
            .map(|p| p.categories.as_slice())
            .unwrap_or(&[])
    }

    /// Embedding if present and well-formed, otherwise None.
    pub fn valid_embedding(&self) -> Option<&[f32]> {
        match self.embedding.as_deref() {
            Some(v) if v.len() == EMBEDDING_DIM => Some(v),
            _ => None,
        }
    }
}

/// Interaction event types logged by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Skip,
    Like,
    Share,
    Bookmark,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Skip => "skip",
            InteractionType::Like => "like",
            InteractionType::Share => "share",
            InteractionType::Bookmark => "bookmark",
        }
    }
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical interaction record. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub interaction_type: InteractionType,
    pub created_at: DateTime<Utc>,
    pub read_time_seconds: Option<f64>,
    pub strength: Option<f64>,
}

/// Named sub-scores produced by the hybrid scorer. Serialized as a map
/// with absent entries omitted, so fallback-produced recommendations
/// carry only the scores that were actually computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collab_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diversity_score: Option<f64>,
}

/// Per-recommendation metadata handed to the feed assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationMetadata {
    pub reason: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Positional score: 1.0 - 0.01 * position.
    pub position_score: f64,
    pub scores: ScoreBreakdown,
}

/// One ranked feed entry. Transient, computed per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedArticle {
    pub article: Article,
    pub metadata: RecommendationMetadata,
}

/// Article payload for the feed response (matches the client FeedCard shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedArticle {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_to_image: Option<String>,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub reason: String,
    pub confidence: f64,
    pub scores: ScoreBreakdown,
}

impl FeedArticle {
    /// Plain article payload with neutral metadata, used where no
    /// ranking context exists (similar-article lookups).
    pub fn from_article(article: Article) -> Self {
        Self {
            id: article.id.to_string(),
            title: article.title,
            summary: article.summary,
            url: article.url,
            url_to_image: article.url_to_image,
            source_name: article.source_name,
            category: article.category,
            published_at: article.published_at,
            views: article.views,
            likes: article.likes,
            shares: article.shares,
            reason: "Similar article".to_string(),
            confidence: 0.0,
            scores: ScoreBreakdown::default(),
        }
    }
}

impl From<RankedArticle> for FeedArticle {
    fn from(ranked: RankedArticle) -> Self {
        let RankedArticle { article, metadata } = ranked;
        Self {
            id: article.id.to_string(),
            title: article.title,
            summary: article.summary,
            url: article.url,
            url_to_image: article.url_to_image,
            source_name: article.source_name,
            category: article.category,
            published_at: article.published_at,
            views: article.views,
            likes: article.likes,
            shares: article.shares,
            reason: metadata.reason,
            confidence: metadata.confidence,
            scores: metadata.scores,
        }
    }
}

/// Feed response model with pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub articles: Vec<FeedArticle>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub count: usize,
}
