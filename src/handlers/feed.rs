/// Feed API Handlers
///
/// HTTP endpoints for the personalized feed and similar-article lookups
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{FeedArticle, FeedResponse};
use crate::services::recommendation::{next_cursor, RecommendationService};

/// Query parameters for GET /feed
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// User to rank the feed for
    pub user_id: Uuid,

    /// Page size (default: 20, max: 50)
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Opaque pagination cursor from a previous page
    pub cursor: Option<String>,

    /// Content type filter ("mixed", "articles", "videos")
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Apply per-category and per-source diversity caps
    #[serde(default = "default_diversify")]
    pub diversify: bool,

    /// Bypass the cache and widen exclusion windows
    #[serde(default)]
    pub force_fresh: bool,
}

fn default_limit() -> usize {
    20
}

fn default_content_type() -> String {
    "mixed".to_string()
}

fn default_diversify() -> bool {
    true
}

/// Query parameters for GET /articles/{article_id}/similar
#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    /// Number of similar articles to return (default: 10, max: 50)
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

fn default_similar_limit() -> usize {
    10
}

/// GET /api/v1/feed
pub async fn get_feed(
    service: web::Data<RecommendationService>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.clamp(1, 50);

    let user = service
        .user_store()
        .get_by_id(query.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", query.user_id)))?;

    let page = service
        .get_personalized_recommendations(
            &user,
            limit,
            query.diversify,
            &query.content_type,
            query.cursor.as_deref(),
            query.force_fresh,
        )
        .await;

    debug!(user_id = %query.user_id, served = page.len(), limit, "feed page served");

    // A full page implies more may exist; a short page is the end of the
    // eligible catalog, never padded with repeats.
    let has_more = page.len() == limit;
    let next = if has_more { next_cursor(&page) } else { None };

    let articles: Vec<FeedArticle> = page.into_iter().map(FeedArticle::from).collect();
    Ok(HttpResponse::Ok().json(FeedResponse {
        count: articles.len(),
        articles,
        next_cursor: next,
        has_more,
    }))
}

/// GET /api/v1/articles/{article_id}/similar
pub async fn get_similar_articles(
    service: web::Data<RecommendationService>,
    path: web::Path<Uuid>,
    query: web::Query<SimilarQuery>,
) -> Result<HttpResponse> {
    let article_id = path.into_inner();
    let limit = query.limit.clamp(1, 50);

    let similar = service.similar_articles(article_id, limit).await?;
    let articles: Vec<FeedArticle> = similar
        .into_iter()
        .map(FeedArticle::from_article)
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": articles.len(),
        "articles": articles,
    })))
}
