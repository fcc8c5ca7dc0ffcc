//! Cold-start classification and the three-tier fallback ladder.
//!
//! Tier 1 matches explicit category preferences, tier 2 assembles a
//! diverse trending mix over a wide window, tier 3 is plain trending.
//! Each tier hands off to the next when it produces nothing; tier 3 is
//! the final safety net and only comes back empty when the catalog has
//! no eligible articles at all.

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::db::{ArticleQuery, ArticleStore, CandidateOrder};
use crate::error::Result;
use crate::models::{
    Article, RankedArticle, RecommendationMetadata, ScoreBreakdown, User,
};
use crate::services::recommendation::cursor::Cursor;

/// A user is in cold start when they have almost no interaction history
/// and no rich profile signal to score against.
pub fn is_cold_start(user: &User, interaction_count: i64, config: &RankingConfig) -> bool {
    interaction_count < config.cold_start_threshold
        && !(user.has_category_preferences() || user.valid_embedding().is_some())
}

/// Serve a user without enough signal for hybrid scoring: preferred
/// categories first, diverse trending otherwise.
pub async fn cold_start_recommendations(
    articles: &dyn ArticleStore,
    config: &RankingConfig,
    user: &User,
    exclude_ids: &HashSet<Uuid>,
    cursor: Option<&Cursor>,
    limit: usize,
    rng: &mut impl Rng,
) -> Vec<RankedArticle> {
    if user.has_category_preferences() {
        match category_preference(articles, config, user, exclude_ids, cursor, limit).await {
            Ok(hits) if !hits.is_empty() => {
                return format_tier(hits, |article| tier1_metadata(article));
            }
            Ok(_) => {}
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "category preference fallback failed");
            }
        }
    }

    diverse_trending(articles, config, exclude_ids, cursor, limit, rng).await
}

/// Tier 1: popular recent articles from the user's preferred categories.
async fn category_preference(
    articles: &dyn ArticleStore,
    config: &RankingConfig,
    user: &User,
    exclude_ids: &HashSet<Uuid>,
    cursor: Option<&Cursor>,
    limit: usize,
) -> Result<Vec<Article>> {
    let query = ArticleQuery {
        categories: Some(user.preferred_categories().to_vec()),
        published_after: Some(Utc::now() - Duration::days(config.sparse_window_days)),
        exclude_ids: exclude_ids.iter().copied().collect(),
        id_after: cursor.map(|c| c.article_id),
        order: CandidateOrder::Popularity,
        limit: limit as i64,
        ..Default::default()
    };
    articles.query(&query).await
}

/// Tier 2: an even share of trending articles from every recently active
/// category, topped up from uncategorized articles, shuffled so the page
/// does not read as category blocks.
pub async fn diverse_trending(
    articles: &dyn ArticleStore,
    config: &RankingConfig,
    exclude_ids: &HashSet<Uuid>,
    cursor: Option<&Cursor>,
    limit: usize,
    rng: &mut impl Rng,
) -> Vec<RankedArticle> {
    match diverse_trending_inner(articles, config, exclude_ids, cursor, limit, rng).await {
        Ok(ranked) if !ranked.is_empty() => ranked,
        Ok(_) => {
            debug!("diverse trending found nothing, dropping to general trending");
            general_trending(articles, config, exclude_ids, cursor, limit).await
        }
        Err(err) => {
            warn!(error = %err, "diverse trending failed, dropping to general trending");
            general_trending(articles, config, exclude_ids, cursor, limit).await
        }
    }
}

async fn diverse_trending_inner(
    articles: &dyn ArticleStore,
    config: &RankingConfig,
    exclude_ids: &HashSet<Uuid>,
    cursor: Option<&Cursor>,
    limit: usize,
    rng: &mut impl Rng,
) -> Result<Vec<RankedArticle>> {
    let window_start = Utc::now() - Duration::days(config.sparse_window_days);
    let exclude: Vec<Uuid> = exclude_ids.iter().copied().collect();
    let id_after = cursor.map(|c| c.article_id);

    let categories = articles.distinct_categories(window_start).await?;

    let mut pool: Vec<Article> = Vec::new();
    if !categories.is_empty() {
        let per_category = (limit / categories.len()).max(1);
        for category in &categories {
            let query = ArticleQuery {
                categories: Some(vec![category.clone()]),
                published_after: Some(window_start),
                exclude_ids: exclude.clone(),
                id_after,
                order: CandidateOrder::Popularity,
                limit: per_category as i64,
                ..Default::default()
            };
            pool.extend(articles.query(&query).await?);
        }
    }

    if pool.len() < limit {
        let query = ArticleQuery {
            uncategorized_only: true,
            published_after: Some(window_start),
            exclude_ids: exclude.clone(),
            id_after,
            order: CandidateOrder::Popularity,
            limit: (limit - pool.len()) as i64,
            ..Default::default()
        };
        pool.extend(articles.query(&query).await?);
    }

    pool.shuffle(rng);
    pool.truncate(limit);

    Ok(format_tier(pool, |article| tier2_metadata(article)))
}

/// Tier 3: popularity-ordered articles from the standard window,
/// category-blind. Errors degrade to an empty page rather than a request
/// failure.
pub async fn general_trending(
    articles: &dyn ArticleStore,
    config: &RankingConfig,
    exclude_ids: &HashSet<Uuid>,
    cursor: Option<&Cursor>,
    limit: usize,
) -> Vec<RankedArticle> {
    let query = ArticleQuery {
        published_after: Some(Utc::now() - Duration::days(config.candidate_window_days)),
        exclude_ids: exclude_ids.iter().copied().collect(),
        id_after: cursor.map(|c| c.article_id),
        order: CandidateOrder::Popularity,
        limit: limit as i64,
        ..Default::default()
    };

    match articles.query(&query).await {
        Ok(hits) => format_tier(hits, |article| tier3_metadata(article)),
        Err(err) => {
            warn!(error = %err, "general trending failed, returning empty page");
            Vec::new()
        }
    }
}

fn tier1_metadata(_article: &Article) -> (String, f64, ScoreBreakdown) {
    (
        "Based on your interests".to_string(),
        0.7,
        ScoreBreakdown {
            preference_score: Some(0.8),
            ..Default::default()
        },
    )
}

fn tier2_metadata(article: &Article) -> (String, f64, ScoreBreakdown) {
    let reason = match &article.category {
        Some(category) => format!("Trending in {}", category),
        None => "Trending article".to_string(),
    };
    (
        reason,
        0.6,
        ScoreBreakdown {
            popularity_score: Some(0.8),
            diversity_score: Some(0.9),
            ..Default::default()
        },
    )
}

fn tier3_metadata(_article: &Article) -> (String, f64, ScoreBreakdown) {
    (
        "Trending article".to_string(),
        0.5,
        ScoreBreakdown {
            popularity_score: Some(0.8),
            ..Default::default()
        },
    )
}

fn format_tier(
    articles: Vec<Article>,
    metadata: impl Fn(&Article) -> (String, f64, ScoreBreakdown),
) -> Vec<RankedArticle> {
    articles
        .into_iter()
        .enumerate()
        .map(|(i, article)| {
            let (reason, confidence, scores) = metadata(&article);
            RankedArticle {
                metadata: RecommendationMetadata {
                    reason,
                    confidence,
                    position_score: 1.0 - (i as f64 * 0.01),
                    scores,
                },
                article,
            }
        })
        .collect()
}

/// Human-readable reason for a personalized recommendation, picked from
/// the strongest sub-score signal.
pub fn recommendation_reason(scores: &ScoreBreakdown, article: &Article) -> String {
    if scores.content_score.unwrap_or(0.0) > 0.7 {
        return "Based on your reading history".to_string();
    }
    if scores.collab_score.unwrap_or(0.0) > 0.6 {
        return "Similar users enjoyed this".to_string();
    }
    if scores.popularity_score.unwrap_or(0.0) > 0.8 {
        return "Trending article".to_string();
    }
    if scores.preference_score.unwrap_or(0.0) > 0.7 {
        if let Some(category) = &article.category {
            return format!("Matches your {} interests", category);
        }
    }
    if scores.diversity_score.unwrap_or(0.0) > 0.7 {
        return "Discover something new".to_string();
    }

    match &article.category {
        Some(category) => format!("Popular in {}", category),
        None => "Recommended for you".to_string(),
    }
}
