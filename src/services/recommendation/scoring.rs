//! Hybrid scorer: blends content similarity, collaborative signal,
//! popularity, freshness, preference match and a well-formedness bonus
//! into one scalar per candidate, with adaptive weights.
//!
//! The final score carries a small uniform jitter. That is intentional:
//! it breaks ties and keeps two identical requests from producing the
//! identical ranking, at the cost of perfect determinism. Tests pin the
//! RNG seed instead.

use chrono::{Duration, Utc};
use ndarray::ArrayView1;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::db::{ArticleStore, InteractionStore, UserStore};
use crate::models::{Article, InteractionType, ScoreBreakdown, User};

/// Cosine similarity over embedding vectors. Dimension mismatch scores
/// zero rather than erroring; malformed vectors are a boundary bug, not
/// a ranking failure.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let va = ArrayView1::from(a);
    let vb = ArrayView1::from(b);

    let dot = va.dot(&vb) as f64;
    let norm_a = (va.dot(&va) as f64).sqrt();
    let norm_b = (vb.dot(&vb) as f64).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Per-request scoring context: every store round-trip the scorer needs,
/// fetched up front in a bounded number of batched queries so the scoring
/// loop itself is pure CPU.
#[derive(Debug, Default)]
pub struct ScoringContext {
    /// Total likes + shares + bookmarks for the user.
    pub interaction_count: i64,
    /// Recent likers per candidate article (sampled).
    pub likers: HashMap<Uuid, Vec<Uuid>>,
    /// Taste embeddings of those likers.
    pub liker_embeddings: HashMap<Uuid, Vec<f32>>,
    /// 30-day average engagement proxy per category.
    pub category_engagement: HashMap<String, f64>,
}

impl ScoringContext {
    /// Build the context for one request. Each input degrades
    /// independently: a failed lookup zeroes that signal and the blend
    /// leans on the remaining sub-scores.
    pub async fn build(
        user: &User,
        candidates: &[Article],
        articles: &dyn ArticleStore,
        interactions: &dyn InteractionStore,
        users: &dyn UserStore,
        config: &RankingConfig,
    ) -> Self {
        let interaction_count = match interactions
            .count_by_user(
                user.id,
                &[
                    InteractionType::Like,
                    InteractionType::Share,
                    InteractionType::Bookmark,
                ],
            )
            .await
        {
            Ok(count) => count,
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "interaction count lookup failed");
                0
            }
        };

        // Collaborative inputs are only worth fetching when the user has
        // an embedding to compare against.
        let (likers, liker_embeddings) = if user.valid_embedding().is_some() {
            let candidate_ids: Vec<Uuid> = candidates.iter().map(|a| a.id).collect();
            let likers = match interactions
                .likers_for_articles(&candidate_ids, config.max_likers_per_article)
                .await
            {
                Ok(likers) => likers,
                Err(err) => {
                    warn!(error = %err, "liker lookup failed, collaborative signal disabled");
                    HashMap::new()
                }
            };

            let unique_likers: Vec<Uuid> = likers
                .values()
                .flatten()
                .copied()
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let liker_embeddings = match users.embeddings_for(&unique_likers).await {
                Ok(embeddings) => embeddings,
                Err(err) => {
                    warn!(error = %err, "liker embedding lookup failed");
                    HashMap::new()
                }
            };

            (likers, liker_embeddings)
        } else {
            (HashMap::new(), HashMap::new())
        };

        let category_engagement = match articles
            .avg_engagement_by_category(Utc::now() - Duration::days(30))
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "category engagement lookup failed");
                HashMap::new()
            }
        };

        Self {
            interaction_count,
            likers,
            liker_embeddings,
            category_engagement,
        }
    }
}

/// Blend weights over the six sub-scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub content: f64,
    pub collab: f64,
    pub popularity: f64,
    pub freshness: f64,
    pub preference: f64,
    pub diversity: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.content
            + self.collab
            + self.popularity
            + self.freshness
            + self.preference
            + self.diversity
    }
}

/// Weight profile adapted to how much signal the user actually has.
/// Sparse-history users lean on popularity and freshness; a usable
/// embedding shifts weight from popularity to content, and explicit
/// preferences shift a little more onto preference match.
pub fn adaptive_weights(
    user: &User,
    interaction_count: i64,
    content_score: f64,
    config: &RankingConfig,
) -> Weights {
    let mut weights = if interaction_count < config.cold_start_threshold {
        Weights {
            content: 0.1,
            collab: 0.05,
            popularity: 0.4,
            freshness: 0.2,
            preference: 0.15,
            diversity: 0.1,
        }
    } else if interaction_count < config.moderate_user_threshold {
        Weights {
            content: 0.2,
            collab: 0.1,
            popularity: 0.3,
            freshness: 0.15,
            preference: 0.15,
            diversity: 0.1,
        }
    } else {
        Weights {
            content: 0.25,
            collab: 0.15,
            popularity: 0.25,
            freshness: 0.15,
            preference: 0.15,
            diversity: 0.05,
        }
    };

    if user.valid_embedding().is_some() && content_score > 0.1 {
        weights.content += 0.1;
        weights.popularity -= 0.1;
    }

    if user.has_category_preferences() {
        weights.preference += 0.05;
        weights.popularity -= 0.05;
    }

    weights
}

/// Score one candidate for one user. Pure CPU over the prefetched
/// context; returns the blended score plus the full breakdown.
pub fn hybrid_score(
    user: &User,
    article: &Article,
    ctx: &ScoringContext,
    config: &RankingConfig,
    rng: &mut impl Rng,
) -> (f64, ScoreBreakdown) {
    let content = match (user.valid_embedding(), article.valid_embedding()) {
        (Some(user_vec), Some(article_vec)) => {
            cosine_similarity(user_vec, article_vec).clamp(0.0, 1.0)
        }
        _ => content_similarity_fallback(user, article),
    };

    let collab = {
        let direct = collaborative_score(user, article, ctx, config);
        if direct == 0.0 {
            category_popularity_fallback(article.category.as_deref(), ctx)
        } else {
            direct
        }
    };

    let popularity = popularity_score(article);
    let freshness = freshness_score(article, config);
    let preference = preference_score(user, article);
    let diversity = diversity_score(article);

    let weights = adaptive_weights(user, ctx.interaction_count, content, config);

    let total = content * weights.content
        + collab * weights.collab
        + popularity * weights.popularity
        + freshness * weights.freshness
        + preference * weights.preference
        + diversity * weights.diversity
        + rng.gen_range(0.0..config.score_jitter);

    let breakdown = ScoreBreakdown {
        content_score: Some(content),
        collab_score: Some(collab),
        popularity_score: Some(popularity),
        freshness_score: Some(freshness),
        preference_score: Some(preference),
        diversity_score: Some(diversity),
    };

    (total, breakdown)
}

/// Metadata-based content similarity when embeddings are missing on
/// either side.
fn content_similarity_fallback(user: &User, article: &Article) -> f64 {
    let Some(prefs) = &user.preferences else {
        return 0.0;
    };

    let mut score: f64 = 0.0;
    let title_lower = article.title.to_lowercase();

    if let Some(category) = &article.category {
        if prefs
            .categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
        {
            score += 0.6;
        } else if prefs
            .categories
            .iter()
            .any(|c| title_lower.contains(&c.to_lowercase()))
        {
            score += 0.3;
        }
    }

    if !prefs.keywords.is_empty() {
        let text = format!(
            "{} {}",
            title_lower,
            article.summary.as_deref().unwrap_or("").to_lowercase()
        );
        let matches = prefs
            .keywords
            .iter()
            .filter(|k| text.contains(&k.to_lowercase()))
            .count();
        score += (matches as f64 * 0.1).min(0.3);
    }

    if prefs
        .preferred_sources
        .iter()
        .any(|s| s == &article.source_name)
    {
        score += 0.2;
    }

    score.min(1.0)
}

/// Average similarity to the users who liked this article; zero when the
/// user has no embedding or nobody liked it yet.
fn collaborative_score(
    user: &User,
    article: &Article,
    ctx: &ScoringContext,
    config: &RankingConfig,
) -> f64 {
    let Some(user_vec) = user.valid_embedding() else {
        return 0.0;
    };
    let Some(likers) = ctx.likers.get(&article.id) else {
        return 0.0;
    };

    let similarities: Vec<f64> = likers
        .iter()
        .filter_map(|liker| ctx.liker_embeddings.get(liker))
        .take(config.max_liker_embeddings)
        .map(|embedding| cosine_similarity(user_vec, embedding).max(0.0))
        .collect();

    if similarities.is_empty() {
        0.0
    } else {
        similarities.iter().sum::<f64>() / similarities.len() as f64
    }
}

/// Collaborative substitute: normalized log-scale category engagement.
/// 0.3 when the category has no recent data, 0.2 for uncategorized.
fn category_popularity_fallback(category: Option<&str>, ctx: &ScoringContext) -> f64 {
    let Some(category) = category else {
        return 0.2;
    };
    match ctx.category_engagement.get(category) {
        Some(avg) => ((avg + 1.0).log10() / 5.0).min(1.0),
        None => 0.3,
    }
}

/// Log-compressed engagement in [0.1, 1.0]. The floor keeps relevant but
/// unpopular articles from zero-scoring; the log keeps viral ones from
/// dominating.
pub fn popularity_score(article: &Article) -> f64 {
    let engagement = article.engagement_proxy() as f64;
    if engagement > 0.0 {
        (((engagement + 1.0).log10()) / 4.0).clamp(0.1, 1.0)
    } else {
        0.1
    }
}

/// Exponential decay with a 14-day half-life, clamped to [0.1, 1.0].
/// Articles without a publication timestamp get a moderate 0.3.
pub fn freshness_score(article: &Article, config: &RankingConfig) -> f64 {
    let Some(published_at) = article.published_at else {
        return 0.3;
    };

    let hours_old = (Utc::now() - published_at).num_seconds().max(0) as f64 / 3600.0;
    (-hours_old / config.freshness_half_life_hours)
        .exp()
        .clamp(0.1, 1.0)
}

/// 0.9 for a preferred category, 0.4 for a non-preferred one, 0.5
/// neutral when either side has nothing to match on.
fn preference_score(user: &User, article: &Article) -> f64 {
    let categories = user.preferred_categories();
    let Some(category) = &article.category else {
        return 0.5;
    };
    if categories.is_empty() {
        return 0.5;
    }

    if categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
        0.9
    } else {
        0.4
    }
}

/// Well-formedness nudge: articles with a source, a category and an
/// image are nicer to swipe through. True diversity enforcement lives in
/// the diversity filter.
fn diversity_score(article: &Article) -> f64 {
    let mut score: f64 = 0.0;
    if !article.source_name.is_empty() {
        score += 0.3;
    }
    if article.category.is_some() {
        score += 0.2;
    }
    if article.url_to_image.is_some() {
        score += 0.1;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserPreferences, EMBEDDING_DIM};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_article() -> Article {
        Article {
            id: Uuid::new_v4(),
            source_id: None,
            source_name: "reuters".to_string(),
            author: None,
            title: "Markets rally on tech earnings".to_string(),
            description: None,
            content: None,
            summary: Some("Tech stocks lead a broad rally".to_string()),
            url: "https://example.com/markets".to_string(),
            url_to_image: Some("https://example.com/markets.jpg".to_string()),
            published_at: Some(Utc::now() - Duration::hours(6)),
            fetched_at: None,
            language: Some("en".to_string()),
            category: Some("business".to_string()),
            views: 100,
            likes: 5,
            shares: 2,
            embedding: None,
        }
    }

    fn user_with_prefs(categories: &[&str]) -> User {
        let mut user = User::new(Uuid::new_v4());
        user.preferences = Some(UserPreferences {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        });
        user
    }

    #[test]
    fn test_cosine_similarity_identical_vectors() {
        let v = vec![0.5f32; EMBEDDING_DIM];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0f32, 0.0, 0.0];
        let b = vec![0.0f32, 1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch_is_zero() {
        let a = vec![1.0f32; 10];
        let b = vec![1.0f32; 20];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_popularity_score_bounds() {
        let mut article = test_article();

        article.views = 0;
        article.likes = 0;
        article.shares = 0;
        assert_eq!(popularity_score(&article), 0.1);

        // A single view: log-compressed value below the floor, clamped up.
        article.views = 1;
        assert_eq!(popularity_score(&article), 0.1);

        // Viral: clamped to 1.0.
        article.views = 10_000_000;
        article.likes = 500_000;
        article.shares = 100_000;
        assert_eq!(popularity_score(&article), 1.0);
    }

    #[test]
    fn test_freshness_score_bounds() {
        let config = RankingConfig::default();
        let mut article = test_article();

        article.published_at = None;
        assert_eq!(freshness_score(&article, &config), 0.3);

        article.published_at = Some(Utc::now());
        let fresh = freshness_score(&article, &config);
        assert!(fresh > 0.99 && fresh <= 1.0);

        article.published_at = Some(Utc::now() - Duration::days(365));
        assert_eq!(freshness_score(&article, &config), 0.1);
    }

    #[test]
    fn test_freshness_half_life() {
        let config = RankingConfig::default();
        let mut article = test_article();
        article.published_at = Some(Utc::now() - Duration::days(14));
        let score = freshness_score(&article, &config);
        // exp(-1) after one half-life constant.
        assert!((score - (-1.0f64).exp()).abs() < 0.01);
    }

    #[test]
    fn test_preference_score_values() {
        let article = test_article();

        let matching = user_with_prefs(&["Business", "science"]);
        assert_eq!(preference_score(&matching, &article), 0.9);

        let mismatched = user_with_prefs(&["sports"]);
        assert_eq!(preference_score(&mismatched, &article), 0.4);

        let neutral = User::new(Uuid::new_v4());
        assert_eq!(preference_score(&neutral, &article), 0.5);

        let mut uncategorized = test_article();
        uncategorized.category = None;
        assert_eq!(preference_score(&matching, &uncategorized), 0.5);
    }

    #[test]
    fn test_diversity_score_additive_bonus() {
        let article = test_article();
        // Source + category + image.
        assert!((diversity_score(&article) - 0.6).abs() < 1e-9);

        let mut bare = test_article();
        bare.source_name = String::new();
        bare.category = None;
        bare.url_to_image = None;
        assert_eq!(diversity_score(&bare), 0.0);
    }

    #[test]
    fn test_content_fallback_category_match() {
        let article = test_article();

        let matching = user_with_prefs(&["business"]);
        assert!((content_similarity_fallback(&matching, &article) - 0.6).abs() < 1e-9);

        // Preferred category word appears in the title only.
        let mut titled = user_with_prefs(&["markets"]);
        assert!((content_similarity_fallback(&titled, &article) - 0.3).abs() < 1e-9);

        titled.preferences.as_mut().unwrap().preferred_sources = vec!["reuters".to_string()];
        assert!((content_similarity_fallback(&titled, &article) - 0.5).abs() < 1e-9);

        let no_prefs = User::new(Uuid::new_v4());
        assert_eq!(content_similarity_fallback(&no_prefs, &article), 0.0);
    }

    #[test]
    fn test_content_fallback_keyword_cap() {
        let mut user = user_with_prefs(&[]);
        user.preferences.as_mut().unwrap().keywords = vec![
            "tech".to_string(),
            "stocks".to_string(),
            "rally".to_string(),
            "earnings".to_string(),
            "broad".to_string(),
        ];
        let article = test_article();
        // Five keyword hits, capped at 0.3.
        assert!((content_similarity_fallback(&user, &article) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_category_popularity_fallback_defaults() {
        let mut ctx = ScoringContext::default();
        assert_eq!(category_popularity_fallback(None, &ctx), 0.2);
        assert_eq!(category_popularity_fallback(Some("business"), &ctx), 0.3);

        ctx.category_engagement
            .insert("business".to_string(), 999.0);
        let score = category_popularity_fallback(Some("business"), &ctx);
        assert!((score - (1000.0f64.log10() / 5.0)).abs() < 1e-9);

        // Huge engagement clamps at 1.0.
        ctx.category_engagement
            .insert("viral".to_string(), 1e12);
        assert_eq!(category_popularity_fallback(Some("viral"), &ctx), 1.0);
    }

    #[test]
    fn test_adaptive_weights_profiles_sum_to_one() {
        let config = RankingConfig::default();
        let user = User::new(Uuid::new_v4());

        for count in [0, 4, 5, 19, 20, 100] {
            let weights = adaptive_weights(&user, count, 0.0, &config);
            assert!(
                (weights.sum() - 1.0).abs() < 1e-9,
                "weights for count {} must sum to 1",
                count
            );
        }
    }

    #[test]
    fn test_adaptive_weights_shift_with_signal() {
        let config = RankingConfig::default();

        let mut embedded = User::new(Uuid::new_v4());
        embedded.embedding = Some(vec![0.1; EMBEDDING_DIM]);
        let weights = adaptive_weights(&embedded, 50, 0.8, &config);
        assert!((weights.content - 0.35).abs() < 1e-9);
        assert!((weights.popularity - 0.15).abs() < 1e-9);

        // Weak content signal does not earn the shift.
        let weights = adaptive_weights(&embedded, 50, 0.05, &config);
        assert!((weights.content - 0.25).abs() < 1e-9);

        let preferenced = user_with_prefs(&["business"]);
        let weights = adaptive_weights(&preferenced, 50, 0.0, &config);
        assert!((weights.preference - 0.2).abs() < 1e-9);
        assert!((weights.popularity - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_score_bounded_and_complete() {
        let config = RankingConfig::default();
        let ctx = ScoringContext::default();
        let user = user_with_prefs(&["business"]);
        let article = test_article();
        let mut rng = StdRng::seed_from_u64(7);

        let (score, breakdown) = hybrid_score(&user, &article, &ctx, &config, &mut rng);

        assert!(score > 0.0 && score <= 1.05);
        for sub in [
            breakdown.content_score,
            breakdown.collab_score,
            breakdown.popularity_score,
            breakdown.freshness_score,
            breakdown.preference_score,
            breakdown.diversity_score,
        ] {
            let value = sub.expect("scored path fills every sub-score");
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_collaborative_score_averages_liker_similarity() {
        let config = RankingConfig::default();
        let article = test_article();
        let mut user = User::new(Uuid::new_v4());
        user.embedding = Some(vec![1.0; EMBEDDING_DIM]);

        let liker_a = Uuid::new_v4();
        let liker_b = Uuid::new_v4();
        let mut ctx = ScoringContext::default();
        ctx.likers.insert(article.id, vec![liker_a, liker_b]);
        // One identical taste, one orthogonal-ish (negated, clamped to 0).
        ctx.liker_embeddings
            .insert(liker_a, vec![1.0; EMBEDDING_DIM]);
        ctx.liker_embeddings
            .insert(liker_b, vec![-1.0; EMBEDDING_DIM]);

        let score = collaborative_score(&user, &article, &ctx, &config);
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_collaborative_score_zero_without_embedding_or_likers() {
        let config = RankingConfig::default();
        let article = test_article();
        let ctx = ScoringContext::default();

        let no_embedding = User::new(Uuid::new_v4());
        assert_eq!(
            collaborative_score(&no_embedding, &article, &ctx, &config),
            0.0
        );

        let mut embedded = User::new(Uuid::new_v4());
        embedded.embedding = Some(vec![1.0; EMBEDDING_DIM]);
        assert_eq!(
            collaborative_score(&embedded, &article, &ctx, &config),
            0.0
        );
    }
}
