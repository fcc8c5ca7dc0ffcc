//! Ranking pipeline: exclusion resolution, candidate selection,
//! cold-start branching, hybrid scoring, diversity filtering and the
//! fallback ladder, assembled behind one service entry point.

pub mod candidates;
pub mod cursor;
pub mod diversity;
pub mod exclusion;
pub mod fallback;
pub mod scoring;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{cache_key, RecommendationCache};
use crate::config::RankingConfig;
use crate::db::{ArticleStore, InteractionStore, UserStore};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    Article, InteractionType, RankedArticle, RecommendationMetadata, User,
};
use crate::services::recommendation::candidates::CONTENT_TYPE_VIDEOS;
use crate::services::recommendation::cursor::Cursor;
use crate::services::recommendation::scoring::ScoringContext;

pub struct RecommendationService {
    articles: Arc<dyn ArticleStore>,
    interactions: Arc<dyn InteractionStore>,
    users: Arc<dyn UserStore>,
    cache: Arc<dyn RecommendationCache>,
    cache_ttl_secs: u64,
    config: RankingConfig,
}

impl RecommendationService {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        interactions: Arc<dyn InteractionStore>,
        users: Arc<dyn UserStore>,
        cache: Arc<dyn RecommendationCache>,
        cache_ttl_secs: u64,
        config: RankingConfig,
    ) -> Self {
        Self {
            articles,
            interactions,
            users,
            cache,
            cache_ttl_secs,
            config,
        }
    }

    pub fn user_store(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Rank a personalized feed page. Never errors: every failure inside
    /// the pipeline degrades to a fallback tier, and the worst case is an
    /// empty page on an empty catalog.
    pub async fn get_personalized_recommendations(
        &self,
        user: &User,
        limit: usize,
        diversify: bool,
        content_type: &str,
        cursor_token: Option<&str>,
        force_fresh: bool,
    ) -> Vec<RankedArticle> {
        metrics::FEED_REQUESTS.inc();
        let timer = metrics::FEED_RANKING_SECONDS.start_timer();

        // Video content is not ingested; an empty feed is the contract,
        // not a failure to route around.
        if content_type == CONTENT_TYPE_VIDEOS {
            timer.observe_duration();
            return Vec::new();
        }

        let cursor = cursor_token.and_then(cursor::decode);

        let key = cache_key(
            user.id,
            limit,
            diversify,
            content_type,
            cursor_token,
            force_fresh,
        );
        if !force_fresh {
            if let Some(page) = self.cache.get(&key).await {
                metrics::FEED_CACHE_HITS.inc();
                timer.observe_duration();
                return page;
            }
        }

        let mut rng = self.request_rng();
        let excluded = exclusion::resolve(
            self.interactions.as_ref(),
            &self.config,
            user.id,
            force_fresh,
        )
        .await;

        let interaction_count = match self
            .interactions
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
                warn!(user_id = %user.id, error = %err, "interaction count failed, treating as zero");
                0
            }
        };

        let mut page = if fallback::is_cold_start(user, interaction_count, &self.config) {
            debug!(user_id = %user.id, "cold start user, serving fallback feed");
            metrics::FEED_FALLBACKS
                .with_label_values(&["cold_start"])
                .inc();
            fallback::cold_start_recommendations(
                self.articles.as_ref(),
                &self.config,
                user,
                &excluded,
                cursor.as_ref(),
                limit,
                &mut rng,
            )
            .await
        } else {
            match self
                .personalized(
                    user,
                    &excluded,
                    limit,
                    diversify,
                    content_type,
                    cursor.as_ref(),
                    &mut rng,
                )
                .await
            {
                Ok(page) if !page.is_empty() => page,
                Ok(_) => {
                    debug!(user_id = %user.id, "no scored candidates, serving diverse trending");
                    metrics::FEED_FALLBACKS
                        .with_label_values(&["diverse_trending"])
                        .inc();
                    fallback::diverse_trending(
                        self.articles.as_ref(),
                        &self.config,
                        &excluded,
                        cursor.as_ref(),
                        limit,
                        &mut rng,
                    )
                    .await
                }
                Err(err) => {
                    warn!(user_id = %user.id, error = %err, "ranking pipeline failed, serving diverse trending");
                    metrics::FEED_FALLBACKS
                        .with_label_values(&["diverse_trending"])
                        .inc();
                    fallback::diverse_trending(
                        self.articles.as_ref(),
                        &self.config,
                        &excluded,
                        cursor.as_ref(),
                        limit,
                        &mut rng,
                    )
                    .await
                }
            }
        };

        // Last line of defense: nothing excluded leaves the service,
        // whichever path produced the page.
        page.retain(|r| !excluded.contains(&r.article.id));
        page.truncate(limit);

        if page.is_empty() {
            metrics::FEED_EMPTY_PAGES.inc();
        } else {
            self.cache.put(&key, &page, self.cache_ttl_secs).await;
        }

        timer.observe_duration();
        page
    }

    async fn personalized(
        &self,
        user: &User,
        excluded: &HashSet<Uuid>,
        limit: usize,
        diversify: bool,
        content_type: &str,
        cursor: Option<&Cursor>,
        rng: &mut StdRng,
    ) -> Result<Vec<RankedArticle>> {
        let pool = candidates::select(
            self.articles.as_ref(),
            self.interactions.as_ref(),
            &self.config,
            excluded,
            content_type,
            limit,
            cursor,
        )
        .await?;

        if pool.is_empty() {
            return Ok(Vec::new());
        }

        let ctx = ScoringContext::build(
            user,
            &pool,
            self.articles.as_ref(),
            self.interactions.as_ref(),
            self.users.as_ref(),
            &self.config,
        )
        .await;

        let mut scored: Vec<(Article, f64, crate::models::ScoreBreakdown)> = pool
            .into_iter()
            .map(|article| {
                let (score, breakdown) =
                    scoring::hybrid_score(user, &article, &ctx, &self.config, &mut *rng);
                (article, score, breakdown)
            })
            .filter(|(_, score, _)| score.is_finite())
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let ranked: Vec<RankedArticle> = scored
            .into_iter()
            .map(|(article, score, breakdown)| {
                let reason = fallback::recommendation_reason(&breakdown, &article);
                RankedArticle {
                    metadata: RecommendationMetadata {
                        reason,
                        confidence: score.min(0.95),
                        position_score: 0.0,
                        scores: breakdown,
                    },
                    article,
                }
            })
            .collect();

        let mut page = if diversify {
            diversity::apply(ranked, limit)
        } else {
            let mut page = ranked;
            page.truncate(limit);
            page
        };

        for (i, item) in page.iter_mut().enumerate() {
            item.metadata.position_score = 1.0 - (i as f64 * 0.01);
        }

        Ok(page)
    }

    /// Articles nearest the given one in embedding space. Empty when the
    /// source article has no usable embedding.
    pub async fn similar_articles(&self, article_id: Uuid, limit: usize) -> Result<Vec<Article>> {
        let article = self
            .articles
            .get_by_id(article_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("article {} not found", article_id)))?;

        let Some(embedding) = article.valid_embedding() else {
            return Ok(Vec::new());
        };

        self.articles
            .similarity_search(embedding, Some(article_id), limit as i64)
            .await
    }

    fn request_rng(&self) -> StdRng {
        match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Build the next-page cursor for a served page. The watermark is the
/// page's maximum article id, so cursor chaining can never repeat an
/// article; it may skip articles whose ids sort below the watermark (see
/// the cursor module).
pub fn next_cursor(page: &[RankedArticle]) -> Option<String> {
    let watermark = page.iter().max_by_key(|r| r.article.id)?;
    Some(cursor::encode(&Cursor {
        article_id: watermark.article.id,
        score: watermark.metadata.confidence,
        timestamp: watermark
            .article
            .published_at
            .unwrap_or_else(chrono::Utc::now),
    }))
}
