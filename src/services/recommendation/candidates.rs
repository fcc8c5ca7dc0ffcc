//! Candidate selector: bounded, randomized, time-windowed fetch of raw
//! candidates, honoring the exclusion set and the cursor watermark.

use chrono::{Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::db::{ArticleQuery, ArticleStore, CandidateOrder, InteractionStore};
use crate::error::Result;
use crate::models::Article;
use crate::services::recommendation::cursor::Cursor;

/// Content type the client can filter on. Video content is not ingested,
/// so "videos" legitimately yields an empty feed rather than an error.
pub const CONTENT_TYPE_VIDEOS: &str = "videos";

/// True when the installation has too little recent engagement for the
/// standard candidate window. A failed check assumes sparse: widening the
/// window on error can only make result sets larger.
pub async fn is_sparse_data_environment(
    interactions: &dyn InteractionStore,
    config: &RankingConfig,
) -> bool {
    let week_ago = Utc::now() - Duration::days(7);
    match interactions.count_site_wide_since(week_ago).await {
        Ok(count) => count < config.sparse_interaction_threshold,
        Err(err) => {
            warn!(error = %err, "sparse-environment check failed, assuming sparse");
            true
        }
    }
}

/// Fetch the raw candidate pool for scoring. Over-fetches by the
/// configured multiplier since diversity filtering discards candidates.
pub async fn select(
    articles: &dyn ArticleStore,
    interactions: &dyn InteractionStore,
    config: &RankingConfig,
    exclude_ids: &HashSet<Uuid>,
    content_type: &str,
    count: usize,
    cursor: Option<&Cursor>,
) -> Result<Vec<Article>> {
    if content_type == CONTENT_TYPE_VIDEOS {
        return Ok(Vec::new());
    }

    let days_back = if is_sparse_data_environment(interactions, config).await {
        config.sparse_window_days
    } else {
        config.candidate_window_days
    };

    let limit = count.saturating_mul(config.candidate_multiplier).max(count) as i64;
    let query = ArticleQuery {
        published_after: Some(Utc::now() - Duration::days(days_back)),
        exclude_ids: exclude_ids.iter().copied().collect(),
        id_after: cursor.map(|c| c.article_id),
        order: CandidateOrder::RecencyWeighted,
        limit,
        ..Default::default()
    };

    let mut candidates = articles.query(&query).await?;

    // Exclusions are enforced inside the store query; this re-check only
    // exists to surface a store that stops honoring the contract.
    let before = candidates.len();
    candidates.retain(|a| !exclude_ids.contains(&a.id));
    if candidates.len() != before {
        warn!(
            leaked = before - candidates.len(),
            "article store returned excluded candidates"
        );
    }

    debug!(
        candidates = candidates.len(),
        days_back,
        excluded = exclude_ids.len(),
        "selected candidate pool"
    );

    Ok(candidates)
}
