//! Exclusion resolver: the set of article ids a user must not see again.
//!
//! Four indexed range queries are unioned, two over a "recent" window and
//! two over an "all-time" window; force_fresh widens both. Lookup failure
//! fails open with an empty set so a feed is never blocked on exclusion
//! bookkeeping.

use chrono::{Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::db::InteractionStore;
use crate::error::Result;
use crate::models::InteractionType;

/// Resolve the exclusion set for one user.
pub async fn resolve(
    interactions: &dyn InteractionStore,
    config: &RankingConfig,
    user_id: Uuid,
    force_fresh: bool,
) -> HashSet<Uuid> {
    match resolve_inner(interactions, config, user_id, force_fresh).await {
        Ok(excluded) => {
            debug!(
                user_id = %user_id,
                excluded = excluded.len(),
                force_fresh,
                "resolved exclusion set"
            );
            excluded
        }
        Err(err) => {
            warn!(
                user_id = %user_id,
                error = %err,
                "exclusion lookup failed, failing open with empty set"
            );
            HashSet::new()
        }
    }
}

async fn resolve_inner(
    interactions: &dyn InteractionStore,
    config: &RankingConfig,
    user_id: Uuid,
    force_fresh: bool,
) -> Result<HashSet<Uuid>> {
    let now = Utc::now();
    let (recent_days, all_time_days) = if force_fresh {
        (
            config.recent_exclusion_days_fresh,
            config.all_time_exclusion_days_fresh,
        )
    } else {
        (config.recent_exclusion_days, config.all_time_exclusion_days)
    };
    let recent_cutoff = now - Duration::days(recent_days);
    let all_time_cutoff = now - Duration::days(all_time_days);

    let mut excluded: HashSet<Uuid> = HashSet::new();

    // Recent explicit positive feedback.
    excluded.extend(
        interactions
            .article_ids_by_user(
                user_id,
                &[
                    InteractionType::Like,
                    InteractionType::Share,
                    InteractionType::Bookmark,
                ],
                recent_cutoff,
            )
            .await?,
    );

    // Recently seen or dismissed.
    excluded.extend(
        interactions
            .article_ids_by_user(
                user_id,
                &[InteractionType::View, InteractionType::Skip],
                recent_cutoff,
            )
            .await?,
    );

    // Long-window likes: a liked article should not resurface for months.
    excluded.extend(
        interactions
            .article_ids_by_user(user_id, &[InteractionType::Like], all_time_cutoff)
            .await?,
    );

    // Long-window views.
    excluded.extend(
        interactions
            .article_ids_by_user(user_id, &[InteractionType::View], all_time_cutoff)
            .await?,
    );

    Ok(excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryInteractionStore;
    use crate::models::Interaction;

    fn interaction(
        user_id: Uuid,
        article_id: Uuid,
        interaction_type: InteractionType,
        days_ago: i64,
    ) -> Interaction {
        Interaction {
            user_id,
            article_id,
            interaction_type,
            created_at: Utc::now() - Duration::days(days_ago),
            read_time_seconds: None,
            strength: None,
        }
    }

    #[tokio::test]
    async fn test_unions_all_four_sources() {
        let store = MemoryInteractionStore::new();
        let config = RankingConfig::default();
        let user = Uuid::new_v4();
        let liked = Uuid::new_v4();
        let viewed = Uuid::new_v4();
        let skipped = Uuid::new_v4();
        let old_like = Uuid::new_v4();

        store
            .insert(&interaction(user, liked, InteractionType::Like, 1))
            .await
            .unwrap();
        store
            .insert(&interaction(user, viewed, InteractionType::View, 2))
            .await
            .unwrap();
        store
            .insert(&interaction(user, skipped, InteractionType::Skip, 3))
            .await
            .unwrap();
        // Outside the 14-day recent window, inside the 90-day like window.
        store
            .insert(&interaction(user, old_like, InteractionType::Like, 40))
            .await
            .unwrap();

        let excluded = resolve(&store, &config, user, false).await;
        assert!(excluded.contains(&liked));
        assert!(excluded.contains(&viewed));
        assert!(excluded.contains(&skipped));
        assert!(excluded.contains(&old_like));
        assert_eq!(excluded.len(), 4);
    }

    #[tokio::test]
    async fn test_windows_widen_under_force_fresh() {
        let store = MemoryInteractionStore::new();
        let config = RankingConfig::default();
        let user = Uuid::new_v4();
        let seen = Uuid::new_v4();

        // A skip 20 days out: past the standard 14-day recent window but
        // inside the 30-day force_fresh window. Skips are not covered by
        // either all-time source.
        store
            .insert(&interaction(user, seen, InteractionType::Skip, 20))
            .await
            .unwrap();

        let standard = resolve(&store, &config, user, false).await;
        assert!(!standard.contains(&seen));

        let fresh = resolve(&store, &config, user, true).await;
        assert!(fresh.contains(&seen));
    }

    #[tokio::test]
    async fn test_other_users_interactions_ignored() {
        let store = MemoryInteractionStore::new();
        let config = RankingConfig::default();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let article = Uuid::new_v4();

        store
            .insert(&interaction(other, article, InteractionType::Like, 1))
            .await
            .unwrap();

        let excluded = resolve(&store, &config, user, false).await;
        assert!(excluded.is_empty());
    }
}
