use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Recommendation cache settings. Disabled by default: correctness never
/// depends on the cache, it only trades freshness for latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: None,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Tuned ranking constants. The defaults mirror production tuning; none
/// of these values is derived, so they are all overridable via env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Below this many likes+shares+bookmarks a user is a "new" user for
    /// adaptive weighting, and a cold-start candidate.
    #[serde(default = "default_cold_start_threshold")]
    pub cold_start_threshold: i64,
    /// Below this many interactions the intermediate weight profile applies.
    #[serde(default = "default_moderate_user_threshold")]
    pub moderate_user_threshold: i64,
    /// Freshness decay half-life, in hours (14 days).
    #[serde(default = "default_freshness_half_life_hours")]
    pub freshness_half_life_hours: f64,
    /// Recent-interaction exclusion window, in days.
    #[serde(default = "default_recent_exclusion_days")]
    pub recent_exclusion_days: i64,
    /// Recent-interaction exclusion window under force_fresh, in days.
    #[serde(default = "default_recent_exclusion_days_fresh")]
    pub recent_exclusion_days_fresh: i64,
    /// All-time like/view exclusion window, in days.
    #[serde(default = "default_all_time_exclusion_days")]
    pub all_time_exclusion_days: i64,
    /// All-time exclusion window under force_fresh, in days.
    #[serde(default = "default_all_time_exclusion_days_fresh")]
    pub all_time_exclusion_days_fresh: i64,
    /// Candidate lookback window, in days.
    #[serde(default = "default_candidate_window_days")]
    pub candidate_window_days: i64,
    /// Widened lookback window for sparse data environments, in days.
    #[serde(default = "default_sparse_window_days")]
    pub sparse_window_days: i64,
    /// Fewer site-wide like interactions than this over the past 7 days
    /// means the installation is a sparse data environment.
    #[serde(default = "default_sparse_interaction_threshold")]
    pub sparse_interaction_threshold: i64,
    /// Raw candidates fetched per requested result.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Upper bound of the uniform score jitter.
    #[serde(default = "default_score_jitter")]
    pub score_jitter: f64,
    /// Likers sampled per article for collaborative scoring.
    #[serde(default = "default_max_likers_per_article")]
    pub max_likers_per_article: usize,
    /// Liker embeddings actually averaged per article.
    #[serde(default = "default_max_liker_embeddings")]
    pub max_liker_embeddings: usize,
    /// Fixed RNG seed for reproducible ranking. Leave unset in production;
    /// jitter and shuffles then draw from OS entropy per request.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            cold_start_threshold: default_cold_start_threshold(),
            moderate_user_threshold: default_moderate_user_threshold(),
            freshness_half_life_hours: default_freshness_half_life_hours(),
            recent_exclusion_days: default_recent_exclusion_days(),
            recent_exclusion_days_fresh: default_recent_exclusion_days_fresh(),
            all_time_exclusion_days: default_all_time_exclusion_days(),
            all_time_exclusion_days_fresh: default_all_time_exclusion_days_fresh(),
            candidate_window_days: default_candidate_window_days(),
            sparse_window_days: default_sparse_window_days(),
            sparse_interaction_threshold: default_sparse_interaction_threshold(),
            candidate_multiplier: default_candidate_multiplier(),
            score_jitter: default_score_jitter(),
            max_likers_per_article: default_max_likers_per_article(),
            max_liker_embeddings: default_max_liker_embeddings(),
            rng_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            cache: CacheConfig {
                enabled: std::env::var("RECOMMENDATION_CACHE_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                redis_url: std::env::var("REDIS_URL").ok(),
                ttl_secs: std::env::var("RECOMMENDATION_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_cache_ttl_secs),
            },
            ranking: RankingConfig {
                cold_start_threshold: env_i64(
                    "RANKING_COLD_START_THRESHOLD",
                    default_cold_start_threshold(),
                ),
                moderate_user_threshold: env_i64(
                    "RANKING_MODERATE_USER_THRESHOLD",
                    default_moderate_user_threshold(),
                ),
                freshness_half_life_hours: std::env::var("RANKING_FRESHNESS_HALF_LIFE_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_freshness_half_life_hours),
                recent_exclusion_days: env_i64(
                    "RANKING_RECENT_EXCLUSION_DAYS",
                    default_recent_exclusion_days(),
                ),
                recent_exclusion_days_fresh: env_i64(
                    "RANKING_RECENT_EXCLUSION_DAYS_FRESH",
                    default_recent_exclusion_days_fresh(),
                ),
                all_time_exclusion_days: env_i64(
                    "RANKING_ALL_TIME_EXCLUSION_DAYS",
                    default_all_time_exclusion_days(),
                ),
                all_time_exclusion_days_fresh: env_i64(
                    "RANKING_ALL_TIME_EXCLUSION_DAYS_FRESH",
                    default_all_time_exclusion_days_fresh(),
                ),
                candidate_window_days: env_i64(
                    "RANKING_CANDIDATE_WINDOW_DAYS",
                    default_candidate_window_days(),
                ),
                sparse_window_days: env_i64(
                    "RANKING_SPARSE_WINDOW_DAYS",
                    default_sparse_window_days(),
                ),
                sparse_interaction_threshold: env_i64(
                    "RANKING_SPARSE_INTERACTION_THRESHOLD",
                    default_sparse_interaction_threshold(),
                ),
                candidate_multiplier: std::env::var("RANKING_CANDIDATE_MULTIPLIER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_candidate_multiplier),
                score_jitter: std::env::var("RANKING_SCORE_JITTER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_score_jitter),
                max_likers_per_article: std::env::var("RANKING_MAX_LIKERS_PER_ARTICLE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_max_likers_per_article),
                max_liker_embeddings: std::env::var("RANKING_MAX_LIKER_EMBEDDINGS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_max_liker_embeddings),
                rng_seed: std::env::var("RANKING_RNG_SEED")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cold_start_threshold() -> i64 {
    5
}

fn default_moderate_user_threshold() -> i64 {
    20
}

fn default_freshness_half_life_hours() -> f64 {
    14.0 * 24.0
}

fn default_recent_exclusion_days() -> i64 {
    14
}

fn default_recent_exclusion_days_fresh() -> i64 {
    30
}

fn default_all_time_exclusion_days() -> i64 {
    90
}

fn default_all_time_exclusion_days_fresh() -> i64 {
    180
}

fn default_candidate_window_days() -> i64 {
    30
}

fn default_sparse_window_days() -> i64 {
    90
}

fn default_sparse_interaction_threshold() -> i64 {
    100
}

fn default_candidate_multiplier() -> usize {
    3
}

fn default_score_jitter() -> f64 {
    0.05
}

fn default_max_likers_per_article() -> usize {
    50
}

fn default_max_liker_embeddings() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_defaults_match_tuning() {
        let cfg = RankingConfig::default();
        assert_eq!(cfg.cold_start_threshold, 5);
        assert_eq!(cfg.moderate_user_threshold, 20);
        assert_eq!(cfg.freshness_half_life_hours, 336.0);
        assert_eq!(cfg.recent_exclusion_days, 14);
        assert_eq!(cfg.all_time_exclusion_days, 90);
        assert_eq!(cfg.candidate_multiplier, 3);
        assert!(cfg.rng_seed.is_none());
    }

    #[test]
    fn test_cache_disabled_by_default() {
        let cfg = CacheConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.ttl_secs, 300);
    }
}
