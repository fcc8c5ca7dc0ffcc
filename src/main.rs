use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_ranking::cache::{NoopCache, RecommendationCache, RedisCache};
use feed_ranking::config::Config;
use feed_ranking::db::{PgArticleStore, PgInteractionStore, PgUserStore};
use feed_ranking::handlers;
use feed_ranking::services::RecommendationService;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_line_number(true)
                .with_file(true),
        )
        .init();

    let config = Config::from_env().map_err(|err| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("config error: {}", err))
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|err| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("database connection failed: {}", err),
            )
        })?;

    let cache: Arc<dyn RecommendationCache> = if config.cache.enabled {
        match &config.cache.redis_url {
            Some(url) => match RedisCache::connect(url).await {
                Ok(cache) => {
                    info!("recommendation cache enabled (redis)");
                    Arc::new(cache)
                }
                Err(err) => {
                    warn!(error = %err, "redis unavailable, running without cache");
                    Arc::new(NoopCache)
                }
            },
            None => {
                warn!("cache enabled but REDIS_URL unset, running without cache");
                Arc::new(NoopCache)
            }
        }
    } else {
        Arc::new(NoopCache)
    };

    let service = web::Data::new(RecommendationService::new(
        Arc::new(PgArticleStore::new(pool.clone())),
        Arc::new(PgInteractionStore::new(pool.clone())),
        Arc::new(PgUserStore::new(pool)),
        cache,
        config.cache.ttl_secs,
        config.ranking.clone(),
    ));

    let port = config.app.port;
    info!(port, env = %config.app.env, "starting feed-ranking-service");

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .configure(handlers::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
