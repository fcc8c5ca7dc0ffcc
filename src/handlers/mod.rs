pub mod feed;
pub mod health;

use actix_web::web;

pub use feed::{get_feed, get_similar_articles};
pub use health::health;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/feed", web::get().to(get_feed))
            .route(
                "/articles/{article_id}/similar",
                web::get().to(get_similar_articles),
            ),
    )
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(crate::metrics::metrics_handler));
}
