//! Prometheus counters for the ranking pipeline.

use actix_web::{HttpResponse, Responder};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref FEED_REQUESTS: IntCounter = register_int_counter!(
        "feed_requests_total",
        "Personalized feed requests received"
    )
    .expect("metric registration");
    pub static ref FEED_CACHE_HITS: IntCounter = register_int_counter!(
        "feed_cache_hits_total",
        "Feed requests served from the recommendation cache"
    )
    .expect("metric registration");
    pub static ref FEED_FALLBACKS: IntCounterVec = register_int_counter_vec!(
        "feed_fallbacks_total",
        "Feed pages served by a fallback strategy instead of hybrid scoring",
        &["strategy"]
    )
    .expect("metric registration");
    pub static ref FEED_EMPTY_PAGES: IntCounter = register_int_counter!(
        "feed_empty_pages_total",
        "Feed requests that returned zero articles"
    )
    .expect("metric registration");
    pub static ref FEED_RANKING_SECONDS: Histogram = register_histogram!(
        "feed_ranking_seconds",
        "End-to-end ranking latency per feed request"
    )
    .expect("metric registration");
}

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}
