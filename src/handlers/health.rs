use actix_web::{HttpResponse, Responder};
use serde_json::json;

/// GET /health
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "feed-ranking-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
