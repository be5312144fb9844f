use actix_web::HttpResponse;
use serde_json::json;

/// Liveness only: answers healthy as soon as the process is serving.
///
/// It does not verify that the backing models loaded correctly; startup is
/// where a missing model is fatal.
#[tracing::instrument(name = "Health check handler")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}
