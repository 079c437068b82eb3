use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness only; downstream dependencies are not consulted.
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::health::{health, router};

    #[tokio::test]
    async fn health_is_always_healthy() {
        let Json(payload) = health().await;
        assert_eq!(payload.status, "healthy");
    }

    #[tokio::test]
    async fn health_route_returns_status_json() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body, json!({"status": "healthy"}));
    }
}
