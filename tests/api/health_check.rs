use crate::helpers::{default_services, spawn_app};

#[tokio::test(flavor = "multi_thread")]
async fn health_check_reports_healthy() {
    let app = spawn_app(default_services()).await;

    let response = app.get_health().await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}
