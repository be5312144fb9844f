use triage_service::domain::entities::classification::ImageFindings;

use crate::helpers::{
    compliant_completion, default_services, services, spawn_app, StubCompletion,
};

fn fake_image() -> (&'static str, Vec<u8>) {
    ("wound.png", b"not really a png".to_vec())
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_returns_400_when_the_image_is_missing() {
    let app = spawn_app(default_services()).await;

    let response = app.post_analyze(None, Some("Patient is pale")).await;

    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No image provided");
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_returns_400_when_observations_are_missing() {
    let app = spawn_app(default_services()).await;

    let response = app.post_analyze(Some(fake_image()), None).await;

    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Nurse observations are required");
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_returns_400_when_observations_are_blank() {
    let app = spawn_app(default_services()).await;

    let response = app.post_analyze(Some(fake_image()), Some("   ")).await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_returns_the_report_from_a_valid_request() {
    let app = spawn_app(default_services()).await;

    let response = app
        .post_analyze(Some(fake_image()), Some("Patient is pale and dizzy"))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    let report = body["report"].as_str().unwrap();
    assert!(report.starts_with("Patient Report"));
    assert!(report.contains("Probable Treatment Solutions:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_repairs_a_completion_that_ignores_the_template() {
    let deviant = "I think the patient is in shock.\n\
        Summary: Likely hypoperfusion, needs urgent care.\n\
        Probable Treatment Solutions:\n\
        - Lay the patient down.\n\
        - Call emergency services.";
    let app = spawn_app(services(
        ImageFindings::Detected {
            label: "pale skin".to_string(),
            confidence: 0.86,
        },
        StubCompletion::Respond(deviant.to_string()),
    ))
    .await;

    let response = app
        .post_analyze(Some(fake_image()), Some("Patient is pale and clammy"))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    let report = body["report"].as_str().unwrap();
    assert!(report.starts_with("Patient Report:"));
    assert!(report.contains("- Nurse Observations: Patient is pale and clammy"));
    assert!(report.contains("- Visual Findings: Detected: pale skin (Confidence: 0.86)"));
    assert!(report.contains("- Lay the patient down."));
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_completes_even_when_image_analysis_fails() {
    let app = spawn_app(services(
        ImageFindings::Failed("could not decode the image".to_string()),
        StubCompletion::Respond(compliant_completion()),
    ))
    .await;

    let response = app
        .post_analyze(Some(fake_image()), Some("Patient has a swollen ankle"))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["report"].as_str().unwrap().starts_with("Patient Report"));
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_annotates_an_unconfirmed_deep_cut_observation() {
    // A deviant completion forces the repair path, which re-injects the
    // findings string: the mismatch note must survive to the response.
    let app = spawn_app(services(
        ImageFindings::Detected {
            label: "pale skin".to_string(),
            confidence: 0.85,
        },
        StubCompletion::Respond("Summary: needs review.".to_string()),
    ))
    .await;

    let response = app
        .post_analyze(
            Some(fake_image()),
            Some("Patient has heavy bleeding and a deep cut"),
        )
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    let report = body["report"].as_str().unwrap();
    assert!(report.contains("Detected: pale skin (Confidence: 0.85)"));
    assert!(report.contains("may not align with nurse observation of a deep cut"));
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_returns_500_when_the_completion_service_is_down() {
    let app = spawn_app(services(
        ImageFindings::Detected {
            label: "rash".to_string(),
            confidence: 0.88,
        },
        StubCompletion::FailUnavailable,
    ))
    .await;

    let response = app
        .post_analyze(Some(fake_image()), Some("Patient has a rash and fever"))
        .await;

    assert_eq!(500, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to generate the report"));
}
