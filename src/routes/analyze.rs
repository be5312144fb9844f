use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{
    http::{header::ContentType, StatusCode},
    web, HttpResponse, ResponseError,
};
use anyhow::Context;
use serde_json::json;
use tokio::task;
use tracing::info;

use crate::{
    helper::error_chain_fmt,
    ports::{completion_client::CompletionClientError, text_encoder::TextEncoderError},
    startup::TriageContext,
};

/// Multipart body of `POST /analyze`.
///
/// Both fields are required; they are modeled as options so that a missing
/// one is answered with our JSON error shape instead of the extractor's
/// default rejection.
///
/// The uploaded image is streamed to a request-scoped temporary file with a
/// unique name. The file is removed when the form is dropped, on success
/// and on every error path.
#[derive(Debug, MultipartForm)]
pub struct AnalyzeForm {
    pub image: Option<TempFile>,
    pub nurse_observations: Option<Text<String>>,
}

/// Orchestrates one triage request: classify the image, retrieve the
/// nearest guidelines for the combined observations, and ask the
/// completion service for the structured report.
#[tracing::instrument(name = "Analyze patient", skip(context, form))]
pub async fn analyze(
    context: web::Data<TriageContext>,
    MultipartForm(form): MultipartForm<AnalyzeForm>,
) -> Result<HttpResponse, AnalyzeError> {
    let image = form.image.as_ref().ok_or(AnalyzeError::MissingImage)?;

    let nurse_observations = form
        .nurse_observations
        .as_ref()
        .map(|text| text.0.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(AnalyzeError::MissingObservations)?;

    // Classification is blocking CPU work: run it off the async runtime.
    // The temp file outlives the task: it is owned by `form` until the
    // handler returns.
    let classifier = context.classifier.clone();
    let image_path = image.file.path().to_path_buf();
    let findings = task::spawn_blocking(move || classifier.classify(&image_path))
        .await
        .context("The image classification task was aborted")?;
    info!(%findings, "Image analysis done");

    let findings_text = context
        .composer
        .findings_text(&nurse_observations, &findings);
    let query = context
        .composer
        .retrieval_query(&nurse_observations, &findings, &findings_text);

    let query_embedding = context.encoder.encode(&query).await?;
    let guidelines = context
        .library
        .retrieve(&query_embedding, context.retrieved_guidelines);
    info!(retrieved = guidelines.len(), "Retrieved nearest guidelines");

    let prompt = context
        .composer
        .build_prompt(&nurse_observations, &findings_text, &guidelines);

    let completion = context
        .completion_client
        .complete(&prompt.system, &prompt.user)
        .await?;

    let report = context
        .composer
        .render_report(&completion, &nurse_observations, &findings_text);

    Ok(HttpResponse::Ok().json(json!({ "report": report })))
}

#[derive(thiserror::Error)]
pub enum AnalyzeError {
    #[error("No image provided")]
    MissingImage,
    #[error("Nurse observations are required")]
    MissingObservations,
    #[error("Failed to embed the retrieval query: {0}")]
    EncoderError(#[from] TextEncoderError),
    #[error("Failed to generate the report: {0}")]
    CompletionError(#[from] CompletionClientError),
    #[error(transparent)]
    InternalError(#[from] anyhow::Error),
}

impl std::fmt::Debug for AnalyzeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for AnalyzeError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingImage | AnalyzeError::MissingObservations => {
                StatusCode::BAD_REQUEST
            }
            AnalyzeError::EncoderError(_)
            | AnalyzeError::CompletionError(_)
            | AnalyzeError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tracing::instrument(name = "Response error from analyze handler", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
