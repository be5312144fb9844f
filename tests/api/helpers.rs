use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::multipart;

use triage_service::{
    configuration::get_configuration,
    domain::entities::classification::ImageFindings,
    ports::{
        completion_client::{CompletionClient, CompletionClientError},
        image_classifier::ImageClassifier,
        text_encoder::{Embeddings, TextEncoder, TextEncoderError},
    },
    startup::{Application, TriageServices},
    telemetry::{get_tracing_subscriber, init_tracing_subscriber},
};

// Ensures that the `tracing` stack is only initialized once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_tracing_subscriber(subscriber);
    } else {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_tracing_subscriber(subscriber);
    };
});

/// Deterministic encoder standing in for the sentence-embedding model.
///
/// Embeds a string as a small byte histogram: enough for the corpus and the
/// query to land in the same space, with no model download in tests.
pub struct StubEncoder;

#[async_trait]
impl TextEncoder for StubEncoder {
    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embeddings>, TextEncoderError> {
        Ok(texts.iter().map(|text| stub_embedding(text)).collect())
    }
}

fn stub_embedding(text: &str) -> Embeddings {
    let mut vector = vec![0f32; 8];
    for (position, byte) in text.bytes().enumerate() {
        vector[position % 8] += byte as f32 / 255.0;
    }
    vector
}

/// Classifier returning a fixed outcome, whatever the uploaded bytes
pub struct StubClassifier {
    pub outcome: ImageFindings,
}

impl ImageClassifier for StubClassifier {
    fn classify(&self, _image_path: &Path) -> ImageFindings {
        self.outcome.clone()
    }
}

/// Completion service stub: canned text, or a canned upstream failure
pub enum StubCompletion {
    Respond(String),
    FailUnavailable,
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, CompletionClientError> {
        match self {
            StubCompletion::Respond(text) => Ok(text.clone()),
            StubCompletion::FailUnavailable => Err(CompletionClientError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            }),
        }
    }
}

/// A completion following the report template to the letter
pub fn compliant_completion() -> String {
    "Patient Report:\n\
     - Date: March 22, 2025\n\
     - Nurse Observations: Patient is pale\n\
     - Visual Findings: Detected: pale skin (Confidence: 0.85)\n\
     - Summary: The patient shows signs of hypoperfusion.\n\
     Probable Treatment Solutions:\n\
     - Check vital signs immediately.\n\
     - Administer oxygen if needed."
        .to_string()
}

pub fn default_services() -> TriageServices {
    services(
        ImageFindings::Detected {
            label: "pale skin".to_string(),
            confidence: 0.85,
        },
        StubCompletion::Respond(compliant_completion()),
    )
}

pub fn services(classifier_outcome: ImageFindings, completion: StubCompletion) -> TriageServices {
    TriageServices {
        encoder: Arc::new(StubEncoder),
        classifier: Arc::new(StubClassifier {
            outcome: classifier_outcome,
        }),
        completion_client: Arc::new(completion),
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
}

/// A test API client / test suite
impl TestApp {
    /// Posts a multipart request to `/analyze`, omitting whichever field is
    /// passed as `None`
    pub async fn post_analyze(
        &self,
        image: Option<(&str, Vec<u8>)>,
        nurse_observations: Option<&str>,
    ) -> reqwest::Response {
        let mut form = multipart::Form::new();

        if let Some((file_name, bytes)) = image {
            form = form.part(
                "image",
                multipart::Part::bytes(bytes)
                    .file_name(file_name.to_string())
                    .mime_str("image/png")
                    .unwrap(),
            );
        }
        if let Some(observations) = nurse_observations {
            form = form.text("nurse_observations", observations.to_string());
        }

        reqwest::Client::new()
            .post(format!("{}/analyze", &self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_health(&self) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/health", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// Launches the server as a background task with the given stub services
///
/// When a tokio runtime is shut down all tasks spawned on it are dropped.
/// tokio::test spins up a new runtime at the beginning of each test case and they shut down at the end of each test case.
/// Therefore no need to implement any clean up logic to avoid leaking resources between test runs
pub async fn spawn_app(services: TriageServices) -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // Uses a random OS port: port 0 is special-cased at the OS level:
        // trying to bind port 0 will trigger an OS scan for an available port which will then be bound to the application.
        c.application.port = 0;
        // Pins the report date so assertions do not depend on the clock
        c.report.date_override = Some("March 22, 2025".to_string());
        c
    };

    // Only one actix-web worker is needed for integration tests
    let application = Application::build_with_services(configuration, Some(1), services)
        .await
        .expect("Failed to build application.");

    let application_port = application.port();

    // Launches the application as a background task
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
    }
}
