use std::{net::TcpListener, sync::Arc};

use actix_web::{
    dev::Server,
    web::{self, Data},
    App, HttpServer,
};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::{
    configuration::Settings,
    domain::{
        entities::guideline::{load_corpus, GuidelineCorpusError},
        services::{
            guideline_library::{GuidelineLibrary, GuidelineLibraryError},
            report_composer::ReportComposer,
            sentence_embeddings::{SentenceEmbeddingsService, SentenceEmbeddingsServiceError},
            torch_image_classifier::{TorchImageClassifier, TorchImageClassifierError},
        },
    },
    ports::{
        completion_client::CompletionClient, image_classifier::ImageClassifier,
        text_encoder::{TextEncoder, TextEncoderError},
    },
    repositories::chat_completion_openai_repository::{
        ChatCompletionOpenAiRepository, ChatCompletionOpenAiRepositoryError,
    },
    routes::{analyze, health_check},
};

/// The immutable per-process context handed to the request handlers.
///
/// Everything in here is read-only after startup and safely shared across
/// actix-web workers; per-request state never goes through it.
pub struct TriageContext {
    pub library: GuidelineLibrary,
    pub encoder: Arc<dyn TextEncoder>,
    pub classifier: Arc<dyn ImageClassifier>,
    pub completion_client: Arc<dyn CompletionClient>,
    pub composer: ReportComposer,
    /// Top-k for guideline retrieval
    pub retrieved_guidelines: usize,
}

/// The collaborators behind the ports.
///
/// `Application::build` wires the production implementations; tests inject
/// stubs here to exercise the HTTP surface without any model on disk.
pub struct TriageServices {
    pub encoder: Arc<dyn TextEncoder>,
    pub classifier: Arc<dyn ImageClassifier>,
    pub completion_client: Arc<dyn CompletionClient>,
}

/// Holds the newly built server, and some useful properties
pub struct Application {
    server: Server,
    port: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationBuildError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    CorpusError(#[from] GuidelineCorpusError),
    #[error(transparent)]
    EmbeddingsServiceError(#[from] SentenceEmbeddingsServiceError),
    #[error("Failed to embed the guideline corpus: {0}")]
    CorpusEmbeddingError(#[from] TextEncoderError),
    #[error(transparent)]
    LibraryError(#[from] GuidelineLibraryError),
    #[error(transparent)]
    ClassifierError(#[from] TorchImageClassifierError),
    #[error(transparent)]
    CompletionRepositoryError(#[from] ChatCompletionOpenAiRepositoryError),
}

impl Application {
    /// Builds the application with the production models.
    ///
    /// Loading is fail-fast: a corpus, embedding-model or image-model
    /// problem aborts startup here rather than degrading every request.
    ///
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building application", skip(settings))]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationBuildError> {
        let encoder = Arc::new(SentenceEmbeddingsService::spawn().await?);
        let classifier = Arc::new(TorchImageClassifier::load(&settings.image_model)?);
        let completion_client = Arc::new(ChatCompletionOpenAiRepository::new(&settings.generation)?);

        Self::build_with_services(
            settings,
            nb_workers,
            TriageServices {
                encoder,
                classifier,
                completion_client,
            },
        )
        .await
    }

    /// Builds the application around injected collaborators.
    ///
    /// The guideline corpus is loaded and embedded here, whatever the
    /// encoder implementation, so the index invariant (one vector per
    /// guideline) holds in tests too.
    #[tracing::instrument(name = "Building application with services", skip(settings, services))]
    pub async fn build_with_services(
        settings: Settings,
        nb_workers: Option<usize>,
        services: TriageServices,
    ) -> Result<Self, ApplicationBuildError> {
        let corpus = load_corpus()?;
        let contexts: Vec<String> = corpus.iter().map(|entry| entry.context.clone()).collect();
        let embeddings = services.encoder.encode_batch(contexts).await?;
        let library = GuidelineLibrary::build(corpus, embeddings)?;

        let context = TriageContext {
            library,
            encoder: services.encoder,
            classifier: services.classifier,
            completion_client: services.completion_client,
            composer: ReportComposer::new(&settings.report),
            retrieved_guidelines: settings.report.retrieved_guidelines,
        };

        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr().unwrap().port();

        let server = run(listener, nb_workers, context)?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// This function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        self.server.await
    }
}

/// listener: the consumer binds their own port
///
/// TracingLogger middleware: helps collecting telemetry data.
/// It generates a unique identifier for each incoming request: `request_id`.
///
/// # Parameters
/// - nb_workers: number of actix-web workers
///   if `None`, the number of available physical CPUs is used as the worker count.
pub fn run(
    listener: TcpListener,
    nb_workers: Option<usize>,
    context: TriageContext,
) -> Result<Server, std::io::Error> {
    // Wraps the context in a `actix_web::Data` (`Arc`) to be able to
    // register it and access it from handlers, shared among all threads.
    let context = Data::new(context);

    let server = HttpServer::new(move || {
        info!("Starting actix-web worker");

        App::new()
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(health_check))
            .route("/analyze", web::post().to(analyze))
            .app_data(context.clone())
    })
    .listen(listener)?;

    // If no workers were set, use the actix-web settings (number of workers = number of physical CPUs)
    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    // No await
    Ok(server.run())
}
