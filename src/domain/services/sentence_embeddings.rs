use async_trait::async_trait;
use rust_bert::{
    pipelines::sentence_embeddings::{SentenceEmbeddingsBuilder, SentenceEmbeddingsModelType},
    RustBertError,
};
use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};
use tokio::{sync::oneshot, task};
use tracing::{debug, info};

use crate::{
    helper::error_chain_fmt,
    ports::text_encoder::{Embeddings, TextEncoder, TextEncoderError},
};

/// Service generating sentence embeddings with a pretrained model available
/// from Hugging Face.
///
/// Using model AllMiniLmL6V2: maps sentences to a 384 dimensional dense
/// vector space under Euclidean distance.
///
/// The model runs on a dedicated OS thread: running extensive calculations
/// inside a future should be avoided, so async callers talk to the runner
/// through a channel and await the result on a oneshot.
pub struct SentenceEmbeddingsService {
    sender_to_runner: mpsc::SyncSender<RunnerMessage>,
    _thread_handle: JoinHandle<()>,
}

impl SentenceEmbeddingsService {
    /// Spawns the embeddings runner and waits until its model is loaded.
    ///
    /// A model-load failure is reported here, at startup, instead of
    /// surfacing on the first request.
    #[tracing::instrument(name = "Spawning sentence embeddings service")]
    pub async fn spawn() -> Result<Self, SentenceEmbeddingsServiceError> {
        let (sender, receiver) = mpsc::sync_channel(100);
        let (ready_sender, ready_receiver) = oneshot::channel();

        let handle = thread::spawn(move || Self::runner(receiver, ready_sender));

        ready_receiver
            .await
            .map_err(|_| SentenceEmbeddingsServiceError::RunnerStopped)??;

        Ok(Self {
            sender_to_runner: sender,
            _thread_handle: handle,
        })
    }

    /// The embeddings generator runner itself.
    ///
    /// Loads the model, signals readiness (or the load error) once, then
    /// serves encoding requests until every sender is dropped.
    #[tracing::instrument(name = "Embeddings runner", skip(receiver, ready_sender))]
    fn runner(
        receiver: mpsc::Receiver<RunnerMessage>,
        ready_sender: oneshot::Sender<Result<(), SentenceEmbeddingsServiceError>>,
    ) {
        let model = match SentenceEmbeddingsBuilder::remote(SentenceEmbeddingsModelType::AllMiniLmL6V2)
            .create_model()
        {
            Ok(model) => {
                // The service is dropped if the receiver is gone: nothing to serve
                if ready_sender.send(Ok(())).is_err() {
                    return;
                }
                info!("Embeddings model loaded ✅");
                model
            }
            Err(error) => {
                let _ = ready_sender.send(Err(error.into()));
                return;
            }
        };

        while let Ok((sentences, response_sender)) = receiver.recv() {
            let sentences: Vec<&str> = sentences.iter().map(String::as_str).collect();
            let embeddings = model.encode(&sentences).map_err(|e| e.to_string());

            // An encoding caller may have given up (request aborted): not an error
            let _ = response_sender.send(embeddings);
        }

        debug!("Embeddings runner stopping: all senders dropped");
    }
}

#[async_trait]
impl TextEncoder for SentenceEmbeddingsService {
    #[tracing::instrument(name = "Generate embeddings", skip(self, texts), fields(batch_size = texts.len()))]
    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embeddings>, TextEncoderError> {
        let (sender, receiver) = oneshot::channel();

        task::block_in_place(|| self.sender_to_runner.send((texts, sender)))
            .map_err(|_| TextEncoderError::RunnerUnavailable)?;

        receiver
            .await
            .map_err(|_| TextEncoderError::RunnerUnavailable)?
            .map_err(TextEncoderError::ModelError)
    }
}

#[derive(thiserror::Error)]
pub enum SentenceEmbeddingsServiceError {
    #[error("Embeddings model error: {0}")]
    ModelError(#[from] RustBertError),
    #[error("The embeddings runner stopped before signaling readiness")]
    RunnerStopped,
}

impl std::fmt::Debug for SentenceEmbeddingsServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Message type for the internal channel: input sentences and a sender for
/// the generated embeddings (or the encoding error message)
type RunnerMessage = (
    Vec<String>,
    oneshot::Sender<Result<Vec<Embeddings>, String>>,
);
