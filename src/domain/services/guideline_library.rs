use tracing::info;

use crate::{
    domain::{
        entities::guideline::GuidelineEntry,
        services::flat_index::{FlatIndexError, FlatL2Index},
    },
    helper::error_chain_fmt,
    ports::text_encoder::Embeddings,
};

/// The guideline corpus paired with its vector index.
///
/// Read-only after construction. Invariant: the index holds exactly one
/// vector per corpus entry, in corpus order, so a search hit's entry id is
/// directly a corpus position.
#[derive(Debug)]
pub struct GuidelineLibrary {
    entries: Vec<GuidelineEntry>,
    index: FlatL2Index,
}

#[derive(thiserror::Error)]
pub enum GuidelineLibraryError {
    #[error(
        "Corpus/index size mismatch: {corpus_size} guidelines but {index_size} vectors were embedded"
    )]
    SizeMismatch {
        corpus_size: usize,
        index_size: usize,
    },
    #[error(transparent)]
    IndexError(#[from] FlatIndexError),
}

impl std::fmt::Debug for GuidelineLibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl GuidelineLibrary {
    #[tracing::instrument(name = "Building guideline library", skip(entries, embeddings))]
    pub fn build(
        entries: Vec<GuidelineEntry>,
        embeddings: Vec<Embeddings>,
    ) -> Result<Self, GuidelineLibraryError> {
        if entries.len() != embeddings.len() {
            return Err(GuidelineLibraryError::SizeMismatch {
                corpus_size: entries.len(),
                index_size: embeddings.len(),
            });
        }

        let index = FlatL2Index::build(embeddings)?;

        info!(
            guidelines = entries.len(),
            dimension = index.dimension(),
            "Guideline library ready"
        );

        Ok(Self { entries, index })
    }

    /// Returns the contexts of the `k` guidelines nearest to the query
    /// embedding, most relevant first.
    pub fn retrieve(&self, query_embedding: &[f32], k: usize) -> Vec<&GuidelineEntry> {
        self.index
            .search(query_embedding, k)
            .into_iter()
            .map(|hit| &self.entries[hit.entry_id])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
