use serde::{Deserialize, Serialize};

use crate::helper::error_chain_fmt;

/// The clinical guideline corpus, embedded at compile time.
///
/// Each entry is a (condition-context, example-input, example-output) triple.
/// The example fields document how a guideline was used during prompting and
/// are kept for few-shot experimentation; retrieval only embeds `context`.
const CORPUS_JSON: &str = include_str!("../../../data/guidelines.json");

/// One retrievable clinical guideline.
///
/// Entries are identified by their 0-based position in the corpus: the
/// vector index stores embeddings in the same order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuidelineEntry {
    pub context: String,
    #[serde(rename = "input")]
    pub example_input: String,
    #[serde(rename = "output")]
    pub example_output: String,
}

#[derive(thiserror::Error)]
pub enum GuidelineCorpusError {
    #[error("Failed to parse the embedded guideline corpus: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("The guideline corpus is empty")]
    EmptyCorpus,
}

impl std::fmt::Debug for GuidelineCorpusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Loads the embedded corpus.
///
/// Called once at startup; a malformed or empty corpus is fatal.
pub fn load_corpus() -> Result<Vec<GuidelineEntry>, GuidelineCorpusError> {
    let entries: Vec<GuidelineEntry> = serde_json::from_str(CORPUS_JSON)?;

    if entries.is_empty() {
        return Err(GuidelineCorpusError::EmptyCorpus);
    }

    Ok(entries)
}
