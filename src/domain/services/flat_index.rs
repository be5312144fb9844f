use crate::ports::text_encoder::Embeddings;

/// An in-memory flat vector index over the corpus embeddings.
///
/// Nearest-neighbor queries are answered with a brute-force scan: at this
/// corpus size (fewer than 100 vectors) a linear pass beats any approximate
/// or hierarchical structure, and keeps results exact and deterministic.
#[derive(Debug)]
pub struct FlatL2Index {
    dimension: usize,
    vectors: Vec<Embeddings>,
}

/// One search result: the 0-based corpus position and its squared
/// Euclidean distance to the query (monotone with the true distance).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entry_id: usize,
    pub distance: f32,
}

#[derive(thiserror::Error, Debug)]
pub enum FlatIndexError {
    #[error(
        "Vector {position} has dimension {found}, expected {expected}: \
         all indexed vectors must share the encoder dimension"
    )]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },
}

impl FlatL2Index {
    /// Builds the index from vectors aligned positionally with the corpus.
    ///
    /// All vectors must share the same dimension.
    pub fn build(vectors: Vec<Embeddings>) -> Result<Self, FlatIndexError> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);

        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(FlatIndexError::DimensionMismatch {
                    position,
                    expected: dimension,
                    found: vector.len(),
                });
            }
        }

        Ok(Self { dimension, vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the `min(k, len)` nearest vectors, ascending by distance.
    ///
    /// Ties are broken by the lowest entry id, so repeated calls with the
    /// same query always return the same ordering. An empty index returns
    /// an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        debug_assert!(
            self.vectors.is_empty() || query.len() == self.dimension,
            "query dimension must match the index dimension"
        );

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(entry_id, vector)| SearchHit {
                entry_id,
                distance: squared_l2_distance(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.entry_id.cmp(&b.entry_id))
        });
        hits.truncate(k);
        hits
    }
}

fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
