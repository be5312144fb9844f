use std::path::Path;

use crate::domain::entities::classification::ImageFindings;

/// Maps a photo on disk to its single best label and confidence.
///
/// Classification never fails the request: decode or inference problems are
/// reported as an `ImageFindings::Failed` value. Inference is blocking and
/// CPU-bound; callers run it off the async runtime.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image_path: &Path) -> ImageFindings;
}
