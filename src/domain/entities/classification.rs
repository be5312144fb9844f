/// Outcome of the image classification stage.
///
/// The classifier is an auxiliary signal: a failure degrades the retrieval
/// query instead of aborting the request, so the outcome is a value and
/// never an error that propagates past the stage boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageFindings {
    /// The single highest-probability class and its confidence, in [0, 1]
    Detected { label: String, confidence: f32 },
    /// No image was submitted with the request
    NoImage,
    /// The image could not be decoded or inference failed
    Failed(String),
}

impl ImageFindings {
    /// Whether a usable detection was produced.
    ///
    /// Callers fold `NoImage`/`Failed` outcomes into downstream text as-is,
    /// without treating them as detections.
    pub fn is_detection(&self) -> bool {
        matches!(self, ImageFindings::Detected { .. })
    }
}

impl std::fmt::Display for ImageFindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFindings::Detected { label, confidence } => {
                write!(f, "Detected: {} (Confidence: {:.2})", label, confidence)
            }
            ImageFindings::NoImage => write!(f, "No image provided"),
            ImageFindings::Failed(reason) => write!(f, "Error in image analysis: {}", reason),
        }
    }
}
