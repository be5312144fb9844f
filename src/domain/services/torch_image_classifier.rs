use std::path::Path;

use image::imageops::FilterType;
use tch::{CModule, Kind, Tensor};
use tracing::info;

use crate::{
    configuration::ImageModelSettings,
    domain::entities::classification::ImageFindings,
    helper::error_chain_fmt,
    ports::image_classifier::ImageClassifier,
};

/// Side length of the square input the pretrained model expects
const INPUT_SIZE: u32 = 224;

/// Image classifier backed by a TorchScript export of the pretrained model.
///
/// Preprocessing matches the model's training contract: center-crop to a
/// 224x224 RGB square, rescale pixel values to [-1, 1].
pub struct TorchImageClassifier {
    module: CModule,
    labels: Vec<String>,
}

#[derive(thiserror::Error)]
pub enum TorchImageClassifierError {
    #[error("Failed to load the TorchScript module: {0}")]
    ModuleError(#[from] tch::TchError),
    #[error("Failed to read the label file: {0}")]
    LabelFileError(#[from] std::io::Error),
    #[error("The label file contains no labels")]
    EmptyLabelFile,
}

impl std::fmt::Debug for TorchImageClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl TorchImageClassifier {
    /// Loads the module and its label list.
    ///
    /// Called once at startup; any failure here is fatal so the service
    /// never runs with a silently missing model.
    #[tracing::instrument(name = "Loading image classification model")]
    pub fn load(settings: &ImageModelSettings) -> Result<Self, TorchImageClassifierError> {
        let module = CModule::load(&settings.module_path)?;
        let labels = load_labels(&settings.labels_path)?;

        info!(classes = labels.len(), "Image classification model loaded ✅");

        Ok(Self { module, labels })
    }

    fn infer(&self, image_path: &Path) -> Result<(String, f32), ImageAnalysisError> {
        let image = image::open(image_path)?
            .resize_to_fill(INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3)
            .to_rgb8();

        // CHW layout, pixel values rescaled from [0, 255] to [-1, 1]
        let side = INPUT_SIZE as usize;
        let mut data = vec![0f32; 3 * side * side];
        for (x, y, pixel) in image.enumerate_pixels() {
            for channel in 0..3 {
                data[channel * side * side + y as usize * side + x as usize] =
                    pixel[channel] as f32 / 127.5 - 1.0;
            }
        }

        let input = Tensor::from_slice(&data).view([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64]);

        let output = tch::no_grad(|| self.module.forward_ts(&[input]))?;
        let probabilities = output.softmax(-1, Kind::Float).squeeze();

        let class_index = probabilities.argmax(-1, false).int64_value(&[]);
        let confidence = probabilities.double_value(&[class_index]) as f32;

        let label = self
            .labels
            .get(class_index as usize)
            .ok_or(ImageAnalysisError::UnknownClass(class_index))?;

        Ok((label.clone(), confidence))
    }
}

impl ImageClassifier for TorchImageClassifier {
    /// Runs inference and folds any failure into an `ImageFindings::Failed`
    /// value: a bad image degrades the request, it does not abort it.
    #[tracing::instrument(name = "Classifying image", skip(self))]
    fn classify(&self, image_path: &Path) -> ImageFindings {
        match self.infer(image_path) {
            Ok((label, confidence)) => ImageFindings::Detected { label, confidence },
            Err(error) => ImageFindings::Failed(error.to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum ImageAnalysisError {
    #[error("could not decode the image: {0}")]
    DecodeError(#[from] image::ImageError),
    #[error("inference failed: {0}")]
    InferenceError(#[from] tch::TchError),
    #[error("class index {0} has no label")]
    UnknownClass(i64),
}

/// Reads the label file, one class name per line.
///
/// Label files exported alongside the model prefix each name with its class
/// index ("3 pale skin"): the numeric prefix is stripped here, once, so the
/// rest of the system only ever sees clean label text.
fn load_labels(path: &str) -> Result<Vec<String>, TorchImageClassifierError> {
    let labels: Vec<String> = std::fs::read_to_string(path)?
        .lines()
        .map(|line| strip_index_prefix(line.trim()).to_string())
        .filter(|label| !label.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(TorchImageClassifierError::EmptyLabelFile);
    }

    Ok(labels)
}

fn strip_index_prefix(label: &str) -> &str {
    match label.split_once(' ') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => {
            rest.trim_start()
        }
        _ => label,
    }
}
