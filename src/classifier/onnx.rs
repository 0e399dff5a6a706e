use super::{load_labels, rank_top_k, ClassLabels, ClassificationMatch, Classifier, ClassifierError};
use crate::config::{LabelsConfig, ModelConfig, Validatable};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resizes the shorter side to `resize_size`, center crops an
/// `input_size` square and lays it out as a normalized NCHW tensor.
///
/// Only the centered square of the source survives the crop, so it is cut
/// out before resizing. Scratch buffers stay at `resize_size` squared
/// whatever the aspect ratio of the upload.
pub fn preprocess(
    image: &RgbImage,
    resize_size: u32,
    input_size: u32,
) -> Result<Array<f32, Ix4>, ClassifierError> {
    if resize_size < input_size {
        return Err(ClassifierError::Preprocess(format!(
            "resize size {} is smaller than input size {}",
            resize_size, input_size
        )));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ClassifierError::Preprocess("image has no pixels".into()));
    }

    let short_side = width.min(height);
    let square = imageops::crop_imm(
        image,
        (width - short_side) / 2,
        (height - short_side) / 2,
        short_side,
        short_side,
    )
    .to_image();
    let resized = imageops::resize(&square, resize_size, resize_size, FilterType::Triangle);

    let offset = (resize_size - input_size) / 2;
    let cropped = imageops::crop_imm(&resized, offset, offset, input_size, input_size).to_image();

    let side = input_size as usize;
    let mut input = Array::zeros((1, 3, side, side));
    for (x, y, pixel) in cropped.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        for channel in 0..3 {
            input[[0, channel, y, x]] =
                (pixel.0[channel] as f32 / 255. - MEAN[channel]) / STD[channel];
        }
    }

    Ok(input)
}

fn build_session(model_path: &Path) -> Result<Session, ClassifierError> {
    Session::builder()
        .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| ClassifierError::ModelLoad(e.to_string()))
}

/// ONNX image classifier backed by a small pool of sessions.
///
/// Requests pick a session round-robin, so up to `num_instances`
/// classifications run in parallel.
#[derive(Clone)]
pub struct OrtClassifier {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: String,
    labels: Arc<ClassLabels>,
    top_k: usize,
    input_size: u32,
    resize_size: u32,
}

impl OrtClassifier {
    pub fn new(
        model_config: &ModelConfig,
        labels_config: &LabelsConfig,
    ) -> Result<Self, ClassifierError> {
        model_config.validate().map_err(ClassifierError::ModelLoad)?;
        labels_config.validate().map_err(ClassifierError::Labels)?;

        let labels = load_labels(&labels_config.get_path())?;
        tracing::info!("Loaded {} class labels", labels.len());

        let num_instances = model_config.num_instances.max(1);
        let model_path = model_config.get_path();
        let sessions = (0..num_instances)
            .map(|_| build_session(&model_path).map(|s| Arc::new(Mutex::new(s))))
            .collect::<Result<Vec<_>, _>>()?;

        let output_name = sessions[0]
            .lock()
            .map_err(|e| ClassifierError::ModelLoad(format!("session mutex poisoned: {}", e)))?
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ClassifierError::ModelLoad("model declares no outputs".into()))?;

        tracing::info!("Created {} ONNX sessions", num_instances);

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name,
            labels: Arc::new(labels),
            top_k: model_config.top_k,
            input_size: model_config.input_size,
            resize_size: model_config.resize_size,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ClassifierError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ClassifierError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ClassifierError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let (_, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

impl Classifier for OrtClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<ClassificationMatch>, ClassifierError> {
        let input = preprocess(image, self.resize_size, self.input_size)?;
        let logits = self.run_inference(&input)?;
        rank_top_k(&logits, &self.labels, self.top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_shape() {
        let img = RgbImage::from_pixel(100, 300, Rgb([255, 0, 0]));
        let input = preprocess(&img, 256, 224).unwrap();
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_preprocess_normalizes_channels() {
        let img = RgbImage::from_pixel(256, 256, Rgb([255, 0, 0]));
        let input = preprocess(&img, 256, 224).unwrap();

        let red = input[[0, 0, 100, 100]];
        let green = input[[0, 1, 100, 100]];
        assert!((red - (1.0 - MEAN[0]) / STD[0]).abs() < 1e-4);
        assert!((green - (-MEAN[1] / STD[1])).abs() < 1e-4);
    }

    #[test]
    fn test_preprocess_upscales_tiny_images() {
        let img = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let input = preprocess(&img, 256, 224).unwrap();
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_preprocess_extreme_aspect_ratio() {
        let img = RgbImage::from_pixel(1, 200_000, Rgb([0, 255, 0]));
        let input = preprocess(&img, 256, 224).unwrap();

        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        let green = input[[0, 1, 223, 0]];
        assert!((green - (1.0 - MEAN[1]) / STD[1]).abs() < 1e-4);
    }

    #[test]
    fn test_preprocess_keeps_center_of_wide_image() {
        // Left and right thirds are black, the center is white.
        let img = RgbImage::from_fn(900, 300, |x, _| {
            if (300..600).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let input = preprocess(&img, 256, 224).unwrap();

        let white = (1.0 - MEAN[0]) / STD[0];
        assert!((input[[0, 0, 0, 0]] - white).abs() < 1e-4);
        assert!((input[[0, 0, 223, 223]] - white).abs() < 1e-4);
    }

    #[test]
    fn test_preprocess_rejects_inverted_sizes() {
        let img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        assert!(matches!(
            preprocess(&img, 100, 224),
            Err(ClassifierError::Preprocess(_))
        ));
    }
}
