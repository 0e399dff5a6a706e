mod labels;
mod onnx;

pub use labels::{load_labels, ClassLabels};
pub use onnx::OrtClassifier;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("failed to load labels: {0}")]
    Labels(String),
    #[error("failed to preprocess image: {0}")]
    Preprocess(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced {actual} scores for {expected} labels")]
    OutputShape { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMatch {
    pub name: String,
    pub score: f64,
}

/// A decoded image goes in, the `top_k` most likely labels come out,
/// best first.
///
/// Implementations are loaded once at startup and shared by every request,
/// so `classify` must not keep per-request state. It is called from the
/// blocking thread pool.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, image: &RgbImage) -> Result<Vec<ClassificationMatch>, ClassifierError>;
}

/// Softmax over `logits`, then the `top_k` highest entries in descending
/// order. Ties keep label order.
pub fn rank_top_k(
    logits: &[f32],
    labels: &ClassLabels,
    top_k: usize,
) -> Result<Vec<ClassificationMatch>, ClassifierError> {
    if logits.len() != labels.len() {
        return Err(ClassifierError::OutputShape {
            expected: labels.len(),
            actual: logits.len(),
        });
    }

    if logits.iter().any(|x| !x.is_finite()) {
        return Err(ClassifierError::Inference(
            "model produced non-finite scores".into(),
        ));
    }

    let max_logit = logits
        .iter()
        .map(|&x| x as f64)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits
        .iter()
        .map(|&x| (x as f64 - max_logit).exp())
        .collect();
    let exp_sum: f64 = exps.iter().sum();

    let mut indexed: Vec<(usize, f64)> = exps
        .into_iter()
        .map(|e| e / exp_sum)
        .enumerate()
        .collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let matches = indexed
        .into_iter()
        .take(top_k)
        .map(|(idx, probability)| ClassificationMatch {
            name: labels.get(idx).to_string(),
            // Keep the score inside (0, 1] even when a tail probability underflows.
            score: probability.clamp(f64::MIN_POSITIVE, 1.0),
        })
        .collect();

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> ClassLabels {
        ClassLabels::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_rank_top_k_orders_by_score() {
        let labels = labels(&["cat", "dog", "rabbit", "hamster"]);
        let matches = rank_top_k(&[0.5, 3.0, 1.0, -2.0], &labels, 2).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "dog");
        assert_eq!(matches[1].name, "rabbit");
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn test_full_distribution_sums_to_one() {
        let labels = labels(&["a", "b", "c"]);
        let matches = rank_top_k(&[1.0, 2.0, 3.0], &labels, 3).unwrap();
        let total: f64 = matches.iter().map(|m| m.score).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(matches.iter().all(|m| m.score > 0.0 && m.score <= 1.0));
    }

    #[test]
    fn test_top_k_is_capped_by_label_count() {
        let labels = labels(&["only"]);
        let matches = rank_top_k(&[42.0], &labels, 5).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn test_underflowing_scores_stay_positive() {
        let labels = labels(&["sure", "never"]);
        let matches = rank_top_k(&[0.0, -10_000.0], &labels, 2).unwrap();
        assert_eq!(matches[0].name, "sure");
        assert!(matches[1].score > 0.0);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let labels = labels(&["a", "b"]);
        assert!(matches!(
            rank_top_k(&[1.0, 2.0, 3.0], &labels, 2),
            Err(ClassifierError::OutputShape {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_non_finite_logits_are_rejected() {
        let labels = labels(&["a", "b"]);
        assert!(rank_top_k(&[1.0, f32::NAN], &labels, 2).is_err());
    }
}
