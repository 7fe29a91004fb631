//! Model service
//!
//! Wraps the loaded model behind an arity check. One instance is built at
//! startup and shared read-only by every connection handler.

use crate::model::Predictor;
use predictloop_common::{PredictLoopError, Result};
use tracing::info;

/// Ordered feature values for a single request
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Scalar model output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction(f64);

impl Prediction {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Shared, immutable prediction capability
pub struct ModelService {
    model: Box<dyn Predictor>,
    expected_arity: usize,
}

impl ModelService {
    /// Wrap a loaded model
    ///
    /// Fails if the model accepts no features, or if `required_arity` is set
    /// and differs from what the model was fitted on.
    pub fn new<P: Predictor + 'static>(model: P, required_arity: Option<usize>) -> Result<Self> {
        let expected_arity = model.expected_arity();

        if expected_arity == 0 {
            return Err(PredictLoopError::model("model expects zero features"));
        }

        if let Some(required) = required_arity {
            if required != expected_arity {
                return Err(PredictLoopError::model(format!(
                    "model expects {} features but configuration requires {}",
                    expected_arity, required
                )));
            }
        }

        info!(
            "Model service ready: kind={}, features={}",
            model.kind(),
            expected_arity
        );

        Ok(Self {
            model: Box::new(model),
            expected_arity,
        })
    }

    /// Point estimate for one feature vector
    ///
    /// Finite inputs can still overflow the model; such outputs are refused
    /// rather than encoded as `inf` or `NaN`.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        if features.len() != self.expected_arity {
            return Err(PredictLoopError::shape_mismatch(
                self.expected_arity,
                features.len(),
            ));
        }

        let value = self.model.predict(features.as_slice());
        if !value.is_finite() {
            return Err(PredictLoopError::NonFinitePrediction(value));
        }

        Ok(Prediction::new(value))
    }

    pub fn expected_arity(&self) -> usize {
        self.expected_arity
    }

    pub fn model_kind(&self) -> &'static str {
        self.model.kind()
    }
}

impl std::fmt::Debug for ModelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("kind", &self.model.kind())
            .field("expected_arity", &self.expected_arity)
            .finish()
    }
}
