//! Model artifact loading
//!
//! A model artifact is a JSON document describing a trained estimator by its
//! fitted parameters. Artifacts are loaded once at startup and are immutable
//! afterwards; the rest of the server only sees them through [`Predictor`].

use predictloop_common::{PredictLoopError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A trained model that maps a feature slice to a point estimate.
///
/// Implementations must be pure: the same features always produce the same
/// output, and `predict` never mutates the model. Callers guarantee that
/// `features.len() == self.expected_arity()`.
pub trait Predictor: Send + Sync {
    /// Number of features the model was fitted on
    fn expected_arity(&self) -> usize;

    /// Point estimate for one feature vector
    fn predict(&self, features: &[f64]) -> f64;

    /// Model family, for logs
    fn kind(&self) -> &'static str;
}

/// Ordinary least-squares style linear regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

/// Binary logistic classifier; predicts class label `0.0` or `1.0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

fn linear_combination(coefficients: &[f64], intercept: f64, features: &[f64]) -> f64 {
    coefficients
        .iter()
        .zip(features)
        .fold(intercept, |acc, (w, x)| acc + w * x)
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl Predictor for LinearModel {
    fn expected_arity(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> f64 {
        linear_combination(&self.coefficients, self.intercept, features)
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64, threshold: f64) -> Self {
        Self {
            coefficients,
            intercept,
            threshold,
        }
    }

    /// Probability of the positive class
    pub fn probability(&self, features: &[f64]) -> f64 {
        let z = linear_combination(&self.coefficients, self.intercept, features);
        1.0 / (1.0 + (-z).exp())
    }
}

impl Predictor for LogisticModel {
    fn expected_arity(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> f64 {
        if self.probability(features) >= self.threshold {
            1.0
        } else {
            0.0
        }
    }

    fn kind(&self) -> &'static str {
        "logistic"
    }
}

/// On-disk model artifact, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    Logistic(LogisticModel),
}

impl ModelArtifact {
    /// Load and validate an artifact from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading model artifact from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            PredictLoopError::model(format!(
                "Failed to read model artifact {}: {}",
                path.display(),
                e
            ))
        })?;

        let artifact = Self::from_json_str(&content).map_err(|e| {
            PredictLoopError::model(format!("Invalid model artifact {}: {}", path.display(), e))
        })?;

        info!(
            "Model artifact loaded: kind={}, features={}",
            artifact.kind(),
            artifact.expected_arity()
        );

        Ok(artifact)
    }

    /// Parse and validate an artifact from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(content)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check that the fitted parameters are usable
    pub fn validate(&self) -> Result<()> {
        let (coefficients, intercept) = match self {
            ModelArtifact::Linear(m) => (&m.coefficients, m.intercept),
            ModelArtifact::Logistic(m) => (&m.coefficients, m.intercept),
        };

        if coefficients.is_empty() {
            return Err(PredictLoopError::model("model has no coefficients"));
        }

        if let Some(idx) = coefficients.iter().position(|w| !w.is_finite()) {
            return Err(PredictLoopError::model(format!(
                "coefficient {} is not finite",
                idx
            )));
        }

        if !intercept.is_finite() {
            return Err(PredictLoopError::model("intercept is not finite"));
        }

        if let ModelArtifact::Logistic(m) = self {
            if !(0.0..=1.0).contains(&m.threshold) {
                return Err(PredictLoopError::model(format!(
                    "threshold {} is outside [0, 1]",
                    m.threshold
                )));
            }
        }

        debug!("Model artifact validated: {} coefficients", coefficients.len());
        Ok(())
    }
}

impl Predictor for ModelArtifact {
    fn expected_arity(&self) -> usize {
        match self {
            ModelArtifact::Linear(m) => m.expected_arity(),
            ModelArtifact::Logistic(m) => m.expected_arity(),
        }
    }

    fn predict(&self, features: &[f64]) -> f64 {
        match self {
            ModelArtifact::Linear(m) => m.predict(features),
            ModelArtifact::Logistic(m) => m.predict(features),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Linear(m) => m.kind(),
            ModelArtifact::Logistic(m) => m.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_linear_predict() {
        let model = LinearModel::new(vec![0.5, 0.5, 0.5], 1.0);

        assert_eq!(model.expected_arity(), 3);
        assert_eq!(model.predict(&[1.0, 2.0, 3.0]), 4.0);
    }

    #[test]
    fn test_logistic_threshold() {
        let model = LogisticModel::new(vec![2.0, -1.0], 0.0, 0.5);

        assert_eq!(model.predict(&[1.0, 0.0]), 1.0);
        assert_eq!(model.predict(&[0.0, 1.0]), 0.0);
        assert!((model.probability(&[0.0, 0.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_artifact_from_json() {
        let json = r#"{"kind": "linear", "coefficients": [1.5, -2.0], "intercept": 0.25}"#;
        let artifact = ModelArtifact::from_json_str(json).unwrap();

        assert_eq!(artifact.kind(), "linear");
        assert_eq!(artifact.expected_arity(), 2);
        assert_eq!(artifact.predict(&[2.0, 1.0]), 1.25);
    }

    #[test]
    fn test_logistic_artifact_default_threshold() {
        let json = r#"{"kind": "logistic", "coefficients": [1.0]}"#;
        let artifact = ModelArtifact::from_json_str(json).unwrap();

        match artifact {
            ModelArtifact::Logistic(ref m) => assert_eq!(m.threshold, 0.5),
            _ => panic!("expected logistic artifact"),
        }
    }

    #[test]
    fn test_artifact_rejects_empty_coefficients() {
        let json = r#"{"kind": "linear", "coefficients": []}"#;

        assert!(matches!(
            ModelArtifact::from_json_str(json),
            Err(PredictLoopError::Model(_))
        ));
    }

    #[test]
    fn test_artifact_rejects_bad_threshold() {
        let json = r#"{"kind": "logistic", "coefficients": [1.0], "threshold": 1.5}"#;

        assert!(ModelArtifact::from_json_str(json).is_err());
    }

    #[test]
    fn test_artifact_rejects_unknown_kind() {
        let json = r#"{"kind": "forest", "coefficients": [1.0]}"#;

        assert!(matches!(
            ModelArtifact::from_json_str(json),
            Err(PredictLoopError::Serialization(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"kind": "linear", "coefficients": [1.0, 1.0], "intercept": 0.0}}"#).unwrap();

        let artifact = ModelArtifact::load(file.path()).unwrap();
        assert_eq!(artifact.predict(&[2.0, 3.0]), 5.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ModelArtifact::load("/nonexistent/model.json");

        assert!(matches!(result, Err(PredictLoopError::Model(_))));
    }
}
