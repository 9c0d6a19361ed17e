use crate::error::{model_error, AppError};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// On-disk form of a fitted linear classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default = "default_version")]
    pub version: String,
    pub feature_order: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    #[serde(default)]
    pub classes: Option<Vec<i64>>,
}

fn default_version() -> String {
    "unversioned".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    Sigmoid,
    Softmax,
}

impl Link {
    pub fn as_str(&self) -> &'static str {
        match self {
            Link::Sigmoid => "sigmoid",
            Link::Softmax => "softmax",
        }
    }
}

/// Validated, immutable parameters of a linear classifier.
///
/// A single coefficient row is a binary model scored through a sigmoid;
/// two or more rows form a multiclass model scored through a softmax.
#[derive(Debug, Clone)]
pub struct ModelParameters {
    version: String,
    feature_order: Vec<String>,
    coefficients: DMatrix<f64>,
    intercepts: DVector<f64>,
    classes: Vec<i64>,
}

impl ModelParameters {
    #[cfg(test)]
    pub fn new(
        feature_order: Vec<String>,
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    ) -> Result<Self, AppError> {
        Self::from_artifact(ModelArtifact {
            version: default_version(),
            feature_order,
            coefficients,
            intercepts,
            classes: None,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| model_error(format!("failed to read {}: {}", path.display(), e)))?;
        let params = Self::from_json_str(&content)?;
        info!(
            "Loaded model {} from {}: {} features, {} outputs ({})",
            params.version,
            path.display(),
            params.n_features(),
            params.n_outputs(),
            params.link().as_str()
        );
        Ok(params)
    }

    pub fn from_json_str(content: &str) -> Result<Self, AppError> {
        let artifact: ModelArtifact = serde_json::from_str(content)
            .map_err(|e| model_error(format!("corrupt model artifact: {}", e)))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, AppError> {
        let ModelArtifact {
            version,
            feature_order,
            coefficients,
            intercepts,
            classes,
        } = artifact;

        let n_features = feature_order.len();
        if n_features == 0 {
            return Err(model_error("feature_order is empty"));
        }
        let mut seen = HashSet::with_capacity(n_features);
        for name in &feature_order {
            if name.is_empty() {
                return Err(model_error("feature_order contains an empty name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(model_error(format!("duplicate feature name: {}", name)));
            }
        }

        let n_classes = coefficients.len();
        if n_classes == 0 {
            return Err(model_error("coefficients contain no class rows"));
        }
        if intercepts.len() != n_classes {
            return Err(model_error(format!(
                "{} coefficient rows but {} intercepts",
                n_classes,
                intercepts.len()
            )));
        }
        for (class, row) in coefficients.iter().enumerate() {
            if row.len() != n_features {
                return Err(model_error(format!(
                    "coefficient row {} has {} entries, expected {}",
                    class,
                    row.len(),
                    n_features
                )));
            }
            if row.iter().any(|w| !w.is_finite()) {
                return Err(model_error(format!("coefficient row {} is not finite", class)));
            }
        }
        if intercepts.iter().any(|b| !b.is_finite()) {
            return Err(model_error("intercepts are not finite"));
        }

        let n_outputs = if n_classes == 1 { 2 } else { n_classes };
        let classes = match classes {
            Some(classes) => {
                if classes.len() != n_outputs {
                    return Err(model_error(format!(
                        "{} class labels for {} outputs",
                        classes.len(),
                        n_outputs
                    )));
                }
                let unique: HashSet<i64> = classes.iter().copied().collect();
                if unique.len() != classes.len() {
                    return Err(model_error("class labels are not unique"));
                }
                classes
            }
            None => (0..n_outputs as i64).collect(),
        };

        let coefficients = DMatrix::from_fn(n_classes, n_features, |c, f| coefficients[c][f]);
        let intercepts = DVector::from_vec(intercepts);

        debug!("Validated model {}: features {:?}", version, feature_order);

        Ok(Self {
            version,
            feature_order,
            coefficients,
            intercepts,
            classes,
        })
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    pub fn n_features(&self) -> usize {
        self.feature_order.len()
    }

    /// Number of stored coefficient rows.
    pub fn n_classes(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Number of probabilities produced per prediction.
    pub fn n_outputs(&self) -> usize {
        self.classes.len()
    }

    pub fn is_binary(&self) -> bool {
        self.n_classes() == 1
    }

    pub fn link(&self) -> Link {
        if self.is_binary() {
            Link::Sigmoid
        } else {
            Link::Softmax
        }
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    pub fn intercepts(&self) -> &DVector<f64> {
        &self.intercepts
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn class_label(&self, index: usize) -> Option<i64> {
        self.classes.get(index).copied()
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}
