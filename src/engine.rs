use crate::{
    error::AppError,
    features::{assemble, FeatureVector, NamedInputs},
    model::{Link, ModelParameters},
};
use nalgebra::DVector;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Index into the model's outputs.
    pub label: usize,
    pub probabilities: Vec<f64>,
}

/// Scores `vector` against `params`.
///
/// Binary models (one coefficient row) go through a sigmoid and yield
/// `[1 - p, p]`; multiclass models go through a max-shifted softmax.
pub fn infer(vector: &FeatureVector, params: &ModelParameters) -> Result<PredictionResult, AppError> {
    if vector.values.len() != params.n_features() {
        return Err(AppError::DimensionMismatch {
            expected: params.n_features(),
            actual: vector.values.len(),
        });
    }

    let x = DVector::from_column_slice(&vector.values);
    let logits = logits(&x, params);

    let (label, probabilities) = match params.link() {
        Link::Sigmoid => {
            let p1 = sigmoid(logits[0]);
            let label = if p1 >= 0.5 { 1 } else { 0 };
            (label, vec![1.0 - p1, p1])
        }
        Link::Softmax => {
            let probabilities = softmax(&logits);
            (argmax(&probabilities), probabilities)
        }
    };

    Ok(PredictionResult {
        label,
        probabilities,
    })
}

fn logits(x: &DVector<f64>, params: &ModelParameters) -> Vec<f64> {
    let logits = params.coefficients() * x + params.intercepts();
    if logits.iter().all(|z| z.is_finite()) {
        return logits.as_slice().to_vec();
    }
    debug!("Logits overflowed, rescaling");
    rescaled_logits(x, params)
}

/// Recomputes overflowing logits as `scale * u` with every `u` bounded by
/// `n_features + 1`, so large terms never meet as `inf - inf`.
///
/// Multiclass logits come back shifted by their maximum, which the softmax
/// ignores. Entries may saturate to `-inf` (or `+inf` for a sigmoid) but are
/// never NaN.
fn rescaled_logits(x: &DVector<f64>, params: &ModelParameters) -> Vec<f64> {
    let x_scale = x.amax();
    let w_scale = params.coefficients().amax();
    let scale = x_scale * w_scale;

    let u = (params.coefficients() / w_scale) * (x / x_scale) + params.intercepts() / scale;
    let saturate = |d: f64| if d == 0.0 { 0.0 } else { d * scale };

    if params.is_binary() {
        return vec![saturate(u[0])];
    }
    let max = u.max();
    u.iter().map(|&v| saturate(v - max)).collect()
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    // The max logit contributes exp(0) = 1, so the sum is never below one.
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the lowest index wins ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Shared, read-only classifier handed to every request.
#[derive(Debug, Clone)]
pub struct Classifier {
    params: Arc<ModelParameters>,
}

impl Classifier {
    pub fn new(params: ModelParameters) -> Self {
        Self {
            params: Arc::new(params),
        }
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    pub fn predict(&self, inputs: &NamedInputs) -> Result<PredictionResult, AppError> {
        let vector = assemble(inputs, self.params.feature_order())?;
        let result = infer(&vector, &self.params)?;
        debug!(
            "Predicted class index {} with probabilities {:?}",
            result.label, result.probabilities
        );
        Ok(result)
    }

    /// Maps an output index to the label the model was trained with.
    pub fn class_label(&self, index: usize) -> Result<i64, AppError> {
        self.params
            .class_label(index)
            .ok_or_else(|| AppError::Internal(format!("no class label for output {}", index)))
    }
}
