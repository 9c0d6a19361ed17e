use crate::model::Link;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub prediction: i64,
    pub probability: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub version: String,
    pub feature_order: Vec<String>,
    pub n_features: usize,
    pub classes: Vec<i64>,
    pub link: Link,
}
