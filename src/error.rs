use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Invalid value for feature {name}: {value}")]
    InvalidFeatureValue { name: String, value: String },

    #[error("Dimension mismatch: model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::MissingFeature(_)
            | AppError::InvalidFeatureValue { .. }
            | AppError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Feature name the error refers to, if any.
    pub fn feature(&self) -> Option<&str> {
        match self {
            AppError::MissingFeature(name) => Some(name),
            AppError::InvalidFeatureValue { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status.is_server_error() {
            tracing::error!("Internal server error: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(feature) = self.feature() {
            body["feature"] = json!(feature);
        }

        (status, Json(body)).into_response()
    }
}

// Helper function for creating validation errors
pub fn validation_error(msg: &str) -> AppError {
    AppError::InvalidInput(msg.to_string())
}

// Helper function for creating model load errors
pub fn model_error(msg: impl Into<String>) -> AppError {
    AppError::ModelLoad(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(
            AppError::MissingFeature("alcohol".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            validation_error("body must be an object").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DimensionMismatch { expected: 2, actual: 1 }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_model_errors_are_internal() {
        let err = model_error("artifact missing");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Model load error: artifact missing");
    }

    #[test]
    fn test_feature_name_is_exposed() {
        let err = AppError::InvalidFeatureValue {
            name: "volatile_acidity".into(),
            value: "\"high\"".into(),
        };
        assert_eq!(err.feature(), Some("volatile_acidity"));
        assert_eq!(AppError::Internal("boom".into()).feature(), None);
    }
}
