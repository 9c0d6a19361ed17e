use axum::{
    body::Bytes,
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::{
    engine::Classifier,
    error::AppError,
    features::decode_inputs,
    types::{ModelInfoResponse, PredictResponse, RootResponse},
};

pub struct AppContext {
    pub classifier: Classifier,
    pub greeting: String,
}

pub type AppState = Arc<AppContext>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/model", get(model_info))
        .route("/predict", post(predict))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: state.greeting.clone(),
    })
}

pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let params = state.classifier.params();
    Json(ModelInfoResponse {
        version: params.version().to_string(),
        feature_order: params.feature_order().to_vec(),
        n_features: params.n_features(),
        classes: params.classes().to_vec(),
        link: params.link(),
    })
}

pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, AppError> {
    let start = Instant::now();
    metrics::counter!("predictions_total").increment(1);

    let result = decode_inputs(&body)
        .and_then(|inputs| state.classifier.predict(&inputs))
        .map_err(|e| {
            metrics::counter!("prediction_errors_total").increment(1);
            e
        })?;
    let prediction = state.classifier.class_label(result.label)?;

    let elapsed = start.elapsed().as_micros() as f64;
    metrics::histogram!("prediction_duration_us").record(elapsed);
    debug!("Prediction {} served in {:.0}us", prediction, elapsed);

    Ok(Json(PredictResponse {
        prediction,
        probability: result.probabilities,
    }))
}
