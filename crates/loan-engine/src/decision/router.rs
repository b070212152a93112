use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{Feature, PredictRequest, RawValue};
use super::engine::{DecisionEngine, DecisionError, DecisionStage, ErrorKind};
use super::features::{check_quarter_fluctuation, derive, FeatureError};

/// Router exposing the decision engine over HTTP.
pub fn decision_router(engine: Arc<DecisionEngine>) -> Router {
    Router::new()
        .route("/api/predict", post(predict_handler))
        .route("/api/models", get(models_handler))
        .route("/api/features/preview", post(preview_handler))
        .route("/api/health", get(health_handler))
        .with_state(engine)
}

/// HTTP status for a failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::OutOfDomain
        | ErrorKind::OutOfRange
        | ErrorKind::MissingFeature
        | ErrorKind::UnknownModel
        | ErrorKind::ServiceTypeMismatch
        | ErrorKind::NoModelsSelected
        | ErrorKind::MalformedRequest => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ModelInvocationFailure | ErrorKind::AllModelsFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::ModelLayerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_body(stage: DecisionStage, kind: ErrorKind, message: String, field: Option<&str>) -> Value {
    let mut error = json!({
        "stage": stage,
        "kind": kind,
        "message": message,
    });
    if let Some(field) = field {
        error["field"] = json!(field);
    }
    error
}

/// Render a decision failure as `{"error": {stage, kind, message, field?, failures?}}`.
///
/// `failures` maps each model to its reason when every selected model failed.
pub fn error_response(error: &DecisionError) -> Response {
    let mut body = error_body(error.stage(), error.kind(), error.to_string(), error.field());
    if let Some(failures) = error.failures() {
        body["failures"] = json!(failures);
    }
    (status_for(error.kind()), Json(json!({ "error": body }))).into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    let kind = ErrorKind::MalformedRequest;
    let body = error_body(DecisionStage::Validation, kind, rejection.body_text(), None);
    (status_for(kind), Json(json!({ "error": body }))).into_response()
}

pub(crate) async fn predict_handler(
    State(engine): State<Arc<DecisionEngine>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    match engine.evaluate(&request).await {
        Ok(verdict) => (StatusCode::OK, Json(verdict)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn models_handler(State(engine): State<Arc<DecisionEngine>>) -> Response {
    match engine.registry() {
        Some(registry) => {
            let models: Vec<_> = registry.handles().map(|handle| handle.describe()).collect();
            (StatusCode::OK, Json(json!({ "models": models }))).into_response()
        }
        None => error_response(&DecisionError::ModelLayerUnavailable(
            "model registry failed to load".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreviewRequest {
    #[serde(default)]
    quarter_fluctuation: Option<RawValue>,
}

pub(crate) async fn preview_handler(
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    let checked = request
        .quarter_fluctuation
        .as_ref()
        .ok_or(FeatureError::Missing {
            field: Feature::QuarterFluctuation,
        })
        .and_then(check_quarter_fluctuation);

    match checked {
        Ok(quarter_fluctuation) => {
            let derived = derive(quarter_fluctuation);
            let payload = json!({
                "quarterFluctuation": quarter_fluctuation,
                "creditLong": derived.credit_long,
                "resultantFluctuation": derived.resultant_fluctuation,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&DecisionError::Validation(error)),
    }
}

pub(crate) async fn health_handler(State(engine): State<Arc<DecisionEngine>>) -> Response {
    let model_layer = if engine.registry().is_some() {
        "ready"
    } else {
        "unavailable"
    };
    let payload = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "model_layer": model_layer,
        "heuristic_fallback": engine.fallback_enabled(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}
