use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::decision::domain::{CustomerClass, ModelId};
use crate::decision::engine::DecisionEngine;
use crate::decision::router::decision_router;

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn strong_payload() -> Value {
    json!({
        "creditShort": "1",
        "cph": "1",
        "ctl": "0",
        "aph": "1",
        "atl": "0.8",
        "quarterFluctuation": "4",
        "creditLong": "-1",
        "residualFluctuation": "-1",
    })
}

#[tokio::test]
async fn predict_returns_the_verdict_payload() {
    let router = decision_router(builtin_engine());

    let response = router
        .oneshot(post_json("/api/predict", &strong_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["prediction"], "Very_Good");
    assert_eq!(body["loan_range"], "$50,000 - $200,000");
    assert_eq!(body["source"], "models");
    assert_eq!(body["service_type"], "loan");
    assert_eq!(body["models_used"], json!(["xgboost", "random_forest"]));
    assert!(body["model_predictions"]["xgboost"]["prediction"].is_string());
    for verdict in body["model_predictions"].as_object().unwrap().values() {
        let confidence = verdict["confidence"].as_f64().unwrap();
        assert_eq!((confidence * 10.0).round() / 10.0, confidence);
    }
    assert!(body["processing_time_ms"].is_u64());
    assert!(body.get("model_failures").is_none());
    assert_eq!(body["factors"]["creditScore"], "Excellent");
}

#[tokio::test]
async fn predict_reports_validation_errors() {
    let router = decision_router(builtin_engine());
    let mut payload = strong_payload();
    payload["ctl"] = json!("maybe");

    let response = router
        .oneshot(post_json("/api/predict", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["stage"], "validation");
    assert_eq!(body["error"]["kind"], "OutOfDomain");
    assert_eq!(body["error"]["field"], "ctl");
}

#[tokio::test]
async fn predict_rejects_non_scalar_fields_as_out_of_domain() {
    let router = decision_router(builtin_engine());
    let mut payload = strong_payload();
    payload["creditShort"] = json!(true);

    let response = router
        .oneshot(post_json("/api/predict", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "OutOfDomain");
    assert_eq!(body["error"]["field"], "creditShort");
}

#[tokio::test]
async fn predict_rejects_malformed_json() {
    let router = decision_router(builtin_engine());

    let response = router
        .oneshot(
            Request::post("/api/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"creditShort\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "MalformedRequest");
}

#[tokio::test]
async fn predict_maps_total_model_failure_to_bad_gateway() {
    let engine = engine_with(vec![
        (ModelId::Xgboost, failing()),
        (ModelId::RandomForest, panicking()),
    ]);

    let response = decision_router(engine)
        .oneshot(post_json("/api/predict", &strong_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["stage"], "invocation");
    assert_eq!(body["error"]["kind"], "AllModelsFailed");
    assert_eq!(
        body["error"]["failures"]["xgboost"],
        "numeric failure: weights not loaded"
    );
    assert_eq!(
        body["error"]["failures"]["random_forest"],
        "classifier panicked during invocation"
    );
}

#[tokio::test]
async fn predict_without_fluctuation_names_the_missing_field() {
    let mut payload = strong_payload();
    payload
        .as_object_mut()
        .expect("payload is an object")
        .remove("quarterFluctuation");

    let response = decision_router(builtin_engine())
        .oneshot(post_json("/api/predict", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["stage"], "validation");
    assert_eq!(body["error"]["kind"], "MissingFeature");
    assert_eq!(body["error"]["field"], "quarterFluctuation");
    assert!(body["error"].get("failures").is_none());
}

#[tokio::test]
async fn predict_lists_partial_failures() {
    let engine = engine_with(vec![
        (ModelId::Logistic, fixed(CustomerClass::Normal, 61.0)),
        (ModelId::Knn, failing()),
    ]);
    let mut payload = strong_payload();
    payload["serviceType"] = json!("classification");

    let response = decision_router(engine)
        .oneshot(post_json("/api/predict", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["prediction"], "Normal");
    assert_eq!(body["confidence"], 61.0);
    assert!(body["model_failures"]["knn"].is_string());
    assert!(body["model_predictions"].get("knn").is_none());
}

#[tokio::test]
async fn predict_is_unavailable_without_models_or_fallback() {
    let engine = Arc::new(DecisionEngine::unavailable("registry failed"));

    let response = decision_router(engine)
        .oneshot(post_json("/api/predict", &strong_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "ModelLayerUnavailable");
}

#[tokio::test]
async fn predict_falls_back_to_the_heuristic_when_enabled() {
    let engine = Arc::new(DecisionEngine::unavailable("registry failed").with_fallback(true));

    let response = decision_router(engine)
        .oneshot(post_json("/api/predict", &strong_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["source"], "heuristic");
    assert_eq!(body["model_predictions"], json!({}));
}

#[tokio::test]
async fn models_route_lists_the_registry() {
    let response = decision_router(builtin_engine())
        .oneshot(Request::get("/api/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let models = body["models"].as_array().expect("models array");
    assert_eq!(models.len(), 4);
    assert_eq!(models[0]["id"], "xgboost");
    assert_eq!(models[0]["accuracy"], 94.5);
    assert_eq!(models[3]["service_type"], "classification");
}

#[tokio::test]
async fn preview_derives_the_long_term_fields() {
    let router = decision_router(builtin_engine());

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/features/preview",
            &json!({ "quarterFluctuation": "3" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["creditLong"], 0);
    assert_eq!(body["resultantFluctuation"], 0);

    let response = router
        .oneshot(post_json(
            "/api/features/preview",
            &json!({ "quarterFluctuation": 9 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["field"], "quarterFluctuation");
}

#[tokio::test]
async fn health_reports_version_and_model_layer() {
    let response = decision_router(builtin_engine())
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["model_layer"], "ready");
    assert!(body["timestamp"].is_string());
}
