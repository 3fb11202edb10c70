//! REST transport for the decision-support engine.
//!
//! ## Purpose
//! Exposes patient evaluation over HTTP with an OpenAPI document and Swagger UI.
//!
//! ## Routes
//! - `GET /health`: liveness check, unauthenticated.
//! - `POST /evaluate`: evaluates a patient payload. Requires `x-api-key`; an optional
//!   `x-tenant-id` selects the tenant's configuration.
//!
//! The router owns no engines itself: it is handed a [`TenantEngines`] built once at start-up.

pub mod auth;
pub mod schema;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use cds_core::{CdsError, TenantEngines};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use schema::{
    CareGapRes, DiagnosisReq, EligibilityRes, EvaluationResponse, HealthRes, LabResultReq,
    MedicationReq, PatientRequest, ValidationRes, VitalSignsReq,
};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engines: Arc<TenantEngines>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(engines: Arc<TenantEngines>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            engines,
            api_key: api_key.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, evaluate),
    components(schemas(
        HealthRes,
        PatientRequest,
        DiagnosisReq,
        LabResultReq,
        MedicationReq,
        VitalSignsReq,
        EvaluationResponse,
        ValidationRes,
        EligibilityRes,
        CareGapRes,
    ))
)]
pub struct ApiDoc;

/// Builds the application router.
///
/// `/evaluate` sits behind the API-key layer; `/health`, the OpenAPI document and Swagger UI
/// do not.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/evaluate", post(evaluate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "CDS REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/evaluate",
    request_body = PatientRequest,
    params(
        ("x-api-key" = String, Header, description = "Service API key"),
        ("x-tenant-id" = Option<String>, Header, description = "Tenant whose configuration applies")
    ),
    responses(
        (status = 200, description = "Evaluation result", body = EvaluationResponse),
        (status = 400, description = "Invalid patient payload or tenant id"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 422, description = "Malformed patient payload, e.g. a sex other than M/F"),
        (status = 500, description = "Internal server error")
    )
)]
/// Evaluate a patient against the rule set
///
/// Resolves the tenant's engine, evaluates the patient as of `as_of` (today when omitted) and
/// returns eligibility per intervention, care gaps and validation findings.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the tenant header is not a safe identifier, or
/// - the patient id is blank.
///
/// A body that does not deserialise (including a sex other than `M`/`F`) is rejected by the
/// JSON extractor with `422 Unprocessable Entity`.
///
/// Returns `500 Internal Server Error` if the tenant's configuration cannot be loaded.
#[axum::debug_handler]
async fn evaluate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PatientRequest>,
) -> Result<Json<EvaluationResponse>, (StatusCode, String)> {
    let tenant_id = headers
        .get(TENANT_HEADER)
        .map(|v| v.to_str())
        .transpose()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid tenant id".to_string()))?;

    let patient = req
        .to_patient()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let engine = state.engines.engine_for(tenant_id).map_err(|e| match e {
        CdsError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        other => {
            tracing::error!("Engine error for tenant {:?}: {:?}", tenant_id, other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
    })?;

    let as_of = req.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let output = engine.evaluate(&patient, req.clinician_id.as_deref(), as_of);

    let rules: Vec<&str> = output.rule_evaluations.keys().map(String::as_str).collect();
    let metadata = json!({
        "tenant_id": tenant_id,
        "as_of": as_of.to_string(),
        "rules_evaluated": rules,
    });

    Ok(Json(EvaluationResponse {
        evaluation_id: Uuid::new_v4().to_string(),
        timestamp: output.timestamp.to_rfc3339(),
        metadata,
        validation: output.validation.into(),
        eligibility: output
            .eligibility
            .into_iter()
            .map(|(intervention, decision)| (intervention, decision.into()))
            .collect(),
        care_gaps: output.care_gaps.into_iter().map(CareGapRes::from).collect(),
        audit_trail_id: output.audit_trail_id,
    }))
}
