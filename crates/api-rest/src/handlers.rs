//! HTTP handlers.
//!
//! Each handler converts the wire request into a core input, calls one service operation and
//! maps the outcome to a status code. All business rules live in `mobilemed-core`.

use crate::error::ApiError;
use crate::AppState;
use api_shared::{
    validate_api_key, ExamReq, HealthRes, ListExamsQuery, ListPatientsQuery, PatientReq,
    API_KEY_HEADER,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
};
use mobilemed_core::constants::{EXAM_NOT_FOUND, PATIENT_NOT_FOUND};
use mobilemed_core::{Exam, Page, PageRequest, Patient, RecordsError};
use uuid::Uuid;

/// Health check endpoint.
///
/// Returns `200 OK` when the store answers, `503 Service Unavailable` otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthRes>) {
    let res = state.health.check_health().await;
    let status = if res.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(res))
}

/// Rejects requests without the configured API key. A no-op when no key is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if let Err(e) = validate_api_key(expected, provided) {
            tracing::warn!("rejected {} {}: {}", request.method(), request.uri().path(), e);
            return Err(e.into());
        }
    }
    Ok(next.run(request).await)
}

/// `POST /patients`: 201 with the new patient.
pub async fn create_patient(
    State(state): State<AppState>,
    payload: Result<Json<PatientReq>, JsonRejection>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let Json(req) = payload?;
    let patient = state.registry.create_patient(req.into()).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /patients?page&pageSize`
pub async fn list_patients(
    State(state): State<AppState>,
    query: Result<Query<ListPatientsQuery>, QueryRejection>,
) -> Result<Json<Page<Patient>>, ApiError> {
    let Query(query) = query?;
    let request = PageRequest::from_query(query.page, query.page_size, state.max_page_size)?;
    Ok(Json(state.registry.list_patients(request).await?))
}

/// `GET /patients/{id}`: the patient, or a `null` body when there is none.
pub async fn get_patient(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Option<Patient>>, ApiError> {
    let Path(id) = id?;
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(Json(None));
    };
    Ok(Json(state.registry.get_patient(id).await?))
}

/// `PUT /patients/{id}`
pub async fn update_patient(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<PatientReq>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let id = record_id(id?, PATIENT_NOT_FOUND)?;
    let Json(req) = payload?;
    Ok(Json(state.registry.update_patient(id, req.into()).await?))
}

/// `DELETE /patients/{id}`: 204, or 400 while exams reference the patient.
pub async fn delete_patient(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = record_id(id?, PATIENT_NOT_FOUND)?;
    state.registry.delete_patient(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /exams`: 201 when this request created the exam, 200 when it replayed an
/// existing one with the same idempotency key.
pub async fn create_exam(
    State(state): State<AppState>,
    payload: Result<Json<ExamReq>, JsonRejection>,
) -> Result<(StatusCode, Json<Exam>), ApiError> {
    let Json(req) = payload?;
    let creation = state.ledger.create_exam(req.into()).await?;
    let status = if creation.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(creation.into_inner())))
}

/// `GET /exams?page&pageSize&patientId`
pub async fn list_exams(
    State(state): State<AppState>,
    query: Result<Query<ListExamsQuery>, QueryRejection>,
) -> Result<Json<Page<Exam>>, ApiError> {
    let Query(query) = query?;
    let request = PageRequest::from_query(query.page, query.page_size, state.max_page_size)?;
    let patient_id = query.patient_filter()?;
    Ok(Json(state.ledger.list_exams(request, patient_id).await?))
}

/// `GET /exams/{id}`: the exam, or a `null` body when there is none.
pub async fn get_exam(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Option<Exam>>, ApiError> {
    let Path(id) = id?;
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(Json(None));
    };
    Ok(Json(state.ledger.get_exam(id).await?))
}

/// `PUT /exams/{id}`
pub async fn update_exam(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<ExamReq>, JsonRejection>,
) -> Result<Json<Exam>, ApiError> {
    let id = record_id(id?, EXAM_NOT_FOUND)?;
    let Json(req) = payload?;
    Ok(Json(state.ledger.update_exam(id, req.into()).await?))
}

/// `DELETE /exams/{id}`: 204.
pub async fn delete_exam(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = record_id(id?, EXAM_NOT_FOUND)?;
    state.ledger.delete_exam(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A path id that is not a UUID cannot name a stored record.
fn record_id(Path(raw): Path<String>, not_found: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(&raw).map_err(|_| RecordsError::not_found(not_found).into())
}
