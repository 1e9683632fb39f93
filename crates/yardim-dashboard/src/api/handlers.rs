//! HTTP request handlers.

use super::types::{
    AdmissionResponse, DuplicateAttemptsResponse, HealthResponse, KimlikCheckResponse, ListQuery,
    MeResponse, NeighborhoodsResponse, RegistrationsResponse, UsersResponse,
};
use super::AppState;
use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use tracing::info;
use yardim_registry::{
    check_new_neighborhood, check_new_user, kimlik, messages, report, AttemptQuery, Caller,
    ContactForm, Neighborhood, NewNeighborhood, NewUserProfile, Overview, RegistrationDetail,
    RegistrationForm, RegistrationQuery, RegistrationRecord, Role, UserProfile,
};

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.store.health_check().await;

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" }.to_string(),
        store_healthy,
    })
}

/// The caller's own profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<MeResponse>, ApiError> {
    let profile = state
        .store
        .user(&caller.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(caller.user_id.clone()))?;

    let neighborhood_name = match profile.neighborhood_id.as_deref() {
        Some(id) => state.store.neighborhood(id).await?.map(|n| n.name),
        None => None,
    };

    Ok(Json(MeResponse {
        user_id: profile.id,
        full_name: profile.full_name,
        email: profile.email,
        role: profile.role,
        role_label: messages::role_label(profile.role.as_str()).to_string(),
        neighborhood_id: profile.neighborhood_id,
        neighborhood_name,
    }))
}

/// Check an identity number's checksum. Nothing is stored or looked up.
pub async fn check_kimlik(Path(tc): Path<String>) -> Json<KimlikCheckResponse> {
    let valid = kimlik::is_valid(tc.trim());
    Json(KimlikCheckResponse {
        tc_kimlik_no: tc,
        valid,
    })
}

/// Admit a registration, or reject it as a duplicate.
pub async fn create_registration(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<RegistrationForm>, JsonRejection>,
) -> Result<(StatusCode, Json<AdmissionResponse>), ApiError> {
    let form = json_body(payload)?;

    // Cheap local checks first; the service re-validates before touching the store.
    form.check()?;

    let outcome = state.admission.admit(&caller, form).await?;
    let status = if outcome.is_admitted() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };

    Ok((status, Json(AdmissionResponse::from(outcome))))
}

/// Registrations visible to the caller, newest first.
pub async fn list_registrations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RegistrationsResponse>, ApiError> {
    let query = caller.registration_query(query.neighborhood_id.as_deref(), query.limit)?;
    let registrations = state.store.registrations(&query).await?;

    let total = registrations.len();
    Ok(Json(RegistrationsResponse {
        registrations,
        total,
    }))
}

/// One registration, if visible to the caller.
pub async fn get_registration(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<RegistrationDetail>, ApiError> {
    let detail = state
        .store
        .registration(&id)
        .await?
        .filter(|d| caller.can_view_registration(d))
        .ok_or_else(|| ApiError::NotFound(id))?;

    Ok(Json(detail))
}

/// Update the phone number and note of a registration.
pub async fn update_registration(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<Json<RegistrationRecord>, ApiError> {
    let update = json_body(payload)?.validate()?;
    if update.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".into()));
    }

    let detail = state
        .store
        .registration(&id)
        .await?
        .filter(|d| caller.can_view_registration(d))
        .ok_or_else(|| ApiError::NotFound(id.clone()))?;
    if !caller.can_edit_registration(&detail) {
        return Err(ApiError::Forbidden("cannot edit this registration".into()));
    }

    let record = state
        .store
        .update_contact(&id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound(id))?;

    info!(id = %record.id, user_id = %caller.user_id, "Registration contact updated");
    Ok(Json(record))
}

/// Duplicate attempts visible to the caller, newest first.
pub async fn list_duplicate_attempts(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DuplicateAttemptsResponse>, ApiError> {
    let query = caller.attempt_query(query.neighborhood_id.as_deref(), query.limit)?;
    let attempts = state.store.duplicate_attempts(&query).await?;

    let total = attempts.len();
    Ok(Json(DuplicateAttemptsResponse { attempts, total }))
}

/// Neighborhoods with statistics. Non-administrators see their own.
pub async fn list_neighborhoods(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<Json<NeighborhoodsResponse>, ApiError> {
    let scope = caller.scoped_neighborhood(query.neighborhood_id.as_deref())?;
    let neighborhoods = state.store.neighborhood_stats(scope.as_deref()).await?;

    let total = neighborhoods.len();
    Ok(Json(NeighborhoodsResponse {
        neighborhoods,
        total,
    }))
}

/// Create a neighborhood (administrators only).
pub async fn create_neighborhood(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewNeighborhood>, JsonRejection>,
) -> Result<(StatusCode, Json<Neighborhood>), ApiError> {
    caller.require_admin()?;
    let neighborhood = json_body(payload)?;
    check_new_neighborhood(&neighborhood)?;

    let created = state.store.create_neighborhood(&neighborhood).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Users with statistics. Administrators see everyone, representatives their neighborhood.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    if caller.role == Role::RegisteredUser {
        return Err(ApiError::Forbidden("user listing is not visible to this role".into()));
    }
    let scope = caller.scoped_neighborhood(query.neighborhood_id.as_deref())?;
    let users = state.store.user_stats(scope.as_deref()).await?;

    let total = users.len();
    Ok(Json(UsersResponse { users, total }))
}

/// Create a user profile (administrators only).
pub async fn create_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewUserProfile>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    caller.require_admin()?;
    let user = json_body(payload)?;
    check_new_user(&user)?;

    let created = state.store.create_user(&user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// System-wide totals (administrators only).
pub async fn overview(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Overview>, ApiError> {
    caller.require_admin()?;
    Ok(Json(state.store.overview().await?))
}

/// CSV export of every registration (administrators only).
pub async fn registrations_csv(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Response, ApiError> {
    caller.require_admin()?;
    let records = state
        .store
        .registrations(&RegistrationQuery::default())
        .await?;
    let body = report::registrations_csv(&records)?;

    info!(rows = records.len(), "Registration report exported");
    let filename = format!("ramazan-yardimi-kayitlar-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok(csv_response(&filename, body))
}

/// CSV export of every duplicate attempt (administrators only).
pub async fn duplicate_attempts_csv(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Response, ApiError> {
    caller.require_admin()?;
    let attempts = state
        .store
        .duplicate_attempts(&AttemptQuery::default())
        .await?;
    let body = report::duplicate_attempts_csv(&attempts)?;

    info!(rows = attempts.len(), "Duplicate attempt report exported");
    let filename = format!(
        "ramazan-yardimi-mukerrer-denemeler-{}.csv",
        Utc::now().format("%Y-%m-%d")
    );
    Ok(csv_response(&filename, body))
}
