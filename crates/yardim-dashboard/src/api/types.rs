//! API request and response types.

use serde::{Deserialize, Serialize};
use yardim_registry::{
    messages, AdmissionOutcome, DuplicateAttemptDetail, NeighborhoodStats, RegistrationDetail,
    Role, UserStats,
};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_healthy: bool,
}

/// The authenticated caller's profile.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    /// Display label for the role
    pub role_label: String,
    pub neighborhood_id: Option<String>,
    pub neighborhood_name: Option<String>,
}

/// Result of checking an identity number without registering it.
#[derive(Debug, Serialize)]
pub struct KimlikCheckResponse {
    pub tc_kimlik_no: String,
    pub valid: bool,
}

/// Result of an admission call.
///
/// `success` with `id` on admission; otherwise `error` (human readable) and
/// `error_code` (machine readable) plus whatever the caller may learn about
/// the conflicting record.
#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_name: Option<String>,
}

impl From<AdmissionOutcome> for AdmissionResponse {
    fn from(outcome: AdmissionOutcome) -> Self {
        match outcome {
            AdmissionOutcome::Admitted { id } => Self {
                success: true,
                id: Some(id),
                message: Some(messages::ADMITTED.to_string()),
                error: None,
                error_code: None,
                attempt_id: None,
                existing_neighborhood: None,
                existing_name: None,
            },
            AdmissionOutcome::Rejected {
                attempt_id,
                code,
                reason,
                existing_neighborhood,
                existing_name,
            } => Self {
                success: false,
                id: None,
                message: None,
                error: Some(reason),
                error_code: Some(code),
                attempt_id: Some(attempt_id),
                existing_neighborhood,
                existing_name,
            },
        }
    }
}

/// Query parameters for listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub neighborhood_id: Option<String>,
    pub limit: Option<usize>,
}

/// Registration listing.
#[derive(Debug, Serialize)]
pub struct RegistrationsResponse {
    pub registrations: Vec<RegistrationDetail>,
    pub total: usize,
}

/// Duplicate attempt listing.
#[derive(Debug, Serialize)]
pub struct DuplicateAttemptsResponse {
    pub attempts: Vec<DuplicateAttemptDetail>,
    pub total: usize,
}

/// Neighborhoods with their statistics.
#[derive(Debug, Serialize)]
pub struct NeighborhoodsResponse {
    pub neighborhoods: Vec<NeighborhoodStats>,
    pub total: usize,
}

/// Users with their statistics.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserStats>,
    pub total: usize,
}
