//! Core domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Machine-readable reason code recorded on duplicate attempts.
pub const DUPLICATE_REASON_CODE: &str = "DUPLICATE_TC_KIMLIK";

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// System administrator, sees every neighborhood
    #[serde(rename = "admin")]
    Administrator,
    /// Neighborhood representative (mahalle başkanı)
    #[serde(rename = "mahalle_baskani")]
    NeighborhoodRepresentative,
    /// Ordinary registered user attached to a neighborhood
    #[serde(rename = "kullanici")]
    RegisteredUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "admin",
            Role::NeighborhoodRepresentative => "mahalle_baskani",
            Role::RegisteredUser => "kullanici",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Administrator),
            "mahalle_baskani" => Ok(Role::NeighborhoodRepresentative),
            "kullanici" => Ok(Role::RegisteredUser),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A neighborhood (mahalle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighborhood {
    pub id: String,
    pub name: String,
    /// Display name of the neighborhood representative
    pub representative_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a neighborhood.
#[derive(Debug, Clone, Deserialize)]
pub struct NewNeighborhood {
    pub name: String,
    pub representative_name: String,
}

/// A user profile. Authentication itself happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub neighborhood_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user profile.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserProfile {
    /// Identifier issued by the upstream identity provider
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub neighborhood_id: Option<String>,
}

/// A beneficiary's aid registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: String,
    pub tc_kimlik_no: String,
    pub given_name: String,
    pub family_name: String,
    pub address: String,
    pub phone: Option<String>,
    pub neighborhood_id: String,
    /// User who registered the beneficiary
    pub registered_by: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration joined with neighborhood and registrant details, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDetail {
    #[serde(flatten)]
    pub record: RegistrationRecord,
    pub neighborhood_name: String,
    pub representative_name: String,
    pub registered_by_name: String,
    pub registered_by_email: String,
}

impl RegistrationDetail {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.record.given_name, self.record.family_name)
    }
}

/// The already-admitted record a duplicate attempt collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub id: String,
    pub neighborhood_id: String,
    pub neighborhood_name: String,
    pub given_name: String,
    pub family_name: String,
}

impl ExistingRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// Audit row for a rejected admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateAttempt {
    pub id: String,
    pub tc_kimlik_no: String,
    pub given_name: String,
    pub family_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// User who made the attempt
    pub attempted_by: String,
    /// Neighborhood the attempt was made under
    pub neighborhood_id: String,
    pub reason: String,
    pub reason_code: String,
    pub existing_record_id: Option<String>,
    pub existing_neighborhood_id: Option<String>,
    pub existing_given_name: Option<String>,
    pub existing_family_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Duplicate attempt joined with names, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateAttemptDetail {
    #[serde(flatten)]
    pub attempt: DuplicateAttempt,
    pub neighborhood_name: String,
    pub attempted_by_name: String,
    pub attempted_by_email: String,
    pub existing_neighborhood_name: Option<String>,
}

impl DuplicateAttemptDetail {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.attempt.given_name, self.attempt.family_name
        )
    }
}

/// Filter for registration listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationQuery {
    pub neighborhood_id: Option<String>,
    pub registered_by: Option<String>,
    pub limit: Option<usize>,
}

/// Filter for duplicate-attempt listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptQuery {
    pub neighborhood_id: Option<String>,
    pub limit: Option<usize>,
}

/// Change to the mutable contact fields of a registration.
///
/// `None` leaves a field unchanged; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactUpdate {
    pub phone: Option<Option<String>>,
    pub note: Option<Option<String>>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.note.is_none()
    }
}

/// Per-neighborhood aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodStats {
    pub neighborhood_id: String,
    pub neighborhood_name: String,
    pub representative_name: String,
    pub active: bool,
    pub total_registrations: u64,
    pub active_users: u64,
    pub duplicate_attempts: u64,
    pub registrations_with_phone: u64,
    pub first_registration_at: Option<DateTime<Utc>>,
    pub last_registration_at: Option<DateTime<Utc>>,
}

/// Per-user aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub neighborhood_name: Option<String>,
    pub total_registrations: u64,
    pub registrations_with_phone: u64,
    pub first_registration_at: Option<DateTime<Utc>>,
    pub last_registration_at: Option<DateTime<Utc>>,
}

/// System-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub total_registrations: u64,
    pub total_neighborhoods: u64,
    pub active_users: u64,
    pub duplicate_attempts: u64,
}
