//! Persistence boundary.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::types::{
    AttemptQuery, ContactUpdate, DuplicateAttempt, DuplicateAttemptDetail, ExistingRecord,
    Neighborhood, NeighborhoodStats, NewNeighborhood, NewUserProfile, Overview,
    RegistrationDetail, RegistrationQuery, RegistrationRecord, UserProfile, UserStats,
};
use crate::validation::NewRegistration;
use async_trait::async_trait;

/// Result of the store's atomic insert-or-conflict.
#[derive(Debug, Clone)]
pub enum StoreAdmission {
    /// No record with this identity number existed; one does now.
    Inserted(RegistrationRecord),
    /// A record already existed; the attempt was written to the audit trail
    /// in the same transaction.
    Duplicate {
        attempt: DuplicateAttempt,
        existing: Option<ExistingRecord>,
    },
}

/// Storage backend for registrations, the duplicate audit trail and the
/// reference data around them.
///
/// `admit` must decide and write atomically with respect to the identity
/// number: exactly one of {registration, duplicate attempt} is written per
/// successful call, and concurrent calls for the same number never both insert.
#[async_trait]
pub trait AidStore: Send + Sync {
    /// Insert a registration or, on an identity-number conflict, record the attempt.
    async fn admit(&self, registration: &NewRegistration) -> Result<StoreAdmission, StoreError>;

    async fn registration(&self, id: &str) -> Result<Option<RegistrationDetail>, StoreError>;

    /// Registrations matching the query, newest first.
    async fn registrations(
        &self,
        query: &RegistrationQuery,
    ) -> Result<Vec<RegistrationDetail>, StoreError>;

    /// Update phone/note. Returns `None` when the registration does not exist.
    async fn update_contact(
        &self,
        id: &str,
        update: &ContactUpdate,
    ) -> Result<Option<RegistrationRecord>, StoreError>;

    /// Duplicate attempts matching the query, newest first.
    async fn duplicate_attempts(
        &self,
        query: &AttemptQuery,
    ) -> Result<Vec<DuplicateAttemptDetail>, StoreError>;

    async fn create_neighborhood(
        &self,
        neighborhood: &NewNeighborhood,
    ) -> Result<Neighborhood, StoreError>;

    async fn neighborhood(&self, id: &str) -> Result<Option<Neighborhood>, StoreError>;

    /// Aggregates for one neighborhood, or all when `neighborhood_id` is `None`.
    async fn neighborhood_stats(
        &self,
        neighborhood_id: Option<&str>,
    ) -> Result<Vec<NeighborhoodStats>, StoreError>;

    async fn create_user(&self, user: &NewUserProfile) -> Result<UserProfile, StoreError>;

    async fn user(&self, id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Aggregates per user, optionally limited to one neighborhood, busiest first.
    async fn user_stats(&self, neighborhood_id: Option<&str>) -> Result<Vec<UserStats>, StoreError>;

    async fn overview(&self) -> Result<Overview, StoreError>;

    async fn health_check(&self) -> bool;
}
