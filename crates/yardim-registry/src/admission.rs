//! The duplicate-checked admission procedure.

use crate::access::Caller;
use crate::error::{AdmissionError, StoreError};
use crate::messages;
use crate::store::{AidStore, StoreAdmission};
use crate::types::DUPLICATE_REASON_CODE;
use crate::validation::{RegistrationForm, ValidationErrors};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of a completed admission call. A duplicate is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdmissionOutcome {
    Admitted {
        id: String,
    },
    Rejected {
        /// Audit row written for this attempt
        attempt_id: String,
        code: String,
        reason: String,
        existing_neighborhood: Option<String>,
        existing_name: Option<String>,
    },
}

impl AdmissionOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionOutcome::Admitted { .. })
    }
}

/// Validates candidates and runs them through the store's atomic admission.
#[derive(Clone)]
pub struct AdmissionService {
    store: Arc<dyn AidStore>,
}

impl AdmissionService {
    pub fn new(store: Arc<dyn AidStore>) -> Self {
        Self { store }
    }

    /// Admit a registration on behalf of `caller`.
    ///
    /// Every field is re-validated here regardless of what the entry point
    /// already checked; nothing reaches the store unless validation passes.
    #[instrument(skip(self, caller, form), fields(user_id = %caller.user_id, role = %caller.role))]
    pub async fn admit(
        &self,
        caller: &Caller,
        form: RegistrationForm,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let neighborhood_id = caller.admission_neighborhood(form.neighborhood_id.as_deref())?;
        let registration = form.validate(&neighborhood_id, &caller.user_id)?;
        let masked = registration.tc_kimlik_no().masked();

        let admission = self.store.admit(&registration).await.map_err(|e| {
            warn!(tc_kimlik_no = %masked, "Admission failed in store: {}", e);
            classify_store_error(e)
        })?;

        let outcome = match admission {
            StoreAdmission::Inserted(record) => {
                info!(tc_kimlik_no = %masked, id = %record.id, "Registration admitted");
                AdmissionOutcome::Admitted { id: record.id }
            }
            StoreAdmission::Duplicate { attempt, existing } => {
                let disclosure = caller.disclose(existing.as_ref());
                warn!(
                    tc_kimlik_no = %masked,
                    attempt_id = %attempt.id,
                    existing_neighborhood = ?existing.as_ref().map(|e| &e.neighborhood_id),
                    "Duplicate registration rejected"
                );
                AdmissionOutcome::Rejected {
                    attempt_id: attempt.id,
                    code: DUPLICATE_REASON_CODE.to_string(),
                    reason: messages::duplicate_reason(disclosure.neighborhood.as_deref()),
                    existing_neighborhood: disclosure.neighborhood,
                    existing_name: disclosure.name,
                }
            }
        };

        Ok(outcome)
    }
}

/// Map a store failure to what the caller can act on.
fn classify_store_error(e: StoreError) -> AdmissionError {
    match e {
        StoreError::InvalidReference(column) => {
            AdmissionError::Validation(ValidationErrors::unresolved_reference(&column))
        }
        StoreError::Unavailable(_) | StoreError::NotFound(_) => AdmissionError::StoreUnavailable(e),
        StoreError::Conflict(_) | StoreError::InvalidData(_) => AdmissionError::Internal(e),
    }
}
