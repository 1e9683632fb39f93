//! Aid registration core.
//!
//! Validates TC Kimlik numbers, admits beneficiary registrations through an
//! atomic insert-or-conflict against the store, and keeps an audit trail of
//! every rejected duplicate.

pub mod access;
pub mod admission;
pub mod error;
pub mod kimlik;
pub mod messages;
pub mod report;
pub mod store;
pub mod types;
pub mod validation;

pub use access::{Caller, Disclosure};
pub use admission::{AdmissionOutcome, AdmissionService};
pub use error::{AccessError, AdmissionError, ReportError, StoreError};
pub use kimlik::TcKimlikNo;
pub use store::{AidStore, SqliteStore, StoreAdmission};
pub use types::*;
pub use validation::{
    check_new_neighborhood, check_new_user, ContactForm, NewRegistration, RegistrationForm,
    ValidationErrors,
};
