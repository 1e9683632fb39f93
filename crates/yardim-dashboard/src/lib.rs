//! Ramazan Yardımı dashboard service.
//!
//! JSON API in front of the registration core:
//! - Identifies callers from the header set by the authenticating gateway
//! - Scopes every query to what the caller's role may see
//! - Admits registrations and reports duplicates with a machine-readable code
//! - Exports registrations and duplicate attempts as CSV

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::ApiError;
