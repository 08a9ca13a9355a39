//! Domain value types and invariants for the resilience layer.

#![forbid(unsafe_code)]

mod admission;
mod aggregate;
mod alert;
mod error_report;

pub use admission::AdmissionKey;
pub use aggregate::{AggregateViewDefinition, RELATION_IDENTIFIER_MAX_LENGTH};
pub use alert::{Alert, AlertKind, AlertSeverity};
pub use error_report::ErrorReport;
