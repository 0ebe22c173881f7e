//! Domain layer for migration-guard
//!
//! Architecture: Domain Model - the vocabulary of migration checking
//! - Catalog names, timestamp tokens and diagnostics are pure values
//! - Violations and reports are the file-level aggregate consumed by the outer layers

pub mod catalog;
pub mod diagnostics;
pub mod timestamp;
pub mod violations;

// Re-export main domain types for convenience
pub use diagnostics::{Diagnostic, DiagnosticDescriptor, DiagnosticKind};
pub use timestamp::{Clock, FixedClock, SystemClock, TimestampError, TimestampToken};
pub use violations::*;
