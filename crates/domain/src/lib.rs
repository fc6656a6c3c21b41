//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod role;
mod security;

pub use audit::{AuditAction, AuditOutcome};
pub use role::DefaultRole;
pub use security::{ActionType, FeatureArea, Permission};
