//! Shared primitives for all Rust crates in Opsgrid.

#![forbid(unsafe_code)]

/// Authenticated actor primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::ActorContext;

/// Result type used across Opsgrid crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Tenant identifier used as the partition key for every persisted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Creates a random tenant identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tenant identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
///
/// Denial variants keep their full detail for server-side logging and audit;
/// the HTTP boundary is responsible for replacing that detail with generic
/// bodies where the category requires it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist in the caller's tenant scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// A role name collides with an existing role in the same tenant.
    #[error("duplicate role name: {0}")]
    DuplicateName(String),

    /// A role cannot be deleted while assignments still reference it.
    #[error("role in use: {0}")]
    RoleInUse(String),

    /// A system default role rejects the attempted modification.
    #[error("protected role: {0}")]
    ProtectedRole(String),

    /// No actor identity was presented with the request.
    #[error("authentication required")]
    AuthRequired,

    /// Actor is authenticated but holds no role in the tenant.
    #[error("no roles assigned: {0}")]
    NoRolesAssigned(String),

    /// Actor is authenticated but lacks the required permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Internal unexpected error. Authorization always fails closed on this.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether this error is an authorization-denial category.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::AuthRequired | Self::NoRolesAssigned(_) | Self::PermissionDenied(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString, TenantId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn tenant_id_formats_as_uuid() {
        let tenant_id = TenantId::new();
        assert_eq!(tenant_id.to_string().len(), 36);
    }

    #[test]
    fn denial_categories_are_flagged() {
        assert!(AppError::AuthRequired.is_denial());
        assert!(AppError::PermissionDenied("x".to_owned()).is_denial());
        assert!(AppError::NoRolesAssigned("x".to_owned()).is_denial());
        assert!(!AppError::NotFound("x".to_owned()).is_denial());
    }
}
