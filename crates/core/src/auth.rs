use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Authenticated actor handed in by the external authentication layer.
///
/// Opsgrid never proves identity itself; it trusts the subject claim and the
/// tenant resolved for it at the trust boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    subject: String,
    tenant_id: TenantId,
}

impl ActorContext {
    /// Creates an actor context from a subject claim and its resolved tenant.
    #[must_use]
    pub fn new(subject: impl Into<String>, tenant_id: TenantId) -> Self {
        Self {
            subject: subject.into(),
            tenant_id,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the tenant the actor is operating in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
