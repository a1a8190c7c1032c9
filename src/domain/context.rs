//! Operation Context
//!
//! Identifies who is asking for an operation. The claimed role is only a
//! claim: the core re-verifies it against the stored user on every call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Acting user
    pub actor_user_id: Uuid,

    /// Role the caller claims to hold
    pub claimed_role: Role,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    /// Create a context for an actor claiming a role
    pub fn new(actor_user_id: Uuid, claimed_role: Role) -> Self {
        Self {
            actor_user_id,
            claimed_role,
            correlation_id: None,
        }
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let user_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context =
            OperationContext::new(user_id, Role::Agent).with_correlation_id(correlation_id);

        assert_eq!(context.actor_user_id, user_id);
        assert_eq!(context.claimed_role, Role::Agent);
        assert_eq!(context.correlation_id, Some(correlation_id));
    }
}
