//! Authorization policy table
//!
//! One row per role and operation. Anything missing from the table is denied.

use serde::Serialize;

use crate::domain::{OperationKind, Role};

/// Which accounts an actor may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetScope {
    /// Any existing account, addressed by account number
    AnyAccount,
    /// Only the account bound to the actor
    OwnAccount,
}

const POLICY: &[(Role, OperationKind, TargetScope)] = &[
    (Role::Admin, OperationKind::Deposit, TargetScope::AnyAccount),
    (Role::Admin, OperationKind::Withdraw, TargetScope::AnyAccount),
    (Role::Admin, OperationKind::Transfer, TargetScope::AnyAccount),
    (Role::Admin, OperationKind::Exchange, TargetScope::AnyAccount),
    (Role::Admin, OperationKind::BillPayment, TargetScope::AnyAccount),
    (Role::Agent, OperationKind::Deposit, TargetScope::AnyAccount),
    (Role::Agent, OperationKind::Withdraw, TargetScope::AnyAccount),
    (Role::Agent, OperationKind::Transfer, TargetScope::AnyAccount),
    (Role::Agent, OperationKind::Exchange, TargetScope::AnyAccount),
    (Role::Agent, OperationKind::BillPayment, TargetScope::AnyAccount),
    (Role::Customer, OperationKind::Deposit, TargetScope::OwnAccount),
    (Role::Customer, OperationKind::Withdraw, TargetScope::OwnAccount),
    (Role::Customer, OperationKind::Transfer, TargetScope::OwnAccount),
    (Role::Customer, OperationKind::Exchange, TargetScope::OwnAccount),
    (Role::Customer, OperationKind::BillPayment, TargetScope::OwnAccount),
];

/// Scope granted to `role` for `operation`; `None` means denied.
///
/// For transfers the scoped account is the source; any existing account may
/// receive.
pub fn target_scope(role: Role, operation: OperationKind) -> Option<TargetScope> {
    POLICY
        .iter()
        .find(|(r, op, _)| *r == role && *op == operation)
        .map(|(_, _, scope)| *scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPERATIONS: [OperationKind; 5] = [
        OperationKind::Deposit,
        OperationKind::Withdraw,
        OperationKind::Transfer,
        OperationKind::Exchange,
        OperationKind::BillPayment,
    ];

    #[test]
    fn test_every_role_operation_pair_is_covered() {
        for role in [Role::Admin, Role::Agent, Role::Customer] {
            for op in OPERATIONS {
                assert!(target_scope(role, op).is_some(), "{} {}", role, op);
            }
        }
    }

    #[test]
    fn test_customer_is_self_scoped() {
        for op in OPERATIONS {
            assert_eq!(target_scope(Role::Customer, op), Some(TargetScope::OwnAccount));
        }
    }

    #[test]
    fn test_staff_may_target_any_account() {
        for op in OPERATIONS {
            assert_eq!(target_scope(Role::Admin, op), Some(TargetScope::AnyAccount));
            assert_eq!(target_scope(Role::Agent, op), Some(TargetScope::AnyAccount));
        }
    }
}
