//! Roles and operation kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Role assigned at registration. Fixed for the lifetime of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Agent,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Agent => "Agent",
            Role::Customer => "Customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Admin" => Ok(Role::Admin),
            "Agent" => Ok(Role::Agent),
            "Customer" => Ok(Role::Customer),
            other => Err(DomainError::InvalidRequest(format!("unknown role: {}", other))),
        }
    }
}

/// Money-movement operations the engine processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
    Exchange,
    BillPayment,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "Deposit",
            OperationKind::Withdraw => "Withdraw",
            OperationKind::Transfer => "Transfer",
            OperationKind::Exchange => "Exchange",
            OperationKind::BillPayment => "BillPayment",
        }
    }

    /// Whether an Agent processing this operation for someone else earns commission
    pub fn earns_agent_commission(&self) -> bool {
        !matches!(self, OperationKind::Withdraw)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(OperationKind::Deposit),
            "Withdraw" => Ok(OperationKind::Withdraw),
            "Transfer" => Ok(OperationKind::Transfer),
            "Exchange" => Ok(OperationKind::Exchange),
            "BillPayment" => Ok(OperationKind::BillPayment),
            other => Err(DomainError::InvalidRequest(format!("unknown operation: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_str() {
        for role in [Role::Admin, Role::Agent, Role::Customer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("Root".parse::<Role>().is_err());
    }

    #[test]
    fn test_commission_bearing_operations() {
        assert!(OperationKind::Deposit.earns_agent_commission());
        assert!(OperationKind::Transfer.earns_agent_commission());
        assert!(OperationKind::Exchange.earns_agent_commission());
        assert!(OperationKind::BillPayment.earns_agent_commission());
        assert!(!OperationKind::Withdraw.earns_agent_commission());
    }
}
