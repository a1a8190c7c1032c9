//! Currency and bill type tags
//!
//! Closed sets. Every caller parses into these enums at the boundary, so an
//! unrecognised tag never reaches the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    ZambianKwacha,
    USDollar,
    MalawianKwacha,
    ZimbabweanDollar,
}

impl Currency {
    /// Every supported currency, in display order.
    pub const ALL: [Currency; 4] = [
        Currency::ZambianKwacha,
        Currency::USDollar,
        Currency::MalawianKwacha,
        Currency::ZimbabweanDollar,
    ];

    /// Variant tag as stored and serialized
    pub fn tag(&self) -> &'static str {
        match self {
            Currency::ZambianKwacha => "ZambianKwacha",
            Currency::USDollar => "USDollar",
            Currency::MalawianKwacha => "MalawianKwacha",
            Currency::ZimbabweanDollar => "ZimbabweanDollar",
        }
    }

    /// Short code shown to end users
    pub fn code(&self) -> &'static str {
        match self {
            Currency::ZambianKwacha => "ZMW",
            Currency::USDollar => "USD",
            Currency::MalawianKwacha => "MWK",
            Currency::ZimbabweanDollar => "ZWL",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    /// Accepts either the variant tag or the short code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.tag() == s || c.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::InvalidCurrency(s.to_string()))
    }
}

/// Bill categories accepted by bill payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillType {
    Electricity,
    Water,
    Internet,
    Rent,
}

impl BillType {
    pub const ALL: [BillType; 4] = [
        BillType::Electricity,
        BillType::Water,
        BillType::Internet,
        BillType::Rent,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            BillType::Electricity => "Electricity",
            BillType::Water => "Water",
            BillType::Internet => "Internet",
            BillType::Rent => "Rent",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BillType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BillType::ALL
            .into_iter()
            .find(|b| b.tag() == s)
            .ok_or_else(|| DomainError::InvalidBillType(s.to_string()))
    }
}
