//! Failure policies for the non-essential steps of an order operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a step reacts when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The failure aborts the whole unit of work.
    #[default]
    Strict,

    /// The failure is logged and the operation carries on without the step.
    BestEffort,
}

impl FailurePolicy {
    /// Returns true if a failure must abort the operation.
    pub fn is_strict(&self) -> bool {
        matches!(self, FailurePolicy::Strict)
    }

    /// Returns the configuration representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Strict => "strict",
            FailurePolicy::BestEffort => "best_effort",
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown failure policy '{0}' (expected 'strict' or 'best_effort')")]
pub struct InvalidPolicy(pub String);

impl std::str::FromStr for FailurePolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(FailurePolicy::Strict),
            "best_effort" | "best-effort" | "besteffort" => Ok(FailurePolicy::BestEffort),
            _ => Err(InvalidPolicy(s.to_string())),
        }
    }
}

/// Per-step failure policies of the order engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Creating a customer record during guest checkout.
    pub guest_customer: FailurePolicy,

    /// Appending a row to the inventory ledger.
    pub ledger: FailurePolicy,

    /// Returning stock when an order is cancelled.
    pub restock: FailurePolicy,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            guest_customer: FailurePolicy::BestEffort,
            ledger: FailurePolicy::Strict,
            restock: FailurePolicy::Strict,
        }
    }
}

impl EnginePolicy {
    /// Every step aborts on failure.
    pub fn strict() -> Self {
        Self {
            guest_customer: FailurePolicy::Strict,
            ledger: FailurePolicy::Strict,
            restock: FailurePolicy::Strict,
        }
    }

    pub fn with_guest_customer(mut self, policy: FailurePolicy) -> Self {
        self.guest_customer = policy;
        self
    }

    pub fn with_ledger(mut self, policy: FailurePolicy) -> Self {
        self.ledger = policy;
        self
    }

    pub fn with_restock(mut self, policy: FailurePolicy) -> Self {
        self.restock = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!("strict".parse(), Ok(FailurePolicy::Strict));
        assert_eq!(" Best_Effort ".parse(), Ok(FailurePolicy::BestEffort));
        assert_eq!("best-effort".parse(), Ok(FailurePolicy::BestEffort));
        assert!("lenient".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_default_policy() {
        let policy = EnginePolicy::default();
        assert_eq!(policy.guest_customer, FailurePolicy::BestEffort);
        assert_eq!(policy.ledger, FailurePolicy::Strict);
        assert_eq!(policy.restock, FailurePolicy::Strict);
    }

    #[test]
    fn test_builder_overrides_single_step() {
        let policy = EnginePolicy::strict().with_restock(FailurePolicy::BestEffort);
        assert!(policy.guest_customer.is_strict());
        assert!(policy.ledger.is_strict());
        assert!(!policy.restock.is_strict());
    }
}
