//! Customer ledger records
//!
//! One running-balance record per customer. The balance is derived
//! (`total_billed - total_paid`) and never stored.

use super::ids::{CustomerId, Timestamp};
use super::money::Amount;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a customer record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    /// Archived; kept with its balance but hidden from name resolution
    Deleted,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Deleted => "deleted",
        }
    }
}

/// Running-balance record for one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Customer {
    pub id: CustomerId,

    pub name: String,

    /// Cumulative billed amount; only a Return lowers it
    #[serde(default)]
    pub total_billed: Amount,

    /// Cumulative paid amount; only a Refund lowers it, never below zero
    #[serde(default)]
    pub total_paid: Amount,

    #[serde(default)]
    pub last_payment_at: Option<Timestamp>,

    #[serde(default)]
    pub last_updated: Option<Timestamp>,

    #[serde(default)]
    pub status: CustomerStatus,

    pub joined_at: Timestamp,
}

impl Customer {
    /// A fresh, active customer with nothing billed or paid
    pub fn new(id: CustomerId, name: &str, joined_at: Timestamp) -> Self {
        Customer {
            id,
            name: name.trim().to_string(),
            total_billed: 0,
            total_paid: 0,
            last_payment_at: None,
            last_updated: None,
            status: CustomerStatus::Active,
            joined_at,
        }
    }

    /// Outstanding amount owed (negative when overpaid after a return)
    pub fn balance(&self) -> Amount {
        self.total_billed - self.total_paid
    }

    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    /// Case-insensitive, whitespace-trimmed name used for resolution
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name_key() == name_key(name)
    }

    /// Most recent activity: last payment, else last update, else joining
    pub fn last_activity(&self) -> Timestamp {
        self.last_payment_at
            .or(self.last_updated)
            .unwrap_or(self.joined_at)
    }

    pub fn check_shape(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.total_paid < 0 {
            return Err(format!("totalPaid must not be negative, got {}", self.total_paid));
        }
        if self.total_billed < 0 {
            return Err(format!("totalBilled must not be negative, got {}", self.total_billed));
        }
        Ok(())
    }
}

/// Normalize a customer name for matching
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rstest::rstest;

    #[rstest]
    #[case::exact("Ali", true)]
    #[case::case_insensitive("aLI", true)]
    #[case::padded("  ali ", true)]
    #[case::different("Alia", false)]
    fn test_matches_name(#[case] query: &str, #[case] expected: bool) {
        let customer = Customer::new(CustomerId::new(), " Ali ", Utc::now());
        assert_eq!(customer.name, "Ali");
        assert_eq!(customer.matches_name(query), expected);
    }

    #[test]
    fn test_last_activity_priority() {
        let joined = Utc::now() - Duration::days(60);
        let mut customer = Customer::new(CustomerId::new(), "Ali", joined);
        assert_eq!(customer.last_activity(), joined);

        let updated = joined + Duration::days(10);
        customer.last_updated = Some(updated);
        assert_eq!(customer.last_activity(), updated);

        // A payment wins even when older than the last update
        let paid = joined + Duration::days(5);
        customer.last_payment_at = Some(paid);
        assert_eq!(customer.last_activity(), paid);
    }

    #[test]
    fn test_balance_can_go_negative_after_return() {
        let mut customer = Customer::new(CustomerId::new(), "Ali", Utc::now());
        customer.total_billed = 0;
        customer.total_paid = 1500;
        assert_eq!(customer.balance(), -1500);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&CustomerStatus::Deleted).unwrap(),
            "\"deleted\""
        );
    }
}
