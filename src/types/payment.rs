//! Payment log entries
//!
//! Append-only. Corrections are new offsetting entries, never edits.

use super::ids::{CustomerId, PaymentRecordId, Timestamp};
use super::money::Amount;
use serde::{Deserialize, Serialize};

/// Kind of money movement recorded in the payment log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentKind {
    /// Standalone payment against the outstanding balance
    Payment,
    /// Money returned to the customer
    Refund,
    /// Amount collected at the counter as part of a sale
    #[serde(alias = "Sale Initial")]
    SaleInitialPayment,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Payment => "payment",
            PaymentKind::Refund => "refund",
            PaymentKind::SaleInitialPayment => "sale-initial",
        }
    }

    /// Signed effect of this entry on `total_paid`
    pub fn signed(&self, amount: Amount) -> Amount {
        match self {
            PaymentKind::Refund => -amount,
            PaymentKind::Payment | PaymentKind::SaleInitialPayment => amount,
        }
    }
}

/// One payment or refund event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PaymentRecord {
    pub id: PaymentRecordId,

    pub customer_id: CustomerId,

    /// Always positive; direction comes from `kind`
    #[serde(default)]
    pub amount: Amount,

    pub kind: PaymentKind,

    pub occurred_at: Timestamp,
}

impl PaymentRecord {
    pub fn new(
        customer_id: CustomerId,
        amount: Amount,
        kind: PaymentKind,
        occurred_at: Timestamp,
    ) -> Self {
        PaymentRecord {
            id: PaymentRecordId::new(),
            customer_id,
            amount,
            kind,
            occurred_at,
        }
    }

    pub fn check_shape(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err(format!("amount must be positive, got {}", self.amount));
        }
        Ok(())
    }
}
