//! Error types for the retail ledger
//!
//! This module defines every error the ledger can report. Messages are short
//! and specific (which stock code, the largest allowed payment) so the
//! presentation layer can show them as-is.
//!
//! # Error Categories
//!
//! - **Input errors**: malformed or missing command input, caught before any store access
//! - **Business-rule errors**: unavailable stock, overpayment, over-refund, duplicate codes
//! - **Reference errors**: missing customer, stock unit or sale record
//! - **Store errors**: optimistic transaction conflicts, write limits, malformed documents
//! - **Surface errors**: configuration, file I/O and CSV parsing

use super::money::Amount;
use thiserror::Error;

/// Main error type for the ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Malformed or missing input
    ///
    /// Always detected before the store is touched.
    #[error("Invalid input: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A stock unit was sold (or removed) between selection and commit
    #[error("Item {item} is no longer available")]
    ItemUnavailable {
        /// External code of the unit, or its id when the unit no longer exists
        item: String,
    },

    /// A referenced stock unit does not exist
    #[error("Stock item {reference} not found")]
    StockItemNotFound {
        /// Code or id that failed to resolve
        reference: String,
    },

    /// A referenced customer does not exist (or is orphaned)
    #[error("Customer {reference} not found")]
    CustomerNotFound {
        /// Name or id that failed to resolve
        reference: String,
    },

    /// A referenced sale record does not exist
    #[error("Sale record {reference} not found")]
    SaleRecordNotFound {
        /// Code or id that failed to resolve
        reference: String,
    },

    /// Payment larger than the outstanding balance
    #[error("Payment of {requested} for {customer} exceeds outstanding balance; max payment allowed: {balance}")]
    ExceedsBalance {
        /// Customer name
        customer: String,
        /// Outstanding balance at commit time
        balance: Amount,
        /// Requested payment
        requested: Amount,
    },

    /// Refund larger than everything the customer has paid
    #[error("Refund of {requested} for {customer} exceeds paid amount; max refund allowed: {paid}")]
    ExceedsPaidAmount {
        /// Customer name
        customer: String,
        /// Total paid at commit time
        paid: Amount,
        /// Requested refund
        requested: Amount,
    },

    /// Stock codes collide with existing units or repeat within one intake
    #[error("{} stock code(s): {}", if *in_batch { "Duplicate" } else { "Existing" }, codes.join(", "))]
    DuplicateIdentifier {
        /// Every offending code, uppercase
        codes: Vec<String>,
        /// True when the codes repeat inside the same batch
        in_batch: bool,
    },

    /// The store kept aborting the transaction due to concurrent writes
    #[error("Transaction conflict in {operation} after {attempts} attempt(s)")]
    TransactionConflict {
        /// Operation that was being committed
        operation: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// One atomic unit would write more documents than the store accepts
    #[error("Commit of {writes} writes exceeds the store limit of {limit}")]
    WriteLimitExceeded {
        /// Writes in the rejected commit
        writes: usize,
        /// Per-commit write limit
        limit: usize,
    },

    /// Arithmetic overflow in a running total
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// A stored document does not match the fixed record shape
    #[error("Malformed {collection} document{}: {message}", id.as_ref().map(|id| format!(" {}", id)).unwrap_or_default())]
    MalformedDocument {
        /// Collection the document belongs to
        collection: String,
        /// Document id, if it could be read
        id: Option<String>,
        /// What did not conform
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// CSV or JSON parsing error
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {message}")]
    TaskFailed { message: String },
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(error: tokio::task::JoinError) -> Self {
        LedgerError::TaskFailed {
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::Parse {
            line: Some(error.line() as u64),
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(error: toml::de::Error) -> Self {
        LedgerError::config(error.message())
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    pub fn item_unavailable(item: impl Into<String>) -> Self {
        LedgerError::ItemUnavailable { item: item.into() }
    }

    pub fn stock_item_not_found(reference: impl Into<String>) -> Self {
        LedgerError::StockItemNotFound {
            reference: reference.into(),
        }
    }

    pub fn customer_not_found(reference: impl Into<String>) -> Self {
        LedgerError::CustomerNotFound {
            reference: reference.into(),
        }
    }

    pub fn sale_record_not_found(reference: impl Into<String>) -> Self {
        LedgerError::SaleRecordNotFound {
            reference: reference.into(),
        }
    }

    pub fn exceeds_balance(customer: &str, balance: Amount, requested: Amount) -> Self {
        LedgerError::ExceedsBalance {
            customer: customer.to_string(),
            balance,
            requested,
        }
    }

    pub fn exceeds_paid_amount(customer: &str, paid: Amount, requested: Amount) -> Self {
        LedgerError::ExceedsPaidAmount {
            customer: customer.to_string(),
            paid,
            requested,
        }
    }

    pub fn duplicate_codes(codes: Vec<String>, in_batch: bool) -> Self {
        LedgerError::DuplicateIdentifier { codes, in_batch }
    }

    pub fn transaction_conflict(operation: &str, attempts: u32) -> Self {
        LedgerError::TransactionConflict {
            operation: operation.to_string(),
            attempts,
        }
    }

    pub fn write_limit_exceeded(writes: usize, limit: usize) -> Self {
        LedgerError::WriteLimitExceeded { writes, limit }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn malformed_document(collection: &str, id: Option<String>, message: impl Into<String>) -> Self {
        LedgerError::MalformedDocument {
            collection: collection.to_string(),
            id,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        LedgerError::Config {
            message: message.into(),
        }
    }

    /// Whether the error is a business-rule rejection rather than a fault
    ///
    /// Replay logs rejections at `warn` and faults at `error`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation { .. }
                | LedgerError::ItemUnavailable { .. }
                | LedgerError::StockItemNotFound { .. }
                | LedgerError::CustomerNotFound { .. }
                | LedgerError::SaleRecordNotFound { .. }
                | LedgerError::ExceedsBalance { .. }
                | LedgerError::ExceedsPaidAmount { .. }
                | LedgerError::DuplicateIdentifier { .. }
        )
    }
}
