//! Types module
//!
//! Contains the fixed-shape records and value types used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `money`: Amounts, rounding and the partner share rate
//! - `ids`: Per-collection identifiers, owner scope and timestamps
//! - `stock`, `customer`, `payment`, `sale`: The four persisted record types
//! - `document`: Strict decoding of raw store documents
//! - `snapshot`: Point-in-time copy of an owner's collections
//! - `command`: Replayable commands read from a command log
//! - `error`: Error types for the ledger engine

pub mod command;
pub mod customer;
pub mod document;
pub mod error;
pub mod ids;
pub mod money;
pub mod payment;
pub mod sale;
pub mod snapshot;
pub mod stock;

pub use command::{ConflictKey, LedgerCommand};
pub use customer::{name_key, Customer, CustomerStatus};
pub use document::{Collection, LedgerDocument};
pub use error::LedgerError;
pub use ids::{CustomerId, OwnerId, PaymentRecordId, SaleRecordId, StockItemId, Timestamp};
pub use money::{round_half_up, Amount, ShareRate};
pub use payment::{PaymentKind, PaymentRecord};
pub use sale::SaleRecord;
pub use snapshot::LedgerSnapshot;
pub use stock::{normalize_code, parse_code_list, StockItem, StockPricing};
