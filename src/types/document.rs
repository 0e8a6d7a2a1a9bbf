//! Document decoding for the four persisted collections
//!
//! Documents arrive from the store as loosely typed JSON. Each one is decoded
//! into its fixed record shape: identity and reference fields are required,
//! unknown fields are rejected, and missing numeric fields read as zero.
//! After decoding, the record's own invariants are checked.

use super::customer::Customer;
use super::error::LedgerError;
use super::payment::PaymentRecord;
use super::sale::SaleRecord;
use super::stock::StockItem;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// The four collections kept per owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    StockItems,
    Customers,
    Payments,
    Sales,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::StockItems => "stockItems",
            Collection::Customers => "customers",
            Collection::Payments => "payments",
            Collection::Sales => "sales",
        }
    }
}

/// A record type stored as a document in one collection
pub trait LedgerDocument: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    /// Record-level invariants beyond what the type system enforces
    fn check_shape(&self) -> Result<(), String>;
}

impl LedgerDocument for StockItem {
    const COLLECTION: Collection = Collection::StockItems;

    fn check_shape(&self) -> Result<(), String> {
        StockItem::check_shape(self)
    }
}

impl LedgerDocument for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn check_shape(&self) -> Result<(), String> {
        Customer::check_shape(self)
    }
}

impl LedgerDocument for PaymentRecord {
    const COLLECTION: Collection = Collection::Payments;

    fn check_shape(&self) -> Result<(), String> {
        PaymentRecord::check_shape(self)
    }
}

impl LedgerDocument for SaleRecord {
    const COLLECTION: Collection = Collection::Sales;

    fn check_shape(&self) -> Result<(), String> {
        SaleRecord::check_shape(self)
    }
}

/// Decode one raw document, rejecting anything that does not conform
pub fn decode<T: LedgerDocument>(value: Value) -> Result<T, LedgerError> {
    let collection = T::COLLECTION.name();
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let record: T = serde_json::from_value(value)
        .map_err(|e| LedgerError::malformed_document(collection, id.clone(), e.to_string()))?;
    record
        .check_shape()
        .map_err(|message| LedgerError::malformed_document(collection, id, message))?;
    Ok(record)
}

/// Encode a record as a raw document
pub fn encode<T: LedgerDocument>(record: &T) -> Result<Value, LedgerError> {
    Ok(serde_json::to_value(record)?)
}

/// Encode a record that came from outside the engine, checking its shape first
pub fn encode_checked<T: LedgerDocument>(record: &T) -> Result<Value, LedgerError> {
    record
        .check_shape()
        .map_err(|message| LedgerError::malformed_document(T::COLLECTION.name(), None, message))?;
    encode(record)
}
