//! JSON snapshot files
//!
//! A snapshot file holds the four collections of one owner as camelCase JSON
//! documents. Loading goes through the same strict decoding the store uses, so
//! a file that would not be accepted as store documents is rejected here too.

use crate::types::{LedgerError, LedgerSnapshot};
use std::fs;
use std::path::Path;
use tracing::info;

/// Read and validate a snapshot file
///
/// # Errors
///
/// `Io` if the file cannot be read; `Parse` for invalid JSON;
/// `MalformedDocument` or `DuplicateIdentifier` for documents that do not fit
/// the record shapes or reference each other inconsistently.
pub fn read_snapshot(path: &Path) -> Result<LedgerSnapshot, LedgerError> {
    let json = fs::read_to_string(path).map_err(|e| LedgerError::Io {
        message: format!("Failed to read snapshot '{}': {}", path.display(), e),
    })?;
    let snapshot = LedgerSnapshot::from_json(&json)?;
    info!(
        path = %path.display(),
        stock = snapshot.stock_items.len(),
        customers = snapshot.customers.len(),
        sales = snapshot.sales.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Write a snapshot as pretty-printed JSON, replacing any existing file
pub fn write_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), LedgerError> {
    let json = snapshot.to_json()?;
    fs::write(path, json).map_err(|e| LedgerError::Io {
        message: format!("Failed to write snapshot '{}': {}", path.display(), e),
    })?;
    info!(path = %path.display(), revision = snapshot.revision, "snapshot written");
    Ok(())
}
