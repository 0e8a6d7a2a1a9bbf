//! I/O module
//!
//! Handles command log parsing, report output and snapshot files.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (command conversion, report serialization)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `snapshot_file` - JSON snapshot import and export

pub mod async_reader;
pub mod csv_format;
pub mod snapshot_file;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, write_report, CsvRecord, ReportKind};
pub use snapshot_file::{read_snapshot, write_snapshot};
pub use sync_reader::SyncReader;
