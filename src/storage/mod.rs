//! Persistent war workbook.
//!
//! The workbook is a collection of named sheets:
//! - one record set per war, keyed by [`crate::models::WarId`]
//! - the derived `ROSTER` and `MISSED_HITS` views at the front
//!
//! The physical format sits behind the [`Workbook`] trait; the default
//! implementation keeps one JSONL file per sheet.

pub mod jsonl;
pub mod lock;
pub mod store;

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use jsonl::JsonlWorkbook;
pub use lock::StoreLock;
pub use store::{UpsertOutcome, WarPresence, WarRecordStore};

/// Sheet holding the derived player roster.
pub const ROSTER_SHEET: &str = "ROSTER";

/// Sheet holding missed attacks from completed wars.
pub const MISSED_HITS_SHEET: &str = "MISSED_HITS";

/// Whether a sheet name belongs to a derived view rather than a war.
pub fn is_derived_sheet(name: &str) -> bool {
    name == ROSTER_SHEET || name == MISSED_HITS_SHEET
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid sheet name: {0:?}")]
    InvalidSheetName(String),

    #[error("Workbook is locked by another run: {0}")]
    Locked(PathBuf),

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),
}

/// Where a written sheet goes in the workbook order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetPosition {
    /// Keep an existing sheet's slot; new sheets go last
    Append,
    /// Move or insert at this index (clamped to the end)
    At(usize),
}

/// A workbook of named, ordered sheets of serializable rows.
pub trait Workbook {
    /// Sheet names in workbook order. Empty if the workbook does not exist.
    fn sheet_names(&self) -> Result<Vec<String>, StorageError>;

    /// Read every row of a sheet.
    fn read_sheet<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StorageError>;

    /// Replace a sheet's rows, creating the sheet (and workbook) if needed.
    fn write_sheet<T: Serialize>(
        &self,
        name: &str,
        rows: &[T],
        position: SheetPosition,
    ) -> Result<(), StorageError>;

    /// Delete a sheet. Returns false if it did not exist.
    fn remove_sheet(&self, name: &str) -> Result<bool, StorageError>;

    fn has_sheet(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.sheet_names()?.iter().any(|s| s == name))
    }
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn workbook_dir(&self) -> PathBuf {
        self.data_dir.join("workbook")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("workbook.lock")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}
