//! JSONL (JSON Lines) workbook.
//!
//! Each sheet is a `.jsonl` file under `sheets/`, one row per line.
//! `workbook.json` records sheet order. Writes go to a temporary file
//! first and are renamed into place, so a failed write leaves the old
//! sheet untouched.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SheetPosition, StorageConfig, StorageError, Workbook};

const MANIFEST_FILE: &str = "workbook.json";
const SHEETS_DIR: &str = "sheets";

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Write entities, replacing the entire file atomically.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        let mut count = 0;
        write_atomic(&self.path, |writer| {
            for entity in entities {
                let json = serde_json::to_string(entity)?;
                writeln!(writer, "{}", json)?;
                count += 1;
            }
            Ok(())
        })?;

        debug!("Wrote {} rows to {:?}", count, self.path);
        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all entities. Lines that fail to parse are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::SheetNotFound(
                self.path.display().to_string(),
            ));
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", idx + 1, self.path, e);
                }
            }
        }

        debug!("Read {} rows from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// Sheet order persisted next to the sheet files.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    sheets: Vec<String>,
}

/// Workbook stored as a directory of JSONL sheets.
#[derive(Debug, Clone)]
pub struct JsonlWorkbook {
    dir: PathBuf,
}

impl JsonlWorkbook {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn open(config: &StorageConfig) -> Self {
        Self::new(config.workbook_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn sheet_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_sheet_name(name)?;
        Ok(self.dir.join(SHEETS_DIR).join(format!("{}.jsonl", name)))
    }

    fn read_manifest(&self) -> Result<Manifest, StorageError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<(), StorageError> {
        write_atomic(&self.manifest_path(), |writer| {
            serde_json::to_writer_pretty(&mut *writer, manifest)?;
            writeln!(writer)?;
            Ok(())
        })
    }
}

impl Workbook for JsonlWorkbook {
    fn sheet_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_manifest()?.sheets)
    }

    fn read_sheet<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StorageError> {
        let manifest = self.read_manifest()?;
        if !manifest.sheets.iter().any(|s| s == name) {
            return Err(StorageError::SheetNotFound(name.to_string()));
        }

        let reader = JsonlReader::new(self.sheet_path(name)?);
        if !reader.exists() {
            return Err(StorageError::SheetNotFound(name.to_string()));
        }
        reader.read_all()
    }

    fn write_sheet<T: Serialize>(
        &self,
        name: &str,
        rows: &[T],
        position: SheetPosition,
    ) -> Result<(), StorageError> {
        let path = self.sheet_path(name)?;
        JsonlWriter::new(path).write_all(rows)?;

        let mut manifest = self.read_manifest()?;
        let existing = manifest.sheets.iter().position(|s| s == name);
        match (position, existing) {
            (SheetPosition::Append, Some(_)) => return Ok(()),
            (SheetPosition::Append, None) => manifest.sheets.push(name.to_string()),
            (SheetPosition::At(index), existing) => {
                if let Some(current) = existing {
                    if current == index {
                        return Ok(());
                    }
                    manifest.sheets.remove(current);
                }
                let index = index.min(manifest.sheets.len());
                manifest.sheets.insert(index, name.to_string());
            }
        }

        self.write_manifest(&manifest)
    }

    fn remove_sheet(&self, name: &str) -> Result<bool, StorageError> {
        let mut manifest = self.read_manifest()?;
        let Some(index) = manifest.sheets.iter().position(|s| s == name) else {
            return Ok(false);
        };

        manifest.sheets.remove(index);
        self.write_manifest(&manifest)?;

        let path = self.sheet_path(name)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(true)
    }
}

/// Sheet names become file names, so path separators and dot-files are refused.
fn validate_sheet_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}

/// Write through a temporary sibling file and rename it over `path`.
pub(crate) fn write_atomic<F>(path: &Path, fill: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), StorageError>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> Result<(), StorageError> {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        fill(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
