// src/ingest/partition.rs
use crate::domain::errors::{IngestError, IngestResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Date partition format: YYYYMMDD, e.g. 20250328
pub fn is_date_dir(name: &str) -> bool {
    name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Hour partition format: any integer, e.g. 9 or 23
pub fn is_hour_unit(name: &str) -> bool {
    hour_number(name).is_some()
}

fn hour_number(name: &str) -> Option<i64> {
    name.parse::<i64>().ok()
}

/// Walks the partition tree of one data root.
///
/// Two layouts are recognised under each DATE directory:
/// - nested: `root/DATE/HOUR/<file>` where HOUR is a directory
/// - flat: `root/DATE/HOUR` where HOUR is the data file itself
///
/// Files come back in partition order: ascending date, then ascending hour,
/// then file name within a nested hour directory.
#[derive(Debug, Clone)]
pub struct PartitionScanner {
    root: PathBuf,
}

#[derive(Debug)]
struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

impl PartitionScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate every data file under the root.
    ///
    /// Only an unreadable root is an error; unreadable partitions below it are
    /// logged and skipped.
    pub fn data_files(&self) -> IngestResult<Vec<PathBuf>> {
        let mut date_dirs = list_entries(&self.root).map_err(|source| IngestError::UnreadableRoot {
            path: self.root.clone(),
            source,
        })?;
        date_dirs.retain(|entry| entry.is_dir && is_date_dir(&entry.name));
        date_dirs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut files = Vec::new();
        for date_dir in date_dirs {
            files.extend(self.date_partition_files(&date_dir.path));
        }

        log::debug!("Found {} data files under {}", files.len(), self.root.display());
        Ok(files)
    }

    /// Data files of a single DATE directory, in hour order
    pub fn date_partition_files(&self, date_path: &Path) -> Vec<PathBuf> {
        let units = match list_entries(date_path) {
            Ok(units) => units,
            Err(e) => {
                log::warn!("Failed to read hour directory {}: {}", date_path.display(), e);
                return Vec::new();
            }
        };

        let mut hour_units: Vec<(i64, Entry)> = units
            .into_iter()
            .filter_map(|entry| hour_number(&entry.name).map(|hour| (hour, entry)))
            .collect();
        hour_units.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

        let mut files = Vec::new();
        for (_, unit) in hour_units {
            if !unit.is_dir {
                // flat layout
                files.push(unit.path);
                continue;
            }

            // nested layout
            match list_entries(&unit.path) {
                Ok(mut entries) => {
                    entries.retain(|entry| !entry.is_dir);
                    entries.sort_by(|a, b| a.name.cmp(&b.name));
                    files.extend(entries.into_iter().map(|entry| entry.path));
                }
                Err(e) => {
                    log::warn!("Failed to read files in {}: {}", unit.path.display(), e);
                }
            }
        }
        files
    }
}

fn list_entries(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let is_dir = match entry.file_type() {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                log::warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            is_dir,
        });
    }
    Ok(entries)
}
