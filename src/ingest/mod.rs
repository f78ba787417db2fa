// src/ingest/mod.rs
pub mod decoder;
pub mod mapper;
pub mod partition;
pub mod pipeline;
pub mod reader;
pub mod shutdown;
pub mod watcher;

mod inotify;

use std::fmt;
use std::path::{Path, PathBuf};

pub use decoder::{decode_line, Record};
pub use mapper::map_record;
pub use partition::{is_date_dir, is_hour_unit, PartitionScanner};
pub use pipeline::{IngestStats, Ingestor};
pub use reader::{RetryPolicy, RetryingFileReader};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use watcher::{LiveWatcher, WatchSet};

/// Which record shape a data root holds. Chosen once per root, never sniffed from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Trade,
    OrderStatus,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Trade => "trade",
            RecordKind::OrderStatus => "order status",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A partition tree on disk together with the kind of records it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoot {
    pub kind: RecordKind,
    pub path: PathBuf,
}

impl DataRoot {
    pub fn new(kind: RecordKind, path: impl AsRef<Path>) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// True when `path` lies inside this root
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.path)
    }
}
