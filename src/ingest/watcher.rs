// src/ingest/watcher.rs
use super::inotify::{PumpMessage, RawEvent, RawEventKind, Watcher};
use super::partition::{is_date_dir, is_hour_unit, PartitionScanner};
use super::pipeline::Ingestor;
use super::reader::{RetryPolicy, RetryingFileReader};
use super::shutdown::Shutdown;
use super::DataRoot;
use crate::domain::errors::{AppError, AppResult, IngestError};
use crate::storage::PointSink;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Directories currently registered with the watch subsystem
#[derive(Debug, Default)]
pub struct WatchSet {
    by_descriptor: HashMap<i32, PathBuf>,
    paths: BTreeSet<PathBuf>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a watch; returns false if the path was already watched
    pub fn insert(&mut self, wd: i32, path: PathBuf) -> bool {
        if let Some(previous) = self.by_descriptor.insert(wd, path.clone()) {
            self.paths.remove(&previous);
        }
        self.paths.insert(path)
    }

    pub fn remove(&mut self, wd: i32) -> Option<PathBuf> {
        let path = self.by_descriptor.remove(&wd)?;
        self.paths.remove(&path);
        Some(path)
    }

    pub fn resolve(&self, wd: i32) -> Option<&Path> {
        self.by_descriptor.get(&wd).map(PathBuf::as_path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

/// Follows the data roots after backfill.
///
/// A single task receives filesystem events and does all the reading,
/// decoding and writing they trigger, in delivery order. New DATE partitions
/// (and HOUR directories inside them) join the watch set as they appear.
pub struct LiveWatcher<S: PointSink> {
    roots: Vec<DataRoot>,
    ingestor: Ingestor<S>,
    reader: RetryingFileReader,
    shutdown: Shutdown,
    watcher: Watcher,
    events: mpsc::UnboundedReceiver<PumpMessage>,
    watch_set: WatchSet,
}

impl<S: PointSink> LiveWatcher<S> {
    /// Create the watch subsystem and register every directory under the roots.
    ///
    /// Failing to create the subsystem is fatal; a root that cannot be
    /// registered is logged and left unwatched.
    pub fn new(
        roots: Vec<DataRoot>,
        ingestor: Ingestor<S>,
        policy: RetryPolicy,
        shutdown: Shutdown,
    ) -> AppResult<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let watcher = Watcher::new(tx)
            .map_err(|e| AppError::Watch(format!("Failed to create file watcher: {}", e)))?;

        let mut live = Self {
            roots,
            ingestor,
            reader: RetryingFileReader::new(policy, shutdown.clone()),
            shutdown,
            watcher,
            events,
            watch_set: WatchSet::new(),
        };

        let roots: Vec<PathBuf> = live.roots.iter().map(|root| root.path.clone()).collect();
        for root in roots {
            live.register_tree(&root);
        }

        Ok(live)
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    /// Process events until shutdown is requested. Returns the ingestor so
    /// the caller can close its sink.
    pub async fn run(mut self) -> Ingestor<S> {
        log::info!("Watching {} directories for new data", self.watch_set.len());
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    log::info!("Shutdown requested, file watcher stopping");
                    break;
                }
                message = self.events.recv() => match message {
                    Some(PumpMessage::Event(event)) => self.handle_event(event).await,
                    Some(PumpMessage::Error(e)) => log::error!("File watch error: {}", e),
                    None => {
                        log::error!("File watch event stream closed");
                        break;
                    }
                },
            }
        }

        self.ingestor.flush().await;
        self.ingestor
    }

    async fn handle_event(&mut self, event: RawEvent) {
        match event.kind {
            RawEventKind::Created => {
                let Some(dir) = self.watch_set.resolve(event.wd) else {
                    log::debug!("Event for unknown watch descriptor {}", event.wd);
                    return;
                };
                let path = dir.join(&event.name);
                if event.is_dir {
                    self.handle_new_directory(path).await;
                } else {
                    self.handle_new_file(&path).await;
                }
            }
            RawEventKind::Ignored => {
                if let Some(path) = self.watch_set.remove(event.wd) {
                    log::info!("Stopped watching removed directory: {}", path.display());
                }
            }
            RawEventKind::Overflow => {
                log::error!("File watch error: event queue overflowed, some new files were missed");
            }
            RawEventKind::Other => {}
        }
    }

    async fn handle_new_directory(&mut self, path: PathBuf) {
        let name = file_name(&path);

        if is_date_dir(&name) {
            if !self.register(&path) {
                return;
            }
            log::info!("Added new date directory to watch: {}", path.display());

            // Partitions created before the watch existed
            for hour_dir in hour_dirs(&path) {
                self.register(&hour_dir);
            }
            let files = PartitionScanner::new(&path).date_partition_files(&path);
            for file in files {
                self.handle_new_file(&file).await;
            }
            return;
        }

        let under_date_dir = path
            .parent()
            .map(|parent| is_date_dir(&file_name(parent)))
            .unwrap_or(false);
        if is_hour_unit(&name) && under_date_dir {
            if !self.register(&path) {
                return;
            }
            log::info!("Added new hour directory to watch: {}", path.display());

            for file in plain_files(&path) {
                self.handle_new_file(&file).await;
            }
            return;
        }

        log::debug!("Ignoring new directory outside the partition layout: {}", path.display());
    }

    async fn handle_new_file(&mut self, path: &Path) {
        let Some(kind) = self
            .roots
            .iter()
            .find(|root| root.contains(path))
            .map(|root| root.kind)
        else {
            log::debug!("Ignoring file outside the data roots: {}", path.display());
            return;
        };

        log::info!("Found new data file: {}", path.display());
        match self.reader.read_lines(path).await {
            Ok(read) => {
                self.ingestor.process_lines(kind, path, &read.lines).await;
            }
            Err(e @ IngestError::Cancelled { .. }) => log::info!("{}", e),
            Err(e) => log::error!("{}", e),
        }

        // Ensure data is written
        self.ingestor.flush().await;
    }

    /// Register `root` and every directory below it
    fn register_tree(&mut self, root: &Path) {
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            if !self.register(&dir) && !self.watch_set.contains(&dir) {
                continue;
            }
            match fs::read_dir(&dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                            pending.push(entry.path());
                        }
                    }
                }
                Err(e) => log::error!("Failed to add directory to watch {}: {}", dir.display(), e),
            }
        }
    }

    fn register(&mut self, dir: &Path) -> bool {
        match self.watcher.add_watch(dir) {
            Ok(wd) => {
                log::debug!("Watching {} (wd {})", dir.display(), wd);
                self.watch_set.insert(wd, dir.to_path_buf())
            }
            Err(e) => {
                log::error!("Failed to add directory to watch {}: {}", dir.display(), e);
                false
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn hour_dirs(date_dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(date_dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| is_hour_unit(&file_name(path)))
            .collect(),
        Err(e) => {
            log::warn!("Failed to read hour directory {}: {}", date_dir.display(), e);
            Vec::new()
        }
    }
}

fn plain_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect(),
        Err(e) => {
            log::warn!("Failed to read files in {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    files.sort();
    files
}
