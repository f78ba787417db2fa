// src/ingest/pipeline.rs
use super::decoder::decode_line;
use super::mapper::map_record;
use super::partition::PartitionScanner;
use super::reader::non_empty_lines;
use super::{DataRoot, RecordKind};
use crate::domain::errors::IngestResult;
use crate::storage::PointSink;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

/// Counters for one line, one file or a whole run.
///
/// `points_written` counts points the sink accepted; `points_dropped` counts
/// accepted points later lost with a failed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub decode_failures: usize,
    pub mapping_failures: usize,
    pub points_written: usize,
    pub write_failures: usize,
    pub points_dropped: usize,
}

impl IngestStats {
    pub fn failures(&self) -> usize {
        self.decode_failures + self.mapping_failures + self.write_failures + self.points_dropped
    }

    /// Points that reached the store
    pub fn points_stored(&self) -> usize {
        self.points_written.saturating_sub(self.points_dropped)
    }
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, other: Self) {
        self.lines += other.lines;
        self.decode_failures += other.decode_failures;
        self.mapping_failures += other.mapping_failures;
        self.points_written += other.points_written;
        self.write_failures += other.write_failures;
        self.points_dropped += other.points_dropped;
    }
}

/// Decode → map → write, with every failure contained at the line it happened on
pub struct Ingestor<S: PointSink> {
    sink: S,
    totals: IngestStats,
}

impl<S: PointSink> Ingestor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            totals: IngestStats::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Running totals since construction
    pub fn totals(&self) -> IngestStats {
        self.totals
    }

    /// Process every file already on disk under `roots`, then flush once.
    ///
    /// All roots are listed before any file is processed, so an unreadable
    /// root fails the backfill before anything is written.
    pub async fn backfill(&mut self, roots: &[DataRoot]) -> IngestResult<IngestStats> {
        let mut work: Vec<(RecordKind, Vec<PathBuf>)> = Vec::with_capacity(roots.len());
        for root in roots {
            let files = PartitionScanner::new(&root.path).data_files()?;
            log::info!(
                "Backfilling {} {} files from {}",
                files.len(),
                root.kind,
                root.path.display()
            );
            work.push((root.kind, files));
        }

        let mut stats = IngestStats::default();
        for (kind, files) in work {
            for path in files {
                stats += self.process_file(kind, &path).await;
            }
        }

        stats.points_dropped += self.flush().await;
        log::info!(
            "Backfill complete: {} lines, {} points, {} failures",
            stats.lines,
            stats.points_stored(),
            stats.failures()
        );
        Ok(stats)
    }

    /// Read a file once, without retry, and process its lines
    pub async fn process_file(&mut self, kind: RecordKind, path: &Path) -> IngestStats {
        match tokio::fs::read(path).await {
            Ok(content) => self.process_lines(kind, path, &non_empty_lines(&content)).await,
            Err(e) => {
                log::warn!("Failed to read file {}: {}", path.display(), e);
                IngestStats::default()
            }
        }
    }

    /// Process the lines of one file and log a summary for it
    pub async fn process_lines(
        &mut self,
        kind: RecordKind,
        path: &Path,
        lines: &[String],
    ) -> IngestStats {
        let mut stats = IngestStats::default();
        for line in lines {
            stats += self.process_line(kind, line).await;
        }

        log::info!(
            "Processed {} {} lines from {} ({} points, {} failures)",
            stats.lines,
            kind,
            path.display(),
            stats.points_written,
            stats.failures()
        );
        stats
    }

    /// Decode, map and write a single line
    pub async fn process_line(&mut self, kind: RecordKind, line: &str) -> IngestStats {
        let mut stats = IngestStats {
            lines: 1,
            ..IngestStats::default()
        };

        let record = match decode_line(kind, line) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}", e);
                stats.decode_failures += 1;
                self.totals += stats;
                return stats;
            }
        };

        let points = match map_record(&record) {
            Ok(points) => points,
            Err(e) => {
                log::warn!("Failed to store {}: {}", kind, e);
                stats.mapping_failures += 1;
                self.totals += stats;
                return stats;
            }
        };

        for point in points {
            log::trace!("Writing {} point at {}", point.measurement(), point.timestamp());
            match self.sink.write(point).await {
                Ok(()) => stats.points_written += 1,
                Err(e) => {
                    log::warn!("Failed to store {}: {}", kind, e);
                    match e.dropped_points() {
                        // accepted, then lost with the rest of its batch
                        0 => stats.write_failures += 1,
                        dropped => {
                            stats.points_written += 1;
                            stats.points_dropped += dropped;
                        }
                    }
                }
            }
        }

        self.totals += stats;
        stats
    }

    /// Flush the sink; a failure is logged and the pipeline carries on.
    /// Returns the number of points lost with a failed batch.
    pub async fn flush(&mut self) -> usize {
        match self.sink.flush().await {
            Ok(()) => 0,
            Err(e) => {
                log::error!("Failed to flush points: {}", e);
                let dropped = e.dropped_points();
                self.totals.points_dropped += dropped;
                dropped
            }
        }
    }
}
