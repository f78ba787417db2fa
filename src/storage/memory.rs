// src/storage/memory.rs
use super::PointSink;
use crate::domain::errors::StorageResult;
use crate::domain::point::Point;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory sink. Clones share the same storage, so one clone can be moved
/// into the pipeline while another is inspected.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    points: Arc<Mutex<Vec<Point>>>,
    flushes: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every point written so far
    pub fn points(&self) -> Vec<Point> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Point>> {
        self.points.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PointSink for MemorySink {
    async fn write(&mut self, point: Point) -> StorageResult<()> {
        self.lock().push(point);
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
