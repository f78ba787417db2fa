// src/storage/mod.rs
pub mod influxdb;
pub mod line_protocol;
pub mod memory;

use crate::domain::errors::StorageResult;
use crate::domain::point::Point;
use async_trait::async_trait;

pub use influxdb::InfluxDbSink;
pub use memory::MemorySink;

/// Destination for mapped points
#[async_trait]
pub trait PointSink: Send {
    /// Hand a point to the sink. Implementations may buffer until `flush`.
    async fn write(&mut self, point: Point) -> StorageResult<()>;

    /// Send everything buffered so far
    async fn flush(&mut self) -> StorageResult<()>;

    /// Flush and release resources
    async fn close(&mut self) -> StorageResult<()> {
        self.flush().await
    }
}
