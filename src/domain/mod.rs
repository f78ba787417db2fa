// src/domain/mod.rs
pub mod errors;
pub mod models;
pub mod point;

// Re-export common types for convenience
pub use errors::{AppError, AppResult, IngestError, IngestResult, StorageError, StorageResult};
pub use models::{Order, OrderStatus, SideInfo, Trade};
pub use point::{FieldValue, Point};
