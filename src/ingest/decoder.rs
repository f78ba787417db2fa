// src/ingest/decoder.rs
use super::RecordKind;
use crate::domain::errors::{IngestError, IngestResult};
use crate::domain::models::{OrderStatus, Trade};

/// A decoded line of node output
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Trade(Trade),
    OrderStatus(OrderStatus),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Trade(_) => RecordKind::Trade,
            Record::OrderStatus(_) => RecordKind::OrderStatus,
        }
    }
}

/// Decode one line as the record shape of its data root
pub fn decode_line(kind: RecordKind, line: &str) -> IngestResult<Record> {
    let decode_error = |source| IngestError::Decode {
        kind: kind.as_str(),
        source,
    };

    match kind {
        RecordKind::Trade => serde_json::from_str(line)
            .map(Record::Trade)
            .map_err(decode_error),
        RecordKind::OrderStatus => serde_json::from_str(line)
            .map(Record::OrderStatus)
            .map_err(decode_error),
    }
}
