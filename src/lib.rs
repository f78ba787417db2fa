// src/lib.rs
// Hyperliquid node log ingestion into InfluxDB

pub mod config;
pub mod domain;
pub mod ingest;
pub mod storage;
