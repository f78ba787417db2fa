use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use hl_ingest::domain::errors::IngestError;
use hl_ingest::domain::point::FieldValue;
use hl_ingest::ingest::{DataRoot, Ingestor, RecordKind};
use hl_ingest::storage::MemorySink;

const TRADE_LINE: &str = r#"{"coin":"BTC","side":"B","time":"2025-03-28T10:00:00.000","px":"50000.5","sz":"1.2","hash":"0xabc","trade_dir_override":"","side_info":[{"user":"0x1","start_pos":"0","oid":1}]}"#;

const ORDER_LINE: &str = r#"{"time":"2025-03-28T11:30:00.250","user":"0xdef","status":"canceled","order":{"coin":"ETH","side":"A","limitPx":"2000.1","sz":"0.5","oid":42,"timestamp":1743161400000,"triggerCondition":"N/A","isTrigger":false,"triggerPx":"0.0","children":[],"isPositionTpsl":false,"reduceOnly":false,"orderType":"Limit","origSz":"1.0","tif":"Gtc","cloid":"0x0000000000000000000000000000abcd"}}"#;

fn write_file(path: &Path, lines: &[&str]) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create partition");
    fs::write(path, lines.join("\n") + "\n").expect("write data file");
}

fn roots(base: &Path) -> Vec<DataRoot> {
    vec![
        DataRoot::new(RecordKind::Trade, base.join("node_trades/hourly")),
        DataRoot::new(RecordKind::OrderStatus, base.join("node_order_statuses/hourly")),
    ]
}

#[tokio::test]
async fn backfill_maps_trade_example_end_to_end() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    write_file(&base.join("node_trades/hourly/20250328/10"), &[TRADE_LINE]);
    fs::create_dir_all(base.join("node_order_statuses/hourly")).expect("orders root");

    let sink = MemorySink::new();
    let mut ingestor = Ingestor::new(sink.clone());
    let stats = ingestor.backfill(&roots(base)).await.expect("backfill");

    assert_eq!(stats.lines, 1);
    assert_eq!(stats.points_written, 2);
    assert_eq!(sink.flush_count(), 1);

    let points = sink.points();
    let expected_time = Utc.with_ymd_and_hms(2025, 3, 28, 10, 0, 0).unwrap();

    let trade = &points[0];
    assert_eq!(trade.measurement(), "trades");
    assert_eq!(trade.timestamp(), expected_time);
    assert_eq!(trade.get_field("price"), Some(&FieldValue::Float(50000.5)));
    assert_eq!(trade.get_field("size"), Some(&FieldValue::Float(1.2)));
    assert_eq!(trade.get_field("user_count"), Some(&FieldValue::Integer(1)));

    let side = &points[1];
    assert_eq!(side.measurement(), "trade_side_info");
    assert_eq!(side.timestamp(), expected_time);
    assert_eq!(side.get_field("side_index"), Some(&FieldValue::Integer(0)));
    assert_eq!(side.get_field("has_twap"), Some(&FieldValue::Boolean(false)));
    assert_eq!(side.get_field("has_cloid"), Some(&FieldValue::Boolean(false)));
}

#[tokio::test]
async fn backfill_covers_both_layouts_and_survives_bad_lines() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    // nested layout for trades, flat layout for order statuses
    write_file(
        &base.join("node_trades/hourly/20250328/9/node"),
        &[TRADE_LINE, "{\"coin\":", TRADE_LINE],
    );
    write_file(&base.join("node_trades/hourly/notes/1"), &[TRADE_LINE]);
    write_file(&base.join("node_order_statuses/hourly/20250328/11"), &[ORDER_LINE]);

    let sink = MemorySink::new();
    let mut ingestor = Ingestor::new(sink.clone());
    let stats = ingestor.backfill(&roots(base)).await.expect("backfill");

    assert_eq!(stats.lines, 4);
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.points_written, 5);

    let points = sink.points();
    let order = points.last().expect("order point");
    assert_eq!(order.measurement(), "order_statuses");
    assert_eq!(order.get_field("timestamp"), Some(&FieldValue::Integer(1743161400000)));
    assert_eq!(
        order.timestamp(),
        Utc.with_ymd_and_hms(2025, 3, 28, 11, 30, 0).unwrap() + chrono::Duration::milliseconds(250)
    );
}

#[tokio::test]
async fn backfill_is_repeatable() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    write_file(&base.join("node_trades/hourly/20250328/10"), &[TRADE_LINE, TRADE_LINE]);
    write_file(&base.join("node_order_statuses/hourly/20250328/10"), &[ORDER_LINE]);

    let first = MemorySink::new();
    Ingestor::new(first.clone())
        .backfill(&roots(base))
        .await
        .expect("first backfill");

    let second = MemorySink::new();
    Ingestor::new(second.clone())
        .backfill(&roots(base))
        .await
        .expect("second backfill");

    assert_eq!(first.points(), second.points());
}

#[tokio::test]
async fn unreadable_root_aborts_before_writing() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    write_file(&base.join("node_trades/hourly/20250328/10"), &[TRADE_LINE]);
    // order status root is missing

    let sink = MemorySink::new();
    let result = Ingestor::new(sink.clone()).backfill(&roots(base)).await;

    assert!(matches!(result, Err(IngestError::UnreadableRoot { .. })));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn invalid_utf8_line_is_skipped_during_backfill() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let mut content = Vec::new();
    content.extend_from_slice(TRADE_LINE.as_bytes());
    content.extend_from_slice(b"\n\xff\xfe garbage\n");
    content.extend_from_slice(TRADE_LINE.as_bytes());
    content.push(b'\n');
    let path = base.join("node_trades/hourly/20250328/10");
    fs::create_dir_all(path.parent().expect("parent")).expect("create partition");
    fs::write(&path, content).expect("write data file");
    fs::create_dir_all(base.join("node_order_statuses/hourly")).expect("orders root");

    let sink = MemorySink::new();
    let stats = Ingestor::new(sink.clone())
        .backfill(&roots(base))
        .await
        .expect("backfill");

    assert_eq!(stats.lines, 3);
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.points_written, 4);
    assert_eq!(sink.len(), 4);
}
