// src/ingest/mapper.rs
use super::decoder::Record;
use crate::domain::errors::{IngestError, IngestResult};
use crate::domain::models::{OrderStatus, Trade};
use crate::domain::point::{
    Point, ORDER_STATUSES_MEASUREMENT, TRADES_MEASUREMENT, TRADE_SIDE_INFO_MEASUREMENT,
};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Map a decoded record to the points it produces.
///
/// Pure: the same record always yields the same points. A record whose time
/// cannot be parsed yields an error and no points at all.
pub fn map_record(record: &Record) -> IngestResult<Vec<Point>> {
    match record {
        Record::Trade(trade) => map_trade(trade),
        Record::OrderStatus(status) => map_order_status(status),
    }
}

/// One `trades` point followed by one `trade_side_info` point per side
pub fn map_trade(trade: &Trade) -> IngestResult<Vec<Point>> {
    let time = parse_node_time(&trade.time)?;

    let mut points = Vec::with_capacity(trade.side_info.len() + 1);
    points.push(
        Point::new(TRADES_MEASUREMENT, time)
            .tag("coin", trade.coin.as_str())
            .tag("side", trade.side.as_str())
            .tag("hash", trade.hash.as_str())
            .tag("trade_dir_override", trade.trade_dir_override.as_str())
            .field("price", parse_decimal(&trade.price))
            .field("size", parse_decimal(&trade.size))
            .field("user_count", trade.side_info.len()),
    );

    for (index, info) in trade.side_info.iter().enumerate() {
        points.push(
            Point::new(TRADE_SIDE_INFO_MEASUREMENT, time)
                .tag("coin", trade.coin.as_str())
                .field("side", trade.side.as_str())
                .field("hash", trade.hash.as_str())
                .field("user", info.user.as_str())
                .field("order_id", info.order_id.to_string())
                .field("start_pos", parse_decimal(&info.start_pos))
                .field("has_twap", info.twap_id.is_some())
                .field("has_cloid", info.client_order_id.is_some())
                .field("side_index", index),
        );
    }

    Ok(points)
}

/// Exactly one `order_statuses` point
pub fn map_order_status(status: &OrderStatus) -> IngestResult<Vec<Point>> {
    let time = parse_node_time(&status.time)?;
    let order = &status.order;

    let point = Point::new(ORDER_STATUSES_MEASUREMENT, time)
        .tag("coin", order.coin.as_str())
        .field("user", status.user.as_str())
        .field("status", status.status.as_str())
        .field("side", order.side.as_str())
        .field("order_type", order.order_type.as_str())
        .field("time_in_force", order.time_in_force.as_str())
        .field("order_id", order.order_id)
        .field("limit_price", parse_decimal(&order.limit_price))
        .field("size", parse_decimal(&order.size))
        .field("orig_size", parse_decimal(&order.orig_size))
        .field("timestamp", order.timestamp)
        .field("is_trigger", order.is_trigger)
        .field("trigger_price", parse_decimal(&order.trigger_price))
        .field("is_position_tpsl", order.is_position_tpsl)
        .field("reduce_only", order.reduce_only)
        .field("children", order.child_ids())
        .field("cloid", order.client_order_id.clone());

    Ok(vec![point])
}

/// Node timestamps carry no zone suffix and are always UTC.
///
/// Only the strict `YYYY-MM-DDTHH:MM:SS[.fraction]` form is accepted.
pub fn parse_node_time(value: &str) -> IngestResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|source| IngestError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// Decimal string to float. Unparseable input (surrounding whitespace
/// included) becomes 0.0 instead of dropping the record.
pub fn parse_decimal(value: &str) -> f64 {
    match value.parse::<f64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            log::debug!("Unparseable decimal {:?}, storing 0", value);
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Order, SideInfo};
    use crate::domain::point::FieldValue;
    use chrono::TimeZone;

    fn side(user: &str, oid: i64) -> SideInfo {
        SideInfo {
            user: user.to_string(),
            start_pos: "10.5".to_string(),
            order_id: oid,
            twap_id: None,
            client_order_id: None,
        }
    }

    fn trade(sides: Vec<SideInfo>) -> Trade {
        Trade {
            coin: "BTC".to_string(),
            side: "B".to_string(),
            time: "2025-03-28T10:00:00.000".to_string(),
            price: "50000.5".to_string(),
            size: "1.2".to_string(),
            hash: "0xabc".to_string(),
            trade_dir_override: "Na".to_string(),
            side_info: sides,
        }
    }

    fn order_status() -> OrderStatus {
        OrderStatus {
            time: "2025-03-28T10:00:01.123456789".to_string(),
            user: "0xdef".to_string(),
            status: "filled".to_string(),
            order: Order {
                coin: "ETH".to_string(),
                side: "A".to_string(),
                limit_price: "2000.1".to_string(),
                size: "0.0".to_string(),
                order_id: 42,
                timestamp: 1743156001000,
                trigger_condition: "N/A".to_string(),
                is_trigger: false,
                trigger_price: "0.0".to_string(),
                children: vec![serde_json::json!("7"), serde_json::json!(8)],
                is_position_tpsl: false,
                reduce_only: true,
                order_type: "Limit".to_string(),
                orig_size: "1.5".to_string(),
                time_in_force: "Alo".to_string(),
                client_order_id: Some("0x01".to_string()),
            },
        }
    }

    #[test]
    fn trade_yields_parent_plus_one_point_per_side() {
        let mut second = side("0x2", 2);
        second.twap_id = Some(serde_json::json!(99));
        second.client_order_id = Some("0xc1".to_string());
        let points = map_trade(&trade(vec![side("0x1", 1), second])).expect("map trade");

        assert_eq!(points.len(), 3);
        let time = Utc.with_ymd_and_hms(2025, 3, 28, 10, 0, 0).unwrap();
        assert!(points.iter().all(|p| p.timestamp() == time));

        let parent = &points[0];
        assert_eq!(parent.measurement(), "trades");
        assert_eq!(parent.get_tag("trade_dir_override"), Some("Na"));
        assert_eq!(parent.get_field("price"), Some(&FieldValue::Float(50000.5)));
        assert_eq!(parent.get_field("size"), Some(&FieldValue::Float(1.2)));
        assert_eq!(parent.get_field("user_count"), Some(&FieldValue::Integer(2)));

        let child = &points[2];
        assert_eq!(child.measurement(), "trade_side_info");
        assert_eq!(child.tags().len(), 1);
        assert_eq!(child.get_field("order_id"), Some(&FieldValue::String("2".to_string())));
        assert_eq!(child.get_field("start_pos"), Some(&FieldValue::Float(10.5)));
        assert_eq!(child.get_field("has_twap"), Some(&FieldValue::Boolean(true)));
        assert_eq!(child.get_field("has_cloid"), Some(&FieldValue::Boolean(true)));
        assert_eq!(child.get_field("side_index"), Some(&FieldValue::Integer(1)));
        assert_eq!(points[1].get_field("side_index"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn trade_without_sides_yields_single_point() {
        let points = map_trade(&trade(Vec::new())).expect("map trade");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].get_field("user_count"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn order_status_yields_one_point() {
        let points = map_order_status(&order_status()).expect("map order status");
        assert_eq!(points.len(), 1);

        let point = &points[0];
        assert_eq!(point.measurement(), "order_statuses");
        assert_eq!(point.get_tag("coin"), Some("ETH"));
        assert_eq!(
            point.get_field("timestamp"),
            Some(&FieldValue::Integer(1743156001000))
        );
        assert_eq!(point.timestamp().timestamp_nanos_opt(), Some(1743156001123456789));
        assert_eq!(point.get_field("order_id"), Some(&FieldValue::Integer(42)));
        assert_eq!(point.get_field("orig_size"), Some(&FieldValue::Float(1.5)));
        assert_eq!(
            point.get_field("children"),
            Some(&FieldValue::List(vec!["7".to_string(), "8".to_string()]))
        );
        assert_eq!(point.get_field("cloid"), Some(&FieldValue::String("0x01".to_string())));
    }

    #[test]
    fn missing_cloid_maps_to_null() {
        let mut status = order_status();
        status.order.client_order_id = None;
        let points = map_order_status(&status).expect("map order status");
        assert_eq!(points[0].get_field("cloid"), Some(&FieldValue::Null));
    }

    #[test]
    fn unparseable_time_yields_no_points() {
        let mut bad = trade(vec![side("0x1", 1)]);
        bad.time = "28/03/2025 10:00".to_string();
        assert!(matches!(map_trade(&bad), Err(IngestError::Timestamp { .. })));

        let mut status = order_status();
        status.time = "2025-03-28T10:00:00Z".to_string();
        assert!(map_order_status(&status).is_err());
    }

    #[test]
    fn node_time_requires_t_separator() {
        assert!(parse_node_time("2025-03-28 10:00:00.000").is_err());
        assert_eq!(
            parse_node_time("2025-03-28T10:00:00").expect("no fraction"),
            Utc.with_ymd_and_hms(2025, 3, 28, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn unparseable_decimals_become_zero() {
        let mut odd = trade(Vec::new());
        odd.price = "not-a-number".to_string();
        odd.size = "".to_string();
        let points = map_trade(&odd).expect("map trade");
        assert_eq!(points[0].get_field("price"), Some(&FieldValue::Float(0.0)));
        assert_eq!(points[0].get_field("size"), Some(&FieldValue::Float(0.0)));

        assert_eq!(parse_decimal(" 1.2"), 0.0);
        assert_eq!(parse_decimal("1e3"), 1000.0);
    }

    #[test]
    fn mapping_is_deterministic() {
        let record = Record::Trade(trade(vec![side("0x1", 1)]));
        assert_eq!(map_record(&record).unwrap(), map_record(&record).unwrap());
    }
}
