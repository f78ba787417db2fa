// src/domain/models.rs
use serde::{Deserialize, Deserializer, Serialize};

/// One executed trade from `node_trades`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub coin: String,
    pub side: String,
    /// UTC timestamp without zone suffix, e.g. `2025-03-28T10:00:00.000`
    pub time: String,
    #[serde(rename = "px")]
    pub price: String,
    #[serde(rename = "sz")]
    pub size: String,
    pub hash: String,
    pub trade_dir_override: String,
    pub side_info: Vec<SideInfo>,
}

/// Per-counterparty detail of a trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideInfo {
    pub user: String,
    pub start_pos: String,
    #[serde(rename = "oid")]
    pub order_id: i64,
    #[serde(default)]
    pub twap_id: Option<serde_json::Value>,
    #[serde(rename = "cloid", default)]
    pub client_order_id: Option<String>,
}

/// One order lifecycle event from `node_order_statuses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub time: String,
    pub user: String,
    pub status: String,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub coin: String,
    pub side: String,
    #[serde(rename = "limitPx")]
    pub limit_price: String,
    #[serde(rename = "sz")]
    pub size: String,
    #[serde(rename = "oid")]
    pub order_id: i64,
    /// Epoch milliseconds assigned by the node
    pub timestamp: i64,
    #[serde(rename = "triggerCondition")]
    pub trigger_condition: String,
    #[serde(rename = "isTrigger")]
    pub is_trigger: bool,
    #[serde(rename = "triggerPx")]
    pub trigger_price: String,
    pub children: Vec<serde_json::Value>,
    #[serde(rename = "isPositionTpsl")]
    pub is_position_tpsl: bool,
    #[serde(rename = "reduceOnly")]
    pub reduce_only: bool,
    #[serde(rename = "orderType")]
    pub order_type: String,
    #[serde(rename = "origSz")]
    pub orig_size: String,
    // The node writes `null` for orders without a time-in-force (triggers, market)
    #[serde(rename = "tif", deserialize_with = "null_as_empty")]
    pub time_in_force: String,
    #[serde(rename = "cloid", default)]
    pub client_order_id: Option<String>,
}

impl Order {
    /// Child order ids rendered as strings, whatever JSON type the node used
    pub fn child_ids(&self) -> Vec<String> {
        self.children
            .iter()
            .map(|child| match child {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
