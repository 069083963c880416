//! Flattening of nested billing entries into table rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::BillingEntry;

/// Column holding the unique row identifier.
pub const PRIMARY_KEY: &str = "id";

/// Output columns, in file order.
pub const COLUMNS: [&str; 13] = [
    "id",
    "occurredAt",
    "typeID",
    "typeName",
    "amount",
    "typecurrencyName",
    "tax",
    "orderID",
    "offerID",
    "offerName",
    "balanceAmount",
    "balanceCurrency",
    "timestamp",
];

/// Flat projection of a [`BillingEntry`]. Absent nested data is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub id: String,
    #[serde(rename = "occurredAt")]
    pub occurred_at: Option<String>,
    #[serde(rename = "typeID")]
    pub type_id: Option<String>,
    #[serde(rename = "typeName")]
    pub type_name: Option<String>,
    pub amount: Option<String>,
    #[serde(rename = "typecurrencyName")]
    pub currency: Option<String>,
    pub tax: Option<String>,
    #[serde(rename = "orderID")]
    pub order_id: Option<String>,
    #[serde(rename = "offerID")]
    pub offer_id: Option<String>,
    #[serde(rename = "offerName")]
    pub offer_name: Option<String>,
    #[serde(rename = "balanceAmount")]
    pub balance_amount: Option<String>,
    #[serde(rename = "balanceCurrency")]
    pub balance_currency: Option<String>,
    pub timestamp: String,
}

/// Flatten `entries`, stamping each row with `processed_at`.
pub fn normalize(entries: &[BillingEntry], processed_at: DateTime<Utc>) -> Vec<NormalizedRow> {
    let timestamp = processed_at.format("%Y-%m-%d %H:%M:%S").to_string();
    entries
        .iter()
        .map(|entry| normalize_entry(entry, &timestamp))
        .collect()
}

fn normalize_entry(entry: &BillingEntry, timestamp: &str) -> NormalizedRow {
    let entry_type = entry.entry_type.as_ref();
    let value = entry.value.as_ref();
    let offer = entry.offer.as_ref();
    let balance = entry.balance.as_ref();

    NormalizedRow {
        id: entry.id.clone(),
        occurred_at: entry.occurred_at.clone(),
        type_id: entry_type.and_then(|t| t.id.clone()),
        type_name: entry_type.and_then(|t| t.name.clone()),
        amount: value.and_then(|v| v.amount.clone()),
        currency: value.and_then(|v| v.currency.clone()),
        tax: entry.tax.as_ref().and_then(|t| t.percentage.clone()),
        order_id: entry.order.as_ref().and_then(|o| o.id.clone()),
        offer_id: offer.and_then(|o| o.id.clone()),
        offer_name: offer.and_then(|o| o.name.clone()),
        balance_amount: balance.and_then(|b| b.amount.clone()),
        balance_currency: balance.and_then(|b| b.currency.clone()),
        timestamp: timestamp.to_string(),
    }
}
