//! Billing API payloads.

use serde::{Deserialize, Deserializer, Serialize};

/// One page of the billing-entries query.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingPage {
    #[serde(rename = "billingEntries")]
    pub billing_entries: Vec<BillingEntry>,
}

/// A single billing entry. Every nested object may be absent or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingEntry {
    pub id: String,
    #[serde(default, deserialize_with = "scalar")]
    pub occurred_at: Option<String>,
    #[serde(rename = "type", default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub value: Option<Money>,
    #[serde(default)]
    pub tax: Option<Tax>,
    #[serde(default)]
    pub order: Option<OrderRef>,
    #[serde(default)]
    pub offer: Option<OfferRef>,
    #[serde(default)]
    pub balance: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryType {
    #[serde(default, deserialize_with = "scalar")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Money {
    #[serde(default, deserialize_with = "scalar")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    #[serde(default, deserialize_with = "scalar")]
    pub percentage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderRef {
    #[serde(default, deserialize_with = "scalar")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferRef {
    #[serde(default, deserialize_with = "scalar")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub name: Option<String>,
}

/// Accepts a string, number or boolean and keeps its textual form.
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        Some(serde_json::Value::Bool(flag)) => Some(flag.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_with_all_sections_parses() {
        let entry: BillingEntry = serde_json::from_value(json!({
            "id": "b-1",
            "occurredAt": "2024-03-14T10:00:00.000Z",
            "type": {"id": "SUC", "name": "Prowizja"},
            "offer": {"id": "7001", "name": "Kubek"},
            "value": {"amount": "-1.23", "currency": "PLN"},
            "tax": {"percentage": "23"},
            "balance": {"amount": "100.00", "currency": "PLN"},
            "order": {"id": "o-9"}
        }))
        .unwrap();
        assert_eq!(entry.entry_type.unwrap().id.as_deref(), Some("SUC"));
        assert_eq!(entry.order.unwrap().id.as_deref(), Some("o-9"));
    }

    #[test]
    fn null_and_missing_sections_are_none() {
        let entry: BillingEntry = serde_json::from_value(json!({
            "id": "b-2",
            "order": null
        }))
        .unwrap();
        assert!(entry.order.is_none());
        assert!(entry.offer.is_none());
        assert!(entry.occurred_at.is_none());
    }

    #[test]
    fn numeric_scalars_are_kept_as_text() {
        let money: Money = serde_json::from_value(json!({"amount": 12.5, "currency": "PLN"})).unwrap();
        assert_eq!(money.amount.as_deref(), Some("12.5"));
    }

    #[test]
    fn page_requires_entries_array() {
        assert!(serde_json::from_value::<BillingPage>(json!({"items": []})).is_err());
        let page: BillingPage = serde_json::from_value(json!({"billingEntries": []})).unwrap();
        assert!(page.billing_entries.is_empty());
    }
}
