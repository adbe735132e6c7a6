//! Clio API payload types
//!
//! Shapes received from and sent to the Clio REST API. Every field except
//! the remote id is optional because list endpoints return sparse objects
//! depending on the requested field set. Values are immutable once
//! received; a write against an entity requires re-fetching its current
//! concurrency token first.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::billing::BillState;

/// Compact reference to a related Clio entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioReference {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Bill payload as returned by `/bills`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioBill {
    pub id: i64,
    /// Concurrency token for optimistic writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Remote state vocabulary; parsed into [`BillState`] at reconcile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClioReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter: Option<ClioReference>,
}

/// Line item payload as returned by `/line_items?bill_id=...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioLineItem {
    pub id: i64,
    /// "TimeEntry" or "ExpenseEntry"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    /// Underlying activity when the line was generated from one; its id is
    /// the preferred dedup key for the local record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ClioReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ClioReference>,
}

/// Activity (time or expense entry) payload as returned by `/activities`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioActivity {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ClioReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill: Option<ClioReference>,
}

/// Contact payload as returned by `/contacts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioContact {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// "Person" or "Company"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_email_address: Option<String>,
}

/// Matter payload as returned by `/matters`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioMatter {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClioReference>,
}

/// User payload as returned by `/users` and `/users/who_am_i`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioUser {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Field changes for an activity update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_billable: Option<bool>,
}

/// Query filters accepted by the bill list endpoint
#[derive(Debug, Clone, Default)]
pub struct BillListFilter {
    pub state: Option<BillState>,
    /// Remote id of the billed client contact
    pub client_id: Option<i64>,
    /// Remote id of the billed matter
    pub matter_id: Option<i64>,
    /// Only bills updated at or after this instant
    pub updated_since: Option<DateTime<Utc>>,
}

impl BillListFilter {
    /// Filter for the approval queue working set
    pub fn awaiting_approval() -> Self {
        Self { state: Some(BillState::AwaitingApproval), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_bill_payload_deserializes_sparse_fields() {
        let json = r#"{
            "id": 9001,
            "etag": "\"3-a7f\"",
            "number": "INV-17",
            "state": "awaiting_approval",
            "total": 1250.75,
            "client": { "id": 311, "name": "Acme Holdings" },
            "matter": { "id": 522 },
            "legacy_field_we_never_read": true
        }"#;

        let bill: ClioBill = serde_json::from_str(json).unwrap();
        assert_eq!(bill.id, 9001);
        assert_eq!(bill.total, Some(Decimal::from_str("1250.75").unwrap()));
        assert_eq!(bill.state.as_deref(), Some("awaiting_approval"));
        assert_eq!(bill.client.as_ref().map(|c| c.id), Some(311));
        assert_eq!(bill.matter.as_ref().and_then(|m| m.name.clone()), None);
        assert!(bill.balance.is_none());
    }

    #[test]
    fn test_line_item_carries_nested_activity_reference() {
        let json = r#"{
            "id": 71,
            "type": "TimeEntry",
            "description": "Drafted motion",
            "quantity": 1.5,
            "price": 400,
            "total": 600,
            "activity": { "id": 8801 },
            "user": { "id": 12, "name": "D. Calloway" }
        }"#;

        let line: ClioLineItem = serde_json::from_str(json).unwrap();
        assert_eq!(line.activity.as_ref().map(|a| a.id), Some(8801));
        assert_eq!(line.total, Some(Decimal::from_str("600").unwrap()));
    }

    #[test]
    fn test_activity_update_skips_absent_fields() {
        let update = ActivityUpdate {
            note: Some("Revised per partner review".to_string()),
            ..ActivityUpdate::default()
        };

        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"note":"Revised per partner review"}"#);
    }
}
