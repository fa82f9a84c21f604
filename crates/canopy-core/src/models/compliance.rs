//! Compliance log domain model.
//!
//! A compliance log entry is an append-only record of one
//! regulator-relevant event. Entries of the same dispensary form a hash
//! chain: each entry's hash covers the hash of the entry before it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CanopyError, CanopyResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceEventType {
    Sale,
    Return,
    InventoryAdjustment,
    InventoryReceived,
    InventoryDestroyed,
    ProductRecall,
    IdVerification,
    PurchaseLimitCheck,
}

impl ComplianceEventType {
    pub const ALL: [ComplianceEventType; 8] = [
        ComplianceEventType::Sale,
        ComplianceEventType::Return,
        ComplianceEventType::InventoryAdjustment,
        ComplianceEventType::InventoryReceived,
        ComplianceEventType::InventoryDestroyed,
        ComplianceEventType::ProductRecall,
        ComplianceEventType::IdVerification,
        ComplianceEventType::PurchaseLimitCheck,
    ];

    /// Stored form, e.g. `PURCHASE_LIMIT_CHECK`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceEventType::Sale => "SALE",
            ComplianceEventType::Return => "RETURN",
            ComplianceEventType::InventoryAdjustment => "INVENTORY_ADJUSTMENT",
            ComplianceEventType::InventoryReceived => "INVENTORY_RECEIVED",
            ComplianceEventType::InventoryDestroyed => "INVENTORY_DESTROYED",
            ComplianceEventType::ProductRecall => "PRODUCT_RECALL",
            ComplianceEventType::IdVerification => "ID_VERIFICATION",
            ComplianceEventType::PurchaseLimitCheck => "PURCHASE_LIMIT_CHECK",
        }
    }

    /// Lowercase action name used in regulator exports, e.g. `sale`.
    pub fn action(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for ComplianceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceEventType {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        ComplianceEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| CanopyError::Validation {
                message: format!("unknown compliance event type: {s}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_name: String,
    pub variant_name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
    pub batch_number: String,
    pub license_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetails {
    pub order_id: Uuid,
    pub order_number: String,
    pub items: Vec<SaleLine>,
    pub subtotal: f64,
    pub tax: f64,
    pub excise_tax: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDetails {
    pub order_id: Uuid,
    pub order_number: String,
    pub refund_amount: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustmentDetails {
    pub variant_id: Uuid,
    pub old_quantity: f64,
    pub new_quantity: f64,
    pub reason: String,
}

/// Payload shared by INVENTORY_RECEIVED and INVENTORY_DESTROYED.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovementDetails {
    pub variant_id: Uuid,
    pub quantity: f64,
    pub batch_number: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecallDetails {
    pub product_id: Uuid,
    pub batch_numbers: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdVerificationDetails {
    pub customer_id: Uuid,
    pub verification_type: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLimitCheckDetails {
    pub customer_id: Uuid,
    pub daily_total: f64,
    pub requested_weight: f64,
    pub within_limit: bool,
    pub limit: f64,
}

/// A compliance event to be recorded. The variant fixes both the event
/// type and the shape of its details payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplianceEvent {
    Sale(SaleDetails),
    Return(ReturnDetails),
    InventoryAdjustment(InventoryAdjustmentDetails),
    InventoryReceived(InventoryMovementDetails),
    InventoryDestroyed(InventoryMovementDetails),
    ProductRecall(ProductRecallDetails),
    IdVerification(IdVerificationDetails),
    PurchaseLimitCheck(PurchaseLimitCheckDetails),
}

impl ComplianceEvent {
    pub fn event_type(&self) -> ComplianceEventType {
        match self {
            ComplianceEvent::Sale(_) => ComplianceEventType::Sale,
            ComplianceEvent::Return(_) => ComplianceEventType::Return,
            ComplianceEvent::InventoryAdjustment(_) => ComplianceEventType::InventoryAdjustment,
            ComplianceEvent::InventoryReceived(_) => ComplianceEventType::InventoryReceived,
            ComplianceEvent::InventoryDestroyed(_) => ComplianceEventType::InventoryDestroyed,
            ComplianceEvent::ProductRecall(_) => ComplianceEventType::ProductRecall,
            ComplianceEvent::IdVerification(_) => ComplianceEventType::IdVerification,
            ComplianceEvent::PurchaseLimitCheck(_) => ComplianceEventType::PurchaseLimitCheck,
        }
    }

    /// Serialize the payload into the free-form details object.
    pub fn details(&self) -> CanopyResult<serde_json::Value> {
        let value = match self {
            ComplianceEvent::Sale(d) => serde_json::to_value(d),
            ComplianceEvent::Return(d) => serde_json::to_value(d),
            ComplianceEvent::InventoryAdjustment(d) => serde_json::to_value(d),
            ComplianceEvent::InventoryReceived(d) | ComplianceEvent::InventoryDestroyed(d) => {
                serde_json::to_value(d)
            }
            ComplianceEvent::ProductRecall(d) => serde_json::to_value(d),
            ComplianceEvent::IdVerification(d) => serde_json::to_value(d),
            ComplianceEvent::PurchaseLimitCheck(d) => serde_json::to_value(d),
        };
        value.map_err(|e| CanopyError::Internal(format!("details serialization: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Stored entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub dispensary_id: Uuid,
    /// Position in the dispensary's chain, starting at 0.
    pub sequence: u64,
    pub event_type: ComplianceEventType,
    pub details: serde_json::Value,
    pub actor_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Hash of the previous entry in the chain; `None` for the first entry.
    pub previous_hash: Option<String>,
    /// SHA-256 (hex) over the canonical form of this entry.
    pub hash: String,
}

/// A fully sealed entry ready to be appended. The writer assigns id,
/// sequence, timestamp and hashes before handing it to the repository.
#[derive(Debug, Clone)]
pub struct AppendComplianceLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub dispensary_id: Uuid,
    pub sequence: u64,
    pub event_type: ComplianceEventType,
    pub details: serde_json::Value,
    pub actor_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl From<AppendComplianceLogEntry> for ComplianceLogEntry {
    fn from(e: AppendComplianceLogEntry) -> Self {
        Self {
            id: e.id,
            tenant_id: e.tenant_id,
            dispensary_id: e.dispensary_id,
            sequence: e.sequence,
            event_type: e.event_type,
            details: e.details,
            actor_id: e.actor_id,
            order_id: e.order_id,
            created_at: e.created_at,
            previous_hash: e.previous_hash,
            hash: e.hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_stored_form() {
        for t in ComplianceEventType::ALL {
            assert_eq!(t.as_str().parse::<ComplianceEventType>().unwrap(), t);
        }
        assert_eq!(
            "purchase_limit_check".parse::<ComplianceEventType>().unwrap(),
            ComplianceEventType::PurchaseLimitCheck
        );
        assert!("SHIPPED".parse::<ComplianceEventType>().is_err());
    }

    #[test]
    fn sale_action_is_lowercase() {
        assert_eq!(ComplianceEventType::Sale.action(), "sale");
        assert_eq!(
            ComplianceEventType::IdVerification.action(),
            "id_verification"
        );
    }

    #[test]
    fn purchase_limit_details_use_camel_case_keys() {
        let event = ComplianceEvent::PurchaseLimitCheck(PurchaseLimitCheckDetails {
            customer_id: Uuid::nil(),
            daily_total: 80.0,
            requested_weight: 5.0,
            within_limit: true,
            limit: 85.0,
        });

        assert_eq!(event.event_type(), ComplianceEventType::PurchaseLimitCheck);
        let details = event.details().unwrap();
        assert_eq!(details["dailyTotal"], 80.0);
        assert_eq!(details["requestedWeight"], 5.0);
        assert_eq!(details["withinLimit"], true);
        assert_eq!(details["limit"], 85.0);
    }

    #[test]
    fn inventory_movements_share_payload_but_not_type() {
        let movement = InventoryMovementDetails {
            variant_id: Uuid::nil(),
            quantity: 100.0,
            batch_number: "B-1".into(),
            reason: "manifest".into(),
        };
        let received = ComplianceEvent::InventoryReceived(movement.clone());
        let destroyed = ComplianceEvent::InventoryDestroyed(movement);
        assert_eq!(received.details().unwrap(), destroyed.details().unwrap());
        assert_ne!(received.event_type(), destroyed.event_type());
    }
}
