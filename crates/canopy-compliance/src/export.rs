//! Regulator CSV export.

use canopy_core::models::compliance::{ComplianceEventType, ComplianceLogEntry};
use chrono::SecondsFormat;

pub const CSV_HEADER: &str = "Timestamp,User,Action,Resource,ResourceID,Severity,Details";

/// Actor column value for entries written without a user.
const SYSTEM_ACTOR: &str = "system";

/// The kind of record an event is about.
pub fn resource(event_type: ComplianceEventType) -> &'static str {
    match event_type {
        ComplianceEventType::Sale | ComplianceEventType::Return => "order",
        ComplianceEventType::InventoryAdjustment
        | ComplianceEventType::InventoryReceived
        | ComplianceEventType::InventoryDestroyed => "inventory",
        ComplianceEventType::ProductRecall => "product",
        ComplianceEventType::IdVerification | ComplianceEventType::PurchaseLimitCheck => {
            "customer"
        }
    }
}

/// Severity as a regulator would triage it. A failed limit check is
/// escalated over a passing one.
pub fn severity(entry: &ComplianceLogEntry) -> &'static str {
    match entry.event_type {
        ComplianceEventType::ProductRecall => "critical",
        ComplianceEventType::InventoryDestroyed
        | ComplianceEventType::InventoryAdjustment
        | ComplianceEventType::Return => "warning",
        ComplianceEventType::PurchaseLimitCheck
            if entry.details["withinLimit"] == serde_json::Value::Bool(false) =>
        {
            "warning"
        }
        ComplianceEventType::IdVerification
            if entry.details["verified"] == serde_json::Value::Bool(false) =>
        {
            "warning"
        }
        _ => "info",
    }
}

/// Identifier of the record named by [`resource`].
pub fn resource_id(entry: &ComplianceLogEntry) -> String {
    let key = match entry.event_type {
        ComplianceEventType::Sale | ComplianceEventType::Return => {
            if let Some(order_id) = entry.order_id {
                return order_id.to_string();
            }
            "orderId"
        }
        ComplianceEventType::InventoryAdjustment
        | ComplianceEventType::InventoryReceived
        | ComplianceEventType::InventoryDestroyed => "variantId",
        ComplianceEventType::ProductRecall => "productId",
        ComplianceEventType::IdVerification | ComplianceEventType::PurchaseLimitCheck => {
            "customerId"
        }
    };
    entry.details[key].as_str().unwrap_or_default().to_string()
}

/// Quote a field when it contains a delimiter, quote or line break.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render entries as CSV, one row per entry in the given order.
pub fn to_csv(entries: &[ComplianceLogEntry]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + entries.len() * 256);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let user = entry
            .actor_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        let row = [
            field(&entry.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            field(&user),
            field(&entry.event_type.action()),
            field(resource(entry.event_type)),
            field(&resource_id(entry)),
            field(severity(entry)),
            // Details are always quoted so consumers can rely on one shape.
            quoted(&entry.details.to_string()),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}
