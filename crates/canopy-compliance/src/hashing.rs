//! Integrity hashes for compliance log entries.
//!
//! An entry's hash is the hex SHA-256 of a canonical JSON document that
//! includes the previous entry's hash, chaining every entry of a
//! dispensary to all entries before it.

use canopy_core::models::compliance::{AppendComplianceLogEntry, ComplianceLogEntry};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ComplianceError;

/// The hashed view of an entry. Field order is fixed by this struct and
/// `details` object keys serialize sorted, so equal entries always
/// produce identical bytes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashInput<'a> {
    id: Uuid,
    tenant_id: Uuid,
    dispensary_id: Uuid,
    sequence: u64,
    event_type: &'static str,
    details: &'a Value,
    actor_id: Option<Uuid>,
    order_id: Option<Uuid>,
    created_at: String,
    previous_hash: Option<&'a str>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl<'a> From<&'a AppendComplianceLogEntry> for HashInput<'a> {
    fn from(e: &'a AppendComplianceLogEntry) -> Self {
        Self {
            id: e.id,
            tenant_id: e.tenant_id,
            dispensary_id: e.dispensary_id,
            sequence: e.sequence,
            event_type: e.event_type.as_str(),
            details: &e.details,
            actor_id: e.actor_id,
            order_id: e.order_id,
            created_at: timestamp(e.created_at),
            previous_hash: e.previous_hash.as_deref(),
        }
    }
}

impl<'a> From<&'a ComplianceLogEntry> for HashInput<'a> {
    fn from(e: &'a ComplianceLogEntry) -> Self {
        Self {
            id: e.id,
            tenant_id: e.tenant_id,
            dispensary_id: e.dispensary_id,
            sequence: e.sequence,
            event_type: e.event_type.as_str(),
            details: &e.details,
            actor_id: e.actor_id,
            order_id: e.order_id,
            created_at: timestamp(e.created_at),
            previous_hash: e.previous_hash.as_deref(),
        }
    }
}

/// Compute the hex-encoded SHA-256 integrity hash.
pub fn entry_hash(input: &HashInput<'_>) -> Result<String, ComplianceError> {
    let canonical =
        serde_json::to_vec(input).map_err(|e| ComplianceError::Hashing(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

/// Whether a stored entry's hash matches its contents.
pub fn verify_entry(entry: &ComplianceLogEntry) -> Result<bool, ComplianceError> {
    Ok(entry_hash(&HashInput::from(entry))? == entry.hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::models::compliance::ComplianceEventType;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry() -> ComplianceLogEntry {
        ComplianceLogEntry {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            dispensary_id: Uuid::nil(),
            sequence: 0,
            event_type: ComplianceEventType::Sale,
            details: json!({ "total": 145.0, "orderNumber": "ORD-1" }),
            actor_id: None,
            order_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap(),
            previous_hash: None,
            hash: String::new(),
        }
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = entry_hash(&HashInput::from(&entry())).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn detail_key_order_does_not_matter() {
        let mut a = entry();
        let mut b = entry();
        a.details = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        b.details = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(
            entry_hash(&HashInput::from(&a)).unwrap(),
            entry_hash(&HashInput::from(&b)).unwrap()
        );
    }

    #[test]
    fn any_field_change_changes_hash() {
        let base = entry();
        let original = entry_hash(&HashInput::from(&base)).unwrap();

        let mut edited = base.clone();
        edited.details = json!({ "total": 14.5, "orderNumber": "ORD-1" });
        assert_ne!(entry_hash(&HashInput::from(&edited)).unwrap(), original);

        let mut relinked = base.clone();
        relinked.previous_hash = Some("00".repeat(32));
        assert_ne!(entry_hash(&HashInput::from(&relinked)).unwrap(), original);

        let mut resequenced = base;
        resequenced.sequence = 1;
        assert_ne!(entry_hash(&HashInput::from(&resequenced)).unwrap(), original);
    }

    #[test]
    fn verify_detects_tampering() {
        let mut stored = entry();
        stored.hash = entry_hash(&HashInput::from(&stored)).unwrap();
        assert!(verify_entry(&stored).unwrap());

        stored.details["total"] = json!(1.0);
        assert!(!verify_entry(&stored).unwrap());
    }
}
