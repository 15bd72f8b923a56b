//! Run identity resolution
//!
//! External systems (Vercel AI SDK, custom webhooks) send arbitrary run
//! identifiers while the run store keys rows by UUID. Identifiers that already
//! look like a UUID pass through; everything else is mapped to a deterministic
//! fingerprint so re-ingesting the same external id always targets the same row.
//!
//! The fingerprint is UUID-v4 *shaped* only. Its version nibble is hardcoded
//! and the remaining digits come straight from a SHA-256 digest, so it carries
//! none of the randomness guarantees of a real v4 UUID. Collision behaviour
//! beyond "SHA-256 prefix" has not been analysed.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::events::EventError;

/// Length of a canonical hyphenated UUID string.
pub const UUID_LENGTH: usize = 36;

/// Return `id` unchanged when it has canonical UUID length, otherwise derive a
/// deterministic fingerprint from it.
///
/// The length check is approximate; it does not validate RFC 4122 layout.
pub fn ensure_uuid(id: Option<&str>) -> Option<String> {
    let id = id?;
    if id.chars().count() == UUID_LENGTH {
        Some(id.to_string())
    } else {
        Some(derive_uuid_from_seed(id))
    }
}

/// `ensure_uuid` over a loosely-typed payload field.
///
/// Non-string values (numbers, objects, null) resolve to `None`.
pub fn ensure_uuid_value(value: Option<&JsonValue>) -> Option<String> {
    ensure_uuid(value.and_then(JsonValue::as_str))
}

/// Deterministic UUID-shaped fingerprint of `seed`.
///
/// Groups the first 32 hex digits of SHA-256(seed) as 8-4-4-4-12 and overwrites
/// the version nibble (first digit of the third group) with `4`.
pub fn derive_uuid_from_seed(seed: &str) -> String {
    let hex = hex::encode(Sha256::digest(seed.as_bytes()));
    format!(
        "{}-{}-4{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[13..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Parse a resolved run identifier into a `Uuid` at the store boundary.
///
/// `ensure_uuid` lets any 36-character string through; those that are not
/// actually UUIDs are rejected here rather than reaching the store.
pub fn parse_run_id(id: &str) -> Result<Uuid, EventError> {
    Uuid::parse_str(id).map_err(|_| EventError::InvalidRunId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_uuid_is_deterministic() {
        let a = derive_uuid_from_seed("run-abc");
        let b = derive_uuid_from_seed("run-abc");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_uuid_differs_per_seed() {
        assert_ne!(
            derive_uuid_from_seed("run-abc"),
            derive_uuid_from_seed("run-abd")
        );
    }

    #[test]
    fn test_derive_uuid_shape() {
        let id = derive_uuid_from_seed("some external id");
        assert_eq!(id.len(), UUID_LENGTH);
        let groups: Vec<&str> = id.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'), "version nibble forced to 4");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_derive_uuid_known_digest_prefix() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        assert_eq!(
            derive_uuid_from_seed(""),
            "e3b0c442-98fc-4c14-9afb-f4c8996fb924"
        );
    }

    #[test]
    fn test_ensure_uuid_passes_through_uuid_length() {
        let id = "123e4567-e89b-12d3-a456-426614174000";
        assert_eq!(ensure_uuid(Some(id)).as_deref(), Some(id));
    }

    #[test]
    fn test_ensure_uuid_length_check_is_approximate() {
        let not_a_uuid = "x".repeat(UUID_LENGTH);
        assert_eq!(ensure_uuid(Some(&not_a_uuid)), Some(not_a_uuid.clone()));
        assert!(parse_run_id(&not_a_uuid).is_err());
    }

    #[test]
    fn test_ensure_uuid_derives_for_short_ids() {
        let derived = ensure_uuid(Some("msg_01")).unwrap();
        assert_eq!(derived, derive_uuid_from_seed("msg_01"));
    }

    #[test]
    fn test_ensure_uuid_none() {
        assert_eq!(ensure_uuid(None), None);
    }

    #[test]
    fn test_ensure_uuid_value_non_string() {
        assert_eq!(ensure_uuid_value(Some(&json!(42))), None);
        assert_eq!(ensure_uuid_value(Some(&json!(null))), None);
        assert_eq!(ensure_uuid_value(None), None);
        assert!(ensure_uuid_value(Some(&json!("abc"))).is_some());
    }
}
