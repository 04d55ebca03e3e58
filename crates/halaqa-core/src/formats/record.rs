//! Versioned entity record encoding.
//!
//! Layout: `[RECORD_FORMAT_VERSION][postcard(Entity)]`.

use crate::Entity;
use crate::error::{Error, Result};
use crate::primitives::RECORD_FORMAT_VERSION;

/// Encode an entity for storage.
pub fn encode_entity(entity: &Entity) -> Result<Vec<u8>> {
    let mut bytes = vec![RECORD_FORMAT_VERSION];
    bytes.extend(postcard::to_allocvec(entity)?);
    Ok(bytes)
}

/// Decode a stored entity, rejecting unknown format versions.
pub fn decode_entity(bytes: &[u8]) -> Result<Entity> {
    match bytes.split_first() {
        Some((&RECORD_FORMAT_VERSION, body)) => Ok(postcard::from_bytes(body)?),
        Some((version, _)) => Err(Error::DataUnavailable(format!(
            "unsupported record format version {version}"
        ))),
        None => Err(Error::DataUnavailable("empty record".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityId, FieldValue};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn encoded_record_carries_version_and_all_field_types() {
        let at = Utc
            .with_ymd_and_hms(2026, 5, 1, 10, 30, 0)
            .single()
            .unwrap_or_default();
        let entity = Entity::new(EntityId(4), "kpi_value", at)
            .with("label", "Enrolment")
            .with("actual", 80.5)
            .with("period_start", NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default())
            .with("kpi_id", EntityId(1))
            .with("approved", true)
            .with("note", FieldValue::Null);

        let bytes = encode_entity(&entity).unwrap_or_default();
        assert_eq!(bytes.first(), Some(&RECORD_FORMAT_VERSION));
        assert_eq!(decode_entity(&bytes).ok(), Some(entity));
    }

    #[test]
    fn unknown_version_is_data_unavailable() {
        let err = decode_entity(&[99, 0, 0]);
        assert!(matches!(err, Err(Error::DataUnavailable(msg)) if msg.contains("99")));
        assert!(decode_entity(&[]).is_err());
    }
}
