//! Opaque global identifiers: reversible encoding of (type name, raw primary
//! key). Every primary/foreign key crossing the API boundary is one of these;
//! raw keys never leave the storage layer.

use crate::error::OpError;
use crate::model::EntityDescriptor;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Decoded form of a global identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalId {
    pub type_name: String,
    pub key: String,
}

/// Encode (type name, raw key) into an opaque string.
pub fn encode(type_name: &str, key: &Value) -> String {
    let raw = match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    STANDARD.encode(format!("{type_name}:{raw}"))
}

/// Decode a previously encoded global identifier. Fails on anything that is
/// not base64-wrapped `type:key` with both parts non-empty.
pub fn decode(encoded: &str) -> Result<GlobalId, OpError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| OpError::Decode(encoded.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|_| OpError::Decode(encoded.to_string()))?;
    let (type_name, key) = text
        .split_once(':')
        .ok_or_else(|| OpError::Decode(encoded.to_string()))?;
    if type_name.is_empty() || key.is_empty() {
        return Err(OpError::Decode(encoded.to_string()));
    }
    Ok(GlobalId {
        type_name: type_name.to_string(),
        key: key.to_string(),
    })
}

/// Decode and check the embedded type name.
pub fn decode_expecting(encoded: &str, expected_type: &str) -> Result<GlobalId, OpError> {
    let gid = decode(encoded)?;
    if gid.type_name != expected_type {
        return Err(OpError::Decode(format!(
            "{encoded} (expected {expected_type}, got {})",
            gid.type_name
        )));
    }
    Ok(gid)
}

/// Coerce a decoded key to the value used in storage lookups: all-digit keys
/// become numbers, UUID-shaped and other keys pass through as strings. Both
/// integer and string primary keys are supported.
pub fn coerce_key(key: &str) -> Value {
    if Uuid::parse_str(key).is_ok() {
        return Value::String(key.to_string());
    }
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = key.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(key.to_string())
}

/// Decode every primary/foreign-key attribute of `record` in place, so raw
/// keys reach the storage collaborator. Non-key attributes and non-string
/// values are left untouched.
pub fn decode_record_keys(entity: &EntityDescriptor, record: &mut Map<String, Value>) -> Result<(), OpError> {
    for (name, value) in record.iter_mut() {
        if !entity.is_key_attribute(name) {
            continue;
        }
        if let Value::String(encoded) = value {
            let gid = decode(encoded)?;
            *value = coerce_key(&gid.key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDescriptor, AttributeKind};
    use serde_json::json;

    #[test]
    fn round_trip() {
        let encoded = encode("User", &json!(42));
        let gid = decode(&encoded).unwrap();
        assert_eq!(gid.type_name, "User");
        assert_eq!(gid.key, "42");
        assert_eq!(coerce_key(&gid.key), json!(42));
    }

    #[test]
    fn distinct_pairs_encode_distinctly() {
        assert_ne!(encode("User", &json!(1)), encode("Todo", &json!(1)));
        assert_ne!(encode("User", &json!(1)), encode("User", &json!(2)));
    }

    #[test]
    fn malformed_inputs_fail() {
        assert!(matches!(decode("not base64!!"), Err(OpError::Decode(_))));
        // valid base64, but no type:key separator
        let no_colon = STANDARD.encode("just-a-string");
        assert!(matches!(decode(&no_colon), Err(OpError::Decode(_))));
    }

    #[test]
    fn expected_type_enforced() {
        let encoded = encode("User", &json!(7));
        assert!(decode_expecting(&encoded, "User").is_ok());
        assert!(matches!(decode_expecting(&encoded, "Todo"), Err(OpError::Decode(_))));
    }

    #[test]
    fn string_and_uuid_keys_pass_through() {
        assert_eq!(coerce_key("abc-123"), json!("abc-123"));
        let uuid = "6e4ef9d0-5bd8-49c5-a30a-7e4c22a07a70";
        assert_eq!(coerce_key(uuid), json!(uuid));
    }

    #[test]
    fn record_keys_decoded_in_place() {
        let entity = EntityDescriptor {
            name: "Todo".into(),
            attributes: vec![
                AttributeDescriptor {
                    name: "id".into(),
                    kind: AttributeKind::Int,
                    nullable: false,
                    primary_key: true,
                    references: None,
                    auto_managed: false,
                },
                AttributeDescriptor {
                    name: "userId".into(),
                    kind: AttributeKind::Int,
                    nullable: true,
                    primary_key: false,
                    references: Some("User".into()),
                    auto_managed: false,
                },
                AttributeDescriptor {
                    name: "text".into(),
                    kind: AttributeKind::String,
                    nullable: false,
                    primary_key: false,
                    references: None,
                    auto_managed: false,
                },
            ],
            relationships: Default::default(),
        };
        let mut record = serde_json::Map::new();
        record.insert("userId".into(), json!(encode("User", &json!(9))));
        record.insert("text".into(), json!("keep me"));
        decode_record_keys(&entity, &mut record).unwrap();
        assert_eq!(record["userId"], json!(9));
        assert_eq!(record["text"], json!("keep me"));
    }
}
