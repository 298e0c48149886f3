//! Value codec — maps [`Value`] to and from column bytes.

use bytes::Bytes;

use crate::model::Value;
use crate::{Error, Result};

/// Byte codec for property values, metadata maps and adjacency info.
///
/// Shared by every concurrent decode, hence `Send + Sync`.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Bytes>;

    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// JSON codec using the tagged serde form of [`Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValueCodec;

impl ValueCodec for JsonValueCodec {
    fn encode(&self, value: &Value) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::Codec(format!("cannot encode {}: {e}", value.type_name())))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Codec(format!("cannot decode {} byte value: {e}", bytes.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoCircle, GeoPoint, LargeValueRef};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    #[test]
    fn test_tagged_representation() {
        let bytes = JsonValueCodec.encode(&Value::Int(7)).unwrap();
        assert_eq!(&bytes[..], br#"{"type":"Int","value":7}"#);
    }

    #[test]
    fn test_nested_values() {
        let mut m = HashMap::new();
        m.insert("when".to_string(), Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        m.insert("where".to_string(), Value::GeoPoint(GeoPoint::new(1.0, 2.0)));
        m.insert("area".to_string(), Value::GeoCircle(GeoCircle::new(1.0, 2.0, 3.0)));
        m.insert("tags".to_string(), Value::List(vec![Value::from("a"), Value::Null]));
        let value = Value::Map(m);
        let back = JsonValueCodec.decode(&JsonValueCodec.encode(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_large_value_ref_decodes_unbound() {
        let value = Value::LargeValueRef(LargeValueRef::new("blob-1", 2048));
        let back = JsonValueCodec.decode(&JsonValueCodec.encode(&value).unwrap()).unwrap();
        let r = back.as_large_value().unwrap();
        assert_eq!(r.locator(), "blob-1");
        assert!(!r.is_bound());
    }

    #[test]
    fn test_garbage_is_codec_error() {
        assert!(matches!(JsonValueCodec.decode(b"\x00\x01"), Err(Error::Codec(_))));
    }
}
