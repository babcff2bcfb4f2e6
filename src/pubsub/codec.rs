use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::SerializationError;

/// Структурная кодировка тела сообщения.
///
/// Издатель и подписчик одного topic должны использовать одну кодировку.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Json,
    #[serde(alias = "msgpack")]
    MessagePack,
}

impl Encoding {
    pub fn encode<T>(
        &self,
        value: &T,
    ) -> Result<Bytes, SerializationError>
    where
        T: Serialize + ?Sized,
    {
        let buf = match self {
            Self::Json => serde_json::to_vec(value).map_err(SerializationError::encode::<T>)?,
            Self::MessagePack => {
                rmp_serde::to_vec_named(value).map_err(SerializationError::encode::<T>)?
            }
        };
        Ok(Bytes::from(buf))
    }

    pub fn decode<T>(
        &self,
        data: &[u8],
    ) -> Result<T, SerializationError>
    where
        T: DeserializeOwned,
    {
        match self {
            Self::Json => serde_json::from_slice(data).map_err(SerializationError::decode::<T>),
            Self::MessagePack => {
                rmp_serde::from_slice(data).map_err(SerializationError::decode::<T>)
            }
        }
    }

    /// MIME-тип тела.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::MessagePack => "application/msgpack",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        customer: String,
        lines: Vec<(String, u32)>,
        note: Option<String>,
    }

    fn order() -> Order {
        Order {
            id: 42,
            customer: "ada".into(),
            lines: vec![("apple".into(), 3), ("pear".into(), 1)],
            note: None,
        }
    }

    #[rstest]
    #[case::json(Encoding::Json)]
    #[case::message_pack(Encoding::MessagePack)]
    fn test_round_trip(#[case] encoding: Encoding) {
        let bytes = encoding.encode(&order()).unwrap();
        let decoded: Order = encoding.decode(&bytes).unwrap();
        assert_eq!(decoded, order());
    }

    #[rstest]
    #[case::json(Encoding::Json)]
    #[case::message_pack(Encoding::MessagePack)]
    fn test_malformed_body_is_decode_error(#[case] encoding: Encoding) {
        let err = encoding.decode::<Order>(b"\xc1 definitely not a payload").unwrap_err();
        assert!(matches!(err, SerializationError::Decode { .. }));
        assert!(err.to_string().contains("Order"));
    }

    #[test]
    fn test_encode_error() {
        // JSON допускает только строковые ключи
        let mut map = BTreeMap::new();
        map.insert((1u8, 2u8), "x");
        let err = Encoding::Json.encode(&map).unwrap_err();
        assert!(matches!(err, SerializationError::Encode { .. }));
    }

    #[test]
    fn test_encoding_names() {
        let parsed: Encoding = serde_json::from_str(r#""message_pack""#).unwrap();
        assert_eq!(parsed, Encoding::MessagePack);
        let alias: Encoding = serde_json::from_str(r#""msgpack""#).unwrap();
        assert_eq!(alias, Encoding::MessagePack);
        assert_eq!(Encoding::default(), Encoding::Json);
        assert_eq!(Encoding::Json.content_type(), "application/json");
    }

    proptest! {
        #[test]
        fn prop_json_round_trip(id in any::<u64>(), customer in ".*", qty in any::<u32>()) {
            let value = Order { id, customer, lines: vec![("x".into(), qty)], note: Some("n".into()) };
            let first = Encoding::Json.encode(&value).unwrap();
            let decoded: Order = Encoding::Json.decode(&first).unwrap();
            prop_assert_eq!(&decoded, &value);
            prop_assert_eq!(Encoding::Json.encode(&decoded).unwrap(), first);
        }

        #[test]
        fn prop_msgpack_round_trip(values in proptest::collection::vec(any::<i64>(), 0..32)) {
            let bytes = Encoding::MessagePack.encode(&values).unwrap();
            let decoded: Vec<i64> = Encoding::MessagePack.decode(&bytes).unwrap();
            prop_assert_eq!(decoded, values);
        }
    }
}
