//! `Value`s hold fully decoded bencode data. They own their contents and can be
//! cloned and traversed as often as needed.
//!
//! If the `serde` feature is enabled, `Value` also implements `Serialize` and
//! `Deserialize`.

use std::{collections::BTreeMap, str};

use crate::{Error, lexer::Lexer, parser::ValueParser};

/// A decoded bencode value.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Value {
    /// A byte string
    Bytes(Vec<u8>),
    /// A dictionary mapping byte strings to values
    Dict(BTreeMap<Vec<u8>, Value>),
    /// A signed integer
    Integer(i64),
    /// A list of values
    List(Vec<Value>),
}

impl Value {
    /// Decode the first value in `bytes`.
    ///
    /// Anything after the first value is ignored. Empty input is an
    /// [`Error::UnexpectedEof`].
    pub fn from_bencode(bytes: &[u8]) -> Result<Self, Error> {
        ValueParser::new()
            .next_value(&mut Lexer::new(bytes))?
            .ok_or(Error::UnexpectedEof)
    }

    /// Name of the variant, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "Bytes",
            Value::Dict(_) => "Dict",
            Value::Integer(_) => "Integer",
            Value::List(_) => "List",
        }
    }

    /// The integer, if this is one
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(integer) => Some(*integer),
            _ => None,
        }
    }

    /// The raw byte string, if this is one
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The byte string as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| str::from_utf8(bytes).ok())
    }

    /// The members, if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// The entries, if this is a dictionary
    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Look up `key` if this is a dictionary
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Value> {
        self.as_dict().and_then(|dict| dict.get(key.as_ref()))
    }
}

impl From<i64> for Value {
    fn from(integer: i64) -> Self {
        Value::Integer(integer)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Bytes(text.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self {
        Value::List(list)
    }
}

impl From<BTreeMap<Vec<u8>, Value>> for Value {
    fn from(dict: BTreeMap<Vec<u8>, Value>) -> Self {
        Value::Dict(dict)
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use std::fmt::{self, Formatter};

    use serde_ as serde;

    use serde::{
        Deserialize, Serialize,
        ser::{SerializeMap, SerializeSeq},
    };
    use serde_bytes::{ByteBuf, Bytes};

    use super::*;

    impl Serialize for Value {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::ser::Serializer,
        {
            match self {
                Value::Bytes(string) => serializer.serialize_bytes(string),
                Value::Integer(int) => serializer.serialize_i64(*int),
                Value::List(list) => {
                    let mut seed = serializer.serialize_seq(Some(list.len()))?;
                    for value in list {
                        seed.serialize_element(value)?;
                    }
                    seed.end()
                },
                Value::Dict(dict) => {
                    let mut seed = serializer.serialize_map(Some(dict.len()))?;
                    for (k, v) in dict {
                        seed.serialize_entry(Bytes::new(k), v)?;
                    }
                    seed.end()
                },
            }
        }
    }

    impl<'de> Deserialize<'de> for Value {
        #[inline]
        fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
        where
            D: serde::de::Deserializer<'de>,
        {
            deserializer.deserialize_any(Visitor)
        }
    }

    struct Visitor;

    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = Value;

        fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
            formatter.write_str("any valid BEncode value")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Value, E> {
            Ok(Value::Integer(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            i64::try_from(value)
                .map(Value::Integer)
                .map_err(|_| E::custom(format_args!("integer {value} does not fit in an i64")))
        }

        fn visit_bytes<E>(self, value: &[u8]) -> Result<Value, E> {
            Ok(Value::Bytes(value.to_vec()))
        }

        fn visit_str<E>(self, value: &str) -> Result<Value, E> {
            Ok(Value::Bytes(value.as_bytes().to_vec()))
        }

        fn visit_string<E>(self, value: String) -> Result<Value, E> {
            Ok(Value::Bytes(value.into_bytes()))
        }

        fn visit_byte_buf<E>(self, value: Vec<u8>) -> Result<Value, E> {
            Ok(Value::Bytes(value))
        }

        fn visit_seq<V>(self, mut access: V) -> Result<Value, V::Error>
        where
            V: serde::de::SeqAccess<'de>,
        {
            let mut list = Vec::new();
            while let Some(e) = access.next_element()? {
                list.push(e);
            }
            Ok(Value::List(list))
        }

        fn visit_map<V>(self, mut access: V) -> Result<Value, V::Error>
        where
            V: serde::de::MapAccess<'de>,
        {
            let mut map = BTreeMap::new();
            while let Some((k, v)) = access.next_entry::<ByteBuf, _>()? {
                map.insert(k.into_vec(), v);
            }
            Ok(Value::Dict(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(encoded: impl AsRef<[u8]>, expected: Value) {
        let encoded = encoded.as_ref();

        let decoded = match Value::from_bencode(encoded) {
            Ok(decoded) => decoded,
            Err(err) => panic!(
                "Failed to decode value from `{}`: {}",
                String::from_utf8_lossy(encoded),
                err,
            ),
        };

        assert_eq!(decoded, expected);
    }

    #[test]
    fn bytes() {
        case(b"3:\x01\x02\x03", Value::Bytes(vec![1, 2, 3]));
        case("4:spam", Value::from("spam"));
    }

    #[test]
    fn dict() {
        case("de", Value::Dict(BTreeMap::new()));

        let mut dict = BTreeMap::new();
        dict.insert(b"foo".to_vec(), Value::Integer(1));
        dict.insert(b"bar".to_vec(), Value::Integer(2));
        case("d3:bari2e3:fooi1ee", Value::Dict(dict));
    }

    #[test]
    fn integer() {
        case("i0e", Value::Integer(0));
        case("i-1e", Value::Integer(-1));
        case("i9223372036854775807e", Value::Integer(i64::MAX));
        case("i-9223372036854775808e", Value::Integer(i64::MIN));
    }

    #[test]
    fn list() {
        case("le", Value::List(Vec::new()));
        case(
            b"li0e3:\x01\x02\x03e",
            Value::List(vec![Value::Integer(0), Value::Bytes(vec![1, 2, 3])]),
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(Value::from_bencode(b""), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn accessors_should_match_variants() {
        let value = Value::from_bencode(b"d4:infod4:name4:teste3:numi7ee").unwrap();

        assert_eq!(value.name(), "Dict");
        assert_eq!(value.get("info").and_then(|info| info.get("name")), Some(&Value::from("test")));
        assert_eq!(value.get("info").unwrap().get(b"name").unwrap().as_str(), Some("test"));
        assert!(value.get("missing").is_none());
        assert!(value.as_integer().is_none());
        assert!(value.as_list().is_none());
        assert_eq!(value.as_dict().map(BTreeMap::len), Some(2));
        assert_eq!(value.get("num").and_then(Value::as_integer), Some(7));

        let list = Value::from(vec![Value::from(7), Value::from(&b"\xff"[..])]);
        assert_eq!(list.as_list().map(<[Value]>::len), Some(2));
        assert_eq!(list.as_list().unwrap()[0].as_integer(), Some(7));
        assert_eq!(list.as_list().unwrap()[1].as_bytes(), Some(&b"\xff"[..]));
        assert_eq!(list.as_list().unwrap()[1].as_str(), None);
        assert!(list.get("anything").is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_into_json() {
        let value = Value::from(vec![Value::from(1), Value::from("ab")]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1,[97,98]]");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_from_json() {
        let value: Value = serde_json::from_str(r#"{"b": [1, "x"], "a": -2}"#).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert(b"a".to_vec(), Value::Integer(-2));
        expected.insert(
            b"b".to_vec(),
            Value::List(vec![Value::Integer(1), Value::from("x")]),
        );
        assert_eq!(value, Value::Dict(expected));

        assert!(serde_json::from_str::<Value>("18446744073709551615").is_err());
    }
}
