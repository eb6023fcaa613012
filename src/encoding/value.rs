use std::collections::BTreeMap;

use ciborium::Value as CborValue;
use serde::Serialize;

use crate::error::CodecError;

/// 会话负载中的值
///
/// 负载在边界处没有固定类型，读取时必须检查实际解码出的变体，
/// 不同宽度的整数统一解码为 `Integer`。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Integer(i64::from(i))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<Value> for CborValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CborValue::Null,
            Value::Bool(b) => CborValue::Bool(b),
            Value::Integer(i) => CborValue::Integer(i.into()),
            Value::Float(f) => CborValue::Float(f),
            Value::String(s) => CborValue::Text(s),
            Value::Bytes(b) => CborValue::Bytes(b),
            Value::Array(items) => CborValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Map(map) => CborValue::Map(
                map.into_iter()
                    .map(|(k, v)| (CborValue::Text(k), v.into()))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<CborValue> for Value {
    type Error = CodecError;

    fn try_from(value: CborValue) -> Result<Self, Self::Error> {
        Ok(match value {
            CborValue::Null => Value::Null,
            CborValue::Bool(b) => Value::Bool(b),
            CborValue::Integer(i) => Value::Integer(
                i64::try_from(i)
                    .map_err(|_| CodecError::Decode("integer out of range".to_string()))?,
            ),
            CborValue::Float(f) => Value::Float(f),
            CborValue::Text(s) => Value::String(s),
            CborValue::Bytes(b) => Value::Bytes(b),
            CborValue::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            CborValue::Map(entries) => Value::Map(map_from_entries(entries)?),
            other => {
                return Err(CodecError::Decode(format!(
                    "unsupported value: {:?}",
                    other
                )));
            }
        })
    }
}

/// 将 CBOR 映射转换为字符串键映射，非字符串键视为解码失败
pub(crate) fn map_from_entries(
    entries: Vec<(CborValue, CborValue)>,
) -> Result<BTreeMap<String, Value>, CodecError> {
    entries
        .into_iter()
        .map(|(k, v)| match k {
            CborValue::Text(key) => Ok((key, Value::try_from(v)?)),
            other => Err(CodecError::Decode(format!(
                "map key is not a string: {:?}",
                other
            ))),
        })
        .collect()
}
