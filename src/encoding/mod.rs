// 负载编码模块
// 结构化二进制编码 (CBOR + 校验和)，再做 base64 包装以便存入缓存

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD};
use ciborium::Value as CborValue;
use sha2::{Digest, Sha256};

use crate::{error::CodecError, session::SessionData};

pub mod value;

pub use value::Value;

/// 校验和长度 (SHA-256)
const CHECKSUM_LENGTH: usize = 32;

/// 负载编解码接口，便于在测试中替换
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, data: &SessionData) -> Result<String, CodecError>;
    fn decode(&self, raw: &str) -> Result<SessionData, CodecError>;
}

/// 默认编码器：CBOR 编码后 base64 包装
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder;

impl PayloadCodec for Encoder {
    fn encode(&self, data: &SessionData) -> Result<String, CodecError> {
        let bytes = encode_structured(&data.to_map())?;
        Ok(encode_base64(&bytes))
    }

    fn decode(&self, raw: &str) -> Result<SessionData, CodecError> {
        let bytes = decode_base64(raw)?;
        let map = decode_structured(&bytes)?;
        SessionData::from_map(map)
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

/// 编码字符串键映射，输出为 CBOR 字节后接其 SHA-256 摘要
pub fn encode_structured(map: &BTreeMap<String, Value>) -> Result<Vec<u8>, CodecError> {
    let root = CborValue::from(Value::Map(map.clone()));
    let mut bytes = Vec::new();
    ciborium::into_writer(&root, &mut bytes).map_err(|e| CodecError::Encode(e.to_string()))?;

    let checksum = Sha256::digest(&bytes);
    bytes.extend_from_slice(&checksum);
    Ok(bytes)
}

/// 校验摘要后解码，任何字节被改动都会返回错误
pub fn decode_structured(bytes: &[u8]) -> Result<BTreeMap<String, Value>, CodecError> {
    if bytes.len() < CHECKSUM_LENGTH {
        return Err(CodecError::Truncated);
    }

    let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LENGTH);
    if Sha256::digest(body).as_slice() != checksum {
        return Err(CodecError::Checksum);
    }

    let root: CborValue =
        ciborium::from_reader(body).map_err(|e| CodecError::Decode(e.to_string()))?;

    match root {
        CborValue::Map(entries) => value::map_from_entries(entries),
        other => Err(CodecError::Decode(format!(
            "payload root is not a map: {:?}",
            other
        ))),
    }
}
