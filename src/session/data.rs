use std::collections::BTreeMap;

use chrono::Utc;

use crate::{encoding::Value, error::CodecError};

pub const EXPIRES_KEY: &str = "expires";
pub const LAST_ACCESS_KEY: &str = "last_access";
pub const EXPIRATION_KEY: &str = "expiration";

/// 会话负载
///
/// 时间相关字段统一使用 `i64` 秒，其余键原样保存在 `extra` 中。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    /// 过期时间 (Unix 时间戳)
    pub expires: Option<i64>,
    /// 最后访问时间 (Unix 时间戳)
    pub last_access: Option<i64>,
    /// 单个会话自定义的有效期 (秒)，覆盖默认值
    pub expiration: Option<i64>,
    pub extra: BTreeMap<String, Value>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.expires.is_none()
            && self.last_access.is_none()
            && self.expiration.is_none()
            && self.extra.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.extra.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// 从当前时间起延长 `period` 秒
    pub fn refresh_expiration(&mut self, period: i64) {
        self.refresh_expiration_at(Utc::now().timestamp(), period);
    }

    /// 以 `now` 为起点重新计算过期时间
    pub fn refresh_expiration_at(&mut self, now: i64, period: i64) {
        self.expires = Some(now.saturating_add(period));
        self.last_access = Some(now);
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.extra.clone();
        let known = [
            (EXPIRES_KEY, self.expires),
            (LAST_ACCESS_KEY, self.last_access),
            (EXPIRATION_KEY, self.expiration),
        ];
        for (key, value) in known {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::Integer(value));
            }
        }
        map
    }

    /// 从解码后的映射构建，已知字段类型不符视为解码失败
    pub fn from_map(mut map: BTreeMap<String, Value>) -> Result<Self, CodecError> {
        let expires = take_timestamp(&mut map, EXPIRES_KEY)?;
        let last_access = take_timestamp(&mut map, LAST_ACCESS_KEY)?;
        let expiration = take_timestamp(&mut map, EXPIRATION_KEY)?;

        Ok(Self {
            expires,
            last_access,
            expiration,
            extra: map,
        })
    }
}

fn take_timestamp(map: &mut BTreeMap<String, Value>, key: &str) -> Result<Option<i64>, CodecError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Integer(i)) => Ok(Some(i)),
        Some(_) => Err(CodecError::Schema(key.to_string())),
    }
}
