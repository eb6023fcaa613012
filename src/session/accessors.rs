// 登录信息访问器
// 负载结构: signin_info.signed_in / signin_info.access_token.{access_token,refresh_token,expires_in}

use std::collections::BTreeMap;

use serde::Serialize;

use super::SessionData;
use crate::encoding::Value;

const SIGNIN_INFO: &str = "signin_info";
const SIGNED_IN: &str = "signed_in";
const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const EXPIRES_IN: &str = "expires_in";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl SessionData {
    fn signin_info(&self) -> Option<&BTreeMap<String, Value>> {
        self.get(SIGNIN_INFO)?.as_map()
    }

    fn token_map(&self) -> Option<&BTreeMap<String, Value>> {
        self.signin_info()?.get(ACCESS_TOKEN)?.as_map()
    }

    /// 取出 (必要时创建) access_token 映射，类型不符时覆盖
    fn token_map_mut(&mut self) -> &mut BTreeMap<String, Value> {
        let signin_info = ensure_map(&mut self.extra, SIGNIN_INFO);
        ensure_map(signin_info, ACCESS_TOKEN)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token_map()?.get(ACCESS_TOKEN)?.as_str()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token_map()?.get(REFRESH_TOKEN)?.as_str()
    }

    /// 令牌有效期 (秒)，不存在时为 0
    pub fn token_expires_in(&self) -> i64 {
        self.token_map()
            .and_then(|m| m.get(EXPIRES_IN))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    pub fn is_signed_in(&self) -> bool {
        self.signin_info()
            .and_then(|m| m.get(SIGNED_IN))
            .and_then(Value::as_i64)
            == Some(1)
    }

    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.token_map_mut()
            .insert(ACCESS_TOKEN.to_string(), Value::String(token.into()));
    }

    pub fn set_refresh_token(&mut self, token: impl Into<String>) {
        self.token_map_mut()
            .insert(REFRESH_TOKEN.to_string(), Value::String(token.into()));
    }

    pub fn set_signed_in(&mut self, signed_in: bool) {
        ensure_map(&mut self.extra, SIGNIN_INFO)
            .insert(SIGNED_IN.to_string(), Value::Integer(i64::from(signed_in)));
    }

    /// 仅在已登录且存在访问令牌时返回
    pub fn oauth_token(&self) -> Option<OAuthToken> {
        if !self.is_signed_in() {
            return None;
        }

        Some(OAuthToken {
            access_token: self.access_token()?.to_string(),
            refresh_token: self.refresh_token().map(str::to_string),
            expires_in: self.token_expires_in(),
        })
    }
}

fn ensure_map<'a>(map: &'a mut BTreeMap<String, Value>, key: &str) -> &'a mut BTreeMap<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Map(BTreeMap::new()));
    if entry.as_map().is_none() {
        *entry = Value::Map(BTreeMap::new());
    }
    match entry {
        Value::Map(inner) => inner,
        _ => unreachable!("entry was just replaced with a map"),
    }
}
