use std::sync::Arc;

use chrono::Utc;

use super::{SessionData, signature};
use crate::{
    cache::SessionCache, config::StoreConfig, encoding::PayloadCodec, error::SessionError,
};

/// 会话存储
///
/// 每个请求构建一个实例。`load` 之后总是持有一个负载 (恢复的会话或新的空会话)，
/// 请求结束时调用 `store` 写回缓存。同一 ID 的并发写入以最后一次为准。
pub struct Store {
    id: String,
    data: SessionData,
    cache: Arc<dyn SessionCache>,
    codec: Arc<dyn PayloadCodec>,
    config: Arc<StoreConfig>,
}

impl Store {
    pub fn new(
        cache: Arc<dyn SessionCache>,
        codec: Arc<dyn PayloadCodec>,
        config: Arc<StoreConfig>,
    ) -> Self {
        Self {
            id: String::new(),
            data: SessionData::default(),
            cache,
            codec,
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    pub fn set_data(&mut self, data: SessionData) {
        self.data = data;
    }

    pub fn take_data(&mut self) -> SessionData {
        std::mem::take(&mut self.data)
    }

    pub fn signature(&self) -> String {
        signature::generate_signature(&self.id, &self.config.cookie_secret)
    }

    /// 写回客户端的 Cookie 值：ID || 签名
    pub fn cookie_value(&self) -> String {
        format!("{}{}", self.id, self.signature())
    }

    /// 根据 Cookie 值加载会话
    ///
    /// 无效 Cookie、缓存未命中、空负载和过期会话都得到新的空会话；
    /// 只有缓存错误、解码错误和配置错误会返回 `Err`。
    pub fn load(&mut self, cookie_value: &str) -> Result<&SessionData, SessionError> {
        let Some(id) = signature::validate_session_id(cookie_value, &self.config.cookie_secret)
        else {
            tracing::info!("Session cookie missing or invalid, starting a new session");
            self.reset()?;
            return Ok(&self.data);
        };
        self.id = id.to_string();
        self.data = SessionData::default();

        let raw = match self.cache.get(&self.id) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::info!("No stored session for ID {}, starting a new session", self.id);
                self.reset()?;
                return Ok(&self.data);
            }
            Err(e) => {
                tracing::error!("Failed to fetch session {}: {}", self.id, e);
                return Err(e.into());
            }
        };

        let data = self.codec.decode(&raw).map_err(|e| {
            tracing::error!("Failed to decode session {}: {}", self.id, e);
            e
        })?;

        if data.is_empty() {
            tracing::info!("Stored session {} is empty, starting a new session", self.id);
            self.clear()?;
            return Ok(&self.data);
        }
        self.data = data;
        tracing::debug!("Loaded session {}: {:?}", self.id, self.data);

        let now = Utc::now().timestamp();
        match self.data.expires {
            None => self.setup_expiration(now)?,
            Some(expires) if expires <= now => {
                tracing::info!("Session {} expired at {}, starting a new session", self.id, expires);
                self.clear()?;
            }
            Some(_) => {}
        }

        Ok(&self.data)
    }

    /// 校验并持久化当前会话
    pub fn store(&mut self) -> Result<(), SessionError> {
        if self.data.is_empty() {
            tracing::info!("No session data to store for ID {}", self.id);
            return Ok(());
        }

        if self.id.is_empty() {
            self.regenerate_id()?;
        }

        if self.data.expires.is_none() {
            self.setup_expiration(Utc::now().timestamp())?;
        }

        tracing::debug!("Storing session {}: {:?}", self.id, self.data);
        let encoded = self.codec.encode(&self.data).map_err(|e| {
            tracing::error!("Failed to encode session {}: {}", self.id, e);
            e
        })?;

        self.cache.set(&self.id, &encoded).map_err(|e| {
            tracing::error!("Failed to store session {}: {}", self.id, e);
            e
        })?;

        tracing::info!("Session data successfully stored with ID: {}", self.id);
        Ok(())
    }

    /// 从缓存删除指定会话，未指定时删除当前会话；不影响已加载的负载
    pub fn delete(&self, id: Option<&str>) -> Result<(), SessionError> {
        let key = id.filter(|id| !id.is_empty()).unwrap_or(self.id.as_str());
        self.cache.delete(key).map_err(|e| {
            tracing::warn!("Failed to delete session {}: {}", key, e);
            e
        })?;
        Ok(())
    }

    /// 销毁当前会话并生成新 ID
    ///
    /// 删除失败只记录日志，新 ID 总会生成。
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if !self.id.is_empty() {
            if let Err(e) = self.delete(None) {
                tracing::warn!("Continuing with a new session ID after failed delete: {}", e);
            }
        }
        self.reset()
    }

    fn reset(&mut self) -> Result<(), SessionError> {
        self.data = SessionData::default();
        self.regenerate_id()
    }

    fn regenerate_id(&mut self) -> Result<(), SessionError> {
        self.id = signature::generate_id()?;
        Ok(())
    }

    /// 计算过期时间，优先使用会话自带的有效期
    fn setup_expiration(&mut self, now: i64) -> Result<(), SessionError> {
        let period = match self.data.expiration.filter(|p| *p > 0) {
            Some(period) => period,
            None => {
                let period = self.config.default_expiration()?;
                tracing::info!(
                    "Setting expiration period on session ID {} to {} seconds",
                    self.id,
                    period
                );
                period
            }
        };

        self.data.refresh_expiration_at(now, period);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use redis::{ErrorKind, RedisError, RedisResult};

    use super::*;
    use crate::{
        cache::MemoryCache,
        encoding::{Encoder, Value},
        session::signature::{COOKIE_VALUE_LENGTH, ID_LENGTH, generate_id, generate_signature},
    };

    const SECRET: &str = "test-secret";

    fn store_config(default_expiration: Option<&str>) -> Arc<StoreConfig> {
        Arc::new(StoreConfig {
            cookie_name: "__SID".into(),
            cookie_secret: SECRET.into(),
            default_expiration: default_expiration.map(str::to_string),
        })
    }

    fn store_with(cache: Arc<dyn SessionCache>) -> Store {
        Store::new(cache, Arc::new(Encoder), store_config(Some("60")))
    }

    fn signed_cookie(id: &str) -> String {
        format!("{}{}", id, generate_signature(id, SECRET))
    }

    fn encoded(data: &SessionData) -> String {
        Encoder.encode(data).unwrap()
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    fn redis_error(message: &'static str) -> RedisError {
        RedisError::from((ErrorKind::IoError, message))
    }

    /// 记录所有调用，可选地让每次调用失败
    #[derive(Default)]
    struct RecordingCache {
        inner: MemoryCache,
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingCache {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: String) -> RedisResult<()> {
            self.calls.lock().push(call);
            if self.fail {
                Err(redis_error("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    impl SessionCache for RecordingCache {
        fn get(&self, key: &str) -> RedisResult<Option<String>> {
            self.record(format!("get {}", key))?;
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> RedisResult<()> {
            self.record(format!("set {}", key))?;
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> RedisResult<()> {
            self.record(format!("delete {}", key))?;
            self.inner.delete(key)
        }
    }

    #[test]
    fn short_cookie_starts_a_fresh_session_without_touching_the_cache() {
        let cache = Arc::new(RecordingCache::default());
        let mut store = store_with(cache.clone());

        let almost = "x".repeat(COOKIE_VALUE_LENGTH - 1);
        for cookie in ["", "abc", almost.as_str()] {
            let data = store.load(cookie).unwrap();
            assert!(data.is_empty());
            assert_eq!(store.id().len(), ID_LENGTH);
        }
        assert!(cache.calls().is_empty());
    }

    #[test]
    fn forged_signature_is_never_fetched() {
        let cache = Arc::new(RecordingCache::default());
        let id = generate_id().unwrap();
        let mut stored = SessionData::default();
        stored.insert("k", "v");
        cache.inner.insert_raw(id.clone(), encoded(&stored));

        let forged = format!("{}{}", id, generate_signature(&id, "wrong-secret"));
        let mut store = store_with(cache.clone());
        assert!(store.load(&forged).unwrap().is_empty());
        assert_ne!(store.id(), id);
        assert!(cache.calls().is_empty());
    }

    #[test]
    fn cache_miss_yields_an_empty_session() {
        let cache = Arc::new(MemoryCache::new());
        let id = generate_id().unwrap();
        let mut store = store_with(cache);

        let data = store.load(&signed_cookie(&id)).unwrap();
        assert!(data.is_empty());
        assert!(!store.id().is_empty());
    }

    #[test]
    fn valid_session_is_loaded() {
        let cache = Arc::new(MemoryCache::new());
        let id = generate_id().unwrap();
        let mut stored = SessionData::default();
        stored.expires = Some(now() + 600);
        stored.insert("k", "v");
        cache.insert_raw(id.clone(), encoded(&stored));

        let mut store = store_with(cache);
        assert_eq!(store.load(&signed_cookie(&id)).unwrap(), &stored);
        assert_eq!(store.id(), id);
        assert_eq!(store.cookie_value(), signed_cookie(&id));
    }

    #[test]
    fn expired_session_is_treated_as_absent() {
        let cache = Arc::new(MemoryCache::new());
        let id = generate_id().unwrap();
        let mut stored = SessionData::default();
        stored.expires = Some(now() - 60);
        stored.insert("k", "v");
        cache.insert_raw(id.clone(), encoded(&stored));

        let mut store = store_with(cache.clone());
        assert!(store.load(&signed_cookie(&id)).unwrap().is_empty());
        assert_ne!(store.id(), id);
        assert!(cache.raw(&id).is_none());
    }

    #[test]
    fn missing_expiry_is_stamped_on_load() {
        let cache = Arc::new(MemoryCache::new());
        let id = generate_id().unwrap();
        let mut stored = SessionData::default();
        stored.insert("k", "v");
        cache.insert_raw(id.clone(), encoded(&stored));

        let mut store = store_with(cache);
        let before = now();
        let data = store.load(&signed_cookie(&id)).unwrap();
        let expires = data.expires.unwrap();
        assert!(expires >= before + 60 && expires <= now() + 60);
        assert_eq!(data.last_access.map(|t| expires - t), Some(60));
    }

    #[test]
    fn empty_stored_payload_resets_the_session() {
        let cache = Arc::new(MemoryCache::new());
        let id = generate_id().unwrap();
        cache.insert_raw(id.clone(), encoded(&SessionData::default()));

        let mut store = store_with(cache.clone());
        assert!(store.load(&signed_cookie(&id)).unwrap().is_empty());
        assert_ne!(store.id(), id);
        assert!(cache.raw(&id).is_none());
    }

    #[test]
    fn cache_errors_are_propagated_from_load() {
        let cache = Arc::new(RecordingCache::failing());
        let id = generate_id().unwrap();
        let mut store = store_with(cache);

        let err = store.load(&signed_cookie(&id)).unwrap_err();
        assert!(matches!(err, SessionError::Cache(_)));
    }

    #[test]
    fn corrupt_payload_is_a_hard_error() {
        let cache = Arc::new(MemoryCache::new());
        let id = generate_id().unwrap();
        cache.insert_raw(id.clone(), "definitely not a payload");

        let mut store = store_with(cache);
        let err = store.load(&signed_cookie(&id)).unwrap_err();
        assert!(matches!(err, SessionError::Codec(_)));
        assert!(store.data().is_empty());
    }

    #[test]
    fn fresh_store_assigns_id_and_expiry() {
        let cache = Arc::new(MemoryCache::new());
        let mut store = store_with(cache.clone());
        store.data_mut().insert("k", "v");

        let before = now();
        store.store().unwrap();

        assert_eq!(store.id().len(), ID_LENGTH);
        let data = store.data();
        let expires = data.expires.unwrap();
        assert!(expires >= before + 60 && expires <= now() + 60);

        let persisted = Encoder.decode(&cache.raw(store.id()).unwrap()).unwrap();
        assert_eq!(persisted.get("k"), Some(&Value::from("v")));
        assert_eq!(persisted.last_access, data.last_access);
        assert_eq!(persisted.expires, Some(expires));
        assert_eq!(persisted.extra.len(), 1);
    }

    #[test]
    fn stored_session_loads_back() {
        let cache = Arc::new(MemoryCache::new());
        let mut first = store_with(cache.clone());
        first.data_mut().insert("counter", 3i32);
        first.store().unwrap();

        let mut second = store_with(cache);
        let data = second.load(&first.cookie_value()).unwrap();
        assert_eq!(data.get("counter").and_then(Value::as_i64), Some(3));
        assert_eq!(second.id(), first.id());
    }

    #[test]
    fn per_session_expiration_overrides_the_default() {
        let cache = Arc::new(MemoryCache::new());
        let mut store = Store::new(cache, Arc::new(Encoder), store_config(None));
        store.data_mut().expiration = Some(300);
        store.data_mut().insert("k", "v");

        store.store().unwrap();
        let data = store.data();
        assert_eq!(data.expires.zip(data.last_access).map(|(e, l)| e - l), Some(300));
    }

    #[test]
    fn empty_payload_is_not_persisted() {
        let cache = Arc::new(RecordingCache::default());
        let mut store = store_with(cache.clone());
        store.store().unwrap();
        assert!(cache.calls().is_empty());
        assert!(store.id().is_empty());
    }

    #[test]
    fn missing_default_expiration_fails_store() {
        let cache = Arc::new(MemoryCache::new());
        let mut store = Store::new(cache.clone(), Arc::new(Encoder), store_config(None));
        store.data_mut().insert("k", "v");

        assert!(matches!(store.store(), Err(SessionError::Config(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_write_errors_are_propagated() {
        let cache = Arc::new(RecordingCache::failing());
        let mut store = store_with(cache);
        store.data_mut().insert("k", "v");
        assert!(matches!(store.store(), Err(SessionError::Cache(_))));
    }

    #[test]
    fn clear_deletes_and_regenerates() {
        let cache = Arc::new(RecordingCache::default());
        let mut store = store_with(cache.clone());
        store.id = "abc".to_string();
        store.data_mut().insert("k", "v");

        store.clear().unwrap();
        assert_eq!(cache.calls(), vec!["delete abc".to_string()]);
        assert_ne!(store.id(), "abc");
        assert!(store.data().is_empty());
    }

    #[test]
    fn clear_regenerates_even_when_delete_fails() {
        let cache = Arc::new(RecordingCache::failing());
        let mut store = store_with(cache.clone());
        store.id = "abc".to_string();
        store.data_mut().insert("k", "v");

        store.clear().unwrap();
        assert_eq!(cache.calls(), vec!["delete abc".to_string()]);
        assert_ne!(store.id(), "abc");
        assert!(store.data().is_empty());
    }

    #[test]
    fn delete_targets_the_given_id_or_the_current_one() {
        let cache = Arc::new(RecordingCache::default());
        let mut store = store_with(cache.clone());
        store.id = "current".to_string();

        store.delete(Some("other")).unwrap();
        store.delete(Some("")).unwrap();
        store.delete(None).unwrap();
        assert_eq!(
            cache.calls(),
            vec!["delete other", "delete current", "delete current"]
        );
        assert_eq!(store.id(), "current");
    }

    #[test]
    fn delete_propagates_cache_errors() {
        let cache = Arc::new(RecordingCache::failing());
        let mut store = store_with(cache);
        store.id = "abc".to_string();
        assert!(matches!(store.delete(None), Err(SessionError::Cache(_))));
    }

    #[test]
    fn nested_payload_survives_store_and_load() {
        let cache = Arc::new(MemoryCache::new());
        let mut first = store_with(cache.clone());
        first.data_mut().set_signed_in(true);
        first.data_mut().set_access_token("Foo");
        let mut profile = BTreeMap::new();
        profile.insert("email".to_string(), Value::from("user@example.com"));
        first.data_mut().insert("profile", profile);
        first.store().unwrap();

        let mut second = store_with(cache);
        let data = second.load(&first.cookie_value()).unwrap();
        assert!(data.is_signed_in());
        assert_eq!(data.access_token(), Some("Foo"));
        assert_eq!(data, first.data());
    }

    /// 字节长度小于 Cookie 值长度的任意字符串
    fn short_cookie() -> impl Strategy<Value = String> {
        prop_oneof!["[ -~]{0,70}", ".{0,17}"]
    }

    proptest! {
        #[test]
        fn any_short_cookie_loads_a_fresh_session(cookie in short_cookie()) {
            let cache = Arc::new(RecordingCache::default());
            let mut store = store_with(cache.clone());

            let data = store.load(&cookie).unwrap();
            prop_assert!(data.is_empty());
            prop_assert_eq!(store.id().len(), ID_LENGTH);
            prop_assert!(cache.calls().is_empty());
        }
    }
}
