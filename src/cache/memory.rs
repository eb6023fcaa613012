use std::collections::HashMap;

use parking_lot::Mutex;
use redis::RedisResult;

use super::SessionCache;

/// 进程内会话缓存，用于测试和本地运行
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接读取原始存储值
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionCache for MemoryCache {
    fn get(&self, key: &str) -> RedisResult<Option<String>> {
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str) -> RedisResult<()> {
        self.insert_raw(key, value);
        Ok(())
    }

    fn delete(&self, key: &str) -> RedisResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
