// 缓存模块
// 以会话 ID 为键读写编码后的负载，不设置缓存自身的过期时间

use redis::RedisResult;

pub mod memory;
pub mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// 会话缓存接口
///
/// 所有操作都是阻塞调用，传输层错误原样返回，不做重试。
pub trait SessionCache: Send + Sync {
    /// 未命中时返回 `Ok(None)`
    fn get(&self, key: &str) -> RedisResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> RedisResult<()>;
    fn delete(&self, key: &str) -> RedisResult<()>;
}
