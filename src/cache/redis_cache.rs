use std::time::Duration;

use parking_lot::Mutex;
use redis::{Client as RedisClient, Commands, Connection, RedisResult};

use super::SessionCache;

/// 空闲连接上限，超出的连接用完即关闭
const MAX_IDLE_CONNECTIONS: usize = 16;

/// 基于 Redis 的会话缓存
///
/// 维护一组空闲连接，每次调用独占一条，网络读写期间不持有锁。
/// 断开的连接直接丢弃，下一次调用时重新建立，出错的那次调用仍然返回原始错误。
pub struct RedisCache {
    client: RedisClient,
    timeout: Option<Duration>,
    pool: IdlePool<Connection>,
}

impl RedisCache {
    /// 建立连接并用 PING 探测可用性
    pub fn connect(url: &str, timeout: Option<Duration>) -> RedisResult<Self> {
        if timeout.is_none() {
            tracing::warn!(
                "No cache timeout configured, a stalled cache call will block its request"
            );
        }

        let client = RedisClient::open(url)?;
        let mut connection = open_connection(&client, timeout)?;

        let pong: String = redis::cmd("PING").query(&mut connection)?;
        tracing::info!("Cache connection verified: {}", pong);

        let pool = IdlePool::new(MAX_IDLE_CONNECTIONS);
        pool.put_back(connection);

        Ok(Self {
            client,
            timeout,
            pool,
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> RedisResult<T> {
        let mut connection = match self.pool.take() {
            Some(connection) => connection,
            None => {
                tracing::debug!("Opening cache connection");
                open_connection(&self.client, self.timeout)?
            }
        };

        let result = op(&mut connection);
        match &result {
            Err(e) if e.is_connection_dropped() || e.is_unrecoverable_error() => {
                tracing::warn!("Discarding broken cache connection: {}", e);
            }
            _ => {
                self.pool.put_back(connection);
            }
        }
        result
    }
}

/// 空闲资源栈，锁只在取出和归还时持有
struct IdlePool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T> IdlePool<T> {
    fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    fn take(&self) -> Option<T> {
        self.idle.lock().pop()
    }

    /// 归还资源，空闲数已满时丢弃并返回 `false`
    fn put_back(&self, item: T) -> bool {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(item);
            true
        } else {
            false
        }
    }
}

impl SessionCache for RedisCache {
    fn get(&self, key: &str) -> RedisResult<Option<String>> {
        self.with_connection(|conn| {
            let value: Option<String> = conn.get(key)?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> RedisResult<()> {
        // 不设置 TTL，过期由负载中的 expires 字段控制
        self.with_connection(|conn| {
            let _: () = conn.set(key, value)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> RedisResult<()> {
        self.with_connection(|conn| {
            let _: () = conn.del(key)?;
            Ok(())
        })
    }
}

fn open_connection(client: &RedisClient, timeout: Option<Duration>) -> RedisResult<Connection> {
    let Some(timeout) = timeout else {
        return client.get_connection();
    };

    let connection = client.get_connection_with_timeout(timeout)?;
    connection.set_read_timeout(Some(timeout))?;
    connection.set_write_timeout(Some(timeout))?;
    Ok(connection)
}
