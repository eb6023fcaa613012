use std::sync::Arc;

use cache::SessionCache;
use config::StoreConfig;
use encoding::PayloadCodec;
use session::Store;

pub mod cache;
pub mod config;
pub mod encoding;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod session;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn SessionCache>,
    pub codec: Arc<dyn PayloadCodec>,
    pub store_config: Arc<StoreConfig>,
}

impl AppState {
    /// 为单个请求创建会话存储，缓存连接在请求之间共享
    pub fn new_store(&self) -> Store {
        Store::new(
            self.cache.clone(),
            self.codec.clone(),
            self.store_config.clone(),
        )
    }
}
