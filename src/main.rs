use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use session_handler::{
    AppState, cache::RedisCache, config::Config, encoding::Encoder, router::create_router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 连接缓存，启动时探测一次可用性
    let cache_url = config.cache_url();
    let cache_timeout = config.cache_timeout();
    let cache =
        tokio::task::spawn_blocking(move || RedisCache::connect(&cache_url, cache_timeout))
            .await
            .expect("Cache connection task panicked")
            .expect("Failed to connect to cache");

    let state = AppState {
        cache: Arc::new(cache),
        codec: Arc::new(Encoder),
        store_config: Arc::new(config.store_config()),
    };

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
