use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, middleware::session_middleware, routes};

// 会话相关的路由
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            get(routes::session::show_session).put(routes::session::put_value),
        )
        .route("/session/logout", post(routes::session::logout))
}

// 创建主路由，所有路由都经过会话中间件
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(session_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .with_state(state)
}
