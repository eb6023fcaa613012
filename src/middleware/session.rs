use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use parking_lot::Mutex;

use crate::{AppState, error::SessionError, session::SessionData};

/// 请求处理过程中共享的会话负载
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<HandleState>>,
}

#[derive(Default)]
struct HandleState {
    data: SessionData,
    clear_requested: bool,
}

impl SessionHandle {
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandleState {
                data,
                clear_requested: false,
            })),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionData) -> R) -> R {
        f(&self.inner.lock().data)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        f(&mut self.inner.lock().data)
    }

    /// 请求结束时销毁会话 (登出)，之后的写入会保存到新会话中
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.data = SessionData::default();
        state.clear_requested = true;
    }

    fn into_parts(self) -> (SessionData, bool) {
        let mut state = self.inner.lock();
        (std::mem::take(&mut state.data), state.clear_requested)
    }
}

/// 会话中间件
///
/// 请求前加载会话并以 `SessionHandle` 扩展提供给处理函数，
/// 请求后写回缓存并刷新 Cookie。缓存、解码和配置错误使请求失败。
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<(CookieJar, Response), SessionError> {
    let cookie_name = state.store_config.cookie_name.clone();
    let cookie_value = jar
        .get(&cookie_name)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    let mut store = state.new_store();
    let mut store = tokio::task::spawn_blocking(move || {
        store.load(&cookie_value)?;
        Ok::<_, SessionError>(store)
    })
    .await??;

    let handle = SessionHandle::new(store.take_data());
    request.extensions_mut().insert(handle.clone());

    let response = next.run(request).await;

    let (data, clear_requested) = handle.into_parts();
    let store = tokio::task::spawn_blocking(move || {
        // 登出后写入的数据跟随新 ID 保存
        if clear_requested {
            store.clear()?;
        }
        store.set_data(data);
        store.store()?;
        Ok::<_, SessionError>(store)
    })
    .await??;

    let cookie = Cookie::build((cookie_name, store.cookie_value()))
        .path("/")
        .http_only(true);

    Ok((jar.add(cookie), response))
}
