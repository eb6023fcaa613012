use std::collections::BTreeMap;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{encoding::Value, middleware::SessionHandle};

#[derive(Serialize)]
pub struct SessionView {
    pub signed_in: bool,
    pub expires: Option<i64>,
    pub last_access: Option<i64>,
    pub data: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
pub struct PutValueRequest {
    pub key: String,
    pub value: String,
}

pub async fn show_session(Extension(session): Extension<SessionHandle>) -> Json<SessionView> {
    Json(session.read(|data| SessionView {
        signed_in: data.is_signed_in(),
        expires: data.expires,
        last_access: data.last_access,
        data: data.extra.clone(),
    }))
}

pub async fn put_value(
    Extension(session): Extension<SessionHandle>,
    Json(req): Json<PutValueRequest>,
) -> impl IntoResponse {
    if req.key.is_empty() {
        return StatusCode::BAD_REQUEST;
    }

    session.update(|data| {
        data.insert(req.key, req.value);
    });
    StatusCode::NO_CONTENT
}

pub async fn logout(Extension(session): Extension<SessionHandle>) -> StatusCode {
    session.clear();
    StatusCode::NO_CONTENT
}
