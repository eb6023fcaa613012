// 会话模块
// 包含会话 ID 签名协议、负载模型、登录信息访问器和会话存储

pub mod accessors;
pub mod data;
pub mod signature;
pub mod store;

pub use accessors::OAuthToken;
pub use data::SessionData;
pub use signature::{COOKIE_VALUE_LENGTH, generate_signature, validate_session_id};
pub use store::Store;
