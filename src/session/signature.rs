// 会话 ID 与签名
// Cookie 值 = ID (28 字符) || 签名 (43 字符)，中间没有分隔符

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// ID 随机字节数，3 的倍数保证 base64 结果没有填充
pub const ID_OCTETS: usize = 7 * 3;
pub const ID_LENGTH: usize = ID_OCTETS / 3 * 4;
/// HMAC-SHA256 摘要 base64 后的长度
pub const SIGNATURE_LENGTH: usize = 43;
pub const COOKIE_VALUE_LENGTH: usize = ID_LENGTH + SIGNATURE_LENGTH;

/// 生成新的会话 ID，仅在系统随机源失败时出错
pub fn generate_id() -> Result<String, SessionError> {
    let mut octets = [0u8; ID_OCTETS];
    OsRng
        .try_fill_bytes(&mut octets)
        .map_err(|e| SessionError::Random(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(octets))
}

pub fn generate_signature(id: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(id.as_bytes());
    let mut signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    signature.truncate(SIGNATURE_LENGTH);
    signature
}

/// 校验 Cookie 值，成功时返回其中的会话 ID
///
/// 长度不足和签名不符都返回 `None`，调用方据此开始新会话。
pub fn validate_session_id<'a>(cookie_value: &'a str, secret: &str) -> Option<&'a str> {
    if cookie_value.len() < COOKIE_VALUE_LENGTH {
        return None;
    }

    let id = cookie_value.get(..ID_LENGTH)?;
    let signature = cookie_value.get(ID_LENGTH..)?;
    let expected = generate_signature(id, secret);

    if bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
        Some(id)
    } else {
        None
    }
}
