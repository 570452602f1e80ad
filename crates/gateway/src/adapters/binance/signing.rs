use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::RestError;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `query` keyed by the API secret
pub fn sign_query(secret: &str, query: &str) -> Result<String, RestError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| RestError::Credentials("api secret"))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
