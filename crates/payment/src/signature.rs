//! HMAC-SHA256 request and callback signatures.
//!
//! The gateway signs a comma-joined list of `name=value` pairs, in the order
//! given by `signed_field_names`, and transports the MAC base64-encoded.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Field list signed on every outbound payment request.
pub const REQUEST_SIGNED_FIELDS: &str = "total_amount,transaction_uuid,product_code";

/// Builds the canonical string signed on payment initiation.
pub fn request_message(total_amount: &str, transaction_uuid: &str, product_code: &str) -> String {
    format!(
        "total_amount={total_amount},transaction_uuid={transaction_uuid},product_code={product_code}"
    )
}

/// Keyed signer, built once from the shared secret.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    pub fn new(secret_key: &str) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|e| PaymentError::Configuration(format!("invalid secret key: {e}")))?;
        Ok(Self { mac })
    }

    /// Base64 HMAC-SHA256 of `message`.
    pub fn sign(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Compares `signature` against the expected one in constant time.
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        let expected = self.sign(message);
        constant_time_eq::constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Signer(<redacted>)")
    }
}
