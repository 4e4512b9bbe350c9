//! Gateway settings.

use std::time::Duration;

use crate::error::{PaymentError, Result};

/// Merchant code of the public sandbox.
pub const DEFAULT_PRODUCT_CODE: &str = "EPAYTEST";

/// Upper bound for one status-endpoint call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Immutable gateway settings, loaded once at startup.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Form submission URL handed to the browser.
    pub initiate_url: String,
    /// Server-side transaction status endpoint.
    pub verify_url: String,
    /// Merchant code.
    pub product_code: String,
    /// Shared HMAC secret.
    pub secret_key: String,
    pub success_url: String,
    pub failure_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Sandbox endpoints with the given secret.
    pub fn sandbox(secret_key: impl Into<String>) -> Self {
        Self {
            initiate_url: "https://rc-epay.esewa.com.np/api/epay/main/v2/form".to_string(),
            verify_url: "https://rc.esewa.com.np/api/epay/transaction/status/".to_string(),
            product_code: DEFAULT_PRODUCT_CODE.to_string(),
            secret_key: secret_key.into(),
            success_url: "http://localhost:3000/payment/success".to_string(),
            failure_url: "http://localhost:3000/payment/failure".to_string(),
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    /// Rejects settings the gateway would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.secret_key.is_empty() {
            return Err(PaymentError::Configuration("secret key is empty".to_string()));
        }
        if self.product_code.trim().is_empty() {
            return Err(PaymentError::Configuration("product code is empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(PaymentError::Configuration("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("initiate_url", &self.initiate_url)
            .field("verify_url", &self.verify_url)
            .field("product_code", &self.product_code)
            .field("secret_key", &"<redacted>")
            .field("success_url", &self.success_url)
            .field("failure_url", &self.failure_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_is_valid() {
        let config = GatewayConfig::sandbox("8gBm/:&EnhH.1/q");
        assert!(config.validate().is_ok());
        assert_eq!(config.product_code, "EPAYTEST");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = GatewayConfig::sandbox("");
        assert!(matches!(
            config.validate(),
            Err(PaymentError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", GatewayConfig::sandbox("top-secret"));
        assert!(!rendered.contains("top-secret"));
    }
}
