//! Redirect payment gateway adapter.
//!
//! Outbound requests are signed with HMAC-SHA256 over
//! `total_amount,transaction_uuid,product_code`. Inbound callbacks are
//! base64 JSON; they are only trusted after the gateway's status endpoint
//! confirms the transaction.

pub mod adapter;
pub mod callback;
pub mod config;
pub mod error;
pub mod gateway;
pub mod signature;

pub use adapter::{PaymentAdapter, PaymentForm, PaymentRequest};
pub use callback::{EsewaCallback, STATUS_COMPLETE};
pub use config::{DEFAULT_GATEWAY_TIMEOUT, DEFAULT_PRODUCT_CODE, GatewayConfig};
pub use error::{PaymentError, Result};
pub use gateway::{
    GatewayClient, GatewayStatus, HttpGatewayClient, InMemoryGatewayClient, StatusQuery,
};
pub use signature::{REQUEST_SIGNED_FIELDS, Signer, request_message};
