//! Decoding of the gateway's redirect callback.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use common::OrderId;
use serde_json::{Map, Value};

use crate::error::{PaymentError, Result};
use crate::signature::Signer;

/// Status the gateway reports for a finished payment.
pub const STATUS_COMPLETE: &str = "COMPLETE";

/// Callback data appended to the success URL.
///
/// The raw JSON object is kept so signed fields can be re-read by name.
#[derive(Debug, Clone)]
pub struct EsewaCallback {
    pub status: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub ref_id: Option<String>,
    pub signed_field_names: Option<String>,
    pub signature: Option<String>,
    fields: Map<String, Value>,
}

impl EsewaCallback {
    /// Decodes the base64 JSON payload.
    ///
    /// A `+` that reached us as a space through query decoding is restored.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim().replace(' ', "+"))
            .map_err(|e| PaymentError::MalformedCallback(format!("invalid base64: {e}")))?;
        let fields: Map<String, Value> = serde_json::from_slice(&bytes)
            .map_err(|e| PaymentError::MalformedCallback(format!("invalid JSON: {e}")))?;

        let required = |name: &str| {
            field_text(&fields, name)
                .ok_or_else(|| PaymentError::MalformedCallback(format!("missing field {name}")))
        };
        let status = required("status")?;
        let total_amount = required("total_amount")?;
        let transaction_uuid = required("transaction_uuid")?;
        let product_code = required("product_code")?;

        // eSewa documents the reference as `ref_id`; some responses call it
        // `transaction_code`.
        let ref_id =
            field_text(&fields, "ref_id").or_else(|| field_text(&fields, "transaction_code"));

        Ok(Self {
            status,
            total_amount,
            transaction_uuid,
            product_code,
            ref_id,
            signed_field_names: field_text(&fields, "signed_field_names"),
            signature: field_text(&fields, "signature"),
            fields,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.status == STATUS_COMPLETE
    }

    /// Checks the callback signature when the gateway sent one.
    ///
    /// Callbacks without `signature` and `signed_field_names` pass; the
    /// status endpoint is the authority either way.
    pub fn verify_signature(&self, signer: &Signer) -> Result<()> {
        let (Some(names), Some(signature)) = (&self.signed_field_names, &self.signature) else {
            return Ok(());
        };

        let mut pairs = Vec::new();
        for name in names.split(',') {
            let value = field_text(&self.fields, name).ok_or_else(|| {
                PaymentError::MalformedCallback(format!("signed field {name} is missing"))
            })?;
            pairs.push(format!("{name}={value}"));
        }

        if !signer.verify(&pairs.join(","), signature) {
            return Err(PaymentError::MalformedCallback(
                "signature mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// Order encoded in the transaction id as `<orderId>-<suffix>`.
    ///
    /// Order ids contain dashes themselves, so only the last one separates
    /// the suffix.
    pub fn order_id(&self) -> Result<OrderId> {
        let (prefix, _) = self.transaction_uuid.rsplit_once('-').ok_or_else(|| {
            PaymentError::MalformedCallback(format!(
                "transaction_uuid {} carries no order id",
                self.transaction_uuid
            ))
        })?;
        OrderId::from_str(prefix).map_err(|e| {
            PaymentError::MalformedCallback(format!("invalid order id {prefix}: {e}"))
        })
    }

    /// Paid amount in paisa.
    pub fn total_paisa(&self) -> Option<i64> {
        parse_amount(&self.total_amount)
    }

    /// Reference recorded on the order: the gateway's, else our transaction id.
    pub fn transaction_reference(&self) -> &str {
        self.ref_id.as_deref().unwrap_or(&self.transaction_uuid)
    }
}

/// Reads a field as text; the gateway sends amounts as strings or numbers.
fn field_text(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parses a decimal amount such as `1050`, `1050.0` or `1,050.00` to paisa.
pub(crate) fn parse_amount(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 && fraction[2..].bytes().any(|b| b != b'0') {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let mut paisa_digits: String = fraction.chars().take(2).collect();
    while paisa_digits.len() < 2 {
        paisa_digits.push('0');
    }
    let paisa: i64 = paisa_digits.parse().ok()?;
    whole.checked_mul(100)?.checked_add(paisa)
}
