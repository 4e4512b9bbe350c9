//! HTTP handlers, one module per resource.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment into one of the uuid identifier types.
pub(crate) fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what} id {raw}: {e}")))
}
