//! Gateway payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::OrderId;
use domain::Order;
use payment::{PaymentError, PaymentRequest};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::extract::{AuthUser, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub order_id: OrderId,
}

/// Callback query appended to the success URL.
///
/// The gateway sends `data`; `encodedData` is accepted as well.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    #[serde(default)]
    pub encoded_data: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub request: PaymentRequest,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: Order,
}

/// POST /payment/initiate
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn initiate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<InitiateRequest>,
) -> Result<Json<InitiateResponse>, ApiError> {
    let request = state.payments.initiate(req.order_id).await?;
    Ok(Json(InitiateResponse {
        success: true,
        request,
    }))
}

/// GET /payment/verify. Reached by the browser redirect, so unauthenticated.
#[tracing::instrument(skip(state, query))]
pub async fn verify<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let encoded = query
        .encoded_data
        .or(query.data)
        .filter(|payload| !payload.trim().is_empty())
        .ok_or_else(|| {
            PaymentError::MalformedCallback("callback carries no payment data".to_string())
        })?;

    let order = state.payments.verify(&encoded).await?;
    Ok(Json(VerifyResponse {
        success: true,
        message: "Payment Verified and Order Updated",
        order,
    }))
}
