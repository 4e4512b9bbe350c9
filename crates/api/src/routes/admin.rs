//! Staff endpoints for Admin and Owner roles.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use domain::OrderStatus;
use serde::{Deserialize, Serialize};
use settlement::OrderSummary;
use store::Store;

use super::orders::OrderResponse;
use super::parse_id;
use crate::error::ApiError;
use crate::extract::{AdminUser, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: OrderSummary,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: &'static str,
}

/// GET /admin/orders. Every order and the sum of their totals.
#[tracing::instrument(skip(state, admin), fields(actor = %admin.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let summary = state.settlement.all_orders(&admin).await?;
    Ok(Json(OrderSummaryResponse {
        success: true,
        summary,
    }))
}

/// PUT /admin/order/{id}
#[tracing::instrument(skip(state, admin, req), fields(actor = %admin.id))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let next: OrderStatus = req
        .status
        .parse()
        .map_err(|e: domain::DomainError| ApiError::BadRequest(e.to_string()))?;
    let order = state
        .settlement
        .update_order_status(&admin, order_id, next)
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /admin/order/{id}. Stock is not restored.
#[tracing::instrument(skip(state, admin), fields(actor = %admin.id))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    state.settlement.delete_order(&admin, order_id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: "Order deleted",
    }))
}
