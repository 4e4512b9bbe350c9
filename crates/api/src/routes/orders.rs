//! Customer order endpoints: checkout, cancellation and queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use domain::{Money, Order, PaymentMethod, ShippingInfo};
use serde::{Deserialize, Serialize};
use settlement::PlaceOrder;
use store::Store;

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{AuthUser, ValidJson};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_info: ShippingInfo,
    #[serde(default)]
    pub payment_info: PaymentInfoRequest,
    /// Shipping charge in paisa.
    #[serde(default)]
    pub shipping_price: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentInfoRequest {
    #[serde(default)]
    pub method: PaymentMethod,
}

impl CreateOrderRequest {
    fn into_command(self, user_id: common::UserId) -> Result<PlaceOrder, ApiError> {
        self.shipping_info
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let shipping_price = Money::from_paisa(self.shipping_price)
            .non_negative()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(PlaceOrder {
            user_id,
            shipping_info: self.shipping_info,
            payment_method: self.payment_info.method,
            shipping_price,
        })
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            success: true,
            order,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCheckResponse {
    pub success: bool,
    pub has_purchased: bool,
}

// -- Handlers --

/// POST /order/new. Settles the caller's cart.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let command = req.into_command(user.id)?;
    let order = state.settlement.create_order(command).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /order/{id}. Owners and staff only.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.settlement.get_order(order_id, &user).await?.into()))
}

/// GET /orders/me
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn mine<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
) -> Result<Json<OrdersResponse>, ApiError> {
    let orders = state.settlement.my_orders(user.id).await?;
    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

/// PUT /order/cancel/{id}. Restores stock for every line.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.settlement.cancel_order(order_id, user.id).await?.into()))
}

/// GET /order/check-purchase/{productId}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn check_purchase<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<String>,
) -> Result<Json<PurchaseCheckResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    let has_purchased = state
        .settlement
        .check_product_purchase(user.id, product_id)
        .await?;
    Ok(Json(PurchaseCheckResponse {
        success: true,
        has_purchased,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "shippingInfo": { "address": "Thamel", "city": "Kathmandu", "phoneNo": "9800000000" }
        }))
        .unwrap();
        let command = req.into_command(common::UserId::new()).unwrap();
        assert_eq!(command.payment_method, PaymentMethod::Esewa);
        assert_eq!(command.shipping_price, Money::zero());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "shippingInfo": { "address": "", "city": "Kathmandu", "phoneNo": "9800000000" },
            "paymentInfo": { "method": "COD" }
        }))
        .unwrap();
        assert!(matches!(
            req.into_command(common::UserId::new()),
            Err(ApiError::BadRequest(_))
        ));

        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "shippingInfo": { "address": "Thamel", "city": "Kathmandu", "phoneNo": "9800000000" },
            "shippingPrice": -1
        }))
        .unwrap();
        assert!(matches!(
            req.into_command(common::UserId::new()),
            Err(ApiError::BadRequest(_))
        ));
    }
}
