//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use serde::{Deserialize, Serialize};
use settlement::CartView;
use store::Store;

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{AuthUser, ValidJson};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    #[serde(alias = "quantity")]
    pub new_quantity: u32,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub cart: CartView,
}

impl From<CartView> for CartResponse {
    fn from(cart: CartView) -> Self {
        Self {
            success: true,
            cart,
        }
    }
}

// -- Handlers --

/// POST /cart/add
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<AddToCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .add_to_cart(user.id, req.product_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// GET /cart
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
) -> Result<Json<CartResponse>, ApiError> {
    Ok(Json(state.carts.get_cart(user.id).await?.into()))
}

/// PUT /cart/update. A quantity of zero removes the line.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<UpdateCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .update_item(user.id, req.product_id, req.new_quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/remove/{productId}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    Ok(Json(state.carts.remove_item(user.id, product_id).await?.into()))
}
