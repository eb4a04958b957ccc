// src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::checkout::{self, CreateOrderInput, HydratedOrder};
use crate::services::orders;
use crate::state::AppState;
use crate::web::identity::{AdminUser, AuthenticatedUser};

#[instrument(name = "handler::create_order", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateOrderInput>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = checkout::create_order(app_state.storage.as_ref(), payload.into_inner(), &auth_user.actor()).await?;
  Ok(HttpResponse::Created().json(order))
}

/// Non-admin callers only see their own, active orders; everything else is
/// indistinguishable from a missing order.
fn visible_to(order: &HydratedOrder, user: &AuthenticatedUser) -> bool {
  user.is_admin || (order.order.active && order.order.user_id == Some(user.user_id))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(order_id = %path.as_ref()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = checkout::fetch_order(app_state.storage.as_ref(), order_id).await?;
  if !visible_to(&order, &auth_user) {
    return Err(AppError::NotFound(format!("order {} not found", order_id)));
  }
  Ok(HttpResponse::Ok().json(order))
}

#[derive(Debug, Deserialize)]
pub struct ChangeStateRequest {
  #[serde(alias = "nuevo_estado")]
  pub new_state: String,
  #[serde(default, alias = "comentario")]
  pub comment: Option<String>,
}

#[instrument(name = "handler::change_order_state", skip(app_state, payload, admin), fields(order_id = %path.as_ref()))]
pub async fn change_state_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<ChangeStateRequest>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let (previous, new) = orders::change_state(
    app_state.storage.as_ref(),
    order_id,
    &payload.new_state,
    payload.comment.clone(),
    &admin.0.actor(),
  )
  .await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": format!("state changed from '{}' to '{}'", previous, new),
    "success": true
  })))
}

#[instrument(name = "handler::deactivate_order", skip(app_state, admin), fields(order_id = %path.as_ref()))]
pub async fn deactivate_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  orders::deactivate(app_state.storage.as_ref(), order_id, &admin.0.actor()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "order cancelled and deactivated",
    "active": false,
    "state": "cancelled",
    "success": true
  })))
}

#[instrument(name = "handler::order_history", skip(app_state, auth_user), fields(order_id = %path.as_ref()))]
pub async fn order_history_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = checkout::fetch_order(app_state.storage.as_ref(), order_id).await?;
  if !visible_to(&order, &auth_user) {
    return Err(AppError::NotFound(format!("order {} not found", order_id)));
  }
  let history = orders::fetch_history(app_state.storage.as_ref(), order_id).await?;
  Ok(HttpResponse::Ok().json(history))
}

#[instrument(name = "handler::order_stats", skip(app_state, _admin))]
pub async fn order_stats_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  let stats = orders::fetch_stats(app_state.storage.as_ref()).await?;
  info!(total_orders = stats.total_orders, "Order statistics computed");
  Ok(HttpResponse::Ok().json(stats))
}
