// src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::inventory;
use crate::state::AppState;
use crate::web::identity::AdminUser;

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let products = inventory::list_products(app_state.storage.as_ref()).await?;
  info!("Fetched {} products.", products.len());
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}

#[instrument(name = "handler::get_product", skip(app_state), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let (product, variants) = inventory::fetch_product(app_state.storage.as_ref(), path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "product": product,
    "variants": variants
  })))
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
  #[serde(alias = "cantidad")]
  pub quantity: i32,
}

#[instrument(name = "handler::increase_stock", skip(app_state, payload, _admin), fields(variant_id = %path.as_ref().1))]
pub async fn increase_stock_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(Uuid, Uuid)>,
  payload: web::Json<StockRequest>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let (product_id, variant_id) = path.into_inner();
  let stock = inventory::increase_stock(app_state.storage.as_ref(), product_id, variant_id, payload.quantity).await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "stock increased",
    "stock": stock
  })))
}

#[instrument(name = "handler::decrease_stock", skip(app_state, payload, _admin), fields(variant_id = %path.as_ref().1))]
pub async fn decrease_stock_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(Uuid, Uuid)>,
  payload: web::Json<StockRequest>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let (product_id, variant_id) = path.into_inner();
  let stock = inventory::decrease_stock(app_state.storage.as_ref(), product_id, variant_id, payload.quantity).await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "stock decreased",
    "stock": stock
  })))
}
