// src/services/inventory.rs

//! Inventory ledger operations exposed to the admin API. The never-negative
//! invariant itself is enforced by the storage layer's atomic adjustment.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Product, Variant};
use crate::storage::{Storage, StoreError};

use super::commit_or_rollback;

/// Adds `quantity` units to a variant. Returns the new stock level.
pub async fn increase_stock(
  storage: &dyn Storage,
  product_id: Uuid,
  variant_id: Uuid,
  quantity: i32,
) -> Result<i32, AppError> {
  adjust_stock(storage, product_id, variant_id, quantity, 1).await
}

/// Removes `quantity` units from a variant, refusing to go below zero.
pub async fn decrease_stock(
  storage: &dyn Storage,
  product_id: Uuid,
  variant_id: Uuid,
  quantity: i32,
) -> Result<i32, AppError> {
  adjust_stock(storage, product_id, variant_id, quantity, -1).await
}

#[instrument(name = "service::adjust_stock", skip(storage))]
async fn adjust_stock(
  storage: &dyn Storage,
  product_id: Uuid,
  variant_id: Uuid,
  quantity: i32,
  sign: i32,
) -> Result<i32, AppError> {
  if quantity <= 0 {
    return Err(AppError::Validation("quantity must be greater than 0".to_string()));
  }
  let delta = quantity * sign;

  let mut session = storage.begin().await?;
  let result = async {
    let variant = session
      .variant_for_update(variant_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("variant {} not found", variant_id)))?;
    if variant.product_id != product_id {
      return Err(AppError::Validation(format!(
        "variant {} does not belong to product {}",
        variant_id, product_id
      )));
    }
    match session.adjust_variant_stock(variant_id, delta).await {
      Ok(stock) => Ok(stock),
      Err(StoreError::StockConflict { available, .. }) => Err(AppError::Conflict(format!(
        "insufficient stock for variant {}. Available: {}",
        variant_id, available
      ))),
      Err(other) => Err(other.into()),
    }
  }
  .await;
  let stock = commit_or_rollback(session, result).await?;
  info!(%variant_id, delta, stock, "Variant stock adjusted");
  Ok(stock)
}

/// Catalog reads used by the storefront collaborator.
pub async fn list_products(storage: &dyn Storage) -> Result<Vec<Product>, AppError> {
  let mut session = storage.begin().await?;
  let result = session.list_products().await.map_err(AppError::from);
  commit_or_rollback(session, result).await
}

pub async fn fetch_product(storage: &dyn Storage, product_id: Uuid) -> Result<(Product, Vec<Variant>), AppError> {
  let mut session = storage.begin().await?;
  let result = async {
    let product = session
      .product(product_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("product {} not found", product_id)))?;
    let variants = session.product_variants(product_id).await?;
    Ok((product, variants))
  }
  .await;
  commit_or_rollback(session, result).await
}
