// src/models/order_item.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Snapshot of one purchased product/variant at order-creation time. The
/// product name is denormalized so the line keeps displaying correctly even
/// if the catalog entry changes later. Immutable after creation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub variant_id: Option<Uuid>,
  pub product_name: String,
  pub quantity: i32,
  pub unit_price_cents: i64,
  pub subtotal_cents: i64,
}
