// src/models/product.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub base_price_cents: i64,
  pub active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A size/color combination of a product. Variants are the true unit of
/// inventory: a product's available stock is the sum of its active variants'
/// stock, and stock never goes negative.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Variant {
  pub id: Uuid,
  pub product_id: Uuid,
  pub size: String,
  pub color: String,
  pub stock: i32,
  pub surcharge_cents: i64,
  pub active: bool,
}

impl Variant {
  /// Effective unit price for this variant given the owning product.
  pub fn unit_price_cents(&self, product: &Product) -> i64 {
    product.base_price_cents + self.surcharge_cents
  }
}
