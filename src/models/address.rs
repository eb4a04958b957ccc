// src/models/address.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
  pub id: Uuid,
  pub street: String,
  pub number: String,
  pub unit: Option<String>,
  pub city: String,
  pub province: String,
  pub postal_code: String,
}
