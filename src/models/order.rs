// src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use uuid::Uuid;

/// Closed order-state vocabulary. Unknown wire input is rejected with the
/// full list of valid states rather than defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
  Pending,
  InPreparation,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderState {
  pub const ALL: [OrderState; 5] = [
    OrderState::Pending,
    OrderState::InPreparation,
    OrderState::Shipped,
    OrderState::Delivered,
    OrderState::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderState::Pending => "pending",
      OrderState::InPreparation => "in_preparation",
      OrderState::Shipped => "shipped",
      OrderState::Delivered => "delivered",
      OrderState::Cancelled => "cancelled",
    }
  }

  /// Parses a wire value. The error message enumerates the valid states so
  /// clients can self-correct.
  pub fn parse(value: &str) -> Result<OrderState, String> {
    OrderState::ALL
      .iter()
      .copied()
      .find(|s| s.as_str() == value)
      .ok_or_else(|| {
        let valid: Vec<&str> = OrderState::ALL.iter().map(|s| s.as_str()).collect();
        format!("invalid order state '{}'. Valid states: {}", value, valid.join(", "))
      })
  }
}

impl std::fmt::Display for OrderState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Option<Uuid>,
  pub contact_email: String,
  pub contact_phone: String,
  pub subtotal_cents: i64,
  pub shipping_cost_cents: i64,
  pub total_cents: i64,
  pub state: OrderState,
  pub active: bool,
  pub shipping_address_id: Option<Uuid>,
  pub notes: String,
  pub created_at: DateTime<Utc>,
}

impl Order {
  /// Human-readable order number: `PN` + UTC timestamp at second resolution,
  /// plus a random suffix so concurrent checkouts within the same second do
  /// not collide.
  pub fn generate_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("PN{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..6])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn order_number_has_timestamp_and_suffix() {
    let now = Utc::now();
    let number = Order::generate_number(now);
    assert!(number.starts_with("PN"));
    // "PN" + 14 timestamp digits + "-" + 6 hex chars
    assert_eq!(number.len(), 2 + 14 + 1 + 6);
    assert_eq!(number.as_bytes()[16], b'-');
  }

  #[test]
  fn order_numbers_differ_within_one_second() {
    let now = Utc::now();
    assert_ne!(Order::generate_number(now), Order::generate_number(now));
  }

  #[test]
  fn parse_rejects_unknown_state_listing_valid_ones() {
    let err = OrderState::parse("not_a_state").unwrap_err();
    for state in OrderState::ALL {
      assert!(err.contains(state.as_str()), "missing {} in: {}", state, err);
    }
    assert_eq!(OrderState::parse("in_preparation").unwrap(), OrderState::InPreparation);
  }
}
