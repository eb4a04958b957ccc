// src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use uuid::Uuid;

/// Domain payment states. This is the closed vocabulary the gateway's
/// status strings are folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
  Approved,
  Pending,
  InProcess,
  Rejected,
  Cancelled,
  Refunded,
  InMediation,
}

impl PaymentState {
  /// Maps the gateway's status vocabulary onto domain states. Anything the
  /// table does not know routes to `Pending`, a safe holding state that a
  /// later notification can move forward.
  pub fn from_gateway(status: &str) -> PaymentState {
    match status {
      "approved" => PaymentState::Approved,
      "pending" => PaymentState::Pending,
      "in_process" => PaymentState::InProcess,
      "rejected" => PaymentState::Rejected,
      "cancelled" => PaymentState::Cancelled,
      "refunded" => PaymentState::Refunded,
      "in_mediation" => PaymentState::InMediation,
      _ => PaymentState::Pending,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentState::Approved => "approved",
      PaymentState::Pending => "pending",
      PaymentState::InProcess => "in_process",
      PaymentState::Rejected => "rejected",
      PaymentState::Cancelled => "cancelled",
      PaymentState::Refunded => "refunded",
      PaymentState::InMediation => "in_mediation",
    }
  }
}

impl std::fmt::Display for PaymentState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One external payment attempt. Uniquely keyed by the gateway's payment id
/// once the gateway assigns one; until then the owning order's number
/// disambiguates. An order may accumulate several attempts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  pub order_number: String,
  pub gateway_payment_id: Option<String>,
  pub preference_id: Option<String>,
  pub amount_cents: i64,
  pub method: String,
  pub state: PaymentState,
  pub status_detail: Option<String>,
  pub payment_type: Option<String>,
  pub installments: i32,
  pub payer_email: Option<String>,
  pub merchant_order_id: Option<String>,
  pub paid_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gateway_statuses_map_onto_domain_states() {
    let table = [
      ("approved", PaymentState::Approved),
      ("pending", PaymentState::Pending),
      ("in_process", PaymentState::InProcess),
      ("rejected", PaymentState::Rejected),
      ("cancelled", PaymentState::Cancelled),
      ("refunded", PaymentState::Refunded),
      ("in_mediation", PaymentState::InMediation),
    ];
    for (gateway, domain) in table {
      assert_eq!(PaymentState::from_gateway(gateway), domain);
    }
  }

  #[test]
  fn unmapped_gateway_status_defaults_to_pending() {
    assert_eq!(PaymentState::from_gateway("charged_back"), PaymentState::Pending);
    assert_eq!(PaymentState::from_gateway(""), PaymentState::Pending);
  }
}
