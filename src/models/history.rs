// src/models/history.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::order::OrderState;

/// One entry of an order's append-only state ledger. Entries are never
/// updated or deleted; `changed_by` is None for system-driven transitions
/// (webhooks, automatic cancellations).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StateHistoryEntry {
  pub id: Uuid,
  pub order_id: Uuid,
  pub previous_state: Option<OrderState>,
  pub new_state: OrderState,
  pub changed_by: Option<Uuid>,
  pub comment: String,
  pub changed_at: DateTime<Utc>,
}
