// src/services/orders.rs

//! Order lifecycle: the append-only state ledger and the soft delete.
//! Every state change goes through [`apply_transition`], which is where the
//! "cancelled implies inactive" invariant lives.

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Order, OrderState, StateHistoryEntry};
use crate::storage::{OrderStats, Storage, StorageSession};

use super::{commit_or_rollback, Actor};

/// Records a state change on an order: updates the row and appends the
/// ledger entry. `changed_by` is None for system-driven transitions.
/// Cancellation always deactivates the order and gets a default comment
/// when the caller supplied none.
pub(crate) async fn apply_transition(
  session: &mut dyn StorageSession,
  order: &Order,
  new_state: OrderState,
  changed_by: Option<Uuid>,
  comment: String,
) -> Result<(), AppError> {
  let active = if new_state == OrderState::Cancelled { false } else { order.active };
  let comment = if comment.is_empty() && new_state == OrderState::Cancelled {
    "order cancelled automatically".to_string()
  } else {
    comment
  };
  session.update_order_state(order.id, new_state, active).await?;
  session
    .insert_history(&StateHistoryEntry {
      id: Uuid::new_v4(),
      order_id: order.id,
      previous_state: Some(order.state),
      new_state,
      changed_by,
      comment,
      changed_at: Utc::now(),
    })
    .await?;
  Ok(())
}

/// Validates and applies an order-state change requested over the API.
/// Returns the (previous, new) pair for the response message.
#[instrument(name = "service::change_order_state", skip(storage, actor))]
pub async fn change_state(
  storage: &dyn Storage,
  order_id: Uuid,
  new_state_raw: &str,
  comment: Option<String>,
  actor: &Actor,
) -> Result<(OrderState, OrderState), AppError> {
  let new_state = OrderState::parse(new_state_raw).map_err(AppError::Validation)?;

  let mut session = storage.begin().await?;
  let result = async {
    let order = session
      .order(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
    let previous = order.state;
    apply_transition(
      session.as_mut(),
      &order,
      new_state,
      actor.user_id,
      comment.unwrap_or_default(),
    )
    .await?;
    Ok((previous, new_state))
  }
  .await;
  let (previous, new) = commit_or_rollback(session, result).await?;
  info!(%order_id, %previous, %new, "Order state changed");
  Ok((previous, new))
}

/// Soft delete: cancels and deactivates the order. Already-inactive orders
/// are rejected rather than silently re-cancelled.
#[instrument(name = "service::deactivate_order", skip(storage, actor))]
pub async fn deactivate(storage: &dyn Storage, order_id: Uuid, actor: &Actor) -> Result<(), AppError> {
  let mut session = storage.begin().await?;
  let result = async {
    let order = session
      .order(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
    if !order.active {
      return Err(AppError::Conflict("order is already inactive".to_string()));
    }
    apply_transition(
      session.as_mut(),
      &order,
      OrderState::Cancelled,
      actor.user_id,
      "order cancelled and deactivated".to_string(),
    )
    .await
  }
  .await;
  commit_or_rollback(session, result).await?;
  info!(%order_id, "Order deactivated");
  Ok(())
}

/// State ledger of an order, newest first.
pub async fn fetch_history(storage: &dyn Storage, order_id: Uuid) -> Result<Vec<StateHistoryEntry>, AppError> {
  let mut session = storage.begin().await?;
  let result = async {
    if session.order(order_id).await?.is_none() {
      return Err(AppError::NotFound(format!("order {} not found", order_id)));
    }
    Ok(session.order_history(order_id).await?)
  }
  .await;
  commit_or_rollback(session, result).await
}

pub async fn fetch_stats(storage: &dyn Storage) -> Result<OrderStats, AppError> {
  let mut session = storage.begin().await?;
  let result = session.order_stats().await.map_err(AppError::from);
  commit_or_rollback(session, result).await
}
