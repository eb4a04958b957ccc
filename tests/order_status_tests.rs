// tests/order_status_tests.rs
mod common;

use common::*;
use tienda_norte::errors::AppError;
use tienda_norte::models::OrderState;
use tienda_norte::services::{checkout, orders};

async fn created_order(
  storage: &tienda_norte::storage::memory::MemoryStorage,
  product_id: uuid::Uuid,
) -> tienda_norte::services::checkout::HydratedOrder {
  checkout::create_order(storage, order_input(vec![line(product_id, 1, 10_000)], 0), &customer())
    .await
    .expect("seed order")
}

#[tokio::test]
async fn transition_updates_state_and_appends_history() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = created_order(&storage, p.id).await;
  let admin = admin();

  let (previous, new) = orders::change_state(&storage, order.order.id, "shipped", Some("dispatched".to_string()), &admin)
    .await
    .unwrap();
  assert_eq!(previous, OrderState::InPreparation);
  assert_eq!(new, OrderState::Shipped);

  let history = orders::fetch_history(&storage, order.order.id).await.unwrap();
  assert_eq!(history.len(), 2);
  // Newest first.
  assert_eq!(history[0].new_state, OrderState::Shipped);
  assert_eq!(history[0].previous_state, Some(OrderState::InPreparation));
  assert_eq!(history[0].changed_by, admin.user_id);
  assert_eq!(history[0].comment, "dispatched");

  let refreshed = checkout::fetch_order(&storage, order.order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::Shipped);
  assert!(refreshed.order.active);
}

#[tokio::test]
async fn unknown_state_is_rejected_with_the_valid_list_and_no_mutation() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = created_order(&storage, p.id).await;

  let err = orders::change_state(&storage, order.order.id, "not_a_state", None, &admin())
    .await
    .unwrap_err();
  match err {
    AppError::Validation(message) => {
      for state in OrderState::ALL {
        assert!(message.contains(state.as_str()), "missing {} in: {}", state, message);
      }
    }
    other => panic!("expected Validation, got {:?}", other),
  }

  let refreshed = checkout::fetch_order(&storage, order.order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::InPreparation);
  assert_eq!(orders::fetch_history(&storage, order.order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelling_deactivates_and_defaults_the_comment() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = created_order(&storage, p.id).await;

  orders::change_state(&storage, order.order.id, "cancelled", None, &admin())
    .await
    .unwrap();

  let refreshed = checkout::fetch_order(&storage, order.order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::Cancelled);
  assert!(!refreshed.order.active);

  let history = orders::fetch_history(&storage, order.order.id).await.unwrap();
  assert_eq!(history[0].comment, "order cancelled automatically");
}

#[tokio::test]
async fn deactivate_cancels_once_and_rejects_repeats() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = created_order(&storage, p.id).await;
  let admin = admin();

  orders::deactivate(&storage, order.order.id, &admin).await.unwrap();
  let refreshed = checkout::fetch_order(&storage, order.order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::Cancelled);
  assert!(!refreshed.order.active);

  let err = orders::deactivate(&storage, order.order.id, &admin).await.unwrap_err();
  match err {
    AppError::Conflict(message) => assert!(message.contains("already inactive"), "message: {}", message),
    other => panic!("expected Conflict, got {:?}", other),
  }
  // The rejected repeat appended nothing.
  assert_eq!(orders::fetch_history(&storage, order.order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn stats_cover_only_active_orders() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let kept = created_order(&storage, p.id).await;
  let cancelled = created_order(&storage, p.id).await;
  orders::deactivate(&storage, cancelled.order.id, &admin()).await.unwrap();

  let stats = orders::fetch_stats(&storage).await.unwrap();
  assert_eq!(stats.total_orders, 1);
  assert_eq!(stats.by_state["in_preparation"], 1);
  assert_eq!(stats.by_state["cancelled"], 0);
  assert_eq!(stats.total_sold_cents, kept.order.total_cents);
  assert_eq!(stats.orders_today, 1);
}

#[tokio::test]
async fn history_requires_an_existing_order() {
  setup_tracing();
  let storage = tienda_norte::storage::memory::MemoryStorage::new();
  let err = orders::fetch_history(&storage, uuid::Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound(_)));
}
