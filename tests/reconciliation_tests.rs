// tests/reconciliation_tests.rs
mod common;

use common::*;
use tienda_norte::errors::AppError;
use tienda_norte::models::{OrderState, PaymentState};
use tienda_norte::services::reconciliation::{self, ConfirmInput, PaymentNotice, ReconcileOutcome};
use tienda_norte::services::{checkout, orders};
use tienda_norte::storage::memory::MemoryStorage;
use tienda_norte::storage::Storage;

async fn seeded_order(storage: &MemoryStorage, product_id: uuid::Uuid) -> tienda_norte::models::Order {
  checkout::create_order(storage, order_input(vec![line(product_id, 1, 10_000)], 0), &customer())
    .await
    .expect("seed order")
    .order
}

fn notice_for(order_id: uuid::Uuid, payment_id: i64, status: &str) -> PaymentNotice {
  PaymentNotice::from_gateway(&gateway_payment(payment_id, status, Some(order_id.to_string()), 100.0))
    .expect("payment carries an external reference")
}

#[tokio::test]
async fn first_notice_creates_the_payment_row() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;

  let outcome = reconciliation::reconcile(&storage, &notice_for(order.id, 42, "in_process"))
    .await
    .unwrap();
  let payment = match outcome {
    ReconcileOutcome::Updated(payment) => payment,
    other => panic!("expected Updated, got {:?}", other),
  };

  assert_eq!(payment.order_id, order.id);
  assert_eq!(payment.order_number, order.order_number);
  assert_eq!(payment.gateway_payment_id.as_deref(), Some("42"));
  assert_eq!(payment.state, PaymentState::InProcess);
  assert_eq!(payment.amount_cents, 10_000);
  assert_eq!(payment.method, "visa");
  assert_eq!(payment.installments, 3);
  assert_eq!(payment.payer_email.as_deref(), Some("payer@example.com"));
  assert_eq!(payment.merchant_order_id.as_deref(), Some("5550001"));
  assert!(payment.paid_at.is_none());
}

#[tokio::test]
async fn approval_timestamp_is_written_once() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;

  let first = match reconciliation::reconcile(&storage, &notice_for(order.id, 7, "approved"))
    .await
    .unwrap()
  {
    ReconcileOutcome::Updated(payment) => payment,
    other => panic!("expected Updated, got {:?}", other),
  };
  let paid_at = first.paid_at.expect("approval sets the timestamp");

  let second = match reconciliation::reconcile(&storage, &notice_for(order.id, 7, "approved"))
    .await
    .unwrap()
  {
    ReconcileOutcome::Updated(payment) => payment,
    other => panic!("expected Updated, got {:?}", other),
  };
  assert_eq!(second.paid_at, Some(paid_at));
  assert_eq!(second.id, first.id, "upsert must not create a second row");
}

#[tokio::test]
async fn repeated_approval_yields_exactly_one_preparation_entry() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;

  // Knock the order out of its starting state so the approval has a
  // transition to perform.
  orders::change_state(&storage, order.id, "pending", Some("awaiting payment".to_string()), &admin())
    .await
    .unwrap();

  reconciliation::reconcile(&storage, &notice_for(order.id, 9, "approved"))
    .await
    .unwrap();
  reconciliation::reconcile(&storage, &notice_for(order.id, 9, "approved"))
    .await
    .unwrap();

  let refreshed = checkout::fetch_order(&storage, order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::InPreparation);

  let history = orders::fetch_history(&storage, order.id).await.unwrap();
  let approvals: Vec<_> = history
    .iter()
    .filter(|h| h.previous_state == Some(OrderState::Pending) && h.new_state == OrderState::InPreparation)
    .collect();
  assert_eq!(approvals.len(), 1, "double delivery must not append twice");
  assert!(approvals[0].comment.contains("9"), "comment: {}", approvals[0].comment);
  assert!(approvals[0].changed_by.is_none(), "webhook transitions are system-driven");
}

#[tokio::test]
async fn rejection_cancels_the_order_once() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;

  reconciliation::reconcile(&storage, &notice_for(order.id, 11, "rejected"))
    .await
    .unwrap();

  let refreshed = checkout::fetch_order(&storage, order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::Cancelled);
  assert!(!refreshed.order.active);
  let history = orders::fetch_history(&storage, order.id).await.unwrap();
  assert_eq!(history.len(), 2);

  // Second identical delivery: payment updated, order untouched.
  reconciliation::reconcile(&storage, &notice_for(order.id, 11, "rejected"))
    .await
    .unwrap();
  assert_eq!(orders::fetch_history(&storage, order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn non_terminal_states_leave_the_order_alone() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;

  for status in ["pending", "in_process", "in_mediation", "refunded", "charged_back"] {
    reconciliation::reconcile(&storage, &notice_for(order.id, 100, status))
      .await
      .unwrap();
  }

  let refreshed = checkout::fetch_order(&storage, order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::InPreparation);
  assert!(refreshed.order.active);
  assert_eq!(orders::fetch_history(&storage, order.id).await.unwrap().len(), 1);

  // The unmapped trailing status fell back to the pending holding state.
  let mut session = storage.begin().await.unwrap();
  let payment = session.payment_by_gateway_id("100").await.unwrap().unwrap();
  assert_eq!(payment.state, PaymentState::Pending);
  session.rollback().await.unwrap();
}

#[tokio::test]
async fn unknown_order_is_a_soft_failure() {
  setup_tracing();
  let storage = MemoryStorage::new();

  let notice = notice_for(uuid::Uuid::new_v4(), 55, "approved");
  let outcome = reconciliation::reconcile(&storage, &notice).await.unwrap();
  assert!(matches!(outcome, ReconcileOutcome::OrderNotFound));

  // Nothing was recorded for the unmatchable notification.
  let mut session = storage.begin().await.unwrap();
  assert!(session.payment_by_gateway_id("55").await.unwrap().is_none());
  session.rollback().await.unwrap();

  // An external reference that is not even an order id gets the same
  // treatment.
  let mut notice = notice_for(uuid::Uuid::new_v4(), 56, "approved");
  notice.external_reference = "not-an-id".to_string();
  let outcome = reconciliation::reconcile(&storage, &notice).await.unwrap();
  assert!(matches!(outcome, ReconcileOutcome::OrderNotFound));
}

#[tokio::test]
async fn notice_without_external_reference_is_unreconcilable() {
  setup_tracing();
  assert!(PaymentNotice::from_gateway(&gateway_payment(1, "approved", None, 100.0)).is_none());
}

#[tokio::test]
async fn gateway_amount_is_converted_to_cents() {
  setup_tracing();
  let payment = gateway_payment(1, "approved", None, 150.75);
  assert_eq!(payment.amount_cents(), 15_075);
}

#[tokio::test]
async fn internal_confirmation_upserts_like_the_webhook() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;

  let input = ConfirmInput {
    order_id: order.id,
    payment_id: "777".to_string(),
    status: "approved".to_string(),
    status_detail: Some("accredited".to_string()),
    transaction_amount_cents: 10_000,
    payment_method_id: Some("master".to_string()),
    payer_email: Some("payer@example.com".to_string()),
    installments: Some(6),
  };
  let payment = reconciliation::confirm(&storage, &input).await.unwrap();
  assert_eq!(payment.state, PaymentState::Approved);
  assert_eq!(payment.method, "master");
  assert_eq!(payment.installments, 6);
  assert!(payment.paid_at.is_some());

  // Unknown order: the trusted path fails hard, unlike the webhook.
  let missing = ConfirmInput {
    order_id: uuid::Uuid::new_v4(),
    ..input
  };
  let err = reconciliation::confirm(&storage, &missing).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn manual_override_is_restricted_and_idempotent() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;
  let admin = admin();

  let created = match reconciliation::reconcile(&storage, &notice_for(order.id, 31, "pending"))
    .await
    .unwrap()
  {
    ReconcileOutcome::Updated(payment) => payment,
    other => panic!("expected Updated, got {:?}", other),
  };

  // The manual vocabulary is narrower than the gateway's.
  let err = reconciliation::set_state(&storage, created.id, "rejected", &admin)
    .await
    .unwrap_err();
  match err {
    AppError::Validation(message) => {
      assert!(message.contains("approved"), "message: {}", message);
      assert!(message.contains("pending"), "message: {}", message);
      assert!(message.contains("cancelled"), "message: {}", message);
    }
    other => panic!("expected Validation, got {:?}", other),
  }

  let approved = reconciliation::set_state(&storage, created.id, "approved", &admin)
    .await
    .unwrap();
  let paid_at = approved.paid_at.expect("manual approval sets the timestamp");

  let again = reconciliation::set_state(&storage, created.id, "approved", &admin)
    .await
    .unwrap();
  assert_eq!(again.paid_at, Some(paid_at), "repeating the call must not move the timestamp");
}

#[tokio::test]
async fn manual_cancellation_cancels_the_order_with_a_manual_comment() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order = seeded_order(&storage, p.id).await;
  let admin = admin();

  let created = match reconciliation::reconcile(&storage, &notice_for(order.id, 32, "pending"))
    .await
    .unwrap()
  {
    ReconcileOutcome::Updated(payment) => payment,
    other => panic!("expected Updated, got {:?}", other),
  };

  reconciliation::set_state(&storage, created.id, "cancelled", &admin)
    .await
    .unwrap();

  let refreshed = checkout::fetch_order(&storage, order.id).await.unwrap();
  assert_eq!(refreshed.order.state, OrderState::Cancelled);
  assert!(!refreshed.order.active);

  let history = orders::fetch_history(&storage, order.id).await.unwrap();
  assert!(history[0].comment.contains("manual override"), "comment: {}", history[0].comment);
  assert_eq!(history[0].changed_by, admin.user_id);
}

#[tokio::test]
async fn payments_can_be_listed_by_order_and_state() {
  setup_tracing();
  let (storage, p, _v) = storage_with_product("Ambo", 10_000, 10).await;
  let order_a = seeded_order(&storage, p.id).await;
  let order_b = seeded_order(&storage, p.id).await;

  reconciliation::reconcile(&storage, &notice_for(order_a.id, 61, "approved"))
    .await
    .unwrap();
  reconciliation::reconcile(&storage, &notice_for(order_a.id, 62, "rejected"))
    .await
    .unwrap();
  reconciliation::reconcile(&storage, &notice_for(order_b.id, 63, "pending"))
    .await
    .unwrap();

  let filter = reconciliation::PaymentFilter {
    order_id: Some(order_a.id),
    state: None,
  };
  assert_eq!(reconciliation::list_payments(&storage, &filter).await.unwrap().len(), 2);

  let filter = reconciliation::PaymentFilter {
    order_id: Some(order_a.id),
    state: Some(PaymentState::Approved),
  };
  let approved = reconciliation::list_payments(&storage, &filter).await.unwrap();
  assert_eq!(approved.len(), 1);
  assert_eq!(approved[0].gateway_payment_id.as_deref(), Some("61"));
}
