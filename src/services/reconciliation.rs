// src/services/reconciliation.rs

//! Payment reconciliation: folds gateway notifications into local payment
//! and order state. Safe to invoke repeatedly with the same terminal
//! gateway status: the order side effects are keyed off the mapped state
//! and guarded against duplicates.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::gateway::GatewayPayment;
use crate::models::{Order, OrderState, Payment, PaymentState};
use crate::storage::{Storage, StorageSession};

use super::orders::apply_transition;
use super::{commit_or_rollback, Actor};

/// Everything the engine needs to know about one gateway notification,
/// already flattened out of the gateway's wire shape.
#[derive(Debug, Clone)]
pub struct PaymentNotice {
  pub gateway_payment_id: String,
  /// Our order id, as echoed back by the gateway.
  pub external_reference: String,
  pub gateway_status: String,
  pub amount_cents: i64,
  pub status_detail: Option<String>,
  pub payment_method: Option<String>,
  pub payment_type: Option<String>,
  pub installments: Option<i32>,
  pub payer_email: Option<String>,
  pub merchant_order_id: Option<String>,
}

impl PaymentNotice {
  /// Flattens a gateway payment lookup. None when the payment carries no
  /// external reference, since there is nothing to reconcile against.
  pub fn from_gateway(payment: &GatewayPayment) -> Option<Self> {
    let external_reference = payment.external_reference.clone()?;
    Some(Self {
      gateway_payment_id: payment.id.to_string(),
      external_reference,
      gateway_status: payment.status.clone(),
      amount_cents: payment.amount_cents(),
      status_detail: payment.status_detail.clone(),
      payment_method: payment.payment_method_id.clone(),
      payment_type: payment.payment_type_id.clone(),
      installments: payment.installments,
      payer_email: payment.payer.as_ref().and_then(|p| p.email.clone()),
      merchant_order_id: payment.order.as_ref().and_then(|o| o.id).map(|id| id.to_string()),
    })
  }
}

/// Outcome of a reconciliation attempt. `OrderNotFound` is a soft failure:
/// the webhook boundary acknowledges it with a success-shaped response so
/// the gateway does not retry a notification we can never satisfy.
#[derive(Debug)]
pub enum ReconcileOutcome {
  Updated(Payment),
  OrderNotFound,
}

#[instrument(name = "service::reconcile", skip(storage, notice), fields(gateway_payment_id = %notice.gateway_payment_id, gateway_status = %notice.gateway_status))]
pub async fn reconcile(storage: &dyn Storage, notice: &PaymentNotice) -> Result<ReconcileOutcome, AppError> {
  let order_id = match Uuid::parse_str(&notice.external_reference) {
    Ok(id) => id,
    Err(_) => {
      warn!(external_reference = %notice.external_reference, "External reference is not an order id");
      return Ok(ReconcileOutcome::OrderNotFound);
    }
  };

  let mut session = storage.begin().await?;
  let order = match session.order(order_id).await {
    Ok(Some(order)) => order,
    Ok(None) => {
      warn!(%order_id, "Order referenced by gateway notification does not exist");
      let _ = session.rollback().await;
      return Ok(ReconcileOutcome::OrderNotFound);
    }
    Err(err) => {
      let _ = session.rollback().await;
      return Err(err.into());
    }
  };

  let result = apply_notice(session.as_mut(), &order, notice, None, false).await;
  let payment = commit_or_rollback(session, result).await?;
  Ok(ReconcileOutcome::Updated(payment))
}

/// Trusted internal confirmation ({order id, payment details} from a caller
/// that already talked to the gateway). Same upsert and side-effect path as
/// the webhook, but an unknown order here is a hard not-found.
#[derive(Debug, Deserialize)]
pub struct ConfirmInput {
  #[serde(alias = "pedido_id")]
  pub order_id: Uuid,
  pub payment_id: String,
  pub status: String,
  #[serde(default)]
  pub status_detail: Option<String>,
  pub transaction_amount_cents: i64,
  #[serde(default)]
  pub payment_method_id: Option<String>,
  #[serde(default)]
  pub payer_email: Option<String>,
  #[serde(default)]
  pub installments: Option<i32>,
}

#[instrument(name = "service::confirm_payment", skip(storage, input), fields(order_id = %input.order_id, payment_id = %input.payment_id))]
pub async fn confirm(storage: &dyn Storage, input: &ConfirmInput) -> Result<Payment, AppError> {
  let notice = PaymentNotice {
    gateway_payment_id: input.payment_id.clone(),
    external_reference: input.order_id.to_string(),
    gateway_status: input.status.clone(),
    amount_cents: input.transaction_amount_cents,
    status_detail: input.status_detail.clone(),
    payment_method: input.payment_method_id.clone(),
    payment_type: None,
    installments: input.installments,
    payer_email: input.payer_email.clone(),
    merchant_order_id: None,
  };

  let mut session = storage.begin().await?;
  let result = async {
    let order = session
      .order(input.order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", input.order_id)))?;
    apply_notice(session.as_mut(), &order, &notice, None, false).await
  }
  .await;
  commit_or_rollback(session, result).await
}

/// States an administrator may force a payment into. A narrower vocabulary
/// than the gateway's.
pub const MANUAL_STATES: [PaymentState; 3] = [PaymentState::Approved, PaymentState::Pending, PaymentState::Cancelled];

/// Manual override from the admin path. Mirrors the webhook's order side
/// effects, with ledger comments marking the manual origin.
#[instrument(name = "service::set_payment_state", skip(storage, actor))]
pub async fn set_state(
  storage: &dyn Storage,
  payment_id: Uuid,
  new_state_raw: &str,
  actor: &Actor,
) -> Result<Payment, AppError> {
  let new_state = MANUAL_STATES
    .iter()
    .copied()
    .find(|s| s.as_str() == new_state_raw)
    .ok_or_else(|| {
      let valid: Vec<&str> = MANUAL_STATES.iter().map(|s| s.as_str()).collect();
      AppError::Validation(format!(
        "invalid payment state '{}'. Valid states: {}",
        new_state_raw,
        valid.join(", ")
      ))
    })?;

  let mut session = storage.begin().await?;
  let result = async {
    let mut payment = session
      .payment(payment_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("payment {} not found", payment_id)))?;
    payment.state = new_state;
    if new_state == PaymentState::Approved && payment.paid_at.is_none() {
      payment.paid_at = Some(Utc::now());
    }
    session.update_payment(&payment).await?;

    let order = session
      .order(payment.order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", payment.order_id)))?;
    let payment_ref = payment
      .gateway_payment_id
      .clone()
      .unwrap_or_else(|| payment.id.to_string());
    apply_order_side_effect(session.as_mut(), &order, new_state, &payment_ref, actor.user_id, true).await?;
    Ok(payment)
  }
  .await;
  let payment = commit_or_rollback(session, result).await?;
  info!(%payment_id, state = %payment.state, "Payment state set manually");
  Ok(payment)
}

/// Upserts the payment row keyed by the gateway payment id, then drives the
/// order forward off the newly mapped state.
async fn apply_notice(
  session: &mut dyn StorageSession,
  order: &Order,
  notice: &PaymentNotice,
  changed_by: Option<Uuid>,
  manual: bool,
) -> Result<Payment, AppError> {
  let mapped = PaymentState::from_gateway(&notice.gateway_status);
  let now = Utc::now();

  let payment = match session.payment_by_gateway_id(&notice.gateway_payment_id).await? {
    Some(mut payment) => {
      payment.state = mapped;
      payment.status_detail = notice.status_detail.clone();
      if let Some(method) = &notice.payment_method {
        payment.method = method.clone();
      }
      if let Some(payment_type) = &notice.payment_type {
        payment.payment_type = Some(payment_type.clone());
      }
      if let Some(installments) = notice.installments {
        payment.installments = installments;
      }
      if let Some(merchant_order_id) = &notice.merchant_order_id {
        payment.merchant_order_id = Some(merchant_order_id.clone());
      }
      // The approval timestamp is written once and never overwritten.
      if mapped == PaymentState::Approved && payment.paid_at.is_none() {
        payment.paid_at = Some(now);
      }
      session.update_payment(&payment).await?;
      payment
    }
    None => {
      let payment = Payment {
        id: Uuid::new_v4(),
        order_id: order.id,
        order_number: order.order_number.clone(),
        gateway_payment_id: Some(notice.gateway_payment_id.clone()),
        preference_id: None,
        amount_cents: notice.amount_cents,
        method: notice.payment_method.clone().unwrap_or_else(|| "mercadopago".to_string()),
        state: mapped,
        status_detail: notice.status_detail.clone(),
        payment_type: notice.payment_type.clone(),
        installments: notice.installments.unwrap_or(1),
        payer_email: notice.payer_email.clone(),
        merchant_order_id: notice.merchant_order_id.clone(),
        paid_at: (mapped == PaymentState::Approved).then_some(now),
        created_at: now,
      };
      session.insert_payment(&payment).await?;
      payment
    }
  };

  apply_order_side_effect(
    session,
    order,
    mapped,
    &notice.gateway_payment_id,
    changed_by,
    manual,
  )
  .await?;
  Ok(payment)
}

/// The order-side half of the state machine: approvals pull the order into
/// preparation, rejections and cancellations cancel it. Everything else
/// leaves the order alone. Guards make repeated deliveries of the same
/// terminal status append nothing.
async fn apply_order_side_effect(
  session: &mut dyn StorageSession,
  order: &Order,
  mapped: PaymentState,
  payment_ref: &str,
  changed_by: Option<Uuid>,
  manual: bool,
) -> Result<(), AppError> {
  let origin = if manual { "manual override" } else { "payment" };
  match mapped {
    PaymentState::Approved => {
      if order.state != OrderState::InPreparation {
        apply_transition(
          session,
          order,
          OrderState::InPreparation,
          changed_by,
          format!("{} approved (id: {})", origin, payment_ref),
        )
        .await?;
        info!(order_id = %order.id, "Order moved to in_preparation after approval");
      }
    }
    PaymentState::Rejected | PaymentState::Cancelled => {
      if order.state != OrderState::Cancelled {
        apply_transition(
          session,
          order,
          OrderState::Cancelled,
          changed_by,
          format!("{} {} (id: {})", origin, mapped, payment_ref),
        )
        .await?;
        info!(order_id = %order.id, payment_state = %mapped, "Order cancelled after payment outcome");
      }
    }
    _ => {}
  }
  Ok(())
}

/// Payment listing for the API (filterable by order and state).
#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
  #[serde(alias = "pedido")]
  pub order_id: Option<Uuid>,
  #[serde(alias = "estado")]
  pub state: Option<PaymentState>,
}

pub async fn list_payments(storage: &dyn Storage, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
  let mut session = storage.begin().await?;
  let result = session
    .list_payments(filter.order_id, filter.state)
    .await
    .map_err(AppError::from);
  commit_or_rollback(session, result).await
}

/// Serialized acknowledgement the webhook endpoint always answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookAck {
  #[serde(rename = "success")]
  Success,
  #[serde(rename = "ignored")]
  Ignored,
  #[serde(rename = "no external reference")]
  NoExternalReference,
  #[serde(rename = "order not found")]
  OrderNotFound,
  #[serde(rename = "error")]
  Error,
}

impl WebhookAck {
  pub fn token(&self) -> &'static str {
    match self {
      WebhookAck::Success => "success",
      WebhookAck::Ignored => "ignored",
      WebhookAck::NoExternalReference => "no external reference",
      WebhookAck::OrderNotFound => "order not found",
      WebhookAck::Error => "error",
    }
  }
}
