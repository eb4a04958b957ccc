// src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::preference::{self, PreferenceInput};
use crate::services::reconciliation::{self, ConfirmInput, PaymentFilter, PaymentNotice, ReconcileOutcome, WebhookAck};
use crate::state::AppState;
use crate::web::identity::{AdminUser, AuthenticatedUser};

#[instrument(name = "handler::create_preference", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_preference_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<PreferenceInput>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let created = preference::create_preference(
    app_state.storage.as_ref(),
    app_state.gateway.as_ref(),
    &app_state.config,
    &payload,
    &auth_user.actor(),
  )
  .await?;
  Ok(HttpResponse::Created().json(json!({
    "success": true,
    "preference_id": created.preference_id,
    "init_point": created.init_point,
    "sandbox_init_point": created.sandbox_init_point,
    "payment_id": created.payment_id,
    "order_id": created.order_id,
    "amount_cents": created.amount_cents
  })))
}

/// The gateway notifies either via query parameters (`?topic=payment&id=..`)
/// or a JSON body (`{"type": "payment", "data": {"id": ".."}}`).
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
  #[serde(default)]
  pub topic: Option<String>,
  #[serde(default, rename = "type")]
  pub kind: Option<String>,
  #[serde(default)]
  pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookBody {
  #[serde(default)]
  topic: Option<String>,
  #[serde(default, rename = "type")]
  kind: Option<String>,
  #[serde(default)]
  data: Option<WebhookBodyData>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookBodyData {
  #[serde(default)]
  id: Option<JsonValue>,
}

fn id_from_json(value: &JsonValue) -> Option<String> {
  match value {
    JsonValue::String(s) => Some(s.clone()),
    JsonValue::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Webhook contract: this endpoint never answers anything but 200. A
/// failure on our side must not look like a delivery failure to the
/// gateway, or it will retry the same notification indefinitely.
#[instrument(name = "handler::payment_webhook", skip_all)]
pub async fn webhook_handler(
  app_state: web::Data<AppState>,
  query: web::Query<WebhookQuery>,
  body: web::Bytes,
) -> HttpResponse {
  let mut topic = query.topic.clone().or_else(|| query.kind.clone());
  let mut resource_id = query.id.clone();

  if topic.is_none() || resource_id.is_none() {
    if let Ok(parsed) = serde_json::from_slice::<WebhookBody>(&body) {
      topic = topic.or(parsed.kind).or(parsed.topic);
      resource_id = resource_id.or_else(|| parsed.data.as_ref().and_then(|d| d.id.as_ref()).and_then(id_from_json));
    }
  }

  let ack = process_notification(&app_state, topic.as_deref(), resource_id.as_deref()).await;
  info!(token = ack.token(), "Webhook acknowledged");
  HttpResponse::Ok().json(json!({ "status": ack }))
}

async fn process_notification(app_state: &AppState, topic: Option<&str>, resource_id: Option<&str>) -> WebhookAck {
  let resource_id = match (topic, resource_id) {
    (Some("payment"), Some(id)) => id,
    _ => {
      info!(?topic, "Notification ignored");
      return WebhookAck::Ignored;
    }
  };

  let payment = match app_state.gateway.get_payment(resource_id).await {
    Ok(payment) => payment,
    Err(err) => {
      error!(%resource_id, error = %err, "Gateway payment lookup failed");
      return WebhookAck::Error;
    }
  };

  let notice = match PaymentNotice::from_gateway(&payment) {
    Some(notice) => notice,
    None => {
      warn!(%resource_id, "Gateway payment carries no external reference");
      return WebhookAck::NoExternalReference;
    }
  };

  match reconciliation::reconcile(app_state.storage.as_ref(), &notice).await {
    Ok(ReconcileOutcome::Updated(payment)) => {
      info!(payment_id = %payment.id, state = %payment.state, "Payment reconciled");
      WebhookAck::Success
    }
    Ok(ReconcileOutcome::OrderNotFound) => WebhookAck::OrderNotFound,
    Err(err) => {
      error!(%resource_id, error = %err, "Reconciliation failed");
      WebhookAck::Error
    }
  }
}

/// Trusted internal confirmation: the caller already talked to the gateway
/// and relays the payment outcome. Reached only from inside the deployment
/// perimeter.
#[instrument(name = "handler::confirm_payment", skip(app_state, payload))]
pub async fn confirm_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ConfirmInput>,
) -> Result<HttpResponse, AppError> {
  let payment = reconciliation::confirm(app_state.storage.as_ref(), &payload).await?;
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "payment_id": payment.id,
    "state": payment.state
  })))
}

#[derive(Debug, Deserialize)]
pub struct SetStateRequest {
  #[serde(alias = "estado")]
  pub state: String,
}

#[instrument(name = "handler::set_payment_state", skip(app_state, payload, admin), fields(payment_id = %path.as_ref()))]
pub async fn set_state_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<SetStateRequest>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payment =
    reconciliation::set_state(app_state.storage.as_ref(), path.into_inner(), &payload.state, &admin.0.actor()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "payment": payment
  })))
}

#[instrument(name = "handler::list_payments", skip(app_state, _auth_user))]
pub async fn list_payments_handler(
  app_state: web::Data<AppState>,
  filter: web::Query<PaymentFilter>,
  _auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payments = reconciliation::list_payments(app_state.storage.as_ref(), &filter).await?;
  Ok(HttpResponse::Ok().json(payments))
}
