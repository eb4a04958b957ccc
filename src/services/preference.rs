// src/services/preference.rs

//! Checkout handoff to the gateway: builds a payment preference from the
//! stored order snapshot (never from client-supplied prices) and records
//! the pending payment attempt.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::gateway::{BackUrls, PaymentGateway, PreferenceItem, PreferencePayer, PreferencePhone, PreferenceRequest};
use crate::models::{Payment, PaymentState};
use crate::storage::Storage;

use super::{commit_or_rollback, Actor};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayerInput {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub surname: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceInput {
  #[serde(alias = "pedido_id")]
  pub order_id: Uuid,
  #[serde(default)]
  pub payer: Option<PayerInput>,
}

#[derive(Debug, Serialize)]
pub struct PreferenceCreated {
  pub preference_id: String,
  pub init_point: String,
  pub sandbox_init_point: Option<String>,
  pub payment_id: Uuid,
  pub order_id: Uuid,
  pub amount_cents: i64,
}

#[instrument(name = "service::create_preference", skip_all, fields(order_id = %input.order_id))]
pub async fn create_preference(
  storage: &dyn Storage,
  gateway: &dyn PaymentGateway,
  config: &AppConfig,
  input: &PreferenceInput,
  actor: &Actor,
) -> Result<PreferenceCreated, AppError> {
  // Read the order snapshot first; the session is closed again before the
  // outbound network call so no database locks are held across it.
  let mut session = storage.begin().await?;
  let result = async {
    let order = session
      .order(input.order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", input.order_id)))?;
    if !actor.is_admin && order.user_id != actor.user_id {
      return Err(AppError::Forbidden("order does not belong to the caller".to_string()));
    }
    let items = session.order_items(order.id).await?;
    Ok((order, items))
  }
  .await;
  let (order, items) = commit_or_rollback(session, result).await?;

  let payer = input.payer.clone().unwrap_or_default();
  let payer_email = payer.email.unwrap_or_else(|| order.contact_email.clone());
  let request = PreferenceRequest {
    items: items
      .iter()
      .map(|item| PreferenceItem {
        title: item.product_name.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price_cents as f64 / 100.0,
        currency_id: "ARS".to_string(),
      })
      .collect(),
    back_urls: BackUrls {
      success: format!("{}/compra-exitosa", config.frontend_base_url),
      failure: format!("{}/pago-fallido", config.frontend_base_url),
      pending: format!("{}/pago-pendiente", config.frontend_base_url),
    },
    auto_return: "approved".to_string(),
    external_reference: order.id.to_string(),
    notification_url: format!("{}/api/v1/payments/webhook", config.public_base_url),
    statement_descriptor: config.statement_descriptor.clone(),
    payer: PreferencePayer {
      name: payer.name.unwrap_or_default(),
      surname: payer.surname.unwrap_or_default(),
      email: payer_email.clone(),
      phone: PreferencePhone {
        area_code: String::new(),
        number: payer.phone.unwrap_or_else(|| order.contact_phone.clone()),
      },
    },
  };

  let preference = gateway.create_preference(&request).await?;

  let payment = Payment {
    id: Uuid::new_v4(),
    order_id: order.id,
    order_number: order.order_number.clone(),
    gateway_payment_id: None,
    preference_id: Some(preference.id.clone()),
    amount_cents: order.total_cents,
    method: "mercadopago".to_string(),
    state: PaymentState::Pending,
    status_detail: None,
    payment_type: None,
    installments: 1,
    payer_email: Some(payer_email),
    merchant_order_id: None,
    paid_at: None,
    created_at: Utc::now(),
  };
  let mut session = storage.begin().await?;
  let result = session.insert_payment(&payment).await.map_err(AppError::from);
  commit_or_rollback(session, result).await?;

  info!(preference_id = %preference.id, payment_id = %payment.id, "Preference created and pending payment recorded");
  Ok(PreferenceCreated {
    preference_id: preference.id,
    init_point: preference.init_point,
    sandbox_init_point: preference.sandbox_init_point,
    payment_id: payment.id,
    order_id: order.id,
    amount_cents: payment.amount_cents,
  })
}
