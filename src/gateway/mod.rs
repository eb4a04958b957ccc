// src/gateway/mod.rs

//! Payment-gateway client boundary. The rest of the system only sees
//! [`PaymentGateway`]: preference creation for the checkout handoff and
//! payment lookup by id for webhook reconciliation. Timeouts and retries are
//! the HTTP client's concern, not the domain's.

pub mod mercadopago;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mercadopago::MercadoPagoClient;

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("gateway transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("gateway returned status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("malformed gateway response: {0}")]
  Malformed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
  pub title: String,
  pub quantity: i32,
  pub unit_price: f64,
  pub currency_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
  pub success: String,
  pub failure: String,
  pub pending: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferencePhone {
  pub area_code: String,
  pub number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferencePayer {
  pub name: String,
  pub surname: String,
  pub email: String,
  pub phone: PreferencePhone,
}

/// Checkout-preference payload in the gateway's wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
  pub items: Vec<PreferenceItem>,
  pub back_urls: BackUrls,
  pub auto_return: String,
  pub external_reference: String,
  pub notification_url: String,
  pub statement_descriptor: String,
  pub payer: PreferencePayer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceResponse {
  pub id: String,
  pub init_point: String,
  #[serde(default)]
  pub sandbox_init_point: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayPayer {
  #[serde(default)]
  pub email: Option<String>,
}

/// The merchant-order reference nested in a payment lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayOrderRef {
  #[serde(default)]
  pub id: Option<i64>,
}

/// A payment as reported by the gateway's lookup-by-id endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
  pub id: i64,
  pub status: String,
  #[serde(default)]
  pub status_detail: Option<String>,
  #[serde(default)]
  pub external_reference: Option<String>,
  #[serde(default)]
  pub transaction_amount: f64,
  #[serde(default)]
  pub payment_method_id: Option<String>,
  #[serde(default)]
  pub payment_type_id: Option<String>,
  #[serde(default)]
  pub installments: Option<i32>,
  #[serde(default)]
  pub payer: Option<GatewayPayer>,
  #[serde(default)]
  pub order: Option<GatewayOrderRef>,
}

impl GatewayPayment {
  /// The gateway reports decimal currency; the domain stores integer cents.
  pub fn amount_cents(&self) -> i64 {
    (self.transaction_amount * 100.0).round() as i64
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_preference(&self, request: &PreferenceRequest) -> Result<PreferenceResponse, GatewayError>;
  async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}
