// src/gateway/mercadopago.rs

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use super::{GatewayError, GatewayPayment, PaymentGateway, PreferenceRequest, PreferenceResponse};

/// HTTP client for the MercadoPago REST API.
#[derive(Debug, Clone)]
pub struct MercadoPagoClient {
  http: reqwest::Client,
  base_url: String,
  access_token: String,
}

impl MercadoPagoClient {
  pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
    Self {
      http: reqwest::Client::new(),
      base_url: base_url.into(),
      access_token: access_token.into(),
    }
  }

  async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
      return Err(GatewayError::Status {
        status: status.as_u16(),
        body,
      });
    }
    serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))
  }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
  #[instrument(name = "gateway::create_preference", skip(self, request), fields(external_reference = %request.external_reference))]
  async fn create_preference(&self, request: &PreferenceRequest) -> Result<PreferenceResponse, GatewayError> {
    let response = self
      .http
      .post(format!("{}/checkout/preferences", self.base_url))
      .bearer_auth(&self.access_token)
      .json(request)
      .send()
      .await?;
    let preference: PreferenceResponse = Self::decode(response).await?;
    info!(preference_id = %preference.id, "Gateway preference created");
    Ok(preference)
  }

  #[instrument(name = "gateway::get_payment", skip(self))]
  async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
    let response = self
      .http
      .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
      .bearer_auth(&self.access_token)
      .send()
      .await?;
    Self::decode(response).await
  }
}
