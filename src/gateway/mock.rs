// src/gateway/mock.rs

//! Scriptable in-process gateway used by the test suite and local
//! development: stage payment lookups by id, flip the failure switches to
//! simulate provider outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GatewayError, GatewayPayment, PaymentGateway, PreferenceRequest, PreferenceResponse};

#[derive(Debug, Default)]
pub struct MockGateway {
  payments: Mutex<HashMap<String, GatewayPayment>>,
  preference_counter: AtomicU64,
  fail_payment_lookups: AtomicBool,
  fail_preferences: AtomicBool,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes `get_payment(payment.id)` return the given payment.
  pub fn stage_payment(&self, payment: GatewayPayment) {
    self
      .payments
      .lock()
      .expect("mock gateway lock poisoned")
      .insert(payment.id.to_string(), payment);
  }

  pub fn fail_payment_lookups(&self) {
    self.fail_payment_lookups.store(true, Ordering::SeqCst);
  }

  pub fn fail_preferences(&self) {
    self.fail_preferences.store(true, Ordering::SeqCst);
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  async fn create_preference(&self, request: &PreferenceRequest) -> Result<PreferenceResponse, GatewayError> {
    if self.fail_preferences.load(Ordering::SeqCst) {
      return Err(GatewayError::Status {
        status: 500,
        body: "mock gateway preference failure".to_string(),
      });
    }
    let n = self.preference_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let id = format!("mock-pref-{}-{}", request.external_reference, n);
    Ok(PreferenceResponse {
      init_point: format!("https://gateway.test/checkout?pref_id={}", id),
      sandbox_init_point: Some(format!("https://sandbox.gateway.test/checkout?pref_id={}", id)),
      id,
    })
  }

  async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
    if self.fail_payment_lookups.load(Ordering::SeqCst) {
      return Err(GatewayError::Status {
        status: 500,
        body: "mock gateway lookup failure".to_string(),
      });
    }
    self
      .payments
      .lock()
      .expect("mock gateway lock poisoned")
      .get(payment_id)
      .cloned()
      .ok_or(GatewayError::Status {
        status: 404,
        body: format!("payment {} not found", payment_id),
      })
  }
}
