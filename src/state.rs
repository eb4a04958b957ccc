// src/state.rs

use std::sync::Arc;

use crate::config::AppConfig;
use crate::gateway::PaymentGateway;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
  pub storage: Arc<dyn Storage>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub config: Arc<AppConfig>,
}
