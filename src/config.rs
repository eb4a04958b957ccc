// src/config.rs

use dotenvy::dotenv;
use std::env;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  /// Externally reachable base URL of this service; used to build the
  /// gateway's webhook notification URL.
  pub public_base_url: String,
  /// Storefront base URL the gateway redirects buyers back to.
  pub frontend_base_url: String,

  pub gateway_base_url: String,
  pub gateway_access_token: String,
  pub statement_descriptor: String,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let public_base_url =
      get_env("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));
    let frontend_base_url = get_env("FRONTEND_BASE_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

    let gateway_base_url = get_env("MP_BASE_URL").unwrap_or_else(|_| "https://api.mercadopago.com".to_string());
    let gateway_access_token = get_env("MP_ACCESS_TOKEN")?;
    let statement_descriptor = get_env("STATEMENT_DESCRIPTOR").unwrap_or_else(|_| "TIENDA NORTE".to_string());

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      public_base_url,
      frontend_base_url,
      gateway_base_url,
      gateway_access_token,
      statement_descriptor,
    })
  }
}
