// src/web/identity.rs

//! Identity extractors. Authentication policy is an upstream collaborator's
//! concern: requests arrive with identity headers already asserted by the
//! auth proxy, and these extractors only read them.

use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::Actor;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub email: Option<String>,
  pub is_admin: bool,
}

impl AuthenticatedUser {
  pub fn actor(&self) -> Actor {
    Actor {
      user_id: Some(self.user_id),
      email: self.email.clone(),
      is_admin: self.is_admin,
    }
  }

  fn from_headers(req: &HttpRequest) -> Result<Self, AppError> {
    let user_id = req
      .headers()
      .get("X-User-ID")
      .and_then(|value| value.to_str().ok())
      .and_then(|value| Uuid::parse_str(value).ok())
      .ok_or_else(|| {
        warn!("Missing or invalid X-User-ID header");
        AppError::Auth("User authentication required".to_string())
      })?;
    let email = req
      .headers()
      .get("X-User-Email")
      .and_then(|value| value.to_str().ok())
      .map(String::from);
    let is_admin = req
      .headers()
      .get("X-User-Role")
      .and_then(|value| value.to_str().ok())
      .map(|role| role.eq_ignore_ascii_case("admin"))
      .unwrap_or(false);
    Ok(Self {
      user_id,
      email,
      is_admin,
    })
  }
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    ready(Self::from_headers(req))
  }
}

/// An [`AuthenticatedUser`] that must carry the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    ready(AuthenticatedUser::from_headers(req).and_then(|user| {
      if user.is_admin {
        Ok(AdminUser(user))
      } else {
        Err(AppError::Forbidden("administrator role required".to_string()))
      }
    }))
  }
}
