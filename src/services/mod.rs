// src/services/mod.rs

//! Domain services. Each entry point opens one storage session, does all of
//! its reads and writes through it, and either commits wholesale or rolls
//! back wholesale.

pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod preference;
pub mod reconciliation;

use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::StorageSession;

/// The identity behind a request, as asserted by the upstream auth
/// collaborator. `user_id` is None for unauthenticated callers and for
/// system-driven operations (webhooks).
#[derive(Debug, Clone, Default)]
pub struct Actor {
  pub user_id: Option<Uuid>,
  pub email: Option<String>,
  pub is_admin: bool,
}

impl Actor {
  pub fn system() -> Self {
    Self::default()
  }
}

/// Commits the session when the work succeeded, rolls it back otherwise.
/// A rollback failure is logged and swallowed: the original error is the
/// one the caller needs to see.
pub(crate) async fn commit_or_rollback<T>(
  session: Box<dyn StorageSession>,
  result: Result<T, AppError>,
) -> Result<T, AppError> {
  match result {
    Ok(value) => {
      session.commit().await?;
      Ok(value)
    }
    Err(err) => {
      if let Err(rollback_err) = session.rollback().await {
        tracing::warn!(error = %rollback_err, "Rollback failed after aborted operation");
      }
      Err(err)
    }
  }
}
