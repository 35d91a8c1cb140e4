//! Error types for `vetclinic-core`.
//!
//! Every failure the scheduler or the conversation resolver reports falls in
//! one of five buckets. The first four are local, recoverable conditions the
//! caller is expected to surface as-is; `Internal` wraps whatever the storage
//! backend returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  InvalidInput(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend failure.
  pub fn internal<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Internal(Box::new(err))
  }

  /// Stable machine-readable code for this error.
  pub fn code(&self) -> &'static str {
    match self {
      Self::InvalidInput(_) => "invalid_input",
      Self::NotFound(_) => "not_found",
      Self::Forbidden(_) => "forbidden",
      Self::Conflict(_) => "conflict",
      Self::Internal(_) => "internal",
    }
  }

  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }

  pub(crate) fn not_found(msg: impl Into<String>) -> Self {
    Self::NotFound(msg.into())
  }

  pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
    Self::Forbidden(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
