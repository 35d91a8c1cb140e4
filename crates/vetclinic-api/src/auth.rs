//! Caller identity.
//!
//! Tokens are verified upstream; the gateway forwards the caller's user id
//! in [`USER_HEADER`]. The extractor resolves it through the directory.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;
use vetclinic_core::{Error, store::ClinicStore, user::User};

use crate::{AppState, error::ApiError};

pub const USER_HEADER: &str = "x-user-id";

/// The authenticated caller.
pub struct Requester(pub User);

impl<S> FromRequestParts<AppState<S>> for Requester
where
  S: ClinicStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let id = parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or(ApiError::Unauthorized)?;

    let user = state
      .store
      .get_user(id)
      .await
      .map_err(Error::internal)?
      .ok_or(ApiError::Unauthorized)?;
    Ok(Requester(user))
  }
}
