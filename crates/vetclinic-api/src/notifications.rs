//! Notification feed routes.

use axum::{
  Json,
  extract::{Path, State},
};
use vetclinic_core::{
  id::parse_id,
  notification::{self, Notification, NotificationFeed},
  store::ClinicStore,
};

use crate::{AppState, auth::Requester, error::ApiError};

pub async fn feed<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
) -> Result<Json<NotificationFeed>, ApiError>
where
  S: ClinicStore + 'static,
{
  Ok(Json(notification::feed(&*state.store, &user).await?))
}

pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError>
where
  S: ClinicStore + 'static,
{
  let id = parse_id(&id, "notification")?;
  Ok(Json(notification::mark_read(&*state.store, &user, id).await?))
}
