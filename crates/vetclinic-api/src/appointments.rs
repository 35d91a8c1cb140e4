//! Appointment routes.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use vetclinic_core::{
  appointment::Appointment,
  id::parse_id,
  page::Page,
  scheduler::{AppointmentPatch, BookingRequest},
  store::ClinicStore,
  user::{Animal, UserSummary},
};

use crate::{AppState, auth::Requester, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
  pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientsQuery {
  pub name: Option<String>,
}

pub async fn create<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Json(req): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClinicStore + 'static,
{
  let appointment = state.scheduler.create(&user, req).await?;
  Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError>
where
  S: ClinicStore + 'static,
{
  let id = parse_id(&id, "appointment")?;
  Ok(Json(state.scheduler.get(&user, id).await?))
}

pub async fn update<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(id): Path<String>,
  Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Appointment>, ApiError>
where
  S: ClinicStore + 'static,
{
  let id = parse_id(&id, "appointment")?;
  Ok(Json(state.scheduler.update(&user, id, patch).await?))
}

pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: ClinicStore + 'static,
{
  let id = parse_id(&id, "appointment")?;
  state.scheduler.delete(&user, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn accept<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError>
where
  S: ClinicStore + 'static,
{
  let id = parse_id(&id, "appointment")?;
  Ok(Json(state.scheduler.accept(&user, id).await?))
}

pub async fn reject<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError>
where
  S: ClinicStore + 'static,
{
  let id = parse_id(&id, "appointment")?;
  Ok(Json(state.scheduler.reject(&user, id).await?))
}

pub async fn for_client<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(client_id): Path<String>,
  Query(q): Query<PageQuery>,
) -> Result<Json<Page<Appointment>>, ApiError>
where
  S: ClinicStore + 'static,
{
  let client_id = parse_id(&client_id, "client")?;
  let page = state
    .scheduler
    .list_for_client(&user, client_id, q.page.unwrap_or(1))
    .await?;
  Ok(Json(page))
}

pub async fn for_veterinarian<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(vet_id): Path<String>,
  Query(q): Query<PageQuery>,
) -> Result<Json<Page<Appointment>>, ApiError>
where
  S: ClinicStore + 'static,
{
  let vet_id = parse_id(&vet_id, "veterinarian")?;
  let page = state
    .scheduler
    .list_for_veterinarian(&user, vet_id, q.page.unwrap_or(1))
    .await?;
  Ok(Json(page))
}

pub async fn clients_of<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(vet_id): Path<String>,
  Query(q): Query<ClientsQuery>,
) -> Result<Json<Vec<UserSummary>>, ApiError>
where
  S: ClinicStore + 'static,
{
  let vet_id = parse_id(&vet_id, "veterinarian")?;
  let clients = state
    .scheduler
    .clients_with_accepted(&user, vet_id, q.name.as_deref())
    .await?;
  Ok(Json(clients))
}

pub async fn animals_of<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path((vet_id, client_id)): Path<(String, String)>,
) -> Result<Json<Vec<Animal>>, ApiError>
where
  S: ClinicStore + 'static,
{
  let vet_id = parse_id(&vet_id, "veterinarian")?;
  let client_id = parse_id(&client_id, "client")?;
  let animals = state
    .scheduler
    .animals_with_accepted(&user, vet_id, client_id)
    .await?;
  Ok(Json(animals))
}
