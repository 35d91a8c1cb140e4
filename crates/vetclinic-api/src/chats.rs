//! Conversation routes. The socket carries the same two commands; see
//! [`crate::ws`].

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use vetclinic_core::{
  Result,
  chat::{ChatOverview, Message},
  conversation::{ReadReceipt, SendMessageRequest},
  id::parse_id,
  page::Page,
  store::ClinicStore,
};

use crate::{AppState, auth::Requester, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ConversationsQuery {
  pub search: Option<String>,
  pub page:   Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
  pub page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
  #[serde(default)]
  pub message_ids: Vec<String>,
}

pub async fn send<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClinicStore + 'static,
{
  let sent = state.conversations.send_message(&user, req).await?;
  Ok((StatusCode::CREATED, Json(sent)))
}

pub async fn list<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Query(q): Query<ConversationsQuery>,
) -> Result<Json<Page<ChatOverview>>, ApiError>
where
  S: ClinicStore + 'static,
{
  let page = state
    .conversations
    .conversations(&user, q.search.as_deref(), q.page.unwrap_or(1))
    .await?;
  Ok(Json(page))
}

pub async fn messages<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(chat_id): Path<String>,
  Query(q): Query<MessagesQuery>,
) -> Result<Json<Page<Message>>, ApiError>
where
  S: ClinicStore + 'static,
{
  let chat_id = parse_id(&chat_id, "chat")?;
  let page = state
    .conversations
    .messages(&user, chat_id, q.page.unwrap_or(1))
    .await?;
  Ok(Json(page))
}

pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  Requester(user): Requester,
  Path(chat_id): Path<String>,
  Json(body): Json<MarkReadBody>,
) -> Result<Json<ReadReceipt>, ApiError>
where
  S: ClinicStore + 'static,
{
  let chat_id = parse_id(&chat_id, "chat")?;
  let ids = body
    .message_ids
    .iter()
    .map(|id| parse_id(id, "message"))
    .collect::<Result<Vec<_>>>()?;
  let receipt = state.conversations.mark_as_read(&user, chat_id, ids).await?;
  Ok(Json(receipt))
}
