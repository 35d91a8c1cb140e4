//! The socket transport.
//!
//! `GET /ws` upgrades an identified caller. The server pushes hub events as
//! `{"type": .., "data": ..}` frames. The client may send two commands,
//! `send_message` and `mark_as_read`; each is answered with an `ack` or an
//! `error` frame. Both go through the same resolver as the HTTP routes.

use axum::{
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::IntoResponse,
};
use futures_util::{SinkExt as _, StreamExt as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use vetclinic_core::{
  Error, Result, conversation::SendMessageRequest, id::parse_id, store::ClinicStore,
  user::User,
};

use crate::{AppState, auth::Requester};

/// Replies buffered before the reader waits on the writer.
const REPLY_QUEUE: usize = 16;

/// A frame sent by the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
  SendMessage {
    #[serde(flatten)]
    request: SendMessageRequest,
  },
  MarkAsRead {
    chat_id:     String,
    #[serde(default)]
    message_ids: Vec<String>,
  },
}

impl Command {
  fn name(&self) -> &'static str {
    match self {
      Self::SendMessage { .. } => "send_message",
      Self::MarkAsRead { .. } => "mark_as_read",
    }
  }
}

/// The server's answer to one [`Command`].
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Reply {
  Ack {
    command: &'static str,
    result:  Value,
  },
  Error {
    code:  &'static str,
    error: String,
  },
}

impl Reply {
  fn from_error(e: &Error) -> Self {
    let error = match e {
      Error::Internal(inner) => {
        tracing::error!(error = %inner, "socket command failed");
        "internal server error".to_owned()
      }
      other => other.to_string(),
    };
    Reply::Error { code: e.code(), error }
  }
}

pub async fn upgrade<S>(
  ws: WebSocketUpgrade,
  State(state): State<AppState<S>>,
  Requester(user): Requester,
) -> impl IntoResponse
where
  S: ClinicStore + 'static,
{
  ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket<S>(socket: WebSocket, state: AppState<S>, user: User)
where
  S: ClinicStore + 'static,
{
  let (mut sink, mut stream) = socket.split();
  let mut events = state.hub.register(user.user_id);
  let (reply_tx, mut reply_rx) = mpsc::channel::<Reply>(REPLY_QUEUE);
  tracing::info!(user_id = %user.user_id, "socket connected");

  let writer = tokio::spawn(async move {
    loop {
      let frame = tokio::select! {
        Some(event) = events.recv() => serde_json::to_string(&*event),
        Some(reply) = reply_rx.recv() => serde_json::to_string(&reply),
        else => break,
      };
      let text = match frame {
        Ok(text) => text,
        Err(e) => {
          tracing::warn!(error = %e, "failed to encode frame");
          continue;
        }
      };
      if sink.send(Message::Text(text.into())).await.is_err() {
        break;
      }
    }
    let _ = sink.close().await;
  });

  while let Some(Ok(msg)) = stream.next().await {
    match msg {
      Message::Text(text) => {
        let reply = handle_frame(&state, &user, text.as_str()).await;
        if reply_tx.send(reply).await.is_err() {
          break;
        }
      }
      Message::Close(_) => break,
      _ => {}
    }
  }

  // Dropping the writer's connection unregisters it from the hub.
  writer.abort();
  tracing::info!(user_id = %user.user_id, "socket disconnected");
}

/// Decode and run one client frame.
pub async fn handle_frame<S>(state: &AppState<S>, user: &User, text: &str) -> Reply
where
  S: ClinicStore + 'static,
{
  let command: Command = match serde_json::from_str(text) {
    Ok(c) => c,
    Err(e) => {
      return Reply::Error {
        code:  "invalid_input",
        error: format!("malformed command: {e}"),
      };
    }
  };
  let name = command.name();

  match run_command(state, user, command).await {
    Ok(result) => Reply::Ack {
      command: name,
      result,
    },
    Err(e) => Reply::from_error(&e),
  }
}

async fn run_command<S>(state: &AppState<S>, user: &User, command: Command) -> Result<Value>
where
  S: ClinicStore + 'static,
{
  let value = match command {
    Command::SendMessage { request } => {
      let sent = state.conversations.send_message(user, request).await?;
      serde_json::to_value(sent)
    }
    Command::MarkAsRead {
      chat_id,
      message_ids,
    } => {
      let chat_id = parse_id(&chat_id, "chat")?;
      let ids = message_ids
        .iter()
        .map(|id| parse_id(id, "message"))
        .collect::<Result<Vec<_>>>()?;
      let receipt = state.conversations.mark_as_read(user, chat_id, ids).await?;
      serde_json::to_value(receipt)
    }
  };
  value.map_err(Error::internal)
}
