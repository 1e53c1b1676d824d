//! The realtime cable: one WebSocket per client, multiplexing any number of
//! topic subscriptions.
//!
//! Subscribing is a read and never needs a principal. A token, when given,
//! must be valid at upgrade time; once it lapses the client is told so and
//! keeps receiving public topics.

use std::time::Duration;

use agora_auth::{AuthState, Session};
use agora_core::{
  cable::{Action, Command, Control, ServerFrame},
  store::ForumStore,
};
use agora_realtime::Connection;
use axum::{
  extract::{
    Query, State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  http::HeaderMap,
  response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tokio::time::{Instant, sleep_until};

use crate::{
  AppState,
  auth::{authenticate, bearer},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct CableQuery {
  pub token: Option<String>,
}

/// Authenticate (if a token is offered) and upgrade.
pub async fn upgrade<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  Query(query): Query<CableQuery>,
  headers: HeaderMap,
  ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
  let token = query
    .token
    .as_deref()
    .filter(|t| !t.is_empty())
    .or_else(|| bearer(&headers));

  let mut session = Session::new();
  if let Some(token) = token {
    let (principal, _) = authenticate(&state, &mut session, token).await?;
    tracing::debug!(user = %principal.id, "cable authenticated");
  }

  Ok(ws.on_upgrade(move |socket| serve(socket, state, session)))
}

type Sink = SplitSink<WebSocket, Message>;

async fn serve<S: ForumStore + 'static>(socket: WebSocket, state: AppState<S>, mut session: Session) {
  let (connection, mut mailbox) = state.registry().connect();
  let (mut tx, mut rx) = socket.split();
  let id = connection.id();
  tracing::debug!(connection = %id, user = ?session.principal().map(|p| p.id), "cable open");

  let mut expiry = expiry_deadline(&session);

  loop {
    tokio::select! {
      msg = rx.next() => {
        let Some(msg) = msg else { break };
        match msg {
          Ok(Message::Text(text)) => {
            let reply = handle_command(&connection, text.as_str());
            if let Err(e) = send(&mut tx, &ServerFrame::Control(reply)).await {
              tracing::debug!(connection = %id, error = %e, "cable write failed");
              break;
            }
          }
          Ok(Message::Ping(data)) => {
            if tx.send(Message::Pong(data)).await.is_err() {
              break;
            }
          }
          Ok(Message::Close(_)) => break,
          Ok(_) => {}
          Err(e) => {
            tracing::debug!(connection = %id, error = %e, "cable read failed");
            break;
          }
        }
      }

      event = mailbox.recv() => {
        let Some(event) = event else { break };
        let frame = ServerFrame::Event((*event).clone());
        if let Err(e) = send(&mut tx, &frame).await {
          tracing::debug!(connection = %id, error = %e, "cable write failed");
          break;
        }
      }

      () = wait_for(expiry) => {
        expiry = None;
        if session.check_expiry(Utc::now()) {
          tracing::debug!(connection = %id, "cable session expired");
          if send(&mut tx, &ServerFrame::Control(Control::SessionExpired)).await.is_err() {
            break;
          }
        } else {
          // Woke a hair early; look again shortly.
          expiry = Some(Instant::now() + Duration::from_millis(10));
        }
      }
    }
  }

  // Dropping the connection removes every subscription it held.
  drop(connection);
  tracing::debug!(connection = %id, "cable closed");
}

/// Apply one client command and produce the control frame that answers it.
fn handle_command(connection: &Connection, text: &str) -> Control {
  let command: Command = match serde_json::from_str(text) {
    Ok(c) => c,
    Err(e) => return Control::Error { message: format!("invalid command: {e}") },
  };
  let topic = match command.topic() {
    Ok(t) => t,
    Err(e) => return Control::Error { message: e.to_string() },
  };
  match command.action {
    Action::Subscribe => {
      connection.subscribe(topic);
      Control::Subscribed { topic }
    }
    Action::Unsubscribe => {
      connection.unsubscribe(&topic);
      Control::Unsubscribed { topic }
    }
  }
}

async fn send(tx: &mut Sink, frame: &ServerFrame) -> Result<(), axum::Error> {
  let json = match frame.to_json() {
    Ok(json) => json,
    Err(e) => {
      tracing::error!(error = %e, "failed to encode cable frame");
      return Ok(());
    }
  };
  tx.send(Message::Text(json.into())).await
}

/// When an authenticated session's token runs out, as a tokio instant.
fn expiry_deadline(session: &Session) -> Option<Instant> {
  match session.state() {
    AuthState::Authenticated { expires_at, .. } => {
      let remaining = (*expires_at - Utc::now()).to_std().unwrap_or_default();
      // Expiry is strict, so wake just after the instant itself.
      Some(Instant::now() + remaining + Duration::from_millis(1))
    }
    _ => None,
  }
}

async fn wait_for(deadline: Option<Instant>) {
  match deadline {
    Some(at) => sleep_until(at).await,
    None => std::future::pending().await,
  }
}
