//! [`EventStream`]: a realtime connection to the server's cable endpoint.

use std::collections::VecDeque;

use agora_core::{
  cable::{Command, Control, ServerFrame},
  event::{Event, Topic},
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscribes to topics and yields the events published on them.
///
/// Events that arrive while a command is waiting for its confirmation are
/// queued and returned by later [`next_event`](Self::next_event) calls, so
/// nothing is lost between subscribing and reading.
pub struct EventStream {
  ws:              WsStream,
  pending:         VecDeque<Event>,
  session_expired: bool,
}

impl EventStream {
  /// Connect to `url`, e.g. `ws://host/api/v1/cable?token=...`.
  pub async fn connect(url: &str) -> Result<Self> {
    let (ws, _response) = connect_async(url).await?;
    tracing::debug!(%url, "event stream connected");
    Ok(Self { ws, pending: VecDeque::new(), session_expired: false })
  }

  /// `true` once the server reported that this connection's token lapsed.
  pub fn session_expired(&self) -> bool { self.session_expired }

  /// Subscribe to `topic` and wait for the server's confirmation.
  pub async fn subscribe(&mut self, topic: Topic) -> Result<()> {
    self.command(Command::subscribe(topic)).await?;
    self.await_control(|c| matches!(c, Control::Subscribed { topic: t } if *t == topic)).await
  }

  /// Unsubscribe from `topic` and wait for the server's confirmation.
  pub async fn unsubscribe(&mut self, topic: Topic) -> Result<()> {
    self.command(Command::unsubscribe(topic)).await?;
    self.await_control(|c| matches!(c, Control::Unsubscribed { topic: t } if *t == topic)).await
  }

  /// The next event on any subscribed topic. `None` once the server closes
  /// the connection.
  pub async fn next_event(&mut self) -> Result<Option<Event>> {
    if let Some(event) = self.pending.pop_front() {
      return Ok(Some(event));
    }
    loop {
      match self.next_frame().await? {
        None => return Ok(None),
        Some(ServerFrame::Event(event)) => return Ok(Some(event)),
        Some(ServerFrame::Control(control)) => self.note(control),
      }
    }
  }

  /// Close the connection politely.
  pub async fn close(mut self) -> Result<()> {
    self.ws.close(None).await?;
    Ok(())
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn command(&mut self, command: Command) -> Result<()> {
    let text = serde_json::to_string(&command).map_err(agora_core::Error::from)?;
    self.ws.send(Message::Text(text.into())).await?;
    Ok(())
  }

  async fn await_control(&mut self, done: impl Fn(&Control) -> bool) -> Result<()> {
    loop {
      match self.next_frame().await? {
        None => return Err(Error::Closed),
        Some(ServerFrame::Event(event)) => self.pending.push_back(event),
        Some(ServerFrame::Control(Control::Error { message })) => {
          return Err(Error::Rejected(message));
        }
        Some(ServerFrame::Control(control)) if done(&control) => return Ok(()),
        Some(ServerFrame::Control(control)) => self.note(control),
      }
    }
  }

  fn note(&mut self, control: Control) {
    match control {
      Control::SessionExpired => {
        tracing::info!("server reports session expired; public topics continue");
        self.session_expired = true;
      }
      other => tracing::debug!(?other, "control frame"),
    }
  }

  async fn next_frame(&mut self) -> Result<Option<ServerFrame>> {
    while let Some(message) = self.ws.next().await {
      match message? {
        Message::Text(text) => return Ok(Some(ServerFrame::parse(text.as_str())?)),
        Message::Close(_) => return Ok(None),
        // Pings are answered by tungstenite itself.
        _ => continue,
      }
    }
    Ok(None)
  }
}
