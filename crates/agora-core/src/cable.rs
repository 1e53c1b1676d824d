//! Frames exchanged over the realtime WebSocket.
//!
//! Client → server: `{"topic":"threads"}` or
//! `{"action":"unsubscribe","topic":"thread:7"}`.
//!
//! Server → client: control frames tagged by `type`, and bare [`Event`]
//! frames which carry no `type` field.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  event::{Event, Topic},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  #[default]
  Subscribe,
  Unsubscribe,
}

/// A client request. `topic` stays a string here so that a bad name can be
/// answered with an error frame instead of failing the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
  #[serde(default)]
  pub action: Action,
  pub topic:  String,
}

impl Command {
  pub fn subscribe(topic: Topic) -> Self {
    Self { action: Action::Subscribe, topic: topic.to_string() }
  }

  pub fn unsubscribe(topic: Topic) -> Self {
    Self { action: Action::Unsubscribe, topic: topic.to_string() }
  }

  pub fn topic(&self) -> Result<Topic> { self.topic.parse() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
  Subscribed { topic: Topic },
  Unsubscribed { topic: Topic },
  Error { message: String },
  /// The connection's token lapsed. Public subscriptions keep flowing.
  SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
  Control(Control),
  Event(Event),
}

impl ServerFrame {
  /// Decode a text frame sent by the server.
  pub fn parse(text: &str) -> Result<Self> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("type").is_some() {
      Ok(ServerFrame::Control(serde_json::from_value(value)?))
    } else {
      Ok(ServerFrame::Event(serde_json::from_value(value)?))
    }
  }

  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }
}
