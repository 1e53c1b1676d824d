//! Client side of Agora: the HTTP API client, the realtime event stream,
//! and the local cache that merges pushed events into fetched state.
//!
//! ```rust,ignore
//! let api = ApiClient::new("http://localhost:3000")?;
//! api.login("alice@example.com", "secret").await?;
//!
//! let mut cache = LocalCache::default();
//! api.refresh_threads(&mut cache).await?;
//!
//! let mut stream = api.event_stream().await?;
//! stream.subscribe(Topic::Threads).await?;
//! while let Some(event) = stream.next_event().await? {
//!   cache.apply(&event);
//! }
//! ```

mod client;
mod reconciler;
mod stream;

pub mod error;

pub use client::ApiClient;
pub use error::{Error, Result};
pub use reconciler::{Applied, LocalCache};
pub use stream::EventStream;
