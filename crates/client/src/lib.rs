//! `ps-client`: client for an HTTP long-poll publish/subscribe service.
//!
//! Applications publish JSON payloads to named channels, subscribe to
//! receive what others publish, fetch channel history and read server time.
//! Each subscribed channel gets its own long-poll worker that survives
//! network failures and resumes from where it left off.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Application                                                 │
//! │                                                              │
//! │   let (cb, mut events) = event_channel();                    │
//! │   let client = PubSubClient::builder()                       │
//! │       .subscribe_key("demo")                                 │
//! │       .callback(cb)                                          │
//! │       .build()?;                                             │
//! │   client.subscribe("ch1");                                   │
//! │   client.publish("ch1", json!({"msg": "hello"})).await;      │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │
//!   ChannelRegistry ── one ChannelWorker task per live channel
//!                │
//!   Request (path segments) ── crypto (sign / cipher)
//!                │
//!   Transport (reqwest, gzip) ──► GET {origin}/{op}/...
//! ```
//!
//! # Subscription flow
//!
//! 1. `subscribe(channel)` records the channel and starts a worker
//! 2. The worker long-polls `subscribe/{sub}/{channel}/0/{timetoken}`
//! 3. A healthy response fires `on_connect` once, then `on_message` for each
//!    message in order, and advances the timetoken
//! 4. A dropped response fires `on_disconnect`, then probes `time/0`
//!    (firing `on_reconnect` per failed probe) and resumes from the last
//!    timetoken
//! 5. `unsubscribe(channel)` ends the worker after its in-flight poll

pub mod builder;
pub mod callback;
pub mod client;
pub mod crypto;
pub mod reconnect;
pub mod registry;
mod subscribe;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::PubSubClientBuilder;
pub use callback::{event_channel, Callback, EventSender};
pub use client::PubSubClient;
pub use crypto::Cipher;
pub use reconnect::ReconnectBackoff;
pub use registry::{ChannelPhase, ChannelRegistry, ChannelState};
pub use transport::{HttpRequest, HttpTransport, Transport};

// Re-export protocol types so applications never need ps-protocol directly.
pub use ps_protocol::{ClientEvent, ErrorInfo, ErrorKind, Operation, PublishResult};
