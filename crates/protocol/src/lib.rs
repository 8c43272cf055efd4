//! Wire contract of the publish/subscribe HTTP service.
//!
//! Every operation is a `GET {origin}/{op}/{segments...}` whose response body
//! is a JSON array. This crate owns the pieces that must match the service
//! byte-for-byte: the request path layout and segment encoding
//! ([`request`]), the response shapes ([`envelope`]), and the event type
//! handed to applications ([`event`]).

pub mod envelope;
pub mod event;
pub mod request;

pub use envelope::{
    decode_history, decode_publish, decode_subscribe, decode_time, DropReason, Envelope,
    PublishResult, SubscribeResponse,
};
pub use event::{ClientEvent, ErrorInfo, ErrorKind};
pub use request::{encode_segment, request_headers, Operation, Request};

/// Value of the `V` request header.
pub const PROTOCOL_VERSION: &str = "3.1";

/// Default service host.
pub const DEFAULT_ORIGIN: &str = "pubsub.pubnub.com";

/// Timetoken meaning "start from the next new message".
pub const TIMETOKEN_NOW: &str = "0";

/// Signature sent when no secret key is configured.
pub const UNSIGNED: &str = "0";
