//! Request builder: ordered path segments per operation, joined onto the
//! origin with each segment percent-encoded.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use ps_domain::error::{Error, Result};

use crate::PROTOCOL_VERSION;

/// Bytes left as-is in a path segment. Space is deliberately absent so it
/// becomes `%20`, never `+`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

/// The four remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Publish,
    Subscribe,
    History,
    Time,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Publish => "publish",
            Operation::Subscribe => "subscribe",
            Operation::History => "history",
            Operation::Time => "time",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A not-yet-encoded request: operation, target channel, raw segments.
///
/// The first segment is always the operation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub channel: Option<String>,
    pub segments: Vec<String>,
}

impl Request {
    /// `publish/{pub}/{sub}/{signature}/{channel}/0/{message}`
    pub fn publish(
        publish_key: &str,
        subscribe_key: &str,
        signature: &str,
        channel: &str,
        serialized_message: &str,
    ) -> Self {
        Self {
            operation: Operation::Publish,
            channel: Some(channel.to_owned()),
            segments: vec![
                "publish".into(),
                publish_key.into(),
                subscribe_key.into(),
                signature.into(),
                channel.into(),
                "0".into(),
                serialized_message.into(),
            ],
        }
    }

    /// `subscribe/{sub}/{channel}/0/{timetoken}`
    pub fn subscribe(subscribe_key: &str, channel: &str, timetoken: &str) -> Self {
        Self {
            operation: Operation::Subscribe,
            channel: Some(channel.to_owned()),
            segments: vec![
                "subscribe".into(),
                subscribe_key.into(),
                channel.into(),
                "0".into(),
                timetoken.into(),
            ],
        }
    }

    /// `history/{sub}/{channel}/0/{limit}`
    pub fn history(subscribe_key: &str, channel: &str, limit: u32) -> Self {
        Self {
            operation: Operation::History,
            channel: Some(channel.to_owned()),
            segments: vec![
                "history".into(),
                subscribe_key.into(),
                channel.into(),
                "0".into(),
                limit.to_string(),
            ],
        }
    }

    /// `time/0`
    pub fn time() -> Self {
        Self {
            operation: Operation::Time,
            channel: None,
            segments: vec!["time".into(), "0".into()],
        }
    }

    /// Join the encoded segments onto `origin` (scheme + host).
    ///
    /// Fails as a whole if any segment cannot be encoded; a partially
    /// encoded URL is never returned.
    pub fn url(&self, origin: &str) -> Result<String> {
        let mut url = origin.trim_end_matches('/').to_owned();
        for segment in &self.segments {
            url.push('/');
            url.push_str(&encode_segment(segment)?);
        }
        Ok(url)
    }
}

/// Percent-encode one path segment.
///
/// Empty segments and ASCII control characters are rejected: the first
/// would collapse the path, the second has no meaning to the service.
pub fn encode_segment(segment: &str) -> Result<String> {
    if segment.is_empty() {
        return Err(Error::Encoding("empty path segment".into()));
    }
    if let Some(c) = segment.chars().find(|c| c.is_ascii_control()) {
        return Err(Error::Encoding(format!(
            "control character {:#04x} in path segment",
            c as u32
        )));
    }
    Ok(utf8_percent_encode(segment, SEGMENT).to_string())
}

/// Headers sent on every request.
pub fn request_headers(user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("V".into(), PROTOCOL_VERSION.into()),
        ("User-Agent".into(), user_agent.into()),
        ("Accept-Encoding".into(), "gzip".into()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://pubsub.pubnub.com";

    #[test]
    fn time_url() {
        assert_eq!(
            Request::time().url(ORIGIN).unwrap(),
            "http://pubsub.pubnub.com/time/0"
        );
    }

    #[test]
    fn subscribe_url_layout() {
        let req = Request::subscribe("sub-key", "ch1", "13512345678901234");
        assert_eq!(req.operation, Operation::Subscribe);
        assert_eq!(req.channel.as_deref(), Some("ch1"));
        assert_eq!(
            req.url(ORIGIN).unwrap(),
            "http://pubsub.pubnub.com/subscribe/sub-key/ch1/0/13512345678901234"
        );
    }

    #[test]
    fn history_url_layout() {
        let req = Request::history("sub-key", "ch1", 10);
        assert_eq!(
            req.url(ORIGIN).unwrap(),
            "http://pubsub.pubnub.com/history/sub-key/ch1/0/10"
        );
    }

    #[test]
    fn publish_url_encodes_message() {
        let req = Request::publish("pub", "sub", "0", "ch1", r#"{"msg":"hello"}"#);
        assert_eq!(
            req.url(ORIGIN).unwrap(),
            "http://pubsub.pubnub.com/publish/pub/sub/0/ch1/0/%7B%22msg%22%3A%22hello%22%7D"
        );
    }

    #[test]
    fn safe_characters_pass_through() {
        assert_eq!(encode_segment("a-b_c.d*E9").unwrap(), "a-b_c.d*E9");
    }

    #[test]
    fn space_is_percent_escaped() {
        assert_eq!(encode_segment("hello world").unwrap(), "hello%20world");
    }

    #[test]
    fn non_ascii_is_utf8_escaped() {
        assert_eq!(encode_segment("顶").unwrap(), "%E9%A1%B6");
        assert_eq!(encode_segment("a/b?c").unwrap(), "a%2Fb%3Fc");
    }

    #[test]
    fn empty_segment_fails_whole_url() {
        let req = Request::subscribe("sub", "", "0");
        assert!(matches!(req.url(ORIGIN), Err(Error::Encoding(_))));
    }

    #[test]
    fn control_character_rejected() {
        assert!(matches!(encode_segment("bad\nchannel"), Err(Error::Encoding(_))));
    }

    #[test]
    fn trailing_slash_on_origin_is_ignored() {
        assert_eq!(
            Request::time().url("https://example.com/").unwrap(),
            "https://example.com/time/0"
        );
    }

    #[test]
    fn headers_carry_protocol_version() {
        let headers = request_headers("ps-client/test");
        assert!(headers.contains(&("V".to_string(), "3.1".to_string())));
        assert!(headers.contains(&("Accept-Encoding".to_string(), "gzip".to_string())));
        assert!(headers.contains(&("User-Agent".to_string(), "ps-client/test".to_string())));
    }
}
