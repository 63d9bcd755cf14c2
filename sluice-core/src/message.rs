//! The message model.
//!
//! A [`Message`] is an immutable pair of [`MessageHeaders`] and a [`Payload`],
//! optionally carrying a reply channel supplied by whoever is waiting for an
//! answer. New messages are produced with a [`MessageBuilder`].

use crate::{channel::MessageChannel, payload::Payload, types::MediaType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{any::Any, collections::BTreeMap, fmt, sync::Arc};

/// Ordered string-keyed header map.
///
/// `id` and `timestamp` are always present on headers of a built message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders(BTreeMap<String, Value>);

impl MessageHeaders {
    /// Unique message id (UUID v4 text).
    pub const ID: &'static str = "id";
    /// Creation time in epoch milliseconds.
    pub const TIMESTAMP: &'static str = "timestamp";
    /// Media type of the payload.
    pub const CONTENT_TYPE: &'static str = "contentType";
    /// Id of the message this one was derived from.
    pub const CORRELATION_ID: &'static str = "correlationId";
    /// Position of this message in a split sequence.
    pub const SEQUENCE_NUMBER: &'static str = "sequenceNumber";
    /// Number of messages in a split sequence.
    pub const SEQUENCE_SIZE: &'static str = "sequenceSize";
    /// Name of a channel to send replies to.
    pub const REPLY_CHANNEL: &'static str = "replyChannel";
    /// Name of a channel to send failures to.
    pub const ERROR_CHANNEL: &'static str = "errorChannel";
    /// Name used by wildcard routing.
    pub const ROUTING_KEY: &'static str = "routingKey";

    /// Look up a header.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Look up a header holding a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Look up a header holding an integer.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    /// Whether the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The message id.
    pub fn id(&self) -> &str {
        self.get_str(Self::ID).unwrap_or_default()
    }

    /// Creation time in epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.get_i64(Self::TIMESTAMP).unwrap_or_default()
    }

    /// The payload media type, if declared.
    pub fn content_type(&self) -> Option<MediaType> {
        self.get_str(Self::CONTENT_TYPE).map(MediaType::parse)
    }

    /// Iterate headers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

/// The unit flowing through channels.
#[derive(Clone)]
pub struct Message {
    headers: MessageHeaders,
    payload: Payload,
    reply_channel: Option<Arc<dyn MessageChannel>>,
}

impl Message {
    /// The headers.
    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The message id.
    pub fn id(&self) -> &str {
        self.headers.id()
    }

    /// The channel a waiting caller listens on for replies.
    pub fn reply_channel(&self) -> Option<&Arc<dyn MessageChannel>> {
        self.reply_channel.as_ref()
    }

    /// Borrow the payload as `T`.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Build an error message describing a failure at `origin`.
    pub fn error(
        origin: impl Into<String>,
        error: &dyn std::error::Error,
        failed_message: Option<Message>,
    ) -> Message {
        let mut builder = MessageBuilder::with_payload(ErrorPayload {
            origin: origin.into(),
            error: error.to_string(),
            failed_message: failed_message.clone(),
        });
        if let Some(failed) = failed_message {
            builder = builder.set_header(MessageHeaders::CORRELATION_ID, failed.id());
        }
        builder.build()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("headers", &self.headers)
            .field("payload", &self.payload)
            .field("reply_channel", &self.reply_channel.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

/// Payload of messages published to error channels.
#[derive(Debug, Clone)]
pub struct ErrorPayload {
    /// Endpoint or gateway where the failure happened.
    pub origin: String,
    /// Rendered error.
    pub error: String,
    /// The message being processed, when one was.
    pub failed_message: Option<Message>,
}

/// Builds [`Message`]s.
///
/// # Example
///
/// ```rust,ignore
/// let message = MessageBuilder::with_payload("hello".to_string())
///     .set_header("tenant", "acme")
///     .build();
/// ```
#[derive(Clone)]
pub struct MessageBuilder {
    headers: BTreeMap<String, Value>,
    payload: Payload,
    reply_channel: Option<Arc<dyn MessageChannel>>,
}

impl MessageBuilder {
    /// Start from a value.
    pub fn with_payload<T: Any + Send + Sync>(value: T) -> Self {
        Self::with_raw_payload(Payload::new(value))
    }

    /// Start from an existing payload.
    pub fn with_raw_payload(payload: Payload) -> Self {
        Self {
            headers: BTreeMap::new(),
            payload,
            reply_channel: None,
        }
    }

    /// Start from a copy of `message`; `build` assigns a fresh id and
    /// timestamp.
    pub fn from_message(message: &Message) -> Self {
        let mut headers = message.headers.0.clone();
        headers.remove(MessageHeaders::ID);
        headers.remove(MessageHeaders::TIMESTAMP);
        Self {
            headers,
            payload: message.payload.clone(),
            reply_channel: message.reply_channel.clone(),
        }
    }

    /// Replace the payload.
    pub fn set_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set a header.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set a header unless it is already present.
    pub fn set_header_if_absent(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Merge headers, overwriting existing ones.
    pub fn set_headers<I, K>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(name, value)| (name.into(), value)));
        self
    }

    /// Remove a header.
    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Declare the payload media type.
    pub fn set_content_type(self, media_type: &MediaType) -> Self {
        self.set_header(MessageHeaders::CONTENT_TYPE, media_type.to_string())
    }

    /// Attach the channel replies should be sent to.
    pub fn set_reply_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.reply_channel = Some(channel);
        self
    }

    /// Detach the reply channel.
    pub fn without_reply_channel(mut self) -> Self {
        self.reply_channel = None;
        self
    }

    /// Finish the message, assigning its id and timestamp.
    pub fn build(self) -> Message {
        let mut headers = self.headers;
        headers.insert(
            MessageHeaders::ID.to_string(),
            Value::from(uuid::Uuid::new_v4().to_string()),
        );
        headers.insert(
            MessageHeaders::TIMESTAMP.to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );
        Message {
            headers: MessageHeaders(headers),
            payload: self.payload,
            reply_channel: self.reply_channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_assigns_id_and_timestamp() {
        let message = MessageBuilder::with_payload("hello".to_string())
            .set_header("tenant", "acme")
            .build();

        assert!(!message.id().is_empty());
        assert!(message.headers().timestamp() > 0);
        assert_eq!(message.headers().get_str("tenant"), Some("acme"));
        assert_eq!(message.payload_as::<String>().map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_from_message_keeps_headers_but_not_identity() {
        let original = MessageBuilder::with_payload(1_i64)
            .set_header("tenant", "acme")
            .build();
        let copy = MessageBuilder::from_message(&original).build();

        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.headers().get_str("tenant"), Some("acme"));
    }

    #[test]
    fn test_set_header_if_absent() {
        let message = MessageBuilder::with_payload(())
            .set_header("a", 1)
            .set_header_if_absent("a", 2)
            .set_header_if_absent("b", 3)
            .build();
        assert_eq!(message.headers().get_i64("a"), Some(1));
        assert_eq!(message.headers().get_i64("b"), Some(3));
    }

    #[test]
    fn test_error_message_correlates_to_failed_message() {
        let failed = MessageBuilder::with_payload(1_i64).build();
        let error = std::io::Error::other("disk full");
        let message = Message::error("endpoint", &error, Some(failed.clone()));

        let payload = message.payload_as::<ErrorPayload>().unwrap();
        assert_eq!(payload.error, "disk full");
        assert_eq!(
            message.headers().get_str(MessageHeaders::CORRELATION_ID),
            Some(failed.id())
        );
    }
}
