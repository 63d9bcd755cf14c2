//! Testing utilities for Sluice.
//!
//! This module provides doubles that make assembling and inspecting flows in
//! tests easier.
//!
//! # Features
//!
//! - [`RecordingHandler`]: A handler that records every message it receives
//! - [`FailingHandler`]: A handler that always fails
//! - [`RecordingChannelInterceptor`]: Logs each interceptor callback by name
//! - [`RecordingAroundInterceptor`]: Logs entry and exit around invocations
//! - [`StubClock`]: A clock tests move by hand

use parking_lot::Mutex;
use sluice_core::{
    AroundInterceptor, ChannelInterceptor, Message, MessageHandler, MessagingError,
    MethodInvocation, Payload,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

pub use crate::scheduling::StubClock;

/// Shared, ordered log of callback names.
pub type CallLog = Arc<Mutex<Vec<String>>>;

// ============================================================================
// Recording Handler
// ============================================================================

/// A handler that records all messages it receives.
///
/// Clones share the same record, so keep one clone for assertions and hand
/// the other to the channel.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = RecordingHandler::new();
/// channel.subscribe(Arc::new(recorder.clone()))?;
///
/// channel.send(message).await?;
/// assert_eq!(recorder.count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RecordingHandler {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl RecordingHandler {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the recorded messages.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Get the number of recorded messages.
    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Payloads of the recorded messages that are `T`, in arrival order.
    pub fn payloads<T: Clone + 'static>(&self) -> Vec<T> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| m.payload_as::<T>().cloned())
            .collect()
    }

    /// Clear all recorded messages.
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

// ============================================================================
// Failing Handler
// ============================================================================

/// A handler that fails every message with a fixed reason.
#[derive(Clone)]
pub struct FailingHandler {
    reason: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingHandler {
    /// Fail with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many messages were handed to the handler.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MessageHandler for FailingHandler {
    async fn handle(&self, _message: Message) -> Result<(), MessagingError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MessagingError::Custom(self.reason.clone().into()))
    }
}

// ============================================================================
// Recording Interceptors
// ============================================================================

/// A channel interceptor that logs each callback as `name:callback`.
///
/// Several interceptors can share one log through [`with_log`](Self::with_log)
/// to assert on their relative order.
pub struct RecordingChannelInterceptor {
    name: String,
    log: CallLog,
}

impl RecordingChannelInterceptor {
    /// Create an interceptor with its own log.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: CallLog::default(),
        }
    }

    /// Write into `log` instead.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// The log this interceptor writes to.
    pub fn shared_log(&self) -> CallLog {
        Arc::clone(&self.log)
    }

    fn record(&self, callback: &str) {
        self.log.lock().push(format!("{}:{callback}", self.name));
    }
}

impl ChannelInterceptor for RecordingChannelInterceptor {
    fn pre_send(&self, message: Message, _channel: &str) -> Result<Option<Message>, MessagingError> {
        self.record("pre_send");
        Ok(Some(message))
    }

    fn post_send(&self, _message: &Message, _channel: &str) {
        self.record("post_send");
    }

    fn after_send_completion(&self, _message: &Message, _channel: &str, _error: Option<&MessagingError>) {
        self.record("after_send_completion");
    }

    fn pre_receive(&self, _channel: &str) -> bool {
        self.record("pre_receive");
        true
    }

    fn post_receive(&self, message: Message, _channel: &str) -> Option<Message> {
        self.record("post_receive");
        Some(message)
    }

    fn after_receive_completion(&self, _message: Option<&Message>, _channel: &str) {
        self.record("after_receive_completion");
    }
}

/// An around-interceptor that logs `name:before` and `name:after`.
pub struct RecordingAroundInterceptor {
    name: String,
    log: CallLog,
}

impl RecordingAroundInterceptor {
    /// Create an interceptor with its own log.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: CallLog::default(),
        }
    }

    /// Write into `log` instead.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// The log this interceptor writes to.
    pub fn shared_log(&self) -> CallLog {
        Arc::clone(&self.log)
    }
}

impl AroundInterceptor for RecordingAroundInterceptor {
    async fn around(&self, invocation: MethodInvocation) -> Result<Option<Payload>, MessagingError> {
        self.log.lock().push(format!("{}:before", self.name));
        let result = invocation.proceed().await;
        self.log.lock().push(format!("{}:after", self.name));
        result
    }
}
