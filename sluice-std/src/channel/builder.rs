use super::{DirectChannel, PublishSubscribeChannel, QueueChannel};
use sluice_core::{
    ChannelInterceptor, ChannelInterceptorBuilder, MessageChannel, MessageChannelBuilder,
    MessagingError, ReferenceSearchService, ReferenceSearchServiceExt,
};
use std::sync::Arc;

/// The channel implementation a [`SimpleMessageChannelBuilder`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// [`DirectChannel`].
    Direct,
    /// [`PublishSubscribeChannel`].
    PublishSubscribe,
    /// [`QueueChannel`].
    Queue,
}

/// Builds one of the standard in-memory channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleMessageChannelBuilder {
    name: String,
    kind: ChannelKind,
}

impl SimpleMessageChannelBuilder {
    /// A point-to-point event-driven channel.
    pub fn create_direct_channel(name: impl Into<String>) -> Self {
        Self::new(name, ChannelKind::Direct)
    }

    /// A broadcasting event-driven channel.
    pub fn create_publish_subscribe_channel(name: impl Into<String>) -> Self {
        Self::new(name, ChannelKind::PublishSubscribe)
    }

    /// A pollable FIFO channel.
    pub fn create_queue_channel(name: impl Into<String>) -> Self {
        Self::new(name, ChannelKind::Queue)
    }

    /// A channel of the given kind.
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// The channel kind.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
}

impl MessageChannelBuilder for SimpleMessageChannelBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_pollable(&self) -> bool {
        self.kind == ChannelKind::Queue
    }

    fn definition(&self) -> String {
        format!("{:?}({})", self.kind, self.name)
    }

    fn build(
        &self,
        _references: &dyn ReferenceSearchService,
    ) -> Result<Arc<dyn MessageChannel>, MessagingError> {
        Ok(match self.kind {
            ChannelKind::Direct => Arc::new(DirectChannel::new(&self.name)),
            ChannelKind::PublishSubscribe => Arc::new(PublishSubscribeChannel::new(&self.name)),
            ChannelKind::Queue => Arc::new(QueueChannel::new(&self.name)),
        })
    }
}

enum InterceptorSource {
    Instance(Arc<dyn ChannelInterceptor>),
    Reference(String),
}

/// Attaches a channel interceptor, given directly or by reference name, to
/// the channels matching a pattern.
pub struct SimpleChannelInterceptorBuilder {
    target_pattern: String,
    importance: i32,
    name: String,
    source: InterceptorSource,
}

impl SimpleChannelInterceptorBuilder {
    /// Attach `interceptor`, described as `name`.
    pub fn create(
        target_pattern: impl Into<String>,
        name: impl Into<String>,
        interceptor: Arc<dyn ChannelInterceptor>,
    ) -> Self {
        Self {
            target_pattern: target_pattern.into(),
            importance: 0,
            name: name.into(),
            source: InterceptorSource::Instance(interceptor),
        }
    }

    /// Attach the interceptor registered under `reference_name`.
    ///
    /// The reference must hold an `Arc<dyn ChannelInterceptor>`.
    pub fn create_with_reference(
        target_pattern: impl Into<String>,
        reference_name: impl Into<String>,
    ) -> Self {
        let reference_name = reference_name.into();
        Self {
            target_pattern: target_pattern.into(),
            importance: 0,
            name: reference_name.clone(),
            source: InterceptorSource::Reference(reference_name),
        }
    }

    /// Set the importance; higher wraps first.
    pub fn with_importance(mut self, importance: i32) -> Self {
        self.importance = importance;
        self
    }
}

impl ChannelInterceptorBuilder for SimpleChannelInterceptorBuilder {
    fn target_pattern(&self) -> &str {
        &self.target_pattern
    }

    fn importance(&self) -> i32 {
        self.importance
    }

    fn required_reference_names(&self) -> Vec<String> {
        match &self.source {
            InterceptorSource::Reference(name) => vec![name.clone()],
            InterceptorSource::Instance(_) => Vec::new(),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn build(
        &self,
        references: &dyn ReferenceSearchService,
    ) -> Result<Arc<dyn ChannelInterceptor>, MessagingError> {
        match &self.source {
            InterceptorSource::Instance(interceptor) => Ok(Arc::clone(interceptor)),
            InterceptorSource::Reference(name) => references
                .get_typed::<Arc<dyn ChannelInterceptor>>(name)
                .map(|shared| Arc::clone(shared.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReferenceSearchService;

    struct Noop;
    impl ChannelInterceptor for Noop {}

    #[test]
    fn test_builders_of_same_channel_share_definition() {
        let a = SimpleMessageChannelBuilder::create_queue_channel("jobs");
        let b = SimpleMessageChannelBuilder::create_queue_channel("jobs");
        let c = SimpleMessageChannelBuilder::create_direct_channel("jobs");
        assert_eq!(a.definition(), b.definition());
        assert_ne!(a.definition(), c.definition());
        assert!(a.is_pollable());
        assert!(!c.is_pollable());
    }

    #[test]
    fn test_built_channel_capabilities_match_kind() {
        let references = InMemoryReferenceSearchService::new();
        let queue = SimpleMessageChannelBuilder::create_queue_channel("jobs")
            .build(&references)
            .unwrap();
        let pubsub = SimpleMessageChannelBuilder::create_publish_subscribe_channel("events")
            .build(&references)
            .unwrap();
        assert!(queue.as_pollable().is_some());
        assert!(pubsub.as_subscribable().is_some());
        assert!(pubsub.as_pollable().is_none());
    }

    #[test]
    fn test_interceptor_from_reference() {
        let interceptor: Arc<dyn ChannelInterceptor> = Arc::new(Noop);
        let references = InMemoryReferenceSearchService::new().with("audit", interceptor);
        let builder = SimpleChannelInterceptorBuilder::create_with_reference("orders.*", "audit")
            .with_importance(4);

        assert_eq!(builder.required_reference_names(), vec!["audit"]);
        assert_eq!(builder.importance(), 4);
        assert!(builder.build(&references).is_ok());
        assert!(builder.build(&InMemoryReferenceSearchService::new()).is_err());
    }
}
