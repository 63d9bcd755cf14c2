use super::{
    HeaderValueRouter, MethodTargetRouter, PayloadTypeNameRouter, RecipientListRouter,
    TypeHierarchyRouter, WildcardNameRouter, WildcardPattern,
};
use crate::{
    handler::TargetSource,
    hierarchy::{InMemoryTypeHierarchy, TYPE_HIERARCHY_REFERENCE},
    processor::{MethodInvoker, ParameterConverterBuilder},
};
use sluice_core::{
    ChannelResolver, DynAroundInterceptor, DynMessageHandler, DynRouter, Message, MessageBuilder,
    MessageHandler, MessageHandlerBuilder, MessageHeaders, MessagingError, MethodTarget,
    ReferenceSearchService, ReferenceSearchServiceExt, RoutingError, TypeDescriptor,
    TypeHierarchy,
};
use std::{collections::BTreeMap, sync::Arc};

type Routes = Vec<(String, Vec<String>)>;

fn routes<I, K, C>(mapping: I) -> Routes
where
    I: IntoIterator<Item = (K, C)>,
    K: Into<String>,
    C: IntoIterator<Item: Into<String>>,
{
    mapping
        .into_iter()
        .map(|(key, channels)| (key.into(), channels.into_iter().map(Into::into).collect()))
        .collect()
}

#[derive(Clone)]
enum RouterKind {
    PayloadType(Routes),
    PayloadTypeName,
    Wildcard { header: String, routes: Routes },
    RecipientList(Vec<String>),
    HeaderValue { header: String, mapping: BTreeMap<String, String> },
    Custom(TargetSource),
}

/// Builds a routing endpoint.
///
/// Every router resolves a list of channel names and sends the message to
/// each of them. When nothing resolves, the message goes to the default
/// channel if one is set; otherwise it fails with
/// [`RoutingError::NoDestination`] unless resolution was made optional, in
/// which case it is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let router = RouterBuilder::create_wildcard_router("events", [
///     ("order.*", ["orders"]),
///     ("*.created", ["audit"]),
/// ])
/// .with_apply_sequence(true);
/// ```
#[derive(Clone)]
pub struct RouterBuilder {
    input_channel: String,
    endpoint_id: Option<String>,
    kind: RouterKind,
    resolution_required: bool,
    default_channel: Option<String>,
    apply_sequence: bool,
    converters: Vec<ParameterConverterBuilder>,
    interceptors: Vec<Arc<dyn DynAroundInterceptor>>,
}

impl RouterBuilder {
    fn new(input_channel: impl Into<String>, kind: RouterKind) -> Self {
        Self {
            input_channel: input_channel.into(),
            endpoint_id: None,
            kind,
            resolution_required: true,
            default_channel: None,
            apply_sequence: false,
            converters: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    /// Route on the payload type through its interfaces and ancestors.
    ///
    /// The hierarchy is looked up under [`TYPE_HIERARCHY_REFERENCE`]; without
    /// one every type stands alone apart from the `object` catch-all.
    pub fn create_payload_type_router<I, K, C>(input_channel: impl Into<String>, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: IntoIterator<Item: Into<String>>,
    {
        Self::new(input_channel, RouterKind::PayloadType(routes(mapping)))
    }

    /// Route to the channel named after the payload type.
    pub fn create_payload_type_router_by_type_name(input_channel: impl Into<String>) -> Self {
        Self::new(input_channel, RouterKind::PayloadTypeName)
    }

    /// Route on the [`routingKey`](MessageHeaders::ROUTING_KEY) header
    /// against wildcard keys.
    pub fn create_wildcard_router<I, K, C>(input_channel: impl Into<String>, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: IntoIterator<Item: Into<String>>,
    {
        Self::create_wildcard_router_on_header(input_channel, MessageHeaders::ROUTING_KEY, mapping)
    }

    /// Route on the named header against wildcard keys.
    pub fn create_wildcard_router_on_header<I, K, C>(
        input_channel: impl Into<String>,
        header: impl Into<String>,
        mapping: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: IntoIterator<Item: Into<String>>,
    {
        Self::new(
            input_channel,
            RouterKind::Wildcard {
                header: header.into(),
                routes: routes(mapping),
            },
        )
    }

    /// Send every message to all `recipients`.
    pub fn create_recipient_list_router(
        input_channel: impl Into<String>,
        recipients: impl IntoIterator<Item: Into<String>>,
    ) -> Self {
        Self::new(
            input_channel,
            RouterKind::RecipientList(recipients.into_iter().map(Into::into).collect()),
        )
    }

    /// Route on a header value; unmapped values name the channel directly.
    pub fn create_header_value_router<I, K, V>(
        input_channel: impl Into<String>,
        header: impl Into<String>,
        mapping: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            input_channel,
            RouterKind::HeaderValue {
                header: header.into(),
                mapping: mapping.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            },
        )
    }

    /// Ask `target` for the destinations.
    pub fn create(input_channel: impl Into<String>, target: MethodTarget) -> Self {
        Self::new(input_channel, RouterKind::Custom(TargetSource::Direct(target)))
    }

    /// Ask the [`MethodTarget`] registered under `reference_name`.
    pub fn create_with_reference(input_channel: impl Into<String>, reference_name: impl Into<String>) -> Self {
        Self::new(
            input_channel,
            RouterKind::Custom(TargetSource::Reference(reference_name.into())),
        )
    }

    /// Declare the endpoint id.
    pub fn with_endpoint_id(mut self, endpoint_id: impl Into<String>) -> Self {
        self.endpoint_id = Some(endpoint_id.into());
        self
    }

    /// Whether an empty resolution without default channel is an error.
    pub fn with_resolution_required(mut self, required: bool) -> Self {
        self.resolution_required = required;
        self
    }

    /// Send messages nothing resolved for to `channel`.
    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = Some(channel.into());
        self
    }

    /// Mark copies sent to several channels with sequence headers.
    pub fn with_apply_sequence(mut self, apply_sequence: bool) -> Self {
        self.apply_sequence = apply_sequence;
        self
    }

    /// Parameter converters of a custom router target.
    pub fn with_parameter_converters(mut self, converters: impl IntoIterator<Item = ParameterConverterBuilder>) -> Self {
        self.converters = converters.into_iter().collect();
        self
    }

    fn endpoint_label(&self) -> &str {
        self.endpoint_id.as_deref().unwrap_or(&self.input_channel)
    }

    fn build_router(&self, references: &dyn ReferenceSearchService) -> Result<Arc<dyn DynRouter>, MessagingError> {
        Ok(match &self.kind {
            RouterKind::PayloadType(routes) => {
                let hierarchy: Arc<dyn TypeHierarchy> = if references.has(TYPE_HIERARCHY_REFERENCE) {
                    let shared = references.get_typed::<Arc<dyn TypeHierarchy>>(TYPE_HIERARCHY_REFERENCE)?;
                    Arc::clone(shared.as_ref())
                } else {
                    Arc::new(InMemoryTypeHierarchy::new())
                };
                let mapping = routes
                    .iter()
                    .map(|(ty, channels)| (TypeDescriptor::new(ty.as_str()), channels.clone()))
                    .collect();
                Arc::new(TypeHierarchyRouter::new(mapping, hierarchy))
            }
            RouterKind::PayloadTypeName => Arc::new(PayloadTypeNameRouter),
            RouterKind::Wildcard { header, routes } => {
                let compiled = routes
                    .iter()
                    .map(|(key, channels)| WildcardPattern::new(key).map(|pattern| (pattern, channels.clone())))
                    .collect::<Result<Vec<_>, _>>()?;
                Arc::new(WildcardNameRouter::new(header.clone(), compiled))
            }
            RouterKind::RecipientList(recipients) => Arc::new(RecipientListRouter::new(recipients.clone())),
            RouterKind::HeaderValue { header, mapping } => {
                Arc::new(HeaderValueRouter::new(header.clone(), mapping.clone()))
            }
            RouterKind::Custom(target) => {
                let invoker = MethodInvoker::create(
                    target.resolve(references)?,
                    &self.converters,
                    self.interceptors.clone(),
                    references,
                )?;
                Arc::new(MethodTargetRouter::new(self.endpoint_label(), invoker))
            }
        })
    }
}

impl MessageHandlerBuilder for RouterBuilder {
    fn input_channel_name(&self) -> &str {
        &self.input_channel
    }

    fn endpoint_id(&self) -> Option<&str> {
        self.endpoint_id.as_deref()
    }

    fn set_endpoint_id(&mut self, endpoint_id: String) {
        self.endpoint_id = Some(endpoint_id);
    }

    fn required_reference_names(&self) -> Vec<String> {
        let mut names = match &self.kind {
            RouterKind::Custom(target) => target.required_reference_names(),
            _ => Vec::new(),
        };
        names.extend(self.converters.iter().flat_map(|c| c.required_reference_names()));
        names
    }

    fn add_around_interceptor(&mut self, interceptor: Arc<dyn DynAroundInterceptor>) {
        self.interceptors.push(interceptor);
    }

    fn describe(&self) -> String {
        let kind = match &self.kind {
            RouterKind::PayloadType(_) => "payload type".to_string(),
            RouterKind::PayloadTypeName => "payload type name".to_string(),
            RouterKind::Wildcard { header, .. } => format!("wildcard on `{header}`"),
            RouterKind::RecipientList(_) => "recipient list".to_string(),
            RouterKind::HeaderValue { header, .. } => format!("header value of `{header}`"),
            RouterKind::Custom(target) => target.describe(),
        };
        format!("router `{}` ({kind})", self.endpoint_label())
    }

    fn build(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError> {
        Ok(Arc::new(RoutingHandler {
            endpoint_id: self.endpoint_label().to_string(),
            router: self.build_router(references.as_ref())?,
            channels: Arc::clone(channels),
            resolution_required: self.resolution_required,
            default_channel: self.default_channel.clone(),
            apply_sequence: self.apply_sequence,
        }))
    }
}

struct RoutingHandler {
    endpoint_id: String,
    router: Arc<dyn DynRouter>,
    channels: Arc<dyn ChannelResolver>,
    resolution_required: bool,
    default_channel: Option<String>,
    apply_sequence: bool,
}

impl RoutingHandler {
    fn copies(&self, message: &Message, count: usize) -> Vec<Message> {
        if !self.apply_sequence || count < 2 {
            return vec![message.clone(); count];
        }
        (0..count)
            .map(|number| {
                MessageBuilder::from_message(message)
                    .set_header(MessageHeaders::SEQUENCE_NUMBER, number)
                    .set_header(MessageHeaders::SEQUENCE_SIZE, count)
                    .set_header(MessageHeaders::CORRELATION_ID, message.id())
                    .build()
            })
            .collect()
    }
}

impl MessageHandler for RoutingHandler {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        let mut destinations = self.router.resolve_destinations_dyn(&message).await?;
        if destinations.is_empty() {
            match &self.default_channel {
                Some(default) => destinations.push(default.clone()),
                None if self.resolution_required => {
                    return Err(RoutingError::NoDestination {
                        endpoint_id: self.endpoint_id.clone(),
                        message_id: message.id().to_string(),
                    }
                    .into());
                }
                None => {
                    tracing::debug!(endpoint_id = %self.endpoint_id, message_id = message.id(), "no destination, dropping");
                    return Ok(());
                }
            }
        }

        let channels = destinations
            .iter()
            .map(|name| self.channels.resolve(name))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            endpoint_id = %self.endpoint_id,
            message_id = message.id(),
            destinations = ?destinations,
            "routing"
        );
        for (channel, copy) in channels.iter().zip(self.copies(&message, channels.len())) {
            channel.send(copy).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{InMemoryChannelResolver, QueueChannel},
        hierarchy::InMemoryTypeHierarchy,
        reference::InMemoryReferenceSearchService,
    };
    use sluice_core::{MessageChannel, Payload, PollableChannel};

    struct Fixture {
        queues: BTreeMap<&'static str, Arc<QueueChannel>>,
        channels: Arc<dyn ChannelResolver>,
        references: Arc<dyn ReferenceSearchService>,
    }

    impl Fixture {
        fn new(names: &[&'static str]) -> Self {
            Self::with_references(names, InMemoryReferenceSearchService::new())
        }

        fn with_references(names: &[&'static str], references: InMemoryReferenceSearchService) -> Self {
            let queues: BTreeMap<_, _> = names
                .iter()
                .map(|name| (*name, Arc::new(QueueChannel::new(*name))))
                .collect();
            let channels = queues.values().map(|q| {
                let channel: Arc<dyn MessageChannel> = q.clone();
                channel
            });
            Self {
                channels: Arc::new(InMemoryChannelResolver::from_channels(channels)),
                queues,
                references: Arc::new(references),
            }
        }

        fn handler(&self, builder: RouterBuilder) -> Arc<dyn DynMessageHandler> {
            builder.build(&self.channels, &self.references).unwrap()
        }

        fn drain(&self, name: &str) -> Vec<Message> {
            std::iter::from_fn(|| self.queues[name].receive()).collect()
        }
    }

    fn tagged(key: &str) -> Message {
        MessageBuilder::with_payload(1_i64)
            .set_header(MessageHeaders::ROUTING_KEY, key)
            .build()
    }

    #[tokio::test]
    async fn test_unresolved_message_fails_when_required() {
        let f = Fixture::new(&["orders"]);
        let handler = f.handler(
            RouterBuilder::create_wildcard_router("in", [("order.*", ["orders"])]).with_endpoint_id("byKey"),
        );
        let err = handler.handle_dyn(tagged("invoice.paid")).await.unwrap_err();
        assert!(matches!(
            err,
            MessagingError::Routing(RoutingError::NoDestination { ref endpoint_id, .. }) if endpoint_id == "byKey"
        ));
    }

    #[tokio::test]
    async fn test_unresolved_message_goes_to_default_channel() {
        let f = Fixture::new(&["orders", "fallback"]);
        let handler = f.handler(
            RouterBuilder::create_wildcard_router("in", [("order.*", ["orders"])])
                .with_default_channel("fallback"),
        );
        handler.handle_dyn(tagged("invoice.paid")).await.unwrap();
        assert_eq!(f.drain("fallback").len(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_message_is_dropped_when_optional() {
        let f = Fixture::new(&["orders"]);
        let handler = f.handler(
            RouterBuilder::create_wildcard_router("in", [("order.*", ["orders"])])
                .with_resolution_required(false),
        );
        assert!(handler.handle_dyn(tagged("invoice.paid")).await.is_ok());
        assert!(f.drain("orders").is_empty());
    }

    #[tokio::test]
    async fn test_apply_sequence_marks_copies() {
        let f = Fixture::new(&["a", "b", "c"]);
        let handler = f.handler(
            RouterBuilder::create_recipient_list_router("in", ["a", "b", "c"]).with_apply_sequence(true),
        );
        let source = MessageBuilder::with_payload(1_i64).build();
        handler.handle_dyn(source.clone()).await.unwrap();

        let copies: Vec<Message> = ["a", "b", "c"].iter().flat_map(|name| f.drain(name)).collect();
        assert_eq!(copies.len(), 3);
        for (number, copy) in copies.iter().enumerate() {
            assert_eq!(copy.headers().get_i64(MessageHeaders::SEQUENCE_NUMBER), Some(number as i64));
            assert_eq!(copy.headers().get_i64(MessageHeaders::SEQUENCE_SIZE), Some(3));
            assert_eq!(copy.headers().get_str(MessageHeaders::CORRELATION_ID), Some(source.id()));
            assert_ne!(copy.id(), source.id());
        }
    }

    #[tokio::test]
    async fn test_single_destination_gets_original_message() {
        let f = Fixture::new(&["a"]);
        let handler = f.handler(RouterBuilder::create_recipient_list_router("in", ["a"]).with_apply_sequence(true));
        let source = MessageBuilder::with_payload(1_i64).build();
        handler.handle_dyn(source.clone()).await.unwrap();

        let received = f.drain("a");
        assert_eq!(received[0].id(), source.id());
        assert!(!received[0].headers().contains(MessageHeaders::SEQUENCE_SIZE));
    }

    #[tokio::test]
    async fn test_unknown_destination_channel() {
        let f = Fixture::new(&[]);
        let handler = f.handler(RouterBuilder::create_recipient_list_router("in", ["missing"]));
        let err = handler
            .handle_dyn(MessageBuilder::with_payload(1_i64).build())
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::ChannelNotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_payload_type_router_uses_registered_hierarchy() {
        let hierarchy: Arc<dyn TypeHierarchy> =
            Arc::new(InMemoryTypeHierarchy::new().with_class("Concrete", None, ["I"]));
        let references = InMemoryReferenceSearchService::new().with(TYPE_HIERARCHY_REFERENCE, hierarchy);
        let f = Fixture::with_references(&["a", "b", "c"], references);
        let handler = f.handler(RouterBuilder::create_payload_type_router(
            "in",
            [("object", ["a"]), ("I", ["b"]), ("Concrete", ["c"])],
        ));

        let message = MessageBuilder::with_raw_payload(Payload::with_type((), TypeDescriptor::new("Concrete"))).build();
        handler.handle_dyn(message).await.unwrap();
        for name in ["a", "b", "c"] {
            assert_eq!(f.drain(name).len(), 1, "{name} should receive the message");
        }
    }

    #[tokio::test]
    async fn test_wildcard_keys_with_regex_syntax_match_literally() {
        let f = Fixture::new(&["x"]);
        let handler = f.handler(RouterBuilder::create_wildcard_router("in", [("a(b*", ["x"])]));
        handler.handle_dyn(tagged("a(b)")).await.unwrap();
        assert_eq!(f.drain("x").len(), 1);
        assert!(handler.handle_dyn(tagged("ab")).await.is_err());
    }

    #[test]
    fn test_custom_router_reference_is_required() {
        let builder = RouterBuilder::create_with_reference("in", "dispatcher");
        assert_eq!(builder.required_reference_names(), vec!["dispatcher"]);
        assert!(builder.describe().contains("@dispatcher"));
    }
}
