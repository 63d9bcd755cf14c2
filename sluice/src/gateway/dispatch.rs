use super::parameter::RequestMapping;
use parking_lot::Mutex;
use sluice_core::{
    BoxError, ConversionError, ConversionService, DynAroundInterceptor, InterfaceToCall,
    InvocationError, MediaType, Message, MessageBuilder, MessageChannel, MessageHeaders,
    MessagingError, MethodInvocation, MethodTarget, Payload, PollableChannel,
};
use sluice_std::channel::QueueChannel;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::oneshot, time::Instant};

/// Hands replies arriving on a shared reply channel to the call waiting for
/// them, matched by the `correlationId` header.
///
/// Whichever caller is waiting drains the channel for everyone; replies
/// nobody waits for any more are discarded.
pub(crate) struct ReplyCorrelator {
    channel: Arc<dyn MessageChannel>,
    pending: Mutex<HashMap<String, oneshot::Sender<Message>>>,
}

impl ReplyCorrelator {
    pub(crate) fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn register(self: &Arc<Self>, correlation: String) -> PendingReply {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(correlation.clone(), sender);
        PendingReply {
            correlator: Arc::clone(self),
            correlation,
            receiver,
        }
    }

    fn deliver(&self, reply: Message) {
        let waiting = reply
            .headers()
            .get_str(MessageHeaders::CORRELATION_ID)
            .and_then(|correlation| self.pending.lock().remove(correlation));
        let delivered = match waiting {
            Some(sender) => sender.send(reply).map_err(|reply| reply.id().to_string()),
            None => Err(reply.id().to_string()),
        };
        if let Err(message_id) = delivered {
            tracing::debug!(
                channel = %self.channel.name(),
                %message_id,
                "discarding reply nobody is waiting for"
            );
        }
    }

    fn drain(&self, channel: &dyn PollableChannel) {
        while let Some(reply) = channel.receive() {
            self.deliver(reply);
        }
    }
}

/// A call registered with a [`ReplyCorrelator`]; unregisters on drop.
struct PendingReply {
    correlator: Arc<ReplyCorrelator>,
    correlation: String,
    receiver: oneshot::Receiver<Message>,
}

impl PendingReply {
    async fn receive(mut self, timeout: Option<Duration>) -> Option<Message> {
        let correlator = Arc::clone(&self.correlator);
        let channel = correlator.channel.as_pollable()?;
        let Some(timeout) = timeout else {
            correlator.drain(channel);
            return self.receiver.try_recv().ok();
        };

        let deadline = Instant::now() + timeout;
        loop {
            correlator.drain(channel);
            if let Ok(reply) = self.receiver.try_recv() {
                return Some(reply);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            tokio::select! {
                reply = &mut self.receiver => return reply.ok(),
                arrived = channel.receive_with_timeout(remaining) => {
                    if let Some(reply) = arrived {
                        correlator.deliver(reply);
                    }
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.correlator.pending.lock().remove(&self.correlation);
    }
}

/// Where one call waits for its reply.
enum AwaitedReply {
    /// A queue created for this call alone.
    Private(Arc<dyn MessageChannel>),
    /// The method's configured reply channel, shared between calls.
    Shared(PendingReply),
}

/// The channel side of one gateway method.
pub(crate) struct Exchange {
    pub(crate) origin: String,
    pub(crate) interface: InterfaceToCall,
    pub(crate) mapping: RequestMapping,
    pub(crate) request_channel: Arc<dyn MessageChannel>,
    pub(crate) replies: Option<Arc<ReplyCorrelator>>,
    pub(crate) reply_timeout: Option<Duration>,
    pub(crate) conversion: Arc<dyn ConversionService>,
}

impl Exchange {
    /// Attach the channel the reply is awaited on, unless nothing is returned.
    fn prepare(&self, builder: MessageBuilder) -> (Message, Option<AwaitedReply>) {
        if self.interface.is_void() {
            return (builder.build(), None);
        }
        match &self.replies {
            Some(correlator) => {
                let correlation = uuid::Uuid::new_v4().to_string();
                let request = builder
                    .set_header_if_absent(MessageHeaders::CORRELATION_ID, correlation.as_str())
                    .set_reply_channel(Arc::clone(&correlator.channel))
                    .build();
                let correlation = request
                    .headers()
                    .get_str(MessageHeaders::CORRELATION_ID)
                    .map_or(correlation, str::to_string);
                let pending = correlator.register(correlation);
                (request, Some(AwaitedReply::Shared(pending)))
            }
            None => {
                let queue: Arc<dyn MessageChannel> =
                    Arc::new(QueueChannel::new(format!("{}.reply", self.origin)));
                let request = builder.set_reply_channel(Arc::clone(&queue)).build();
                (request, Some(AwaitedReply::Private(queue)))
            }
        }
    }

    async fn send_and_receive(
        &self,
        request: Message,
        awaited: Option<AwaitedReply>,
    ) -> Result<Option<Payload>, MessagingError> {
        tracing::debug!(gateway = %self.origin, message_id = %request.id(), "sending request");
        self.request_channel.send(request).await?;

        let reply = match awaited {
            None => return Ok(None),
            Some(AwaitedReply::Shared(pending)) => pending.receive(self.reply_timeout).await,
            Some(AwaitedReply::Private(queue)) => match queue.as_pollable() {
                Some(channel) => match self.reply_timeout {
                    Some(timeout) => channel.receive_with_timeout(timeout).await,
                    None => channel.receive(),
                },
                None => None,
            },
        };
        match (reply, self.reply_timeout) {
            (Some(reply), _) => self.reply_payload(reply).map(Some),
            (None, Some(timeout)) => Err(MessagingError::ReplyTimeout(timeout)),
            (None, None) => Ok(None),
        }
    }

    /// The reply as the method's return type, converted when the types
    /// differ.
    fn reply_payload(&self, reply: Message) -> Result<Payload, MessagingError> {
        let return_type = self.interface.return_type();
        if return_type.is_message() {
            return Ok(Payload::new(reply));
        }
        let payload = reply.payload().clone();
        if payload.is_null() {
            return Ok(payload);
        }

        let source_media = reply.headers().content_type().unwrap_or_default();
        let target_media = MediaType::rust_object();
        let source_type = source_media
            .type_parameter()
            .unwrap_or_else(|| payload.type_descriptor().clone());
        if source_media.is_compatible_with(&target_media) && return_type.accepts(&source_type) {
            return Ok(payload);
        }
        if !self
            .conversion
            .can_convert(&source_type, &source_media, return_type, &target_media)
        {
            return Err(ConversionError::Unsupported {
                source_type: source_type.to_string(),
                source_media: source_media.to_string(),
                target_type: return_type.to_string(),
                target_media: target_media.to_string(),
            }
            .into());
        }
        Ok(self.conversion.convert(
            &payload,
            &source_type,
            &source_media,
            return_type,
            &target_media,
        )?)
    }
}

/// One built gateway method.
pub(crate) struct GatewayMethod {
    exchange: Arc<Exchange>,
    error_channel: Option<Arc<dyn MessageChannel>>,
    interceptors: Arc<[Arc<dyn DynAroundInterceptor>]>,
}

impl GatewayMethod {
    pub(crate) fn new(
        exchange: Exchange,
        error_channel: Option<Arc<dyn MessageChannel>>,
        interceptors: Vec<Arc<dyn DynAroundInterceptor>>,
    ) -> Self {
        Self {
            exchange: Arc::new(exchange),
            error_channel,
            interceptors: interceptors.into(),
        }
    }

    async fn call(&self, arguments: Vec<Payload>) -> Result<Option<Payload>, MessagingError> {
        let builder = match self.exchange.mapping.to_message(&arguments) {
            Ok(builder) => builder,
            Err(err) => return self.fail(err.into(), None).await,
        };

        let (request, result) = if self.interceptors.is_empty() {
            let (request, awaited) = self.exchange.prepare(builder);
            let result = self.exchange.send_and_receive(request.clone(), awaited).await;
            (request, result)
        } else {
            let request = builder.build();
            let result = self.intercepted(arguments, request.clone()).await;
            (request, result)
        };

        match result {
            Ok(reply) => Ok(reply),
            Err(err) => self.fail(err, Some(request)).await,
        }
    }

    /// Run the around-interceptors; the request is rebuilt from the
    /// arguments they pass on.
    async fn intercepted(
        &self,
        arguments: Vec<Payload>,
        request: Message,
    ) -> Result<Option<Payload>, MessagingError> {
        let exchange = Arc::clone(&self.exchange);
        let target = MethodTarget::new(self.exchange.interface.clone(), move |arguments: Vec<Payload>| {
            let exchange = Arc::clone(&exchange);
            async move {
                let builder = exchange
                    .mapping
                    .to_message(&arguments)
                    .map_err(|e| BoxError::from(MessagingError::from(e)))?;
                let (request, awaited) = exchange.prepare(builder);
                exchange
                    .send_and_receive(request, awaited)
                    .await
                    .map_err(BoxError::from)
            }
        });

        MethodInvocation::new(target, arguments, request, Arc::clone(&self.interceptors))
            .proceed()
            .await
            .map_err(unwrap_gateway_error)
    }

    async fn fail(
        &self,
        err: MessagingError,
        request: Option<Message>,
    ) -> Result<Option<Payload>, MessagingError> {
        let Some(error_channel) = &self.error_channel else {
            return Err(err);
        };
        tracing::debug!(
            gateway = %self.exchange.origin,
            channel = %error_channel.name(),
            error = %err,
            "publishing gateway failure"
        );
        error_channel
            .send(Message::error(&self.exchange.origin, &err, request))
            .await?;
        Ok(None)
    }
}

/// Failures of the gateway's own send and receive travel through the
/// interceptor chain boxed; restore them.
fn unwrap_gateway_error(err: MessagingError) -> MessagingError {
    match err {
        MessagingError::Invocation(InvocationError { interface, source }) => {
            match source.downcast::<MessagingError>() {
                Ok(inner) => *inner,
                Err(source) => InvocationError { interface, source }.into(),
            }
        }
        other => other,
    }
}

/// An addressable object whose methods translate calls into channel
/// interactions.
///
/// Each method builds a request message from its arguments, sends it to the
/// method's request channel and, unless the method returns nothing, waits
/// for the reply. Without a reply channel of its own, a method listens on a
/// private queue attached to the request as its reply channel.
///
/// # Example
///
/// ```rust,ignore
/// let orders = system.get_gateway_by_name("orderGateway")?;
/// let total = orders.call("place", vec![Payload::new(order)]).await?;
/// ```
pub struct Gateway {
    reference_name: String,
    interface_name: String,
    methods: BTreeMap<String, GatewayMethod>,
}

impl Gateway {
    pub(crate) fn new(
        reference_name: impl Into<String>,
        interface_name: impl Into<String>,
        methods: BTreeMap<String, GatewayMethod>,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            interface_name: interface_name.into(),
            methods,
        }
    }

    /// The name the gateway is registered under.
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// The interface the gateway implements.
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Method names in sorted order.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Call `method` with arguments in parameter order.
    ///
    /// Returns the reply payload, or `None` for methods returning nothing,
    /// for flows that produce no reply, and for failures handed to the
    /// method's error channel.
    pub async fn call(
        &self,
        method: &str,
        arguments: Vec<Payload>,
    ) -> Result<Option<Payload>, MessagingError> {
        let target = self
            .methods
            .get(method)
            .ok_or_else(|| MessagingError::GatewayMethodNotFound {
                gateway: self.reference_name.clone(),
                method: method.to_string(),
            })?;
        target.call(arguments).await
    }

    /// Call the only method of a single-method gateway.
    pub async fn execute(&self, arguments: Vec<Payload>) -> Result<Option<Payload>, MessagingError> {
        let mut methods = self.methods.values();
        match (methods.next(), methods.next()) {
            (Some(method), None) => method.call(arguments).await,
            _ => Err(MessagingError::GatewayMethodNotFound {
                gateway: self.reference_name.clone(),
                method: "<single method>".to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("reference_name", &self.reference_name)
            .field("interface_name", &self.interface_name)
            .field("methods", &self.method_names())
            .finish()
    }
}
