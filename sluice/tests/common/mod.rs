#![allow(dead_code)]

use sluice::{
    ChannelResolver, DynAroundInterceptor, DynMessageHandler, InMemoryReferenceSearchService,
    InterfaceToCall, MessageHandlerBuilder, MessagingError, MethodTarget, Payload,
    ReferenceSearchService, TypeDescriptor,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// References
// ============================================================================

pub fn no_references() -> Arc<dyn ReferenceSearchService> {
    Arc::new(InMemoryReferenceSearchService::new())
}

pub fn shared(references: InMemoryReferenceSearchService) -> Arc<dyn ReferenceSearchService> {
    Arc::new(references)
}

// ============================================================================
// Targets
// ============================================================================

/// `Calculator::double(value: int) -> int`.
pub fn doubler() -> MethodTarget {
    let interface = InterfaceToCall::new("Calculator", "double")
        .with_parameter("value", TypeDescriptor::INTEGER)
        .returning(TypeDescriptor::INTEGER);
    MethodTarget::sync(interface, |arguments| {
        let value = arguments
            .first()
            .and_then(|argument| argument.downcast_ref::<i64>().copied())
            .ok_or("expected an integer")?;
        Ok(Some(Payload::new(value * 2)))
    })
}

/// `Calculator::reject(value: int) -> int`, always failing.
pub fn rejecting() -> MethodTarget {
    let interface = InterfaceToCall::new("Calculator", "reject")
        .with_parameter("value", TypeDescriptor::INTEGER)
        .returning(TypeDescriptor::INTEGER);
    MethodTarget::sync(interface, |_| Err("rejected".into()))
}

pub fn int_method(interface: &str, method: &str) -> InterfaceToCall {
    InterfaceToCall::new(interface, method)
        .with_parameter("value", TypeDescriptor::INTEGER)
        .returning(TypeDescriptor::INTEGER)
}

pub fn int_payload(value: Option<Payload>) -> Option<i64> {
    value.and_then(|payload| payload.downcast_ref::<i64>().copied())
}

// ============================================================================
// Handler Builders
// ============================================================================

/// Registers an already built handler, counting how often it is built.
#[derive(Clone)]
pub struct FixedHandlerBuilder {
    input_channel: String,
    endpoint_id: Option<String>,
    handler: Arc<dyn DynMessageHandler>,
    required: Vec<String>,
    pub builds: Arc<AtomicUsize>,
    pub interceptors: Arc<AtomicUsize>,
}

impl FixedHandlerBuilder {
    pub fn new(input_channel: &str, handler: impl DynMessageHandler + 'static) -> Self {
        Self {
            input_channel: input_channel.to_string(),
            endpoint_id: None,
            handler: Arc::new(handler),
            required: Vec::new(),
            builds: Arc::new(AtomicUsize::new(0)),
            interceptors: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_endpoint_id(mut self, endpoint_id: &str) -> Self {
        self.endpoint_id = Some(endpoint_id.to_string());
        self
    }

    pub fn requiring(mut self, reference: &str) -> Self {
        self.required.push(reference.to_string());
        self
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.load(Ordering::SeqCst)
    }
}

impl MessageHandlerBuilder for FixedHandlerBuilder {
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
        self.required.clone()
    }

    fn add_around_interceptor(&mut self, _interceptor: Arc<dyn DynAroundInterceptor>) {
        self.interceptors.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        format!("fixed handler on `{}`", self.input_channel)
    }

    fn build(
        &self,
        _channels: &Arc<dyn ChannelResolver>,
        _references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.handler))
    }
}
