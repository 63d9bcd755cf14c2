use super::{
    factory::{ConsumerContext, PollingPlan},
    polling::PollingConsumer,
};
use sluice_core::{
    ConfigurationError, MessagingError, MethodTarget, ReferenceSearchService,
    ReferenceSearchServiceExt,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum AdapterTarget {
    Direct(MethodTarget),
    Reference(String),
}

/// Calls a target on every trigger fire and sends what it returns to a
/// channel.
///
/// The target takes no parameters and must return a value; a fire that
/// returns nothing publishes nothing. A returned [`Message`] is sent as is,
/// any other value becomes the payload of a new message.
///
/// Scheduling comes from the [`PollingMetadata`] registered under the
/// adapter's endpoint id, falling back to the polling settings. The adapter
/// is started and stopped like any polling endpoint.
///
/// # Example
///
/// ```rust,ignore
/// configuration
///     .register_inbound_channel_adapter(
///         InboundChannelAdapterBuilder::create("heartbeat", "ticks", clock_target),
///     )
///     .register_polling_metadata(
///         PollingMetadata::new("heartbeat").with_fixed_rate(Duration::from_secs(1), Duration::ZERO),
///     );
/// ```
///
/// [`Message`]: sluice_core::Message
/// [`PollingMetadata`]: super::PollingMetadata
#[derive(Debug, Clone)]
pub struct InboundChannelAdapterBuilder {
    endpoint_id: String,
    request_channel: String,
    target: AdapterTarget,
}

impl InboundChannelAdapterBuilder {
    /// Publish the results of `target` to `request_channel`.
    pub fn create(endpoint_id: impl Into<String>, request_channel: impl Into<String>, target: MethodTarget) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            request_channel: request_channel.into(),
            target: AdapterTarget::Direct(target),
        }
    }

    /// Publish the results of the [`MethodTarget`] registered under
    /// `reference_name`.
    pub fn create_with_reference(
        endpoint_id: impl Into<String>,
        request_channel: impl Into<String>,
        reference_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            request_channel: request_channel.into(),
            target: AdapterTarget::Reference(reference_name.into()),
        }
    }

    /// The adapter's endpoint id.
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    /// The channel results are sent to.
    pub fn request_channel_name(&self) -> &str {
        &self.request_channel
    }

    /// References the adapter needs.
    pub fn required_reference_names(&self) -> Vec<String> {
        match &self.target {
            AdapterTarget::Direct(_) => Vec::new(),
            AdapterTarget::Reference(name) => vec![name.clone()],
        }
    }

    /// A short description used in errors and logs.
    pub fn describe(&self) -> String {
        let target = match &self.target {
            AdapterTarget::Direct(target) => target.interface().to_string(),
            AdapterTarget::Reference(name) => format!("@{name}"),
        };
        format!("inbound channel adapter `{}` ({target})", self.endpoint_id)
    }

    fn resolve_target(&self, references: &dyn ReferenceSearchService) -> Result<MethodTarget, MessagingError> {
        let target = match &self.target {
            AdapterTarget::Direct(target) => target.clone(),
            AdapterTarget::Reference(name) => references.get_typed::<MethodTarget>(name)?.as_ref().clone(),
        };
        let interface = target.interface();
        let reason = if !interface.parameters().is_empty() {
            Some("an inbound channel adapter target must not take parameters")
        } else if interface.is_void() {
            Some("an inbound channel adapter target must return a value")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ConfigurationError::InvalidTarget {
                target: interface.to_string(),
                reason: reason.into(),
            }
            .into()),
            None => Ok(target),
        }
    }

    pub(crate) fn build(&self, context: &ConsumerContext<'_>) -> Result<PollingConsumer, MessagingError> {
        if self.endpoint_id.is_empty() {
            return Err(ConfigurationError::InvalidTarget {
                target: self.describe(),
                reason: "an inbound channel adapter needs an endpoint id".into(),
            }
            .into());
        }
        let target = self.resolve_target(context.references().as_ref())?;
        let output = context.channels().resolve(&self.request_channel)?;
        let plan = PollingPlan::resolve(&self.endpoint_id, context)?;
        let adapter = PollingConsumer::inbound(
            self.endpoint_id.clone(),
            target,
            output,
            Arc::clone(&plan.trigger),
            Arc::clone(context.clock()),
        );
        Ok(plan.apply(adapter))
    }
}
