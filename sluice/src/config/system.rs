use crate::{endpoint::ConsumerLifecycle, gateway::Gateway};
use sluice_core::{ChannelResolver, DispatchError, MessageChannel, MessagingError};
use std::{collections::BTreeMap, sync::Arc};

/// The assembled runtime: channels, endpoints and gateways by name.
///
/// Channel and gateway maps are fixed at assembly; endpoints can be started
/// and stopped individually.
///
/// # Example
///
/// ```rust,ignore
/// let system = configuration.build(references)?;
///
/// system.get_channel_by_name("orders")?.send(message).await?;
/// system.run("invoicing").await?;
/// ```
pub struct ConfiguredMessagingSystem {
    channels: Arc<dyn ChannelResolver>,
    gateways: BTreeMap<String, Arc<Gateway>>,
    consumers: BTreeMap<String, Arc<dyn ConsumerLifecycle>>,
    interceptors: BTreeMap<String, Vec<String>>,
}

impl ConfiguredMessagingSystem {
    pub(crate) fn new(
        channels: Arc<dyn ChannelResolver>,
        gateways: BTreeMap<String, Arc<Gateway>>,
        consumers: BTreeMap<String, Arc<dyn ConsumerLifecycle>>,
        interceptors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            channels,
            gateways,
            consumers,
            interceptors,
        }
    }

    /// The channel registered as `name`, wrapped by its interceptors.
    pub fn get_channel_by_name(&self, name: &str) -> Result<Arc<dyn MessageChannel>, MessagingError> {
        self.channels.resolve(name)
    }

    /// The gateway registered as `reference_name`.
    pub fn get_gateway_by_name(&self, reference_name: &str) -> Result<Arc<Gateway>, MessagingError> {
        self.gateways
            .get(reference_name)
            .cloned()
            .ok_or_else(|| MessagingError::GatewayNotFound(reference_name.to_string()))
    }

    /// The channel resolver handlers were built with.
    pub fn channel_resolver(&self) -> &Arc<dyn ChannelResolver> {
        &self.channels
    }

    /// Channel names in sorted order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.channel_names()
    }

    /// Gateway reference names in sorted order.
    pub fn gateway_names(&self) -> Vec<String> {
        self.gateways.keys().cloned().collect()
    }

    /// Endpoint ids in sorted order.
    pub fn endpoint_ids(&self) -> Vec<String> {
        self.consumers.keys().cloned().collect()
    }

    /// Descriptions of the interceptors on `channel`, outermost first.
    pub fn channel_interceptors(&self, channel: &str) -> &[String] {
        self.interceptors.get(channel).map(Vec::as_slice).unwrap_or_default()
    }

    fn consumer(&self, endpoint_id: &str) -> Result<&Arc<dyn ConsumerLifecycle>, MessagingError> {
        self.consumers
            .get(endpoint_id)
            .ok_or_else(|| MessagingError::EndpointNotFound(endpoint_id.to_string()))
    }

    /// Poll the endpoint in the caller's task until its stop condition
    /// holds: the handled-message limit, the execution-time limit, or with
    /// neither configured the first poll that finds nothing.
    ///
    /// # Errors
    ///
    /// Fails for unknown and for event-driven endpoints. Message failures
    /// are published or logged and do not stop the run.
    pub async fn run(&self, endpoint_id: &str) -> Result<(), MessagingError> {
        let consumer = self.consumer(endpoint_id)?;
        if !consumer.is_pollable() {
            return Err(DispatchError::NotRunnable(endpoint_id.to_string()).into());
        }
        tracing::debug!(endpoint_id, "running endpoint");
        consumer.run().await
    }

    /// Start the endpoint.
    pub fn start(&self, endpoint_id: &str) -> Result<(), MessagingError> {
        self.consumer(endpoint_id)?.start()
    }

    /// Stop the endpoint.
    pub fn stop(&self, endpoint_id: &str) -> Result<(), MessagingError> {
        self.consumer(endpoint_id)?.stop();
        Ok(())
    }

    /// Whether the endpoint is receiving messages.
    pub fn is_running(&self, endpoint_id: &str) -> Result<bool, MessagingError> {
        Ok(self.consumer(endpoint_id)?.is_running())
    }

    /// Start every endpoint.
    pub fn start_all(&self) -> Result<(), MessagingError> {
        for consumer in self.consumers.values() {
            consumer.start()?;
        }
        Ok(())
    }

    /// Stop every endpoint.
    pub fn stop_all(&self) {
        for consumer in self.consumers.values() {
            consumer.stop();
        }
    }
}

impl std::fmt::Debug for ConfiguredMessagingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredMessagingSystem")
            .field("channels", &self.channel_names())
            .field("gateways", &self.gateway_names())
            .field("endpoints", &self.endpoint_ids())
            .finish()
    }
}
