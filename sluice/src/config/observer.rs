use super::ConfiguredMessagingSystem;

/// Notified of what the assembler builds.
///
/// Every method has an empty default; implement the ones you need.
pub trait ConfigurationObserver: Send + Sync {
    /// A channel was built.
    fn channel_registered(&self, _name: &str, _definition: &str) {}

    /// A handler and its consumer were built.
    fn endpoint_registered(&self, _endpoint_id: &str, _description: &str) {}

    /// A gateway was built.
    fn gateway_registered(&self, _reference_name: &str) {}

    /// Assembly finished.
    fn assembled(&self, _system: &ConfiguredMessagingSystem) {}
}

/// Ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ConfigurationObserver for NullObserver {}
