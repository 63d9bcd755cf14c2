//! # sluice - Embedded Enterprise Integration Messaging
//!
//! `sluice` wires channels, handlers, routers and gateways into an
//! in-process messaging system. Components are registered as builders and
//! assembled once, after which every message flows through explicit
//! dispatch tables.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sluice::prelude::*;
//!
//! let references = InMemoryReferenceSearchService::new();
//!
//! let mut configuration = MessagingSystemConfiguration::new();
//! configuration
//!     .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders"))
//!     .register_handler(
//!         ServiceActivatorBuilder::create("orders", place_order)
//!             .with_endpoint_id("orderProcessor"),
//!     )
//!     .register_gateway(GatewayProxyBuilder::new("orderGateway", submit, "orders"));
//!
//! let system = configuration.build(Arc::new(references))?;
//! system.get_gateway_by_name("orderGateway")?.execute(vec![Payload::new(order)]).await?;
//! system.run("orderProcessor").await?;
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod config;
pub mod endpoint;
pub mod gateway;
pub mod logging;

// Errors
pub use sluice_core::{
    AssemblyError, BoxError, ConfigurationError, ConversionError, DispatchError, InvocationError,
    MessagingError, RoutingError,
};

// Messages and types
pub use sluice_core::{
    ErrorPayload, MediaType, Message, MessageBuilder, MessageHeaders, Payload, TypeDescriptor,
    TypeHierarchy,
};

// Channels
pub use sluice_core::{
    ChannelInterceptor, ChannelResolver, MessageChannel, PollableChannel, SubscribableChannel,
    SubscriptionId,
};

// Handlers and routing
pub use sluice_core::{DynMessageHandler, DynRouter, FnHandler, MessageHandler, Router};

// Invocation
pub use sluice_core::{
    AroundFn, AroundInterceptor, DynAroundInterceptor, InterfaceParameter, InterfaceToCall,
    MethodInvocation, MethodTarget, TargetResult,
};

// Conversion
pub use sluice_core::{CONVERSION_SERVICE_REFERENCE, ConversionService, Converter};

// References
pub use sluice_core::{Reference, ReferenceSearchService, ReferenceSearchServiceExt};

// Scheduling
pub use sluice_core::{Clock, Trigger, TriggerContext};

// Builders
pub use sluice_core::{ChannelInterceptorBuilder, MessageChannelBuilder, MessageHandlerBuilder};

// Standard channels
pub use sluice_std::channel::{
    ChannelKind, DirectChannel, InMemoryChannelResolver, NULL_CHANNEL_NAME, NullChannel,
    PublishSubscribeChannel, QueueChannel, SimpleChannelInterceptorBuilder,
    SimpleMessageChannelBuilder,
};

// Standard handlers and routers
pub use sluice_std::{
    handler::{
        ChainMessageHandlerBuilder, MessageFilterBuilder, ServiceActivatorBuilder, TransformerBuilder,
    },
    routing::{
        HeaderValueRouter, MethodTargetRouter, PayloadTypeNameRouter, RecipientListRouter,
        RouterBuilder, TypeHierarchyRouter, WildcardNameRouter, WildcardPattern,
    },
};

// Invocation, conversion and references
pub use sluice_std::{
    conversion::{AutoCollectionConversionService, FnConverter, JsonConverter},
    hierarchy::{InMemoryTypeHierarchy, TYPE_HIERARCHY_REFERENCE},
    processor::{MethodInvoker, ParameterConverter, ParameterConverterBuilder},
    reference::InMemoryReferenceSearchService,
};

// Scheduling
pub use sluice_std::scheduling::{
    CronExpression, CronTrigger, EndpointSchedule, EndpointState, PeriodicTrigger, UtcClock,
};

// Assembly, endpoints and gateways
pub use config::{
    ConfigurationObserver, ConfiguredMessagingSystem, MessagingSystemConfiguration, Module,
    ModuleContext, SluiceSettings,
};
pub use endpoint::{
    ConsumerLifecycle, InboundChannelAdapterBuilder, PollingMetadata, TriggerDefinition,
};
pub use gateway::{CombinedGatewayBuilder, Gateway, GatewayParameterConverter, GatewayProxyBuilder};

/// Standard interceptor implementations.
pub mod interceptors {
    #![allow(clippy::wildcard_imports)]
    pub use sluice_std::interceptors::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use sluice_std::testing::*;
}

/// Prelude module - common imports for Sluice.
///
/// # Usage
///
/// ```rust,ignore
/// use sluice::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AssemblyError, ChainMessageHandlerBuilder, ConfiguredMessagingSystem, GatewayProxyBuilder,
        InMemoryReferenceSearchService, InboundChannelAdapterBuilder, InterfaceToCall, Message,
        MessageBuilder, MessageChannel, MessageHandler, MessagingError,
        MessagingSystemConfiguration, MethodTarget, Payload, PollingMetadata, RouterBuilder,
        ServiceActivatorBuilder, SimpleMessageChannelBuilder, TypeDescriptor,
    };
    pub use std::sync::Arc;
}
