use super::{
    ConfigurationObserver, ConfiguredMessagingSystem, Module, ModuleContext, NullObserver,
    SluiceSettings,
};
use crate::{
    endpoint::{
        ConsumerContext, ConsumerLifecycle, EventDrivenConsumerBuilder,
        InboundChannelAdapterBuilder, MessageHandlerConsumerBuilder, PollingConsumerBuilder,
        PollingMetadata,
    },
    gateway::{Gateway, GatewayBuilder},
};
use sluice_core::{
    AssemblyError, CONVERSION_SERVICE_REFERENCE, ChannelInterceptor, ChannelInterceptorBuilder,
    ChannelResolver, Clock, ConversionService, Converter, DynAroundInterceptor, MessageChannel,
    MessageChannelBuilder, MessageHandlerBuilder, MessagingError, Reference,
    ReferenceSearchService,
};
use sluice_std::{
    channel::{
        EventDrivenChannelInterceptorAdapter, InMemoryChannelResolver, NULL_CHANNEL_NAME,
        NullChannel, PollableChannelInterceptorAdapter, SimpleMessageChannelBuilder,
    },
    conversion::AutoCollectionConversionService,
    reference::InMemoryReferenceSearchService,
    routing::WildcardPattern,
    scheduling::UtcClock,
};
use std::{
    any::Any,
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// Collects builders and assembles them into a [`ConfiguredMessagingSystem`].
///
/// Registration order matters only where stated: interceptors of equal
/// importance keep it, and consumer factories are tried in it.
///
/// # Example
///
/// ```rust,ignore
/// let mut configuration = MessagingSystemConfiguration::new();
/// configuration
///     .register_channel(SimpleMessageChannelBuilder::create_queue_channel("invoices"))
///     .register_handler(ServiceActivatorBuilder::create_with_reference("orders", "orderService"))
///     .register_gateway(GatewayProxyBuilder::new("orderGateway", place_order, "orders"));
///
/// let system = configuration.build(references)?;
/// ```
pub struct MessagingSystemConfiguration {
    channels: Vec<Box<dyn MessageChannelBuilder>>,
    interceptors: Vec<Box<dyn ChannelInterceptorBuilder>>,
    handlers: Vec<Box<dyn MessageHandlerBuilder>>,
    adapters: Vec<InboundChannelAdapterBuilder>,
    gateways: Vec<Box<dyn GatewayBuilder>>,
    consumer_factories: Vec<Box<dyn MessageHandlerConsumerBuilder>>,
    modules: Vec<Box<dyn Module>>,
    polling_metadata: BTreeMap<String, PollingMetadata>,
    converters: Vec<Arc<dyn Converter>>,
    pointcuts: Vec<(String, Arc<dyn DynAroundInterceptor>)>,
    extensions: Vec<(String, Reference)>,
    observer: Arc<dyn ConfigurationObserver>,
    settings: SluiceSettings,
    clock: Arc<dyn Clock>,
}

impl Default for MessagingSystemConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagingSystemConfiguration {
    /// An assembler with the event-driven and polling consumer factories.
    pub fn new() -> Self {
        let mut configuration = Self::without_default_consumer_factories();
        configuration
            .register_consumer_factory(EventDrivenConsumerBuilder)
            .register_consumer_factory(PollingConsumerBuilder);
        configuration
    }

    /// An assembler with no consumer factory; register your own.
    pub fn without_default_consumer_factories() -> Self {
        Self {
            channels: Vec::new(),
            interceptors: Vec::new(),
            handlers: Vec::new(),
            adapters: Vec::new(),
            gateways: Vec::new(),
            consumer_factories: Vec::new(),
            modules: Vec::new(),
            polling_metadata: BTreeMap::new(),
            converters: Vec::new(),
            pointcuts: Vec::new(),
            extensions: Vec::new(),
            observer: Arc::new(NullObserver),
            settings: SluiceSettings::default(),
            clock: Arc::new(UtcClock),
        }
    }

    /// Register a channel.
    pub fn register_channel(&mut self, builder: impl MessageChannelBuilder + 'static) -> &mut Self {
        self.channels.push(Box::new(builder));
        self
    }

    /// Register a channel interceptor.
    pub fn register_interceptor(&mut self, builder: impl ChannelInterceptorBuilder + 'static) -> &mut Self {
        self.interceptors.push(Box::new(builder));
        self
    }

    /// Register a handler.
    pub fn register_handler(&mut self, builder: impl MessageHandlerBuilder + 'static) -> &mut Self {
        self.handlers.push(Box::new(builder));
        self
    }

    /// Register an inbound channel adapter.
    pub fn register_inbound_channel_adapter(&mut self, builder: InboundChannelAdapterBuilder) -> &mut Self {
        self.adapters.push(builder);
        self
    }

    /// Register a gateway.
    pub fn register_gateway(&mut self, builder: impl GatewayBuilder + 'static) -> &mut Self {
        self.gateways.push(Box::new(builder));
        self
    }

    /// Append a consumer factory; factories are tried in registration order.
    pub fn register_consumer_factory(
        &mut self,
        factory: impl MessageHandlerConsumerBuilder + 'static,
    ) -> &mut Self {
        self.consumer_factories.push(Box::new(factory));
        self
    }

    /// Register a module.
    pub fn register_module(&mut self, module: impl Module + 'static) -> &mut Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Set polling options for one endpoint, replacing earlier ones.
    pub fn register_polling_metadata(&mut self, metadata: PollingMetadata) -> &mut Self {
        self.polling_metadata
            .insert(metadata.endpoint_id().to_string(), metadata);
        self
    }

    /// Add a converter to the default conversion service.
    pub fn register_converter(&mut self, converter: impl Converter + 'static) -> &mut Self {
        self.converters.push(Arc::new(converter));
        self
    }

    /// Attach `interceptor` to every handler whose endpoint id or input
    /// channel matches `pointcut`; `*` matches any sequence of characters.
    pub fn register_around_interceptor(
        &mut self,
        pointcut: impl Into<String>,
        interceptor: Arc<dyn DynAroundInterceptor>,
    ) -> &mut Self {
        self.pointcuts.push((pointcut.into(), interceptor));
        self
    }

    /// Hand `extension` to the module named `module_name`.
    pub fn register_extension(
        &mut self,
        module_name: impl Into<String>,
        extension: impl Any + Send + Sync,
    ) -> &mut Self {
        self.extensions.push((module_name.into(), Arc::new(extension)));
        self
    }

    /// Report assembly progress to `observer`.
    pub fn with_observer(&mut self, observer: impl ConfigurationObserver + 'static) -> &mut Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Use `settings` for polling defaults and module variables.
    pub fn with_settings(&mut self, settings: SluiceSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Compute schedules with `clock`.
    pub fn with_clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
        self.clock = clock;
        self
    }

    /// The current settings.
    pub fn settings(&self) -> &SluiceSettings {
        &self.settings
    }

    /// Assemble the system.
    ///
    /// Runs the module phases, validates references and ids, builds
    /// channels with their interceptors, then one consumer per handler and
    /// every gateway.
    ///
    /// # Errors
    ///
    /// Any [`AssemblyError`]; nothing is returned half-built.
    pub fn build(
        mut self,
        references: Arc<dyn ReferenceSearchService>,
    ) -> Result<ConfiguredMessagingSystem, AssemblyError> {
        let modules = self.prepare_modules()?;
        self.configure_modules(&modules, &references)?;

        let references = self.internal_references(references);
        self.validate(references.as_ref())?;

        let (channels, interceptors) = self.build_channels(references.as_ref())?;
        self.attach_pointcuts()?;
        let consumers = self.build_consumers(&channels, &references)?;
        let gateways = self.build_gateways(&channels, &references)?;

        for (endpoint_id, consumer) in &consumers {
            if consumer.auto_startup() {
                consumer
                    .start()
                    .map_err(|err| AssemblyError::build(format!("endpoint `{endpoint_id}`"), err))?;
            }
        }

        let system = ConfiguredMessagingSystem::new(channels, gateways, consumers, interceptors);
        tracing::info!(
            channels = system.channel_names().len(),
            endpoints = system.endpoint_ids().len(),
            gateways = system.gateway_names().len(),
            "messaging system assembled"
        );
        self.observer.assembled(&system);
        for module in &modules {
            module
                .post_configure(&system)
                .map_err(|err| module_error(module.as_ref(), err))?;
        }
        Ok(system)
    }

    fn prepare_modules(&mut self) -> Result<Vec<Box<dyn Module>>, AssemblyError> {
        let mut prepared = Vec::new();
        loop {
            let batch = std::mem::take(&mut self.modules);
            if batch.is_empty() {
                return Ok(prepared);
            }
            for module in &batch {
                tracing::debug!(module = %module.name(), "preparing module");
                module
                    .prepare(self)
                    .map_err(|err| module_error(module.as_ref(), err))?;
            }
            prepared.extend(batch);
        }
    }

    fn configure_modules(
        &mut self,
        modules: &[Box<dyn Module>],
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<(), AssemblyError> {
        for module in modules {
            let extensions = self
                .extensions
                .iter()
                .filter(|(name, _)| name == module.name())
                .map(|(_, extension)| Arc::clone(extension))
                .collect();
            let context = ModuleContext::new(
                extensions,
                Arc::clone(references),
                self.settings.variables.clone(),
            );
            module
                .configure(self, &context)
                .map_err(|err| module_error(module.as_ref(), err))?;
        }
        if !self.modules.is_empty() {
            tracing::warn!(
                count = self.modules.len(),
                "modules registered while configuring are ignored"
            );
        }
        Ok(())
    }

    /// The external lookup behind the assembler's own defaults.
    fn internal_references(&self, external: Arc<dyn ReferenceSearchService>) -> Arc<dyn ReferenceSearchService> {
        let provided = external.has(CONVERSION_SERVICE_REFERENCE);
        let mut internal = InMemoryReferenceSearchService::new().with_fallback(external);
        if provided {
            if !self.converters.is_empty() {
                tracing::warn!(
                    converters = self.converters.len(),
                    "a conversion service is provided by reference; registered converters are unused"
                );
            }
        } else {
            let service: Arc<dyn ConversionService> =
                Arc::new(AutoCollectionConversionService::new(self.converters.clone()));
            internal.register(CONVERSION_SERVICE_REFERENCE, service);
        }
        Arc::new(internal)
    }

    /// Check references, assign missing endpoint ids and reject duplicates.
    fn validate(&mut self, references: &dyn ReferenceSearchService) -> Result<(), AssemblyError> {
        for builder in &self.channels {
            require(references, builder.required_reference_names(), || {
                format!("channel {}", builder.definition())
            })?;
        }
        for builder in &self.interceptors {
            require(references, builder.required_reference_names(), || builder.describe())?;
        }
        for builder in &self.handlers {
            require(references, builder.required_reference_names(), || builder.describe())?;
        }
        for builder in &self.adapters {
            require(references, builder.required_reference_names(), || builder.describe())?;
        }
        for builder in &self.gateways {
            require(references, builder.required_reference_names(), || builder.describe())?;
        }

        let mut gateway_names = BTreeSet::new();
        for builder in &self.gateways {
            if !gateway_names.insert(builder.reference_name()) {
                return Err(AssemblyError::DuplicateGateway(builder.reference_name().to_string()));
            }
        }

        let mut endpoint_ids = BTreeSet::new();
        let declared = self
            .handlers
            .iter()
            .filter_map(|builder| builder.endpoint_id())
            .chain(self.adapters.iter().map(InboundChannelAdapterBuilder::endpoint_id));
        for endpoint_id in declared {
            if !endpoint_ids.insert(endpoint_id.to_string()) {
                return Err(AssemblyError::DuplicateEndpoint(endpoint_id.to_string()));
            }
        }
        for (index, builder) in self.handlers.iter_mut().enumerate() {
            if builder.endpoint_id().is_some() {
                continue;
            }
            let generated = (index..)
                .map(|n| format!("{}.handler.{n}", builder.input_channel_name()))
                .find(|candidate| !endpoint_ids.contains(candidate))
                .unwrap_or_default();
            endpoint_ids.insert(generated.clone());
            builder.set_endpoint_id(generated);
        }

        for endpoint_id in self.polling_metadata.keys() {
            if !endpoint_ids.contains(endpoint_id) {
                tracing::warn!(%endpoint_id, "polling metadata for an unknown endpoint");
            }
        }
        Ok(())
    }

    /// Build every channel, wrapped by the interceptors whose pattern matches
    /// its name.
    fn build_channels(
        &mut self,
        references: &dyn ReferenceSearchService,
    ) -> Result<(Arc<dyn ChannelResolver>, BTreeMap<String, Vec<String>>), AssemblyError> {
        let mut builders: BTreeMap<String, Box<dyn MessageChannelBuilder>> = BTreeMap::new();
        for builder in std::mem::take(&mut self.channels) {
            match builders.get(builder.name()) {
                Some(existing) if existing.definition() == builder.definition() => {}
                Some(_) => return Err(AssemblyError::ConflictingChannel(builder.name().to_string())),
                None => {
                    builders.insert(builder.name().to_string(), builder);
                }
            }
        }
        for handler in &self.handlers {
            let input = handler.input_channel_name();
            if !builders.contains_key(input) && input != NULL_CHANNEL_NAME {
                tracing::debug!(channel = %input, "registering direct channel for handler input");
                builders.insert(
                    input.to_string(),
                    Box::new(SimpleMessageChannelBuilder::create_direct_channel(input)),
                );
            }
        }

        let patterns = self
            .interceptors
            .iter()
            .map(|builder| {
                WildcardPattern::new(builder.target_pattern())
                    .map_err(|err| AssemblyError::build(builder.describe(), err.into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let built_interceptors = self
            .interceptors
            .iter()
            .map(|builder| {
                builder
                    .build(references)
                    .map_err(|err| AssemblyError::build(builder.describe(), err))
            })
            .collect::<Result<Vec<Arc<dyn ChannelInterceptor>>, _>>()?;

        let mut channels: BTreeMap<String, Arc<dyn MessageChannel>> = BTreeMap::new();
        let mut descriptions = BTreeMap::new();
        if !builders.contains_key(NULL_CHANNEL_NAME) {
            channels.insert(NULL_CHANNEL_NAME.to_string(), Arc::new(NullChannel::default()));
        }

        for (name, builder) in &builders {
            let channel = builder
                .build(references)
                .map_err(|err| AssemblyError::build(format!("channel {}", builder.definition()), err))?;

            let mut matching: Vec<usize> = (0..patterns.len())
                .filter(|&index| patterns[index].is_match(name))
                .collect();
            matching.sort_by_key(|&index| Reverse(self.interceptors[index].importance()));

            let channel: Arc<dyn MessageChannel> = if matching.is_empty() {
                channel
            } else {
                let attached = matching
                    .iter()
                    .map(|&index| Arc::clone(&built_interceptors[index]))
                    .collect();
                descriptions.insert(
                    name.clone(),
                    matching
                        .iter()
                        .map(|&index| self.interceptors[index].describe())
                        .collect::<Vec<_>>(),
                );
                if channel.as_pollable().is_some() {
                    let adapter = PollableChannelInterceptorAdapter::new(channel, attached)
                        .map_err(|err| AssemblyError::build(format!("channel `{name}`"), err))?;
                    Arc::new(adapter)
                } else {
                    Arc::new(EventDrivenChannelInterceptorAdapter::new(channel, attached))
                }
            };

            self.observer.channel_registered(name, &builder.definition());
            channels.insert(name.clone(), channel);
        }

        let resolver: Arc<dyn ChannelResolver> = Arc::new(InMemoryChannelResolver::new(channels));
        Ok((resolver, descriptions))
    }

    fn attach_pointcuts(&mut self) -> Result<(), AssemblyError> {
        for (pointcut, interceptor) in &self.pointcuts {
            let pattern = WildcardPattern::new(pointcut).map_err(|err| {
                AssemblyError::build(format!("around interceptor pointcut `{pointcut}`"), err.into())
            })?;
            for handler in &mut self.handlers {
                let selected = handler.endpoint_id().is_some_and(|id| pattern.is_match(id))
                    || pattern.is_match(handler.input_channel_name());
                if selected {
                    handler.add_around_interceptor(Arc::clone(interceptor));
                }
            }
        }
        Ok(())
    }

    fn build_consumers(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<BTreeMap<String, Arc<dyn ConsumerLifecycle>>, AssemblyError> {
        let mut consumers = BTreeMap::new();
        for handler in &self.handlers {
            let endpoint_id = handler
                .endpoint_id()
                .unwrap_or_else(|| handler.input_channel_name())
                .to_string();
            let factory = self
                .consumer_factories
                .iter()
                .find(|factory| factory.is_supporting(channels.as_ref(), handler.as_ref()))
                .ok_or_else(|| AssemblyError::NoConsumerFactory {
                    handler: handler.describe(),
                })?;

            let context = ConsumerContext::new(
                channels,
                references,
                self.polling_metadata.get(&endpoint_id),
                &self.settings.polling,
                &self.clock,
            );
            let consumer = factory
                .build(handler.as_ref(), &context)
                .map_err(|err| match err {
                    MessagingError::Assembly(inner) => inner,
                    other => AssemblyError::build(handler.describe(), other),
                })?;

            tracing::debug!(
                %endpoint_id,
                channel = %handler.input_channel_name(),
                pollable = consumer.is_pollable(),
                "endpoint built"
            );
            self.observer.endpoint_registered(&endpoint_id, &handler.describe());
            consumers.insert(endpoint_id, consumer);
        }

        for adapter in &self.adapters {
            let endpoint_id = adapter.endpoint_id().to_string();
            let context = ConsumerContext::new(
                channels,
                references,
                self.polling_metadata.get(&endpoint_id),
                &self.settings.polling,
                &self.clock,
            );
            let consumer = adapter.build(&context).map_err(|err| match err {
                MessagingError::Assembly(inner) => inner,
                other => AssemblyError::build(adapter.describe(), other),
            })?;
            tracing::debug!(
                %endpoint_id,
                channel = %adapter.request_channel_name(),
                "inbound channel adapter built"
            );
            self.observer.endpoint_registered(&endpoint_id, &adapter.describe());
            consumers.insert(endpoint_id, Arc::new(consumer));
        }
        Ok(consumers)
    }

    fn build_gateways(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<BTreeMap<String, Arc<Gateway>>, AssemblyError> {
        self.gateways
            .iter()
            .map(|builder| {
                let gateway = builder.build(channels, references).map_err(|err| match err {
                    MessagingError::Assembly(inner) => inner,
                    other => AssemblyError::build(builder.describe(), other),
                })?;
                self.observer.gateway_registered(builder.reference_name());
                Ok((builder.reference_name().to_string(), Arc::new(gateway)))
            })
            .collect()
    }
}

fn require(
    references: &dyn ReferenceSearchService,
    names: Vec<String>,
    required_by: impl Fn() -> String,
) -> Result<(), AssemblyError> {
    match names
        .into_iter()
        .find(|name| !name.is_empty() && !references.has(name))
    {
        Some(reference) => Err(AssemblyError::MissingReference {
            reference,
            required_by: required_by(),
        }),
        None => Ok(()),
    }
}

fn module_error(module: &dyn Module, err: MessagingError) -> AssemblyError {
    AssemblyError::build(format!("module `{}`", module.name()), err)
}
