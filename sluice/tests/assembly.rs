mod common;

use common::{FixedHandlerBuilder, doubler, no_references, shared};
use parking_lot::Mutex;
use sluice::{
    AssemblyError, ChannelInterceptor, ConfigurationObserver, ConfiguredMessagingSystem,
    DynAroundInterceptor, FnConverter, GatewayProxyBuilder, InMemoryReferenceSearchService,
    InterfaceToCall, MessageBuilder, MessagingError, MessagingSystemConfiguration, Module,
    ModuleContext, NULL_CHANNEL_NAME, Payload, PollingMetadata, ServiceActivatorBuilder,
    SimpleChannelInterceptorBuilder, SimpleMessageChannelBuilder, SluiceSettings, TypeDescriptor,
    testing::{CallLog, RecordingAroundInterceptor, RecordingChannelInterceptor, RecordingHandler},
};
use std::sync::Arc;

fn receive_int(system: &ConfiguredMessagingSystem, channel: &str) -> Option<i64> {
    let channel = system.get_channel_by_name(channel).unwrap();
    let message = channel.as_pollable().unwrap().receive()?;
    message.payload_as::<i64>().copied()
}

// ============================================================================
// Channels and Interceptors
// ============================================================================

#[tokio::test]
async fn test_interceptors_wrap_by_descending_importance() {
    let log = CallLog::default();
    let recorder = RecordingHandler::new();

    let mut configuration = MessagingSystemConfiguration::new();
    for (name, importance) in [("p5", 5), ("p1", 1), ("p3", 3)] {
        let interceptor: Arc<dyn ChannelInterceptor> =
            Arc::new(RecordingChannelInterceptor::new(name).with_log(Arc::clone(&log)));
        configuration.register_interceptor(
            SimpleChannelInterceptorBuilder::create("orders", name, interceptor).with_importance(importance),
        );
    }
    configuration.register_handler(FixedHandlerBuilder::new("orders", recorder.clone()));
    let system = configuration.build(no_references()).unwrap();

    assert_eq!(system.channel_interceptors("orders"), ["p5", "p3", "p1"]);
    assert!(system.channel_interceptors(NULL_CHANNEL_NAME).is_empty());

    system
        .get_channel_by_name("orders")
        .unwrap()
        .send(MessageBuilder::with_payload(1_i64).build())
        .await
        .unwrap();

    assert_eq!(recorder.count(), 1);
    let pre_sends: Vec<String> = log
        .lock()
        .iter()
        .filter(|entry| entry.ends_with(":pre_send"))
        .cloned()
        .collect();
    assert_eq!(pre_sends, ["p5:pre_send", "p3:pre_send", "p1:pre_send"]);
    assert_eq!(
        log.lock().last().map(String::as_str),
        Some("p5:after_send_completion")
    );
}

#[test]
fn test_interceptor_patterns_select_channels() {
    let interceptor: Arc<dyn ChannelInterceptor> = Arc::new(RecordingChannelInterceptor::new("audit"));

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders.new"))
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders.paid"))
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("invoices"))
        .register_interceptor(SimpleChannelInterceptorBuilder::create("orders.*", "audit", interceptor));
    let system = configuration.build(no_references()).unwrap();

    assert_eq!(system.channel_interceptors("orders.new"), ["audit"]);
    assert_eq!(system.channel_interceptors("orders.paid"), ["audit"]);
    assert!(system.channel_interceptors("invoices").is_empty());
    assert!(
        system
            .get_channel_by_name("orders.new")
            .unwrap()
            .as_pollable()
            .is_some()
    );
}

#[test]
fn test_handler_inputs_get_direct_channels_and_null_channel_exists() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()));
    let system = configuration.build(no_references()).unwrap();

    assert_eq!(system.channel_names(), [NULL_CHANNEL_NAME, "orders"]);
    assert!(
        system
            .get_channel_by_name("orders")
            .unwrap()
            .as_subscribable()
            .is_some()
    );
}

#[test]
fn test_identical_channel_registrations_merge() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders"))
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders"));
    let system = configuration.build(no_references()).unwrap();
    assert_eq!(system.channel_names(), [NULL_CHANNEL_NAME, "orders"]);
}

#[test]
fn test_conflicting_channel_definitions_fail() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders"))
        .register_channel(SimpleMessageChannelBuilder::create_direct_channel("orders"));
    let result = configuration.build(no_references());
    assert!(matches!(result, Err(AssemblyError::ConflictingChannel(ref name)) if name == "orders"));
}

// ============================================================================
// Endpoints
// ============================================================================

#[test]
fn test_each_handler_is_built_once() {
    let handler = FixedHandlerBuilder::new("orders", RecordingHandler::new());
    let counts = handler.clone();

    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_handler(handler);
    let system = configuration.build(no_references()).unwrap();

    assert_eq!(counts.build_count(), 1);
    assert_eq!(system.endpoint_ids(), ["orders.handler.0"]);
    assert!(system.is_running("orders.handler.0").unwrap());
}

#[test]
fn test_generated_endpoint_ids_skip_declared_ones() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()))
        .register_handler(
            FixedHandlerBuilder::new("orders", RecordingHandler::new()).with_endpoint_id("orders.handler.0"),
        );
    let system = configuration.build(no_references()).unwrap();
    assert_eq!(system.endpoint_ids(), ["orders.handler.0", "orders.handler.1"]);
}

#[test]
fn test_duplicate_endpoint_ids_fail() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_handler(FixedHandlerBuilder::new("a", RecordingHandler::new()).with_endpoint_id("worker"))
        .register_handler(FixedHandlerBuilder::new("b", RecordingHandler::new()).with_endpoint_id("worker"));
    let result = configuration.build(no_references());
    assert!(matches!(result, Err(AssemblyError::DuplicateEndpoint(ref id)) if id == "worker"));
}

#[test]
fn test_missing_reference_names_the_requirer() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()).requiring("orderService"));

    match configuration.build(no_references()) {
        Err(AssemblyError::MissingReference { reference, required_by }) => {
            assert_eq!(reference, "orderService");
            assert!(required_by.contains("orders"));
        }
        other => panic!("expected a missing reference, got {other:?}"),
    }
}

#[test]
fn test_provided_reference_satisfies_requirement() {
    let references = InMemoryReferenceSearchService::new().with("orderService", 7_i64);

    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()).requiring("orderService"));
    assert!(configuration.build(shared(references)).is_ok());
}

#[test]
fn test_handler_without_consumer_factory_fails() {
    let mut configuration = MessagingSystemConfiguration::without_default_consumer_factories();
    configuration.register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()));
    let result = configuration.build(no_references());
    assert!(matches!(result, Err(AssemblyError::NoConsumerFactory { .. })));
}

#[test]
fn test_invalid_trigger_fails_assembly() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("jobs"))
        .register_handler(FixedHandlerBuilder::new("jobs", RecordingHandler::new()).with_endpoint_id("worker"))
        .register_polling_metadata(PollingMetadata::new("worker").with_cron("not a cron"));
    let result = configuration.build(no_references());
    assert!(matches!(result, Err(AssemblyError::InvalidTrigger { ref endpoint_id, .. }) if endpoint_id == "worker"));
}

#[test]
fn test_polling_metadata_for_unknown_endpoint_is_ignored() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_polling_metadata(PollingMetadata::new("ghost").with_handled_message_limit(1));
    assert!(configuration.build(no_references()).is_ok());
}

// ============================================================================
// Gateways
// ============================================================================

#[test]
fn test_duplicate_gateway_names_fail() {
    let method = InterfaceToCall::new("Orders", "place").with_parameter("order", TypeDescriptor::INTEGER);

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("orders"))
        .register_gateway(GatewayProxyBuilder::new("orderGateway", method.clone(), "orders"))
        .register_gateway(GatewayProxyBuilder::new("orderGateway", method, "orders"));
    let result = configuration.build(no_references());
    assert!(matches!(result, Err(AssemblyError::DuplicateGateway(ref name)) if name == "orderGateway"));
}

#[test]
fn test_gateway_with_unknown_request_channel_fails() {
    let method = InterfaceToCall::new("Orders", "place").with_parameter("order", TypeDescriptor::INTEGER);

    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_gateway(GatewayProxyBuilder::new("orderGateway", method, "missing"));
    let result = configuration.build(no_references());
    assert!(matches!(
        result,
        Err(AssemblyError::Build { ref source, .. }) if matches!(**source, MessagingError::ChannelNotFound(_))
    ));
}

// ============================================================================
// Around Interceptors and Conversion
// ============================================================================

#[tokio::test]
async fn test_pointcut_attaches_around_interceptors() {
    let log = CallLog::default();
    let audit: Arc<dyn DynAroundInterceptor> =
        Arc::new(RecordingAroundInterceptor::new("audit").with_log(Arc::clone(&log)));
    let unrelated = FixedHandlerBuilder::new("billing", RecordingHandler::new());
    let counts = unrelated.clone();

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("results"))
        .register_handler(
            ServiceActivatorBuilder::create("orders", doubler())
                .with_endpoint_id("orders.double")
                .with_output_channel("results"),
        )
        .register_handler(unrelated)
        .register_around_interceptor("orders.*", audit);
    let system = configuration.build(no_references()).unwrap();

    system
        .get_channel_by_name("orders")
        .unwrap()
        .send(MessageBuilder::with_payload(4_i64).build())
        .await
        .unwrap();

    assert_eq!(receive_int(&system, "results"), Some(8));
    assert_eq!(*log.lock(), ["audit:before", "audit:after"]);
    assert_eq!(counts.interceptor_count(), 0);
}

#[tokio::test]
async fn test_registered_converters_back_the_default_conversion_service() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("results"))
        .register_converter(FnConverter::new(
            TypeDescriptor::STRING,
            TypeDescriptor::INTEGER,
            |payload| {
                let text = payload.downcast_ref::<String>().ok_or("not a string")?;
                Ok(Payload::new(text.trim().parse::<i64>()?))
            },
        ))
        .register_handler(ServiceActivatorBuilder::create("orders", doubler()).with_output_channel("results"));
    let system = configuration.build(no_references()).unwrap();

    system
        .get_channel_by_name("orders")
        .unwrap()
        .send(MessageBuilder::with_payload(" 21 ".to_string()).build())
        .await
        .unwrap();
    assert_eq!(receive_int(&system, "results"), Some(42));
}

// ============================================================================
// Modules and Observers
// ============================================================================

struct QueueModule {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Module for QueueModule {
    fn name(&self) -> &str {
        "queues"
    }

    fn prepare(&self, configuration: &mut MessagingSystemConfiguration) -> Result<(), MessagingError> {
        configuration
            .register_channel(SimpleMessageChannelBuilder::create_queue_channel("prepared"))
            .register_module(LateModule);
        Ok(())
    }

    fn configure(
        &self,
        configuration: &mut MessagingSystemConfiguration,
        context: &ModuleContext,
    ) -> Result<(), MessagingError> {
        for name in context.extensions_of::<String>() {
            configuration.register_channel(SimpleMessageChannelBuilder::create_queue_channel(name.as_str()));
        }
        if let Some(tenant) = context.variable("tenant") {
            configuration.register_channel(SimpleMessageChannelBuilder::create_queue_channel(format!("{tenant}.inbox")));
        }
        Ok(())
    }

    fn post_configure(&self, system: &ConfiguredMessagingSystem) -> Result<(), MessagingError> {
        self.seen.lock().extend(system.channel_names());
        Ok(())
    }
}

struct LateModule;

impl Module for LateModule {
    fn name(&self) -> &str {
        "late"
    }

    fn prepare(&self, configuration: &mut MessagingSystemConfiguration) -> Result<(), MessagingError> {
        configuration.register_channel(SimpleMessageChannelBuilder::create_queue_channel("late"));
        Ok(())
    }
}

#[test]
fn test_modules_register_channels_through_all_phases() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let settings = SluiceSettings::from_toml_str("[variables]\ntenant = \"acme\"\n").unwrap();

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .with_settings(settings)
        .register_module(QueueModule { seen: Arc::clone(&seen) })
        .register_extension("queues", "extended".to_string())
        .register_extension("other", "ignored".to_string());
    configuration.build(no_references()).unwrap();

    assert_eq!(
        *seen.lock(),
        ["acme.inbox", "extended", "late", NULL_CHANNEL_NAME, "prepared"]
    );
}

struct FailingModule;

impl Module for FailingModule {
    fn name(&self) -> &str {
        "broken"
    }

    fn configure(
        &self,
        _configuration: &mut MessagingSystemConfiguration,
        _context: &ModuleContext,
    ) -> Result<(), MessagingError> {
        Err(MessagingError::ReferenceNotFound("database".to_string()))
    }
}

#[test]
fn test_module_failure_aborts_assembly() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration.register_module(FailingModule);
    match configuration.build(no_references()) {
        Err(AssemblyError::Build { component, .. }) => assert_eq!(component, "module `broken`"),
        other => panic!("expected a module failure, got {other:?}"),
    }
}

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl ConfigurationObserver for EventLog {
    fn channel_registered(&self, name: &str, _definition: &str) {
        self.0.lock().push(format!("channel:{name}"));
    }

    fn endpoint_registered(&self, endpoint_id: &str, _description: &str) {
        self.0.lock().push(format!("endpoint:{endpoint_id}"));
    }

    fn gateway_registered(&self, reference_name: &str) {
        self.0.lock().push(format!("gateway:{reference_name}"));
    }

    fn assembled(&self, system: &ConfiguredMessagingSystem) {
        self.0.lock().push(format!("assembled:{}", system.endpoint_ids().len()));
    }
}

#[test]
fn test_observer_hears_every_component() {
    let events = EventLog::default();
    let method = InterfaceToCall::new("Orders", "place").with_parameter("order", TypeDescriptor::INTEGER);

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .with_observer(events.clone())
        .register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()).with_endpoint_id("worker"))
        .register_gateway(GatewayProxyBuilder::new("orderGateway", method, "orders"));
    configuration.build(no_references()).unwrap();

    assert_eq!(
        *events.0.lock(),
        ["channel:orders", "endpoint:worker", "gateway:orderGateway", "assembled:1"]
    );
}

#[test]
fn test_identical_inputs_assemble_identically() {
    let assemble = || {
        let mut configuration = MessagingSystemConfiguration::new();
        for (name, importance) in [("low", 1), ("high", 9), ("mid", 4)] {
            let interceptor: Arc<dyn ChannelInterceptor> = Arc::new(RecordingChannelInterceptor::new(name));
            configuration.register_interceptor(
                SimpleChannelInterceptorBuilder::create("*", name, interceptor).with_importance(importance),
            );
        }
        configuration
            .register_channel(SimpleMessageChannelBuilder::create_queue_channel("invoices"))
            .register_handler(FixedHandlerBuilder::new("orders", RecordingHandler::new()))
            .register_gateway(GatewayProxyBuilder::new(
                "orderGateway",
                InterfaceToCall::new("Orders", "place").with_parameter("order", TypeDescriptor::INTEGER),
                "orders",
            ));
        configuration.build(no_references()).unwrap()
    };

    let first = assemble();
    let second = assemble();
    assert_eq!(first.channel_names(), second.channel_names());
    assert_eq!(first.gateway_names(), second.gateway_names());
    assert_eq!(first.endpoint_ids(), second.endpoint_ids());
    for channel in first.channel_names() {
        assert_eq!(first.channel_interceptors(&channel), second.channel_interceptors(&channel));
    }
    assert_eq!(first.channel_interceptors("orders"), ["high", "mid", "low"]);
}
