mod common;

use common::{doubler, int_method, int_payload, no_references, rejecting};
use sluice::{
    AroundFn, CombinedGatewayBuilder, ConfiguredMessagingSystem, ConversionError,
    DynAroundInterceptor, ErrorPayload, FnConverter, GatewayParameterConverter,
    GatewayProxyBuilder, InterfaceToCall, Message, MessageBuilder, MessageHeaders,
    MessagingError, MessagingSystemConfiguration, MethodInvocation, MethodTarget, Payload,
    PollingMetadata, ServiceActivatorBuilder, SimpleMessageChannelBuilder, TypeDescriptor,
};
use std::{sync::Arc, time::Duration};

fn drain(system: &ConfiguredMessagingSystem, channel: &str) -> Vec<Message> {
    let channel = system.get_channel_by_name(channel).unwrap();
    let queue = channel.as_pollable().unwrap();
    std::iter::from_fn(|| queue.receive()).collect()
}

fn doubling_service() -> ServiceActivatorBuilder {
    ServiceActivatorBuilder::create("requests", doubler())
}

fn notify() -> InterfaceToCall {
    InterfaceToCall::new("Notifier", "notify")
        .with_parameter("text", TypeDescriptor::STRING)
        .with_parameter("priority", TypeDescriptor::STRING)
        .returning(TypeDescriptor::VOID)
}

// ============================================================================
// Request and Reply
// ============================================================================

#[tokio::test]
async fn test_request_reply_returns_converted_result() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_handler(doubling_service())
        .register_gateway(GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests"));
    let system = configuration.build(no_references()).unwrap();

    let calculator = system.get_gateway_by_name("calculator").unwrap();
    assert_eq!(calculator.method_names(), ["double"]);
    let reply = calculator.call("double", vec![Payload::new(21_i64)]).await.unwrap();
    assert_eq!(int_payload(reply), Some(42));
}

#[tokio::test]
async fn test_reply_is_converted_to_return_type() {
    let describe = InterfaceToCall::new("Calculator", "describe")
        .with_parameter("value", TypeDescriptor::INTEGER)
        .returning(TypeDescriptor::STRING);

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_converter(FnConverter::new(
            TypeDescriptor::INTEGER,
            TypeDescriptor::STRING,
            |payload| {
                let value = payload.downcast_ref::<i64>().ok_or("not an integer")?;
                Ok(Payload::new(format!("#{value}")))
            },
        ))
        .register_handler(doubling_service())
        .register_gateway(GatewayProxyBuilder::new("calculator", describe, "requests"));
    let system = configuration.build(no_references()).unwrap();

    let reply = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(4_i64)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.downcast_ref::<String>().map(String::as_str), Some("#8"));
}

#[tokio::test]
async fn test_void_method_does_not_wait_for_reply() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("outbox"))
        .register_gateway(
            GatewayProxyBuilder::new("notifier", notify(), "outbox").with_parameter_converters([
                GatewayParameterConverter::payload("text"),
                GatewayParameterConverter::header("priority", "priority"),
                GatewayParameterConverter::static_header("source", "gateway"),
            ]),
        );
    let system = configuration.build(no_references()).unwrap();

    let result = system
        .get_gateway_by_name("notifier")
        .unwrap()
        .execute(vec![Payload::new("shipped".to_string()), Payload::new("high".to_string())])
        .await
        .unwrap();
    assert!(result.is_none());

    let sent = drain(&system, "outbox");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload_as::<String>().map(String::as_str), Some("shipped"));
    assert_eq!(sent[0].headers().get_str("priority"), Some("high"));
    assert_eq!(sent[0].headers().get_str("source"), Some("gateway"));
    assert!(sent[0].reply_channel().is_none());
}

#[tokio::test]
async fn test_missing_reply_without_timeout_is_none() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("requests"))
        .register_gateway(GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests"));
    let system = configuration.build(no_references()).unwrap();

    let reply = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(1_i64)])
        .await
        .unwrap();
    assert!(reply.is_none());
    assert_eq!(drain(&system, "requests").len(), 1);
}

#[tokio::test]
async fn test_missing_reply_with_timeout_fails() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("requests"))
        .register_gateway(
            GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests")
                .with_reply_timeout(Duration::from_millis(20)),
        );
    let system = configuration.build(no_references()).unwrap();

    let result = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(1_i64)])
        .await;
    assert!(matches!(result, Err(MessagingError::ReplyTimeout(timeout)) if timeout == Duration::from_millis(20)));
}

#[tokio::test]
async fn test_shared_reply_channel_receives_reply() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("replies"))
        .register_handler(doubling_service())
        .register_gateway(
            GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests")
                .with_reply_channel("replies"),
        );
    let system = configuration.build(no_references()).unwrap();

    let reply = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(5_i64)])
        .await
        .unwrap();
    assert_eq!(int_payload(reply), Some(10));
    assert!(drain(&system, "replies").is_empty());
}

#[tokio::test]
async fn test_shared_reply_channel_skips_uncorrelated_replies() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("replies"))
        .register_handler(doubling_service())
        .register_gateway(
            GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests")
                .with_reply_channel("replies"),
        );
    let system = configuration.build(no_references()).unwrap();

    let stale = MessageBuilder::with_payload(99_i64)
        .set_header(MessageHeaders::CORRELATION_ID, "someone-else")
        .build();
    system.get_channel_by_name("replies").unwrap().send(stale).await.unwrap();

    let reply = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(5_i64)])
        .await
        .unwrap();
    assert_eq!(int_payload(reply), Some(10));
    assert!(drain(&system, "replies").is_empty());
}

#[tokio::test]
async fn test_late_reply_is_not_handed_to_next_call() {
    let slow_doubler = MethodTarget::new(int_method("Calculator", "double"), |arguments: Vec<Payload>| async move {
        let value = arguments
            .first()
            .and_then(|argument| argument.downcast_ref::<i64>().copied())
            .unwrap_or_default();
        if value == 1 {
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        Ok(Some(Payload::new(value * 2)))
    });

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("requests"))
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("replies"))
        .register_handler(ServiceActivatorBuilder::create("requests", slow_doubler).with_endpoint_id("worker"))
        .register_polling_metadata(
            PollingMetadata::new("worker")
                .with_fixed_rate(Duration::from_millis(5), Duration::ZERO)
                .with_auto_startup(true),
        )
        .register_gateway(
            GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests")
                .with_reply_channel("replies")
                .with_reply_timeout(Duration::from_millis(50)),
        );
    let system = configuration.build(no_references()).unwrap();
    let calculator = system.get_gateway_by_name("calculator").unwrap();

    let first = calculator.execute(vec![Payload::new(1_i64)]).await;
    assert!(matches!(first, Err(MessagingError::ReplyTimeout(_))));

    tokio::time::sleep(Duration::from_millis(250)).await;
    let second = calculator.execute(vec![Payload::new(5_i64)]).await.unwrap();
    assert_eq!(int_payload(second), Some(10));

    system.stop_all();
}

#[tokio::test]
async fn test_unconvertible_reply_fails() {
    let describe = InterfaceToCall::new("Calculator", "describe")
        .with_parameter("value", TypeDescriptor::INTEGER)
        .returning(TypeDescriptor::STRING);

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_handler(doubling_service())
        .register_gateway(GatewayProxyBuilder::new("calculator", describe, "requests"));
    let system = configuration.build(no_references()).unwrap();

    let result = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(4_i64)])
        .await;
    assert!(matches!(
        result,
        Err(MessagingError::Conversion(ConversionError::Unsupported { ref target_type, .. })) if target_type == "string"
    ));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failure_is_returned_without_error_channel() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_handler(ServiceActivatorBuilder::create("requests", rejecting()))
        .register_gateway(GatewayProxyBuilder::new("calculator", int_method("Calculator", "reject"), "requests"));
    let system = configuration.build(no_references()).unwrap();

    let result = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(1_i64)])
        .await;
    assert!(matches!(result, Err(MessagingError::Invocation(_))));
}

#[tokio::test]
async fn test_failure_goes_to_error_channel() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("errors"))
        .register_handler(ServiceActivatorBuilder::create("requests", rejecting()))
        .register_gateway(
            GatewayProxyBuilder::new("calculator", int_method("Calculator", "reject"), "requests")
                .with_error_channel("errors"),
        );
    let system = configuration.build(no_references()).unwrap();

    let result = system
        .get_gateway_by_name("calculator")
        .unwrap()
        .execute(vec![Payload::new(7_i64)])
        .await
        .unwrap();
    assert!(result.is_none());

    let errors = drain(&system, "errors");
    assert_eq!(errors.len(), 1);
    let failure = errors[0].payload_as::<ErrorPayload>().unwrap();
    assert_eq!(failure.origin, "calculator::reject");
    assert!(failure.error.contains("rejected"));
    let failed = failure.failed_message.as_ref().unwrap();
    assert_eq!(failed.payload_as::<i64>(), Some(&7));
}

// ============================================================================
// Methods and Interceptors
// ============================================================================

#[tokio::test]
async fn test_combined_gateway_dispatches_by_method_name() {
    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_channel(SimpleMessageChannelBuilder::create_queue_channel("outbox"))
        .register_handler(doubling_service())
        .register_gateway(CombinedGatewayBuilder::new(
            "service",
            "Service",
            [
                GatewayProxyBuilder::new("service", int_method("Service", "double"), "requests"),
                GatewayProxyBuilder::new("service", notify(), "outbox").with_parameter_converters([
                    GatewayParameterConverter::payload("text"),
                    GatewayParameterConverter::header("priority", "priority"),
                ]),
            ],
        ));
    let system = configuration.build(no_references()).unwrap();
    let service = system.get_gateway_by_name("service").unwrap();

    assert_eq!(service.interface_name(), "Service");
    assert_eq!(service.method_names(), ["double", "notify"]);

    let doubled = service.call("double", vec![Payload::new(3_i64)]).await.unwrap();
    assert_eq!(int_payload(doubled), Some(6));

    service
        .call("notify", vec![Payload::new("hi".to_string()), Payload::new("low".to_string())])
        .await
        .unwrap();
    assert_eq!(drain(&system, "outbox").len(), 1);

    let unknown = service.call("halve", vec![Payload::new(3_i64)]).await;
    assert!(matches!(
        unknown,
        Err(MessagingError::GatewayMethodNotFound { ref method, .. }) if method == "halve"
    ));
    assert!(service.execute(vec![Payload::new(3_i64)]).await.is_err());
}

#[tokio::test]
async fn test_around_interceptor_replaces_arguments() {
    let clamp: Arc<dyn DynAroundInterceptor> = Arc::new(AroundFn::new(|mut invocation: MethodInvocation| async move {
        let too_big = invocation
            .argument("value")
            .and_then(|value| value.downcast_ref::<i64>().copied())
            .is_some_and(|value| value > 100);
        if too_big {
            invocation.replace_argument("value", Payload::new(100_i64));
        }
        invocation.proceed().await
    }));

    let mut configuration = MessagingSystemConfiguration::new();
    configuration
        .register_handler(doubling_service())
        .register_gateway(
            GatewayProxyBuilder::new("calculator", int_method("Calculator", "double"), "requests")
                .with_around_interceptor(clamp),
        );
    let system = configuration.build(no_references()).unwrap();
    let calculator = system.get_gateway_by_name("calculator").unwrap();

    let clamped = calculator.execute(vec![Payload::new(500_i64)]).await.unwrap();
    assert_eq!(int_payload(clamped), Some(200));
    let untouched = calculator.execute(vec![Payload::new(7_i64)]).await.unwrap();
    assert_eq!(int_payload(untouched), Some(14));
}

#[tokio::test]
async fn test_unknown_gateway_is_reported() {
    let system = MessagingSystemConfiguration::new().build(no_references()).unwrap();
    assert!(matches!(
        system.get_gateway_by_name("nobody"),
        Err(MessagingError::GatewayNotFound(ref name)) if name == "nobody"
    ));
}
