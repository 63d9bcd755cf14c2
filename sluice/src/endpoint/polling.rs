use super::consumer::{ConsumerLifecycle, InstrumentedHandler};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sluice_core::{
    BoxFuture, Clock, DispatchError, DynMessageHandler, InvocationError, Message, MessageBuilder,
    MessageChannel, MessagingError, MethodTarget, Trigger, TriggerContext,
};
use sluice_std::scheduling::{EndpointSchedule, EndpointState};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};

/// Pause between polls that found nothing while a limit keeps `run` going.
const IDLE_PAUSE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Handled,
    Failed,
    Empty,
}

#[derive(Debug, Clone, Copy, Default)]
struct Limits {
    handled_messages: Option<usize>,
    execution_time: Option<Duration>,
}

impl Limits {
    fn any(&self) -> bool {
        self.handled_messages.is_some() || self.execution_time.is_some()
    }
}

struct Budget {
    limits: Limits,
    started: Instant,
    handled: usize,
}

impl Budget {
    fn start(limits: Limits) -> Self {
        Self {
            limits,
            started: Instant::now(),
            handled: 0,
        }
    }

    fn record(&mut self, outcome: PollOutcome) {
        if outcome != PollOutcome::Empty {
            self.handled += 1;
        }
    }

    fn remaining_time(&self) -> Option<Duration> {
        self.limits
            .execution_time
            .map(|limit| limit.saturating_sub(self.started.elapsed()))
    }

    fn exhausted(&self) -> bool {
        self.limits
            .handled_messages
            .is_some_and(|limit| self.handled >= limit)
            || self.remaining_time().is_some_and(|left| left.is_zero())
    }
}

/// What one poll cycle does.
#[derive(Clone)]
enum Source {
    /// Take one message from a pollable channel and hand it to the handler.
    Channel {
        channel: Arc<dyn MessageChannel>,
        handler: Arc<dyn DynMessageHandler>,
        receive_timeout: Duration,
    },
    /// Call a target without arguments and publish what it returns.
    Target {
        target: MethodTarget,
        output: Arc<dyn MessageChannel>,
    },
}

#[derive(Clone)]
struct Poller {
    endpoint_id: String,
    source: Source,
    error_channel: Option<Arc<dyn MessageChannel>>,
}

impl Poller {
    fn channel_name(&self) -> &str {
        match &self.source {
            Source::Channel { channel, .. } => channel.name(),
            Source::Target { output, .. } => output.name(),
        }
    }

    async fn poll_once(&self) -> PollOutcome {
        match &self.source {
            Source::Channel {
                channel,
                handler,
                receive_timeout,
            } => self.consume(channel.as_ref(), handler.as_ref(), *receive_timeout).await,
            Source::Target { target, output } => self.produce(target, output.as_ref()).await,
        }
    }

    async fn consume(
        &self,
        channel: &dyn MessageChannel,
        handler: &dyn DynMessageHandler,
        receive_timeout: Duration,
    ) -> PollOutcome {
        let Some(channel) = channel.as_pollable() else {
            return PollOutcome::Empty;
        };
        let received = if receive_timeout.is_zero() {
            channel.receive()
        } else {
            channel.receive_with_timeout(receive_timeout).await
        };
        let Some(message) = received else {
            return PollOutcome::Empty;
        };

        match handler.handle_dyn(message.clone()).await {
            Ok(()) => PollOutcome::Handled,
            Err(err) => {
                self.publish_failure(Some(message), &err).await;
                PollOutcome::Failed
            }
        }
    }

    async fn produce(&self, target: &MethodTarget, output: &dyn MessageChannel) -> PollOutcome {
        let produced = match target.call(Vec::new()).await {
            Ok(produced) => produced.filter(|payload| !payload.is_null()),
            Err(source) => {
                let err = MessagingError::from(InvocationError::new(target.interface().to_string(), source));
                self.publish_failure(None, &err).await;
                return PollOutcome::Failed;
            }
        };
        let Some(payload) = produced else {
            return PollOutcome::Empty;
        };

        let message = match payload.downcast::<Message>() {
            Some(message) => Message::clone(&message),
            None => MessageBuilder::with_raw_payload(payload).build(),
        };
        tracing::debug!(
            endpoint_id = %self.endpoint_id,
            channel = output.name(),
            message_id = message.id(),
            "publishing polled result"
        );
        match output.send(message.clone()).await {
            Ok(()) => PollOutcome::Handled,
            Err(err) => {
                self.publish_failure(Some(message), &err).await;
                PollOutcome::Failed
            }
        }
    }

    async fn publish_failure(&self, message: Option<Message>, err: &MessagingError) {
        let Some(error_channel) = &self.error_channel else {
            tracing::error!(
                endpoint_id = %self.endpoint_id,
                message_id = message.as_ref().map(Message::id),
                error = %err,
                "polling cycle failed"
            );
            return;
        };

        let error_message = Message::error(&self.endpoint_id, err, message);
        if let Err(send_err) = error_channel.send(error_message).await {
            tracing::error!(
                endpoint_id = %self.endpoint_id,
                channel = %error_channel.name(),
                error = %err,
                send_error = %send_err,
                "failed to publish to error channel"
            );
        }
    }
}

/// Polls a pollable channel, or an inbound target, on a trigger.
///
/// [`start`](ConsumerLifecycle::start) spawns a tokio task that sleeps until
/// each fire instant, takes at most one message and hands it to the handler.
/// An inbound channel adapter instead calls its target once per fire and
/// sends a non-empty result to its channel.
/// [`run`](ConsumerLifecycle::run) polls back to back in the caller's task
/// instead, until the handled-message or execution-time limit is reached or,
/// with neither set, until a poll comes back empty.
///
/// A failed cycle is published to the error channel when one is set and
/// logged otherwise; polling continues either way.
pub struct PollingConsumer {
    poller: Poller,
    schedule: Arc<Mutex<EndpointSchedule>>,
    limits: Limits,
    auto_startup: bool,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingConsumer {
    /// A stopped consumer of `channel` firing on `trigger`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotPollable`] if `channel` cannot be polled.
    pub fn new(
        endpoint_id: impl Into<String>,
        channel: Arc<dyn MessageChannel>,
        handler: Arc<dyn DynMessageHandler>,
        trigger: Arc<dyn Trigger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MessagingError> {
        if channel.as_pollable().is_none() {
            return Err(DispatchError::NotPollable(channel.name().to_string()).into());
        }
        let endpoint_id = endpoint_id.into();
        let handler: Arc<dyn DynMessageHandler> =
            Arc::new(InstrumentedHandler::new(endpoint_id.clone(), handler));
        let source = Source::Channel {
            channel,
            handler,
            receive_timeout: Duration::ZERO,
        };
        Ok(Self::with_source(endpoint_id, source, trigger, clock))
    }

    /// A stopped adapter calling `target` on `trigger` and sending each
    /// result to `output`.
    pub(crate) fn inbound(
        endpoint_id: impl Into<String>,
        target: MethodTarget,
        output: Arc<dyn MessageChannel>,
        trigger: Arc<dyn Trigger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_source(endpoint_id.into(), Source::Target { target, output }, trigger, clock)
    }

    fn with_source(endpoint_id: String, source: Source, trigger: Arc<dyn Trigger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            poller: Poller {
                endpoint_id,
                source,
                error_channel: None,
            },
            schedule: Arc::new(Mutex::new(EndpointSchedule::new(trigger, clock))),
            limits: Limits::default(),
            auto_startup: false,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Publish failures to `channel`.
    pub fn with_error_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.poller.error_channel = Some(channel);
        self
    }

    /// Wait up to `timeout` for a message on each poll.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        if let Source::Channel { receive_timeout, .. } = &mut self.poller.source {
            *receive_timeout = timeout;
        }
        self
    }

    /// Stop after handling `limit` messages.
    pub fn with_handled_message_limit(mut self, limit: Option<usize>) -> Self {
        self.limits.handled_messages = limit;
        self
    }

    /// Stop once `limit` has elapsed.
    pub fn with_execution_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.limits.execution_time = limit;
        self
    }

    /// Start together with the system.
    pub fn with_auto_startup(mut self, auto_startup: bool) -> Self {
        self.auto_startup = auto_startup;
        self
    }

    /// Where the endpoint is in its cycle.
    pub fn state(&self) -> EndpointState {
        self.schedule.lock().state()
    }

    /// The endpoint's scheduling history.
    pub fn context(&self) -> TriggerContext {
        self.schedule.lock().context()
    }
}

async fn poll_on_schedule(
    poller: Poller,
    schedule: Arc<Mutex<EndpointSchedule>>,
    limits: Limits,
    running: Arc<AtomicBool>,
) {
    let mut budget = Budget::start(limits);
    while running.load(Ordering::Acquire) && !budget.exhausted() {
        let (next, delay) = {
            let mut schedule = schedule.lock();
            let next = schedule.schedule();
            (next, schedule.delay_until(next))
        };
        if next == DateTime::<Utc>::MAX_UTC {
            tracing::warn!(endpoint_id = %poller.endpoint_id, "trigger will not fire again");
            break;
        }

        let delay = budget.remaining_time().map_or(delay, |left| delay.min(left));
        tokio::time::sleep(delay).await;
        if !running.load(Ordering::Acquire) || budget.exhausted() {
            break;
        }

        schedule.lock().mark_running();
        let outcome = poller.poll_once().await;
        finish_cycle(&schedule, outcome);
        budget.record(outcome);
    }
    running.store(false, Ordering::Release);
    tracing::debug!(endpoint_id = %poller.endpoint_id, "polling stopped");
}

fn finish_cycle(schedule: &Mutex<EndpointSchedule>, outcome: PollOutcome) {
    let mut schedule = schedule.lock();
    match outcome {
        PollOutcome::Failed => schedule.mark_failed(),
        PollOutcome::Handled | PollOutcome::Empty => schedule.mark_completed(),
    }
}

impl ConsumerLifecycle for PollingConsumer {
    fn endpoint_id(&self) -> &str {
        &self.poller.endpoint_id
    }

    fn input_channel_name(&self) -> &str {
        self.poller.channel_name()
    }

    fn is_pollable(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn start(&self) -> Result<(), MessagingError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                self.running.store(false, Ordering::Release);
                return Err(MessagingError::Custom(err.into()));
            }
        };

        let task = runtime.spawn(poll_on_schedule(
            self.poller.clone(),
            Arc::clone(&self.schedule),
            self.limits,
            Arc::clone(&self.running),
        ));
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        tracing::debug!(
            endpoint_id = %self.poller.endpoint_id,
            channel = %self.poller.channel_name(),
            "polling started"
        );
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    fn run(&self) -> BoxFuture<'_, Result<(), MessagingError>> {
        Box::pin(async move {
            let mut budget = Budget::start(self.limits);
            while !budget.exhausted() {
                {
                    let mut schedule = self.schedule.lock();
                    schedule.schedule();
                    schedule.mark_running();
                }
                let outcome = self.poller.poll_once().await;
                finish_cycle(&self.schedule, outcome);
                budget.record(outcome);

                if outcome == PollOutcome::Empty {
                    if !self.limits.any() {
                        break;
                    }
                    let pause = budget
                        .remaining_time()
                        .map_or(IDLE_PAUSE, |left| left.min(IDLE_PAUSE));
                    tokio::time::sleep(pause).await;
                }
            }
            Ok(())
        })
    }

    fn auto_startup(&self) -> bool {
        self.auto_startup
    }
}

impl Drop for PollingConsumer {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
