//! Message bus driving commands and the events they cascade into.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use domain::{
    Allocate, Allocated, AllocationEvent, ChangeBatchQuantity, Command, CreateBatch, Deallocated,
    DomainEvent, OutOfStock,
};

use crate::error::{Result, ServiceError};
use crate::registry::{CommandOutcome, HandlerRegistry};
use crate::unit_of_work::EventSource;

/// Anything the bus can be asked to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    Event(AllocationEvent),
}

impl Message {
    /// Returns the command or event type name.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(command) => command.command_type(),
            Message::Event(event) => event.event_type(),
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<AllocationEvent> for Message {
    fn from(event: AllocationEvent) -> Self {
        Message::Event(event)
    }
}

macro_rules! into_message {
    ($variant:ident, $envelope:ty: $($ty:ty),+) => {
        $(
            impl From<$ty> for Message {
                fn from(inner: $ty) -> Self {
                    Message::$variant(<$envelope>::from(inner))
                }
            }
        )+
    };
}

into_message!(Command, Command: CreateBatch, Allocate, ChangeBatchQuantity);
into_message!(Event, AllocationEvent: Allocated, Deallocated, OutOfStock);

/// How often a handler is run when it keeps losing the race for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 mean 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Failures kept by a bus before the oldest are dropped.
pub const DEFAULT_FAILURE_CAPACITY: usize = 256;

/// A failed event handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Name of the handler that failed.
    pub handler: &'static str,

    /// The event it was handling.
    pub event: AllocationEvent,

    /// Rendered error.
    pub error: String,
}

/// Dispatches commands and events to their handlers.
///
/// One call to [`handle`](Self::handle) runs a FIFO queue to exhaustion.
/// Every handler invocation is followed by draining the unit of work's newly
/// committed events onto the tail of the queue, so cascades run after
/// everything already queued.
///
/// Event handler failures are kept for [`take_failures`](Self::take_failures)
/// up to a fixed capacity; past it the oldest are dropped, so a long-lived
/// bus should be drained regularly.
pub struct MessageBus {
    registry: HandlerRegistry,
    events: Arc<dyn EventSource>,
    retry: RetryPolicy,
    failures: VecDeque<HandlerFailure>,
    failure_capacity: usize,
}

impl MessageBus {
    /// Creates a bus over a finished registry and the unit of work its
    /// handlers commit through.
    pub fn new(registry: HandlerRegistry, events: Arc<dyn EventSource>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            events,
            retry,
            failures: VecDeque::new(),
            failure_capacity: DEFAULT_FAILURE_CAPACITY,
        }
    }

    /// Sets how many event handler failures are kept between drains.
    pub fn with_failure_capacity(mut self, capacity: usize) -> Self {
        self.failure_capacity = capacity;
        self
    }

    /// Returns the registry this bus dispatches through.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Takes the event handler failures recorded so far, oldest first.
    pub fn take_failures(&mut self) -> Vec<HandlerFailure> {
        self.failures.drain(..).collect()
    }

    /// Handles a message and everything it cascades into.
    ///
    /// Returns the command's outcome, or None when `message` is an event.
    /// A failing command handler aborts the call: its error is returned and
    /// nothing still queued is processed. A failing event handler is
    /// recorded and the queue carries on.
    #[tracing::instrument(skip_all, fields(message_type = tracing::field::Empty))]
    pub async fn handle(&mut self, message: impl Into<Message>) -> Result<Option<CommandOutcome>> {
        let message = message.into();
        tracing::Span::current().record("message_type", message.name());
        let started = Instant::now();

        let mut outcome = None;
        let mut queue = VecDeque::from([message]);
        let mut processed = 0_usize;

        while let Some(message) = queue.pop_front() {
            processed += 1;
            metrics::counter!("messagebus_messages_total", "message" => message.name())
                .increment(1);

            match message {
                Message::Command(command) => match self.handle_command(&command, &mut queue).await
                {
                    Ok(result) => outcome = Some(result),
                    Err(e) => {
                        let dropped = queue.len() + self.events.discard_new_events().await;
                        tracing::error!(
                            command = command.command_type(),
                            error = %e,
                            dropped,
                            "command failed"
                        );
                        return Err(e);
                    }
                },
                Message::Event(event) => self.handle_event(&event, &mut queue).await,
            }
        }

        metrics::histogram!("messagebus_handle_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(processed, "queue drained");
        Ok(outcome)
    }

    async fn handle_command(
        &self,
        command: &Command,
        queue: &mut VecDeque<Message>,
    ) -> Result<CommandOutcome> {
        let name = command.command_type();
        let handler = self
            .registry
            .command_handler(name)
            .ok_or(ServiceError::NoCommandHandler(name))?;

        tracing::debug!(command = name, "handling command");
        let result = with_retry(self.retry, name, || handler.handle_command(command)).await;
        self.enqueue_new_events(queue).await;
        result
    }

    async fn handle_event(&mut self, event: &AllocationEvent, queue: &mut VecDeque<Message>) {
        let name = event.event_type();
        let handlers = self.registry.event_handlers(name);
        if handlers.is_empty() {
            tracing::debug!(event = name, "no handlers for event");
        }

        let mut failures = Vec::new();
        for handler in handlers {
            let handler_name = handler.handler_name();
            tracing::debug!(event = name, handler = handler_name, "handling event");

            let result = with_retry(self.retry, handler_name, || handler.handle_event(event)).await;
            if let Err(e) = result {
                tracing::error!(event = name, handler = handler_name, error = %e, "event handler failed");
                metrics::counter!("messagebus_handler_failures_total", "handler" => handler_name)
                    .increment(1);
                failures.push(HandlerFailure {
                    handler: handler_name,
                    event: event.clone(),
                    error: e.to_string(),
                });
            }

            self.enqueue_new_events(queue).await;
        }
        self.record_failures(failures);
    }

    fn record_failures(&mut self, failures: Vec<HandlerFailure>) {
        self.failures.extend(failures);
        let overflow = self.failures.len().saturating_sub(self.failure_capacity);
        if overflow > 0 {
            tracing::warn!(
                dropped = overflow,
                capacity = self.failure_capacity,
                "failure log full, dropping oldest entries"
            );
            self.failures.drain(..overflow);
        }
    }

    async fn enqueue_new_events(&self, queue: &mut VecDeque<Message>) {
        let events = self.events.collect_new_events().await;
        if !events.is_empty() {
            tracing::debug!(count = events.len(), "enqueuing cascaded events");
        }
        queue.extend(events.into_iter().map(Message::Event));
    }
}

/// Runs `attempt` until it succeeds, fails with something other than a
/// concurrency conflict, or the policy runs out of attempts.
async fn with_retry<T, F, Fut>(policy: RetryPolicy, handler: &'static str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_concurrency_conflict() && tries < policy.max_attempts => {
                tracing::warn!(handler, attempt = tries, error = %e, "concurrency conflict, retrying");
                metrics::counter!("messagebus_conflict_retries_total", "handler" => handler)
                    .increment(1);
                tries += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use common::{Sku, Version};
    use product_store::StoreError;

    use super::*;

    fn conflict() -> ServiceError {
        StoreError::ConcurrencyConflict {
            sku: Sku::new("LAMP"),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into()
    }

    #[tokio::test]
    async fn retry_stops_after_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(RetryPolicy::new(3), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(conflict())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(RetryPolicy::new(3), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;

        assert!(result.unwrap_err().is_concurrency_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(RetryPolicy::new(5), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::InvalidSku(Sku::new("NOPE")))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let _ = with_retry(RetryPolicy::new(0), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(conflict())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct NoEvents;

    #[async_trait]
    impl EventSource for NoEvents {
        async fn collect_new_events(&self) -> Vec<AllocationEvent> {
            Vec::new()
        }

        async fn discard_new_events(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn unregistered_command_fails() {
        let mut bus = MessageBus::new(HandlerRegistry::new(), Arc::new(NoEvents), RetryPolicy::none());

        let result = bus.handle(Allocate::new("o1", "LAMP", 1)).await;

        assert!(matches!(result, Err(ServiceError::NoCommandHandler("Allocate"))));
    }

    #[tokio::test]
    async fn event_without_handlers_is_a_no_op() {
        let mut bus = MessageBus::new(HandlerRegistry::new(), Arc::new(NoEvents), RetryPolicy::none());

        let outcome = bus
            .handle(OutOfStock { sku: "LAMP".into() })
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert!(bus.take_failures().is_empty());
    }

    struct AlwaysFails;

    #[async_trait]
    impl crate::registry::EventHandler for AlwaysFails {
        type Event = OutOfStock;

        fn name(&self) -> &'static str {
            "always_fails"
        }

        async fn handle(&self, _event: &OutOfStock) -> Result<()> {
            Err(ServiceError::Notification("mail server down".into()))
        }
    }

    #[tokio::test]
    async fn failure_log_keeps_only_the_newest_entries() {
        let mut registry = HandlerRegistry::new();
        registry.on_event(AlwaysFails);
        let mut bus = MessageBus::new(registry, Arc::new(NoEvents), RetryPolicy::none())
            .with_failure_capacity(2);

        for sku in ["A", "B", "C"] {
            bus.handle(OutOfStock { sku: sku.into() }).await.unwrap();
        }

        let skus: Vec<_> = bus
            .take_failures()
            .into_iter()
            .map(|failure| match failure.event {
                AllocationEvent::OutOfStock(data) => data.sku.to_string(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(skus, vec!["B", "C"]);
    }

    #[test]
    fn message_names() {
        assert_eq!(Message::from(CreateBatch::new("b1", "LAMP", 1, None)).name(), "CreateBatch");
        assert_eq!(
            Message::from(Deallocated {
                order_id: "o1".into(),
                sku: "LAMP".into(),
                quantity: 1,
            })
            .name(),
            "Deallocated"
        );
    }
}
