use parking_lot::Mutex;
use sluice_core::{BoxFuture, Message, MessageChannel, MessagingError, PollableChannel};
use std::{collections::VecDeque, time::Duration};
use tokio::sync::Notify;

/// Pollable FIFO channel.
///
/// Safe for concurrent senders and receivers; a receiver waiting in
/// [`PollableChannel::receive_with_timeout`] is woken by the next send.
pub struct QueueChannel {
    name: String,
    queue: Mutex<VecDeque<Message>>,
    arrived: Notify,
}

impl QueueChannel {
    /// Create an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
        }
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl MessageChannel for QueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        self.queue.lock().push_back(message);
        self.arrived.notify_one();
        Box::pin(futures::future::ready(Ok(())))
    }

    fn as_pollable(&self) -> Option<&dyn PollableChannel> {
        Some(self)
    }
}

impl PollableChannel for QueueChannel {
    fn receive(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    fn receive_with_timeout(&self, timeout: Duration) -> BoxFuture<'_, Option<Message>> {
        Box::pin(async move {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let arrived = self.arrived.notified();
                if let Some(message) = self.receive() {
                    return Some(message);
                }
                if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                    return self.receive();
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::MessageBuilder;
    use std::sync::Arc;

    fn message(n: i64) -> Message {
        MessageBuilder::with_payload(n).build()
    }

    #[tokio::test]
    async fn test_messages_are_received_in_send_order() {
        let channel = QueueChannel::new("jobs");
        for n in 1..=3 {
            channel.send(message(n)).await.unwrap();
        }
        let received: Vec<i64> = std::iter::from_fn(|| channel.receive())
            .filter_map(|m| m.payload_as::<i64>().copied())
            .collect();
        assert_eq!(received, vec![1, 2, 3]);
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn test_receive_with_timeout_on_empty_queue() {
        let channel = QueueChannel::new("jobs");
        assert!(channel
            .receive_with_timeout(Duration::from_millis(10))
            .await
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiting_receiver_is_woken_by_send() {
        let channel = Arc::new(QueueChannel::new("jobs"));
        let sender = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.send(message(9)).await.unwrap();
        });

        let received = channel.receive_with_timeout(Duration::from_secs(2)).await;
        assert_eq!(received.and_then(|m| m.payload_as::<i64>().copied()), Some(9));
    }
}
