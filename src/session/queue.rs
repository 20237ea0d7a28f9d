//! Per-connection message queue: an unbounded MPSC of tagged messages
//! with a single consumer.

use crate::codec::ReadOnlyPacket;
use std::time::Duration;
use tokio::sync::mpsc;

pub enum Message {
    Packet(ReadOnlyPacket),
    Encrypted,
    ConnectionClosed,
    Timeout,
    Internal(Box<dyn std::any::Any + Send>),
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Packet(_) => write!(f, "Message::Packet"),
            Self::Encrypted => write!(f, "Message::Encrypted"),
            Self::ConnectionClosed => write!(f, "Message::ConnectionClosed"),
            Self::Timeout => write!(f, "Message::Timeout"),
            Self::Internal(_) => write!(f, "Message::Internal"),
        }
    }
}

#[derive(Clone)]
pub struct MessageQueue {
    sender: mpsc::UnboundedSender<Message>,
}

pub struct MessageConsumer {
    receiver: mpsc::UnboundedReceiver<Message>,
}

pub fn channel() -> (MessageQueue, MessageConsumer) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (MessageQueue { sender }, MessageConsumer { receiver })
}

impl MessageQueue {
    /// Fails only once the consumer (and therefore the session) is gone.
    pub fn send(&self, message: Message) -> Result<(), Message> {
        self.sender.send(message).map_err(|err| err.0)
    }
}

/// Result a `wait_for_message` filter returns for each dequeued message.
pub enum FilterOutcome {
    /// Keep waiting; this message did not match.
    Continue,
    Success,
    Failure,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WaitStatus {
    Success,
    Failure,
    TimedOut,
}

impl MessageConsumer {
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    /// Dequeues messages until `filter` returns `Success`/`Failure`, a
    /// disconnect-shaped message is seen while `filter` is still
    /// `Continue` (treated as `Failure`), or `timeout` elapses.
    pub async fn wait_for_message(
        &mut self,
        mut filter: impl FnMut(&Message) -> FilterOutcome,
        timeout: Duration,
    ) -> WaitStatus {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return WaitStatus::TimedOut;
            }

            match tokio::time::timeout(remaining, self.receiver.recv()).await {
                Ok(Some(message)) => {
                    let is_disconnect = matches!(message, Message::ConnectionClosed | Message::Timeout);
                    match filter(&message) {
                        FilterOutcome::Success => return WaitStatus::Success,
                        FilterOutcome::Failure => return WaitStatus::Failure,
                        FilterOutcome::Continue if is_disconnect => return WaitStatus::Failure,
                        FilterOutcome::Continue => continue,
                    }
                }
                Ok(None) => return WaitStatus::Failure,
                Err(_) => return WaitStatus::TimedOut,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn wait_for_message_succeeds_on_matching_filter() {
        let (tx, mut rx) = channel();
        tx.send(Message::Encrypted).unwrap();

        let status = rx
            .wait_for_message(
                |message| match message {
                    Message::Encrypted => FilterOutcome::Success,
                    _ => FilterOutcome::Continue,
                },
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(status, WaitStatus::Success);
    }

    #[tokio::test]
    async fn wait_for_message_fails_on_disconnect() {
        let (tx, mut rx) = channel();
        tx.send(Message::ConnectionClosed).unwrap();

        let status = rx
            .wait_for_message(|_| FilterOutcome::Continue, Duration::from_secs(1))
            .await;

        assert_eq!(status, WaitStatus::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_message_times_out_with_no_messages() {
        let (_tx, mut rx) = channel();
        let status = rx
            .wait_for_message(|_| FilterOutcome::Continue, Duration::from_millis(50))
            .await;
        assert_eq!(status, WaitStatus::TimedOut);
    }
}
