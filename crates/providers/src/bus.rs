//! Typed message bus between a popup-role bridge and the main session.
//!
//! The cross-window message channel, re-expressed as one mpsc pair carrying
//! the validated `BridgeMessage` union. Untyped payloads are checked at the
//! posting boundary; the receiver drains one message per turn, preserving
//! append ordering.

use shared::message::{BridgeMessage, MessageError};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

pub fn channel() -> (BusSender, BusReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BusSender { tx }, BusReceiver { rx })
}

#[derive(Clone)]
pub struct BusSender {
    tx: UnboundedSender<BridgeMessage>,
}

impl BusSender {
    /// Post an already-typed message. A closed receiver (the opener is
    /// gone) drops the message, matching a post against a closed window.
    pub fn post(&self, message: BridgeMessage) {
        if self.tx.send(message).is_err() {
            tracing::warn!("bridge message dropped: no listener on the bus");
        }
    }

    /// Validate an untyped payload, then post it. Unknown or malformed
    /// messages are rejected here and never travel the bus.
    pub fn post_raw(&self, value: serde_json::Value) -> Result<(), MessageError> {
        let message = BridgeMessage::from_value(value)?;
        self.post(message);
        Ok(())
    }
}

pub struct BusReceiver {
    rx: UnboundedReceiver<BridgeMessage>,
}

impl BusReceiver {
    /// Take the next pending message without waiting.
    pub fn try_next(&mut self) -> Option<BridgeMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next message; `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<BridgeMessage> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_arrive_in_post_order() {
        let (tx, mut rx) = channel();
        tx.post(BridgeMessage::SlackContext {
            name: "first".into(),
            content: "A".into(),
        });
        tx.post(BridgeMessage::SlackContext {
            name: "second".into(),
            content: "B".into(),
        });

        match rx.try_next().unwrap() {
            BridgeMessage::SlackContext { name, .. } => assert_eq!(name, "first"),
            other => panic!("unexpected message: {other:?}"),
        }
        match rx.try_next().unwrap() {
            BridgeMessage::SlackContext { name, .. } => assert_eq!(name, "second"),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn test_post_raw_rejects_unknown_payloads() {
        let (tx, mut rx) = channel();
        assert!(tx.post_raw(json!({"type": "mystery"})).is_err());
        assert!(rx.try_next().is_none());

        tx.post_raw(json!({
            "type": "github_connected",
            "user_id": "42",
            "username": "octocat",
        }))
        .unwrap();
        assert!(rx.try_next().is_some());
    }

    #[test]
    fn test_post_to_closed_receiver_is_silent() {
        let (tx, rx) = channel();
        drop(rx);
        // Must not panic or error out.
        tx.post(BridgeMessage::SlackContext {
            name: "n".into(),
            content: "c".into(),
        });
    }
}
