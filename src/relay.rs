//! Hotkey → browser command hand-off.
//!
//! [`CommandRelay::relay`] runs on the capture thread. It only does the table
//! lookup and pushes the resulting [`CommandMessage`] into an unbounded
//! channel; a dispatcher task on the tokio runtime encodes it and fans it out
//! through the [`ConnectionHub`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actions::ActionRegistry;
use crate::hub::ConnectionHub;
use crate::protocol::{self, CommandMessage};

/// What happened to one hotkey press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Handed to the dispatcher.
    Dispatched { action: String },
    /// No binding for this combination.
    Unhandled,
    /// Binding found, but the dispatcher has stopped.
    Dropped,
}

#[derive(Clone)]
pub struct CommandRelay {
    actions: Arc<ActionRegistry>,
    tx: mpsc::UnboundedSender<CommandMessage>,
}

impl CommandRelay {
    /// Build a relay and the receiving end its dispatcher should drain.
    pub fn channel(
        actions: Arc<ActionRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<CommandMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { actions, tx }, rx)
    }

    /// Build a relay and spawn its dispatcher on the current runtime.
    ///
    /// The dispatcher exits once every clone of the relay is dropped.
    pub fn spawn(actions: Arc<ActionRegistry>, hub: ConnectionHub) -> (Self, JoinHandle<()>) {
        let (relay, rx) = Self::channel(actions);
        let handle = tokio::spawn(run_dispatcher(rx, hub));
        (relay, handle)
    }

    /// Look up `combo` and queue its command. Safe to call from any thread.
    pub fn relay(&self, combo: &str) -> RelayOutcome {
        let Some(descriptor) = self.actions.get(combo) else {
            tracing::info!(combo, "unhandled hotkey pressed");
            return RelayOutcome::Unhandled;
        };

        let message = CommandMessage::new(descriptor.action_name.clone());
        if self.tx.send(message).is_err() {
            tracing::warn!(
                combo,
                action = %descriptor.action_name,
                "command dispatcher is gone, dropping hotkey"
            );
            return RelayOutcome::Dropped;
        }

        tracing::info!(
            combo,
            action = %descriptor.action_name,
            "{} (command sent to browsers)",
            descriptor.log_message
        );
        RelayOutcome::Dispatched {
            action: descriptor.action_name.clone(),
        }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }
}

/// Drain queued commands and broadcast each one.
pub async fn run_dispatcher(mut rx: mpsc::UnboundedReceiver<CommandMessage>, hub: ConnectionHub) {
    while let Some(message) = rx.recv().await {
        let frame = match protocol::command_frame(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(action = %message.action, error = %e, "failed to encode command");
                continue;
            }
        };
        let report = hub.broadcast(&frame);
        if report.delivered == 0 && report.dropped == 0 {
            tracing::debug!(action = %message.action, "no browser clients connected");
        } else {
            tracing::debug!(
                action = %message.action,
                delivered = report.delivered,
                dropped = report.dropped,
                "command broadcast"
            );
        }
    }
    tracing::debug!("command dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn recv_frame(rx: &mut mpsc::Receiver<crate::hub::Frame>) -> serde_json::Value {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout waiting for frame")
            .expect("queue closed");
        let body = frame.strip_prefix("42").expect("event frame");
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn registered_combo_broadcasts_exactly_once() {
        let hub = ConnectionHub::new();
        let (_id, mut rx) = hub.connect();
        let (relay, _dispatcher) = CommandRelay::spawn(Arc::new(ActionRegistry::builtin()), hub);

        let outcome = relay.relay("f2");
        assert_eq!(
            outcome,
            RelayOutcome::Dispatched {
                action: "next_video".into()
            }
        );

        let event = recv_frame(&mut rx).await;
        assert_eq!(
            event,
            serde_json::json!(["command_to_browser", {"action": "next_video"}])
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "expected a single broadcast");
    }

    #[tokio::test]
    async fn unregistered_combo_is_not_broadcast() {
        let hub = ConnectionHub::new();
        let (_id, mut rx) = hub.connect();
        let (relay, _dispatcher) = CommandRelay::spawn(Arc::new(ActionRegistry::builtin()), hub);

        assert_eq!(relay.relay("f12"), RelayOutcome::Unhandled);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn relay_works_from_a_foreign_thread() {
        let hub = ConnectionHub::new();
        let (_id, mut rx) = hub.connect();
        let (relay, _dispatcher) = CommandRelay::spawn(Arc::new(ActionRegistry::builtin()), hub);

        let outcome = std::thread::spawn(move || relay.relay("pause break"))
            .join()
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Dispatched { .. }));

        let event = recv_frame(&mut rx).await;
        assert_eq!(event[1]["action"], "toggle_play_pause");
    }

    #[tokio::test]
    async fn each_combo_dispatches_its_own_action() {
        let actions = Arc::new(ActionRegistry::builtin());
        let hub = ConnectionHub::new();
        let (_id, mut rx) = hub.connect();
        let (relay, _dispatcher) = CommandRelay::spawn(actions.clone(), hub);

        for descriptor in actions.iter() {
            relay.relay(&descriptor.key_combination);
            let event = recv_frame(&mut rx).await;
            assert_eq!(event[1]["action"], descriptor.action_name.as_str());
        }
    }

    #[test]
    fn stopped_dispatcher_drops_commands() {
        let (relay, rx) = CommandRelay::channel(Arc::new(ActionRegistry::builtin()));
        drop(rx);
        assert_eq!(relay.relay("f3"), RelayOutcome::Dropped);
        assert_eq!(relay.relay("nope"), RelayOutcome::Unhandled);
    }

    #[tokio::test]
    async fn dispatcher_exits_when_relays_are_dropped() {
        let (relay, handle) =
            CommandRelay::spawn(Arc::new(ActionRegistry::builtin()), ConnectionHub::new());
        let clone = relay.clone();
        drop(relay);
        drop(clone);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("dispatcher should stop")
            .unwrap();
    }
}
