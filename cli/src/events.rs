//! Forwards bridge events to the editor.

use ghul_bridge::{BridgeEvent, LifecycleEvent};
use tokio::sync::mpsc;
use tower_lsp::Client;
use tower_lsp::lsp_types::MessageType;

use crate::{convert, uri};

/// How a lifecycle change is reported: a popup for things the user must
/// act on, the output log for the rest.
fn describe(event: &LifecycleEvent) -> (MessageType, bool, String) {
    match event {
        LifecycleEvent::Starting => (MessageType::INFO, false, "ghul: starting compiler".into()),
        LifecycleEvent::Running => (MessageType::INFO, false, "ghul: compiler running".into()),
        LifecycleEvent::Listening => (MessageType::INFO, false, "ghul: compiler listening".into()),
        LifecycleEvent::Analysed => (MessageType::LOG, false, "ghul: analysis complete".into()),
        LifecycleEvent::Killed => (MessageType::INFO, false, "ghul: compiler stopped".into()),
        LifecycleEvent::Crashed { status } => (
            MessageType::WARNING,
            false,
            format!("ghul: compiler exited ({status}); restarting"),
        ),
        LifecycleEvent::ProtocolError { message } => (
            MessageType::ERROR,
            false,
            format!("ghul: compiler protocol error: {message}"),
        ),
        LifecycleEvent::Exception { message } => (
            MessageType::ERROR,
            true,
            format!("ghul: compiler exception: {message}"),
        ),
        LifecycleEvent::Aborted { reason } => (
            MessageType::ERROR,
            true,
            format!("ghul: {reason}; reload the configuration to restart"),
        ),
        LifecycleEvent::Blocked => (
            MessageType::INFO,
            false,
            "ghul: compiler disabled by configuration".into(),
        ),
    }
}

pub async fn forward(client: Client, mut events: mpsc::UnboundedReceiver<BridgeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BridgeEvent::Diagnostics { uri: key, items } => {
                let Some(url) = uri::to_url(&key) else {
                    tracing::warn!(uri = %key, "Dropping diagnostics for unparseable uri");
                    continue;
                };
                for item in &items {
                    tracing::trace!("{}", item.display_with_uri(&key));
                }
                let diagnostics = items.iter().map(convert::diagnostic).collect();
                client.publish_diagnostics(url, diagnostics, None).await;
            }
            BridgeEvent::Lifecycle(event) => {
                let (kind, popup, message) = describe(&event);
                if popup {
                    client.show_message(kind, &message).await;
                }
                client.log_message(kind, message).await;
            }
        }
    }
    tracing::debug!("Bridge event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_shown_to_the_user() {
        let (kind, popup, message) = describe(&LifecycleEvent::Aborted {
            reason: "no response from compiler for 120s".to_string(),
        });
        assert_eq!(kind, MessageType::ERROR);
        assert!(popup);
        assert!(message.contains("no response"));
    }

    #[test]
    fn test_routine_events_only_logged() {
        for event in [
            LifecycleEvent::Starting,
            LifecycleEvent::Running,
            LifecycleEvent::Listening,
            LifecycleEvent::Analysed,
        ] {
            let (_, popup, _) = describe(&event);
            assert!(!popup, "{event:?} should not pop up");
        }
    }
}
