use std::rc::Rc;

use tokio::sync::mpsc;

use crate::effect::Effect;
use crate::event::Event;
use crate::platform::BrowserHost;

/// Execute side effects. Each host call runs as a local task; its outcome
/// comes back to the main loop as an `Event`.
pub fn execute_effects(
    effects: Vec<Effect>,
    host: &Rc<dyn BrowserHost>,
    event_tx: &mpsc::UnboundedSender<Event>,
) {
    for effect in effects {
        let host = Rc::clone(host);
        let event_tx = event_tx.clone();
        tokio::task::spawn_local(async move {
            if let Some(event) = run_effect(effect, host.as_ref()).await {
                if event_tx.send(event).is_err() {
                    tracing::warn!("Main loop gone, dropping host completion");
                }
            }
        });
    }
}

/// Perform one effect against the host. Returns the completion to feed back,
/// if there is anything to report.
pub async fn run_effect(effect: Effect, host: &dyn BrowserHost) -> Option<Event> {
    match effect {
        Effect::CloseTabs(tab_ids) => {
            let mut failure = None;
            for tab_id in tab_ids {
                if let Err(error) = host.remove_tab(tab_id).await {
                    tracing::warn!("Failed to close tab {}: {}", tab_id, error);
                    failure = Some(Event::HostActionFailed {
                        action: format!("close tab {}", tab_id),
                        error,
                    });
                }
            }
            failure
        }
        Effect::SetTabPinned { tab_id, pinned } => {
            host.update_tab(tab_id, pinned)
                .await
                .err()
                .map(|error| Event::HostActionFailed {
                    action: format!("{} tab {}", if pinned { "pin" } else { "unpin" }, tab_id),
                    error,
                })
        }
        Effect::AwakenPage { node_id, spec } => {
            tracing::debug!("Opening tab for {}: {}", node_id, spec.url);
            let result = host.create_tab(spec).await;
            Some(Event::TabAwakened { node_id, result })
        }
        Effect::AwakenWindow { node_id, spec } => {
            tracing::debug!("Opening window for {} with {} tabs", node_id, spec.urls.len());
            let result = host.create_window(spec).await;
            Some(Event::WindowAwakened { node_id, result })
        }
    }
}
