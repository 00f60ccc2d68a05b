use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc;

use crate::core::{top_focusable_window, State};
use crate::event::Event;
use crate::event_emitter::EventEmitter;
use crate::platform::{BridgeHost, BrowserHost, PendingReplies};
use tabtree_ipc::{Command, Response};

use super::command::process_command;
use super::effects::execute_effects;
use super::state_events::{emit_state_change_events, persist_if_changed};

/// Everything the main loop hands to the dispatcher
pub struct AppContext {
    pub state: RefCell<State>,
    pub host: Rc<dyn BrowserHost>,
    /// Requests to the bridge awaiting `Command::HostReply`
    pub pending: PendingReplies,
    pub event_emitter: EventEmitter,
    pub event_tx: mpsc::UnboundedSender<Event>,
}

/// Unified command dispatcher for the command socket.
/// Handles the common pattern: process command -> execute effects -> emit events -> persist.
pub fn dispatch_command(ctx: &AppContext, cmd: &Command) -> Response {
    // Bridge replies never touch the tree
    if let Command::HostReply { request_id, reply } = cmd {
        return if BridgeHost::resolve(&ctx.pending, *request_id, reply.clone()) {
            Response::Ok
        } else {
            Response::Error {
                message: format!("Unknown host request: {}", request_id),
            }
        };
    }

    let result = process_command(&mut ctx.state.borrow_mut(), cmd);
    execute_effects(result.effects, &ctx.host, &ctx.event_tx);
    finish_transition(ctx);
    result.response
}

/// Apply a host call completion produced by an earlier effect
pub fn dispatch_event(ctx: &AppContext, event: Event) {
    tracing::debug!("Host completion: {:?}", event);
    ctx.state.borrow_mut().handle_event(event);
    finish_transition(ctx);
}

/// Answer `TopFocusableWindow` from a local task, since it waits on the host.
/// The candidate list is taken now; later focus changes do not affect it.
pub fn spawn_top_focusable_window(
    ctx: &AppContext,
    rank: usize,
    resp_tx: mpsc::Sender<Response>,
) {
    let candidates = ctx.state.borrow().focus.candidates(rank);
    let host = Rc::clone(&ctx.host);
    tokio::task::spawn_local(async move {
        let id = top_focusable_window(host.as_ref(), candidates).await;
        let _ = resp_tx.send(Response::WindowId { id }).await;
    });
}

fn finish_transition(ctx: &AppContext) {
    let changed = emit_state_change_events(&ctx.event_emitter, &ctx.state);
    persist_if_changed(&ctx.state, changed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::ipc::EventBroadcaster;
    use crate::platform::mock::{create_test_tab, create_test_window, MockBrowserHost};
    use std::collections::HashMap;
    use tabtree_ipc::{HostEvent, HostReply, TreeEvent};
    use tokio::sync::broadcast;

    fn setup_context(host: MockBrowserHost) -> (AppContext, mpsc::UnboundedReceiver<Event>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let ctx = AppContext {
            state: RefCell::new(State::new(Config::ephemeral())),
            host: Rc::new(host),
            pending: Rc::new(RefCell::new(HashMap::new())),
            event_emitter: EventEmitter::new(EventBroadcaster::new(64)),
            event_tx,
        };
        (ctx, event_rx)
    }

    fn sync_command() -> Command {
        let mut second = create_test_tab(2, 1, "https://b");
        second.index = 1;
        Command::Host {
            event: HostEvent::Sync {
                windows: vec![create_test_window(
                    1,
                    vec![create_test_tab(1, 1, "https://a"), second],
                )],
            },
        }
    }

    #[tokio::test]
    async fn test_dispatch_emits_tree_events() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let broadcaster = EventBroadcaster::new(64);
                let mut rx: broadcast::Receiver<TreeEvent> = broadcaster.subscribe();
                let (mut ctx, _event_rx) = setup_context(MockBrowserHost::new());
                ctx.event_emitter = EventEmitter::new(broadcaster);

                assert_eq!(dispatch_command(&ctx, &sync_command()), Response::Ok);
                assert!(matches!(
                    rx.recv().await.unwrap(),
                    TreeEvent::NodeAdded { .. }
                ));
            })
            .await;
    }

    #[tokio::test]
    async fn test_hibernate_closes_tab_on_host() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MockBrowserHost::new());
                let (mut ctx, _event_rx) = setup_context(MockBrowserHost::new());
                ctx.host = host.clone() as Rc<dyn BrowserHost>;

                dispatch_command(&ctx, &sync_command());
                let response = dispatch_command(
                    &ctx,
                    &Command::Hibernate {
                        id: "p2".to_string(),
                    },
                );
                assert_eq!(response, Response::Ok);

                for _ in 0..10 {
                    if !host.removed_tabs.borrow().is_empty() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                assert_eq!(*host.removed_tabs.borrow(), vec![2]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_awaken_round_trip() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (ctx, mut event_rx) = setup_context(MockBrowserHost::new());
                dispatch_command(&ctx, &sync_command());
                dispatch_command(
                    &ctx,
                    &Command::Hibernate {
                        id: "p2".to_string(),
                    },
                );
                let response = dispatch_command(
                    &ctx,
                    &Command::Awaken {
                        id: "p2".to_string(),
                    },
                );
                assert_eq!(response, Response::Ok);

                let event = event_rx.recv().await.unwrap();
                assert!(matches!(event, Event::TabAwakened { .. }));
                dispatch_event(&ctx, event);

                let state = ctx.state.borrow();
                assert_eq!(
                    state.tree.page_by_tab(1000).map(|id| id.as_str()),
                    Some("p2")
                );
                assert!(state.pending_tabs.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_failed_awaken_becomes_notice() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let broadcaster = EventBroadcaster::new(64);
                let (mut ctx, mut event_rx) =
                    setup_context(MockBrowserHost::new().failing_create());
                dispatch_command(&ctx, &sync_command());
                dispatch_command(
                    &ctx,
                    &Command::Hibernate {
                        id: "p2".to_string(),
                    },
                );

                dispatch_command(
                    &ctx,
                    &Command::Awaken {
                        id: "p2".to_string(),
                    },
                );
                let event = event_rx.recv().await.unwrap();
                let mut rx = broadcaster.subscribe();
                ctx.event_emitter = EventEmitter::new(broadcaster);
                dispatch_event(&ctx, event);

                assert!(matches!(
                    rx.recv().await.unwrap(),
                    TreeEvent::Notice { .. }
                ));
                assert!(ctx.state.borrow().pending_tabs.is_empty());
            })
            .await;
    }

    #[test]
    fn test_unknown_host_reply() {
        let (ctx, _event_rx) = setup_context(MockBrowserHost::new());
        let response = dispatch_command(
            &ctx,
            &Command::HostReply {
                request_id: 9,
                reply: HostReply::Ok,
            },
        );
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn test_host_reply_resolves_pending_request() {
        let (ctx, _event_rx) = setup_context(MockBrowserHost::new());
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        ctx.pending.borrow_mut().insert(4, tx);

        let response = dispatch_command(
            &ctx,
            &Command::HostReply {
                request_id: 4,
                reply: HostReply::Ok,
            },
        );
        assert_eq!(response, Response::Ok);
        assert_eq!(rx.try_recv().unwrap(), HostReply::Ok);
    }

    #[tokio::test]
    async fn test_top_focusable_window_skips_minimized() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (ctx, _event_rx) =
                    setup_context(MockBrowserHost::new().with_minimized(&[2]));
                {
                    let mut state = ctx.state.borrow_mut();
                    state.focus_changed(Some(1));
                    state.focus_changed(Some(2));
                }

                let (resp_tx, mut resp_rx) = mpsc::channel(1);
                spawn_top_focusable_window(&ctx, 0, resp_tx);
                assert_eq!(
                    resp_rx.recv().await,
                    Some(Response::WindowId { id: Some(1) })
                );
            })
            .await;
    }
}
