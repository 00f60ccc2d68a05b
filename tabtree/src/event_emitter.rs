use crate::core::State;
use crate::ipc::EventBroadcaster;
use tabtree_ipc::TreeEvent;

/// Publishes tree events drained from `State` to event subscribers.
pub struct EventEmitter {
    broadcaster: EventBroadcaster,
}

impl EventEmitter {
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        Self { broadcaster }
    }

    /// Send an event to subscribers
    pub fn emit(&self, event: TreeEvent) {
        self.broadcaster.send(event);
    }

    /// Emit events in order
    pub fn emit_all(&self, events: Vec<TreeEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Create a snapshot event from current state
pub fn create_snapshot(state: &State) -> TreeEvent {
    TreeEvent::Snapshot {
        windows: state.snapshot(),
    }
}

/// Whether any event in the batch changed the tree itself
pub fn is_tree_mutation(event: &TreeEvent) -> bool {
    matches!(
        event,
        TreeEvent::NodeAdded { .. }
            | TreeEvent::NodeRemoved { .. }
            | TreeEvent::NodeUpdated { .. }
            | TreeEvent::NodeMoved { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::platform::mock::{create_test_tab, create_test_window};

    #[test]
    fn test_create_snapshot_reflects_tree() {
        let mut state = State::new(Config::ephemeral());
        state
            .sync(&[create_test_window(
                1,
                vec![create_test_tab(1, 1, "https://a")],
            )])
            .unwrap();
        match create_snapshot(&state) {
            TreeEvent::Snapshot { windows } => {
                assert_eq!(windows.len(), 1);
                assert_eq!(windows[0].id, "w1");
                assert_eq!(windows[0].children[0].id, "p1");
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_all_keeps_order() {
        let broadcaster = EventBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let emitter = EventEmitter::new(broadcaster);
        emitter.emit_all(vec![
            TreeEvent::NodeRemoved {
                id: "p2".to_string(),
            },
            TreeEvent::NodeRemoved {
                id: "p1".to_string(),
            },
        ]);
        emitter.emit(TreeEvent::Notice {
            message: "done".to_string(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            TreeEvent::NodeRemoved {
                id: "p2".to_string()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            TreeEvent::NodeRemoved {
                id: "p1".to_string()
            }
        );
        assert!(matches!(rx.recv().await.unwrap(), TreeEvent::Notice { .. }));
    }

    #[test]
    fn test_is_tree_mutation() {
        assert!(is_tree_mutation(&TreeEvent::NodeRemoved {
            id: "p1".to_string()
        }));
        assert!(!is_tree_mutation(&TreeEvent::WindowFocused { window_id: None }));
    }
}
