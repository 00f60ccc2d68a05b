use tabtree_ipc::{HostTab, HostWindow};

use crate::core::{HostError, NodeId};

/// Completions of host calls started by effects, fed back into the main loop
#[derive(Debug)]
pub enum Event {
    TabAwakened {
        node_id: NodeId,
        result: Result<HostTab, HostError>,
    },
    WindowAwakened {
        node_id: NodeId,
        result: Result<HostWindow, HostError>,
    },
    HostActionFailed {
        action: String,
        error: HostError,
    },
}
