use serde::{Deserialize, Serialize};

use crate::host::{HostEvent, HostReply};
use crate::node::{NodeId, NodeRecord, WindowId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // Browser notifications
    Host {
        event: HostEvent,
    },
    HostReply {
        request_id: u64,
        reply: HostReply,
    },

    // Node operations
    Hibernate {
        id: NodeId,
    },
    Awaken {
        id: NodeId,
    },
    Pin {
        id: NodeId,
    },
    Unpin {
        id: NodeId,
    },
    CreateFolder {
        label: String,
        #[serde(default)]
        parent: Option<NodeId>,
    },
    CreateHeader {
        label: String,
        #[serde(default)]
        parent: Option<NodeId>,
    },
    SetLabel {
        id: NodeId,
        label: String,
    },
    MoveNode {
        id: NodeId,
        target: NodeId,
        disposition: Disposition,
    },
    Purge {
        id: NodeId,
    },
    Reconcile,

    // Queries
    GetTree,
    GetNode {
        id: NodeId,
    },
    FocusedWindow {
        #[serde(default)]
        rank: usize,
    },
    TopFocusableWindow {
        #[serde(default)]
        rank: usize,
    },

    // Control
    Quit,
}

/// Where a moved node lands relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Before,
    After,
    Prepend,
    Append,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Error { message: String },
    Tree { windows: Vec<NodeRecord> },
    Node { node: NodeRecord },
    NodeId { id: NodeId },
    WindowId { id: Option<WindowId> },
}
