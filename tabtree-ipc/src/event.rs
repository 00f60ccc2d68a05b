use serde::{Deserialize, Serialize};

use crate::host::HostRequest;
use crate::node::{NodeId, NodePatch, NodeRecord, WindowId};

/// Event filter for subscribing to specific event types
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Subscribe to tree mutation events (added, removed, updated, moved)
    #[serde(default)]
    pub tree: bool,
    /// Subscribe to window focus events
    #[serde(default)]
    pub focus: bool,
    /// Subscribe to user-facing notices (host failures)
    #[serde(default)]
    pub notice: bool,
    /// Subscribe to requests addressed to the browser bridge
    #[serde(default)]
    pub host: bool,
}

impl EventFilter {
    /// Create a filter that subscribes to all events
    pub fn all() -> Self {
        Self {
            tree: true,
            focus: true,
            notice: true,
            host: true,
        }
    }

    /// Check if the filter matches a given event
    pub fn matches(&self, event: &TreeEvent) -> bool {
        match event {
            TreeEvent::NodeAdded { .. }
            | TreeEvent::NodeRemoved { .. }
            | TreeEvent::NodeUpdated { .. }
            | TreeEvent::NodeMoved { .. } => self.tree,
            TreeEvent::WindowFocused { .. } => self.focus,
            TreeEvent::Notice { .. } => self.notice,
            TreeEvent::HostRequest { .. } => self.host,
            TreeEvent::Snapshot { .. } => true, // Snapshots always pass filter
        }
    }

    /// Check if any filter is set
    pub fn any(&self) -> bool {
        self.tree || self.focus || self.notice || self.host
    }
}

/// Request to subscribe to tree events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Whether to send a snapshot on connection
    #[serde(default)]
    pub snapshot: bool,
    /// Event filter (if not set or all false, subscribes to all events)
    #[serde(default)]
    pub filter: EventFilter,
}

impl SubscribeRequest {
    /// Get the effective filter (all if none specified)
    pub fn effective_filter(&self) -> EventFilter {
        if self.filter.any() {
            self.filter.clone()
        } else {
            EventFilter::all()
        }
    }
}

/// Tree change events sent to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    // Tree mutations
    NodeAdded {
        parent_id: NodeId,
        node: NodeRecord,
        index: usize,
    },
    NodeRemoved {
        id: NodeId,
    },
    NodeUpdated {
        id: NodeId,
        changes: NodePatch,
    },
    NodeMoved {
        id: NodeId,
        new_parent_id: NodeId,
        new_index: usize,
    },

    // Focus
    WindowFocused {
        window_id: Option<WindowId>,
    },

    // Transient user-facing message
    Notice {
        message: String,
    },

    // Browser bridge request
    HostRequest {
        request_id: u64,
        request: HostRequest,
    },

    // Full snapshot
    Snapshot {
        windows: Vec<NodeRecord>,
    },
}
