use tabtree_ipc::{Response, TabId};

use crate::core::NodeId;
use crate::platform::{TabSpec, WindowSpec};

/// Host-side work requested by a state transition. Executed after the state
/// borrow is released; results come back as `Event`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CloseTabs(Vec<TabId>),
    SetTabPinned {
        tab_id: TabId,
        pinned: bool,
    },
    AwakenPage {
        node_id: NodeId,
        spec: TabSpec,
    },
    AwakenWindow {
        node_id: NodeId,
        spec: WindowSpec,
    },
}

pub struct CommandResult {
    pub response: Response,
    pub effects: Vec<Effect>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            response: Response::Ok,
            effects: vec![],
        }
    }

    pub fn ok_with_effects(effects: Vec<Effect>) -> Self {
        Self {
            response: Response::Ok,
            effects,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response: Response::Error {
                message: message.into(),
            },
            effects: vec![],
        }
    }

    pub fn with_response(response: Response) -> Self {
        Self {
            response,
            effects: vec![],
        }
    }
}
