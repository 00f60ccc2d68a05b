use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tabtree_ipc::{
    HostReply, HostRequest, HostTab, HostWindow, TabId, TreeEvent, WindowId, WindowType,
};
use tokio::sync::oneshot;

use crate::core::HostError;
use crate::ipc::EventBroadcaster;

/// Tab the browser should open
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabSpec {
    pub window_id: Option<WindowId>,
    pub url: String,
    pub pinned: bool,
    pub index: Option<usize>,
    pub active: bool,
}

/// Window the browser should open, with one tab per URL
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    pub urls: Vec<String>,
    pub incognito: bool,
    pub window_type: WindowType,
}

impl From<TabSpec> for HostRequest {
    fn from(spec: TabSpec) -> Self {
        HostRequest::CreateTab {
            window_id: spec.window_id,
            url: spec.url,
            pinned: spec.pinned,
            index: spec.index,
            active: spec.active,
        }
    }
}

impl From<WindowSpec> for HostRequest {
    fn from(spec: WindowSpec) -> Self {
        HostRequest::CreateWindow {
            urls: spec.urls,
            incognito: spec.incognito,
            window_type: spec.window_type,
        }
    }
}

/// Trait for querying and driving the browser.
/// This abstraction allows mocking in tests.
#[async_trait(?Send)]
pub trait BrowserHost {
    async fn get_window(&self, window_id: WindowId) -> Result<HostWindow, HostError>;
    async fn create_tab(&self, spec: TabSpec) -> Result<HostTab, HostError>;
    async fn create_window(&self, spec: WindowSpec) -> Result<HostWindow, HostError>;
    async fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError>;
    async fn update_tab(&self, tab_id: TabId, pinned: bool) -> Result<(), HostError>;
}

pub type PendingReplies = Rc<RefCell<HashMap<u64, oneshot::Sender<HostReply>>>>;

/// Host implementation that forwards requests to the browser-side bridge.
/// Requests go out as `TreeEvent::HostRequest` on the event stream; the
/// bridge answers with `Command::HostReply`, routed back via `resolve`.
pub struct BridgeHost {
    broadcaster: EventBroadcaster,
    pending: PendingReplies,
    next_request_id: Cell<u64>,
    timeout: Duration,
}

impl BridgeHost {
    pub fn new(broadcaster: EventBroadcaster, timeout: Duration) -> Self {
        Self {
            broadcaster,
            pending: Rc::new(RefCell::new(HashMap::new())),
            next_request_id: Cell::new(1),
            timeout,
        }
    }

    pub fn pending(&self) -> PendingReplies {
        self.pending.clone()
    }

    /// Hand a bridge reply to the request waiting for it.
    /// Returns false for unknown (or already timed out) request ids.
    pub fn resolve(pending: &PendingReplies, request_id: u64, reply: HostReply) -> bool {
        let Some(tx) = pending.borrow_mut().remove(&request_id) else {
            tracing::debug!("Reply for unknown host request {}", request_id);
            return false;
        };
        tx.send(reply).is_ok()
    }

    async fn request(&self, request: HostRequest) -> Result<HostReply, HostError> {
        let request_id = self.next_request_id.get();
        self.next_request_id.set(request_id + 1);

        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(request_id, tx);
        tracing::debug!("Host request {}: {:?}", request_id, request);
        self.broadcaster.send(TreeEvent::HostRequest {
            request_id,
            request,
        });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(HostReply::Error { message })) => Err(HostError::Failed(message)),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(HostError::Disconnected),
            Err(_) => {
                self.pending.borrow_mut().remove(&request_id);
                tracing::warn!("Host request {} timed out", request_id);
                Err(HostError::Timeout)
            }
        }
    }
}

fn unexpected(reply: HostReply) -> HostError {
    HostError::Failed(format!("Unexpected host reply: {:?}", reply))
}

#[async_trait(?Send)]
impl BrowserHost for BridgeHost {
    async fn get_window(&self, window_id: WindowId) -> Result<HostWindow, HostError> {
        match self.request(HostRequest::GetWindow { window_id }).await? {
            HostReply::Window { window } => Ok(window),
            other => Err(unexpected(other)),
        }
    }

    async fn create_tab(&self, spec: TabSpec) -> Result<HostTab, HostError> {
        match self.request(spec.into()).await? {
            HostReply::Tab { tab } => Ok(tab),
            other => Err(unexpected(other)),
        }
    }

    async fn create_window(&self, spec: WindowSpec) -> Result<HostWindow, HostError> {
        match self.request(spec.into()).await? {
            HostReply::Window { window } => Ok(window),
            other => Err(unexpected(other)),
        }
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        match self.request(HostRequest::RemoveTab { tab_id }).await? {
            HostReply::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn update_tab(&self, tab_id: TabId, pinned: bool) -> Result<(), HostError> {
        match self.request(HostRequest::UpdateTab { tab_id, pinned }).await? {
            HostReply::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}
