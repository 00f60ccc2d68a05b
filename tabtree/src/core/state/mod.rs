use std::collections::{HashMap, VecDeque};

use super::{Config, FocusHistory, NodeId, TabId, Tree, TreeResult, WindowId};
use crate::effect::Effect;
use crate::event::Event;
use tabtree_ipc::{Disposition, HostEvent, HostTab, HostWindow, NodeRecord, TabChanges, TreeEvent};

mod commands;
mod tabs;
mod windows;

use commands::*;
use tabs::*;
use windows::*;

/// A page awakening waiting for its tab to show up
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTab {
    pub node_id: NodeId,
    pub url: String,
    pub window_id: Option<WindowId>,
}

/// A window awakening waiting for its window to show up
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWindow {
    pub node_id: NodeId,
    pub page_ids: Vec<NodeId>,
    pub urls: Vec<String>,
}

pub struct State {
    pub tree: Tree,
    pub focus: FocusHistory,
    pub config: Config,
    /// Active tab of each host window
    pub active_tabs: HashMap<WindowId, TabId>,
    pub(crate) pending_tabs: Vec<PendingTab>,
    pub(crate) pending_windows: VecDeque<PendingWindow>,
    /// Detached page id -> ghost holding its old position
    pub(crate) detached: HashMap<NodeId, NodeId>,
    /// Detached pages whose source window closed before they were attached
    pub(crate) orphans: HashMap<TabId, NodeRecord>,
    events: Vec<TreeEvent>,
}

impl State {
    pub fn new(config: Config) -> Self {
        Self::with_tree(config, Tree::new())
    }

    pub fn with_tree(config: Config, tree: Tree) -> Self {
        Self {
            tree,
            focus: FocusHistory::new(config.sidebar_window_id),
            config,
            active_tabs: HashMap::new(),
            pending_tabs: Vec::new(),
            pending_windows: VecDeque::new(),
            detached: HashMap::new(),
            orphans: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn focused_window(&self) -> Option<WindowId> {
        self.focus.get_focused(0)
    }

    /// Active tab of the most recently focused window
    pub fn focused_tab(&self) -> Option<TabId> {
        self.focused_window()
            .and_then(|w| self.active_tabs.get(&w).copied())
    }

    pub fn snapshot(&self) -> Vec<NodeRecord> {
        self.tree.snapshot()
    }

    /// Surface a transient message to subscribers
    pub fn notice(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.events.push(TreeEvent::Notice { message });
    }

    pub(crate) fn push_event(&mut self, event: TreeEvent) {
        self.events.push(event);
    }

    /// Tree mutations first, then focus changes and notices
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        let mut events = self.tree.drain_events();
        events.append(&mut self.events);
        events
    }

    pub fn handle_host_event(&mut self, event: &HostEvent) -> TreeResult<Vec<Effect>> {
        match event {
            HostEvent::TabCreated { tab } => self.tab_created(tab),
            HostEvent::TabUpdated { tab_id, changes } => self.tab_updated(*tab_id, changes),
            HostEvent::TabMoved {
                tab_id,
                window_id,
                to_index,
            } => self.tab_moved(*tab_id, *window_id, *to_index),
            HostEvent::TabRemoved { tab_id } => self.tab_removed(*tab_id),
            HostEvent::TabActivated { tab_id, window_id } => {
                self.tab_activated(*tab_id, *window_id)
            }
            HostEvent::TabDetached { tab_id } => self.tab_detached(*tab_id),
            HostEvent::TabAttached {
                tab_id,
                window_id,
                index,
            } => self.tab_attached(*tab_id, *window_id, *index),
            HostEvent::WindowCreated { window } => self.window_created(window),
            HostEvent::WindowRemoved { window_id } => self.window_removed(*window_id),
            HostEvent::FocusChanged { window_id } => {
                self.focus_changed(*window_id);
                Ok(vec![])
            }
            HostEvent::Sync { windows } => self.sync(windows),
        }
    }

    /// Apply the completion of an earlier host call
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::TabAwakened { node_id, result } => {
                self.complete_tab_awaken(&node_id, result);
            }
            Event::WindowAwakened { node_id, result } => {
                self.complete_window_awaken(&node_id, result);
            }
            Event::HostActionFailed { action, error } => {
                self.notice(format!("Failed to {}: {}", action, error));
            }
        }
    }

    // Tab events - delegated to state/tabs.rs

    pub fn tab_created(&mut self, tab: &HostTab) -> TreeResult<Vec<Effect>> {
        tab_created(self, tab)
    }

    pub fn tab_updated(&mut self, tab_id: TabId, changes: &TabChanges) -> TreeResult<Vec<Effect>> {
        tab_updated(self, tab_id, changes)
    }

    pub fn tab_moved(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        to_index: usize,
    ) -> TreeResult<Vec<Effect>> {
        tab_moved(self, tab_id, window_id, to_index)
    }

    pub fn tab_removed(&mut self, tab_id: TabId) -> TreeResult<Vec<Effect>> {
        tab_removed(self, tab_id)
    }

    pub fn tab_activated(&mut self, tab_id: TabId, window_id: WindowId) -> TreeResult<Vec<Effect>> {
        tab_activated(self, tab_id, window_id)
    }

    pub fn tab_detached(&mut self, tab_id: TabId) -> TreeResult<Vec<Effect>> {
        tab_detached(self, tab_id)
    }

    pub fn tab_attached(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        index: usize,
    ) -> TreeResult<Vec<Effect>> {
        tab_attached(self, tab_id, window_id, index)
    }

    pub fn complete_tab_awaken(&mut self, node_id: &str, result: Result<HostTab, super::HostError>) {
        complete_tab_awaken(self, node_id, result)
    }

    // Window events - delegated to state/windows.rs

    pub fn window_created(&mut self, window: &HostWindow) -> TreeResult<Vec<Effect>> {
        window_created(self, window)
    }

    pub fn window_removed(&mut self, window_id: WindowId) -> TreeResult<Vec<Effect>> {
        window_removed(self, window_id)
    }

    pub fn focus_changed(&mut self, window_id: Option<WindowId>) {
        focus_changed(self, window_id)
    }

    pub fn sync(&mut self, windows: &[HostWindow]) -> TreeResult<Vec<Effect>> {
        sync(self, windows)
    }

    pub fn complete_window_awaken(
        &mut self,
        node_id: &str,
        result: Result<HostWindow, super::HostError>,
    ) {
        complete_window_awaken(self, node_id, result)
    }

    // Commands - delegated to state/commands.rs

    pub fn hibernate(&mut self, id: &str) -> TreeResult<Vec<Effect>> {
        hibernate(self, id)
    }

    pub fn awaken(&mut self, id: &str) -> TreeResult<Vec<Effect>> {
        awaken(self, id)
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> TreeResult<Vec<Effect>> {
        set_pinned(self, id, pinned)
    }

    pub fn create_folder(&mut self, label: &str, parent: Option<&str>) -> TreeResult<NodeId> {
        create_group(self, GroupKind::Folder, label, parent)
    }

    pub fn create_header(&mut self, label: &str, parent: Option<&str>) -> TreeResult<NodeId> {
        create_group(self, GroupKind::Header, label, parent)
    }

    pub fn set_label(&mut self, id: &str, label: &str) -> TreeResult<()> {
        set_label(self, id, label)
    }

    pub fn move_node(
        &mut self,
        id: &str,
        target: &str,
        disposition: Disposition,
    ) -> TreeResult<()> {
        move_node(self, id, target, disposition)
    }

    pub fn purge(&mut self, id: &str) -> TreeResult<()> {
        purge(self, id)
    }

    pub fn reconcile(&mut self) -> TreeResult<usize> {
        super::ordering::reconcile_all(&mut self.tree)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
