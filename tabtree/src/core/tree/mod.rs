use std::collections::HashMap;

use tabtree_ipc::{ElemType, NodePatch, NodeRecord, TreeEvent};

use super::error::{TreeError, TreeResult};
use super::node::{Node, NodeId, TabId, WindowId, ROOT_ID};

mod ghost;
mod traversal;

struct Entry {
    node: Node,
    children: Vec<NodeId>,
    /// Insertion order, used as "earliest created" tie-break
    seq: u64,
}

/// Arena of nodes keyed by id. Child lists hold ids, and the parent relation
/// is a separate lookup map, so ownership only ever flows root -> children.
pub struct Tree {
    entries: HashMap<NodeId, Entry>,
    parents: HashMap<NodeId, NodeId>,
    tabs: HashMap<TabId, NodeId>,
    windows: HashMap<WindowId, NodeId>,
    next_seq: u64,
    events: Vec<TreeEvent>,
}

impl Tree {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ROOT_ID.to_string(),
            Entry {
                node: Node::root(),
                children: Vec::new(),
                seq: 0,
            },
        );
        Self {
            entries,
            parents: HashMap::new(),
            tabs: HashMap::new(),
            windows: HashMap::new(),
            next_seq: 1,
            events: Vec::new(),
        }
    }

    pub fn root_id(&self) -> &str {
        ROOT_ID
    }

    /// Number of nodes, including the root
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.entries.get(id).map(|e| &e.node)
    }

    pub fn children(&self, id: &str) -> &[NodeId] {
        self.entries
            .get(id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: &str) -> Option<&NodeId> {
        self.parents.get(id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        let parent = self.parents.get(id)?;
        self.children(parent).iter().position(|c| c == id)
    }

    pub(crate) fn seq(&self, id: &str) -> Option<u64> {
        self.entries.get(id).map(|e| e.seq)
    }

    pub fn page_by_tab(&self, tab_id: TabId) -> Option<&NodeId> {
        self.tabs.get(&tab_id)
    }

    pub fn window_by_host(&self, window_id: WindowId) -> Option<&NodeId> {
        self.windows.get(&window_id)
    }

    /// Take the mutation notifications accumulated since the last drain
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    #[cfg(test)]
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Insert `node` under `parent` (default: root) at `index` (default: end).
    /// Returns the index the node landed at.
    pub fn add(
        &mut self,
        node: Node,
        parent: Option<&str>,
        index: Option<usize>,
    ) -> TreeResult<usize> {
        if self.entries.contains_key(&node.id) {
            return Err(TreeError::DuplicateId(node.id));
        }
        if node.elem_type() == ElemType::Root {
            return Err(TreeError::WrongKind {
                id: node.id,
                expected: "non-root node",
            });
        }
        if !node.host_identity_consistent() {
            return Err(TreeError::InvariantViolation(format!(
                "{} has inconsistent host identity",
                node.id
            )));
        }
        let parent_id = parent.unwrap_or(ROOT_ID).to_string();
        let Some(parent_entry) = self.entries.get(&parent_id) else {
            return Err(TreeError::NotFound(parent_id));
        };
        if let Some(existing) = self.host_index_conflict(&node) {
            return Err(TreeError::DuplicateId(existing));
        }

        let index = index
            .unwrap_or(parent_entry.children.len())
            .min(parent_entry.children.len());
        let id = node.id.clone();
        self.index_host_ids(&node);
        let record = node.to_record(vec![]);

        self.entries.insert(
            id.clone(),
            Entry {
                node,
                children: Vec::new(),
                seq: self.next_seq,
            },
        );
        self.next_seq += 1;
        if let Some(parent_entry) = self.entries.get_mut(&parent_id) {
            parent_entry.children.insert(index, id.clone());
        }
        self.parents.insert(id.clone(), parent_id.clone());

        tracing::debug!("Added {} under {} at {}", id, parent_id, index);
        self.events.push(TreeEvent::NodeAdded {
            parent_id,
            node: record,
            index,
        });
        Ok(index)
    }

    /// Detach `id` and its entire subtree. Removal notifications are emitted
    /// deepest-first. Returns the removed nodes in that same order.
    pub fn remove(&mut self, id: &str) -> TreeResult<Vec<Node>> {
        if id == ROOT_ID {
            return Err(TreeError::RootImmutable);
        }
        if !self.entries.contains_key(id) {
            return Err(TreeError::NotFound(id.to_string()));
        }

        let order = self.post_order_ids(id);
        if let Some(parent) = self.parents.get(id).cloned() {
            if let Some(parent_entry) = self.entries.get_mut(&parent) {
                parent_entry.children.retain(|c| c != id);
            }
        }

        let mut removed = Vec::with_capacity(order.len());
        for node_id in order {
            let Some(entry) = self.entries.remove(&node_id) else {
                continue;
            };
            self.parents.remove(&node_id);
            self.unindex_host_ids(&entry.node);
            self.events.push(TreeEvent::NodeRemoved {
                id: node_id.clone(),
            });
            removed.push(entry.node);
        }
        tracing::debug!("Removed {} ({} nodes)", id, removed.len());
        Ok(removed)
    }

    /// Re-parent `id` under `new_parent` at `index` (default: end), where the
    /// index is interpreted after `id` has been detached.
    pub fn move_node(
        &mut self,
        id: &str,
        new_parent: &str,
        index: Option<usize>,
    ) -> TreeResult<usize> {
        if id == ROOT_ID {
            return Err(TreeError::RootImmutable);
        }
        if !self.entries.contains_key(id) {
            return Err(TreeError::NotFound(id.to_string()));
        }
        if !self.entries.contains_key(new_parent) {
            return Err(TreeError::NotFound(new_parent.to_string()));
        }
        if id == new_parent || self.is_ancestor(id, new_parent) {
            return Err(TreeError::Cycle {
                id: id.to_string(),
                parent: new_parent.to_string(),
            });
        }

        if let Some(old_parent) = self.parents.get(id).cloned() {
            if let Some(old_entry) = self.entries.get_mut(&old_parent) {
                old_entry.children.retain(|c| c != id);
            }
        }

        let Some(parent_entry) = self.entries.get_mut(new_parent) else {
            return Err(TreeError::NotFound(new_parent.to_string()));
        };
        let index = index
            .unwrap_or(parent_entry.children.len())
            .min(parent_entry.children.len());
        parent_entry.children.insert(index, id.to_string());
        self.parents.insert(id.to_string(), new_parent.to_string());

        tracing::debug!("Moved {} under {} at {}", id, new_parent, index);
        self.events.push(TreeEvent::NodeMoved {
            id: id.to_string(),
            new_parent_id: new_parent.to_string(),
            new_index: index,
        });
        Ok(index)
    }

    /// Make `id` the sibling directly before `anchor`.
    pub fn move_before(&mut self, id: &str, anchor: &str) -> TreeResult<usize> {
        let (parent, index) = self.sibling_slot(id, anchor)?;
        self.move_node(id, &parent, Some(index))
    }

    /// Make `id` the sibling directly after `anchor`.
    pub fn move_after(&mut self, id: &str, anchor: &str) -> TreeResult<usize> {
        let (parent, index) = self.sibling_slot(id, anchor)?;
        self.move_node(id, &parent, Some(index + 1))
    }

    /// Parent of `anchor` and its index once `id` has been detached
    fn sibling_slot(&self, id: &str, anchor: &str) -> TreeResult<(NodeId, usize)> {
        if id == anchor {
            return Err(TreeError::Cycle {
                id: id.to_string(),
                parent: anchor.to_string(),
            });
        }
        if !self.entries.contains_key(anchor) {
            return Err(TreeError::NotFound(anchor.to_string()));
        }
        let Some(parent) = self.parents.get(anchor).cloned() else {
            return Err(TreeError::RootImmutable);
        };
        let mut index = self.index_of(anchor).unwrap_or(0);
        if self.parents.get(id) == Some(&parent) {
            if let Some(current) = self.index_of(id) {
                if current < index {
                    index -= 1;
                }
            }
        }
        Ok((parent, index))
    }

    /// Shallow-merge attributes into a node. Emits an update carrying only
    /// the keys that changed, and nothing when no key changed.
    pub fn update_node(&mut self, id: &str, patch: &NodePatch) -> TreeResult<NodePatch> {
        let Some(entry) = self.entries.get(id) else {
            return Err(TreeError::NotFound(id.to_string()));
        };

        let mut updated = entry.node.clone();
        let changed = updated.apply_patch(patch);
        if changed.is_empty() {
            return Ok(changed);
        }
        if !updated.host_identity_consistent() {
            return Err(TreeError::InvariantViolation(format!(
                "update would leave {} with inconsistent host identity",
                id
            )));
        }

        let previous = entry.node.clone();
        if let Some(existing) = self.host_index_conflict(&updated) {
            if existing != id {
                return Err(TreeError::DuplicateId(existing));
            }
        }
        self.unindex_host_ids(&previous);
        self.index_host_ids(&updated);
        if let Some(entry) = self.entries.get_mut(id) {
            entry.node = updated;
        }

        self.events.push(TreeEvent::NodeUpdated {
            id: id.to_string(),
            changes: changed.clone(),
        });
        Ok(changed)
    }

    /// First node in pre-order matching `predicate`
    pub fn find<F>(&self, predicate: F) -> Option<&Node>
    where
        F: Fn(&Node) -> bool,
    {
        self.pre_order_ids(ROOT_ID)
            .into_iter()
            .filter_map(|id| self.get(&id))
            .find(|n| predicate(n))
    }

    /// All nodes matching `predicate`, in pre-order
    pub fn filter<F>(&self, predicate: F) -> Vec<&Node>
    where
        F: Fn(&Node) -> bool,
    {
        self.pre_order_ids(ROOT_ID)
            .into_iter()
            .filter_map(|id| self.get(&id))
            .filter(|n| predicate(n))
            .collect()
    }

    /// Nested record of `id` and its subtree
    pub fn record(&self, id: &str) -> Option<NodeRecord> {
        let entry = self.entries.get(id)?;
        let children = entry
            .children
            .iter()
            .filter_map(|c| self.record(c))
            .collect();
        Some(entry.node.to_record(children))
    }

    /// Ordered top-level records; the root itself is implicit
    pub fn snapshot(&self) -> Vec<NodeRecord> {
        self.children(ROOT_ID)
            .iter()
            .filter_map(|id| self.record(id))
            .collect()
    }

    /// Insert a persisted record and its subtree under `parent`.
    pub fn add_record(
        &mut self,
        record: &NodeRecord,
        parent: Option<&str>,
        index: Option<usize>,
    ) -> TreeResult<()> {
        let node = Node::from_record(record);
        let id = node.id.clone();
        self.add(node, parent, index)?;
        for child in &record.children {
            self.add_record(child, Some(&id), None)?;
        }
        Ok(())
    }

    /// Id for a new page of `tab_id`: `p<tabId>` unless a retained node
    /// (e.g. a hibernated page restored from disk) already owns it.
    pub fn next_page_id(&self, tab_id: TabId) -> NodeId {
        self.unclaimed(super::node::page_node_id(tab_id))
    }

    /// Id for a new window node of `window_id`, see `next_page_id`
    pub fn next_window_id(&self, window_id: WindowId) -> NodeId {
        self.unclaimed(super::node::window_node_id(window_id))
    }

    fn unclaimed(&self, id: NodeId) -> NodeId {
        if !self.entries.contains_key(&id) {
            return id;
        }
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", id, &suffix[..8])
    }

    fn host_index_conflict(&self, node: &Node) -> Option<NodeId> {
        if let Some(tab_id) = node.tab_id() {
            if let Some(existing) = self.tabs.get(&tab_id) {
                if *existing != node.id {
                    return Some(existing.clone());
                }
            }
        }
        if node.is_window() {
            if let Some(window_id) = node.host_window_id() {
                if let Some(existing) = self.windows.get(&window_id) {
                    if *existing != node.id {
                        return Some(existing.clone());
                    }
                }
            }
        }
        None
    }

    fn index_host_ids(&mut self, node: &Node) {
        if let Some(tab_id) = node.tab_id() {
            self.tabs.insert(tab_id, node.id.clone());
        }
        if node.is_window() {
            if let Some(window_id) = node.host_window_id() {
                self.windows.insert(window_id, node.id.clone());
            }
        }
    }

    fn unindex_host_ids(&mut self, node: &Node) {
        if let Some(tab_id) = node.tab_id() {
            if self.tabs.get(&tab_id) == Some(&node.id) {
                self.tabs.remove(&tab_id);
            }
        }
        if node.is_window() {
            if let Some(window_id) = node.host_window_id() {
                if self.windows.get(&window_id) == Some(&node.id) {
                    self.windows.remove(&window_id);
                }
            }
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
