use tabtree_ipc::{
    ElemType, HostTab, HostWindow, NodeData, NodePatch, NodeRecord, PageInfo, WindowInfo,
};
use uuid::Uuid;

pub use tabtree_ipc::{NodeId, TabId, WindowId};

pub const ROOT_ID: &str = "R";

pub fn page_node_id(tab_id: TabId) -> NodeId {
    format!("p{}", tab_id)
}

pub fn window_node_id(window_id: WindowId) -> NodeId {
    format!("w{}", window_id)
}

/// URL without its `#fragment`
pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub uuid: Uuid,
    pub collapsed: bool,
    pub data: NodeData,
}

impl Node {
    fn new(id: NodeId, data: NodeData) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            collapsed: false,
            data,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_ID.to_string(), NodeData::Root)
    }

    pub fn from_host_tab(id: NodeId, tab: &HostTab) -> Self {
        Self::new(
            id,
            NodeData::Page(PageInfo {
                window_id: Some(tab.window_id),
                tab_id: Some(tab.id),
                opener_tab_id: tab.opener_tab_id,
                index: tab.index,
                url: tab.url.clone(),
                referrer: tab.referrer.clone(),
                fav_icon_url: tab.fav_icon_url.clone(),
                title: tab.title.clone(),
                status: tab.status,
                pinned: tab.pinned,
                placed: false,
                unread: !tab.active,
                hibernated: false,
                restorable: false,
                incognito: tab.incognito,
                session_guid: tab.session_guid.clone(),
            }),
        )
    }

    pub fn from_host_window(window: &HostWindow) -> Self {
        Self::new(
            window_node_id(window.id),
            NodeData::Window(WindowInfo {
                window_id: Some(window.id),
                incognito: window.incognito,
                window_type: window.window_type,
                hibernated: false,
                old: false,
                restorable: false,
            }),
        )
    }

    pub fn folder(label: impl Into<String>) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            id: format!("f{}", uuid.simple()),
            uuid,
            collapsed: false,
            data: NodeData::Folder {
                label: label.into(),
            },
        }
    }

    pub fn header(label: impl Into<String>) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            id: format!("h{}", uuid.simple()),
            uuid,
            collapsed: false,
            data: NodeData::Header {
                label: label.into(),
            },
        }
    }

    pub fn ghost(ghost_type: ElemType) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            id: format!("g{}", uuid.simple()),
            uuid,
            collapsed: false,
            data: NodeData::Ghost { ghost_type },
        }
    }

    /// Build a node from a persisted record, ignoring its children.
    pub fn from_record(record: &NodeRecord) -> Self {
        Self {
            id: record.id.clone(),
            uuid: Uuid::parse_str(&record.uuid).unwrap_or_else(|_| Uuid::new_v4()),
            collapsed: record.collapsed,
            data: record.data.clone(),
        }
    }

    pub fn to_record(&self, children: Vec<NodeRecord>) -> NodeRecord {
        NodeRecord {
            id: self.id.clone(),
            uuid: self.uuid.to_string(),
            collapsed: self.collapsed,
            data: self.data.clone(),
            children,
        }
    }

    pub fn elem_type(&self) -> ElemType {
        self.data.elem_type()
    }

    pub fn page(&self) -> Option<&PageInfo> {
        match &self.data {
            NodeData::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn window(&self) -> Option<&WindowInfo> {
        match &self.data {
            NodeData::Window(window) => Some(window),
            _ => None,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self.data, NodeData::Page(_))
    }

    pub fn is_window(&self) -> bool {
        matches!(self.data, NodeData::Window(_))
    }

    pub fn tab_id(&self) -> Option<TabId> {
        self.page().and_then(|p| p.tab_id)
    }

    /// Host window id of a page or window node
    pub fn host_window_id(&self) -> Option<WindowId> {
        match &self.data {
            NodeData::Page(page) => page.window_id,
            NodeData::Window(window) => window.window_id,
            _ => None,
        }
    }

    pub fn is_hibernated(&self) -> bool {
        match &self.data {
            NodeData::Page(page) => page.hibernated,
            NodeData::Window(window) => window.hibernated,
            _ => false,
        }
    }

    /// A page backed by a live browser tab
    pub fn is_live_page(&self) -> bool {
        self.page().is_some_and(|p| !p.hibernated)
    }

    pub fn is_pinned(&self) -> bool {
        self.page().is_some_and(|p| p.pinned)
    }

    pub fn label(&self) -> Option<&str> {
        match &self.data {
            NodeData::Folder { label } | NodeData::Header { label } => Some(label),
            _ => None,
        }
    }

    /// Shallow-merge `patch` into this node. Attributes that do not apply to
    /// the node's kind are ignored. Returns only the keys whose value changed.
    pub fn apply_patch(&mut self, patch: &NodePatch) -> NodePatch {
        let mut changed = NodePatch::default();
        merge(&mut self.collapsed, &patch.collapsed, &mut changed.collapsed);

        match &mut self.data {
            NodeData::Page(page) => {
                merge(&mut page.window_id, &patch.window_id, &mut changed.window_id);
                merge(&mut page.tab_id, &patch.tab_id, &mut changed.tab_id);
                merge(
                    &mut page.opener_tab_id,
                    &patch.opener_tab_id,
                    &mut changed.opener_tab_id,
                );
                merge(&mut page.index, &patch.index, &mut changed.index);
                merge(&mut page.url, &patch.url, &mut changed.url);
                merge_some(&mut page.referrer, &patch.referrer, &mut changed.referrer);
                merge_some(
                    &mut page.fav_icon_url,
                    &patch.fav_icon_url,
                    &mut changed.fav_icon_url,
                );
                merge(&mut page.title, &patch.title, &mut changed.title);
                merge(&mut page.status, &patch.status, &mut changed.status);
                merge(&mut page.pinned, &patch.pinned, &mut changed.pinned);
                merge(&mut page.placed, &patch.placed, &mut changed.placed);
                merge(&mut page.unread, &patch.unread, &mut changed.unread);
                merge(&mut page.hibernated, &patch.hibernated, &mut changed.hibernated);
                merge(&mut page.restorable, &patch.restorable, &mut changed.restorable);
                merge(&mut page.incognito, &patch.incognito, &mut changed.incognito);
                merge_some(
                    &mut page.session_guid,
                    &patch.session_guid,
                    &mut changed.session_guid,
                );
            }
            NodeData::Window(window) => {
                merge(&mut window.window_id, &patch.window_id, &mut changed.window_id);
                merge(&mut window.incognito, &patch.incognito, &mut changed.incognito);
                merge(
                    &mut window.window_type,
                    &patch.window_type,
                    &mut changed.window_type,
                );
                merge(&mut window.hibernated, &patch.hibernated, &mut changed.hibernated);
                merge(&mut window.old, &patch.old, &mut changed.old);
                merge(&mut window.restorable, &patch.restorable, &mut changed.restorable);
            }
            NodeData::Folder { label } | NodeData::Header { label } => {
                merge(label, &patch.label, &mut changed.label);
            }
            NodeData::Ghost { .. } | NodeData::Root => {}
        }

        changed
    }

    /// Hibernated nodes have no host identity; live ones always have one.
    pub fn host_identity_consistent(&self) -> bool {
        match &self.data {
            NodeData::Page(page) => page.hibernated == page.tab_id.is_none(),
            NodeData::Window(window) => !window.hibernated || window.window_id.is_none(),
            _ => true,
        }
    }
}

fn merge<T: PartialEq + Clone>(field: &mut T, value: &Option<T>, changed: &mut Option<T>) {
    if let Some(value) = value {
        if field != value {
            *field = value.clone();
            *changed = Some(value.clone());
        }
    }
}

fn merge_some<T: PartialEq + Clone>(
    field: &mut Option<T>,
    value: &Option<T>,
    changed: &mut Option<T>,
) {
    if let Some(value) = value {
        if field.as_ref() != Some(value) {
            *field = Some(value.clone());
            *changed = Some(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabtree_ipc::PageStatus;

    fn test_tab(id: TabId) -> HostTab {
        HostTab {
            id,
            window_id: 1,
            url: "https://example.com/a#top".to_string(),
            title: "A".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_id_prefixes() {
        assert_eq!(page_node_id(42), "p42");
        assert_eq!(window_node_id(3), "w3");
        assert!(Node::folder("x").id.starts_with('f'));
        assert!(Node::header("x").id.starts_with('h'));
        assert!(Node::ghost(ElemType::Page).id.starts_with('g'));
    }

    #[test]
    fn test_uuid_independent_of_id() {
        let a = Node::from_host_tab(page_node_id(1), &test_tab(1));
        let b = Node::from_host_tab(page_node_id(1), &test_tab(1));
        assert_eq!(a.id, b.id);
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn test_from_host_tab_starts_unplaced() {
        let node = Node::from_host_tab(page_node_id(5), &test_tab(5));
        let page = node.page().unwrap();
        assert_eq!(page.tab_id, Some(5));
        assert!(!page.placed);
        assert!(page.unread);
        assert!(node.is_live_page());
        assert!(node.host_identity_consistent());
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("https://a/b#c"), "https://a/b");
        assert_eq!(strip_fragment("https://a/b"), "https://a/b");
        assert_eq!(strip_fragment("#only"), "");
    }

    #[test]
    fn test_apply_patch_reports_only_changed_keys() {
        let mut node = Node::from_host_tab(page_node_id(5), &test_tab(5));
        let patch = NodePatch {
            title: Some("A".to_string()),
            status: Some(PageStatus::Complete),
            label: Some("ignored".to_string()),
            ..Default::default()
        };
        let changed = node.apply_patch(&patch);
        assert_eq!(changed.title, None);
        assert_eq!(changed.status, Some(PageStatus::Complete));
        assert_eq!(changed.label, None);
        assert_eq!(node.page().unwrap().status, PageStatus::Complete);
    }

    #[test]
    fn test_apply_patch_clears_tab_id() {
        let mut node = Node::from_host_tab(page_node_id(5), &test_tab(5));
        let changed = node.apply_patch(&NodePatch {
            tab_id: Some(None),
            hibernated: Some(true),
            ..Default::default()
        });
        assert_eq!(changed.tab_id, Some(None));
        assert_eq!(node.tab_id(), None);
        assert!(node.host_identity_consistent());
    }

    #[test]
    fn test_record_round_trip_keeps_uuid() {
        let folder = Node::folder("Reading");
        let record = folder.to_record(vec![]);
        let restored = Node::from_record(&record);
        assert_eq!(restored, folder);
    }
}
