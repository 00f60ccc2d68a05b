use serde::{Deserialize, Serialize};

pub type NodeId = String;
pub type TabId = u32;
pub type WindowId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElemType {
    Page,
    Window,
    Folder,
    Header,
    Ghost,
    Root,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Loading,
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    #[default]
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

/// Attributes of a page (one browser tab, or a hibernated stand-in for one)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub window_id: Option<WindowId>,
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub opener_tab_id: Option<TabId>,
    #[serde(default)]
    pub index: usize,
    pub url: String,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub placed: bool,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub hibernated: bool,
    #[serde(default)]
    pub restorable: bool,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default)]
    pub session_guid: Option<String>,
}

/// Attributes of a browser window node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub window_id: Option<WindowId>,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default)]
    pub window_type: WindowType,
    #[serde(default)]
    pub hibernated: bool,
    #[serde(default)]
    pub old: bool,
    #[serde(default)]
    pub restorable: bool,
}

/// Kind-specific payload of a node, tagged by `elemType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "elemType", rename_all = "lowercase")]
pub enum NodeData {
    Page(PageInfo),
    Window(WindowInfo),
    Folder { label: String },
    Header { label: String },
    Ghost { ghost_type: ElemType },
    Root,
}

impl NodeData {
    pub fn elem_type(&self) -> ElemType {
        match self {
            NodeData::Page(_) => ElemType::Page,
            NodeData::Window(_) => ElemType::Window,
            NodeData::Folder { .. } => ElemType::Folder,
            NodeData::Header { .. } => ElemType::Header,
            NodeData::Ghost { .. } => ElemType::Ghost,
            NodeData::Root => ElemType::Root,
        }
    }
}

/// One node with its ordered subtree. Used for snapshots and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub uuid: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(flatten)]
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

impl NodeRecord {
    /// Number of records in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }
}

/// Partial node attributes. `None` means "unchanged"; for the nullable host
/// identifiers `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub window_id: Option<Option<WindowId>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub tab_id: Option<Option<TabId>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub opener_tab_id: Option<Option<TabId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hibernated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restorable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incognito: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_type: Option<WindowType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        *self == NodePatch::default()
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_record(id: &str, url: &str, children: Vec<NodeRecord>) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            uuid: format!("uuid-{}", id),
            collapsed: false,
            data: NodeData::Page(PageInfo {
                window_id: Some(1),
                tab_id: Some(7),
                url: url.to_string(),
                ..Default::default()
            }),
            children,
        }
    }

    #[test]
    fn test_record_is_tagged_with_elem_type() {
        let record = page_record("p7", "https://example.com", vec![]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"elemType\":\"page\""));
        assert!(json.contains("\"id\":\"p7\""));
        assert!(!json.contains("children"));
    }

    #[test]
    fn test_nested_record_deserialization() {
        let json = r#"{
            "id": "w1",
            "uuid": "u-w1",
            "elemType": "window",
            "window_id": 1,
            "children": [
                {"id": "p2", "uuid": "u-p2", "elemType": "page", "window_id": 1, "tab_id": 2, "url": "https://a"},
                {"id": "fabc", "uuid": "u-f", "elemType": "folder", "label": "Reading"}
            ]
        }"#;
        let record: NodeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.data.elem_type(), ElemType::Window);
        assert_eq!(record.children.len(), 2);
        assert_eq!(record.count(), 3);
        match &record.children[0].data {
            NodeData::Page(page) => {
                assert_eq!(page.tab_id, Some(2));
                assert_eq!(page.status, PageStatus::Loading);
                assert!(!page.hibernated);
            }
            other => panic!("Expected page, got {:?}", other),
        }
        match &record.children[1].data {
            NodeData::Folder { label } => assert_eq!(label, "Reading"),
            other => panic!("Expected folder, got {:?}", other),
        }
    }

    #[test]
    fn test_patch_serializes_only_changed_keys() {
        let patch = NodePatch {
            title: Some("New".to_string()),
            tab_id: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["title"], "New");
        assert!(obj["tab_id"].is_null());
    }

    #[test]
    fn test_patch_distinguishes_cleared_from_missing() {
        let cleared: NodePatch = serde_json::from_str(r#"{"tab_id": null}"#).unwrap();
        assert_eq!(cleared.tab_id, Some(None));

        let missing: NodePatch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.tab_id, None);
        assert!(missing.is_empty());
    }
}
