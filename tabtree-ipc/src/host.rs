use serde::{Deserialize, Serialize};

use crate::node::{PageStatus, TabId, WindowId, WindowType};

/// A live tab as reported by the browser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostTab {
    pub id: TabId,
    pub window_id: WindowId,
    #[serde(default)]
    pub index: usize,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default)]
    pub opener_tab_id: Option<TabId>,
    /// Referrer reported by the page, if already known at creation time
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub session_guid: Option<String>,
}

/// A live window as reported by the browser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostWindow {
    pub id: WindowId,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default)]
    pub window_type: WindowType,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub tabs: Vec<HostTab>,
}

/// Fields of a tab that changed, as delivered by a tab-updated notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_guid: Option<String>,
}

/// Tab and window lifecycle notifications from the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    TabCreated {
        tab: HostTab,
    },
    TabUpdated {
        tab_id: TabId,
        changes: TabChanges,
    },
    TabMoved {
        tab_id: TabId,
        window_id: WindowId,
        to_index: usize,
    },
    TabRemoved {
        tab_id: TabId,
    },
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
    },
    TabDetached {
        tab_id: TabId,
    },
    TabAttached {
        tab_id: TabId,
        window_id: WindowId,
        index: usize,
    },
    WindowCreated {
        window: HostWindow,
    },
    WindowRemoved {
        window_id: WindowId,
    },
    FocusChanged {
        window_id: Option<WindowId>,
    },
    /// Full resynchronization with every open window and its tabs
    Sync {
        windows: Vec<HostWindow>,
    },
}

/// Actions the daemon asks the browser to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRequest {
    GetWindow {
        window_id: WindowId,
    },
    CreateTab {
        window_id: Option<WindowId>,
        url: String,
        pinned: bool,
        index: Option<usize>,
        active: bool,
    },
    CreateWindow {
        urls: Vec<String>,
        incognito: bool,
        window_type: WindowType,
    },
    RemoveTab {
        tab_id: TabId,
    },
    UpdateTab {
        tab_id: TabId,
        pinned: bool,
    },
}

/// Browser answer to a `HostRequest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostReply {
    Ok,
    Error { message: String },
    Tab { tab: HostTab },
    Window { window: HostWindow },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_event_tab_created_deserialization() {
        let json = r#"{"type":"tab_created","tab":{"id":5,"window_id":1,"url":"https://a","pinned":true}}"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();
        match event {
            HostEvent::TabCreated { tab } => {
                assert_eq!(tab.id, 5);
                assert_eq!(tab.window_id, 1);
                assert!(tab.pinned);
                assert_eq!(tab.referrer, None);
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_tab_changes_skip_unset_fields() {
        let changes = TabChanges {
            status: Some(PageStatus::Complete),
            ..Default::default()
        };
        let json = serde_json::to_string(&changes).unwrap();
        assert_eq!(json, "{\"status\":\"complete\"}");
    }

    #[test]
    fn test_host_request_serialization() {
        let request = HostRequest::CreateTab {
            window_id: Some(3),
            url: "https://x".to_string(),
            pinned: true,
            index: None,
            active: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"type\":\"create_tab\""));
        assert!(json.contains("\"pinned\":true"));

        let reply: HostReply =
            serde_json::from_str(r#"{"type":"error","message":"denied"}"#).unwrap();
        assert_eq!(
            reply,
            HostReply::Error {
                message: "denied".to_string()
            }
        );
    }
}
