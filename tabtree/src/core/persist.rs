//! Tree snapshot on disk: a pretty-printed JSON array of top-level window
//! records, each with its nested children.

use std::path::Path;

use anyhow::{Context, Result};
use tabtree_ipc::{NodeData, NodeRecord};

use super::tree::Tree;

/// Read a snapshot. A missing file is an empty session, not an error.
pub fn load(path: &Path) -> Result<Option<Vec<NodeRecord>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<NodeRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(records))
}

/// Write a snapshot atomically (temp file, then rename).
pub fn save(path: &Path, records: &[NodeRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    tracing::debug!("Saved {} windows to {}", records.len(), path.display());
    Ok(())
}

/// Build a tree from records left by a previous run. Nothing from that run
/// is live any more: pages become hibernated and restorable, windows become
/// hibernated `old` windows waiting to be adopted, and ghosts are dissolved.
pub fn restore(records: Vec<NodeRecord>) -> Tree {
    let mut tree = Tree::new();
    for record in records.into_iter().flat_map(into_restored) {
        let id = record.id.clone();
        if let Err(e) = tree.add_record(&record, None, None) {
            tracing::warn!("Skipping persisted node {}: {}", id, e);
        }
    }
    tree.drain_events();
    tracing::info!("Restored {} nodes", tree.len() - 1);
    tree
}

/// Convert one record (and its subtree) to its restored form. A ghost is
/// replaced by its children, hence the list.
fn into_restored(mut record: NodeRecord) -> Vec<NodeRecord> {
    let children = std::mem::take(&mut record.children);
    let children: Vec<NodeRecord> = children.into_iter().flat_map(into_restored).collect();

    match &mut record.data {
        NodeData::Ghost { .. } => return children,
        NodeData::Page(page) => {
            if !page.hibernated {
                page.restorable = true;
            }
            page.hibernated = true;
            page.tab_id = None;
        }
        NodeData::Window(window) => {
            window.window_id = None;
            window.hibernated = true;
            window.old = true;
            window.restorable = true;
        }
        NodeData::Folder { .. } | NodeData::Header { .. } | NodeData::Root => {}
    }
    record.children = children;
    vec![record]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{page_node_id, Node};
    use crate::platform::mock::{create_test_tab, create_test_window};

    fn setup_tree() -> Tree {
        // w1 -> [p1 -> [g -> [p2]], f]
        let mut tree = Tree::new();
        tree.add(Node::from_host_window(&create_test_window(1, vec![])), None, None)
            .unwrap();
        for (tab_id, parent) in [(1, "w1"), (2, "p1")] {
            let tab = create_test_tab(tab_id, 1, &format!("https://t{}", tab_id));
            tree.add(Node::from_host_tab(page_node_id(tab_id), &tab), Some(parent), None)
                .unwrap();
        }
        tree.insert_ghost("p2").unwrap();
        tree.add(Node::folder("Later"), Some("w1"), None).unwrap();
        tree
    }

    #[test]
    fn test_restore_hibernates_everything() {
        let tree = setup_tree();
        let restored = restore(tree.snapshot());

        let window = restored.get("w1").unwrap().window().unwrap();
        assert!(window.hibernated);
        assert!(window.old);
        assert_eq!(window.window_id, None);
        assert!(restored.window_by_host(1).is_none());

        for id in ["p1", "p2"] {
            let node = restored.get(id).unwrap();
            let page = node.page().unwrap();
            assert!(page.hibernated);
            assert!(page.restorable);
            assert_eq!(page.tab_id, None);
        }
        assert!(restored.page_by_tab(1).is_none());
        assert!(!restored.has_pending_events());
    }

    #[test]
    fn test_restore_dissolves_ghosts() {
        let tree = setup_tree();
        let restored = restore(tree.snapshot());
        assert_eq!(restored.children("p1"), &["p2".to_string()]);
        assert!(restored
            .filter(|n| n.elem_type() == tabtree_ipc::ElemType::Ghost)
            .is_empty());
        assert_eq!(restored.len(), tree.len() - 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("tabtree-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("tree.json");
        assert_eq!(load(&path).unwrap(), None);

        let tree = setup_tree();
        save(&path, &tree.snapshot()).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, tree.snapshot());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = std::env::temp_dir().join(format!("tabtree-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tree.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
