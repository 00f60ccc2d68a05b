//! Moving pages and windows between live and hibernated states.
//!
//! Hibernation drops the host identity but keeps the node, its id and its
//! position. Awakening is split in two: `plan_awaken` describes what the
//! host must create, and once the host answers, `attach_tab` or
//! `attach_window` re-associates the node. The node may have changed or
//! vanished in between, so both re-validate by id.

use tabtree_ipc::{HostTab, HostWindow, NodePatch};

use super::error::{TreeError, TreeResult};
use super::node::{NodeId, TabId};
use super::tree::Tree;
use crate::platform::{TabSpec, WindowSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum AwakenPlan {
    Page {
        node_id: NodeId,
        spec: TabSpec,
    },
    Window {
        node_id: NodeId,
        /// Hibernated pages to re-associate, in the same order as `spec.urls`
        page_ids: Vec<NodeId>,
        spec: WindowSpec,
    },
}

impl AwakenPlan {
    pub fn node_id(&self) -> &str {
        match self {
            AwakenPlan::Page { node_id, .. } | AwakenPlan::Window { node_id, .. } => node_id,
        }
    }
}

/// Hibernate a live page. Returns the tab id the host should close, or
/// `None` when the page was already hibernated.
pub fn hibernate_page(tree: &mut Tree, id: &str) -> TreeResult<Option<TabId>> {
    let Some(node) = tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    let Some(page) = node.page() else {
        return Err(TreeError::WrongKind {
            id: id.to_string(),
            expected: "page",
        });
    };
    let Some(tab_id) = page.tab_id.filter(|_| !page.hibernated) else {
        return Ok(None);
    };

    tree.update_node(
        id,
        &NodePatch {
            tab_id: Some(None),
            hibernated: Some(true),
            restorable: Some(true),
            ..Default::default()
        },
    )?;
    tracing::info!("Hibernated {} (tab {})", id, tab_id);
    Ok(Some(tab_id))
}

/// Hibernate a window and every live page in it. Returns the tab ids the
/// host should close.
pub fn hibernate_window(tree: &mut Tree, id: &str) -> TreeResult<Vec<TabId>> {
    let Some(node) = tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    if !node.is_window() {
        return Err(TreeError::WrongKind {
            id: id.to_string(),
            expected: "window",
        });
    }
    if node.is_hibernated() {
        return Ok(Vec::new());
    }

    let live: Vec<NodeId> = tree
        .window_pages(id)
        .into_iter()
        .filter(|n| n.is_live_page())
        .map(|n| n.id.clone())
        .collect();
    let mut closed = Vec::with_capacity(live.len());
    for page_id in live {
        if let Some(tab_id) = hibernate_page(tree, &page_id)? {
            closed.push(tab_id);
        }
    }
    mark_window_hibernated(tree, id)?;
    tracing::info!("Hibernated window {} ({} tabs)", id, closed.len());
    Ok(closed)
}

/// Drop the host identity of a window node without touching its pages.
pub fn mark_window_hibernated(tree: &mut Tree, id: &str) -> TreeResult<()> {
    tree.update_node(
        id,
        &NodePatch {
            window_id: Some(None),
            hibernated: Some(true),
            restorable: Some(true),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// Describe what the host must create to awaken `id`. Returns `None` when
/// the node is already live. A page whose window is itself hibernated is
/// awakened through its window.
pub fn plan_awaken(tree: &Tree, id: &str) -> TreeResult<Option<AwakenPlan>> {
    let Some(node) = tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    if node.is_window() {
        return Ok(plan_window(tree, id));
    }
    let Some(page) = node.page() else {
        return Err(TreeError::WrongKind {
            id: id.to_string(),
            expected: "page or window",
        });
    };
    if !page.hibernated {
        return Ok(None);
    }

    let Some(window) = tree.top_parent(id) else {
        return Err(TreeError::InvariantViolation(format!(
            "page {} has no window ancestor",
            id
        )));
    };
    if window.is_hibernated() {
        return Ok(plan_window(tree, &window.id));
    }

    // Strip index: live pages before this one in its window
    let index = tree
        .window_pages(&window.id)
        .into_iter()
        .take_while(|n| n.id != id)
        .filter(|n| n.is_live_page())
        .count();
    Ok(Some(AwakenPlan::Page {
        node_id: id.to_string(),
        spec: TabSpec {
            window_id: window.host_window_id(),
            url: page.url.clone(),
            pinned: page.pinned,
            index: Some(index),
            active: true,
        },
    }))
}

fn plan_window(tree: &Tree, id: &str) -> Option<AwakenPlan> {
    let node = tree.get(id)?;
    let window = node.window()?;
    if !window.hibernated {
        return None;
    }
    let pages: Vec<_> = tree
        .window_pages(id)
        .into_iter()
        .filter_map(|n| {
            let page = n.page()?;
            page.hibernated.then(|| (n.id.clone(), page.url.clone()))
        })
        .collect();
    let (page_ids, urls) = pages.into_iter().unzip();
    Some(AwakenPlan::Window {
        node_id: id.to_string(),
        page_ids,
        spec: WindowSpec {
            urls,
            incognito: window.incognito,
            window_type: window.window_type,
        },
    })
}

/// Re-associate a hibernated page with a freshly created tab. Returns false
/// when the page vanished, is already live, or the tab is owned elsewhere.
pub fn attach_tab(tree: &mut Tree, page_id: &str, tab: &HostTab) -> TreeResult<bool> {
    let Some(node) = tree.get(page_id) else {
        tracing::debug!("Awakened page {} no longer exists", page_id);
        return Ok(false);
    };
    if !node.is_page() {
        return Err(TreeError::WrongKind {
            id: page_id.to_string(),
            expected: "page",
        });
    }
    if !node.is_hibernated() || tree.page_by_tab(tab.id).is_some() {
        return Ok(false);
    }

    tree.update_node(
        page_id,
        &NodePatch {
            tab_id: Some(Some(tab.id)),
            window_id: Some(Some(tab.window_id)),
            hibernated: Some(false),
            restorable: Some(false),
            status: Some(tab.status),
            ..Default::default()
        },
    )?;
    tracing::info!("Awakened {} as tab {}", page_id, tab.id);
    Ok(true)
}

/// Re-associate a hibernated window with a freshly created host window and
/// match its tabs, in strip order, to `page_ids`. Returns the pages left
/// without a tab, or `None` when the window node is gone or already live.
pub fn attach_window(
    tree: &mut Tree,
    window_node: &str,
    window: &HostWindow,
    page_ids: &[NodeId],
) -> TreeResult<Option<Vec<NodeId>>> {
    let Some(node) = tree.get(window_node) else {
        tracing::debug!("Awakened window {} no longer exists", window_node);
        return Ok(None);
    };
    if !node.is_window() {
        return Err(TreeError::WrongKind {
            id: window_node.to_string(),
            expected: "window",
        });
    }
    if !node.is_hibernated() {
        return Ok(None);
    }

    tree.update_node(
        window_node,
        &NodePatch {
            window_id: Some(Some(window.id)),
            hibernated: Some(false),
            old: Some(false),
            restorable: Some(false),
            ..Default::default()
        },
    )?;

    let mut tabs: Vec<&HostTab> = window.tabs.iter().collect();
    tabs.sort_by_key(|t| t.index);
    let mut unmatched = Vec::new();
    let mut tabs = tabs.into_iter();
    for page_id in page_ids {
        let attached = match tabs.next() {
            Some(tab) => attach_tab(tree, page_id, tab)?,
            None => false,
        };
        if !attached && tree.get(page_id).is_some_and(|n| n.is_hibernated()) {
            unmatched.push(page_id.clone());
        }
    }
    tracing::info!("Awakened window {} as {}", window_node, window.id);
    Ok(Some(unmatched))
}
