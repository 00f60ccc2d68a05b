use tabtree_ipc::{Disposition, NodeData, NodePatch};

use super::super::hibernation::{self, AwakenPlan};
use super::super::{ordering, Node, NodeId, TreeError, TreeResult, ROOT_ID};
use super::{PendingTab, PendingWindow, State};
use crate::effect::Effect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum GroupKind {
    Folder,
    Header,
}

pub(super) fn hibernate(state: &mut State, id: &str) -> TreeResult<Vec<Effect>> {
    let Some(node) = state.tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    let (is_page, is_window) = (node.is_page(), node.is_window());
    let closed: Vec<_> = if is_page {
        hibernation::hibernate_page(&mut state.tree, id)?
            .into_iter()
            .collect()
    } else if is_window {
        hibernation::hibernate_window(&mut state.tree, id)?
    } else {
        return Err(TreeError::WrongKind {
            id: id.to_string(),
            expected: "page or window",
        });
    };
    if closed.is_empty() {
        return Ok(vec![]);
    }
    Ok(vec![Effect::CloseTabs(closed)])
}

pub(super) fn awaken(state: &mut State, id: &str) -> TreeResult<Vec<Effect>> {
    let Some(plan) = hibernation::plan_awaken(&state.tree, id)? else {
        tracing::debug!("{} is already awake", id);
        return Ok(vec![]);
    };
    let node_id = plan.node_id().to_string();
    let already_pending = state.pending_tabs.iter().any(|p| p.node_id == node_id)
        || state.pending_windows.iter().any(|p| p.node_id == node_id);
    if already_pending {
        tracing::debug!("Awakening of {} already in progress", node_id);
        return Ok(vec![]);
    }

    tracing::info!("Awakening {}", node_id);
    let effect = match plan {
        AwakenPlan::Page { node_id, spec } => {
            state.pending_tabs.push(PendingTab {
                node_id: node_id.clone(),
                url: spec.url.clone(),
                window_id: spec.window_id,
            });
            Effect::AwakenPage { node_id, spec }
        }
        AwakenPlan::Window {
            node_id,
            page_ids,
            spec,
        } => {
            state.pending_windows.push_back(PendingWindow {
                node_id: node_id.clone(),
                page_ids,
                urls: spec.urls.clone(),
            });
            Effect::AwakenWindow { node_id, spec }
        }
    };
    Ok(vec![effect])
}

pub(super) fn set_pinned(state: &mut State, id: &str, pinned: bool) -> TreeResult<Vec<Effect>> {
    let Some(node) = state.tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    if !node.is_page() {
        return Err(TreeError::WrongKind {
            id: id.to_string(),
            expected: "page",
        });
    }
    let tab_id = node.tab_id();

    let changed = state.tree.update_node(
        id,
        &NodePatch {
            pinned: Some(pinned),
            ..Default::default()
        },
    )?;
    if changed.pinned.is_none() {
        return Ok(vec![]);
    }
    ordering::enforce(&mut state.tree, id)?;
    Ok(tab_id
        .map(|tab_id| Effect::SetTabPinned { tab_id, pinned })
        .into_iter()
        .collect())
}

pub(super) fn create_group(
    state: &mut State,
    kind: GroupKind,
    label: &str,
    parent: Option<&str>,
) -> TreeResult<NodeId> {
    let parent = match parent {
        Some(parent) => parent.to_string(),
        None => state
            .focused_window()
            .and_then(|w| state.tree.window_by_host(w))
            .cloned()
            .ok_or_else(|| TreeError::NotFound("focused window".to_string()))?,
    };
    if parent == ROOT_ID {
        return Err(TreeError::WrongKind {
            id: parent,
            expected: "non-root parent",
        });
    }

    let node = match kind {
        GroupKind::Folder => Node::folder(label),
        GroupKind::Header => Node::header(label),
    };
    let id = node.id.clone();
    state.tree.add(node, Some(&parent), None)?;
    tracing::info!("Created {:?} {} '{}' under {}", kind, id, label, parent);
    Ok(id)
}

pub(super) fn set_label(state: &mut State, id: &str, label: &str) -> TreeResult<()> {
    match state.tree.get(id).map(|n| n.label().is_some()) {
        Some(true) => {}
        Some(false) => {
            return Err(TreeError::WrongKind {
                id: id.to_string(),
                expected: "folder or header",
            })
        }
        None => return Err(TreeError::NotFound(id.to_string())),
    }
    state.tree.update_node(
        id,
        &NodePatch {
            label: Some(label.to_string()),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// User-driven move. Windows stay directly under the root and everything
/// else stays inside a window; live pages never leave their host window.
pub(super) fn move_node(
    state: &mut State,
    id: &str,
    target: &str,
    disposition: Disposition,
) -> TreeResult<()> {
    if id == ROOT_ID {
        return Err(TreeError::RootImmutable);
    }
    let Some(node) = state.tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    let is_window = node.is_window();
    if !state.tree.contains(target) {
        return Err(TreeError::NotFound(target.to_string()));
    }

    let new_parent = match disposition {
        Disposition::Before | Disposition::After => state
            .tree
            .parent(target)
            .cloned()
            .ok_or(TreeError::RootImmutable)?,
        Disposition::Prepend | Disposition::Append => target.to_string(),
    };
    if is_window != (new_parent == ROOT_ID) {
        return Err(TreeError::InvariantViolation(format!(
            "{} cannot be placed under {}",
            id, new_parent
        )));
    }

    if !is_window {
        let source = state.tree.top_parent(id).map(|w| w.id.clone());
        let destination = state
            .tree
            .get(&new_parent)
            .filter(|n| n.is_window())
            .or_else(|| state.tree.top_parent(&new_parent))
            .map(|w| w.id.clone());
        let carries_live = state.tree.get(id).is_some_and(|n| n.is_live_page())
            || state
                .tree
                .descendants(id)
                .iter()
                .any(|n| n.is_live_page());
        if carries_live && source != destination {
            return Err(TreeError::InvariantViolation(format!(
                "{} holds live tabs and cannot leave its window",
                id
            )));
        }
    }

    match disposition {
        Disposition::Before => state.tree.move_before(id, target)?,
        Disposition::After => state.tree.move_after(id, target)?,
        Disposition::Prepend => state.tree.move_node(id, target, Some(0))?,
        Disposition::Append => state.tree.move_node(id, target, None)?,
    };
    tracing::debug!("Moved {} {:?} {}", id, disposition, target);

    if state.tree.get(id).is_some_and(|n| n.is_page()) {
        state.tree.update_node(
            id,
            &NodePatch {
                placed: Some(true),
                ..Default::default()
            },
        )?;
    }
    if let Some(window) = state.tree.top_parent(id).map(|w| w.id.clone()) {
        ordering::reconcile_window(&mut state.tree, &window)?;
    }
    Ok(())
}

/// Remove nodes that hold no live tab. Children of a purged page move up.
pub(super) fn purge(state: &mut State, id: &str) -> TreeResult<()> {
    let Some(node) = state.tree.get(id) else {
        return Err(TreeError::NotFound(id.to_string()));
    };
    let holds_live = state
        .tree
        .descendants(id)
        .iter()
        .any(|n| n.is_live_page());
    let target = match &node.data {
        NodeData::Root => return Err(TreeError::RootImmutable),
        NodeData::Page(page) if page.hibernated => PurgeTarget::Page,
        NodeData::Ghost { .. } => PurgeTarget::Ghost,
        NodeData::Folder { .. } | NodeData::Header { .. } if !holds_live => PurgeTarget::Subtree,
        NodeData::Window(window) if window.hibernated && !holds_live => PurgeTarget::Subtree,
        _ => {
            return Err(TreeError::InvariantViolation(format!(
                "{} still holds live tabs",
                id
            )))
        }
    };

    match target {
        PurgeTarget::Page => {
            state.tree.promote_children(id)?;
            state.tree.remove(id)?;
        }
        PurgeTarget::Ghost => {
            state.tree.dissolve_ghost(id)?;
            state.detached.retain(|_, ghost| ghost != id);
        }
        PurgeTarget::Subtree => {
            state.tree.remove(id)?;
        }
    }
    state
        .pending_tabs
        .retain(|p| state.tree.contains(&p.node_id));
    state
        .pending_windows
        .retain(|p| state.tree.contains(&p.node_id));

    tracing::info!("Purged {}", id);
    Ok(())
}

enum PurgeTarget {
    Page,
    Ghost,
    Subtree,
}
