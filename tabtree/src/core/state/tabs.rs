use tabtree_ipc::{HostTab, NodePatch, PageStatus, TabChanges};

use super::super::hibernation::attach_tab;
use super::super::{ordering, placement, HostError, Node, NodeId, TabId, TreeResult, WindowId};
use super::windows::ensure_window;
use super::State;
use crate::effect::Effect;

pub(super) fn tab_created(state: &mut State, tab: &HostTab) -> TreeResult<Vec<Effect>> {
    if state.tree.page_by_tab(tab.id).is_some() {
        tracing::debug!("Tab {} already tracked", tab.id);
        return Ok(vec![]);
    }

    let window_node = ensure_window(state, tab.window_id, tab.incognito)?;

    if let Some(node_id) = take_pending_tab(state, tab) {
        if attach_tab(&mut state.tree, &node_id, tab)? {
            ordering::enforce(&mut state.tree, &node_id)?;
            record_activation(state, tab, &node_id)?;
            return Ok(vec![]);
        }
    }

    let id = state.tree.next_page_id(tab.id);
    let node = Node::from_host_tab(id.clone(), tab);

    // Insert at the tab's strip position so deferred pages show up in place
    match live_page_at(state, &window_node, None, tab.index) {
        Some(anchor) => {
            let parent = state.tree.parent(&anchor).cloned();
            let index = state.tree.index_of(&anchor);
            state.tree.add(node, parent.as_deref(), index)?;
        }
        None => {
            state.tree.add(node, Some(&window_node), None)?;
        }
    }
    tracing::debug!("Tab {} created as {}", tab.id, id);

    let has_referrer = tab.referrer.as_deref().is_some_and(|r| !r.is_empty());
    if has_referrer || tab.status == PageStatus::Complete {
        let focused_tab = state.focused_tab();
        placement::place_page(&mut state.tree, &id, focused_tab)?;
    }
    ordering::enforce(&mut state.tree, &id)?;
    record_activation(state, tab, &id)?;
    Ok(vec![])
}

pub(super) fn tab_updated(
    state: &mut State,
    tab_id: TabId,
    changes: &TabChanges,
) -> TreeResult<Vec<Effect>> {
    let Some(id) = state.tree.page_by_tab(tab_id).cloned() else {
        tracing::debug!("Update for unknown tab {}", tab_id);
        return Ok(vec![]);
    };

    let patch = NodePatch {
        url: changes.url.clone(),
        title: changes.title.clone(),
        fav_icon_url: changes.fav_icon_url.clone(),
        status: changes.status,
        pinned: changes.pinned,
        referrer: changes.referrer.clone(),
        session_guid: changes.session_guid.clone(),
        ..Default::default()
    };
    let changed = state.tree.update_node(&id, &patch)?;
    if changed.pinned.is_some() {
        ordering::enforce(&mut state.tree, &id)?;
    }

    let ready = state.tree.get(&id).and_then(|n| n.page()).is_some_and(|p| {
        !p.placed
            && (p.referrer.as_deref().is_some_and(|r| !r.is_empty())
                || p.status == PageStatus::Complete)
    });
    if ready {
        let focused_tab = state.focused_tab();
        placement::place_page(&mut state.tree, &id, focused_tab)?;
        ordering::enforce(&mut state.tree, &id)?;
    }
    Ok(vec![])
}

pub(super) fn tab_moved(
    state: &mut State,
    tab_id: TabId,
    window_id: WindowId,
    to_index: usize,
) -> TreeResult<Vec<Effect>> {
    let Some(id) = state.tree.page_by_tab(tab_id).cloned() else {
        return Ok(vec![]);
    };
    let Some(window_node) = state.tree.window_by_host(window_id).cloned() else {
        tracing::warn!("Tab {} moved within unknown window {}", tab_id, window_id);
        return Ok(vec![]);
    };

    place_in_strip(state, &id, &window_node, to_index)?;
    state.tree.update_node(
        &id,
        &NodePatch {
            index: Some(to_index),
            ..Default::default()
        },
    )?;
    ordering::enforce(&mut state.tree, &id)?;
    Ok(vec![])
}

pub(super) fn tab_removed(state: &mut State, tab_id: TabId) -> TreeResult<Vec<Effect>> {
    state.orphans.remove(&tab_id);
    state.active_tabs.retain(|_, active| *active != tab_id);
    let Some(id) = state.tree.page_by_tab(tab_id).cloned() else {
        tracing::debug!("Removal of unknown tab {}", tab_id);
        return Ok(vec![]);
    };

    state.tree.promote_children(&id)?;
    state.tree.remove(&id)?;
    if let Some(ghost) = state.detached.remove(&id) {
        if state.tree.contains(&ghost) {
            state.tree.dissolve_ghost(&ghost)?;
        }
    }
    tracing::debug!("Tab {} closed, removed {}", tab_id, id);
    Ok(vec![])
}

pub(super) fn tab_activated(
    state: &mut State,
    tab_id: TabId,
    window_id: WindowId,
) -> TreeResult<Vec<Effect>> {
    state.active_tabs.insert(window_id, tab_id);
    if let Some(id) = state.tree.page_by_tab(tab_id).cloned() {
        state.tree.update_node(
            &id,
            &NodePatch {
                unread: Some(false),
                ..Default::default()
            },
        )?;
    }
    Ok(vec![])
}

pub(super) fn tab_detached(state: &mut State, tab_id: TabId) -> TreeResult<Vec<Effect>> {
    let Some(id) = state.tree.page_by_tab(tab_id).cloned() else {
        return Ok(vec![]);
    };
    if state.detached.contains_key(&id) {
        return Ok(vec![]);
    }
    let ghost = state.tree.insert_ghost(&id)?;
    state.active_tabs.retain(|_, active| *active != tab_id);
    state.detached.insert(id, ghost);
    Ok(vec![])
}

pub(super) fn tab_attached(
    state: &mut State,
    tab_id: TabId,
    window_id: WindowId,
    index: usize,
) -> TreeResult<Vec<Effect>> {
    let incognito = match state.tree.page_by_tab(tab_id).and_then(|id| state.tree.get(id)) {
        Some(node) => node.page().is_some_and(|p| p.incognito),
        None => state
            .orphans
            .get(&tab_id)
            .and_then(|r| match &r.data {
                tabtree_ipc::NodeData::Page(page) => Some(page.incognito),
                _ => None,
            })
            .unwrap_or(false),
    };
    let window_node = ensure_window(state, window_id, incognito)?;

    let id = match state.tree.page_by_tab(tab_id).cloned() {
        Some(id) => id,
        None => {
            // Its source window closed while the tab was in flight
            let Some(record) = state.orphans.remove(&tab_id) else {
                tracing::debug!("Attach of unknown tab {}", tab_id);
                return Ok(vec![]);
            };
            state.tree.add_record(&record, Some(&window_node), None)?;
            record.id
        }
    };

    // Children stay behind in the source window
    state.tree.promote_children(&id)?;
    place_in_strip(state, &id, &window_node, index)?;
    if let Some(ghost) = state.detached.remove(&id) {
        if state.tree.contains(&ghost) {
            state.tree.dissolve_ghost(&ghost)?;
        }
    }
    state.tree.update_node(
        &id,
        &NodePatch {
            window_id: Some(Some(window_id)),
            index: Some(index),
            ..Default::default()
        },
    )?;
    ordering::enforce(&mut state.tree, &id)?;
    tracing::debug!("Tab {} attached to window {}", tab_id, window_id);
    Ok(vec![])
}

pub(super) fn complete_tab_awaken(
    state: &mut State,
    node_id: &str,
    result: Result<HostTab, HostError>,
) {
    let was_pending = state.pending_tabs.iter().any(|p| p.node_id == node_id);
    state.pending_tabs.retain(|p| p.node_id != node_id);

    let tab = match result {
        Ok(tab) => tab,
        Err(e) => {
            state.notice(format!("Failed to awaken {}: {}", node_id, e));
            return;
        }
    };
    if !was_pending {
        tracing::debug!("Awakening of {} already completed", node_id);
        return;
    }
    if let Err(e) = finish_tab_awaken(state, node_id, &tab) {
        state.notice(format!("Failed to awaken {}: {}", node_id, e));
    }
}

fn finish_tab_awaken(state: &mut State, node_id: &str, tab: &HostTab) -> TreeResult<()> {
    // The creation notification won the race and produced a duplicate page
    if let Some(duplicate) = state.tree.page_by_tab(tab.id).cloned() {
        if duplicate == node_id {
            return Ok(());
        }
        state.tree.promote_children(&duplicate)?;
        state.tree.remove(&duplicate)?;
    }
    if attach_tab(&mut state.tree, node_id, tab)? {
        ordering::enforce(&mut state.tree, node_id)?;
    }
    Ok(())
}

/// Pending awakening this newly created tab completes, if any
fn take_pending_tab(state: &mut State, tab: &HostTab) -> Option<NodeId> {
    let pos = state.pending_tabs.iter().position(|p| {
        p.url == tab.url && p.window_id.map_or(true, |w| w == tab.window_id)
    })?;
    let pending = state.pending_tabs.remove(pos);
    tracing::debug!("Tab {} completes awakening of {}", tab.id, pending.node_id);
    Some(pending.node_id)
}

fn record_activation(state: &mut State, tab: &HostTab, id: &str) -> TreeResult<()> {
    if tab.active {
        state.active_tabs.insert(tab.window_id, tab.id);
        state.tree.update_node(
            id,
            &NodePatch {
                unread: Some(false),
                ..Default::default()
            },
        )?;
    }
    Ok(())
}

/// Live page at strip position `index` of a window, skipping `exclude` and
/// its subtree
fn live_page_at(
    state: &State,
    window_node: &str,
    exclude: Option<&str>,
    index: usize,
) -> Option<NodeId> {
    state
        .tree
        .window_pages(window_node)
        .into_iter()
        .filter(|n| n.is_live_page())
        .filter(|n| match exclude {
            Some(ex) => n.id != ex && !state.tree.is_ancestor(ex, &n.id),
            None => true,
        })
        .nth(index)
        .map(|n| n.id.clone())
}

/// Move `id` before the live page at strip `index`, or to the window's end
fn place_in_strip(
    state: &mut State,
    id: &str,
    window_node: &str,
    index: usize,
) -> TreeResult<()> {
    match live_page_at(state, window_node, Some(id), index) {
        Some(anchor) => {
            state.tree.move_before(id, &anchor)?;
        }
        None => {
            state.tree.move_node(id, window_node, None)?;
        }
    }
    Ok(())
}
