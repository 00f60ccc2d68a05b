use std::collections::HashSet;

use tabtree_ipc::{HostTab, HostWindow, NodeData, NodePatch, TreeEvent};

use super::super::hibernation::{attach_window, mark_window_hibernated};
use super::super::{ordering, HostError, Node, NodeId, TreeResult, WindowId};
use super::tabs::{tab_attached, tab_created, tab_removed};
use super::{PendingTab, PendingWindow, State};
use crate::effect::Effect;

/// Window node for host window `window_id`, creating it when unknown.
/// A bare window id says nothing about its tabs, so a pending window
/// awakening is left for `window_created` or `complete_window_awaken`.
pub(super) fn ensure_window(
    state: &mut State,
    window_id: WindowId,
    incognito: bool,
) -> TreeResult<NodeId> {
    if let Some(id) = state.tree.window_by_host(window_id) {
        return Ok(id.clone());
    }

    let host_window = HostWindow {
        id: window_id,
        incognito,
        ..Default::default()
    };
    add_window(state, &host_window)
}

fn add_window(state: &mut State, window: &HostWindow) -> TreeResult<NodeId> {
    let mut node = Node::from_host_window(window);
    node.id = state.tree.next_window_id(window.id);
    let id = node.id.clone();
    state.tree.add(node, None, None)?;
    tracing::debug!("Window {} created as {}", window.id, id);
    Ok(id)
}

pub(super) fn window_created(state: &mut State, window: &HostWindow) -> TreeResult<Vec<Effect>> {
    if state.tree.window_by_host(window.id).is_some() {
        tracing::debug!("Window {} already tracked", window.id);
        return Ok(vec![]);
    }

    if let Some(pending) = take_pending_window(state, window) {
        if adopt_window(state, pending, window)?.is_some() {
            return Ok(vec![]);
        }
    }

    add_window(state, window)?;
    for tab in sorted_tabs(window) {
        tab_created(state, tab)?;
    }
    Ok(vec![])
}

pub(super) fn window_removed(state: &mut State, window_id: WindowId) -> TreeResult<Vec<Effect>> {
    state.focus.remove(window_id);
    state.active_tabs.remove(&window_id);
    state.pending_tabs.retain(|p| p.window_id != Some(window_id));
    let Some(node_id) = state.tree.window_by_host(window_id).cloned() else {
        tracing::debug!("Removal of unknown window {}", window_id);
        return Ok(vec![]);
    };

    // Pages dragged out of this window are still on their way elsewhere
    let in_flight: Vec<(NodeId, NodeId)> = state
        .detached
        .iter()
        .filter(|(_, ghost)| state.tree.is_ancestor(&node_id, ghost))
        .map(|(page, ghost)| (page.clone(), ghost.clone()))
        .collect();
    for (page_id, _) in in_flight {
        state.detached.remove(&page_id);
        state.tree.promote_children(&page_id)?;
        let record = state.tree.record(&page_id);
        state.tree.remove(&page_id)?;
        if let Some(record) = record {
            if let NodeData::Page(page) = &record.data {
                if let Some(tab_id) = page.tab_id {
                    state.orphans.insert(tab_id, record.clone());
                }
            }
        }
    }

    let live: Vec<NodeId> = state
        .tree
        .window_pages(&node_id)
        .into_iter()
        .filter(|n| n.is_live_page())
        .map(|n| n.id.clone())
        .collect();
    for page_id in &live {
        state.tree.promote_children(page_id)?;
        state.tree.remove(page_id)?;
    }

    let ghosts: Vec<NodeId> = state
        .tree
        .descendants(&node_id)
        .into_iter()
        .filter(|n| matches!(n.data, NodeData::Ghost { .. }))
        .map(|n| n.id.clone())
        .collect();
    for ghost in ghosts {
        if state.tree.contains(&ghost) {
            state.tree.dissolve_ghost(&ghost)?;
        }
    }

    if state.tree.children(&node_id).is_empty() {
        state.tree.remove(&node_id)?;
        tracing::info!("Window {} closed", window_id);
    } else {
        mark_window_hibernated(&mut state.tree, &node_id)?;
        tracing::info!(
            "Window {} closed, {} kept as hibernated",
            window_id,
            node_id
        );
    }
    Ok(vec![])
}

pub(super) fn focus_changed(state: &mut State, window_id: Option<WindowId>) {
    match window_id {
        Some(id) => {
            if state.focus.set_focused(id) {
                tracing::info!("Window focused: {}", id);
                state.push_event(TreeEvent::WindowFocused {
                    window_id: Some(id),
                });
            }
        }
        None => {
            if !state.focus.is_any_focused() {
                return;
            }
            state.focus.clear_focus();
            tracing::debug!("Focus left the browser");
            state.push_event(TreeEvent::WindowFocused { window_id: None });
        }
    }
}

/// Bring the tree in line with the full set of open host windows
pub(super) fn sync(state: &mut State, windows: &[HostWindow]) -> TreeResult<Vec<Effect>> {
    let host_ids: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();

    for window in windows {
        if let Some(node_id) = state.tree.window_by_host(window.id).cloned() {
            sync_window_tabs(state, &node_id, window)?;
        } else if let Some((old_id, page_ids)) = find_old_window(state, window) {
            tracing::info!("Window {} adopts restored {}", window.id, old_id);
            attach_window(&mut state.tree, &old_id, window, &page_ids)?;
            sync_window_tabs(state, &old_id, window)?;
        } else {
            window_created(state, window)?;
        }
        for tab in window.tabs.iter().filter(|t| t.active) {
            state.active_tabs.insert(window.id, tab.id);
        }
    }

    let vanished: Vec<WindowId> = state
        .tree
        .children(state.tree.root_id())
        .iter()
        .filter_map(|id| state.tree.get(id))
        .filter(|n| n.is_window())
        .filter_map(|n| n.host_window_id())
        .filter(|id| !host_ids.contains(id))
        .collect();
    for window_id in vanished {
        window_removed(state, window_id)?;
    }

    if let Some(focused) = windows.iter().find(|w| w.focused) {
        focus_changed(state, Some(focused.id));
    }

    ordering::reconcile_all(&mut state.tree)?;
    tracing::info!("Synced {} windows", windows.len());
    Ok(vec![])
}

pub(super) fn complete_window_awaken(
    state: &mut State,
    node_id: &str,
    result: Result<HostWindow, HostError>,
) {
    let pending = state
        .pending_windows
        .iter()
        .position(|p| p.node_id == node_id)
        .and_then(|pos| state.pending_windows.remove(pos));

    let window = match result {
        Ok(window) => window,
        Err(e) => {
            state.notice(format!("Failed to awaken window {}: {}", node_id, e));
            return;
        }
    };
    let Some(pending) = pending else {
        tracing::debug!("Awakening of window {} already completed", node_id);
        return;
    };
    if let Err(e) = finish_window_awaken(state, pending, &window) {
        state.notice(format!("Failed to awaken window {}: {}", node_id, e));
    }
}

fn finish_window_awaken(
    state: &mut State,
    pending: PendingWindow,
    window: &HostWindow,
) -> TreeResult<()> {
    // The creation notification arrived unrecognized and built a fresh node
    if let Some(duplicate) = state.tree.window_by_host(window.id).cloned() {
        if duplicate == pending.node_id {
            return Ok(());
        }
        state.tree.remove(&duplicate)?;
    }
    adopt_window(state, pending, window)?;
    Ok(())
}

/// Re-associate a pending hibernated window with `window`. Pages left
/// without a tab wait for their tab under the new window id.
fn adopt_window(
    state: &mut State,
    pending: PendingWindow,
    window: &HostWindow,
) -> TreeResult<Option<NodeId>> {
    let Some(unmatched) = attach_window(&mut state.tree, &pending.node_id, window, &pending.page_ids)?
    else {
        return Ok(None);
    };

    for page_id in unmatched {
        let Some(url) = state
            .tree
            .get(&page_id)
            .and_then(|n| n.page())
            .map(|p| p.url.clone())
        else {
            continue;
        };
        state.pending_tabs.push(PendingTab {
            node_id: page_id,
            url,
            window_id: Some(window.id),
        });
    }
    for tab in sorted_tabs(window) {
        if state.tree.page_by_tab(tab.id).is_none() {
            tab_created(state, tab)?;
        }
    }
    ordering::reconcile_window(&mut state.tree, &pending.node_id)?;
    Ok(Some(pending.node_id))
}

/// Oldest pending window awakening that `window` can complete. The window
/// must already hold a tab for every pending URL, in order.
fn take_pending_window(state: &mut State, window: &HostWindow) -> Option<PendingWindow> {
    let front = state.pending_windows.front()?;
    let incognito = state
        .tree
        .get(&front.node_id)
        .and_then(|n| n.window())
        .is_some_and(|w| w.incognito);
    let tabs = sorted_tabs(window);
    let urls_match = !front.urls.is_empty()
        && tabs.len() >= front.urls.len()
        && tabs
            .iter()
            .zip(front.urls.iter())
            .all(|(tab, url)| tab.url == *url);
    if incognito != window.incognito || !urls_match {
        return None;
    }
    state.pending_windows.pop_front()
}

/// Update, add and remove pages so a tracked window matches its host tabs
fn sync_window_tabs(state: &mut State, node_id: &str, window: &HostWindow) -> TreeResult<()> {
    let host_tabs: HashSet<_> = window.tabs.iter().map(|t| t.id).collect();
    let stale: Vec<_> = state
        .tree
        .window_pages(node_id)
        .into_iter()
        .filter_map(|n| n.tab_id())
        .filter(|id| !host_tabs.contains(id))
        .collect();
    for tab_id in stale {
        tab_removed(state, tab_id)?;
    }

    for tab in sorted_tabs(window) {
        let Some(page_id) = state.tree.page_by_tab(tab.id).cloned() else {
            tab_created(state, tab)?;
            continue;
        };
        state.tree.update_node(
            &page_id,
            &NodePatch {
                url: Some(tab.url.clone()),
                title: Some(tab.title.clone()),
                fav_icon_url: tab.fav_icon_url.clone(),
                status: Some(tab.status),
                pinned: Some(tab.pinned),
                index: Some(tab.index),
                ..Default::default()
            },
        )?;
        let in_window = state
            .tree
            .top_parent(&page_id)
            .is_some_and(|w| w.id == node_id);
        if !in_window {
            tab_attached(state, tab.id, window.id, tab.index)?;
        }
    }
    Ok(())
}

/// A restored window whose pages contain the host tabs' URLs in order.
/// Returns the window node and the page matched to each tab.
fn find_old_window(state: &State, window: &HostWindow) -> Option<(NodeId, Vec<NodeId>)> {
    let tabs = sorted_tabs(window);
    if tabs.is_empty() {
        return None;
    }

    state
        .tree
        .children(state.tree.root_id())
        .iter()
        .filter_map(|id| state.tree.get(id))
        .filter(|n| {
            n.window()
                .is_some_and(|w| w.old && w.hibernated && w.incognito == window.incognito)
        })
        .find_map(|n| {
            let pages = state.tree.window_pages(&n.id);
            let mut pages = pages
                .iter()
                .filter(|p| p.is_hibernated())
                .filter_map(|p| Some((p.id.clone(), p.page()?.url.clone())));
            let mut matched = Vec::with_capacity(tabs.len());
            for tab in &tabs {
                let (id, _) = pages.by_ref().find(|(_, url)| *url == tab.url)?;
                matched.push(id);
            }
            Some((n.id.clone(), matched))
        })
}

fn sorted_tabs(window: &HostWindow) -> Vec<&HostTab> {
    let mut tabs: Vec<&HostTab> = window.tabs.iter().collect();
    tabs.sort_by_key(|t| t.index);
    tabs
}

#[cfg(test)]
mod tests {
    use super::super::super::{persist, Config};
    use super::super::{PendingWindow, State};
    use crate::platform::mock::{create_test_tab, create_test_window};
    use tabtree_ipc::{HostWindow, TreeEvent};

    fn test_window(window_id: u32, tab_ids: &[u32]) -> HostWindow {
        let tabs = tab_ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let mut tab = create_test_tab(*id, window_id, &format!("https://t{}", id));
                tab.index = index;
                tab
            })
            .collect();
        create_test_window(window_id, tabs)
    }

    fn setup_state() -> State {
        let mut state = State::new(Config::ephemeral());
        let mut first = test_window(1, &[1, 2]);
        first.focused = true;
        state.sync(&[first, test_window(2, &[3])]).unwrap();
        state.drain_events();
        state
    }

    #[test]
    fn test_window_removed_without_hibernated_content() {
        let mut state = setup_state();
        state.window_removed(2).unwrap();
        assert!(!state.tree.contains("w2"));
        assert!(!state.tree.contains("p3"));
    }

    #[test]
    fn test_window_removed_keeps_hibernated_pages() {
        let mut state = setup_state();
        state.hibernate("p1").unwrap();
        state.window_removed(1).unwrap();

        let window = state.tree.get("w1").unwrap().window().unwrap().clone();
        assert!(window.hibernated);
        assert!(window.restorable);
        assert_eq!(window.window_id, None);
        assert_eq!(state.tree.children("w1"), &["p1".to_string()]);
        assert!(!state.tree.contains("p2"));
        assert_eq!(state.focused_window(), None);
    }

    #[test]
    fn test_window_removed_keeps_folders() {
        let mut state = setup_state();
        let folder = state.create_folder("Later", Some("w2")).unwrap();
        state.window_removed(2).unwrap();
        assert!(state.tree.get("w2").unwrap().is_hibernated());
        assert!(state.tree.contains(&folder));
    }

    #[test]
    fn test_focus_changed_emits_and_ignores_sidebar() {
        let mut config = Config::ephemeral();
        config.sidebar_window_id = Some(9);
        let mut state = State::new(config);

        state.focus_changed(Some(1));
        state.focus_changed(Some(9));
        state.focus_changed(None);
        assert_eq!(
            state.drain_events(),
            vec![
                TreeEvent::WindowFocused { window_id: Some(1) },
                TreeEvent::WindowFocused { window_id: None },
            ]
        );
        assert_eq!(state.focused_window(), Some(1));
        assert!(!state.focus.is_any_focused());
    }

    #[test]
    fn test_sync_removes_vanished_and_adds_new() {
        let mut state = setup_state();
        state.sync(&[test_window(1, &[1]), test_window(4, &[5])]).unwrap();
        assert!(!state.tree.contains("w2"));
        assert!(!state.tree.contains("p2"));
        assert_eq!(state.tree.children("w4"), &["p5".to_string()]);
        assert_eq!(state.tree.children("w1"), &["p1".to_string()]);
    }

    #[test]
    fn test_sync_adopts_restored_window() {
        let mut state = setup_state();
        state.tree.move_node("p2", "p1", None).unwrap();
        let records = state.snapshot();

        let mut restored = State::with_tree(Config::ephemeral(), persist::restore(records));
        let mut window = test_window(7, &[]);
        window.tabs = vec![
            create_test_tab(11, 7, "https://t1"),
            create_test_tab(12, 7, "https://t2"),
        ];
        window.tabs[1].index = 1;
        restored.sync(&[window]).unwrap();

        assert_eq!(restored.tree.window_by_host(7).map(String::as_str), Some("w1"));
        assert_eq!(restored.tree.page_by_tab(11).map(String::as_str), Some("p1"));
        assert_eq!(restored.tree.children("p1"), &["p2".to_string()]);
        assert!(!restored.tree.get("w1").unwrap().window().unwrap().old);
        // Window 2 had no matching host window and stays hibernated
        assert!(restored.tree.get("w2").unwrap().is_hibernated());
    }

    #[test]
    fn test_window_created_completes_pending_awakening() {
        let mut state = setup_state();
        state.hibernate("w2").unwrap();
        state.window_removed(2).unwrap();
        state.pending_windows.push_back(PendingWindow {
            node_id: "w2".to_string(),
            page_ids: vec!["p3".to_string()],
            urls: vec!["https://t3".to_string()],
        });

        state.window_created(&test_window(8, &[30])).unwrap();
        // URL mismatch: treated as an unrelated window
        assert!(state.tree.contains("w8"));
        assert_eq!(state.pending_windows.len(), 1);

        let mut window = test_window(9, &[]);
        window.tabs = vec![create_test_tab(31, 9, "https://t3")];
        state.window_created(&window).unwrap();
        assert!(state.pending_windows.is_empty());
        assert_eq!(state.tree.window_by_host(9).map(String::as_str), Some("w2"));
        assert_eq!(state.tree.page_by_tab(31).map(String::as_str), Some("p3"));
    }

    #[test]
    fn test_tab_in_unknown_window_waits_for_awaken_completion() {
        let mut state = setup_state();
        state.hibernate("w2").unwrap();
        state.window_removed(2).unwrap();
        state.pending_windows.push_back(PendingWindow {
            node_id: "w2".to_string(),
            page_ids: vec!["p3".to_string()],
            urls: vec!["https://t3".to_string()],
        });

        state
            .tab_created(&create_test_tab(40, 10, "https://t3"))
            .unwrap();
        assert_eq!(state.tree.window_by_host(10).map(String::as_str), Some("w10"));
        assert_eq!(state.pending_windows.len(), 1);

        let window = create_test_window(10, vec![create_test_tab(40, 10, "https://t3")]);
        state.complete_window_awaken("w2", Ok(window));
        assert!(!state.tree.contains("w10"));
        assert_eq!(state.tree.window_by_host(10).map(String::as_str), Some("w2"));
        assert_eq!(state.tree.page_by_tab(40).map(String::as_str), Some("p3"));
    }

    #[test]
    fn test_unrelated_window_during_awakening() {
        let mut state = setup_state();
        state.hibernate("w1").unwrap();
        state.window_removed(1).unwrap();
        assert!(!state.awaken("w1").unwrap().is_empty());

        // Opened by the user while the awakening is in flight
        state.window_created(&test_window(9, &[])).unwrap();
        assert_eq!(state.tree.window_by_host(9).map(String::as_str), Some("w9"));
        assert_eq!(state.pending_windows.len(), 1);

        let mut first = create_test_tab(11, 10, "https://t1");
        first.index = 0;
        let mut second = create_test_tab(12, 10, "https://t2");
        second.index = 1;
        let window = create_test_window(10, vec![first.clone(), second.clone()]);
        state.complete_window_awaken("w1", Ok(window));
        state.tab_created(&first).unwrap();
        state.tab_created(&second).unwrap();

        assert_eq!(state.tree.window_by_host(10).map(String::as_str), Some("w1"));
        assert_eq!(state.tree.window_by_host(9).map(String::as_str), Some("w9"));
        assert_eq!(state.tree.page_by_tab(11).map(String::as_str), Some("p1"));
        assert_eq!(state.tree.page_by_tab(12).map(String::as_str), Some("p2"));
        assert!(!state.tree.get("p1").unwrap().is_hibernated());
        assert!(state.pending_windows.is_empty());
    }

    #[test]
    fn test_pending_window_needs_every_url() {
        let mut state = setup_state();
        state.hibernate("w1").unwrap();
        state.window_removed(1).unwrap();
        state.awaken("w1").unwrap();

        // Only the first of the two stored URLs
        let window = create_test_window(9, vec![create_test_tab(21, 9, "https://t1")]);
        state.window_created(&window).unwrap();
        assert_eq!(state.tree.window_by_host(9).map(String::as_str), Some("w9"));
        assert_eq!(state.pending_windows.len(), 1);
    }

    #[test]
    fn test_window_awaken_completion_replaces_duplicate() {
        let mut state = setup_state();
        state.hibernate("w2").unwrap();
        state.window_removed(2).unwrap();
        state.pending_windows.push_back(PendingWindow {
            node_id: "w2".to_string(),
            page_ids: vec!["p3".to_string()],
            urls: vec!["https://t3".to_string()],
        });

        // Unrecognized creation: redirected URL
        let mut window = test_window(9, &[]);
        window.tabs = vec![create_test_tab(31, 9, "https://t3/other")];
        state.window_created(&window).unwrap();
        assert!(state.tree.contains("w9"));

        state.complete_window_awaken("w2", Ok(window));
        assert!(!state.tree.contains("w9"));
        assert_eq!(state.tree.window_by_host(9).map(String::as_str), Some("w2"));
        assert_eq!(state.tree.page_by_tab(31).map(String::as_str), Some("p3"));
    }
}
