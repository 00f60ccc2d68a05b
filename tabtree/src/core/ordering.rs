//! Keeps pinned pages ahead of unpinned ones within each window.
//!
//! Only live pages take part; hibernated pages have no strip position.
//! Moves are expressed through `Tree::move_node`, so children travel with
//! their parent.

use super::error::{TreeError, TreeResult};
use super::node::{Node, NodeId};
use super::tree::Tree;

fn is_live(node: &Node) -> bool {
    node.is_live_page()
}

fn is_live_pinned(node: &Node) -> bool {
    is_live(node) && node.is_pinned()
}

fn is_live_unpinned(node: &Node) -> bool {
    is_live(node) && !node.is_pinned()
}

/// Repair the position of `page_id` according to its current pin state.
/// Returns whether the page was moved.
pub fn enforce(tree: &mut Tree, page_id: &str) -> TreeResult<bool> {
    let Some(node) = tree.get(page_id) else {
        return Err(TreeError::NotFound(page_id.to_string()));
    };
    if !is_live(node) {
        return Ok(false);
    }
    if node.is_pinned() {
        repair_pinned(tree, page_id)
    } else {
        repair_unpinned(tree, page_id)
    }
}

/// `page_id` just became unpinned: move it after the last pinned page that
/// follows it, if any.
pub fn repair_unpinned(tree: &mut Tree, page_id: &str) -> TreeResult<bool> {
    if !boundary_scan(tree, page_id, Direction::After) {
        return Ok(false);
    }
    let Some(boundary) = tree
        .following(page_id)
        .into_iter()
        .filter(|n| is_live_pinned(n))
        .last()
        .map(|n| n.id.clone())
    else {
        return Err(boundary_missing(page_id, "pinned"));
    };

    if !tree.children(&boundary).is_empty() {
        tree.move_node(page_id, &boundary, Some(0))?;
    } else {
        tree.move_after(page_id, &boundary)?;
    }
    tracing::debug!("Unpinned {} moved after {}", page_id, boundary);
    Ok(true)
}

/// `page_id` just became pinned: move it before the first unpinned page that
/// precedes it, if any.
pub fn repair_pinned(tree: &mut Tree, page_id: &str) -> TreeResult<bool> {
    if !boundary_scan(tree, page_id, Direction::Before) {
        return Ok(false);
    }
    let Some(boundary) = tree
        .preceding(page_id)
        .into_iter()
        .find(|n| is_live_unpinned(n))
        .map(|n| n.id.clone())
    else {
        return Err(boundary_missing(page_id, "unpinned"));
    };

    tree.move_before(page_id, &boundary)?;
    tracing::debug!("Pinned {} moved before {}", page_id, boundary);
    Ok(true)
}

/// Full pass over one window: pinned pages oldest-first, then unpinned pages
/// newest-first. Returns the number of pages moved.
pub fn reconcile_window(tree: &mut Tree, window_node: &str) -> TreeResult<usize> {
    let mut pinned: Vec<(u64, NodeId)> = Vec::new();
    let mut unpinned: Vec<(u64, NodeId)> = Vec::new();
    for node in tree.window_pages(window_node) {
        if !is_live(node) {
            continue;
        }
        let seq = tree.seq(&node.id).unwrap_or(0);
        if node.is_pinned() {
            pinned.push((seq, node.id.clone()));
        } else {
            unpinned.push((seq, node.id.clone()));
        }
    }
    pinned.sort();
    unpinned.sort_by(|a, b| b.cmp(a));

    let mut moved = 0;
    for (_, id) in pinned {
        if repair_pinned(tree, &id)? {
            moved += 1;
        }
    }
    for (_, id) in unpinned {
        if repair_unpinned(tree, &id)? {
            moved += 1;
        }
    }
    Ok(moved)
}

/// Reconcile every window in the tree.
pub fn reconcile_all(tree: &mut Tree) -> TreeResult<usize> {
    let windows: Vec<NodeId> = tree
        .children(tree.root_id())
        .iter()
        .filter(|id| tree.get(id).is_some_and(|n| n.is_window()))
        .cloned()
        .collect();
    let mut moved = 0;
    for window in windows {
        if is_ordered(tree, &window) {
            continue;
        }
        moved += reconcile_window(tree, &window)?;
    }
    if moved > 0 {
        tracing::info!("Ordering reconciled, {} pages moved", moved);
    }
    Ok(moved)
}

/// Whether no live pinned page comes after a live unpinned sibling directly
/// under the window. Nested pages are not compared; they move with their parent.
pub fn is_ordered(tree: &Tree, window_node: &str) -> bool {
    let mut seen_unpinned = false;
    for node in tree.children(window_node).iter().filter_map(|id| tree.get(id)) {
        if !is_live(node) {
            continue;
        }
        if node.is_pinned() && seen_unpinned {
            return false;
        }
        seen_unpinned |= !node.is_pinned();
    }
    true
}

#[derive(Clone, Copy)]
enum Direction {
    Before,
    After,
}

/// Positional scan over the window's pages, ignoring the page's own subtree.
/// Tells whether a boundary page on the given side is expected to exist.
fn boundary_scan(tree: &Tree, page_id: &str, direction: Direction) -> bool {
    let Some(window) = tree.top_parent(page_id) else {
        return false;
    };
    let pages = tree.window_pages(&window.id);
    let Some(pos) = pages.iter().position(|n| n.id == page_id) else {
        return false;
    };
    match direction {
        Direction::After => pages[pos + 1..]
            .iter()
            .filter(|n| !tree.is_ancestor(page_id, &n.id))
            .any(|n| is_live_pinned(n)),
        Direction::Before => pages[..pos].iter().any(|n| is_live_unpinned(n)),
    }
}

fn boundary_missing(page_id: &str, kind: &str) -> TreeError {
    let message = format!("no {} boundary page found for {}", kind, page_id);
    tracing::error!("{}", message);
    TreeError::InvariantViolation(message)
}
