use tabtree_ipc::NodePatch;

use super::error::{TreeError, TreeResult};
use super::node::{strip_fragment, NodeId, TabId};
use super::tree::Tree;

/// Which rule decided a page's parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementRule {
    AlreadyPlaced,
    NoReferrer,
    FocusedTab,
    ReferrerMatch,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub parent_id: NodeId,
    pub rule: PlacementRule,
}

/// Decide and apply the parent of an unplaced page, then mark it placed.
/// A page that is already placed is never reparented.
pub fn place_page(
    tree: &mut Tree,
    page_id: &str,
    focused_tab: Option<TabId>,
) -> TreeResult<Placement> {
    let Some(node) = tree.get(page_id) else {
        return Err(TreeError::NotFound(page_id.to_string()));
    };
    let Some(page) = node.page() else {
        return Err(TreeError::WrongKind {
            id: page_id.to_string(),
            expected: "page",
        });
    };
    let current_parent = tree.parent(page_id).cloned().unwrap_or_default();
    if page.placed {
        return Ok(Placement {
            parent_id: current_parent,
            rule: PlacementRule::AlreadyPlaced,
        });
    }

    let Some(window) = tree.top_parent(page_id) else {
        return Err(TreeError::InvariantViolation(format!(
            "page {} has no window ancestor",
            page_id
        )));
    };
    let window_id = window.id.clone();
    let (parent_id, rule) = choose_parent(tree, page_id, &window_id, focused_tab);

    // A page already sitting at the top of its window keeps its slot.
    let stays_top_level = parent_id == window_id && current_parent == window_id;
    if parent_id != current_parent && !stays_top_level {
        tree.move_node(page_id, &parent_id, None)?;
    }
    tree.update_node(
        page_id,
        &NodePatch {
            placed: Some(true),
            ..Default::default()
        },
    )?;

    tracing::debug!("Placed {} under {} ({:?})", page_id, parent_id, rule);
    Ok(Placement { parent_id, rule })
}

/// Parent for a page by referrer. Candidates are live pages of the page's
/// own window; a matching page in another window is never chosen.
fn choose_parent(
    tree: &Tree,
    page_id: &str,
    window_id: &str,
    focused_tab: Option<TabId>,
) -> (NodeId, PlacementRule) {
    let referrer = tree
        .get(page_id)
        .and_then(|n| n.page())
        .and_then(|p| p.referrer.clone())
        .filter(|r| !r.is_empty());
    let Some(referrer) = referrer else {
        return (window_id.to_string(), PlacementRule::NoReferrer);
    };

    let eligible = |id: &str| id != page_id && !tree.is_ancestor(page_id, id);

    if let Some(focused_id) = focused_tab.and_then(|t| tree.page_by_tab(t)) {
        let matches = tree
            .get(focused_id)
            .and_then(|n| n.page())
            .is_some_and(|p| p.url == referrer);
        let same_window =
            tree.top_parent(focused_id).map(|w| w.id.as_str()) == Some(window_id);
        if matches && same_window && eligible(focused_id) {
            return (focused_id.clone(), PlacementRule::FocusedTab);
        }
    }

    let wanted = strip_fragment(&referrer);
    let best = tree
        .window_pages(window_id)
        .into_iter()
        .filter(|n| eligible(&n.id))
        .filter_map(|n| {
            let page = n.page()?;
            let tab_id = page.tab_id?;
            if strip_fragment(&page.url) != wanted {
                return None;
            }
            Some((tab_id, tree.seq(&n.id).unwrap_or(u64::MAX), n.id.clone()))
        })
        .min_by_key(|(tab_id, seq, _)| (*tab_id, *seq));

    match best {
        Some((_, _, id)) => (id, PlacementRule::ReferrerMatch),
        None => (window_id.to_string(), PlacementRule::Fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{page_node_id, Node};
    use crate::platform::mock::{create_test_tab, create_test_window};

    fn add_tab(tree: &mut Tree, tab_id: TabId, url: &str, referrer: Option<&str>) -> NodeId {
        let mut tab = create_test_tab(tab_id, 1, url);
        tab.referrer = referrer.map(str::to_string);
        let id = page_node_id(tab_id);
        tree.add(Node::from_host_tab(id.clone(), &tab), Some("w1"), None)
            .unwrap();
        id
    }

    fn setup_tree() -> Tree {
        let mut tree = Tree::new();
        tree.add(Node::from_host_window(&create_test_window(1, vec![])), None, None)
            .unwrap();
        tree
    }

    #[test]
    fn test_no_referrer_stays_top_level() {
        let mut tree = setup_tree();
        let a = add_tab(&mut tree, 1, "https://a", None);
        let placement = place_page(&mut tree, &a, None).unwrap();
        assert_eq!(placement.parent_id, "w1");
        assert_eq!(placement.rule, PlacementRule::NoReferrer);
        assert!(tree.get(&a).unwrap().page().unwrap().placed);
    }

    #[test]
    fn test_referrer_scenario_siblings_under_lowest_id() {
        let mut tree = setup_tree();
        let a = add_tab(&mut tree, 1, "https://a", None);
        place_page(&mut tree, &a, None).unwrap();

        let b = add_tab(&mut tree, 2, "https://a", Some("https://a"));
        let placement = place_page(&mut tree, &b, None).unwrap();
        assert_eq!(placement.parent_id, a);
        assert_eq!(placement.rule, PlacementRule::ReferrerMatch);

        // B shares A's URL but A has the lower tab id
        let c = add_tab(&mut tree, 3, "https://c", Some("https://a"));
        let placement = place_page(&mut tree, &c, None).unwrap();
        assert_eq!(placement.parent_id, a);
        assert_eq!(tree.children(&a), &[b, c]);
    }

    #[test]
    fn test_focused_tab_wins_over_lower_id() {
        let mut tree = setup_tree();
        add_tab(&mut tree, 1, "https://a", None);
        let focused = add_tab(&mut tree, 5, "https://a", None);
        let d = add_tab(&mut tree, 6, "https://d", Some("https://a"));

        let placement = place_page(&mut tree, &d, Some(5)).unwrap();
        assert_eq!(placement.parent_id, focused);
        assert_eq!(placement.rule, PlacementRule::FocusedTab);
    }

    #[test]
    fn test_fragment_ignored_for_candidates() {
        let mut tree = setup_tree();
        let a = add_tab(&mut tree, 1, "https://a/page#section", None);
        let b = add_tab(&mut tree, 2, "https://b", Some("https://a/page#other"));
        let placement = place_page(&mut tree, &b, None).unwrap();
        assert_eq!(placement.parent_id, a);
    }

    #[test]
    fn test_descendants_excluded_from_candidates() {
        let mut tree = setup_tree();
        let a = add_tab(&mut tree, 1, "https://a", None);
        let child = add_tab(&mut tree, 2, "https://b", None);
        tree.move_node(&child, &a, None).unwrap();

        // A's own referrer points at its child's URL
        tree.update_node(
            &a,
            &NodePatch {
                referrer: Some("https://b".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let placement = place_page(&mut tree, &a, None).unwrap();
        assert_eq!(placement.rule, PlacementRule::Fallback);
        assert_eq!(placement.parent_id, "w1");
    }

    #[test]
    fn test_referrer_in_other_window_ignored() {
        let mut tree = setup_tree();
        tree.add(Node::from_host_window(&create_test_window(2, vec![])), None, None)
            .unwrap();
        let other = page_node_id(1);
        tree.add(
            Node::from_host_tab(other.clone(), &create_test_tab(1, 2, "https://a")),
            Some("w2"),
            None,
        )
        .unwrap();

        let b = add_tab(&mut tree, 2, "https://b", Some("https://a"));
        let placement = place_page(&mut tree, &b, Some(1)).unwrap();
        assert_eq!(placement.rule, PlacementRule::Fallback);
        assert_eq!(placement.parent_id, "w1");
        assert!(tree.children(&other).is_empty());
    }

    #[test]
    fn test_placement_is_permanent() {
        let mut tree = setup_tree();
        let a = add_tab(&mut tree, 1, "https://a", None);
        let b = add_tab(&mut tree, 2, "https://b", None);
        place_page(&mut tree, &b, None).unwrap();

        tree.update_node(
            &b,
            &NodePatch {
                referrer: Some("https://a".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let placement = place_page(&mut tree, &b, None).unwrap();
        assert_eq!(placement.rule, PlacementRule::AlreadyPlaced);
        assert_eq!(tree.parent(&b).map(String::as_str), Some("w1"));
        assert!(tree.children(&a).is_empty());
    }

    #[test]
    fn test_missing_page() {
        let mut tree = setup_tree();
        assert_eq!(
            place_page(&mut tree, "p404", None),
            Err(TreeError::NotFound("p404".to_string()))
        );
    }
}
