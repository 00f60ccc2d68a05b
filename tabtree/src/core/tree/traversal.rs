use super::super::node::{Node, NodeId, WindowId, ROOT_ID};
use super::Tree;

impl Tree {
    /// Ancestors of `id`, nearest first, ending with the root. O(depth).
    pub fn ancestors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Node> + 'a {
        std::iter::successors(self.parents.get(id), move |p| self.parents.get(p.as_str()))
            .filter_map(move |p| self.get(p))
    }

    /// Whether `ancestor` lies on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).any(|n| n.id == ancestor)
    }

    /// Descendants of `id` in pre-order, excluding `id` itself
    pub fn descendants(&self, id: &str) -> Vec<&Node> {
        self.pre_order_ids(id)
            .iter()
            .skip(1)
            .filter_map(|d| self.get(d))
            .collect()
    }

    /// Nearest window ancestor
    pub fn top_parent(&self, id: &str) -> Option<&Node> {
        self.ancestors(id).find(|n| n.is_window())
    }

    /// Nodes that come before `id` in document order, scoped to its window
    /// (or to the whole tree when it has none). Ancestors are included.
    pub fn preceding(&self, id: &str) -> Vec<&Node> {
        let scope = self.document_scope(id);
        let order = self.pre_order_ids(&scope);
        let Some(pos) = order.iter().position(|n| n == id) else {
            return Vec::new();
        };
        order[..pos]
            .iter()
            .filter(|n| **n != scope)
            .filter_map(|n| self.get(n))
            .collect()
    }

    /// Nodes that come after `id`'s subtree in document order, scoped to its
    /// window. Descendants of `id` are never included.
    pub fn following(&self, id: &str) -> Vec<&Node> {
        let scope = self.document_scope(id);
        let order = self.pre_order_ids(&scope);
        let Some(pos) = order.iter().position(|n| n == id) else {
            return Vec::new();
        };
        let subtree_len = self.pre_order_ids(id).len();
        order[pos + subtree_len..]
            .iter()
            .filter_map(|n| self.get(n))
            .collect()
    }

    /// Pages belonging to the window node `window_node`, in document order
    pub fn window_pages(&self, window_node: &str) -> Vec<&Node> {
        self.descendants(window_node)
            .into_iter()
            .filter(|n| n.is_page())
            .collect()
    }

    /// Window node owning host window `window_id`
    pub fn window_node(&self, window_id: WindowId) -> Option<&Node> {
        self.window_by_host(window_id).and_then(|id| self.get(id))
    }

    fn document_scope(&self, id: &str) -> NodeId {
        match self.top_parent(id) {
            Some(window) => window.id.clone(),
            None => ROOT_ID.to_string(),
        }
    }

    pub(super) fn pre_order_ids(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    pub(super) fn post_order_ids(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_post_order(id, &mut out);
        out
    }

    fn collect_post_order(&self, id: &str, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            self.collect_post_order(child, out);
        }
        out.push(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::super::Tree;
    use crate::core::node::{page_node_id, Node};
    use tabtree_ipc::{HostTab, HostWindow};

    fn add_page(tree: &mut Tree, tab_id: u32, parent: &str) {
        let tab = HostTab {
            id: tab_id,
            window_id: 1,
            url: format!("https://t{}", tab_id),
            ..Default::default()
        };
        tree.add(Node::from_host_tab(page_node_id(tab_id), &tab), Some(parent), None)
            .unwrap();
    }

    fn setup_tree() -> Tree {
        // w1 -> [p1 -> [p2 -> [p3]], p4], w2 -> [p5]
        let mut tree = Tree::new();
        for id in [1, 2] {
            let window = HostWindow {
                id,
                ..Default::default()
            };
            tree.add(Node::from_host_window(&window), None, None).unwrap();
        }
        add_page(&mut tree, 1, "w1");
        add_page(&mut tree, 2, "p1");
        add_page(&mut tree, 3, "p2");
        add_page(&mut tree, 4, "w1");
        add_page(&mut tree, 5, "w2");
        tree
    }

    fn ids(nodes: Vec<&Node>) -> Vec<&str> {
        nodes.into_iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let tree = setup_tree();
        let ancestors: Vec<_> = tree.ancestors("p3").map(|n| n.id.as_str()).collect();
        assert_eq!(ancestors, vec!["p2", "p1", "w1", "R"]);
        assert!(tree.is_ancestor("p1", "p3"));
        assert!(!tree.is_ancestor("p3", "p1"));
    }

    #[test]
    fn test_descendants_pre_order() {
        let tree = setup_tree();
        assert_eq!(ids(tree.descendants("w1")), vec!["p1", "p2", "p3", "p4"]);
        assert!(tree.descendants("p4").is_empty());
    }

    #[test]
    fn test_top_parent() {
        let tree = setup_tree();
        assert_eq!(tree.top_parent("p3").map(|n| n.id.as_str()), Some("w1"));
        assert_eq!(tree.top_parent("p5").map(|n| n.id.as_str()), Some("w2"));
        assert!(tree.top_parent("w1").is_none());
    }

    #[test]
    fn test_preceding_and_following_scoped_to_window() {
        let tree = setup_tree();
        assert_eq!(ids(tree.preceding("p4")), vec!["p1", "p2", "p3"]);
        assert_eq!(ids(tree.preceding("p2")), vec!["p1"]);
        assert_eq!(ids(tree.following("p1")), vec!["p4"]);
        assert_eq!(ids(tree.following("p3")), vec!["p4"]);
        assert!(tree.following("p4").is_empty());
        assert!(tree.preceding("p5").is_empty());
    }

    #[test]
    fn test_window_pages() {
        let tree = setup_tree();
        assert_eq!(ids(tree.window_pages("w1")), vec!["p1", "p2", "p3", "p4"]);
        assert_eq!(tree.window_node(2).map(|n| n.id.as_str()), Some("w2"));
    }
}
