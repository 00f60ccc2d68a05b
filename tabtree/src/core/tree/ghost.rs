use tabtree_ipc::NodeData;

use super::super::error::{TreeError, TreeResult};
use super::super::node::{Node, NodeId};
use super::Tree;

impl Tree {
    /// Move the children of `id` into its parent, directly after `id`,
    /// keeping their order.
    pub fn promote_children(&mut self, id: &str) -> TreeResult<()> {
        let Some(parent) = self.parent(id).cloned() else {
            return Err(TreeError::NotFound(id.to_string()));
        };
        let index = self.index_of(id).unwrap_or(0);
        let children = self.children(id).to_vec();
        for (offset, child) in children.iter().enumerate() {
            self.move_node(child, &parent, Some(index + 1 + offset))?;
        }
        Ok(())
    }

    /// Put a ghost where `id` currently sits and park `id` (with its subtree)
    /// as the ghost's only child. Returns the ghost's id.
    pub fn insert_ghost(&mut self, id: &str) -> TreeResult<NodeId> {
        let Some(node) = self.get(id) else {
            return Err(TreeError::NotFound(id.to_string()));
        };
        let ghost = Node::ghost(node.elem_type());
        let ghost_id = ghost.id.clone();
        let Some(parent) = self.parent(id).cloned() else {
            return Err(TreeError::RootImmutable);
        };
        let index = self.index_of(id);

        self.add(ghost, Some(&parent), index)?;
        self.move_node(id, &ghost_id, Some(0))?;
        tracing::debug!("Ghost {} holds position of {}", ghost_id, id);
        Ok(ghost_id)
    }

    /// Splice a ghost's remaining children into its position and drop it.
    pub fn dissolve_ghost(&mut self, ghost_id: &str) -> TreeResult<()> {
        match self.get(ghost_id).map(|n| &n.data) {
            Some(NodeData::Ghost { .. }) => {}
            Some(_) => {
                return Err(TreeError::WrongKind {
                    id: ghost_id.to_string(),
                    expected: "ghost",
                })
            }
            None => return Err(TreeError::NotFound(ghost_id.to_string())),
        }
        self.promote_children(ghost_id)?;
        self.remove(ghost_id)?;
        Ok(())
    }
}
