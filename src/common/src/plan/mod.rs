//! Canonical query plan trees.
//!
//! Nodes live in an arena owned by [`PlanTree`] and are addressed by [`PlanNodeId`]. Every
//! structural mutation goes through the tree so that a node's children list and its
//! children's parent links always agree.
use crate::RepoError;
pub use hints::PlanHints;
pub use node::*;
use std::collections::VecDeque;
use std::fmt;
mod hints;
mod node;

/// Arena of plan nodes. Plan trees are not thread-safe and should not be shared between
/// concurrent planning operations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanTree {
    nodes: Vec<PlanNode>,
    /// The root of the plan; follows the top of the tree as parents are inserted above it.
    root: Option<PlanNodeId>,
}

impl PlanTree {
    /// Creates an empty plan tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Adds a parentless node and returns its id. The first node added becomes the root.
    ///
    /// # Arguments
    ///
    /// * `node_type` - Type of the new node.
    pub fn add_node(&mut self, node_type: NodeType) -> PlanNodeId {
        let id = PlanNodeId(self.nodes.len());
        self.nodes.push(PlanNode::new(node_type));
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Adds a new node as the last child of `parent`.
    pub fn add_child_node(&mut self, parent: PlanNodeId, node_type: NodeType) -> PlanNodeId {
        let child = self.add_node(node_type);
        self.add_last_child(parent, child);
        child
    }

    /// Gets the index of the root node, if such a node is present.
    pub fn root(&self) -> Option<PlanNodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: PlanNodeId) {
        self.root = Some(root);
    }

    /// Returns the total number of slots in the arena, including detached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: PlanNodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    /// Mutable access to a node's type, selectors, and properties.
    pub fn node_mut(&mut self, id: PlanNodeId) -> &mut PlanNode {
        &mut self.nodes[id.0]
    }

    pub fn node_type(&self, id: PlanNodeId) -> NodeType {
        self.node(id).node_type()
    }

    pub fn parent(&self, id: PlanNodeId) -> Option<PlanNodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: PlanNodeId) -> &[PlanNodeId] {
        &self.node(id).children
    }

    pub fn child_count(&self, id: PlanNodeId) -> usize {
        self.node(id).children.len()
    }

    pub fn first_child(&self, id: PlanNodeId) -> Option<PlanNodeId> {
        self.node(id).first_child()
    }

    pub fn last_child(&self, id: PlanNodeId) -> Option<PlanNodeId> {
        self.node(id).last_child()
    }

    pub fn child(&self, id: PlanNodeId, index: usize) -> Option<PlanNodeId> {
        self.node(id).children.get(index).copied()
    }

    /// Walks up from `id` to the node with no parent.
    pub fn top_of(&self, id: PlanNodeId) -> PlanNodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Keeps the root pointing at the top of its tree after `child` gained a parent.
    fn track_root(&mut self, child: PlanNodeId) {
        if self.root == Some(child) {
            self.root = Some(self.top_of(child));
        }
    }

    /// Unlinks `id` from its parent, returning the old parent.
    pub fn remove_from_parent(&mut self, id: PlanNodeId) -> Option<PlanNodeId> {
        let parent = self.nodes[id.0].parent.take()?;
        self.nodes[parent.0].children.retain(|c| *c != id);
        Some(parent)
    }

    /// Moves `id` under `parent` as its last child, or detaches it when `parent` is `None`.
    pub fn set_parent(&mut self, id: PlanNodeId, parent: Option<PlanNodeId>) {
        self.remove_from_parent(id);
        if let Some(parent) = parent {
            self.add_last_child(parent, id);
        }
    }

    /// Inserts `new_parent` between `id` and its current parent.
    ///
    /// `new_parent` is first removed from wherever it was, takes `id`'s position in the old
    /// parent's children, and then adopts `id` as its last child.
    pub fn insert_as_parent(&mut self, id: PlanNodeId, new_parent: PlanNodeId) {
        self.remove_from_parent(new_parent);
        if let Some(old_parent) = self.parent(id) {
            self.replace_child(old_parent, id, new_parent);
        }
        self.add_last_child(new_parent, id);
    }

    /// Adds `child` at the front of `parent`'s children, detaching it from any other parent.
    pub fn add_first_child(&mut self, parent: PlanNodeId, child: PlanNodeId) {
        assert_ne!(parent, child, "a node cannot be its own child");
        self.remove_from_parent(child);
        self.nodes[parent.0].children.insert(0, child);
        self.nodes[child.0].parent = Some(parent);
        self.track_root(child);
    }

    /// Adds `child` at the end of `parent`'s children, detaching it from any other parent.
    pub fn add_last_child(&mut self, parent: PlanNodeId, child: PlanNodeId) {
        assert_ne!(parent, child, "a node cannot be its own child");
        self.remove_from_parent(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        self.track_root(child);
    }

    pub fn add_children(&mut self, parent: PlanNodeId, children: &[PlanNodeId]) {
        for child in children {
            self.add_last_child(parent, *child);
        }
    }

    /// Removes `child` from `parent`. Returns false if it was not a child of `parent`.
    pub fn remove_child(&mut self, parent: PlanNodeId, child: PlanNodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.remove_from_parent(child);
        true
    }

    /// Detaches and returns all children of `parent`, in order.
    pub fn remove_all_children(&mut self, parent: PlanNodeId) -> Vec<PlanNodeId> {
        let children = std::mem::take(&mut self.nodes[parent.0].children);
        for child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Puts `replacement` where `original` is among `parent`'s children.
    ///
    /// If `replacement` is already a child of `parent` the two swap positions. Otherwise
    /// `replacement` is detached from its own parent and `original` ends up parentless.
    /// Returns false if `original` is not a child of `parent`.
    pub fn replace_child(&mut self, parent: PlanNodeId, original: PlanNodeId, replacement: PlanNodeId) -> bool {
        let index = match self.nodes[parent.0].children.iter().position(|c| *c == original) {
            Some(index) => index,
            None => return false,
        };
        if original == replacement {
            return true;
        }
        if self.parent(replacement) == Some(parent) {
            let other = self.nodes[parent.0]
                .children
                .iter()
                .position(|c| *c == replacement)
                .unwrap_or(index);
            self.nodes[parent.0].children.swap(index, other);
            return true;
        }
        self.remove_from_parent(replacement);
        self.nodes[parent.0].children[index] = replacement;
        self.nodes[replacement.0].parent = Some(parent);
        self.nodes[original.0].parent = None;
        self.track_root(replacement);
        true
    }

    /// Removes `child` from `parent`, promoting the child's first child into its place.
    ///
    /// A childless `child` is simply detached. Any further children stay with `child`.
    pub fn extract_child(&mut self, parent: PlanNodeId, child: PlanNodeId) {
        match self.first_child(child) {
            None => {
                self.remove_child(parent, child);
            }
            Some(grandchild) => {
                self.replace_child(parent, child, grandchild);
            }
        }
    }

    /// Extracts `id` from its parent; see [`PlanTree::extract_child`].
    ///
    /// If `id` is the root, its first child becomes the new root.
    pub fn extract_from_parent(&mut self, id: PlanNodeId) {
        match self.parent(id) {
            Some(parent) => self.extract_child(parent, id),
            None => {
                if let Some(first) = self.first_child(id) {
                    self.remove_from_parent(first);
                    if self.root == Some(id) {
                        self.root = Some(first);
                    }
                }
            }
        }
    }

    // Relationship queries

    /// Nodes from `id` down to `descendant`, both included; empty if `descendant` is not at or
    /// below `id`.
    pub fn path_to(&self, id: PlanNodeId, descendant: PlanNodeId) -> Vec<PlanNodeId> {
        let mut path = VecDeque::new();
        let mut current = Some(descendant);
        while let Some(node) = current {
            path.push_front(node);
            if node == id {
                return path.into_iter().collect();
            }
            current = self.parent(node);
        }
        Vec::new()
    }

    /// True if any proper ancestor of `id` has one of the types.
    pub fn has_ancestor_of_type(&self, id: PlanNodeId, types: &[NodeType]) -> bool {
        self.find_ancestor(id, types).is_some()
    }

    /// Nearest proper ancestor of `id` with one of the types.
    pub fn find_ancestor(&self, id: PlanNodeId, types: &[NodeType]) -> Option<PlanNodeId> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.node(node).is_one_of(types) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// True if `id` is a proper descendant of `other`.
    pub fn is_below(&self, id: PlanNodeId, other: PlanNodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == other {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// True if `id` is a proper ancestor of `other`.
    pub fn is_above(&self, id: PlanNodeId, other: PlanNodeId) -> bool {
        self.is_below(other, id)
    }

    /// Every node at or below `id`, in the given order.
    pub fn walk(&self, id: PlanNodeId, order: Traversal) -> Vec<PlanNodeId> {
        let mut result = Vec::new();
        match order {
            Traversal::LevelOrder => {
                let mut queue = VecDeque::new();
                queue.push_back(id);
                while let Some(node) = queue.pop_front() {
                    result.push(node);
                    queue.extend(self.children(node).iter().copied());
                }
            }
            Traversal::PreOrder => {
                let mut stack = vec![id];
                while let Some(node) = stack.pop() {
                    result.push(node);
                    stack.extend(self.children(node).iter().rev().copied());
                }
            }
        }
        result
    }

    /// First node at or below `id` with one of the types.
    pub fn find_at_or_below(&self, id: PlanNodeId, order: Traversal, types: &[NodeType]) -> Option<PlanNodeId> {
        self.walk(id, order)
            .into_iter()
            .find(|n| self.node(*n).is_one_of(types))
    }

    /// All nodes at or below `id` with one of the types.
    pub fn find_all_at_or_below(&self, id: PlanNodeId, order: Traversal, types: &[NodeType]) -> Vec<PlanNodeId> {
        self.walk(id, order)
            .into_iter()
            .filter(|n| self.node(*n).is_one_of(types))
            .collect()
    }

    /// Nodes of the type at or below `id` that have no ancestor of that type within the subtree.
    pub fn find_all_first_nodes_at_or_below(&self, id: PlanNodeId, node_type: NodeType) -> Vec<PlanNodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if self.node(node).is(node_type) {
                result.push(node);
            } else {
                stack.extend(self.children(node).iter().rev().copied());
            }
        }
        result
    }

    // Copies and comparison

    /// Deep-copies the subtree at `id` into new parentless nodes of this arena.
    pub fn clone_subtree(&mut self, id: PlanNodeId) -> PlanNodeId {
        let copy = PlanNodeId(self.nodes.len());
        let data = self.node(id).detached_copy();
        self.nodes.push(data);
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.nodes[copy.0].children.push(child_copy);
            self.nodes[child_copy.0].parent = Some(copy);
        }
        copy
    }

    /// Copies the subtree at `id` into a new tree whose root is the copy.
    pub fn extract_tree(&self, id: PlanNodeId) -> PlanTree {
        let mut tree = PlanTree::new();
        let root = tree.copy_from(self, id);
        tree.root = Some(root);
        tree
    }

    fn copy_from(&mut self, other: &PlanTree, id: PlanNodeId) -> PlanNodeId {
        let copy = PlanNodeId(self.nodes.len());
        self.nodes.push(other.node(id).detached_copy());
        for child in other.children(id) {
            let child_copy = self.copy_from(other, *child);
            self.nodes[copy.0].children.push(child_copy);
            self.nodes[child_copy.0].parent = Some(copy);
        }
        copy
    }

    /// Structural equality of the subtree at `id` and the subtree at `other_id` in `other`.
    pub fn is_same_as(&self, id: PlanNodeId, other: &PlanTree, other_id: PlanNodeId) -> bool {
        let (a, b) = (self.node(id), other.node(other_id));
        if !a.same_data(b) || a.children.len() != b.children.len() {
            return false;
        }
        a.children
            .iter()
            .zip(b.children.iter())
            .all(|(x, y)| self.is_same_as(*x, other, *y))
    }

    /// Multi-line rendering of the subtree at `id`, two spaces of indent per level.
    pub fn render(&self, id: PlanNodeId) -> String {
        let mut s = String::new();
        self.render_into(id, 0, &mut s);
        s
    }

    fn render_into(&self, id: PlanNodeId, depth: usize, s: &mut String) {
        if depth > 0 {
            s.push('\n');
        }
        s.push_str(&"  ".repeat(depth));
        s.push_str(&self.node(id).describe());
        for child in self.children(id) {
            self.render_into(*child, depth + 1, s);
        }
    }

    /// Serializes the plan tree as json.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }

    /// De-Serializes a json representation of the plan tree created in to_json.
    pub fn from_json(json: &str) -> Result<Self, RepoError> {
        let tree: PlanTree = serde_json::from_str(json)
            .map_err(|e| RepoError::ValidationError(format!("Malformatted plan json: {}", e)))?;
        for (i, node) in tree.nodes.iter().enumerate() {
            for child in &node.children {
                if child.0 >= tree.nodes.len() || tree.nodes[child.0].parent != Some(PlanNodeId(i)) {
                    return Err(RepoError::ValidationError(String::from(
                        "Malformatted plan json: inconsistent parent links",
                    )));
                }
            }
        }
        Ok(tree)
    }
}

impl fmt::Display for PlanTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.root {
            Some(root) => write!(f, "{}", self.render(root)),
            None => write!(f, "<empty plan>"),
        }
    }
}
