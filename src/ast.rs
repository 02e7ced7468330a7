use crate::kind::NodeKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Handle into a [`Tree`]. `NodeId(n)` is the node with `id == n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Empty,
    Text { content: String },
    Delimiters { start: char, end: char },
}

/// Per-node annotations set during analysis.
pub type NodeContext = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub kind: NodeKind,
    pub level: usize,
    pub line_num: usize,
    pub payload: Payload,

    pub root: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,

    pub context: NodeContext,
    pub output: Option<String>,
    pub closing: Option<String>,
}

impl Node {
    pub(crate) fn new(
        id: usize,
        kind: NodeKind,
        level: usize,
        line_num: usize,
        payload: Payload,
    ) -> Self {
        Self {
            id,
            kind,
            level,
            line_num,
            payload,
            root: NodeId(0),
            parent: None,
            children: Vec::new(),
            prev_sibling: None,
            next_sibling: None,
            prev: None,
            next: None,
            context: NodeContext::new(),
            output: None,
            closing: None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { content } => Some(content),
            _ => None,
        }
    }

    pub fn delimiters(&self) -> Option<(char, char)> {
        match self.payload {
            Payload::Delimiters { start, end } => Some((start, end)),
            _ => None,
        }
    }

    pub fn handle(&self) -> NodeId {
        NodeId(self.id - 1)
    }
}

/// The reconstructed document: one arena, viewed either as a tree (from
/// [`Tree::root`]) or as the flat dump-order chain.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Nodes in dump order, following the `next` chain from the root.
    pub fn iter_flat(&self) -> FlatIter<'_> {
        FlatIter {
            tree: self,
            cursor: self.root(),
        }
    }

    /// Nodes in tree pre-order.
    pub fn iter_tree(&self) -> TreeIter<'_> {
        TreeIter {
            tree: self,
            stack: self.root().into_iter().collect(),
        }
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }
}

pub struct FlatIter<'a> {
    tree: &'a Tree,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for FlatIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.tree.get(id);
        self.cursor = node.next;
        Some(node)
    }
}

pub struct TreeIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id);
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}
