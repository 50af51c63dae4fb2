use glam::Mat4;
use orbitview_common::SceneId;

use crate::node::{DetachedNode, SceneNode};

/// Handle to a node inside one particular scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    scene: SceneId,
    index: u32,
}

impl NodeId {
    /// Position of the node in insertion order within its graph.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn scene(&self) -> SceneId {
        self.scene
    }
}

/// Errors from scene graph operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node {0:?} is not part of this scene graph")]
    InvalidParent(NodeId),
}

/// An event record produced by every structural mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    NodeAdded { id: NodeId, parent: NodeId },
    /// A detached subtree was inserted as one unit.
    SubtreeGrafted {
        root: NodeId,
        parent: NodeId,
        node_count: usize,
    },
}

#[derive(Debug, Clone)]
struct NodeSlot {
    node: SceneNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The scene: a tree of nodes under a single root group.
///
/// Nodes live in an arena indexed by insertion order and are never removed,
/// so every `NodeId` handed out stays valid for the graph's lifetime. The
/// structure is a tree by construction: a node gets exactly one parent when
/// inserted and parents cannot be changed afterwards.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    id: SceneId,
    nodes: Vec<NodeSlot>,
    event_log: Vec<SceneEvent>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph holding only the root group.
    pub fn new() -> Self {
        Self {
            id: SceneId::new(),
            nodes: vec![NodeSlot {
                node: SceneNode::group("root"),
                parent: None,
                children: Vec::new(),
            }],
            event_log: Vec::new(),
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        NodeId {
            scene: self.id,
            index: 0,
        }
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.scene == self.id && id.index() < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.slot(id).map(|s| &s.node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.contains(id) {
            Some(&mut self.nodes[id.index()].node)
        } else {
            None
        }
    }

    /// Children in insertion order. Empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|s| s.parent)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Insert `node` as the last child of `parent`.
    pub fn add_node(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::InvalidParent(parent));
        }
        let id = self.push(parent, node);
        self.event_log.push(SceneEvent::NodeAdded { id, parent });
        Ok(id)
    }

    /// Insert a whole detached subtree as the last child of `parent`,
    /// keeping the subtree's child order. Returns the id of its root.
    pub fn graft(&mut self, parent: NodeId, subtree: DetachedNode) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::InvalidParent(parent));
        }
        let before = self.nodes.len();
        let root = self.insert_subtree(parent, subtree);
        let node_count = self.nodes.len() - before;
        tracing::debug!(node_count, "grafted subtree");
        self.event_log.push(SceneEvent::SubtreeGrafted {
            root,
            parent,
            node_count,
        });
        Ok(root)
    }

    /// Depth-first traversal from the root: parent before children, siblings
    /// in insertion order. Each call starts a fresh, independent sequence.
    pub fn traverse(&self) -> Traverse<'_> {
        self.traverse_from(self.root())
    }

    /// Depth-first traversal of the subtree rooted at `start`. Empty if
    /// `start` is not in this graph.
    pub fn traverse_from(&self, start: NodeId) -> Traverse<'_> {
        let stack = if self.contains(start) {
            vec![(start, 0)]
        } else {
            Vec::new()
        };
        Traverse { graph: self, stack }
    }

    /// Visitor form of [`traverse`](Self::traverse).
    pub fn walk(&self, mut visitor: impl FnMut(Visit<'_>)) {
        for visit in self.traverse() {
            visitor(visit);
        }
    }

    /// Local-to-world matrix of a node, composed up through its ancestors.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut slot = self.slot(id)?;
        let mut matrix = slot.node.transform.to_matrix();
        while let Some(parent) = slot.parent {
            slot = &self.nodes[parent.index()];
            matrix = slot.node.transform.to_matrix() * matrix;
        }
        Some(matrix)
    }

    /// Number of nodes in the subtree rooted at `id`, including itself.
    pub fn subtree_size(&self, id: NodeId) -> usize {
        self.traverse_from(id).count()
    }

    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        if self.contains(id) {
            Some(&self.nodes[id.index()])
        } else {
            None
        }
    }

    fn push(&mut self, parent: NodeId, node: SceneNode) -> NodeId {
        let id = NodeId {
            scene: self.id,
            index: self.nodes.len() as u32,
        };
        self.nodes.push(NodeSlot {
            node,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    fn insert_subtree(&mut self, parent: NodeId, subtree: DetachedNode) -> NodeId {
        let DetachedNode { node, children } = subtree;
        let id = self.push(parent, node);
        for child in children {
            self.insert_subtree(id, child);
        }
        id
    }
}

/// One step of a traversal.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub id: NodeId,
    /// Distance from the traversal's starting node.
    pub depth: usize,
    pub node: &'a SceneNode,
}

/// Lazy depth-first iterator over a scene graph.
#[derive(Debug, Clone)]
pub struct Traverse<'a> {
    graph: &'a SceneGraph,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let slot = &self.graph.nodes[id.index()];
        // Reverse so the first child is popped first.
        self.stack
            .extend(slot.children.iter().rev().map(|c| (*c, depth + 1)));
        Some(Visit {
            id,
            depth,
            node: &slot.node,
        })
    }
}
