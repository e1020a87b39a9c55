//! In-memory DOM used by the CLI and the test suite.
//!
//! Models just enough of a browser page for the overlay: a document holding
//! the viewer container, page layers found by selector inside that container,
//! canvases with a record of what is currently painted, and resize observers.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Sender};
use tracing::trace;

use super::{HostError, OverlayShape, ResizeSubscription, SurfaceHost, SurfaceSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// What a headless canvas currently shows
#[derive(Debug, Clone, Default)]
pub struct CanvasState {
    pub size: SurfaceSize,
    pub pointer_events_none: bool,
    pub absolutely_positioned: bool,
    /// Shapes on the bitmap right now
    pub visible: Vec<OverlayShape>,
    pub draw_calls: usize,
    pub clear_calls: usize,
}

#[derive(Debug)]
enum NodeKind {
    Document,
    Container,
    Element { selector: String },
    Canvas(CanvasState),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    size: SurfaceSize,
    kind: NodeKind,
}

pub struct HeadlessDom {
    nodes: HashMap<NodeId, Node>,
    document: NodeId,
    root: NodeId,
    next_id: u64,
    observers: HashMap<u64, (NodeId, Sender<SurfaceSize>)>,
    next_observer: u64,
}

impl HeadlessDom {
    pub fn new() -> Self {
        let document = NodeId(0);
        let root = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            document,
            Node {
                parent: None,
                children: vec![root],
                size: SurfaceSize::default(),
                kind: NodeKind::Document,
            },
        );
        nodes.insert(
            root,
            Node {
                parent: Some(document),
                children: Vec::new(),
                size: SurfaceSize::default(),
                kind: NodeKind::Container,
            },
        );
        Self {
            nodes,
            document,
            root,
            next_id: 2,
            observers: HashMap::new(),
            next_observer: 1,
        }
    }

    /// The viewer container every page layer hangs off
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn insert(&mut self, parent: NodeId, size: SurfaceSize, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                parent: Some(parent),
                children: Vec::new(),
                size,
                kind,
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    /// Simulate the viewer rendering its page layer
    pub fn mount_page_layer(&mut self, selector: &str, size: SurfaceSize) -> NodeId {
        let root = self.root;
        self.insert(
            root,
            size,
            NodeKind::Element {
                selector: selector.to_string(),
            },
        )
    }

    /// A matching element elsewhere in the document, e.g. a second viewer
    pub fn mount_outside_container(&mut self, selector: &str, size: SurfaceSize) -> NodeId {
        let document = self.document;
        self.insert(
            document,
            size,
            NodeKind::Element {
                selector: selector.to_string(),
            },
        )
    }

    fn in_container(&self, id: NodeId) -> bool {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if parent == self.root {
                return true;
            }
            current = self.nodes.get(&parent).and_then(|n| n.parent);
        }
        false
    }

    /// Simulate the viewer unmounting a node: the node and its whole subtree
    /// are gone
    pub fn remove_node(&mut self, id: NodeId) {
        if id == self.root || id == self.document {
            return;
        }
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut pending = node.children;
        while let Some(child) = pending.pop() {
            if let Some(n) = self.nodes.remove(&child) {
                pending.extend(n.children);
            }
        }
    }

    /// Change a node's rendered box and notify its resize observers
    pub fn resize_node(&mut self, id: NodeId, size: SurfaceSize) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.size = size;
        self.observers
            .retain(|_, (target, tx)| *target != id || tx.send(size).is_ok());
    }

    pub fn node_size(&self, id: NodeId) -> SurfaceSize {
        self.nodes.get(&id).map(|n| n.size).unwrap_or_default()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn is_child_of(&self, child: NodeId, parent: NodeId) -> bool {
        self.nodes
            .get(&parent)
            .map(|p| p.children.contains(&child))
            .unwrap_or(false)
    }

    pub fn canvas(&self, id: NodeId) -> Option<&CanvasState> {
        match self.nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Canvas(state)) => Some(state),
            _ => None,
        }
    }

    fn canvas_mut(&mut self, id: NodeId) -> Option<&mut CanvasState> {
        match self.nodes.get_mut(&id).map(|n| &mut n.kind) {
            Some(NodeKind::Canvas(state)) => Some(state),
            _ => None,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Default for HeadlessDom {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceHost for HeadlessDom {
    type Anchor = NodeId;
    type Canvas = NodeId;

    /// Only the viewer container is searched
    fn query_anchor(&self, selector: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|(id, node)| {
                matches!(&node.kind, NodeKind::Element { selector: s } if s == selector)
                    && self.in_container(**id)
            })
            .map(|(id, _)| *id)
            .max()
    }

    fn anchor_size(&self, anchor: &NodeId) -> SurfaceSize {
        self.node_size(*anchor)
    }

    fn is_connected(&self, anchor: &NodeId) -> bool {
        let mut current = Some(*anchor);
        while let Some(id) = current {
            if id == self.document {
                return true;
            }
            current = match self.nodes.get(&id) {
                Some(node) => node.parent,
                None => return false,
            };
        }
        false
    }

    fn mount_canvas(&mut self, anchor: &NodeId) -> Result<NodeId, HostError> {
        if !self.contains(*anchor) {
            return Err(HostError::NodeDetached);
        }
        let state = CanvasState {
            pointer_events_none: true,
            absolutely_positioned: true,
            ..CanvasState::default()
        };
        Ok(self.insert(*anchor, SurfaceSize::default(), NodeKind::Canvas(state)))
    }

    fn set_canvas_size(&mut self, canvas: &NodeId, size: SurfaceSize) {
        if let Some(node) = self.nodes.get_mut(canvas) {
            node.size = size;
        }
        if let Some(state) = self.canvas_mut(*canvas) {
            state.size = size;
            state.visible.clear();
        }
    }

    /// Like a browser ResizeObserver, the current box is reported once as
    /// soon as observation starts
    fn observe_resize(&mut self, anchor: &NodeId) -> ResizeSubscription {
        let (tx, rx) = channel();
        let id = self.next_observer;
        self.next_observer += 1;
        let _ = tx.send(self.node_size(*anchor));
        self.observers.insert(id, (*anchor, tx));
        ResizeSubscription::new(id, rx)
    }

    fn unobserve(&mut self, subscription: &ResizeSubscription) {
        self.observers.remove(&subscription.id());
    }

    fn clear_canvas(&mut self, canvas: &NodeId, _size: SurfaceSize) {
        if let Some(state) = self.canvas_mut(*canvas) {
            state.visible.clear();
            state.clear_calls += 1;
        }
    }

    fn draw_rect(&mut self, canvas: &NodeId, shape: &OverlayShape) {
        trace!(?shape, "draw_rect");
        if let Some(state) = self.canvas_mut(*canvas) {
            state.visible.push(shape.clone());
            state.draw_calls += 1;
        }
    }

    fn unmount_canvas(&mut self, anchor: &NodeId, canvas: &NodeId) -> Result<(), HostError> {
        if !self.is_child_of(*canvas, *anchor) {
            return Err(HostError::NodeDetached);
        }
        self.remove_node(*canvas);
        Ok(())
    }
}
