//! Table of displayed items, keyed by their stream identifier.
//!
//! Nodes live in an arena addressed by opaque [`NodeHandle`]s. A separate
//! index maps external ids to handles, and an order vector holds the display
//! order. `replace_id` is resolved once at insertion time and never stored.

use std::collections::HashMap;

use super::surface::Surface;
use crate::protocol::{MESSAGE_KIND, PatchKind, PatchOp, RenderItem};

/// Opaque handle to a materialized node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

/// A displayed item as currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: Option<String>,
    pub kind: String,
    pub role: Option<String>,
    pub dir: Option<String>,
    pub status: Option<String>,
    pub text: String,
}

impl Node {
    pub fn is_assistant_message(&self) -> bool {
        self.kind == MESSAGE_KIND && self.role.as_deref() == Some("assistant")
    }
}

impl From<RenderItem> for Node {
    fn from(item: RenderItem) -> Self {
        Self {
            id: item.id,
            kind: item.kind,
            role: item.role,
            dir: item.dir,
            status: item.status,
            text: item.text,
        }
    }
}

/// Owns every displayed node and mirrors changes onto a [`Surface`].
#[derive(Debug)]
pub struct Registry<S> {
    surface: S,
    nodes: HashMap<NodeHandle, Node>,
    by_id: HashMap<String, NodeHandle>,
    order: Vec<NodeHandle>,
    next_handle: u64,
}

impl<S: Surface> Registry<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            nodes: HashMap::new(),
            by_id: HashMap::new(),
            order: Vec::new(),
            next_handle: 0,
        }
    }

    /// Inserts `item` after all displayed nodes.
    ///
    /// A resolvable `replace_id` is removed first. An `id` that already names
    /// a live node replaces it, so each id maps to at most one node and the
    /// new node takes the latest display position.
    pub fn insert(&mut self, item: RenderItem) -> NodeHandle {
        if let Some(replace_id) = item.replace_id.as_deref() {
            self.detach(replace_id);
        }
        if let Some(id) = item.id.as_deref() {
            self.detach(id);
        }

        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;

        let node = Node::from(item);
        self.surface.materialize(handle, &node);
        if let Some(id) = &node.id {
            self.by_id.insert(id.clone(), handle);
        }
        self.order.push(handle);
        self.nodes.insert(handle, node);
        self.surface.scroll_to_latest();
        handle
    }

    /// Applies an incremental text mutation.
    ///
    /// Returns the target node after the patch, or `None` when the patch has
    /// no resolvable target.
    pub fn apply_patch(&mut self, patch: &PatchOp) -> Option<&Node> {
        if let Some(replace_id) = patch.replace_id.as_deref() {
            self.detach(replace_id);
        }

        let Some(id) = patch.id.as_deref() else {
            tracing::debug!("Dropping patch without target id");
            return None;
        };
        let Some(&handle) = self.by_id.get(id) else {
            tracing::debug!(id, "Dropping patch for unknown id");
            return None;
        };
        let node = self.nodes.get_mut(&handle)?;

        match &patch.op {
            PatchKind::AppendText => node.text.push_str(&patch.text),
            PatchKind::ReplaceText => node.text.clone_from(&patch.text),
            PatchKind::Unsupported(op) => {
                tracing::debug!(id, op, "Ignoring unsupported patch op");
                return self.nodes.get(&handle);
            }
        }

        self.surface.set_text(handle, &node.text);
        self.surface.scroll_to_latest();
        self.nodes.get(&handle)
    }

    /// Removes the node registered under `id`, if any.
    fn detach(&mut self, id: &str) -> bool {
        let Some(handle) = self.by_id.remove(id) else {
            return false;
        };
        self.nodes.remove(&handle);
        self.order.retain(|h| *h != handle);
        self.surface.remove(handle);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).and_then(|handle| self.nodes.get(handle))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Nodes in display order.
    pub fn entries(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|handle| self.nodes.get(handle))
    }

    /// Ids of addressable nodes, in display order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries().filter_map(|node| node.id.as_deref()).collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.entries().map(|node| node.text.as_str()).collect()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}
