//! Host rendering surface.
//!
//! The registry owns the content; a surface only mirrors it onto whatever
//! realizes display nodes (a terminal, a widget tree, a test recorder).

use super::registry::{Node, NodeHandle};
use crate::protocol::ToolActivity;

/// Display operations the registry and turn loop call out to.
pub trait Surface {
    /// Creates a display node for `node`, placed after every existing node.
    fn materialize(&mut self, handle: NodeHandle, node: &Node);

    /// Detaches a previously materialized node.
    fn remove(&mut self, handle: NodeHandle);

    /// Replaces the full text of a node. `text` is the cumulative content.
    fn set_text(&mut self, handle: NodeHandle, text: &str);

    fn scroll_to_latest(&mut self) {}

    /// Enables or disables user input while a turn is in flight.
    fn set_input_enabled(&mut self, _enabled: bool) {}

    /// Records tool activity in a side log, outside the transcript.
    fn log_tool(&mut self, _activity: &ToolActivity) {}
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn materialize(&mut self, handle: NodeHandle, node: &Node) {
        (**self).materialize(handle, node);
    }

    fn remove(&mut self, handle: NodeHandle) {
        (**self).remove(handle);
    }

    fn set_text(&mut self, handle: NodeHandle, text: &str) {
        (**self).set_text(handle, text);
    }

    fn scroll_to_latest(&mut self) {
        (**self).scroll_to_latest();
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        (**self).set_input_enabled(enabled);
    }

    fn log_tool(&mut self, activity: &ToolActivity) {
        (**self).log_tool(activity);
    }
}

/// One call received by a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Materialize { handle: NodeHandle, text: String },
    Remove(NodeHandle),
    SetText { handle: NodeHandle, text: String },
    Scroll,
    InputEnabled(bool),
    Tool(ToolActivity),
}

/// Headless surface that records every call, in order.
#[derive(Debug, Default)]
pub struct MemorySurface {
    pub ops: Vec<SurfaceOp>,
    pub input_enabled: bool,
    pub tool_log: Vec<ToolActivity>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            input_enabled: true,
            ..Self::default()
        }
    }

    pub fn scroll_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Scroll))
            .count()
    }
}

impl Surface for MemorySurface {
    fn materialize(&mut self, handle: NodeHandle, node: &Node) {
        self.ops.push(SurfaceOp::Materialize {
            handle,
            text: node.text.clone(),
        });
    }

    fn remove(&mut self, handle: NodeHandle) {
        self.ops.push(SurfaceOp::Remove(handle));
    }

    fn set_text(&mut self, handle: NodeHandle, text: &str) {
        self.ops.push(SurfaceOp::SetText {
            handle,
            text: text.to_string(),
        });
    }

    fn scroll_to_latest(&mut self) {
        self.ops.push(SurfaceOp::Scroll);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
        self.ops.push(SurfaceOp::InputEnabled(enabled));
    }

    fn log_tool(&mut self, activity: &ToolActivity) {
        self.tool_log.push(activity.clone());
        self.ops.push(SurfaceOp::Tool(activity.clone()));
    }
}
