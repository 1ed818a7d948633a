//! Applies decoded events to the registry, in arrival order.

use crate::history::HistoryTracker;
use crate::protocol::{RenderItem, StreamEvent};
use crate::render::{Registry, Surface};

/// What the read loop may do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFlow {
    Continue,
    /// The backend sent its end-of-stream marker.
    Done,
}

/// Applies one event. Never fails: malformed or unknown input is ignored.
pub fn dispatch<S: Surface>(
    event: StreamEvent,
    registry: &mut Registry<S>,
    tracker: &mut HistoryTracker,
) -> DispatchFlow {
    match event {
        StreamEvent::Render(item) => {
            if item.is_assistant_message() {
                tracker.record(&item.text);
            }
            registry.insert(item);
        }
        // Placeholder text is never a reply; only later patches to it count.
        StreamEvent::Placeholder(item) => {
            registry.insert(item);
        }
        StreamEvent::Patch(patch) => {
            if let Some(node) = registry.apply_patch(&patch)
                && node.is_assistant_message()
            {
                tracker.record(&node.text);
            }
        }
        StreamEvent::Done => return DispatchFlow::Done,
        StreamEvent::Error { message, code } => {
            tracing::warn!(%message, code = code.as_deref(), "Backend reported an error");
            registry.insert(RenderItem::meta(format!("Error: {message}")));
        }
        StreamEvent::Tool(activity) => registry.surface_mut().log_tool(&activity),
        StreamEvent::Unknown(event_type) => {
            tracing::debug!(%event_type, "Ignoring unknown event type");
        }
    }
    DispatchFlow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PatchKind, PatchOp, ToolActivity, ToolPhase};
    use crate::render::MemorySurface;

    fn setup() -> (Registry<MemorySurface>, HistoryTracker) {
        (Registry::new(MemorySurface::new()), HistoryTracker::new())
    }

    fn assistant(id: &str, text: &str) -> RenderItem {
        RenderItem::message("assistant", text).with_id(id)
    }

    #[test]
    fn test_render_and_placeholder_both_insert() {
        let (mut reg, mut tracker) = setup();
        dispatch(
            StreamEvent::Placeholder(assistant("p", "Thinking...")),
            &mut reg,
            &mut tracker,
        );
        dispatch(
            StreamEvent::Render(RenderItem::meta("note").with_id("n")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(reg.ids(), ["p", "n"]);
    }

    #[test]
    fn test_render_tracks_assistant_text_only() {
        let (mut reg, mut tracker) = setup();
        dispatch(
            StreamEvent::Render(RenderItem::message("user", "question")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(tracker.latest(), None);

        dispatch(
            StreamEvent::Render(assistant("m", "answer")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(tracker.latest(), Some("answer"));

        // Assistant role without the message kind is not a reply.
        let status = RenderItem {
            role: Some("assistant".into()),
            ..RenderItem::meta("status line")
        };
        dispatch(StreamEvent::Render(status), &mut reg, &mut tracker);
        assert_eq!(tracker.latest(), Some("answer"));
    }

    #[test]
    fn test_patch_tracks_cumulative_text() {
        let (mut reg, mut tracker) = setup();
        dispatch(
            StreamEvent::Render(assistant("m", "Hel")),
            &mut reg,
            &mut tracker,
        );
        dispatch(
            StreamEvent::Patch(PatchOp::append("m", "lo")),
            &mut reg,
            &mut tracker,
        );
        dispatch(
            StreamEvent::Patch(PatchOp::append("m", " there")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(tracker.latest(), Some("Hello there"));
    }

    #[test]
    fn test_placeholder_text_is_not_tracked() {
        let (mut reg, mut tracker) = setup();
        dispatch(
            StreamEvent::Placeholder(assistant("p", "Thinking...")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(reg.texts(), ["Thinking..."]);
        assert_eq!(tracker.latest(), None);

        dispatch(
            StreamEvent::Patch(PatchOp::replace("p", "Done thinking")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(tracker.latest(), Some("Done thinking"));
    }

    #[test]
    fn test_patch_on_unknown_id_is_silent() {
        let (mut reg, mut tracker) = setup();
        let flow = dispatch(
            StreamEvent::Patch(PatchOp::append("ghost", "boo")),
            &mut reg,
            &mut tracker,
        );
        assert_eq!(flow, DispatchFlow::Continue);
        assert!(reg.is_empty());
        assert_eq!(tracker.latest(), None);
    }

    #[test]
    fn test_unsupported_op_still_reads_back_text() {
        let (mut reg, mut tracker) = setup();
        reg.insert(assistant("m", "kept"));
        let patch = PatchOp {
            op: PatchKind::Unsupported("shout".into()),
            ..PatchOp::append("m", "!")
        };
        dispatch(StreamEvent::Patch(patch), &mut reg, &mut tracker);
        assert_eq!(tracker.latest(), Some("kept"));
    }

    #[test]
    fn test_error_renders_meta_item() {
        let (mut reg, mut tracker) = setup();
        let flow = dispatch(
            StreamEvent::Error {
                message: "unknown".into(),
                code: None,
            },
            &mut reg,
            &mut tracker,
        );
        assert_eq!(flow, DispatchFlow::Continue);
        let node = reg.entries().next().unwrap();
        assert_eq!(node.kind, "meta");
        assert_eq!(node.text, "Error: unknown");
        assert_eq!(tracker.latest(), None);
    }

    #[test]
    fn test_done_and_unknown() {
        let (mut reg, mut tracker) = setup();
        assert_eq!(
            dispatch(StreamEvent::Unknown("status".into()), &mut reg, &mut tracker),
            DispatchFlow::Continue
        );
        assert_eq!(
            dispatch(StreamEvent::Done, &mut reg, &mut tracker),
            DispatchFlow::Done
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_tool_activity_goes_to_side_log() {
        let (mut reg, mut tracker) = setup();
        let activity = ToolActivity {
            phase: ToolPhase::Call,
            name: "list_stores".into(),
            detail: "{}".into(),
        };
        dispatch(StreamEvent::Tool(activity.clone()), &mut reg, &mut tracker);
        assert!(reg.is_empty());
        assert_eq!(reg.surface().tool_log, vec![activity]);
    }
}
