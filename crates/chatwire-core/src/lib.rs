//! Core chatwire library: frame decoding, event dispatch, render registry,
//! and the turn loop that drives them.

pub mod config;
pub mod dispatch;
pub mod history;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod transport;
pub mod turn;

pub use dispatch::{DispatchFlow, dispatch};
pub use history::{ConversationTurn, HistoryTracker, Role};
pub use protocol::{PatchKind, PatchOp, RenderItem, StreamEvent, ToolActivity, ToolPhase};
pub use render::{MemorySurface, Node, NodeHandle, Registry, Surface};
pub use transport::{HttpTransport, Transport, TransportError, TransportErrorKind};
pub use turn::{Session, SessionOptions, SubmitError, TurnOutcome, TurnState};
