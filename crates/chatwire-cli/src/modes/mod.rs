//! Runtime execution modes.
//!
//! - `chat`: Line-based interactive loop, one turn per input line
//! - `exec`: Non-interactive single turn streamed to stdout/stderr

pub mod chat;
pub mod exec;
pub mod terminal;
