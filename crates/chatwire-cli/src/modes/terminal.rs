//! Line-oriented terminal surface.
//!
//! A terminal cannot edit lines that have scrolled away, so only the most
//! recently printed node (the tail) is updated in place. Appends to the tail
//! stream just the new suffix; any other change reprints the node.
//!
//! # Output contract
//! - Messages → stdout
//! - Tool activity → stderr
//! - Meta items → stdout in chat mode, stderr in exec mode

use std::collections::HashMap;
use std::io::{Stderr, Stdout, Write, stderr, stdout};

use chatwire_core::protocol::MESSAGE_KIND;
use chatwire_core::{Node, NodeHandle, Surface, ToolActivity, ToolPhase};
use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};

const USER_LABEL: &str = "you> ";
const ASSISTANT_LABEL: &str = "assistant> ";
const META_LABEL: &str = "· ";

/// How a [`TerminalSurface`] lays out the transcript.
#[derive(Debug, Clone, Copy)]
pub struct TerminalOptions {
    /// Prefix each node with a role label.
    pub labels: bool,
    /// Print the user's own messages.
    pub echo_user: bool,
    /// Send meta items to stderr instead of stdout.
    pub meta_to_stderr: bool,
    /// Prompt shown whenever input is re-enabled.
    pub prompt: Option<&'static str>,
    /// Rewrite a single-line tail with cursor movement instead of reprinting.
    pub rewrite_in_place: bool,
}

impl TerminalOptions {
    /// Interactive chat: labelled transcript with a prompt.
    pub fn chat(rewrite_in_place: bool) -> Self {
        Self {
            labels: true,
            echo_user: false,
            meta_to_stderr: false,
            prompt: Some("> "),
            rewrite_in_place,
        }
    }

    /// Single-shot exec: bare assistant text on stdout.
    pub fn exec() -> Self {
        Self {
            labels: false,
            echo_user: false,
            meta_to_stderr: true,
            prompt: None,
            rewrite_in_place: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    label: &'static str,
    hidden: bool,
    to_stderr: bool,
}

/// Terminal renderer backed by a pair of writers.
pub struct TerminalSurface<O = Stdout, E = Stderr> {
    out: O,
    err: E,
    options: TerminalOptions,
    entries: HashMap<NodeHandle, Entry>,
    tail: Option<NodeHandle>,
    /// Text of the tail as currently printed (without its label).
    tail_text: String,
    /// Whether the cursor sits after printed output on the current line.
    needs_newline: bool,
}

impl TerminalSurface {
    pub fn stdio(options: TerminalOptions) -> Self {
        Self::new(stdout(), stderr(), options)
    }
}

impl<O: Write, E: Write> TerminalSurface<O, E> {
    pub fn new(out: O, err: E, options: TerminalOptions) -> Self {
        Self {
            out,
            err,
            options,
            entries: HashMap::new(),
            tail: None,
            tail_text: String::new(),
            needs_newline: false,
        }
    }

    /// Terminates the current output line, if any.
    pub fn finish(&mut self) {
        self.close_tail();
        let _ = self.out.flush();
        let _ = self.err.flush();
    }

    #[cfg(test)]
    fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    fn entry_for(&self, node: &Node) -> Entry {
        let is_message = node.kind == MESSAGE_KIND;
        let role = node.role.as_deref();
        let label = match (self.options.labels, is_message, role) {
            (false, _, _) => "",
            (true, true, Some("user")) => USER_LABEL,
            (true, true, Some("assistant")) => ASSISTANT_LABEL,
            (true, true, _) => "",
            (true, false, _) => META_LABEL,
        };
        Entry {
            label,
            hidden: is_message && role == Some("user") && !self.options.echo_user,
            to_stderr: !is_message && self.options.meta_to_stderr,
        }
    }

    fn close_tail(&mut self) {
        if self.needs_newline {
            let _ = writeln!(self.out);
            self.needs_newline = false;
        }
        self.tail = None;
        self.tail_text.clear();
    }

    fn print_tail(&mut self, handle: NodeHandle, entry: Entry, text: &str) {
        self.close_tail();
        let _ = write!(self.out, "{}{}", entry.label, text);
        let _ = self.out.flush();
        self.tail = Some(handle);
        self.tail_text = text.to_string();
        self.needs_newline = !entry.label.is_empty() || !text.is_empty();
    }

    fn print_side(&mut self, entry: Entry, text: &str) {
        let _ = writeln!(self.err, "{}{}", entry.label, text);
        let _ = self.err.flush();
    }

    fn tail_is_single_line(&self) -> bool {
        !self.tail_text.contains('\n')
    }

    fn clear_current_line(&mut self) {
        let _ = crossterm::queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine));
    }
}

impl<O: Write, E: Write> Surface for TerminalSurface<O, E> {
    fn materialize(&mut self, handle: NodeHandle, node: &Node) {
        let entry = self.entry_for(node);
        self.entries.insert(handle, entry);
        if entry.hidden {
            return;
        }
        if entry.to_stderr {
            self.print_side(entry, &node.text);
        } else {
            self.print_tail(handle, entry, &node.text);
        }
    }

    fn remove(&mut self, handle: NodeHandle) {
        self.entries.remove(&handle);
        if self.tail != Some(handle) {
            return;
        }
        if self.options.rewrite_in_place && self.tail_is_single_line() {
            self.clear_current_line();
            let _ = self.out.flush();
            self.needs_newline = false;
        }
        self.close_tail();
    }

    fn set_text(&mut self, handle: NodeHandle, text: &str) {
        let Some(entry) = self.entries.get(&handle).copied() else {
            return;
        };
        if entry.hidden {
            return;
        }
        if entry.to_stderr {
            self.print_side(entry, text);
            return;
        }

        if self.tail == Some(handle) {
            if let Some(delta) = text.strip_prefix(self.tail_text.as_str()) {
                if !delta.is_empty() {
                    let _ = write!(self.out, "{delta}");
                    let _ = self.out.flush();
                    self.needs_newline = true;
                }
                self.tail_text = text.to_string();
                return;
            }
            if self.options.rewrite_in_place && self.tail_is_single_line() {
                self.clear_current_line();
                let _ = write!(self.out, "{}{}", entry.label, text);
                let _ = self.out.flush();
                self.tail_text = text.to_string();
                self.needs_newline = true;
                return;
            }
        }

        self.print_tail(handle, entry, text);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if !enabled {
            return;
        }
        if let Some(prompt) = self.options.prompt {
            self.close_tail();
            let _ = write!(self.out, "{prompt}");
            let _ = self.out.flush();
        }
    }

    fn log_tool(&mut self, activity: &ToolActivity) {
        let verb = match activity.phase {
            ToolPhase::Call => "Tool call",
            ToolPhase::Output => "Tool output",
        };
        if activity.detail.is_empty() {
            let _ = writeln!(self.err, "{verb}: {}", activity.name);
        } else {
            let _ = writeln!(self.err, "{verb}: {} {}", activity.name, activity.detail);
        }
        let _ = self.err.flush();
    }
}
