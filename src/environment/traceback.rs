//! Trace frames recorded by abnormal results

use crate::interpreter::types::Span;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Module plus statement position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub module: Rc<str>,
    pub span: Span,
}

impl Location {
    pub fn new(module: impl Into<Rc<str>>, span: Span) -> Self {
        Self {
            module: module.into(),
            span,
        }
    }

    /// Location for values raised from native code
    pub fn native(function: &str) -> Self {
        Self::new(format!("<native {}>", function), Span::default())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module, self.span.line, self.span.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub location: Location,
    pub description: String,
}

impl TraceFrame {
    pub fn new(location: Location, description: impl Into<String>) -> Self {
        Self {
            location,
            description: description.into(),
        }
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  at {}: {}", self.location, self.description)
    }
}

/// Bounded stack of trace frames
///
/// When full, the oldest frame is dropped. Marks count dropped frames too,
/// so a mark taken before an overflow still truncates correctly.
#[derive(Debug, Clone, Default)]
pub struct Traceback {
    frames: VecDeque<TraceFrame>,
    /// Zero means unbounded
    limit: usize,
    dropped: usize,
}

impl Traceback {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    /// Total frames pushed and not popped, including dropped ones
    pub fn depth(&self) -> usize {
        self.dropped + self.frames.len()
    }

    pub fn mark(&self) -> usize {
        self.depth()
    }

    /// Pop frames until the depth is back to `mark`
    pub fn truncate(&mut self, mark: usize) {
        while self.depth() > mark && self.frames.pop_back().is_some() {}
        if self.depth() > mark {
            self.dropped = mark;
        }
    }

    pub fn push(&mut self, frame: TraceFrame) {
        trace!(location = %frame.location, description = %frame.description, "trace push");
        if self.limit > 0 && self.frames.len() >= self.limit {
            self.frames.pop_front();
            self.dropped += 1;
        }
        self.frames.push_back(frame);
    }

    pub fn pop(&mut self) -> Option<TraceFrame> {
        self.frames.pop_back()
    }

    pub fn frames(&self) -> impl Iterator<Item = &TraceFrame> {
        self.frames.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.dropped = 0;
    }

    /// Render oldest first
    pub fn format(&self) -> String {
        let mut out = String::from("Traceback (most recent last):\n");
        if self.dropped > 0 {
            out.push_str(&format!("  ... {} earlier frames dropped\n", self.dropped));
        }
        for frame in &self.frames {
            out.push_str(&frame.to_string());
            out.push('\n');
        }
        out
    }
}
