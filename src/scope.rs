//! Scoped lookup stacks.
//!
//! Every per-directory declaration (variables, fragments, locale strings) is
//! visible to the directory that declares it and to all of its descendants,
//! and a nearer declaration shadows a farther one. During the depth-first
//! build this is modelled as a stack of frames: a frame is pushed when a
//! directory is entered and popped when it is left, so at any moment the
//! stack holds exactly the frames of the open ancestor chain.
//!
//! ```text
//! website/              push {title: "Home", lang: "en"}
//! website/blog/         push {title: "Blog"}
//!   lookup("title") → "Blog"     (nearest frame)
//!   lookup("lang")  → "en"       (inherited)
//! website/blog/         pop
//! website/about/        push {}
//!   lookup("title") → "Home"     (sibling sees the ancestor)
//! ```
//!
//! One generic [`ScopedStack`] serves every concern; the value type is the
//! only thing that differs between them.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScopeError {
    #[error("pop on an empty scope stack")]
    Empty,
}

/// One directory's contribution to a [`ScopedStack`].
pub type Frame<V> = HashMap<String, V>;

/// A stack of frames with nearest-enclosing lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedStack<V> {
    frames: Vec<Frame<V>>,
}

impl<V> Default for ScopedStack<V> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<V> ScopedStack<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame on top of the stack.
    pub fn push(&mut self, frame: Frame<V>) {
        self.frames.push(frame);
    }

    /// Remove and return the most recent frame.
    pub fn pop(&mut self) -> Result<Frame<V>, ScopeError> {
        self.frames.pop().ok_or(ScopeError::Empty)
    }

    /// Find `key` in the nearest frame that defines it.
    pub fn lookup(&self, key: &str) -> Option<&V> {
        self.frames.iter().rev().find_map(|frame| frame.get(key))
    }

    /// Number of frames currently on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
