//! Shared data types for the collaborative document model: line identity,
//! positions/ranges/selections, the operation algebra, and remote cursors.
//!
//! Everything here is plain data with no I/O and no fallible constructors
//! beyond the invariants documented inline; the heavier logic (apply, OT,
//! position mapping) lives in sibling modules that operate on these types.

use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Process-unique identity for a document line.
///
/// Minted monotonically by the [`crate::document::Document`] that owns the
/// line's lineage; never reused, even after the line is deleted. Downstream
/// view layers key on this (not on text content or index) to avoid reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct LineId(pub u64);

/// A single line of text together with its stable identity.
///
/// Text is `Arc<str>`, not `Rc<str>`: the server coordinator (`server.rs`)
/// owns a `Document` inside a future spawned with `tokio::spawn`, which
/// requires `Send`, so every value reachable from a `Document` must be
/// `Send` too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub id: LineId,
    pub text: Arc<str>,
}

impl Line {
    pub fn new(id: LineId, text: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// A zero-based line/column position.
///
/// Columns are counted in Unicode scalar values (`char`s), not UTF-16 code
/// units or bytes. See DESIGN.md for why this implementation picked that
/// unit over the JavaScript-native one the distilled spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A pair of positions; either endpoint may come first in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub anchor: Position,
    pub focus: Position,
}

impl Range {
    #[must_use]
    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    #[must_use]
    pub fn collapsed(at: Position) -> Self {
        Self {
            anchor: at,
            focus: at,
        }
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A non-empty ordered sequence of ranges plus a primary index.
///
/// The primary range drives single-cursor UI decisions; every range
/// (primary or not) is mapped through every applied operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiSelection {
    ranges: Vec<Range>,
    primary: usize,
}

impl MultiSelection {
    /// # Panics
    ///
    /// Panics if `ranges` is empty or `primary` is out of bounds; a
    /// selection with zero ranges, or a dangling primary index, is not a
    /// representable value.
    #[must_use]
    pub fn new(ranges: Vec<Range>, primary: usize) -> Self {
        assert!(
            !ranges.is_empty(),
            "a selection must contain at least one range"
        );
        assert!(primary < ranges.len(), "primary index out of bounds");
        Self { ranges, primary }
    }

    #[must_use]
    pub fn single(range: Range) -> Self {
        Self {
            ranges: vec![range],
            primary: 0,
        }
    }

    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    #[must_use]
    pub fn primary(&self) -> Range {
        self.ranges[self.primary]
    }

    #[must_use]
    pub const fn primary_index(&self) -> usize {
        self.primary
    }

    pub fn into_ranges(self) -> Vec<Range> {
        self.ranges
    }
}

/// Where an operation came from. Purely informational: it is never consulted
/// by apply or transform, only by hosts that filter or display operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Input,
    Remote,
    HistoryUndo,
    HistoryRedo,
    Command,
}

/// The seven operation variants the document model supports.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    InsertText {
        line: usize,
        column: usize,
        text: String,
    },
    DeleteText {
        line: usize,
        column: usize,
        length: usize,
    },
    InsertLine {
        index: usize,
        text: String,
    },
    DeleteLine {
        index: usize,
    },
    SplitLine {
        line: usize,
        column: usize,
    },
    MergeLine {
        line: usize,
    },
    ReplaceLine {
        index: usize,
        text: String,
    },
}

impl OperationKind {
    /// The sentinel the OT engine returns for a pair of operations that
    /// mutually cancel. Represented as an empty insert at the document
    /// origin so that applying it is a provable identity for any document
    /// shape (every document has at least a line 0, column 0 is always
    /// valid, and an empty insert never changes text).
    #[must_use]
    pub const fn noop() -> Self {
        Self::InsertText {
            line: 0,
            column: 0,
            text: String::new(),
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Self::InsertText { line: 0, column: 0, text } if text.is_empty()
        )
    }

    #[must_use]
    pub const fn is_text_op(&self) -> bool {
        matches!(self, Self::InsertText { .. } | Self::DeleteText { .. })
    }
}

/// A single edit to a document, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub origin: Origin,
}

impl Operation {
    #[must_use]
    pub const fn new(kind: OperationKind, origin: Origin) -> Self {
        Self { kind, origin }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.kind.is_noop()
    }

    /// Returns a copy of this operation with its `origin` normalized to
    /// `Remote`. Used by the codec when decoding operations arriving from
    /// the wire: an incoming op's origin is always normalized to `Remote`
    /// after decode, regardless of what the sender tagged it with.
    #[must_use]
    pub fn with_remote_origin(mut self) -> Self {
        self.origin = Origin::Remote;
        self
    }
}

/// A remote peer's cursor, as tracked by [`crate::cursor::CursorTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCursor {
    pub user_id: String,
    pub position: Position,
    pub color: String,
    pub name: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_collapsed() {
        let p = Position::new(0, 3);
        assert!(Range::collapsed(p).is_collapsed());
        assert!(!Range::new(p, Position::new(0, 4)).is_collapsed());
    }

    #[test]
    fn noop_is_recognized() {
        assert!(OperationKind::noop().is_noop());
        assert!(!OperationKind::InsertText {
            line: 0,
            column: 0,
            text: "x".into()
        }
        .is_noop());
        assert!(!OperationKind::InsertText {
            line: 1,
            column: 0,
            text: String::new()
        }
        .is_noop());
    }

    #[test]
    #[should_panic(expected = "at least one range")]
    fn multi_selection_rejects_empty() {
        MultiSelection::new(vec![], 0);
    }
}
