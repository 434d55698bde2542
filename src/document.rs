// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The document model: an immutable, line-structured text buffer and the
//! single `apply` primitive every other module builds on.
//!
//! A [`Document`] is cheap to clone: unchanged lines share their `Arc<str>`
//! text buffer with every prior version, so holding on to an old document
//! value after a later `apply` costs one `Vec<Line>` worth of pointers, not
//! a deep copy of the text. `Arc` (not `Rc`) because a `Document` is owned
//! across `.await` points by futures that `tokio::spawn` requires to be
//! `Send` (the server coordinator in `server.rs`).

use tracing::trace;

use crate::types::{Line, LineId, Operation, OperationKind};

/// A line-structured document. Always has at least one line; an empty
/// document is represented as exactly one line with empty text, never zero
/// lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Strictly increases by one for every `apply` that actually changes
    /// the document's content; untouched by no-op applies.
    pub version: u64,
    lines: Vec<Line>,
    next_line_id: u64,
}

impl Document {
    /// A document containing a single empty line.
    #[must_use]
    pub fn new_empty() -> Self {
        Self::from_text("")
    }

    /// Builds a document from `\n`-separated text. An empty string yields a
    /// single empty line, matching [`Self::new_empty`].
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let raw_lines: Vec<&str> = if text.is_empty() {
            vec![""]
        } else {
            text.split('\n').collect()
        };
        let mut next_line_id = 0u64;
        let lines = raw_lines
            .into_iter()
            .map(|line_text| {
                let id = LineId(next_line_id);
                next_line_id += 1;
                Line::new(id, line_text)
            })
            .collect();
        Self {
            version: 0,
            lines,
            next_line_id,
        }
    }

    /// Renders the document back to `\n`-joined text.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_ref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    fn mint_line_id(&mut self) -> LineId {
        let id = LineId(self.next_line_id);
        self.next_line_id += 1;
        id
    }

    /// Applies a single operation, returning the resulting document.
    ///
    /// Out-of-bounds targets (a line index beyond `line_count`, a column
    /// beyond the line's length) are treated as a no-op rather than a
    /// panic or error: the returned document is identical to `self` and
    /// `version` is unchanged. This keeps the function total, which matters
    /// once operations start arriving transformed through concurrent edits
    /// from other peers.
    #[must_use]
    pub fn apply(&self, op: &Operation) -> Self {
        let mut next = self.clone();
        if next.apply_in_place(&op.kind) {
            next.version += 1;
            next
        } else {
            trace!(?op, "apply: no-op");
            self.clone()
        }
    }

    /// Applies a sequence of operations in order, threading the document
    /// through each one.
    #[must_use]
    pub fn apply_many(&self, ops: &[Operation]) -> Self {
        ops.iter().fold(self.clone(), |doc, op| doc.apply(op))
    }

    /// Mutates `self` in place to reflect `kind`. Returns whether the
    /// document's visible content actually changed.
    fn apply_in_place(&mut self, kind: &OperationKind) -> bool {
        match *kind {
            OperationKind::InsertText {
                line,
                column,
                ref text,
            } => self.insert_text(line, column, text),
            OperationKind::DeleteText {
                line,
                column,
                length,
            } => self.delete_text(line, column, length),
            OperationKind::InsertLine { index, ref text } => self.insert_line(index, text),
            OperationKind::DeleteLine { index } => self.delete_line(index),
            OperationKind::SplitLine { line, column } => self.split_line(line, column),
            OperationKind::MergeLine { line } => self.merge_line(line),
            OperationKind::ReplaceLine { index, ref text } => self.replace_line(index, text),
        }
    }

    fn insert_text(&mut self, line: usize, column: usize, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let Some(existing) = self.lines.get(line) else {
            return false;
        };
        let chars: Vec<char> = existing.text.chars().collect();
        if column > chars.len() {
            return false;
        }
        let mut new_text: String = chars[..column].iter().collect();
        new_text.push_str(text);
        new_text.extend(&chars[column..]);
        self.lines[line] = Line::new(existing.id, new_text);
        true
    }

    fn delete_text(&mut self, line: usize, column: usize, length: usize) -> bool {
        if length == 0 {
            return false;
        }
        let Some(existing) = self.lines.get(line) else {
            return false;
        };
        let chars: Vec<char> = existing.text.chars().collect();
        if column > chars.len() {
            return false;
        }
        let end = (column + length).min(chars.len());
        if end == column {
            return false;
        }
        let mut new_text: String = chars[..column].iter().collect();
        new_text.extend(&chars[end..]);
        self.lines[line] = Line::new(existing.id, new_text);
        true
    }

    fn insert_line(&mut self, index: usize, text: &str) -> bool {
        if index > self.lines.len() {
            return false;
        }
        let id = self.mint_line_id();
        self.lines.insert(index, Line::new(id, text));
        true
    }

    fn delete_line(&mut self, index: usize) -> bool {
        if index >= self.lines.len() {
            return false;
        }
        // An empty document is exactly one empty line, never zero lines;
        // deleting the sole remaining line is a no-op rather than special
        // cased into "replace it with an empty line", since it's unclear
        // what id that replacement line would carry (a fresh id? the
        // deleted line's id?).
        if self.lines.len() == 1 {
            return false;
        }
        self.lines.remove(index);
        true
    }

    fn split_line(&mut self, line: usize, column: usize) -> bool {
        let Some(existing) = self.lines.get(line) else {
            return false;
        };
        let chars: Vec<char> = existing.text.chars().collect();
        if column > chars.len() {
            return false;
        }
        let prefix: String = chars[..column].iter().collect();
        let suffix: String = chars[column..].iter().collect();
        let id = existing.id;
        let new_id = self.mint_line_id();
        self.lines[line] = Line::new(id, prefix);
        self.lines.insert(line + 1, Line::new(new_id, suffix));
        true
    }

    fn merge_line(&mut self, line: usize) -> bool {
        if line + 1 >= self.lines.len() {
            return false;
        }
        let id = self.lines[line].id;
        let mut combined = self.lines[line].text.to_string();
        combined.push_str(&self.lines[line + 1].text);
        self.lines[line] = Line::new(id, combined);
        self.lines.remove(line + 1);
        true
    }

    fn replace_line(&mut self, index: usize, text: &str) -> bool {
        let Some(existing) = self.lines.get(index) else {
            return false;
        };
        if existing.text.as_ref() == text {
            return false;
        }
        self.lines[index] = Line::new(existing.id, text);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    #[test]
    fn empty_document_has_one_empty_line() {
        let doc = Document::new_empty();
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.text(), "");
    }

    #[test]
    fn insert_text_splices_into_line() {
        let doc = Document::from_text("hello world");
        let doc = doc.apply(&factories::insert_text(0, 5, ","));
        assert_eq!(doc.text(), "hello, world");
        assert_eq!(doc.version, 1);
    }

    #[traced_test]
    #[test]
    fn insert_text_out_of_bounds_is_noop() {
        let doc = Document::from_text("hi");
        let doc2 = doc.apply(&factories::insert_text(0, 50, "x"));
        assert_eq!(doc2, doc);
        assert_eq!(doc2.version, 0);
    }

    #[test]
    fn delete_text_clamps_at_end_of_line() {
        let doc = Document::from_text("hello");
        let doc = doc.apply(&factories::delete_text(0, 2, 100));
        assert_eq!(doc.text(), "he");
    }

    #[test]
    fn split_and_merge_round_trip_preserves_text() {
        let doc = Document::from_text("hello world");
        let split = doc.apply(&factories::split_line(0, 5));
        assert_eq!(split.text(), "hello\n world");
        let merged = split.apply(&factories::merge_line(0));
        assert_eq!(merged.text(), "hello world");
    }

    #[test]
    fn split_preserves_prefix_line_id_and_mints_a_fresh_suffix_id() {
        let doc = Document::from_text("hello world");
        let original_id = doc.line(0).unwrap().id;
        let split = doc.apply(&factories::split_line(0, 5));
        assert_eq!(split.line(0).unwrap().id, original_id);
        assert_ne!(split.line(1).unwrap().id, original_id);
    }

    #[test]
    fn delete_line_on_sole_line_is_noop() {
        let doc = Document::new_empty();
        let doc2 = doc.apply(&factories::delete_line(0));
        assert_eq!(doc2, doc);
    }

    #[test]
    fn insert_line_mints_a_new_id() {
        let doc = Document::from_text("a\nb");
        let doc = doc.apply(&factories::insert_line(1, "new"));
        assert_eq!(doc.text(), "a\nnew\nb");
        assert_eq!(doc.line_count(), 3);
    }

    #[test]
    fn unchanged_lines_share_storage_across_versions() {
        let doc = Document::from_text("a\nb\nc");
        let doc2 = doc.apply(&factories::replace_line(1, "B"));
        assert!(std::sync::Arc::ptr_eq(&doc.line(0).unwrap().text, &doc2.line(0).unwrap().text));
        assert!(std::sync::Arc::ptr_eq(&doc.line(2).unwrap().text, &doc2.line(2).unwrap().text));
    }

    #[test]
    fn version_only_increases_when_content_changes() {
        let doc = Document::from_text("abc");
        let doc = doc.apply(&factories::insert_text(0, 0, ""));
        assert_eq!(doc.version, 0);
        let doc = doc.apply(&factories::replace_line(0, "abc"));
        assert_eq!(doc.version, 0);
    }
}
