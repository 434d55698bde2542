// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Maps a [`Position`]/[`Range`]/[`MultiSelection`] through an applied
//! operation, so that cursors and selections stay spatially accurate across
//! edits that were not the selection's own.
//!
//! Every function here is total: there is no "this position no longer makes
//! sense" outcome, only clamping, matching the apply engine's own no-op
//! policy for structurally invalid operations.

use crate::types::{MultiSelection, Operation, OperationKind, Position, Range};

/// Maps a single position through one operation, one arm per operation
/// variant; `mergeLine`'s column-preserving behavior on the absorbed line
/// is a known, intentionally-kept limitation (the mapper has no access to
/// the document, so it cannot know the anchor line's length to offset by).
#[must_use]
pub fn map_position(pos: Position, op: &OperationKind) -> Position {
    match *op {
        OperationKind::InsertText { line, column, ref text } => {
            if pos.line != line || pos.column < column {
                pos
            } else {
                Position::new(pos.line, pos.column + text.chars().count())
            }
        }
        OperationKind::DeleteText { line, column, length } => {
            if pos.line != line || pos.column <= column {
                pos
            } else if pos.column >= column + length {
                Position::new(pos.line, pos.column - length)
            } else {
                Position::new(pos.line, column)
            }
        }
        OperationKind::InsertLine { index, .. } => {
            if pos.line < index {
                pos
            } else {
                Position::new(pos.line + 1, pos.column)
            }
        }
        OperationKind::DeleteLine { index } => {
            if pos.line < index {
                pos
            } else if pos.line == index {
                Position::new(pos.line, 0)
            } else {
                Position::new(pos.line - 1, pos.column)
            }
        }
        OperationKind::SplitLine { line, column } => {
            if pos.line < line {
                pos
            } else if pos.line == line {
                if pos.column <= column {
                    pos
                } else {
                    Position::new(pos.line + 1, pos.column - column)
                }
            } else {
                Position::new(pos.line + 1, pos.column)
            }
        }
        OperationKind::MergeLine { line } => {
            if pos.line <= line {
                pos
            } else if pos.line == line + 1 {
                Position::new(line, pos.column)
            } else {
                Position::new(pos.line - 1, pos.column)
            }
        }
        OperationKind::ReplaceLine { .. } => pos,
    }
}

/// Maps both endpoints of a range independently.
#[must_use]
pub fn map_range(range: Range, op: &OperationKind) -> Range {
    Range::new(map_position(range.anchor, op), map_position(range.focus, op))
}

/// Left-folds [`map_range`] over `ops` for every range in `sel`.
#[must_use]
pub fn map_selection_through(sel: &MultiSelection, ops: &[Operation]) -> MultiSelection {
    let mapped: Vec<Range> = sel
        .ranges()
        .iter()
        .map(|&range| ops.iter().fold(range, |r, op| map_range(r, &op.kind)))
        .collect();
    MultiSelection::new(mapped, sel.primary_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_text_before_cursor_shifts_it_right() {
        let pos = Position::new(0, 10);
        let mapped = map_position(pos, &factories::insert_text(0, 5, "XX").kind);
        assert_eq!(mapped, Position::new(0, 12));
    }

    #[test]
    fn insert_text_at_cursor_shifts_it_right_too() {
        // Ties at equal column shift the position forward.
        let pos = Position::new(0, 5);
        let mapped = map_position(pos, &factories::insert_text(0, 5, "XX").kind);
        assert_eq!(mapped, Position::new(0, 7));
    }

    #[test]
    fn insert_text_on_other_line_is_unaffected() {
        let pos = Position::new(1, 5);
        let mapped = map_position(pos, &factories::insert_text(0, 0, "XX").kind);
        assert_eq!(mapped, pos);
    }

    #[test]
    fn delete_text_covering_cursor_clamps_to_delete_start() {
        let pos = Position::new(0, 10);
        let mapped = map_position(pos, &factories::delete_text(0, 3, 5).kind);
        assert_eq!(mapped, Position::new(0, 3));
    }

    #[test]
    fn delete_text_after_cursor_shifts_it_left() {
        let pos = Position::new(0, 20);
        let mapped = map_position(pos, &factories::delete_text(0, 3, 5).kind);
        assert_eq!(mapped, Position::new(0, 15));
    }

    #[test]
    fn insert_line_shifts_lines_at_or_after_index() {
        let mapped = map_position(Position::new(2, 4), &factories::insert_line(2, "x").kind);
        assert_eq!(mapped, Position::new(3, 4));
        let mapped = map_position(Position::new(1, 4), &factories::insert_line(2, "x").kind);
        assert_eq!(mapped, Position::new(1, 4));
    }

    #[test]
    fn delete_line_at_cursor_lands_at_column_zero() {
        let mapped = map_position(Position::new(2, 7), &factories::delete_line(2).kind);
        assert_eq!(mapped, Position::new(2, 0));
        let mapped = map_position(Position::new(3, 7), &factories::delete_line(2).kind);
        assert_eq!(mapped, Position::new(2, 7));
    }

    #[test]
    fn split_line_past_split_point_moves_to_new_line() {
        let mapped = map_position(Position::new(0, 8), &factories::split_line(0, 5).kind);
        assert_eq!(mapped, Position::new(1, 3));
        let mapped = map_position(Position::new(0, 3), &factories::split_line(0, 5).kind);
        assert_eq!(mapped, Position::new(0, 3));
    }

    #[test]
    fn merge_line_keeps_column_on_absorbed_line() {
        // Known limitation: no document access, so the column on the
        // absorbed line isn't offset by the anchor's length.
        let mapped = map_position(Position::new(1, 4), &factories::merge_line(0).kind);
        assert_eq!(mapped, Position::new(0, 4));
    }

    #[test]
    fn replace_line_is_identity() {
        let pos = Position::new(3, 9);
        let mapped = map_position(pos, &factories::replace_line(3, "new").kind);
        assert_eq!(mapped, pos);
    }

    #[test]
    fn cursor_through_insert_then_delete_matches_scenario_6() {
        let pos = Position::new(0, 10);
        let pos = map_position(pos, &factories::insert_text(0, 5, "XX").kind);
        assert_eq!(pos, Position::new(0, 12));
        let pos = map_position(pos, &factories::delete_text(0, 3, 5).kind);
        assert_eq!(pos, Position::new(0, 3));
    }
}
