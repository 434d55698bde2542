// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The operational-transform engine: [`transform`] is the pure, total
//! function that resolves a concurrent pair of operations into a pair that
//! can be applied in either order and converge (TP1), and [`transform_ops`]
//! lifts it to batches.
//!
//! `opA` is always the server-canonical side and wins every tie; see the
//! per-variant notes below for where that shows up. This module has no I/O
//! and never panics on a well-formed [`Operation`] pair — the one thing it
//! produces instead of a "this doesn't make sense" error is the `noop`
//! sentinel from [`OperationKind::noop`].

use tracing::trace;

use crate::position::map_position;
use crate::types::{Operation, OperationKind, Position};

/// Transforms a concurrent pair of operations against each other.
///
/// `D` is the document both `a` and `b` applied to independently; the
/// postcondition is `apply(apply(D, a), b') == apply(apply(D, b), a')`.
#[must_use]
pub fn transform(a: &Operation, b: &Operation) -> (Operation, Operation) {
    let (ka, kb) = transform_kind(&a.kind, &b.kind);
    (
        Operation::new(ka, a.origin),
        Operation::new(kb, b.origin),
    )
}

/// Transforms every operation in `ops_a` against every operation currently
/// in `ops_b`, and vice versa, using the current (possibly already shifted)
/// state of both slices at each step. O(|A|·|B|), matches the reference
/// nested-loop scheme; the convergence property holds regardless of which
/// order the inner/outer loops run in.
#[must_use]
pub fn transform_ops(ops_a: &[Operation], ops_b: &[Operation]) -> (Vec<Operation>, Vec<Operation>) {
    let mut a = ops_a.to_vec();
    let mut b = ops_b.to_vec();
    for i in 0..a.len() {
        for j in 0..b.len() {
            let (new_a, new_b) = transform(&a[i], &b[j]);
            a[i] = new_a;
            b[j] = new_b;
        }
    }
    (a, b)
}

fn noop() -> OperationKind {
    let n = OperationKind::noop();
    trace!("transform: producing noop");
    n
}

/// Shifts a row-index *position* (a `(line, column)` anchor belonging to a
/// text op) through a structural op on the other side, the same way
/// [`map_position`] would — except that when the anchor's own row is
/// consumed outright (deleted, or absorbed by a merge) this returns `None`
/// so the caller can degrade the text op to a noop instead of silently
/// retargeting it at the wrong line.
fn shift_text_anchor(pos: Position, structural: &OperationKind) -> Option<Position> {
    match *structural {
        OperationKind::DeleteLine { index } if pos.line == index => None,
        OperationKind::MergeLine { line } if pos.line == line + 1 => {
            // Known limitation shared with `map_position`: the column is
            // kept as-is rather than offset by the anchor line's length.
            Some(Position::new(line, pos.column))
        }
        OperationKind::InsertLine { .. }
        | OperationKind::DeleteLine { .. }
        | OperationKind::SplitLine { .. }
        | OperationKind::MergeLine { .. }
        | OperationKind::ReplaceLine { .. } => Some(map_position(pos, structural)),
        OperationKind::InsertText { .. } | OperationKind::DeleteText { .. } => Some(pos),
    }
}

/// Shifts a whole-row reference (the target of `DeleteLine`, `SplitLine`,
/// `MergeLine`, or `ReplaceLine`) through another structural op. Returns
/// `None` when the referenced row no longer exists as a distinct row
/// (it was deleted, or absorbed into its neighbor by a merge).
fn shift_row_ref(row: usize, other: &OperationKind) -> Option<usize> {
    match *other {
        OperationKind::InsertLine { index, .. } => {
            Some(if index <= row { row + 1 } else { row })
        }
        OperationKind::DeleteLine { index } => {
            if row < index {
                Some(row)
            } else if row == index {
                None
            } else {
                Some(row - 1)
            }
        }
        OperationKind::SplitLine { line, .. } => {
            // A row equal to the split point keeps referring to the prefix
            // half; rows after it gain one from the newly inserted suffix.
            if row <= line {
                Some(row)
            } else {
                Some(row + 1)
            }
        }
        OperationKind::MergeLine { line } => {
            if row <= line {
                Some(row)
            } else if row == line + 1 {
                None
            } else {
                Some(row - 1)
            }
        }
        OperationKind::InsertText { .. }
        | OperationKind::DeleteText { .. }
        | OperationKind::ReplaceLine { .. } => Some(row),
    }
}

/// Shifts an insertion *boundary* index (0..=`line_count`, as used by
/// `InsertLine`) through another structural op. Unlike [`shift_row_ref`]
/// this never disappears — an insertion point always remains meaningful
/// even once the row next to it is gone.
fn shift_boundary(idx: usize, other: &OperationKind) -> usize {
    match *other {
        OperationKind::InsertLine { index, .. } => {
            if index <= idx {
                idx + 1
            } else {
                idx
            }
        }
        OperationKind::DeleteLine { index } => {
            if idx <= index {
                idx
            } else {
                idx - 1
            }
        }
        OperationKind::SplitLine { line, .. } => {
            if idx <= line {
                idx
            } else {
                idx + 1
            }
        }
        OperationKind::MergeLine { line } => {
            if idx <= line + 1 {
                idx
            } else {
                idx - 1
            }
        }
        OperationKind::InsertText { .. }
        | OperationKind::DeleteText { .. }
        | OperationKind::ReplaceLine { .. } => idx,
    }
}

fn is_structural(kind: &OperationKind) -> bool {
    matches!(
        kind,
        OperationKind::InsertLine { .. }
            | OperationKind::DeleteLine { .. }
            | OperationKind::SplitLine { .. }
            | OperationKind::MergeLine { .. }
    )
}

/// Rebuilds a text op (`InsertText`/`DeleteText`) at a shifted anchor, or
/// produces a noop if the anchor was consumed.
fn retarget_text(kind: &OperationKind, anchor: Option<Position>) -> OperationKind {
    let Some(pos) = anchor else {
        return noop();
    };
    match *kind {
        OperationKind::InsertText { ref text, .. } => OperationKind::InsertText {
            line: pos.line,
            column: pos.column,
            text: text.clone(),
        },
        OperationKind::DeleteText { length, .. } => OperationKind::DeleteText {
            line: pos.line,
            column: pos.column,
            length,
        },
        _ => unreachable!("retarget_text only called on text ops"),
    }
}

/// Rebuilds a `ReplaceLine` at a shifted row, or produces a noop if the row
/// it targeted was consumed.
fn retarget_replace(text: &str, row: Option<usize>) -> OperationKind {
    row.map_or_else(noop, |index| OperationKind::ReplaceLine {
        index,
        text: text.to_string(),
    })
}

fn anchor_of(kind: &OperationKind) -> Position {
    match *kind {
        OperationKind::InsertText { line, column, .. } | OperationKind::DeleteText { line, column, .. } => {
            Position::new(line, column)
        }
        _ => unreachable!("anchor_of only called on text ops"),
    }
}

/// Transforms two concurrent inserts landing in the same line. Ties go to
/// `a` (the canonical side): it keeps its column, `b` shifts right by
/// `a`'s inserted length.
fn insert_insert_text(a_col: usize, a_len: usize, b_col: usize, b_len: usize) -> (usize, usize) {
    if a_col <= b_col {
        (a_col, b_col + a_len)
    } else {
        (a_col + b_len, b_col)
    }
}

/// Transforms two concurrent deletes on the same line, subtracting their
/// shared overlap exactly once from each side.
fn delete_delete_text(a_col: usize, a_len: usize, b_col: usize, b_len: usize) -> (usize, usize, usize, usize) {
    let a_end = a_col + a_len;
    let b_end = b_col + b_len;
    let overlap_start = a_col.max(b_col);
    let overlap_end = a_end.min(b_end);
    let overlap = overlap_end.saturating_sub(overlap_start);
    let new_col = a_col.min(b_col);
    (new_col, a_len - overlap, new_col, b_len - overlap)
}

/// Transforms a concurrent insert/delete pair on the same line: the insert
/// lands before, inside, or after the deleted range. An insert strictly
/// inside the deleted range collapses to the delete's start — a
/// deliberate, documented simplification, not a derived necessity.
fn insert_delete_text(insert_col: usize, insert_len: usize, delete_col: usize, delete_len: usize) -> (usize, usize) {
    if insert_col <= delete_col {
        (insert_col, delete_col + insert_len)
    } else if insert_col >= delete_col + delete_len {
        (insert_col - delete_len, delete_col)
    } else {
        (delete_col, delete_col)
    }
}

#[allow(clippy::too_many_lines)]
fn transform_kind(a: &OperationKind, b: &OperationKind) -> (OperationKind, OperationKind) {
    use OperationKind::{DeleteLine, DeleteText, InsertLine, InsertText, MergeLine, ReplaceLine, SplitLine};

    match (a, b) {
        // --- text × text, same line -------------------------------------------------
        (InsertText { line: la, column: ca, text: ta }, InsertText { line: lb, column: cb, text: tb })
            if la == lb =>
        {
            let (na, nb) = insert_insert_text(*ca, ta.chars().count(), *cb, tb.chars().count());
            (
                InsertText { line: *la, column: na, text: ta.clone() },
                InsertText { line: *lb, column: nb, text: tb.clone() },
            )
        }
        (DeleteText { line: la, column: ca, length: lena }, DeleteText { line: lb, column: cb, length: lenb })
            if la == lb =>
        {
            let (na, new_lena, nb, new_lenb) = delete_delete_text(*ca, *lena, *cb, *lenb);
            let kind_a = if new_lena == 0 {
                noop()
            } else {
                DeleteText { line: *la, column: na, length: new_lena }
            };
            let kind_b = if new_lenb == 0 {
                noop()
            } else {
                DeleteText { line: *lb, column: nb, length: new_lenb }
            };
            (kind_a, kind_b)
        }
        (InsertText { line: la, column: ca, text: ta }, DeleteText { line: lb, column: cb, length: lenb })
            if la == lb =>
        {
            let (na, nb) = insert_delete_text(*ca, ta.chars().count(), *cb, *lenb);
            (
                InsertText { line: *la, column: na, text: ta.clone() },
                DeleteText { line: *lb, column: nb, length: *lenb },
            )
        }
        (DeleteText { line: la, column: ca, length: lena }, InsertText { line: lb, column: cb, text: tb })
            if la == lb =>
        {
            let (nb, na) = insert_delete_text(*cb, tb.chars().count(), *ca, *lena);
            (
                DeleteText { line: *la, column: na, length: *lena },
                InsertText { line: *lb, column: nb, text: tb.clone() },
            )
        }

        // --- text × replaceLine, same line: replace wins, text op noops ------------
        (InsertText { line: lt, .. } | DeleteText { line: lt, .. }, ReplaceLine { index, .. }) if lt == index => {
            (noop(), b.clone())
        }
        (ReplaceLine { index, .. }, InsertText { line: lt, .. } | DeleteText { line: lt, .. }) if index == lt => {
            (a.clone(), noop())
        }

        // --- replaceLine × replaceLine -----------------------------------------------
        (ReplaceLine { index: ia, text: ta }, ReplaceLine { index: ib, text: tb }) => {
            if ia == ib {
                (ReplaceLine { index: *ia, text: ta.clone() }, noop())
            } else {
                (ReplaceLine { index: *ia, text: ta.clone() }, ReplaceLine { index: *ib, text: tb.clone() })
            }
        }

        // --- splitLine × mergeLine: the one pair with explicit non-noop handling ----
        (SplitLine { line: sl, column: sc }, MergeLine { line: ml }) => {
            let (new_split, new_merge) = split_merge(*sl, *sc, *ml);
            (SplitLine { line: new_split.0, column: new_split.1 }, MergeLine { line: new_merge })
        }
        (MergeLine { line: ml }, SplitLine { line: sl, column: sc }) => {
            // Mirror image of the arm above: `b` is the split, `a` the merge.
            let (new_split, new_merge) = split_merge(*sl, *sc, *ml);
            (MergeLine { line: new_merge }, SplitLine { line: new_split.0, column: new_split.1 })
        }

        // --- structural × structural --------------------------------------------------
        (InsertLine { index: ia, text: ta }, InsertLine { index: ib, text: tb }) => {
            let (na, nb) = if ia <= ib { (*ia, *ib + 1) } else { (*ia + 1, *ib) };
            (InsertLine { index: na, text: ta.clone() }, InsertLine { index: nb, text: tb.clone() })
        }
        (InsertLine { index: ia, text: ta }, DeleteLine { index: ib }) => {
            let na = if *ia <= *ib { *ia } else { *ia - 1 };
            let nb = if *ib < *ia { *ib } else { *ib + 1 };
            (InsertLine { index: na, text: ta.clone() }, DeleteLine { index: nb })
        }
        (DeleteLine { index: ia }, InsertLine { index: ib, text: tb }) => {
            let nb = if *ia <= *ib { *ib + 1 } else { *ib };
            let na = if *ib < *ia { *ia } else { *ia - 1 };
            (DeleteLine { index: na }, InsertLine { index: nb, text: tb.clone() })
        }
        (DeleteLine { index: ia }, DeleteLine { index: ib }) => {
            if ia == ib {
                (DeleteLine { index: *ia }, noop())
            } else if ia < ib {
                (DeleteLine { index: *ia }, DeleteLine { index: *ib - 1 })
            } else {
                (DeleteLine { index: *ia - 1 }, DeleteLine { index: *ib })
            }
        }
        (InsertLine { index: ia, text: ta }, SplitLine { line: lb, column: cb }) => {
            let na = shift_boundary(*ia, b);
            let nb = shift_row_ref(*lb, a).unwrap_or(*lb);
            (InsertLine { index: na, text: ta.clone() }, SplitLine { line: nb, column: *cb })
        }
        (SplitLine { line: la, column: ca }, InsertLine { index: ib, text: tb }) => {
            let nb = shift_boundary(*ib, a);
            let na = shift_row_ref(*la, b).unwrap_or(*la);
            (SplitLine { line: na, column: *ca }, InsertLine { index: nb, text: tb.clone() })
        }
        (InsertLine { index: ia, text: ta }, MergeLine { line: lb }) => {
            let na = shift_boundary(*ia, b);
            let nb = shift_row_ref(*lb, a).unwrap_or(*lb);
            (InsertLine { index: na, text: ta.clone() }, MergeLine { line: nb })
        }
        (MergeLine { line: la }, InsertLine { index: ib, text: tb }) => {
            let nb = shift_boundary(*ib, a);
            let na = shift_row_ref(*la, b).unwrap_or(*la);
            (MergeLine { line: na }, InsertLine { index: nb, text: tb.clone() })
        }
        (DeleteLine { index: ia }, SplitLine { line: lb, column: cb }) => {
            let (new_delete, new_split) = delete_split(*ia, *lb, *cb);
            let kind_a = new_delete.map_or_else(noop, |i| DeleteLine { index: i });
            let kind_b = new_split.map_or_else(noop, |(l, c)| SplitLine { line: l, column: c });
            (kind_a, kind_b)
        }
        (SplitLine { line: la, column: ca }, DeleteLine { index: ib }) => {
            let (new_delete, new_split) = delete_split(*ib, *la, *ca);
            let kind_a = new_split.map_or_else(noop, |(l, c)| SplitLine { line: l, column: c });
            let kind_b = new_delete.map_or_else(noop, |i| DeleteLine { index: i });
            (kind_a, kind_b)
        }
        (DeleteLine { index: ia }, MergeLine { line: lb }) => {
            let (new_delete, new_merge) = delete_merge(*ia, *lb);
            let kind_a = new_delete.map_or_else(noop, |i| DeleteLine { index: i });
            let kind_b = new_merge.map_or_else(noop, |l| MergeLine { line: l });
            (kind_a, kind_b)
        }
        (MergeLine { line: la }, DeleteLine { index: ib }) => {
            let (new_delete, new_merge) = delete_merge(*ib, *la);
            let kind_a = new_merge.map_or_else(noop, |l| MergeLine { line: l });
            let kind_b = new_delete.map_or_else(noop, |i| DeleteLine { index: i });
            (kind_a, kind_b)
        }
        (SplitLine { line: la, column: ca }, SplitLine { line: lb, column: cb }) => {
            let (new_a, new_b) = split_split(*la, *ca, *lb, *cb);
            (
                new_a.map_or_else(noop, |(l, c)| SplitLine { line: l, column: c }),
                new_b.map_or_else(noop, |(l, c)| SplitLine { line: l, column: c }),
            )
        }
        (MergeLine { line: la }, MergeLine { line: lb }) => {
            let (new_a, new_b) = merge_merge(*la, *lb);
            (
                new_a.map_or_else(noop, |l| MergeLine { line: l }),
                new_b.map_or_else(noop, |l| MergeLine { line: l }),
            )
        }

        // --- replaceLine × structural: shift the index, noop if the row is gone ----
        (ReplaceLine { index, text }, _) if is_structural(b) => {
            (retarget_replace(text, shift_row_ref(*index, b)), b.clone())
        }
        (_, ReplaceLine { index, text }) if is_structural(a) => {
            (a.clone(), retarget_replace(text, shift_row_ref(*index, a)))
        }

        // --- text × structural (either order): shift the text op's anchor -----------
        (InsertText { .. } | DeleteText { .. }, _) if is_structural(b) => {
            let anchor = anchor_of(a);
            (retarget_text(a, shift_text_anchor(anchor, b)), b.clone())
        }
        (_, InsertText { .. } | DeleteText { .. }) if is_structural(a) => {
            let anchor = anchor_of(b);
            (a.clone(), retarget_text(b, shift_text_anchor(anchor, a)))
        }

        // --- disjoint text ops on different lines, or any other non-interacting pair
        _ => (a.clone(), b.clone()),
    }
}

fn split_merge(split_line: usize, split_col: usize, merge_line: usize) -> ((usize, usize), usize) {
    if split_line == merge_line + 1 {
        ((merge_line, split_col), merge_line)
    } else if split_line == merge_line {
        ((split_line, split_col), merge_line)
    } else if split_line < merge_line {
        ((split_line, split_col), merge_line + 1)
    } else {
        ((split_line - 1, split_col), merge_line)
    }
}

fn split_split(la: usize, ca: usize, lb: usize, cb: usize) -> (Option<(usize, usize)>, Option<(usize, usize)>) {
    match la.cmp(&lb) {
        std::cmp::Ordering::Equal => (Some((la, ca)), None),
        std::cmp::Ordering::Less => (Some((la, ca)), Some((lb + 1, cb))),
        std::cmp::Ordering::Greater => (Some((la + 1, ca)), Some((lb, cb))),
    }
}

fn merge_merge(la: usize, lb: usize) -> (Option<usize>, Option<usize>) {
    match la.cmp(&lb) {
        std::cmp::Ordering::Equal => (Some(la), None),
        std::cmp::Ordering::Less if lb == la + 1 => (Some(la), None),
        std::cmp::Ordering::Less => (Some(la), Some(lb - 1)),
        std::cmp::Ordering::Greater if la == lb + 1 => (None, Some(lb)),
        std::cmp::Ordering::Greater => (Some(la - 1), Some(lb)),
    }
}

fn delete_split(delete_idx: usize, split_line: usize, split_col: usize) -> (Option<usize>, Option<(usize, usize)>) {
    match delete_idx.cmp(&split_line) {
        std::cmp::Ordering::Less => (Some(delete_idx), Some((split_line - 1, split_col))),
        std::cmp::Ordering::Equal => (Some(delete_idx), None),
        std::cmp::Ordering::Greater => (Some(delete_idx + 1), Some((split_line, split_col))),
    }
}

fn delete_merge(delete_idx: usize, merge_line: usize) -> (Option<usize>, Option<usize>) {
    if delete_idx < merge_line {
        (Some(delete_idx), Some(merge_line - 1))
    } else if delete_idx == merge_line || delete_idx == merge_line + 1 {
        (Some(delete_idx), None)
    } else {
        (Some(delete_idx - 1), Some(merge_line))
    }
}
