// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracks remote peers' cursor positions and keeps them spatially accurate
//! by re-mapping each one through every operation a replica applies.

use std::collections::BTreeMap;

use crate::position::map_position;
use crate::types::{Operation, Position, RemoteCursor};

/// A registry of remote cursors, keyed by user id.
///
/// `BTreeMap` (rather than a hash map) gives [`Self::get_all`] a stable,
/// deterministic iteration order, which is convenient for the demo
/// transport's broadcast logging and for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct CursorTracker {
    cursors: BTreeMap<String, RemoteCursor>,
}

impl CursorTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a peer's cursor.
    pub fn update(&mut self, user_id: impl Into<String>, position: Position, color: impl Into<String>, name: Option<String>) {
        let user_id = user_id.into();
        self.cursors.insert(
            user_id.clone(),
            RemoteCursor { user_id, position, color: color.into(), name },
        );
    }

    /// Drops a peer's cursor entirely (e.g. on disconnect).
    pub fn remove(&mut self, user_id: &str) {
        self.cursors.remove(user_id);
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&RemoteCursor> {
        self.cursors.get(user_id)
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<&RemoteCursor> {
        self.cursors.values().collect()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    /// Folds [`map_position`] over `ops` for every tracked cursor, replacing
    /// a cursor's entry only when its position actually moved.
    pub fn map_through(&mut self, ops: &[Operation]) {
        for cursor in self.cursors.values_mut() {
            let mapped = ops.iter().fold(cursor.position, |pos, op| map_position(pos, &op.kind));
            if mapped != cursor.position {
                cursor.position = mapped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories;
    use pretty_assertions::assert_eq;

    #[test]
    fn update_then_get_round_trips() {
        let mut tracker = CursorTracker::new();
        tracker.update("alice", Position::new(0, 3), "#ff0000", Some("Alice".to_string()));
        let cursor = tracker.get("alice").unwrap();
        assert_eq!(cursor.position, Position::new(0, 3));
        assert_eq!(cursor.color, "#ff0000");
    }

    #[test]
    fn remove_drops_the_cursor() {
        let mut tracker = CursorTracker::new();
        tracker.update("alice", Position::new(0, 0), "#fff", None);
        tracker.remove("alice");
        assert!(tracker.get("alice").is_none());
    }

    #[test]
    fn scenario_6_cursor_tracked_through_insert_then_delete() {
        let mut tracker = CursorTracker::new();
        tracker.update("bob", Position::new(0, 10), "#00ff00", None);

        tracker.map_through(&[factories::insert_text(0, 5, "XX")]);
        assert_eq!(tracker.get("bob").unwrap().position, Position::new(0, 12));

        tracker.map_through(&[factories::delete_text(0, 3, 5)]);
        assert_eq!(tracker.get("bob").unwrap().position, Position::new(0, 3));
    }

    #[test]
    fn get_all_is_stable_and_sorted_by_user_id() {
        let mut tracker = CursorTracker::new();
        tracker.update("zack", Position::new(0, 0), "#000", None);
        tracker.update("alice", Position::new(0, 0), "#111", None);
        let ids: Vec<&str> = tracker.get_all().iter().map(|c| c.user_id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "zack"]);
    }
}
