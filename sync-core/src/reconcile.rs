//! Reconciliation of server operations against the local index map.
//!
//! The reconciler is a pure function: it reads the previous index→room
//! snapshot, applies one response's operations in array order, and
//! produces a new snapshot plus the ordered room updates to hand
//! downstream. The input map is never mutated, so a failure mid-batch
//! can never corrupt the previously committed view.

use crate::RangeTracker;
use std::collections::HashMap;
use sync_types::{Operation, RoomId, RoomUpdate, WireOp};

/// The sparse index → room-id projection.
///
/// Indices are not contiguous and can exceed the currently fetched
/// window, so this is a true sparse map rather than a dense array;
/// absence of a key means that index is not tracked.
pub type IndexMap = HashMap<u64, RoomId>;

/// The result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// The new index projection, replacing the previous snapshot.
    pub map: IndexMap,
    /// Room updates in the order the server sent them. Later updates to
    /// the same room are kept as separate entries; coalescing is the
    /// downstream handoff's business.
    pub updates: Vec<RoomUpdate>,
}

/// Apply one batch of operations to a snapshot of the index map.
///
/// Operations are processed in strict array order; order is semantically
/// significant because an INSERT may consume the gap vacated by an
/// earlier DELETE in the same batch. Malformed or unknown operations are
/// logged and skipped, never fatal.
pub fn reconcile(prev: &IndexMap, tracker: &RangeTracker, ops: &[WireOp]) -> Reconciliation {
    let mut map = prev.clone();
    let mut updates = Vec::new();

    // Index vacated by the most recent DELETE, consumed by a following
    // INSERT into an occupied slot.
    let mut gap_index: Option<u64> = None;

    for wire in ops {
        let op = match Operation::try_from(wire.clone()) {
            Ok(op) => op,
            Err(err) => {
                tracing::warn!(op = %wire.op, error = %err, "skipping bad operation");
                continue;
            }
        };

        match op {
            Operation::Sync { range, rooms } => {
                let mut index = range.low();
                for room in rooms {
                    if index > range.high() {
                        break;
                    }
                    // Rooms past the end of the provided array signal the
                    // end of the server-known list; the remainder of the
                    // range keeps its prior mapping.
                    match room.validate() {
                        Ok(()) => {
                            map.insert(index, room.room_id.clone());
                            updates.push(room);
                        }
                        Err(err) => {
                            tracing::warn!(index, error = %err, "dropping bad room payload");
                        }
                    }
                    index += 1;
                }
            }
            Operation::Invalidate { range } => {
                for index in range.low()..=range.high() {
                    map.remove(&index);
                }
            }
            Operation::Insert { index, room } => {
                if map.contains_key(&index) {
                    let Some(gap) = gap_index.take() else {
                        // A move is DELETE then INSERT; an occupied target
                        // with no vacated slot means we lost the pairing.
                        tracing::warn!(index, "INSERT into occupied index with no gap");
                        continue;
                    };
                    shift_toward_gap(&mut map, tracker, gap, index);
                }
                map.insert(index, room.room_id.clone());
                updates.push(room);
            }
            Operation::Delete { index } => {
                map.remove(&index);
                gap_index = Some(index);
            }
            Operation::Update { index: _, room } => {
                // Content refresh only; the index projection is unchanged.
                updates.push(room);
            }
        }
    }

    Reconciliation { map, updates }
}

/// Replay the index shift implied by a DELETE/INSERT move pair across
/// the locally tracked subset.
///
/// Every index between the gap and the insert target conceptually moves
/// one position toward the gap. Only destinations the tracker reports as
/// in-view are written: the client is not subscribed to anything
/// outside its windows, so those positions must not be populated.
fn shift_toward_gap(map: &mut IndexMap, tracker: &RangeTracker, gap: u64, target: u64) {
    if gap > target {
        // Gap sits above the target: each occupant between them moves up
        // one. Walk from the gap down so each source is read before it
        // is overwritten.
        let mut index = gap;
        while index > target {
            if tracker.is_index_in_range(index) {
                shift_one(map, index, index - 1);
            }
            index -= 1;
        }
    } else {
        // Gap sits below the target: occupants move down one.
        for index in gap..target {
            if tracker.is_index_in_range(index) {
                shift_one(map, index, index + 1);
            }
        }
    }
}

/// Move whatever occupies `source` into `dest`; an empty source empties
/// the destination too.
fn shift_one(map: &mut IndexMap, dest: u64, source: u64) {
    match map.get(&source).cloned() {
        Some(room_id) => {
            map.insert(dest, room_id);
        }
        None => {
            map.remove(&dest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::IndexRange;

    fn tracker(ranges: &[(u64, u64)]) -> RangeTracker {
        RangeTracker::with_ranges(
            ranges
                .iter()
                .map(|&(lo, hi)| IndexRange::new(lo, hi).unwrap())
                .collect(),
        )
    }

    fn room(id: &str) -> RoomUpdate {
        RoomUpdate {
            room_id: RoomId::new(id),
            name: None,
            required_state: vec![],
            timeline: vec![],
            notification_count: 0,
            highlight_count: 0,
        }
    }

    fn map_of(entries: &[(u64, &str)]) -> IndexMap {
        entries
            .iter()
            .map(|&(i, id)| (i, RoomId::new(id)))
            .collect()
    }

    fn range(lo: u64, hi: u64) -> IndexRange {
        IndexRange::new(lo, hi).unwrap()
    }

    // ===========================================
    // SYNC
    // ===========================================

    #[test]
    fn sync_populates_range_in_order() {
        let ops = vec![WireOp::sync(
            range(0, 2),
            vec![room("!a"), room("!b"), room("!c")],
        )];

        let result = reconcile(&IndexMap::new(), &tracker(&[(0, 2)]), &ops);

        assert_eq!(result.map, map_of(&[(0, "!a"), (1, "!b"), (2, "!c")]));
        assert_eq!(result.updates.len(), 3);
        assert_eq!(result.updates[0].room_id, RoomId::new("!a"));
        assert_eq!(result.updates[2].room_id, RoomId::new("!c"));
    }

    #[test]
    fn sync_stops_early_when_rooms_run_out() {
        // Fewer rooms than the range covers: the server-known list ended.
        // Indices past the provided rooms keep their prior mapping.
        let prev = map_of(&[(3, "!old3"), (4, "!old4")]);
        let ops = vec![WireOp::sync(range(0, 4), vec![room("!a"), room("!b")])];

        let result = reconcile(&prev, &tracker(&[(0, 4)]), &ops);

        assert_eq!(
            result.map,
            map_of(&[(0, "!a"), (1, "!b"), (3, "!old3"), (4, "!old4")])
        );
        assert_eq!(result.updates.len(), 2);
    }

    #[test]
    fn sync_ignores_rooms_past_the_range_end() {
        let ops = vec![WireOp::sync(range(0, 0), vec![room("!a"), room("!spill")])];

        let result = reconcile(&IndexMap::new(), &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(0, "!a")]));
        assert_eq!(result.updates.len(), 1);
    }

    #[test]
    fn sync_drops_room_without_id_but_keeps_alignment() {
        let ops = vec![WireOp::sync(
            range(0, 2),
            vec![room("!a"), room(""), room("!c")],
        )];

        let result = reconcile(&IndexMap::new(), &tracker(&[(0, 2)]), &ops);

        // Index 1 stays untracked; index 2 still lines up with !c.
        assert_eq!(result.map, map_of(&[(0, "!a"), (2, "!c")]));
        assert_eq!(result.updates.len(), 2);
    }

    // ===========================================
    // INVALIDATE
    // ===========================================

    #[test]
    fn invalidate_removes_every_key_in_range() {
        let prev = map_of(&[(0, "!a"), (1, "!b"), (2, "!c"), (5, "!d")]);
        let ops = vec![WireOp::invalidate(range(0, 2))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(5, "!d")]));
        assert!(result.updates.is_empty());
    }

    #[test]
    fn invalidate_of_empty_range_is_noop() {
        let prev = map_of(&[(10, "!a")]);
        let ops = vec![WireOp::invalidate(range(0, 5))];

        let result = reconcile(&prev, &tracker(&[(0, 10)]), &ops);

        assert_eq!(result.map, prev);
    }

    // ===========================================
    // DELETE / INSERT
    // ===========================================

    #[test]
    fn delete_then_insert_at_same_index_is_an_update() {
        let prev = map_of(&[(0, "!a"), (1, "!b")]);
        let ops = vec![WireOp::delete(1), WireOp::insert(1, room("!new"))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        // Room id changes, no shift anywhere.
        assert_eq!(result.map, map_of(&[(0, "!a"), (1, "!new")]));
        assert_eq!(result.updates.len(), 1);
        assert_eq!(result.updates[0].room_id, RoomId::new("!new"));
    }

    #[test]
    fn delete_without_insert_shrinks_the_map() {
        let prev = map_of(&[(0, "!a"), (1, "!b")]);
        let ops = vec![WireOp::delete(0)];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(1, "!b")]));
        assert!(result.updates.is_empty());
    }

    #[test]
    fn insert_into_empty_index_is_plain_assignment() {
        let prev = map_of(&[(0, "!a")]);
        let ops = vec![WireOp::insert(3, room("!new"))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(0, "!a"), (3, "!new")]));
    }

    #[test]
    fn insert_into_occupied_index_without_gap_is_skipped() {
        let prev = map_of(&[(0, "!a")]);
        let ops = vec![WireOp::insert(0, room("!new"))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        // Inconsistency: logged and skipped, prior view preserved.
        assert_eq!(result.map, prev);
        assert!(result.updates.is_empty());
    }

    #[test]
    fn move_shifts_tracked_indices_toward_the_gap() {
        // The documented worked example: DELETE 7 vacates a slot, INSERT 0
        // shifts 0..2 up by one. Indices outside the tracked window (6, 7)
        // are not written during the shift: 7 stays deleted and 6 keeps d.
        let prev = map_of(&[
            (0, "!a"),
            (1, "!b"),
            (2, "!c"),
            (6, "!d"),
            (7, "!e"),
            (8, "!f"),
        ]);
        let ops = vec![WireOp::delete(7), WireOp::insert(0, room("!g"))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(
            result.map,
            map_of(&[(0, "!g"), (1, "!a"), (2, "!b"), (3, "!c"), (6, "!d"), (8, "!f")])
        );
        assert_eq!(result.updates.len(), 1);
        assert_eq!(result.updates[0].room_id, RoomId::new("!g"));
    }

    #[test]
    fn move_shift_crosses_disjoint_windows_when_in_view() {
        // Same shape, but with [6,8] also tracked: index 7 is in view, so
        // the shift carries d from 6 into the slot the DELETE vacated.
        let prev = map_of(&[
            (0, "!a"),
            (1, "!b"),
            (2, "!c"),
            (6, "!d"),
            (7, "!e"),
            (8, "!f"),
        ]);
        let ops = vec![WireOp::delete(7), WireOp::insert(0, room("!g"))];

        let result = reconcile(&prev, &tracker(&[(0, 5), (6, 8)]), &ops);

        assert_eq!(
            result.map,
            map_of(&[(0, "!g"), (1, "!a"), (2, "!b"), (3, "!c"), (7, "!d"), (8, "!f")])
        );
    }

    #[test]
    fn move_with_gap_below_target_shifts_down() {
        let prev = map_of(&[(0, "!a"), (1, "!b"), (2, "!c")]);
        let ops = vec![WireOp::delete(0), WireOp::insert(2, room("!x"))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(0, "!b"), (1, "!c"), (2, "!x")]));
    }

    #[test]
    fn gap_is_consumed_by_one_insert() {
        let prev = map_of(&[(0, "!a"), (1, "!b"), (2, "!c")]);
        let ops = vec![
            WireOp::delete(2),
            WireOp::insert(0, room("!x")),
            // Second INSERT into an occupied slot has no gap left.
            WireOp::insert(0, room("!y")),
        ];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(0, "!x"), (1, "!a"), (2, "!b")]));
        assert_eq!(result.updates.len(), 1);
    }

    // ===========================================
    // UPDATE
    // ===========================================

    #[test]
    fn update_appends_room_without_touching_map() {
        let prev = map_of(&[(0, "!a")]);
        let ops = vec![WireOp::update(0, room("!a"))];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, prev);
        assert_eq!(result.updates.len(), 1);
    }

    #[test]
    fn repeated_updates_to_one_room_are_kept_in_order() {
        let prev = map_of(&[(0, "!a")]);
        let mut second = room("!a");
        second.notification_count = 7;
        let ops = vec![WireOp::update(0, room("!a")), WireOp::update(0, second)];

        let result = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.updates.len(), 2);
        assert_eq!(result.updates[1].notification_count, 7);
    }

    // ===========================================
    // Failure policy
    // ===========================================

    #[test]
    fn malformed_op_is_skipped_and_batch_continues() {
        let no_range: WireOp = serde_json::from_str(r#"{"op": "SYNC"}"#).unwrap();
        let ops = vec![no_range, WireOp::sync(range(0, 0), vec![room("!a")])];

        let result = reconcile(&IndexMap::new(), &tracker(&[(0, 5)]), &ops);

        assert_eq!(result.map, map_of(&[(0, "!a")]));
    }

    #[test]
    fn unknown_op_is_skipped() {
        let splice: WireOp = serde_json::from_str(r#"{"op": "SPLICE", "index": 0}"#).unwrap();
        let ops = vec![splice, WireOp::delete(0)];

        let result = reconcile(&map_of(&[(0, "!a")]), &tracker(&[(0, 5)]), &ops);

        assert!(result.map.is_empty());
    }

    #[test]
    fn input_map_is_never_mutated() {
        let prev = map_of(&[(0, "!a"), (1, "!b")]);
        let before = prev.clone();
        let ops = vec![WireOp::invalidate(range(0, 1))];

        let _ = reconcile(&prev, &tracker(&[(0, 5)]), &ops);

        assert_eq!(prev, before);
    }
}
