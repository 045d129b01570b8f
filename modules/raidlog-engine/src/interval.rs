//! Overlap detection on a character's raid history.
//!
//! Two logs of the same session (uploaded by different raiders) overlap in
//! time. The history is kept descending by start time, so a binary search
//! finds the only two neighbours a new session can overlap.

use chrono::{DateTime, Utc};

use raidlog_common::RaidParticipation;

/// Whether `[start, end)` overlaps an entry already in `history`.
///
/// `history` must be sorted descending by `start_time`.
pub fn is_duplicate(history: &[RaidParticipation], start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    // First entry that started strictly before the candidate.
    let k = history.partition_point(|r| r.start_time >= start);

    let overlaps_earlier = history
        .get(k)
        .is_some_and(|earlier| start < earlier.end_time);
    let overlaps_later = k > 0 && end > history[k - 1].start_time;

    overlaps_earlier || overlaps_later
}

/// Append `entry` and restore descending start order. Equal start times keep
/// their insertion order.
pub fn insert_sorted(history: &mut Vec<RaidParticipation>, entry: RaidParticipation) {
    history.push(entry);
    history.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}
