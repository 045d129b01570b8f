//! Coraider co-attendance counts.

use std::collections::{BTreeMap, HashSet};

use raidlog_common::{CharacterId, Coraider, ReportPlayer};

/// Count one non-duplicate report into `tally` for the character `self_id`.
///
/// Returns the coraiders that should hear about the character's claimed
/// account: newcomers, and regulars whose shared count is still within
/// `ceiling`. Ids are returned in roster order, each at most once.
pub fn record_coraiders(
    tally: &mut BTreeMap<CharacterId, Coraider>,
    self_id: CharacterId,
    players: &[ReportPlayer],
    ceiling: i64,
) -> Vec<CharacterId> {
    let mut seen = HashSet::new();
    let mut eligible = Vec::new();

    for player in players {
        if player.id == self_id || !seen.insert(player.id) {
            continue;
        }

        let count = match tally.get_mut(&player.id) {
            Some(coraider) => {
                coraider.count += 1;
                coraider.count
            }
            None => {
                tally.insert(player.id, Coraider::first_seen(player));
                1
            }
        };

        if count <= ceiling {
            eligible.push(player.id);
        }
    }

    eligible
}
