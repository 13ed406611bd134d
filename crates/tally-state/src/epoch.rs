//! Voting epoch: Idle → Active on the first commitment of a cycle, back to
//! Idle on `finalize`. The dwell timer is only evaluated when `finalize` is
//! called; nothing runs in the background.

use tally_core::error::TallyError;
use tally_core::protocol::EpochState;
use tally_core::types::{Price, Timestamp};
use tracing::info;

use crate::candidates::CandidateList;

/// Start the timer unless an epoch is already running.
/// Returns true if this call opened a new epoch.
pub fn open_if_idle(epoch: &mut EpochState, now: Timestamp) -> bool {
    if epoch.is_active() {
        return false;
    }
    epoch.active_since = Some(now);
    info!(epoch = epoch.epoch + 1, opened_at = now, "voting epoch opened");
    true
}

/// Earliest time the running epoch may be finalized.
pub fn closes_at(epoch: &EpochState, dwell_secs: i64) -> Option<Timestamp> {
    epoch.active_since.map(|since| since.saturating_add(dwell_secs))
}

/// Close the epoch and publish the winner.
///
/// The published reference price is the tail node's accumulated *weight*,
/// not its price key. Nothing is published while the tail is the head (no
/// candidates). A tail whose weight has been fully released publishes 0,
/// which halts buying and selling until a later epoch publishes a positive
/// price. Vote records and node weights carry over into
/// the next epoch. An idle epoch finalizes without dwell, republishing the
/// current tail.
pub fn finalize(
    epoch: &mut EpochState,
    list: &CandidateList<'_>,
    dwell_secs: i64,
    now: Timestamp,
) -> Result<Option<Price>, TallyError> {
    if let Some(closes_at) = closes_at(epoch, dwell_secs) {
        if now < closes_at {
            return Err(TallyError::TooEarly { closes_at });
        }
    }

    let tail = list.tail()?;
    let published = if !tail.is_head() {
        epoch.current_price = tail.weight;
        Some(tail.weight)
    } else {
        None
    };

    if epoch.active_since.take().is_some() {
        epoch.epoch += 1;
        epoch.last_finalized_at = Some(now);
    }

    info!(
        epoch = epoch.epoch,
        winner = tail.price,
        current_price = epoch.current_price,
        published = published.is_some(),
        "voting epoch finalized"
    );
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StateDb;

    const DWELL: i64 = 3_600;

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("tally_epoch_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    #[test]
    fn opens_once_per_cycle() {
        let mut epoch = EpochState::new(100);
        assert!(open_if_idle(&mut epoch, 10));
        assert!(!open_if_idle(&mut epoch, 20));
        assert_eq!(epoch.active_since, Some(10));
    }

    #[test]
    fn finalize_before_dwell_is_too_early() {
        let db = temp_db("too_early");
        let list = CandidateList::open(&db).unwrap();
        let mut epoch = EpochState::new(100);
        open_if_idle(&mut epoch, 1_000);

        let err = finalize(&mut epoch, &list, DWELL, 1_000 + DWELL - 1).unwrap_err();
        assert_eq!(err, TallyError::TooEarly { closes_at: 1_000 + DWELL });
        assert_eq!(epoch.current_price, 100);
        assert_eq!(epoch.active_since, Some(1_000));
    }

    #[test]
    fn finalize_publishes_tail_weight() {
        let db = temp_db("publish");
        let mut list = CandidateList::open(&db).unwrap();
        list.propose_insert(0, 60, 70).unwrap();
        list.propose_insert(1, 8_000, 12_000).unwrap();
        let mut epoch = EpochState::new(100);
        open_if_idle(&mut epoch, 0);

        assert_eq!(finalize(&mut epoch, &list, DWELL, DWELL).unwrap(), Some(12_000));
        assert_eq!(epoch.current_price, 12_000);
        assert_eq!(epoch.active_since, None);
        assert_eq!(epoch.epoch, 1);
        assert_eq!(epoch.last_finalized_at, Some(DWELL));
    }

    #[test]
    fn finalize_without_candidates_keeps_price() {
        let db = temp_db("no_candidates");
        let list = CandidateList::open(&db).unwrap();
        let mut epoch = EpochState::new(100);
        open_if_idle(&mut epoch, 0);

        assert_eq!(finalize(&mut epoch, &list, DWELL, DWELL).unwrap(), None);
        assert_eq!(epoch.current_price, 100);
        assert!(!epoch.is_active());
    }

    #[test]
    fn idle_finalize_does_not_advance_counter() {
        let db = temp_db("idle");
        let mut list = CandidateList::open(&db).unwrap();
        list.propose_insert(0, 60, 70).unwrap();
        let mut epoch = EpochState::new(100);

        assert_eq!(finalize(&mut epoch, &list, DWELL, 5).unwrap(), Some(70));
        assert_eq!(epoch.epoch, 0);
        assert_eq!(epoch.last_finalized_at, None);
    }

    #[test]
    fn fully_released_tail_publishes_zero() {
        let db = temp_db("released_tail");
        let mut list = CandidateList::open(&db).unwrap();
        let node = list.propose_insert(0, 60, 400).unwrap();
        list.propose_reweight(node, 60, 0).unwrap();
        let mut epoch = EpochState::new(1_000);
        open_if_idle(&mut epoch, 0);

        assert_eq!(finalize(&mut epoch, &list, DWELL, DWELL).unwrap(), Some(0));
        assert_eq!(epoch.current_price, 0);
        assert_eq!(epoch.epoch, 1);
    }
}
