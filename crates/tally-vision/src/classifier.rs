use tally_proto::Direction;

use crate::config::DirectionConfig;

/// Decides whether the move from `prev` to `curr` is a crossing.
///
/// The displacement has to strictly exceed the threshold. Moving along the
/// configured entry direction is an entry, moving against it an exit.
pub fn decide(prev: i64, curr: i64, cfg: &DirectionConfig) -> Option<Direction> {
    let along = (curr as i128 - prev as i128) * cfg.entry.entry_sign() as i128;
    let threshold = cfg.threshold as i128;
    if along > threshold {
        Some(Direction::Entry)
    } else if along < -threshold {
        Some(Direction::Exit)
    } else {
        None
    }
}
