//! Difficulty adjustment algorithm
//!
//! Per-block retarget against a target block interval. Difficulty is the
//! number of leading zero hex digits a block hash must carry.

use crate::constants::TEST_MODE_DIFFICULTY;
use crate::mining::MiningMode;

/// Lowest difficulty the retarget will step down to
pub const MIN_DIFFICULTY: u32 = 1;

/// Calculate the difficulty that follows a block mined in `interval_ms`
///
/// Pure function. Faster than half the target raises difficulty by one;
/// slower than twice the target lowers it by one, never below
/// [`MIN_DIFFICULTY`].
pub fn calculate_next_difficulty(current: u32, interval_ms: u64, target_ms: u64) -> u32 {
    if interval_ms < target_ms / 2 {
        current.saturating_add(1)
    } else if interval_ms > target_ms.saturating_mul(2) && current > MIN_DIFFICULTY {
        current - 1
    } else {
        current
    }
}

/// Difficulty to use after a block, given the mining mode
///
/// Test and instant modes pin difficulty; only normal mode retargets.
pub fn next_difficulty_for_mode(
    mode: MiningMode,
    current: u32,
    interval_ms: u64,
    target_ms: u64,
) -> u32 {
    match mode {
        MiningMode::Normal => calculate_next_difficulty(current, interval_ms, target_ms),
        MiningMode::Test | MiningMode::Instant => TEST_MODE_DIFFICULTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TARGET_BLOCK_TIME_MS;

    #[test]
    fn test_difficulty_increases_when_blocks_too_fast() {
        let next = calculate_next_difficulty(3, TARGET_BLOCK_TIME_MS / 2 - 1, TARGET_BLOCK_TIME_MS);
        assert_eq!(next, 4);
    }

    #[test]
    fn test_difficulty_decreases_when_blocks_too_slow() {
        let next = calculate_next_difficulty(3, TARGET_BLOCK_TIME_MS * 2 + 1, TARGET_BLOCK_TIME_MS);
        assert_eq!(next, 2);
    }

    #[test]
    fn test_difficulty_stable_inside_band() {
        for interval in [TARGET_BLOCK_TIME_MS / 2, TARGET_BLOCK_TIME_MS, TARGET_BLOCK_TIME_MS * 2] {
            assert_eq!(calculate_next_difficulty(3, interval, TARGET_BLOCK_TIME_MS), 3);
        }
    }

    #[test]
    fn test_difficulty_floor() {
        let next = calculate_next_difficulty(MIN_DIFFICULTY, u64::MAX, TARGET_BLOCK_TIME_MS);
        assert_eq!(next, MIN_DIFFICULTY);
    }

    #[test]
    fn test_pinned_modes() {
        for mode in [MiningMode::Test, MiningMode::Instant] {
            assert_eq!(next_difficulty_for_mode(mode, 5, 0, TARGET_BLOCK_TIME_MS), TEST_MODE_DIFFICULTY);
        }
        assert_eq!(next_difficulty_for_mode(MiningMode::Normal, 5, 0, TARGET_BLOCK_TIME_MS), 6);
    }
}
