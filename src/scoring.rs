//! Scoring engine
//!
//! Pure, deterministic point-delta calculations for the three kinds of
//! judgment a host can make: standard questions, the wagered final round,
//! and the sudden-death tiebreaker. None of these functions hold or mutate
//! state; idempotence of judging (first judgment wins) is enforced by the
//! room coordinator, not here.

/// Computes the score delta for a standard question judgment
///
/// One point for a correct answer, nothing for an incorrect one.
pub fn judge_standard(correct: bool) -> i64 {
    if correct { 1 } else { 0 }
}

/// Computes the score delta for a final-round judgment
///
/// The declared wager is clamped into `[0, current_score]` before being
/// applied, using the player's score as of the moment of judgment rather
/// than the moment of submission. This means a wager can never exceed the
/// player's bankroll, a negative or garbage wager counts as zero, and a
/// score change between wagering and judging cannot be exploited.
///
/// The returned delta is the effective wager, positive when correct and
/// negative when incorrect. Since its magnitude never exceeds
/// `current_score`, applying it can never take a score below zero.
pub fn judge_final(correct: bool, declared_wager: i64, current_score: i64) -> i64 {
    let effective = declared_wager.clamp(0, current_score.max(0));
    if correct { effective } else { -effective }
}

/// Computes the score delta for a sudden-death judgment
///
/// Identical to [`judge_standard`]; the "first correct answer wins" rule is
/// enforced by the coordinator, which refuses to mark a second submission
/// correct once the round has a winner.
pub fn judge_sudden_death(correct: bool) -> i64 {
    judge_standard(correct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judge_standard() {
        assert_eq!(judge_standard(true), 1);
        assert_eq!(judge_standard(false), 0);
    }

    #[test]
    fn test_judge_final_within_score() {
        assert_eq!(judge_final(true, 3, 7), 3);
        assert_eq!(judge_final(false, 3, 7), -3);
    }

    #[test]
    fn test_judge_final_clamps_to_score() {
        // Player with score 5 wagers 9999: delta is +5 when correct
        assert_eq!(judge_final(true, 9999, 5), 5);
        assert_eq!(judge_final(false, 9999, 5), -5);
    }

    #[test]
    fn test_judge_final_negative_wager_clamps_to_zero() {
        assert_eq!(judge_final(true, -50, 7), 0);
        assert_eq!(judge_final(false, -50, 7), 0);
    }

    #[test]
    fn test_judge_final_zero_score() {
        assert_eq!(judge_final(true, 100, 0), 0);
        assert_eq!(judge_final(false, 100, 0), 0);
    }

    #[test]
    fn test_judge_final_negative_score_treated_as_zero() {
        // Scores never go negative through judged deltas, but the clamp
        // must still behave if handed one.
        assert_eq!(judge_final(true, 10, -3), 0);
        assert_eq!(judge_final(false, 10, -3), 0);
    }

    #[test]
    fn test_judge_final_delta_never_exceeds_score() {
        for score in 0..20 {
            for wager in -5..30 {
                let delta = judge_final(true, wager, score);
                assert!(delta.abs() <= score.max(0));
                assert!(delta >= 0);

                let delta = judge_final(false, wager, score);
                assert!(delta.abs() <= score.max(0));
                assert!(delta <= 0);
                // Applying the delta never takes the score below zero
                assert!(score.max(0) + delta >= 0);
            }
        }
    }

    #[test]
    fn test_judge_sudden_death() {
        assert_eq!(judge_sudden_death(true), 1);
        assert_eq!(judge_sudden_death(false), 0);
    }
}
