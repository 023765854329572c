// Draft turn-order computation for linear and snake drafts.

use serde::{Deserialize, Serialize};

/// How the pick order advances between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftType {
    /// Every round runs left to right in seating order.
    Linear,
    /// Direction reverses each round: even rounds (0-indexed) ascend, odd
    /// rounds descend. Row parity determines direction, not team index.
    Snake,
}

impl DraftType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(DraftType::Linear),
            "snake" => Some(DraftType::Snake),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DraftType::Linear => "linear",
            DraftType::Snake => "snake",
        }
    }
}

/// Team index on the clock for the given 0-indexed overall pick number.
pub fn team_for_pick(pick_number: usize, num_teams: usize, draft_type: DraftType) -> usize {
    let round = pick_number / num_teams;
    let seat = pick_number % num_teams;
    match draft_type {
        DraftType::Linear => seat,
        DraftType::Snake => {
            if round % 2 == 0 {
                seat
            } else {
                num_teams - 1 - seat
            }
        }
    }
}

/// The (round, team index) a 0-indexed pick number lands on.
pub fn slot_for_pick(
    pick_number: usize,
    num_teams: usize,
    draft_type: DraftType,
) -> (usize, usize) {
    (
        pick_number / num_teams,
        team_for_pick(pick_number, num_teams, draft_type),
    )
}

/// The full team-index pick sequence for a draft of `rounds` rounds.
pub fn pick_sequence(num_teams: usize, rounds: usize, draft_type: DraftType) -> Vec<usize> {
    (0..num_teams * rounds)
        .map(|p| team_for_pick(p, num_teams, draft_type))
        .collect()
}

/// Whether the 0-indexed pick number is the final selection of the draft.
pub fn is_last_pick(pick_number: usize, num_teams: usize, rounds: usize) -> bool {
    pick_number + 1 == num_teams * rounds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_both_types_case_insensitively() {
        assert_eq!(DraftType::parse("linear"), Some(DraftType::Linear));
        assert_eq!(DraftType::parse("Snake"), Some(DraftType::Snake));
        assert_eq!(DraftType::parse("SNAKE"), Some(DraftType::Snake));
        assert_eq!(DraftType::parse("auction"), None);
        assert_eq!(DraftType::parse(""), None);
    }

    #[test]
    fn linear_order_repeats_each_round() {
        let seq = pick_sequence(4, 2, DraftType::Linear);
        assert_eq!(seq, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    // Scenario: 4 teams, 2 rounds, snake -> T1..T4 ascending then T4..T1.
    #[test]
    fn snake_order_reverses_every_round() {
        let seq = pick_sequence(4, 2, DraftType::Snake);
        assert_eq!(seq, vec![0, 1, 2, 3, 3, 2, 1, 0]);
    }

    #[test]
    fn snake_direction_follows_row_parity() {
        let seq = pick_sequence(3, 4, DraftType::Snake);
        assert_eq!(
            seq,
            vec![0, 1, 2, 2, 1, 0, 0, 1, 2, 2, 1, 0],
            "even rounds ascend, odd rounds descend"
        );
    }

    #[test]
    fn slot_for_pick_tracks_round_and_seat() {
        assert_eq!(slot_for_pick(0, 4, DraftType::Snake), (0, 0));
        assert_eq!(slot_for_pick(3, 4, DraftType::Snake), (0, 3));
        // First pick of round 1 (descending) is the same team again.
        assert_eq!(slot_for_pick(4, 4, DraftType::Snake), (1, 3));
        assert_eq!(slot_for_pick(7, 4, DraftType::Snake), (1, 0));
    }

    #[test]
    fn last_pick_detection() {
        assert!(!is_last_pick(6, 4, 2));
        assert!(is_last_pick(7, 4, 2));
        assert!(is_last_pick(0, 1, 1));
    }

    #[test]
    fn snake_gives_back_to_back_picks_at_the_turn() {
        let seq = pick_sequence(4, 2, DraftType::Snake);
        // The team picking last in round 0 picks first in round 1.
        assert_eq!(seq[3], seq[4]);
    }
}
