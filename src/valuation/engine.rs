//! Heuristic player-valuation model.
//!
//! Maps a player's accumulated performance to two numbers: an internal
//! rating on an arbitrary scale (used for cross-player comparison) and a
//! market value in millions (used for display). The key properties:
//!
//! - **Position-weighted scoring**: a goal from a defender is worth less
//!   than one from a forward; a tackle is worth far more from a defender.
//! - **Diminishing returns on saves**: shot-stopping volume enters through
//!   `ln(1 + saves)` so a keeper's rating doesn't grow linearly forever.
//! - **Experience bonus**: up to +15%, keyed on the team's completed
//!   matches (reaches the cap at 15 matches).
//! - **Discipline penalty**: up to −20% from accumulated cards.
//! - **Convex currency curve**: market value grows as `0.2 · 1.08^rating`,
//!   scaled by a position scarcity multiplier.
//!
//! Every function here is total: zero denominators yield 0.0 rates, scores
//! are clamped before the exponential curve, and the output is floored at
//! zero. Nothing in this module can fail.

use crate::db::models::{Player, Position, Stats};

/// Per-position scoring coefficients (goal, assist, shot accuracy, dribble,
/// pass, tackle, save).
#[derive(Debug, Clone, Copy)]
pub struct PositionWeights {
    pub goal: f64,
    pub assist: f64,
    pub shot: f64,
    pub dribble: f64,
    pub pass: f64,
    pub tackle: f64,
    pub save: f64,
}

// Unknown position text never reaches this table: it is defaulted to
// midfielder when rows are mapped out of the database.
const FORWARD: PositionWeights = PositionWeights {
    goal: 6.0,
    assist: 3.0,
    shot: 3.0,
    dribble: 2.0,
    pass: 1.5,
    tackle: 0.5,
    save: 0.0,
};
const MIDFIELDER: PositionWeights = PositionWeights {
    goal: 3.5,
    assist: 4.0,
    shot: 1.5,
    dribble: 2.5,
    pass: 3.5,
    tackle: 1.5,
    save: 0.0,
};
const DEFENDER: PositionWeights = PositionWeights {
    goal: 1.0,
    assist: 1.0,
    shot: 0.5,
    dribble: 0.5,
    pass: 2.0,
    tackle: 5.0,
    save: 0.0,
};
const GOALKEEPER: PositionWeights = PositionWeights {
    goal: 0.5,
    assist: 0.5,
    shot: 0.0,
    dribble: 0.0,
    pass: 1.0,
    tackle: 1.0,
    save: 7.0,
};

/// Weight vector for a position
pub fn position_weights(position: Position) -> PositionWeights {
    match position {
        Position::Forward => FORWARD,
        Position::Midfielder => MIDFIELDER,
        Position::Defender => DEFENDER,
        Position::Goalkeeper => GOALKEEPER,
    }
}

/// Experience bonus cap (+15%), reached once the team has played 15 matches.
const EXPERIENCE_BONUS_CAP: f64 = 0.15;
/// Discipline penalty cap (−20%).
const DISCIPLINE_PENALTY_CAP: f64 = 0.2;
/// Currency curve base: value grows convexly with rating.
const VALUE_CURVE_BASE: f64 = 1.08;
/// Currency curve scale; rating 0 still yields a nominal market presence.
const VALUE_CURVE_SCALE: f64 = 0.2;

/// Compute a player's internal rating from goals, cards, accumulated stats
/// and the team's completed-match count. An absent stats record is treated
/// as all-zero.
///
/// The experience bonus is keyed on TEAM matches played, not individual
/// appearances — a coarse proxy kept for continuity with the stored data.
pub fn compute_internal_score(
    player: &Player,
    stats: Option<&Stats>,
    team_matches_played: u32,
) -> f64 {
    let shot_accuracy = stats.map_or(0.0, |s| safe_rate(s.shots_on_target, s.shots));
    let dribble_rate = stats.map_or(0.0, |s| safe_rate(s.dribbles_completed, s.dribbles_attempted));
    let pass_rate = stats.map_or(0.0, |s| safe_rate(s.passes_completed, s.passes_attempted));
    let tackle_rate = stats.map_or(0.0, |s| safe_rate(s.tackles_won, s.tackles_attempted));
    let assists = stats.map_or(0, |s| s.assists) as f64;
    let saves = stats.map_or(0, |s| s.saves) as f64;

    let w = position_weights(player.position);

    // Rates are scaled ×10 to a magnitude comparable to raw counts; the
    // logarithmic save term gives diminishing returns on volume.
    let base = w.goal * player.goals as f64
        + w.assist * assists
        + w.shot * (shot_accuracy * 10.0)
        + w.dribble * (dribble_rate * 10.0)
        + w.pass * (pass_rate * 10.0)
        + w.tackle * (tackle_rate * 10.0)
        + w.save * saves.ln_1p() * 2.0;

    let bonus = 1.0 + (team_matches_played as f64 / 100.0).min(EXPERIENCE_BONUS_CAP);
    let penalty = 1.0
        - (player.yellow_cards as f64 * 0.01 + player.red_cards as f64 * 0.05)
            .min(DISCIPLINE_PENALTY_CAP);

    round2((base * bonus * penalty).max(0.0))
}

/// Convert an internal rating to a market value in millions.
///
/// The rating is clamped to [0, 100] before the exponential curve, so a
/// rating of 0 still yields `0.2 × multiplier` (nominal market presence)
/// and anything above 100 is silently capped. The position multiplier
/// reflects market scarcity pricing, not performance.
pub fn score_to_market_value(score: f64, position: Position) -> f64 {
    let clamped = score.clamp(0.0, 100.0);
    let value = VALUE_CURVE_SCALE * VALUE_CURVE_BASE.powf(clamped);
    let multiplier = match position {
        Position::Goalkeeper => 0.7,
        Position::Defender => 0.8,
        Position::Midfielder => 1.0,
        Position::Forward => 1.3,
    };
    round2(value * multiplier)
}

// ── Math utilities ───────────────────────────────────────────────────────────

/// `ok / attempted`, or 0.0 when nothing was attempted
fn safe_rate(ok: u32, attempted: u32) -> f64 {
    if attempted > 0 {
        ok as f64 / attempted as f64
    } else {
        0.0
    }
}

/// Round to 2 decimal places
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_player(position: Position, goals: u32, yellow: u32, red: u32) -> Player {
        Player {
            id: 1,
            name: "Test".into(),
            shirt_number: 9,
            position,
            goals,
            yellow_cards: yellow,
            red_cards: red,
            rating: 0.0,
            market_value: 0.0,
            team_id: Some(1),
        }
    }

    fn empty_stats() -> Stats {
        Stats {
            player_id: 1,
            ..Default::default()
        }
    }

    #[test]
    fn zero_attempts_never_divide() {
        // All-zero stats: every ratio denominator is zero
        let player = make_player(Position::Midfielder, 0, 0, 0);
        let stats = empty_stats();
        let score = compute_internal_score(&player, Some(&stats), 0);
        assert_relative_eq!(score, 0.0, epsilon = 1e-9);
        assert_relative_eq!(safe_rate(0, 0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(safe_rate(5, 0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_stats_equal_all_zero_stats() {
        let player = make_player(Position::Forward, 3, 1, 0);
        let with_zeros = compute_internal_score(&player, Some(&empty_stats()), 5);
        let without = compute_internal_score(&player, None, 5);
        assert_relative_eq!(with_zeros, without, epsilon = 1e-9);
    }

    #[test]
    fn forward_scenario_matches_hand_computation() {
        // base = 6.0*5 + 3.0*2 + 3.0*(0.5*10) + 2.0*(0.5*10) + 1.5*(0.8*10)
        //      = 30 + 6 + 15 + 10 + 12 = 73
        // bonus = 1 + min(10/100, 0.15) = 1.10
        // penalty = 1 - min(0.01, 0.2) = 0.99
        // score = round(73 * 1.10 * 0.99, 2) = round(79.497, 2) = 79.50
        let player = make_player(Position::Forward, 5, 1, 0);
        let stats = Stats {
            player_id: 1,
            shots: 20,
            shots_on_target: 10,
            assists: 2,
            dribbles_attempted: 10,
            dribbles_completed: 5,
            passes_attempted: 100,
            passes_completed: 80,
            tackles_attempted: 0,
            tackles_won: 0,
            saves: 0,
        };
        let score = compute_internal_score(&player, Some(&stats), 10);
        assert_relative_eq!(score, 79.5, epsilon = 1e-9);

        let value = score_to_market_value(score, Position::Forward);
        let expected = 0.2 * 1.08f64.powf(score) * 1.3;
        assert!(
            (value - expected).abs() <= 0.005,
            "market value {value} should match curve output {expected} within rounding"
        );
    }

    #[test]
    fn score_is_never_negative() {
        // Heavy card counts on a player with no production
        let player = make_player(Position::Defender, 0, 50, 10);
        let score = compute_internal_score(&player, None, 0);
        assert!(score >= 0.0);

        // And with some production, the penalty caps at 20% rather than
        // driving the score below zero
        let player = make_player(Position::Forward, 2, 99, 99);
        let score = compute_internal_score(&player, None, 0);
        assert!(score >= 0.0);
    }

    #[test]
    fn discipline_penalty_saturates() {
        // 100y/100r and 20y/4r both hit the 0.2 cap
        let extreme = make_player(Position::Forward, 10, 100, 100);
        let capped = make_player(Position::Forward, 10, 20, 4);
        let a = compute_internal_score(&extreme, None, 0);
        let b = compute_internal_score(&capped, None, 0);
        assert_relative_eq!(a, b, epsilon = 1e-9);
    }

    #[test]
    fn experience_bonus_caps_at_fifteen_matches() {
        let player = make_player(Position::Forward, 10, 0, 0);
        let at_cap = compute_internal_score(&player, None, 15);
        let beyond = compute_internal_score(&player, None, 400);
        assert_relative_eq!(at_cap, beyond, epsilon = 1e-9);

        let below = compute_internal_score(&player, None, 10);
        assert!(below < at_cap);
    }

    #[test]
    fn saves_have_diminishing_returns() {
        let keeper = make_player(Position::Goalkeeper, 0, 0, 0);
        let stats_n = |saves| Stats {
            player_id: 1,
            saves,
            ..Default::default()
        };
        let s10 = compute_internal_score(&keeper, Some(&stats_n(10)), 0);
        let s20 = compute_internal_score(&keeper, Some(&stats_n(20)), 0);
        let s40 = compute_internal_score(&keeper, Some(&stats_n(40)), 0);
        // Doubling the volume never doubles the score
        assert!(s20 < 2.0 * s10);
        assert!(s40 < 2.0 * s20);
    }

    #[test]
    fn market_value_monotone_on_clamped_domain() {
        for position in [
            Position::Goalkeeper,
            Position::Defender,
            Position::Midfielder,
            Position::Forward,
        ] {
            let mut prev = f64::NEG_INFINITY;
            let mut score = 0.0;
            while score <= 100.0 {
                let value = score_to_market_value(score, position);
                assert!(
                    value >= prev,
                    "value must not decrease: {prev} -> {value} at score {score}"
                );
                prev = value;
                score += 0.25;
            }
        }
    }

    #[test]
    fn scores_above_hundred_are_clamped() {
        for position in [Position::Midfielder, Position::Forward] {
            assert_relative_eq!(
                score_to_market_value(150.0, position),
                score_to_market_value(100.0, position),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn zero_score_keeps_nominal_market_presence() {
        assert_relative_eq!(
            score_to_market_value(0.0, Position::Goalkeeper),
            0.14,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            score_to_market_value(0.0, Position::Defender),
            0.16,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            score_to_market_value(0.0, Position::Midfielder),
            0.2,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            score_to_market_value(0.0, Position::Forward),
            0.26,
            epsilon = 1e-9
        );
    }

    #[test]
    fn position_changes_weighting_of_same_stats() {
        let stats = Stats {
            player_id: 1,
            tackles_attempted: 10,
            tackles_won: 8,
            ..Default::default()
        };
        let defender = make_player(Position::Defender, 1, 0, 0);
        let forward = make_player(Position::Forward, 1, 0, 0);
        let d = compute_internal_score(&defender, Some(&stats), 0);
        let f = compute_internal_score(&forward, Some(&stats), 0);
        // Tackling is weighted 10× higher for defenders (5.0 vs 0.5)
        assert!(d > f);
    }
}
