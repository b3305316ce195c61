//! Background reconciliation of derived fields.
//!
//! Two orchestrators keep stored derived values in sync after writes: one
//! recomputes a player's rating and market value, the other recomputes a
//! team's matches-played/wins record by re-scanning the match table.
//!
//! Both run as fire-and-forget units spawned after the triggering request
//! has already been answered, so failures are contained here: the internal
//! functions return `Result` and the spawn wrappers convert any error into
//! a log line at the task boundary. A vanished entity (deleted between
//! trigger and execution) is a benign no-op, not an error.
//!
//! No ordering is guaranteed across concurrent triggers for the same
//! entity: two rapid writes may interleave their recomputes and the stored
//! value reflects whichever read-then-write lands last. Acceptable for a
//! low-write-rate league tool.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::db::Database;

use super::engine::{compute_internal_score, score_to_market_value};

/// Dispatch a player-value recompute after the current request completes.
/// Never blocks the caller; failures are logged and swallowed.
pub fn spawn_player_value_recompute(db: Database, player_id: i64) {
    tokio::spawn(async move {
        if let Err(err) = recompute_player_value(&db, player_id) {
            error!("player {player_id} value recompute failed: {err:#}");
        }
    });
}

/// Dispatch a team-record recompute after the current request completes.
/// Never blocks the caller; failures are logged and swallowed.
pub fn spawn_team_record_recompute(db: Database, team_id: i64) {
    tokio::spawn(async move {
        if let Err(err) = recompute_team_record(&db, team_id) {
            error!("team {team_id} record recompute failed: {err:#}");
        }
    });
}

/// Bring a player's stored rating and market value in sync with current
/// stats, goals, cards, and team state. Persists only when a value changed.
pub fn recompute_player_value(db: &Database, player_id: i64) -> Result<()> {
    let Some(player) = db.get_player(player_id)? else {
        // The triggering write may have raced with a deletion
        warn!("player {player_id} no longer exists, skipping value recompute");
        return Ok(());
    };
    let stats = db.get_stats(player_id)?;
    let team_matches = match player.team_id {
        Some(team_id) => db.count_played_matches(team_id)?,
        None => 0,
    };

    let rating = compute_internal_score(&player, stats.as_ref(), team_matches);
    let market_value = score_to_market_value(rating, player.position);

    // Both sides went through the same 2-decimal rounding, so exact
    // comparison is stable; skip the write when nothing changed.
    if rating != player.rating || market_value != player.market_value {
        db.update_player_valuation(player_id, rating, market_value)
            .with_context(|| {
                format!("persisting rating={rating:.2}, market={market_value:.2}")
            })?;
        info!(
            "player {} value updated: rating={:.2}, market={:.2}M",
            player_id, rating, market_value
        );
    }
    Ok(())
}

/// Recompute a team's matches-played and wins from the authoritative match
/// set. Always a full re-scan, never a delta update, so repeated runs are
/// idempotent and order-independent.
pub fn recompute_team_record(db: &Database, team_id: i64) -> Result<()> {
    if db.get_team(team_id)?.is_none() {
        warn!("team {team_id} no longer exists, skipping record recompute");
        return Ok(());
    }
    let matches_played = db.count_played_matches(team_id)?;
    let wins = db.count_played_wins(team_id)?;
    db.update_team_record(team_id, matches_played, wins)
        .with_context(|| format!("persisting played={matches_played}, wins={wins}"))?;
    info!("team {team_id} record recomputed: played={matches_played}, wins={wins}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewMatch, NewPlayer, NewTeam, Position, StatsUpdate};
    use approx::assert_relative_eq;

    fn mem_db() -> Database {
        Database::open(":memory:").expect("in-memory db")
    }

    fn make_team(db: &Database, name: &str) -> i64 {
        db.insert_team(&NewTeam {
            name: name.into(),
            player_count: 0,
            matches_played: 0,
            wins: 0,
        })
        .unwrap()
        .id
    }

    fn make_player(db: &Database, team_id: Option<i64>, goals: u32, yellow: u32) -> i64 {
        db.insert_player(&NewPlayer {
            name: "Player".into(),
            shirt_number: 9,
            position: Position::Forward,
            goals,
            yellow_cards: yellow,
            red_cards: 0,
            team_id,
        })
        .unwrap()
        .id
    }

    fn play_match(db: &Database, home: i64, away: i64, hg: u32, ag: u32) {
        let m = db
            .insert_match(&NewMatch {
                home_team_id: home,
                away_team_id: away,
                kickoff: None,
                matchday: None,
            })
            .unwrap();
        db.set_match_result(m.id, hg, ag).unwrap();
    }

    #[test]
    fn player_value_lands_in_the_row() {
        let db = mem_db();
        let team = make_team(&db, "Forest");
        let player = make_player(&db, Some(team), 5, 1);
        db.upsert_stats(
            player,
            &StatsUpdate {
                shots: 20,
                shots_on_target: 10,
                assists: 2,
                dribbles_attempted: 10,
                dribbles_completed: 5,
                passes_attempted: 100,
                passes_completed: 80,
                ..Default::default()
            },
        )
        .unwrap();
        // 10 played matches for the experience bonus
        let other = make_team(&db, "Other");
        for _ in 0..10 {
            play_match(&db, team, other, 1, 0);
        }

        recompute_player_value(&db, player).unwrap();
        let stored = db.get_player(player).unwrap().unwrap();
        assert_relative_eq!(stored.rating, 79.5, epsilon = 1e-9);
        assert_relative_eq!(
            stored.market_value,
            score_to_market_value(79.5, Position::Forward),
            epsilon = 1e-9
        );
    }

    #[test]
    fn unaffiliated_player_gets_no_experience_bonus() {
        let db = mem_db();
        let player = make_player(&db, None, 4, 0);
        recompute_player_value(&db, player).unwrap();
        let stored = db.get_player(player).unwrap().unwrap();
        // 6.0 * 4 goals, no bonus, no penalty
        assert_relative_eq!(stored.rating, 24.0, epsilon = 1e-9);
    }

    #[test]
    fn vanished_player_is_a_quiet_noop() {
        let db = mem_db();
        recompute_player_value(&db, 4242).unwrap();
        assert!(db.get_player(4242).unwrap().is_none());
    }

    #[test]
    fn repeated_player_recompute_is_stable() {
        let db = mem_db();
        let player = make_player(&db, None, 3, 2);
        recompute_player_value(&db, player).unwrap();
        let first = db.get_player(player).unwrap().unwrap();
        recompute_player_value(&db, player).unwrap();
        let second = db.get_player(player).unwrap().unwrap();
        assert_relative_eq!(first.rating, second.rating, epsilon = 1e-9);
        assert_relative_eq!(first.market_value, second.market_value, epsilon = 1e-9);
    }

    #[test]
    fn team_record_counts_wins_from_either_side() {
        let db = mem_db();
        let team = make_team(&db, "City");
        let rival = make_team(&db, "Rival");
        play_match(&db, team, rival, 2, 1); // home win
        play_match(&db, team, rival, 3, 0); // home win
        play_match(&db, rival, team, 2, 0); // away loss

        recompute_team_record(&db, team).unwrap();
        let stored = db.get_team(team).unwrap().unwrap();
        assert_eq!(stored.matches_played, 3);
        assert_eq!(stored.wins, 2);

        recompute_team_record(&db, rival).unwrap();
        let rival_stored = db.get_team(rival).unwrap().unwrap();
        assert_eq!(rival_stored.matches_played, 3);
        assert_eq!(rival_stored.wins, 1);
    }

    #[test]
    fn team_record_recompute_is_idempotent() {
        let db = mem_db();
        let team = make_team(&db, "United");
        let rival = make_team(&db, "Rovers");
        play_match(&db, team, rival, 1, 1); // draw
        play_match(&db, team, rival, 2, 0); // win

        recompute_team_record(&db, team).unwrap();
        let first = db.get_team(team).unwrap().unwrap();
        recompute_team_record(&db, team).unwrap();
        let second = db.get_team(team).unwrap().unwrap();
        assert_eq!(first.matches_played, second.matches_played);
        assert_eq!(first.wins, second.wins);
        assert_eq!(second.matches_played, 2);
        assert_eq!(second.wins, 1);
    }

    #[test]
    fn vanished_team_is_a_quiet_noop() {
        let db = mem_db();
        recompute_team_record(&db, 99).unwrap();
    }

    #[tokio::test]
    async fn spawned_recompute_runs_detached() {
        let db = mem_db();
        let player = make_player(&db, None, 2, 0);
        spawn_player_value_recompute(db.clone(), player);
        // Yield until the detached task has landed its write
        for _ in 0..100 {
            tokio::task::yield_now().await;
            if db.get_player(player).unwrap().unwrap().rating > 0.0 {
                break;
            }
        }
        let stored = db.get_player(player).unwrap().unwrap();
        assert_relative_eq!(stored.rating, 12.0, epsilon = 1e-9);
    }
}
