use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub mod models;
use models::*;

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    /// Pass `:memory:` for an ephemeral database (used in tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Teams ─────────────────────────────────────────────────────────────────

    /// Insert a new team. Fails with a constraint violation if the name is taken.
    pub fn insert_team(&self, team: &NewTeam) -> Result<Team> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO teams (name, player_count, matches_played, wins)
             VALUES (?1, ?2, ?3, ?4)",
            params![team.name, team.player_count, team.matches_played, team.wins],
        )?;
        Ok(Team {
            id: conn.last_insert_rowid(),
            name: team.name.clone(),
            player_count: team.player_count,
            matches_played: team.matches_played,
            wins: team.wins,
        })
    }

    /// List all teams, newest first
    pub fn list_teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, player_count, matches_played, wins
             FROM teams ORDER BY id DESC",
        )?;
        let teams = stmt
            .query_map([], map_team)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(teams)
    }

    pub fn get_team(&self, id: i64) -> Result<Option<Team>> {
        let conn = self.conn.lock().unwrap();
        Ok(fetch_team(&conn, id)?)
    }

    /// Apply a partial update to a team. Returns the updated row, or `None`
    /// if the team does not exist.
    pub fn update_team(&self, id: i64, patch: &TeamPatch) -> Result<Option<Team>> {
        let conn = self.conn.lock().unwrap();
        let Some(mut team) = fetch_team(&conn, id)? else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            team.name = name.clone();
        }
        if let Some(n) = patch.player_count {
            team.player_count = n;
        }
        if let Some(n) = patch.matches_played {
            team.matches_played = n;
        }
        if let Some(n) = patch.wins {
            team.wins = n;
        }
        conn.execute(
            "UPDATE teams SET name=?1, player_count=?2, matches_played=?3, wins=?4 WHERE id=?5",
            params![team.name, team.player_count, team.matches_played, team.wins, id],
        )?;
        Ok(Some(team))
    }

    /// Delete a team (players and matches cascade). Returns false if absent.
    pub fn delete_team(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM teams WHERE id=?1", params![id])?;
        Ok(affected > 0)
    }

    /// List a team's roster, newest first
    pub fn list_team_players(&self, team_id: i64) -> Result<Vec<Player>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, shirt_number, position, goals, yellow_cards, red_cards,
                    rating, market_value, team_id
             FROM players WHERE team_id=?1 ORDER BY id DESC",
        )?;
        let players = stmt
            .query_map(params![team_id], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    /// Refresh a team's roster counter from a COUNT scan
    pub fn refresh_team_player_count(&self, team_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE teams
             SET player_count = (SELECT COUNT(*) FROM players WHERE team_id=?1)
             WHERE id=?1",
            params![team_id],
        )?;
        Ok(())
    }

    // ── Players ───────────────────────────────────────────────────────────────

    pub fn insert_player(&self, player: &NewPlayer) -> Result<Player> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO players (name, shirt_number, position, goals,
                                  yellow_cards, red_cards, team_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                player.name,
                player.shirt_number,
                player.position.as_str(),
                player.goals,
                player.yellow_cards,
                player.red_cards,
                player.team_id,
            ],
        )?;
        Ok(Player {
            id: conn.last_insert_rowid(),
            name: player.name.clone(),
            shirt_number: player.shirt_number,
            position: player.position,
            goals: player.goals,
            yellow_cards: player.yellow_cards,
            red_cards: player.red_cards,
            rating: 0.0,
            market_value: 0.0,
            team_id: player.team_id,
        })
    }

    /// List all players, newest first
    pub fn list_players(&self) -> Result<Vec<Player>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, shirt_number, position, goals, yellow_cards, red_cards,
                    rating, market_value, team_id
             FROM players ORDER BY id DESC",
        )?;
        let players = stmt
            .query_map([], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    /// List players without a team affiliation, newest first
    pub fn list_unassigned_players(&self) -> Result<Vec<Player>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, shirt_number, position, goals, yellow_cards, red_cards,
                    rating, market_value, team_id
             FROM players WHERE team_id IS NULL ORDER BY id DESC",
        )?;
        let players = stmt
            .query_map([], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    pub fn get_player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn.lock().unwrap();
        Ok(fetch_player(&conn, id)?)
    }

    /// Apply a partial update to a player. Returns the updated row, or `None`
    /// if the player does not exist.
    pub fn update_player(&self, id: i64, patch: &PlayerPatch) -> Result<Option<Player>> {
        let conn = self.conn.lock().unwrap();
        let Some(mut player) = fetch_player(&conn, id)? else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            player.name = name.clone();
        }
        if let Some(n) = patch.shirt_number {
            player.shirt_number = n;
        }
        if let Some(p) = patch.position {
            player.position = p;
        }
        if let Some(n) = patch.goals {
            player.goals = n;
        }
        if let Some(n) = patch.yellow_cards {
            player.yellow_cards = n;
        }
        if let Some(n) = patch.red_cards {
            player.red_cards = n;
        }
        if let Some(team_id) = patch.team_id {
            player.team_id = Some(team_id);
        }
        conn.execute(
            "UPDATE players SET name=?1, shirt_number=?2, position=?3, goals=?4,
                    yellow_cards=?5, red_cards=?6, team_id=?7 WHERE id=?8",
            params![
                player.name,
                player.shirt_number,
                player.position.as_str(),
                player.goals,
                player.yellow_cards,
                player.red_cards,
                player.team_id,
                id,
            ],
        )?;
        Ok(Some(player))
    }

    /// Delete a player (stats cascade). Returns the deleted row so callers
    /// can refresh the former team's roster counter.
    pub fn delete_player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn.lock().unwrap();
        let Some(player) = fetch_player(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM players WHERE id=?1", params![id])?;
        Ok(Some(player))
    }

    /// Write back derived valuation fields
    pub fn update_player_valuation(&self, id: i64, rating: f64, market_value: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE players SET rating=?1, market_value=?2 WHERE id=?3",
            params![rating, market_value, id],
        )?;
        Ok(())
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    pub fn get_stats(&self, player_id: i64) -> Result<Option<Stats>> {
        let conn = self.conn.lock().unwrap();
        let stats = conn
            .query_row(
                "SELECT player_id, shots, shots_on_target, assists,
                        dribbles_attempted, dribbles_completed,
                        passes_attempted, passes_completed,
                        tackles_attempted, tackles_won, saves
                 FROM player_stats WHERE player_id=?1",
                params![player_id],
                map_stats,
            )
            .optional()?;
        Ok(stats)
    }

    /// Upsert the full stats record for a player
    pub fn upsert_stats(&self, player_id: i64, stats: &StatsUpdate) -> Result<Stats> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO player_stats (player_id, shots, shots_on_target, assists,
                                       dribbles_attempted, dribbles_completed,
                                       passes_attempted, passes_completed,
                                       tackles_attempted, tackles_won, saves)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(player_id) DO UPDATE SET
                shots=excluded.shots,
                shots_on_target=excluded.shots_on_target,
                assists=excluded.assists,
                dribbles_attempted=excluded.dribbles_attempted,
                dribbles_completed=excluded.dribbles_completed,
                passes_attempted=excluded.passes_attempted,
                passes_completed=excluded.passes_completed,
                tackles_attempted=excluded.tackles_attempted,
                tackles_won=excluded.tackles_won,
                saves=excluded.saves",
            params![
                player_id,
                stats.shots,
                stats.shots_on_target,
                stats.assists,
                stats.dribbles_attempted,
                stats.dribbles_completed,
                stats.passes_attempted,
                stats.passes_completed,
                stats.tackles_attempted,
                stats.tackles_won,
                stats.saves,
            ],
        )?;
        Ok(Stats {
            player_id,
            shots: stats.shots,
            shots_on_target: stats.shots_on_target,
            assists: stats.assists,
            dribbles_attempted: stats.dribbles_attempted,
            dribbles_completed: stats.dribbles_completed,
            passes_attempted: stats.passes_attempted,
            passes_completed: stats.passes_completed,
            tackles_attempted: stats.tackles_attempted,
            tackles_won: stats.tackles_won,
            saves: stats.saves,
        })
    }

    // ── Matches ───────────────────────────────────────────────────────────────

    pub fn insert_match(&self, m: &NewMatch) -> Result<Match> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO matches (home_team_id, away_team_id, kickoff, matchday)
             VALUES (?1, ?2, ?3, ?4)",
            params![m.home_team_id, m.away_team_id, m.kickoff, m.matchday],
        )?;
        Ok(Match {
            id: conn.last_insert_rowid(),
            home_team_id: m.home_team_id,
            away_team_id: m.away_team_id,
            kickoff: m.kickoff,
            matchday: m.matchday,
            status: MatchStatus::Scheduled,
            home_goals: 0,
            away_goals: 0,
        })
    }

    /// List matches, optionally filtered to those involving one team
    pub fn list_matches(&self, team_id: Option<i64>) -> Result<Vec<Match>> {
        let conn = self.conn.lock().unwrap();
        let sql_all = "SELECT id, home_team_id, away_team_id, kickoff, matchday,
                              status, home_goals, away_goals
                       FROM matches ORDER BY kickoff DESC, id DESC";
        let sql_team = "SELECT id, home_team_id, away_team_id, kickoff, matchday,
                               status, home_goals, away_goals
                        FROM matches WHERE home_team_id=?1 OR away_team_id=?1
                        ORDER BY kickoff DESC, id DESC";
        let matches = match team_id {
            Some(team_id) => {
                let mut stmt = conn.prepare(sql_team)?;
                let rows = stmt
                    .query_map(params![team_id], map_match)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(sql_all)?;
                let rows = stmt
                    .query_map([], map_match)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(matches)
    }

    pub fn get_match(&self, id: i64) -> Result<Option<Match>> {
        let conn = self.conn.lock().unwrap();
        Ok(fetch_match(&conn, id)?)
    }

    /// Record a final score and mark the match played. Returns the updated
    /// row, or `None` if the match does not exist.
    pub fn set_match_result(
        &self,
        id: i64,
        home_goals: u32,
        away_goals: u32,
    ) -> Result<Option<Match>> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE matches SET home_goals=?1, away_goals=?2, status=?3 WHERE id=?4",
            params![home_goals, away_goals, MatchStatus::Played.as_str(), id],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        Ok(fetch_match(&conn, id)?)
    }

    // ── Team record scans ─────────────────────────────────────────────────────

    /// Count played matches where the team was either side
    pub fn count_played_matches(&self, team_id: i64) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM matches
             WHERE status='played' AND (home_team_id=?1 OR away_team_id=?1)",
            params![team_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Count played matches the team won. Draws count toward neither side.
    pub fn count_played_wins(&self, team_id: i64) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM matches
             WHERE status='played'
               AND ((home_team_id=?1 AND home_goals > away_goals)
                 OR (away_team_id=?1 AND away_goals > home_goals))",
            params![team_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Write back recomputed record fields
    pub fn update_team_record(&self, team_id: i64, matches_played: u32, wins: u32) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE teams SET matches_played=?1, wins=?2 WHERE id=?3",
            params![matches_played, wins, team_id],
        )?;
        Ok(())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn fetch_team(conn: &Connection, id: i64) -> rusqlite::Result<Option<Team>> {
    conn.query_row(
        "SELECT id, name, player_count, matches_played, wins FROM teams WHERE id=?1",
        params![id],
        map_team,
    )
    .optional()
}

fn fetch_player(conn: &Connection, id: i64) -> rusqlite::Result<Option<Player>> {
    conn.query_row(
        "SELECT id, name, shirt_number, position, goals, yellow_cards, red_cards,
                rating, market_value, team_id
         FROM players WHERE id=?1",
        params![id],
        map_player,
    )
    .optional()
}

fn fetch_match(conn: &Connection, id: i64) -> rusqlite::Result<Option<Match>> {
    conn.query_row(
        "SELECT id, home_team_id, away_team_id, kickoff, matchday,
                status, home_goals, away_goals
         FROM matches WHERE id=?1",
        params![id],
        map_match,
    )
    .optional()
}

fn map_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        player_count: row.get(2)?,
        matches_played: row.get(3)?,
        wins: row.get(4)?,
    })
}

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    let position: String = row.get(3)?;
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        shirt_number: row.get(2)?,
        // Stray position text falls back to midfielder rather than failing the read
        position: Position::parse(&position).unwrap_or(Position::Midfielder),
        goals: row.get(4)?,
        yellow_cards: row.get(5)?,
        red_cards: row.get(6)?,
        rating: row.get(7)?,
        market_value: row.get(8)?,
        team_id: row.get(9)?,
    })
}

fn map_stats(row: &rusqlite::Row) -> rusqlite::Result<Stats> {
    Ok(Stats {
        player_id: row.get(0)?,
        shots: row.get(1)?,
        shots_on_target: row.get(2)?,
        assists: row.get(3)?,
        dribbles_attempted: row.get(4)?,
        dribbles_completed: row.get(5)?,
        passes_attempted: row.get(6)?,
        passes_completed: row.get(7)?,
        tackles_attempted: row.get(8)?,
        tackles_won: row.get(9)?,
        saves: row.get(10)?,
    })
}

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<Match> {
    let status: String = row.get(5)?;
    Ok(Match {
        id: row.get(0)?,
        home_team_id: row.get(1)?,
        away_team_id: row.get(2)?,
        kickoff: row.get(3)?,
        matchday: row.get(4)?,
        status: MatchStatus::parse(&status).unwrap_or(MatchStatus::Scheduled),
        home_goals: row.get(6)?,
        away_goals: row.get(7)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    name           TEXT    NOT NULL UNIQUE,
    player_count   INTEGER NOT NULL DEFAULT 0,
    matches_played INTEGER NOT NULL DEFAULT 0,
    wins           INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS players (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT    NOT NULL,
    shirt_number INTEGER NOT NULL,
    position     TEXT    NOT NULL,
    goals        INTEGER NOT NULL DEFAULT 0,
    yellow_cards INTEGER NOT NULL DEFAULT 0,
    red_cards    INTEGER NOT NULL DEFAULT 0,
    rating       REAL    NOT NULL DEFAULT 0.0,
    market_value REAL    NOT NULL DEFAULT 0.0,
    team_id      INTEGER REFERENCES teams(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS player_stats (
    player_id          INTEGER PRIMARY KEY
                       REFERENCES players(id) ON DELETE CASCADE,
    shots              INTEGER NOT NULL DEFAULT 0,
    shots_on_target    INTEGER NOT NULL DEFAULT 0,
    assists            INTEGER NOT NULL DEFAULT 0,
    dribbles_attempted INTEGER NOT NULL DEFAULT 0,
    dribbles_completed INTEGER NOT NULL DEFAULT 0,
    passes_attempted   INTEGER NOT NULL DEFAULT 0,
    passes_completed   INTEGER NOT NULL DEFAULT 0,
    tackles_attempted  INTEGER NOT NULL DEFAULT 0,
    tackles_won        INTEGER NOT NULL DEFAULT 0,
    saves              INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS matches (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    home_team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    away_team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    kickoff      TEXT,
    matchday     INTEGER,
    status       TEXT    NOT NULL DEFAULT 'scheduled',
    home_goals   INTEGER NOT NULL DEFAULT 0,
    away_goals   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
CREATE INDEX IF NOT EXISTS idx_matches_home ON matches(home_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_away ON matches(away_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);
"#;
