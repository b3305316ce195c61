use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field position of a player. Stored as lowercase text in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "goalkeeper",
            Position::Defender => "defender",
            Position::Midfielder => "midfielder",
            Position::Forward => "forward",
        }
    }

    /// Parse the stored text form. Returns `None` for unrecognized text;
    /// row mapping falls back to `Midfielder` so a stray value in the
    /// database can never fail a read.
    pub fn parse(s: &str) -> Option<Position> {
        match s {
            "goalkeeper" => Some(Position::Goalkeeper),
            "defender" => Some(Position::Defender),
            "midfielder" => Some(Position::Midfielder),
            "forward" => Some(Position::Forward),
            _ => None,
        }
    }
}

/// Lifecycle state of a match. Stored as lowercase text in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Played,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Played => "played",
        }
    }

    pub fn parse(s: &str) -> Option<MatchStatus> {
        match s {
            "scheduled" => Some(MatchStatus::Scheduled),
            "played" => Some(MatchStatus::Played),
            _ => None,
        }
    }
}

/// A team in the league
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    /// Roster size, refreshed from a COUNT scan on roster changes
    pub player_count: u32,
    /// Completed matches, recomputed from the match table
    pub matches_played: u32,
    /// Won matches, recomputed from the match table (wins ≤ matches_played)
    pub wins: u32,
}

/// A registered player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub shirt_number: u32,
    pub position: Position,
    pub goals: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    /// Internal valuation score; written only by the recompute task
    pub rating: f64,
    /// Market value in millions, 2 decimal places; written only by the recompute task
    pub market_value: f64,
    /// A player may be unaffiliated
    pub team_id: Option<i64>,
}

/// Accumulated per-player statistics. At most one row per player; an absent
/// row is equivalent to all-zero stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub player_id: i64,
    pub shots: u32,
    pub shots_on_target: u32,
    pub assists: u32,
    pub dribbles_attempted: u32,
    pub dribbles_completed: u32,
    pub passes_attempted: u32,
    pub passes_completed: u32,
    pub tackles_attempted: u32,
    pub tackles_won: u32,
    pub saves: u32,
}

/// A scheduled or completed match between two teams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub kickoff: Option<DateTime<Utc>>,
    pub matchday: Option<u32>,
    pub status: MatchStatus,
    /// Meaningful only when status is `Played`
    pub home_goals: u32,
    pub away_goals: u32,
}

// ── Request payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub name: String,
    #[serde(default)]
    pub player_count: u32,
    #[serde(default)]
    pub matches_played: u32,
    #[serde(default)]
    pub wins: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub player_count: Option<u32>,
    pub matches_played: Option<u32>,
    pub wins: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlayer {
    pub name: String,
    pub shirt_number: u32,
    pub position: Position,
    #[serde(default)]
    pub goals: u32,
    #[serde(default)]
    pub yellow_cards: u32,
    #[serde(default)]
    pub red_cards: u32,
    pub team_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerPatch {
    pub name: Option<String>,
    pub shirt_number: Option<u32>,
    pub position: Option<Position>,
    pub goals: Option<u32>,
    pub yellow_cards: Option<u32>,
    pub red_cards: Option<u32>,
    pub team_id: Option<i64>,
}

/// Full stats record for upsert; omitted fields default to zero
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsUpdate {
    #[serde(default)]
    pub shots: u32,
    #[serde(default)]
    pub shots_on_target: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub dribbles_attempted: u32,
    #[serde(default)]
    pub dribbles_completed: u32,
    #[serde(default)]
    pub passes_attempted: u32,
    #[serde(default)]
    pub passes_completed: u32,
    #[serde(default)]
    pub tackles_attempted: u32,
    #[serde(default)]
    pub tackles_won: u32,
    #[serde(default)]
    pub saves: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMatch {
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub kickoff: Option<DateTime<Utc>>,
    pub matchday: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MatchResult {
    pub home_goals: u32,
    pub away_goals: u32,
}
