use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::db::models::{
    MatchResult, NewMatch, NewPlayer, NewTeam, PlayerPatch, Stats, StatsUpdate, TeamPatch,
};
use crate::db::Database;
use crate::valuation::{spawn_player_value_recompute, spawn_team_record_recompute};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Build the Axum router for the league API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/teams", post(create_team).get(list_teams))
        .route(
            "/teams/:id",
            get(get_team).patch(patch_team).delete(delete_team),
        )
        .route("/teams/:id/players", get(list_team_players))
        .route("/players", post(create_player).get(list_players))
        .route("/players/unassigned", get(list_unassigned_players))
        .route(
            "/players/:id",
            get(get_player).patch(patch_player).delete(delete_player),
        )
        .route("/players/:id/detail", get(get_player_detail))
        .route("/players/:id/team", get(get_player_team))
        .route("/players/:id/team/:team_id", put(assign_player_team))
        .route("/players/:id/stats", put(upsert_player_stats))
        .route("/matches", post(create_match).get(list_matches))
        .route("/matches/:id", get(get_match))
        .route("/matches/:id/result", patch(set_match_result))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(err) => {
                error!("request failed: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<rusqlite::Error>()
        .map(|e| e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation))
        .unwrap_or(false)
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if len == 0 || len > 200 {
        return Err(ApiError::Invalid(
            "name must be between 1 and 200 characters".into(),
        ));
    }
    Ok(())
}

fn validate_shirt_number(n: u32) -> Result<(), ApiError> {
    if !(1..=99).contains(&n) {
        return Err(ApiError::Invalid(
            "shirt number must be between 1 and 99".into(),
        ));
    }
    Ok(())
}

// ── Teams ─────────────────────────────────────────────────────────────────────

/// POST /teams
async fn create_team(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTeam>,
) -> Result<impl IntoResponse, ApiError> {
    validate_name(&payload.name)?;
    match state.db.insert_team(&payload) {
        Ok(team) => {
            info!("team created: {} - {}", team.id, team.name);
            Ok((StatusCode::CREATED, Json(team)))
        }
        Err(err) if is_unique_violation(&err) => Err(ApiError::Conflict(format!(
            "team name '{}' already exists",
            payload.name
        ))),
        Err(err) => Err(err.into()),
    }
}

/// GET /teams
async fn list_teams(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_teams()?))
}

/// GET /teams/:id
async fn get_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state.db.get_team(id)?.ok_or(ApiError::NotFound("team"))?;
    Ok(Json(team))
}

/// PATCH /teams/:id
async fn patch_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<TeamPatch>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    match state.db.update_team(id, &patch) {
        Ok(Some(team)) => {
            info!("team updated: {} - {}", team.id, team.name);
            Ok(Json(team))
        }
        Ok(None) => Err(ApiError::NotFound("team")),
        Err(err) if is_unique_violation(&err) => {
            Err(ApiError::Conflict("team name already exists".into()))
        }
        Err(err) => Err(err.into()),
    }
}

/// DELETE /teams/:id
async fn delete_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.delete_team(id)? {
        return Err(ApiError::NotFound("team"));
    }
    info!("team deleted: {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /teams/:id/players
async fn list_team_players(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.get_team(id)?.ok_or(ApiError::NotFound("team"))?;
    Ok(Json(state.db.list_team_players(id)?))
}

// ── Players ───────────────────────────────────────────────────────────────────

/// POST /players
async fn create_player(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPlayer>,
) -> Result<impl IntoResponse, ApiError> {
    validate_name(&payload.name)?;
    validate_shirt_number(payload.shirt_number)?;
    if let Some(team_id) = payload.team_id {
        state
            .db
            .get_team(team_id)?
            .ok_or(ApiError::NotFound("team"))?;
    }
    let player = state.db.insert_player(&payload)?;
    if let Some(team_id) = player.team_id {
        state.db.refresh_team_player_count(team_id)?;
    }
    info!("player created: {} - {}", player.id, player.name);
    Ok((StatusCode::CREATED, Json(player)))
}

/// GET /players
async fn list_players(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_players()?))
}

/// GET /players/unassigned
async fn list_unassigned_players(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_unassigned_players()?))
}

/// GET /players/:id
async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let player = state
        .db
        .get_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    Ok(Json(player))
}

/// PATCH /players/:id — goals/cards/team changes re-trigger the value recompute
async fn patch_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<PlayerPatch>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(n) = patch.shirt_number {
        validate_shirt_number(n)?;
    }
    if let Some(team_id) = patch.team_id {
        state
            .db
            .get_team(team_id)?
            .ok_or(ApiError::NotFound("team"))?;
    }
    let before = state
        .db
        .get_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    let player = state
        .db
        .update_player(id, &patch)?
        .ok_or(ApiError::NotFound("player"))?;
    if before.team_id != player.team_id {
        if let Some(former) = before.team_id {
            state.db.refresh_team_player_count(former)?;
        }
        if let Some(current) = player.team_id {
            state.db.refresh_team_player_count(current)?;
        }
    }
    spawn_player_value_recompute(state.db.clone(), id);
    info!("player updated: {} - {}", player.id, player.name);
    Ok(Json(player))
}

/// DELETE /players/:id
async fn delete_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .delete_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    if let Some(team_id) = deleted.team_id {
        state.db.refresh_team_player_count(team_id)?;
    }
    info!("player deleted: {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /players/:id/detail — player plus stats, zeros when no stats row exists
async fn get_player_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let player = state
        .db
        .get_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    let stats = state.db.get_stats(id)?.unwrap_or(Stats {
        player_id: id,
        ..Default::default()
    });
    Ok(Json(json!({ "player": player, "stats": stats })))
}

/// GET /players/:id/team
async fn get_player_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let player = state
        .db
        .get_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    let team_id = player.team_id.ok_or(ApiError::NotFound("team"))?;
    let team = state
        .db
        .get_team(team_id)?
        .ok_or(ApiError::NotFound("team"))?;
    Ok(Json(team))
}

/// PUT /players/:id/team/:team_id
async fn assign_player_team(
    State(state): State<Arc<AppState>>,
    Path((id, team_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let before = state
        .db
        .get_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    state
        .db
        .get_team(team_id)?
        .ok_or(ApiError::NotFound("team"))?;
    let patch = PlayerPatch {
        team_id: Some(team_id),
        ..Default::default()
    };
    let player = state
        .db
        .update_player(id, &patch)?
        .ok_or(ApiError::NotFound("player"))?;
    if let Some(former) = before.team_id {
        state.db.refresh_team_player_count(former)?;
    }
    state.db.refresh_team_player_count(team_id)?;
    info!("player {id} assigned to team {team_id}");
    Ok(Json(player))
}

// ── Stats ─────────────────────────────────────────────────────────────────────

/// PUT /players/:id/stats — full-record upsert, triggers the value recompute
async fn upsert_player_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<StatsUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .get_player(id)?
        .ok_or(ApiError::NotFound("player"))?;
    let stats = state.db.upsert_stats(id, &payload)?;
    spawn_player_value_recompute(state.db.clone(), id);
    info!("stats updated for player {id}");
    Ok(Json(stats))
}

// ── Matches ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MatchListQuery {
    team_id: Option<i64>,
}

/// POST /matches
async fn create_match(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewMatch>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.home_team_id == payload.away_team_id {
        return Err(ApiError::Invalid("a team cannot play itself".into()));
    }
    state
        .db
        .get_team(payload.home_team_id)?
        .ok_or(ApiError::NotFound("home team"))?;
    state
        .db
        .get_team(payload.away_team_id)?
        .ok_or(ApiError::NotFound("away team"))?;
    let m = state.db.insert_match(&payload)?;
    info!(
        "match created: {} (home {} vs away {})",
        m.id, m.home_team_id, m.away_team_id
    );
    Ok((StatusCode::CREATED, Json(m)))
}

/// GET /matches?team_id=
async fn list_matches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_matches(query.team_id)?))
}

/// GET /matches/:id
async fn get_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let m = state.db.get_match(id)?.ok_or(ApiError::NotFound("match"))?;
    Ok(Json(m))
}

/// PATCH /matches/:id/result — records the score and re-triggers both
/// sides' record recompute
async fn set_match_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(result): Json<MatchResult>,
) -> Result<impl IntoResponse, ApiError> {
    let m = state
        .db
        .set_match_result(id, result.home_goals, result.away_goals)?
        .ok_or(ApiError::NotFound("match"))?;
    spawn_team_record_recompute(state.db.clone(), m.home_team_id);
    spawn_team_record_recompute(state.db.clone(), m.away_team_id);
    info!(
        "match {} result recorded: {}-{}",
        m.id, m.home_goals, m.away_goals
    );
    Ok(Json(m))
}
