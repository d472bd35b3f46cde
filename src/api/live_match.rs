use crate::{
    auth::auth::AuthUser,
    domain::tictactoe::{Board, Mark, MatchState, MatchStatus, MoveError, Outcome},
    error::{ApiError, db_failure},
    model::live_match::{LiveMatch, MATCH_COLUMNS},
    utils::change_feed::{Audience, ChangeAction, ChangeEvent, ChangeFeed},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveRequest {
    /// Board cell, 0..=8 left to right, top to bottom
    #[schema(example = 4)]
    pub cell: i64,
}

impl From<MoveError> for ApiError {
    fn from(e: MoveError) -> Self {
        match e {
            MoveError::NotAPlayer => ApiError::forbidden(e.to_string()),
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

/// Rebuild the game state from its stored row.
fn state_of(row: &LiveMatch) -> Result<MatchState, ApiError> {
    let corrupt = |what: &str| {
        error!(match_id = row.id, what, "Stored match is corrupt");
        ApiError::Internal
    };

    let board = Board::from_str(&row.board).map_err(|_| corrupt("board"))?;
    let next_turn = row
        .next_turn
        .chars()
        .next()
        .and_then(Mark::from_char)
        .ok_or_else(|| corrupt("next_turn"))?;
    let status = MatchStatus::from_str(&row.status).map_err(|_| corrupt("status"))?;
    let outcome = match row.winner.as_deref() {
        None => None,
        Some("draw") => Some(Outcome::Draw),
        Some(w) => Some(Outcome::Win(
            w.chars()
                .next()
                .and_then(Mark::from_char)
                .ok_or_else(|| corrupt("winner"))?,
        )),
    };

    Ok(MatchState {
        player_x: row.player_x,
        player_o: row.player_o,
        board,
        next_turn,
        status,
        outcome,
    })
}

async fn fetch_match(pool: &MySqlPool, match_id: u64) -> Result<LiveMatch, ApiError> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM live_matches WHERE id = ?");
    sqlx::query_as::<_, LiveMatch>(&sql)
        .bind(match_id)
        .fetch_optional(pool)
        .await
        .map_err(db_failure("Failed to fetch match"))?
        .ok_or_else(|| ApiError::not_found("Match not found"))
}

fn announce(feed: &ChangeFeed, match_id: u64, state: &MatchState, action: ChangeAction) {
    let mut players = vec![state.player_x];
    players.extend(state.player_o);
    feed.publish(ChangeEvent::new(
        "live_matches",
        action,
        match_id,
        Audience::Employees(players),
    ));
}

/// Write `next` only if the row still holds `prev`'s board and status.
async fn store_transition(
    pool: &MySqlPool,
    match_id: u64,
    prev: &MatchState,
    next: &MatchState,
) -> Result<LiveMatch, ApiError> {
    let res = sqlx::query(
        r#"
        UPDATE live_matches
        SET player_o = ?, board = ?, next_turn = ?, status = ?, winner = ?
        WHERE id = ? AND board = ? AND status = ?
        "#,
    )
    .bind(next.player_o)
    .bind(next.board.to_string())
    .bind(next.next_turn.as_char().to_string())
    .bind(next.status.to_string())
    .bind(next.outcome.map(Outcome::as_str))
    .bind(match_id)
    .bind(prev.board.to_string())
    .bind(prev.status.to_string())
    .execute(pool)
    .await
    .map_err(db_failure("Failed to store match state"))?;

    if res.rows_affected() == 0 {
        warn!(match_id, "Match changed underneath a move");
        return Err(ApiError::conflict("Match was updated by another move, reload and retry"));
    }

    fetch_match(pool, match_id).await
}

#[utoipa::path(
    post,
    path = "/api/matches",
    responses((status = 201, description = "Match created, waiting for an opponent", body = LiveMatch)),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn create_match(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let state = MatchState::new(auth.employee_id);

    let res = sqlx::query(
        "INSERT INTO live_matches (player_x, board, next_turn, status) VALUES (?, ?, ?, ?)",
    )
    .bind(state.player_x)
    .bind(state.board.to_string())
    .bind(state.next_turn.as_char().to_string())
    .bind(state.status.to_string())
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to create match"))?;

    let match_id = res.last_insert_id();
    info!(match_id, player_x = auth.employee_id, "Match created");

    // open matches are listed to everyone
    feed.publish(ChangeEvent::new(
        "live_matches",
        ChangeAction::Insert,
        match_id,
        Audience::Everyone,
    ));

    let row = fetch_match(pool.get_ref(), match_id).await?;
    Ok(HttpResponse::Created().json(row))
}

#[utoipa::path(
    put,
    path = "/api/matches/{match_id}/join",
    params(("match_id" = u64, Path, description = "Match ID")),
    responses(
        (status = 200, description = "Joined as O, match is active", body = LiveMatch),
        (status = 400, description = "Own match or not waiting"),
        (status = 404, description = "Match not found"),
        (status = 409, description = "Someone else joined first")
    ),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn join_match(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let match_id = path.into_inner();
    let row = fetch_match(pool.get_ref(), match_id).await?;
    let prev = state_of(&row)?;
    let next = prev.join(auth.employee_id).map_err(ApiError::from)?;

    let row = store_transition(pool.get_ref(), match_id, &prev, &next).await?;
    info!(match_id, player_o = auth.employee_id, "Match joined");
    announce(&feed, match_id, &next, ChangeAction::Update);

    Ok(HttpResponse::Ok().json(row))
}

#[utoipa::path(
    put,
    path = "/api/matches/{match_id}/move",
    params(("match_id" = u64, Path, description = "Match ID")),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Move accepted", body = LiveMatch),
        (status = 400, description = "Not active, not your turn, bad or taken cell"),
        (status = 403, description = "Not a player in this match"),
        (status = 404, description = "Match not found"),
        (status = 409, description = "Board changed concurrently")
    ),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn make_move(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<MoveRequest>,
) -> actix_web::Result<impl Responder> {
    let match_id = path.into_inner();
    let cell = usize::try_from(payload.cell).unwrap_or(usize::MAX);

    let row = fetch_match(pool.get_ref(), match_id).await?;
    let prev = state_of(&row)?;
    let next = prev.play(auth.employee_id, cell).map_err(ApiError::from)?;

    let row = store_transition(pool.get_ref(), match_id, &prev, &next).await?;
    if let Some(outcome) = next.outcome {
        info!(match_id, result = outcome.as_str(), "Match finished");
    }
    announce(&feed, match_id, &next, ChangeAction::Update);

    Ok(HttpResponse::Ok().json(row))
}

#[utoipa::path(
    put,
    path = "/api/matches/{match_id}/forfeit",
    params(("match_id" = u64, Path, description = "Match ID")),
    responses(
        (status = 200, description = "Conceded, the opponent wins", body = LiveMatch),
        (status = 400, description = "Match is not active"),
        (status = 403, description = "Not a player in this match"),
        (status = 404, description = "Match not found")
    ),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn forfeit_match(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let match_id = path.into_inner();
    let row = fetch_match(pool.get_ref(), match_id).await?;
    let prev = state_of(&row)?;
    let next = prev.forfeit(auth.employee_id).map_err(ApiError::from)?;

    let row = store_transition(pool.get_ref(), match_id, &prev, &next).await?;
    announce(&feed, match_id, &next, ChangeAction::Update);

    Ok(HttpResponse::Ok().json(row))
}

#[utoipa::path(
    get,
    path = "/api/matches/{match_id}",
    params(("match_id" = u64, Path, description = "Match ID")),
    responses(
        (status = 200, description = "Match found", body = LiveMatch),
        (status = 404, description = "Match not found")
    ),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn get_match(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let row = fetch_match(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[utoipa::path(
    get,
    path = "/api/matches/open",
    responses((status = 200, description = "Matches waiting for an opponent", body = [LiveMatch])),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn open_matches(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM live_matches WHERE status = 'waiting' ORDER BY created_at DESC LIMIT 50"
    );
    let rows = sqlx::query_as::<_, LiveMatch>(&sql)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to list open matches"))?;

    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/matches/mine",
    responses((status = 200, description = "The caller's recent matches", body = [LiveMatch])),
    tag = "LiveMatch",
    security(("bearer_auth" = []))
)]
pub async fn my_matches(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM live_matches WHERE player_x = ? OR player_o = ? \
         ORDER BY updated_at DESC LIMIT 20"
    );
    let rows = sqlx::query_as::<_, LiveMatch>(&sql)
        .bind(auth.employee_id)
        .bind(auth.employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to list matches"))?;

    Ok(HttpResponse::Ok().json(rows))
}
