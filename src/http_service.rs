//! REST surface: router, extractors, request/response types and handlers

use crate::auth::{self, Claims};
use crate::error::{AppError, AppResult};
use crate::models::{Account, Group, GroupMember, StakeWithOffer, WagerOffer};
use crate::services::ledger_service::resolve_amount;
use crate::services::{
    AccountUpdate, CancelledStake, FriendFeed, GenerationReport, LeaveOutcome, PlacedStake,
    Session,
};
use crate::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

type SharedState = Arc<AppState>;

// =============================================================================
// ERRORS
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let mut body = json!({
            "error": self.public_message(),
            "code": self.code(),
        });
        if let AppError::WagerWindow(violation) = &self {
            if let Some(days) = violation.days_remaining() {
                body["days_remaining"] = json!(days);
            }
        }

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

/// `Json` body whose rejections use the JSON error contract
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` parameters whose rejections use the JSON error contract
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Caller identified by the session cookie or a bearer token
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[axum::async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let from_cookie = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(auth::token_from_cookie_header);
        let token = from_cookie.or_else(|| {
            parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(auth::token_from_bearer)
        });

        let token = token.ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
        let claims = state.session_keys.verify(token)?;
        Ok(AuthUser(claims))
    }
}

/// Authenticated caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

#[axum::async_trait]
impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(AppError::Forbidden("Admin role required".into()));
        }
        Ok(AdminUser(claims))
    }
}

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Account,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceStakeRequest {
    pub bet_id: Uuid,
    pub amount: Option<Decimal>,
    /// Legacy name for `amount`
    pub solde: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub race_id: i64,
    pub runner_id: i64,
    pub odds: Decimal,
    pub target_position: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOfferRequest {
    pub odds: Option<Decimal>,
    pub target_position: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct JoinGroupResponse {
    pub group: Group,
    pub membership: GroupMember,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub user_id: Uuid,
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the REST router over shared application state
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/api/health", get(health))
        // accounts
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/logout", post(logout))
        .route("/api/users/me/bets", get(my_bets).post(place_bet))
        .route("/api/users/me/bets/:stake_id", axum::routing::delete(cancel_bet))
        .route("/api/users/me/friends/bets", get(friends_bets))
        .route("/api/users/me/groups", get(my_groups))
        .route("/api/users", get(list_users))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        // catalog
        .route("/api/bets", get(list_offers).post(create_offer))
        .route(
            "/api/bets/:id",
            get(get_offer).put(update_offer).delete(delete_offer),
        )
        .route("/api/bets/race/:race_id", get(offers_by_race))
        .route("/api/bets/runner/:runner_id", get(offers_by_runner))
        .route("/api/bets/generate/:race_id", post(generate_offers))
        // stakes (admin)
        .route("/api/stakes", get(list_stakes))
        .route("/api/stakes/:id", get(get_stake))
        .route("/api/stakes/user/:user_id", get(stakes_by_user))
        .route("/api/stakes/bet/:bet_id", get(stakes_by_offer))
        // groups
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/join", post(join_group))
        .route("/api/groups/:id", axum::routing::delete(delete_group))
        .route("/api/groups/:id/leave", post(leave_group))
        .route("/api/groups/:id/ban", post(ban_member))
        .route("/api/groups/:id/ranking", get(group_ranking))
        .route("/api/groups/:id/members", get(group_members))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn with_cookie<T: Serialize>(status: StatusCode, cookie: String, body: T) -> Response {
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

// =============================================================================
// HANDLERS: service
// =============================================================================

async fn banner() -> Json<serde_json::Value> {
    Json(json!({
        "service": "marathon-bet-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
) -> Json<serde_json::Value> {
    let database = state.database.ping().await.is_ok();
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "user": {
            "id": claims.sub,
            "email": claims.email,
            "role": claims.role,
        },
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

// =============================================================================
// HANDLERS: accounts
// =============================================================================

async fn register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let Session { account, token } = state
        .accounts
        .register(&req.name, &req.email, &req.password)
        .await?;
    let cookie = state.session_keys.session_cookie(&token);
    Ok(with_cookie(
        StatusCode::CREATED,
        cookie,
        SessionResponse { user: account, token },
    ))
}

async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let Session { account, token } = state.accounts.login(&req.email, &req.password).await?;
    let cookie = state.session_keys.session_cookie(&token);
    Ok(with_cookie(
        StatusCode::OK,
        cookie,
        SessionResponse { user: account, token },
    ))
}

async fn logout(State(state): State<SharedState>) -> Response {
    with_cookie(
        StatusCode::OK,
        state.session_keys.clear_cookie(),
        json!({ "message": "Logged out" }),
    )
}

async fn list_users(State(state): State<SharedState>) -> AppResult<Json<Vec<Account>>> {
    Ok(Json(state.accounts.list_accounts().await?))
}

async fn get_user(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.accounts.get_account(id).await?))
}

async fn update_user(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<AccountUpdate>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.accounts.update_account(&claims, id, update).await?))
}

async fn delete_user(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.accounts.delete_account(&claims, id).await?;
    Ok(Json(json!({ "message": "Account deleted" })))
}

// =============================================================================
// HANDLERS: personal ledger
// =============================================================================

async fn my_bets(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<Vec<StakeWithOffer>>> {
    Ok(Json(state.ledger.my_stakes(claims.sub).await?))
}

async fn place_bet(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<PlaceStakeRequest>,
) -> AppResult<(StatusCode, Json<PlacedStake>)> {
    let amount = resolve_amount(req.amount, req.solde)?;
    let placed = state.ledger.place_stake(claims.sub, req.bet_id, amount).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

async fn cancel_bet(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiPath(stake_id): ApiPath<Uuid>,
) -> AppResult<Json<CancelledStake>> {
    Ok(Json(state.ledger.cancel_stake(claims.sub, stake_id).await?))
}

async fn friends_bets(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<FriendFeed>> {
    Ok(Json(state.feed.friends_future_bets(claims.sub).await?))
}

async fn list_stakes(
    State(state): State<SharedState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<StakeWithOffer>>> {
    Ok(Json(state.ledger.all_stakes().await?))
}

async fn get_stake(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<StakeWithOffer>> {
    Ok(Json(state.ledger.get_stake(id).await?))
}

async fn stakes_by_user(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<StakeWithOffer>>> {
    Ok(Json(state.ledger.stakes_by_account(user_id).await?))
}

async fn stakes_by_offer(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(bet_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<StakeWithOffer>>> {
    Ok(Json(state.ledger.stakes_by_offer(bet_id).await?))
}

// =============================================================================
// HANDLERS: wager catalog
// =============================================================================

async fn list_offers(State(state): State<SharedState>) -> AppResult<Json<Vec<WagerOffer>>> {
    Ok(Json(state.catalog.list_offers().await?))
}

async fn get_offer(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<WagerOffer>> {
    Ok(Json(state.catalog.get_offer(id).await?))
}

async fn offers_by_race(
    State(state): State<SharedState>,
    ApiPath(race_id): ApiPath<i64>,
) -> AppResult<Json<Vec<WagerOffer>>> {
    Ok(Json(state.catalog.offers_by_race(race_id).await?))
}

async fn offers_by_runner(
    State(state): State<SharedState>,
    ApiPath(runner_id): ApiPath<i64>,
) -> AppResult<Json<Vec<WagerOffer>>> {
    Ok(Json(state.catalog.offers_by_runner(runner_id).await?))
}

async fn create_offer(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<CreateOfferRequest>,
) -> AppResult<(StatusCode, Json<WagerOffer>)> {
    let offer = state
        .catalog
        .create_offer(req.race_id, req.runner_id, req.odds, req.target_position)
        .await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

async fn update_offer(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOfferRequest>,
) -> AppResult<Json<WagerOffer>> {
    Ok(Json(
        state
            .catalog
            .update_offer(id, req.odds, req.target_position)
            .await?,
    ))
}

async fn delete_offer(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let refunded = state.catalog.delete_offer(id).await?;
    Ok(Json(json!({
        "message": "Bet deleted",
        "refunded_accounts": refunded,
    })))
}

async fn generate_offers(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(race_id): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<GenerationReport>)> {
    let report = state.catalog.generate_offers_for_race(race_id).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

// =============================================================================
// HANDLERS: groups
// =============================================================================

async fn my_groups(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<Vec<Group>>> {
    Ok(Json(state.groups.my_groups(claims.sub).await?))
}

async fn list_groups(
    State(state): State<SharedState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<Group>>> {
    Ok(Json(state.groups.list_groups().await?))
}

async fn create_group(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    let group = state.groups.create_group(claims.sub, &req.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn join_group(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<JoinGroupRequest>,
) -> AppResult<(StatusCode, Json<JoinGroupResponse>)> {
    let (group, membership) = state.groups.join_group(claims.sub, &req.code).await?;
    Ok((StatusCode::CREATED, Json(JoinGroupResponse { group, membership })))
}

async fn leave_group(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = state.groups.leave_group(claims.sub, id).await?;
    let message = match outcome {
        LeaveOutcome::Left => "You left the group",
        LeaveOutcome::Disbanded => "You owned this group; it has been deleted",
    };
    Ok(Json(json!({ "outcome": outcome, "message": message })))
}

async fn ban_member(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<BanRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.groups.ban_user(id, claims.sub, req.user_id).await?;
    Ok(Json(json!({ "message": "Member banned" })))
}

async fn group_ranking(
    State(state): State<SharedState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let ranking = state.groups.ranking(id).await?;
    Ok(Json(json!({ "group_id": id, "ranking": ranking })))
}

async fn group_members(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let members = state.groups.members(&claims, id).await?;
    Ok(Json(json!({ "group_id": id, "total": members.len(), "members": members })))
}

async fn delete_group(
    State(state): State<SharedState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.groups.delete_group(id).await?;
    Ok(Json(json!({ "message": "Group deleted" })))
}
