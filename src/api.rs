// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! REST API over the ledger, record and dashboard services.
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `POST /api/users/register`, `POST /api/users/login`, `GET /api/users/{email}`
//! - `GET|POST|PUT /api/credits`, `GET|DELETE /api/credits/{id}`
//!   (same for `/api/debits` and `/api/final-balances`)
//! - `GET|POST|PUT /api/reserves`, `GET|DELETE /api/reserves/{id}`
//! - `POST /api/reserves/{id}/use`, `POST /api/reserves/{id}/add`
//! - `GET /api/reserves/{id}/transactions`, `GET /api/reserves/{id}/transactions.csv`
//! - `GET /api/reserves/{id}/reconcile`
//! - `GET /api/dashboard/...` monthly totals, usage, balance, history,
//!   evolution, flows and summary
//!
//! ## Example Usage
//!
//! ```bash
//! # Create a reserve
//! curl -X POST http://localhost:3000/api/reserves \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": "65f1a2b3c4d5e6f708192a3b", "description": "car",
//!        "initial_value": "1000", "current_balance": "1000", "month": 3, "year": 2025}'
//!
//! # Use part of it
//! curl -X POST http://localhost:3000/api/reserves/<id>/use \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": "300", "description": "carro"}'
//! ```

use crate::auth::{Claims, Registration, TokenIssuer, User, UserService};
use crate::base::{Period, RecordId};
use crate::config::Config;
use crate::dashboard::{Dashboard, DateRange, MonthlyFlow, MonthlyTotal, ReserveSummary};
use crate::error::StoreError;
use crate::export::write_transactions;
use crate::ledger::{Reconciliation, ReserveLedger};
use crate::records::{Credit, Debit, FinalBalance};
use crate::repository::{Repository, Validate};
use crate::reserve::{Reserve, ReserveTransaction};
use crate::store::Document;
use crate::LedgerError;
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

// === Request/Response DTOs ===

/// Request body for `use` and `add`.
///
/// ```json
/// {"amount": "300.00", "description": "carro"}
/// ```
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TotalResponse {
    pub total: Decimal,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

impl OwnerQuery {
    /// The requested owner, defaulting to the bearer token's user.
    fn owner(&self, caller: Option<Extension<Claims>>) -> Result<Option<RecordId>, LedgerError> {
        match self.user_id.as_deref() {
            Some(raw) => raw.parse().map(Some),
            None => Ok(caller.map(|Extension(claims)| claims.user_id())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    /// Defaults to the current year.
    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Period::current().year)
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RangeQuery {
    /// Both bounds or neither.
    fn optional(&self) -> Result<Option<DateRange>, LedgerError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => DateRange::new(from, to).map(Some),
            (None, None) => Ok(None),
            _ => Err(LedgerError::InvalidField {
                field: "range",
                reason: "from and to must be given together",
            }),
        }
    }

    fn required(&self) -> Result<DateRange, LedgerError> {
        self.optional()?.ok_or(LedgerError::InvalidField {
            field: "range",
            reason: "from and to are required",
        })
    }
}

// === Application State ===

/// Shared application state containing every service.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<ReserveLedger>,
    pub credits: Arc<Repository<Credit>>,
    pub debits: Arc<Repository<Debit>>,
    pub final_balances: Arc<Repository<FinalBalance>>,
    pub dashboard: Arc<Dashboard>,
    pub users: Arc<UserService>,
    pub require_auth: bool,
}

impl AppState {
    /// Wires every service over fresh in-memory collections.
    pub fn in_memory(tokens: TokenIssuer, require_auth: bool) -> Self {
        let ledger = Arc::new(ReserveLedger::in_memory());
        let credits = Arc::new(Repository::in_memory());
        let debits = Arc::new(Repository::in_memory());
        let final_balances = Arc::new(Repository::in_memory());
        let dashboard = Arc::new(Dashboard::new(
            Arc::clone(&credits),
            Arc::clone(&debits),
            Arc::clone(&final_balances),
            Arc::clone(&ledger),
        ));

        Self {
            ledger,
            credits,
            debits,
            final_balances,
            dashboard,
            users: Arc::new(UserService::in_memory(tokens)),
            require_auth,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let tokens = TokenIssuer::new(&config.token_secret, config.token_lifetime());
        Self::in_memory(tokens, config.require_auth)
    }
}

// === Error Handling ===

/// Wrapper for converting service errors into HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Ledger(LedgerError),
    Export(csv::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Ledger(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::Ledger(err) => err,
            AppError::Export(err) => {
                error!(error = %err, "csv export failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXPORT_FAILED",
                    "export failed".to_string(),
                );
            }
        };

        let (status, code) = match &err {
            LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            LedgerError::MalformedId(_) => (StatusCode::BAD_REQUEST, "MALFORMED_ID"),
            LedgerError::InvalidPeriod { .. } => (StatusCode::BAD_REQUEST, "INVALID_PERIOD"),
            LedgerError::InvalidField { .. } => (StatusCode::BAD_REQUEST, "INVALID_FIELD"),
            LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            LedgerError::InsufficientBalance { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
            }
            LedgerError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            LedgerError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            LedgerError::EmailTaken => (StatusCode::CONFLICT, "EMAIL_TAKEN"),
            LedgerError::Credential(detail) => {
                error!(%detail, "credential processing failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CREDENTIAL_ERROR",
                    "internal error".to_string(),
                );
            }
            LedgerError::Store(StoreError::DuplicateKey { .. }) => {
                (StatusCode::CONFLICT, "DUPLICATE_KEY")
            }
            LedgerError::Store(StoreError::Unavailable(detail)) => {
                // The detail may name internals; callers get a generic message
                error!(%detail, "store unavailable");
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "service temporarily unavailable".to_string(),
                );
            }
        };

        error_response(status, code, err.to_string())
    }
}

fn error_response(status: StatusCode, code: &str, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
        .into_response()
}

fn parse_id(raw: &str) -> Result<RecordId, LedgerError> {
    raw.parse()
}

// === Auth ===

/// Rejects requests without a valid bearer token when auth is required.
///
/// Verified [`Claims`] are stored in the request extensions, where list
/// handlers pick up the caller as the default owner.
async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.require_auth {
        return Ok(next.run(request).await);
    }

    let Some(token) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        warn!(path = %request.uri().path(), "request without bearer token");
        return Err(LedgerError::InvalidToken.into());
    };

    let claims: Claims = state.users.authenticate(token)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/users/register
async fn register_user(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.users.register(registration)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/users/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.users.login(&request.email, &request.password)?;
    Ok(Json(TokenResponse { token }))
}

/// GET /api/users/{email}
async fn find_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.find_by_email(&email)?))
}

// === Monthly record CRUD ===

/// Monthly records served by the generic CRUD handlers.
trait RecordResource: Document + Validate + Serialize + DeserializeOwned {
    fn repository(state: &AppState) -> &Repository<Self>;

    fn owner(&self) -> RecordId;
}

impl RecordResource for Credit {
    fn repository(state: &AppState) -> &Repository<Self> {
        &state.credits
    }

    fn owner(&self) -> RecordId {
        self.user_id
    }
}

impl RecordResource for Debit {
    fn repository(state: &AppState) -> &Repository<Self> {
        &state.debits
    }

    fn owner(&self) -> RecordId {
        self.user_id
    }
}

impl RecordResource for FinalBalance {
    fn repository(state: &AppState) -> &Repository<Self> {
        &state.final_balances
    }

    fn owner(&self) -> RecordId {
        self.user_id
    }
}

async fn list_records<T: RecordResource>(
    State(state): State<AppState>,
    caller: Option<Extension<Claims>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<T>>, AppError> {
    let repository = T::repository(&state);
    let records = match query.owner(caller)? {
        Some(user_id) => repository.find(&|record: &T| record.owner() == user_id)?,
        None => repository.all()?,
    };
    Ok(Json(records))
}

async fn create_record<T: RecordResource>(
    State(state): State<AppState>,
    Json(record): Json<T>,
) -> Result<(StatusCode, Json<T>), AppError> {
    let record = T::repository(&state).insert(record)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record<T: RecordResource>(
    State(state): State<AppState>,
    Json(record): Json<T>,
) -> Result<Json<T>, AppError> {
    T::repository(&state).update(record.clone())?;
    Ok(Json(record))
}

async fn get_record<T: RecordResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<T>, AppError> {
    Ok(Json(T::repository(&state).get(parse_id(&id)?)?))
}

async fn delete_record<T: RecordResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    T::repository(&state).delete(parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

fn record_routes<T: RecordResource>(path: &str) -> Router<AppState> {
    Router::new()
        .route(
            path,
            get(list_records::<T>)
                .post(create_record::<T>)
                .put(update_record::<T>),
        )
        .route(
            &format!("{path}/{{id}}"),
            get(get_record::<T>).delete(delete_record::<T>),
        )
}

// === Reserves ===

async fn list_reserves(
    State(state): State<AppState>,
    caller: Option<Extension<Claims>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Reserve>>, AppError> {
    let reserves = match query.owner(caller)? {
        Some(user_id) => state.ledger.reserves_for_user(user_id)?,
        None => state.ledger.reserves()?,
    };
    Ok(Json(reserves))
}

async fn create_reserve(
    State(state): State<AppState>,
    Json(reserve): Json<Reserve>,
) -> Result<(StatusCode, Json<Reserve>), AppError> {
    let reserve = state.ledger.create_reserve(reserve)?;
    Ok((StatusCode::CREATED, Json(reserve)))
}

async fn update_reserve(
    State(state): State<AppState>,
    Json(reserve): Json<Reserve>,
) -> Result<Json<Reserve>, AppError> {
    state.ledger.update_reserve(reserve.clone())?;
    Ok(Json(reserve))
}

async fn get_reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reserve>, AppError> {
    Ok(Json(state.ledger.reserve(parse_id(&id)?)?))
}

async fn delete_reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete_reserve(parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/reserves/{id}/use
async fn use_reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<ReserveTransaction>), AppError> {
    let transaction =
        state
            .ledger
            .use_reserve(parse_id(&id)?, request.amount, request.description)?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// POST /api/reserves/{id}/add
async fn add_to_reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<ReserveTransaction>), AppError> {
    let transaction =
        state
            .ledger
            .add_to_reserve(parse_id(&id)?, request.amount, request.description)?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn reserve_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReserveTransaction>>, AppError> {
    Ok(Json(state.ledger.transactions_for(parse_id(&id)?)?))
}

/// GET /api/reserves/{id}/transactions.csv
async fn export_reserve_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let reserve_id = parse_id(&id)?;
    let transactions = state.ledger.transactions_for(reserve_id)?;

    let mut body = Vec::new();
    write_transactions(&transactions, &mut body).map_err(AppError::Export)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"reserve-{reserve_id}.csv\""),
            ),
        ],
        body,
    )
        .into_response())
}

async fn reconcile_reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reconciliation>, AppError> {
    Ok(Json(state.ledger.reconcile(parse_id(&id)?)?))
}

// === Dashboard ===

async fn credits_by_month(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    Ok(Json(state.dashboard.credits_by_month(query.year())?))
}

async fn debits_by_month(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    Ok(Json(state.dashboard.debits_by_month(query.year())?))
}

async fn final_balances_by_month(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    Ok(Json(state.dashboard.final_balances_by_month(query.year())?))
}

async fn reserves_by_month(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    Ok(Json(state.dashboard.reserves_by_month(query.year())?))
}

async fn reserve_usage(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<TotalResponse>, AppError> {
    let total = state.dashboard.total_reserve_usage(query.year())?;
    Ok(Json(TotalResponse { total }))
}

async fn reserve_balance(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TotalResponse>, AppError> {
    let total = state.dashboard.reserve_balance(query.optional()?)?;
    Ok(Json(TotalResponse { total }))
}

async fn transaction_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    Ok(Json(state.dashboard.transaction_history()?))
}

async fn usage_evolution(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    Ok(Json(state.dashboard.usage_evolution(query.year())?))
}

async fn reserve_flows(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<MonthlyFlow>>, AppError> {
    Ok(Json(state.dashboard.reserve_flows(query.required()?)?))
}

async fn reserve_summary(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ReserveSummary>, AppError> {
    Ok(Json(state.dashboard.reserve_summary(query.optional()?)?))
}

// === Router ===

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/users/register", post(register_user))
        .route("/api/users/login", post(login));

    let protected = Router::new()
        .route("/api/users/{email}", get(find_user))
        .merge(record_routes::<Credit>("/api/credits"))
        .merge(record_routes::<Debit>("/api/debits"))
        .merge(record_routes::<FinalBalance>("/api/final-balances"))
        .route(
            "/api/reserves",
            get(list_reserves).post(create_reserve).put(update_reserve),
        )
        .route(
            "/api/reserves/{id}",
            get(get_reserve).delete(delete_reserve),
        )
        .route("/api/reserves/{id}/use", post(use_reserve))
        .route("/api/reserves/{id}/add", post(add_to_reserve))
        .route("/api/reserves/{id}/transactions", get(reserve_transactions))
        .route(
            "/api/reserves/{id}/transactions.csv",
            get(export_reserve_transactions),
        )
        .route("/api/reserves/{id}/reconcile", get(reconcile_reserve))
        .route("/api/dashboard/credits/monthly", get(credits_by_month))
        .route("/api/dashboard/debits/monthly", get(debits_by_month))
        .route(
            "/api/dashboard/final-balances/monthly",
            get(final_balances_by_month),
        )
        .route("/api/dashboard/reserves/monthly", get(reserves_by_month))
        .route("/api/dashboard/reserves/usage", get(reserve_usage))
        .route("/api/dashboard/reserves/balance", get(reserve_balance))
        .route("/api/dashboard/reserves/history", get(transaction_history))
        .route("/api/dashboard/reserves/evolution", get(usage_evolution))
        .route("/api/dashboard/reserves/flows", get(reserve_flows))
        .route("/api/dashboard/reserves/summary", get(reserve_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    public.merge(protected).with_state(state)
}
