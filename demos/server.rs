//! Simple REST API server example for the ledger engine.
//!
//! Run with: `cargo run --example server`
//!
//! Account `0` is granted the admin role at startup.
//!
//! ## Endpoints
//!
//! - `POST /accounts` - Register an account, optionally with a referral code
//! - `GET /accounts` - List account snapshots
//! - `GET /accounts/{id}` - Get an account snapshot
//! - `GET /accounts/{id}/transactions` - Transaction history
//! - `POST /accounts/{id}/plan` - Purchase or upgrade a plan
//! - `GET /accounts/{id}/tasks` - Tasks available today
//! - `POST /accounts/{id}/tasks/{task}/start` - Start a task
//! - `POST /accounts/{id}/tasks/{task}/complete` - Complete a task
//! - `POST /accounts/{id}/withdrawals` - Request a withdrawal
//! - `POST /webhooks/payment` - Payment gateway confirmation
//! - `GET /withdrawals/pending` - Pending withdrawals
//! - `POST /withdrawals/{id}/approve` - Approve a withdrawal (admin)
//! - `POST /withdrawals/{id}/reject` - Reject a withdrawal (admin)
//!
//! ## Example Usage
//!
//! ```bash
//! # Register
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 1}'
//!
//! # Gateway confirms 6 000.00 (amount in kobo)
//! curl -X POST http://localhost:3000/webhooks/payment \
//!   -H "Content-Type: application/json" \
//!   -d '{"reference": "ps_001", "amount": 600000, "account_id": 1, "status": "success"}'
//!
//! # Buy the premium plan
//! curl -X POST http://localhost:3000/accounts/1/plan \
//!   -H "Content-Type: application/json" \
//!   -d '{"plan_id": "premium"}'
//!
//! # Get account
//! curl http://localhost:3000/accounts/1
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiered_ledger_rs::{
    AccountId, AccountSnapshot, BankDetails, DepositReference, Engine, EngineConfig, LedgerError,
    PaymentConfirmation, PlanChange, PlanId, Role, SettlementOutcome, TaskCompletion,
    TaskTemplateId, TaskView, Transaction, UserTaskStatus, Withdrawal, WithdrawalId,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const ADMIN: AccountId = AccountId(0);

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub id: u32,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub account: AccountId,
    pub referral_code: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub plan_id: String,
}

/// Gateway webhook body. `amount` is in minor units.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub reference: String,
    pub amount: i64,
    pub account_id: u32,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    pub bank: BankDetails,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub admin: u32,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the ledger engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LedgerError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            LedgerError::PlanNotFound => (StatusCode::NOT_FOUND, "PLAN_NOT_FOUND"),
            LedgerError::TaskNotFound => (StatusCode::NOT_FOUND, "TASK_NOT_FOUND"),
            LedgerError::WithdrawalNotFound => (StatusCode::NOT_FOUND, "WITHDRAWAL_NOT_FOUND"),
            LedgerError::DuplicateAccount => (StatusCode::CONFLICT, "DUPLICATE_ACCOUNT"),
            LedgerError::DuplicateDeposit => (StatusCode::CONFLICT, "DUPLICATE_DEPOSIT"),
            LedgerError::DuplicateSettlement => (StatusCode::CONFLICT, "DUPLICATE_SETTLEMENT"),
            LedgerError::AlreadyOwned => (StatusCode::CONFLICT, "ALREADY_OWNED"),
            LedgerError::AlreadyStarted => (StatusCode::CONFLICT, "ALREADY_STARTED"),
            LedgerError::AlreadyCompleted => (StatusCode::CONFLICT, "ALREADY_COMPLETED"),
            LedgerError::WithdrawalFinalized => (StatusCode::CONFLICT, "WITHDRAWAL_FINALIZED"),
            LedgerError::UnknownReferralCode => (StatusCode::BAD_REQUEST, "UNKNOWN_REFERRAL_CODE"),
            LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            LedgerError::BelowMinimumWithdrawal => {
                (StatusCode::BAD_REQUEST, "BELOW_MINIMUM_WITHDRAWAL")
            }
            LedgerError::BelowMinimumDeposit => (StatusCode::BAD_REQUEST, "BELOW_MINIMUM_DEPOSIT"),
            LedgerError::DepositMismatch => (StatusCode::BAD_REQUEST, "DEPOSIT_MISMATCH"),
            LedgerError::UpgradeOnly => (StatusCode::UNPROCESSABLE_ENTITY, "UPGRADE_ONLY"),
            LedgerError::InsufficientBalance => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
            }
            LedgerError::NotEligible => (StatusCode::UNPROCESSABLE_ENTITY, "NOT_ELIGIBLE"),
            LedgerError::NotStarted => (StatusCode::UNPROCESSABLE_ENTITY, "NOT_STARTED"),
            LedgerError::TooEarly => (StatusCode::UNPROCESSABLE_ENTITY, "TOO_EARLY"),
            LedgerError::StartExpired => (StatusCode::UNPROCESSABLE_ENTITY, "START_EXPIRED"),
            LedgerError::WithdrawalLimitExceeded => {
                (StatusCode::UNPROCESSABLE_ENTITY, "WITHDRAWAL_LIMIT_EXCEEDED")
            }
            LedgerError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            LedgerError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /accounts - Register an account.
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let account = state
        .engine
        .register_account(AccountId(request.id), request.referral_code.as_deref())?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account: account.id(),
            referral_code: account.referral_code(),
        }),
    ))
}

/// GET /accounts/{id} - Get an account snapshot.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<AccountSnapshot>, AppError> {
    state
        .engine
        .get_account(AccountId(id))
        .map(|account| Json(account.snapshot()))
        .ok_or(AppError(LedgerError::AccountNotFound))
}

/// GET /accounts - List all account snapshots.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<AccountSnapshot>> {
    let accounts = state
        .engine
        .accounts()
        .iter()
        .map(|account| account.snapshot())
        .collect();
    Json(accounts)
}

async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.engine.transactions(AccountId(id))?))
}

/// POST /accounts/{id}/plan - Purchase or upgrade.
async fn change_plan(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanChange>, AppError> {
    let change = state
        .engine
        .purchase_or_upgrade(AccountId(id), &PlanId::new(request.plan_id))?;
    Ok(Json(change))
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<TaskView>>, AppError> {
    Ok(Json(state.engine.available_tasks(AccountId(id))?))
}

async fn start_task(
    State(state): State<AppState>,
    Path((id, task)): Path<(u32, u32)>,
) -> Result<Json<UserTaskStatus>, AppError> {
    let status = state
        .engine
        .start_task(AccountId(id), TaskTemplateId(task))?;
    Ok(Json(status))
}

async fn complete_task(
    State(state): State<AppState>,
    Path((id, task)): Path<(u32, u32)>,
) -> Result<Json<TaskCompletion>, AppError> {
    let completion = state
        .engine
        .complete_task(AccountId(id), TaskTemplateId(task))?;
    Ok(Json(completion))
}

/// POST /webhooks/payment - Gateway confirmation; safe to redeliver.
async fn payment_webhook(
    State(state): State<AppState>,
    Json(webhook): Json<PaymentWebhook>,
) -> Result<Json<SettlementOutcome>, AppError> {
    let confirmation = PaymentConfirmation::from_minor_units(
        DepositReference::new(webhook.reference),
        webhook.amount,
        AccountId(webhook.account_id),
        webhook.status,
    );
    Ok(Json(state.engine.confirm_payment(&confirmation)?))
}

async fn request_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<Withdrawal>), AppError> {
    let withdrawal = state
        .engine
        .request_withdrawal(AccountId(id), request.amount, request.bank)?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

async fn pending_withdrawals(State(state): State<AppState>) -> Json<Vec<Withdrawal>> {
    Json(state.engine.pending_withdrawals())
}

async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Withdrawal>, AppError> {
    let withdrawal = state
        .engine
        .approve_withdrawal(AccountId(request.admin), WithdrawalId(id))?;
    Ok(Json(withdrawal))
}

async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Withdrawal>, AppError> {
    let withdrawal = state
        .engine
        .reject_withdrawal(AccountId(request.admin), WithdrawalId(id))?;
    Ok(Json(withdrawal))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", get(list_accounts).post(register))
        .route("/accounts/{id}", get(get_account))
        .route("/accounts/{id}/transactions", get(list_transactions))
        .route("/accounts/{id}/plan", post(change_plan))
        .route("/accounts/{id}/tasks", get(list_tasks))
        .route("/accounts/{id}/tasks/{task}/start", post(start_task))
        .route("/accounts/{id}/tasks/{task}/complete", post(complete_task))
        .route("/accounts/{id}/withdrawals", post(request_withdrawal))
        .route("/webhooks/payment", post(payment_webhook))
        .route("/withdrawals/pending", get(pending_withdrawals))
        .route("/withdrawals/{id}/approve", post(approve_withdrawal))
        .route("/withdrawals/{id}/reject", post(reject_withdrawal))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::from_env().unwrap();
    let engine = Engine::builder().config(config).build();
    engine.roles().grant(ADMIN, Role::Admin);

    let state = AppState {
        engine: Arc::new(engine),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Ledger API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /accounts                          - Register an account");
    println!("  GET  /accounts/{{id}}                     - Account snapshot");
    println!("  POST /accounts/{{id}}/plan                - Purchase or upgrade");
    println!("  POST /accounts/{{id}}/tasks/{{task}}/start  - Start a task");
    println!("  POST /webhooks/payment                  - Payment confirmation");
    println!("  POST /withdrawals/{{id}}/approve          - Approve a withdrawal");

    axum::serve(listener, app).await.unwrap();
}
