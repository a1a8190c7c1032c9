//! API Routes
//!
//! HTTP endpoint definitions. Handlers translate JSON to wallet calls and
//! nothing more; every rule lives in the core.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, FromRequest, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::domain::{Currency, OperationContext, Role};
use crate::engine::{
    BillPaymentCommand, DepositCommand, ExchangeCommand, TransactionReceipt, TransferCommand,
    WithdrawCommand,
};
use crate::error::{AppError, AppResult};
use crate::ledger::TransactionHistory;
use crate::store::AccountNumber;
use crate::wallet::Wallet;

use super::middleware::bearer_token;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<Wallet>,
}

impl AppState {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            wallet: Arc::new(wallet),
        }
    }
}

/// JSON body whose rejections answer with the API's error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub account_number: AccountNumber,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub user_id: Uuid,
    pub account_number: AccountNumber,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub account_number: AccountNumber,
    pub balances: BTreeMap<Currency, Decimal>,
    pub commission_balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub account_number: String,
    pub entries: TransactionHistory,
}

fn require_actor(actor: Option<Extension<OperationContext>>) -> AppResult<OperationContext> {
    actor
        .map(|Extension(context)| context)
        .ok_or(AppError::MissingCredentials)
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Identity
        .route("/users", post(register))
        .route("/sessions", post(login).delete(logout))
        .route("/users/:user_id/account", get(get_account))
        .route("/users/:user_id/balance", get(get_balance))
        .route("/accounts/:account_number/history", get(get_history))
        // Money movement
        .route("/deposits", post(deposit))
        .route("/withdrawals", post(withdraw))
        .route("/transfers", post(transfer))
        .route("/exchanges", post(exchange))
        .route("/bills", post(pay_bill))
}

// =========================================================================
// Identity
// =========================================================================

/// POST /users
async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let registration = state
        .wallet
        .register_user(
            &request.full_name,
            &request.email,
            &request.password,
            request.role,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: registration.user_id,
            account_number: registration.account_number,
        }),
    ))
}

/// POST /sessions
///
/// The returned token authenticates later calls as `Authorization: Bearer`.
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<Json<Session>> {
    let session = state.wallet.login(&request.email, &request.password).await?;
    Ok(Json(session))
}

/// DELETE /sessions
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<StatusCode> {
    let token = bearer_token(&headers)?.ok_or(AppError::MissingCredentials)?;
    state.wallet.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/:user_id/account
async fn get_account(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<AccountResponse>> {
    let context = require_actor(actor)?;
    let account_number = state.wallet.view_account_number(&context, user_id).await?;
    Ok(Json(AccountResponse {
        user_id,
        account_number,
    }))
}

/// GET /users/:user_id/balance
async fn get_balance(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<BalanceResponse>> {
    let context = require_actor(actor)?;
    let record = state.wallet.view_balance(&context, user_id).await?;
    Ok(Json(BalanceResponse {
        user_id,
        account_number: record.account_number,
        balances: record.balances,
        commission_balance: record.commission_balance,
    }))
}

/// GET /accounts/:account_number/history
async fn get_history(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    Path(account_number): Path<String>,
) -> AppResult<Json<HistoryResponse>> {
    let context = require_actor(actor)?;
    let entries = state
        .wallet
        .transaction_history(&context, &account_number)
        .await?;
    Ok(Json(HistoryResponse {
        account_number,
        entries,
    }))
}

// =========================================================================
// Money movement
// =========================================================================

/// POST /deposits
async fn deposit(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    ApiJson(command): ApiJson<DepositCommand>,
) -> AppResult<(StatusCode, Json<TransactionReceipt>)> {
    let context = require_actor(actor)?;
    let receipt = state.wallet.engine().deposit(&context, command).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /withdrawals
async fn withdraw(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    ApiJson(command): ApiJson<WithdrawCommand>,
) -> AppResult<(StatusCode, Json<TransactionReceipt>)> {
    let context = require_actor(actor)?;
    let receipt = state.wallet.engine().withdraw(&context, command).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /transfers
///
/// `source_account` may be omitted to transfer out of the actor's own account.
async fn transfer(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    ApiJson(command): ApiJson<TransferCommand>,
) -> AppResult<(StatusCode, Json<TransactionReceipt>)> {
    let context = require_actor(actor)?;
    let receipt = state.wallet.engine().transfer(&context, command).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /exchanges
async fn exchange(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    ApiJson(command): ApiJson<ExchangeCommand>,
) -> AppResult<(StatusCode, Json<TransactionReceipt>)> {
    let context = require_actor(actor)?;
    let receipt = state.wallet.engine().exchange(&context, command).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /bills
async fn pay_bill(
    State(state): State<AppState>,
    actor: Option<Extension<OperationContext>>,
    ApiJson(command): ApiJson<BillPaymentCommand>,
) -> AppResult<(StatusCode, Json<TransactionReceipt>)> {
    let context = require_actor(actor)?;
    let receipt = state.wallet.engine().pay_bill(&context, command).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_deserialize() {
        let json = r#"{
            "full_name": "Alice",
            "email": "alice@example.com",
            "password": "password123",
            "role": "Agent"
        }"#;

        let request: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.full_name, "Alice");
        assert_eq!(request.role, Role::Agent);
    }

    #[test]
    fn test_transfer_source_is_optional() {
        let json = r#"{
            "destination_account": "1002",
            "currency": "ZMW",
            "amount": "50.00"
        }"#;

        let command: TransferCommand = serde_json::from_str(json).unwrap();
        assert!(command.source_account.is_none());
        assert_eq!(command.amount, "50.00");
    }

    #[test]
    fn test_require_actor() {
        assert!(matches!(require_actor(None), Err(AppError::MissingCredentials)));

        let context = OperationContext::new(Uuid::new_v4(), Role::Customer);
        let extracted = require_actor(Some(Extension(context.clone()))).unwrap();
        assert_eq!(extracted.actor_user_id, context.actor_user_id);
    }
}
