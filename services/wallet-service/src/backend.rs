//! Mock backend routes. Each handler forwards to the simulated client and
//! maps its failures onto the wire code and status.

use axum::{
    Json,
    extract::{Path, State},
};
use rw_api_types::{
    BankAccount, BankDetails, BankDetailsRequest, Currency, DepositQuote, DepositQuoteRequest,
    InitiateVerificationRequest, InitiateVerificationResponse, Token, VerificationStatusResponse,
    WalletAddressRequest, WalletAddressResponse, WithdrawalQuote, WithdrawalQuoteRequest,
    WithdrawalStatusRequest, WithdrawalStatusResponse,
};

use crate::{AppState, ApiResult, api_error, bad_request};

pub(crate) async fn tokens(State(state): State<AppState>) -> ApiResult<Vec<Token>> {
    state
        .backend
        .withdrawal
        .get_available_tokens()
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn currencies(State(state): State<AppState>) -> ApiResult<Vec<Currency>> {
    state
        .backend
        .withdrawal
        .get_available_currencies()
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn deposit_quote(
    State(state): State<AppState>,
    Json(request): Json<DepositQuoteRequest>,
) -> ApiResult<DepositQuote> {
    state
        .backend
        .deposit
        .get_quote(request)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn bank_details(
    State(state): State<AppState>,
    Json(request): Json<BankDetailsRequest>,
) -> ApiResult<BankDetails> {
    if request.quote_id.trim().is_empty() {
        return Err(bad_request("INVALID_REQUEST", "quoteId is required"));
    }
    state
        .backend
        .deposit
        .get_bank_details(request)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn initiate_verification(
    State(state): State<AppState>,
    Json(request): Json<InitiateVerificationRequest>,
) -> ApiResult<InitiateVerificationResponse> {
    if request.transaction_id.trim().is_empty() {
        return Err(bad_request("INVALID_REQUEST", "transactionId is required"));
    }
    state
        .backend
        .deposit
        .initiate_verification(request)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn verification_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> ApiResult<VerificationStatusResponse> {
    state
        .backend
        .deposit
        .check_verification_status(&transaction_id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn withdrawal_quote(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalQuoteRequest>,
) -> ApiResult<WithdrawalQuote> {
    state
        .backend
        .withdrawal
        .get_quote(request)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn wallet_address(
    State(state): State<AppState>,
    Json(request): Json<WalletAddressRequest>,
) -> ApiResult<WalletAddressResponse> {
    state
        .backend
        .withdrawal
        .generate_wallet_address(request)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn withdrawal_status(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalStatusRequest>,
) -> ApiResult<WithdrawalStatusResponse> {
    if request.transaction_id.trim().is_empty() {
        return Err(bad_request("INVALID_REQUEST", "transactionId is required"));
    }
    state
        .backend
        .withdrawal
        .check_withdrawal_status(request)
        .await
        .map(Json)
        .map_err(api_error)
}

pub(crate) async fn bank_accounts(State(state): State<AppState>) -> ApiResult<Vec<BankAccount>> {
    state
        .backend
        .withdrawal
        .get_bank_accounts()
        .await
        .map(Json)
        .map_err(api_error)
}
