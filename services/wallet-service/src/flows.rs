//! Hosted wizard sessions. Each session owns one orchestrator instance; the
//! remote presentation layer drives it through these routes and renders the
//! returned state snapshot.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rw_flow::{
    DepositFlow, DepositPatch, DepositReceipt, DepositState, WithdrawalFlow, WithdrawalPatch,
    WithdrawalReceipt, WithdrawalState,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, ApiResult, ErrorResponse, not_found};

type Rejection = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DepositSessionResponse {
    pub(crate) id: Uuid,
    pub(crate) state: DepositState,
    /// Set once the user has left the success step.
    pub(crate) receipt: Option<DepositReceipt>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WithdrawalSessionResponse {
    pub(crate) id: Uuid,
    pub(crate) state: WithdrawalState,
    pub(crate) receipt: Option<WithdrawalReceipt>,
    /// The user backed out of the first step.
    pub(crate) exited: bool,
}

struct HostedDeposit {
    flow: DepositFlow,
    receipt: Arc<Mutex<Option<DepositReceipt>>>,
}

struct HostedWithdrawal {
    flow: WithdrawalFlow,
    receipt: Arc<Mutex<Option<WithdrawalReceipt>>>,
    exited: Arc<AtomicBool>,
}

#[derive(Default)]
pub(crate) struct FlowSessions {
    deposits: RwLock<HashMap<Uuid, Arc<HostedDeposit>>>,
    withdrawals: RwLock<HashMap<Uuid, Arc<HostedWithdrawal>>>,
}

impl FlowSessions {
    async fn deposit(&self, id: Uuid) -> Option<Arc<HostedDeposit>> {
        self.deposits.read().await.get(&id).cloned()
    }

    async fn withdrawal(&self, id: Uuid) -> Option<Arc<HostedWithdrawal>> {
        self.withdrawals.read().await.get(&id).cloned()
    }
}

fn latest<T: Clone>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn record<T>(slot: &Mutex<Option<T>>, value: T) {
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(value);
}

impl HostedDeposit {
    fn view(&self, id: Uuid) -> DepositSessionResponse {
        DepositSessionResponse {
            id,
            state: self.flow.state(),
            receipt: latest(&self.receipt),
        }
    }
}

impl HostedWithdrawal {
    fn view(&self, id: Uuid) -> WithdrawalSessionResponse {
        WithdrawalSessionResponse {
            id,
            state: self.flow.state(),
            receipt: latest(&self.receipt),
            exited: self.exited.load(Ordering::SeqCst),
        }
    }
}

// ── Deposit ──

pub(crate) async fn create_deposit(
    State(state): State<AppState>,
) -> ApiResult<DepositSessionResponse> {
    let receipt = Arc::new(Mutex::new(None));
    let slot = receipt.clone();
    let flow = DepositFlow::builder(state.flow_clients.deposit.clone())
        .on_complete(move |completed| record(&slot, completed))
        .build();

    let id = Uuid::new_v4();
    let hosted = Arc::new(HostedDeposit { flow, receipt });
    state.sessions.deposits.write().await.insert(id, hosted.clone());
    info!(session = %id, "deposit session created");

    Ok(Json(hosted.view(id)))
}

async fn find_deposit(state: &AppState, id: Uuid) -> Result<Arc<HostedDeposit>, Rejection> {
    state
        .sessions
        .deposit(id)
        .await
        .ok_or_else(|| not_found("deposit session not found"))
}

pub(crate) async fn get_deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DepositSessionResponse> {
    let hosted = find_deposit(&state, id).await?;
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn update_deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DepositPatch>,
) -> ApiResult<DepositSessionResponse> {
    let hosted = find_deposit(&state, id).await?;
    hosted.flow.update_state(patch);
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn deposit_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DepositSessionResponse> {
    let hosted = find_deposit(&state, id).await?;
    hosted.flow.go_to_next_step().await;
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn deposit_back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DepositSessionResponse> {
    let hosted = find_deposit(&state, id).await?;
    hosted.flow.go_to_previous_step();
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn deposit_retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DepositSessionResponse> {
    let hosted = find_deposit(&state, id).await?;
    hosted.flow.retry_current_operation().await;
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn delete_deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DepositSessionResponse> {
    let hosted = state
        .sessions
        .deposits
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| not_found("deposit session not found"))?;
    hosted.flow.shutdown();
    info!(session = %id, "deposit session closed");
    Ok(Json(hosted.view(id)))
}

// ── Withdrawal ──

pub(crate) async fn create_withdrawal(
    State(state): State<AppState>,
) -> ApiResult<WithdrawalSessionResponse> {
    let receipt = Arc::new(Mutex::new(None));
    let exited = Arc::new(AtomicBool::new(false));
    let receipt_slot = receipt.clone();
    let exit_flag = exited.clone();
    let flow = WithdrawalFlow::builder(state.flow_clients.withdrawal.clone())
        .on_complete(move |completed| record(&receipt_slot, completed))
        .on_exit(move |()| exit_flag.store(true, Ordering::SeqCst))
        .build();
    flow.start().await;

    let id = Uuid::new_v4();
    let hosted = Arc::new(HostedWithdrawal {
        flow,
        receipt,
        exited,
    });
    state
        .sessions
        .withdrawals
        .write()
        .await
        .insert(id, hosted.clone());
    info!(session = %id, "withdrawal session created");

    Ok(Json(hosted.view(id)))
}

async fn find_withdrawal(state: &AppState, id: Uuid) -> Result<Arc<HostedWithdrawal>, Rejection> {
    state
        .sessions
        .withdrawal(id)
        .await
        .ok_or_else(|| not_found("withdrawal session not found"))
}

pub(crate) async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = find_withdrawal(&state, id).await?;
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn update_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<WithdrawalPatch>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = find_withdrawal(&state, id).await?;
    hosted.flow.update_state(patch);
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn withdrawal_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = find_withdrawal(&state, id).await?;
    hosted.flow.go_to_next_step().await;
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn withdrawal_back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = find_withdrawal(&state, id).await?;
    hosted.flow.go_to_previous_step();
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn withdrawal_retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = find_withdrawal(&state, id).await?;
    hosted.flow.retry_current_operation().await;
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn withdrawal_qr_complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = find_withdrawal(&state, id).await?;
    hosted.flow.complete_qr_send();
    Ok(Json(hosted.view(id)))
}

pub(crate) async fn delete_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WithdrawalSessionResponse> {
    let hosted = state
        .sessions
        .withdrawals
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| not_found("withdrawal session not found"))?;
    hosted.flow.shutdown();
    info!(session = %id, "withdrawal session closed");
    Ok(Json(hosted.view(id)))
}
