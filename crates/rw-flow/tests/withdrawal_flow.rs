mod support;

use rw_api_client::ErrorCode;
use rw_api_sim::{SimConfig, SimulatedWithdrawalApi, StatusWeights};
use rw_api_types::WithdrawalStatus;
use rw_flow::withdrawal::PLACEHOLDER_QUOTE_ID;
use rw_flow::{
    FlowError, FlowHarness, WithdrawalConfig, WithdrawalFlow, WithdrawalPatch, WithdrawalReceipt,
    WithdrawalStep,
};
use rw_resource::RetryPolicy;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{FakeWithdrawalApi, account};
use tokio::time::sleep;

fn no_countdown() -> WithdrawalConfig {
    WithdrawalConfig {
        qr_countdown: None,
        ..WithdrawalConfig::default()
    }
}

async fn started(api: &Arc<FakeWithdrawalApi>, config: WithdrawalConfig) -> WithdrawalFlow {
    let flow = WithdrawalFlow::new(api.clone(), config);
    flow.start().await;
    flow
}

async fn reach_qr_send(flow: &WithdrawalFlow) {
    flow.go_to_next_step().await;
    assert_eq!(flow.state().step, WithdrawalStep::QrSend);
}

#[tokio::test(start_paused = true)]
async fn start_populates_defaults_and_the_first_bank_account() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;

    let state = flow.state();
    assert_eq!(state.token.as_ref().map(|t| t.id.as_str()), Some("eth"));
    assert_eq!(state.currency.as_ref().map(|c| c.code.as_str()), Some("EUR"));
    assert_eq!(
        state.bank_account.as_ref().map(|a| a.id.as_str()),
        Some("ba_primary")
    );
    assert!(state.can_proceed);
    assert_eq!(state.progress, 33);
}

#[tokio::test(start_paused = true)]
async fn catalog_reload_blocks_a_second_retry() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;
    assert_eq!(api.account_calls.get(), 1);

    tokio::join!(flow.retry_current_operation(), async {
        sleep(Duration::from_millis(10)).await;
        assert!(flow.state().is_loading);
        assert!(!flow.state().can_proceed);
        flow.retry_current_operation().await;
    });

    let state = flow.state();
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert!(state.can_proceed);
    assert_eq!(api.account_calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn refreshed_accounts_do_not_override_a_manual_choice() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;

    flow.update_state(WithdrawalPatch::bank_account("ba_savings"));
    api.set_accounts(vec![account("ba_new", "EUR"), account("ba_savings", "EUR")]);
    flow.refresh_bank_accounts().await;

    let state = flow.state();
    assert_eq!(api.account_calls.get(), 2);
    assert_eq!(state.bank_accounts.len(), 2);
    assert_eq!(state.bank_account.map(|a| a.id), Some("ba_savings".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn missing_amount_uses_fallback_and_placeholder_quote() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;

    reach_qr_send(&flow).await;

    let request = api.last_wallet_request().expect("wallet request");
    assert_eq!(request.amount, 0.1);
    assert_eq!(request.quote_id, PLACEHOLDER_QUOTE_ID);
    assert_eq!(request.token_id, "eth");
    assert_eq!(request.currency, "EUR");
    assert_eq!(request.bank_account_id.as_deref(), Some("ba_primary"));

    let state = flow.state();
    assert!(state.wallet_address.is_some());
    assert_eq!(state.transaction_id.as_deref(), Some("wd_1"));
    assert_eq!(state.status, Some(WithdrawalStatus::Pending));
    assert!(flow.is_polling());
}

#[tokio::test(start_paused = true)]
async fn settled_quote_id_is_sent_with_the_address_request() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;

    flow.update_state(WithdrawalPatch::token_amount("0.25"));
    flow.update_state(WithdrawalPatch::token_amount("0.5"));
    sleep(Duration::from_secs(1)).await;
    assert_eq!(api.quote_calls.get(), 1);

    reach_qr_send(&flow).await;
    let request = api.last_wallet_request().expect("wallet request");
    assert_eq!(request.amount, 0.5);
    assert_eq!(request.quote_id, "wq_1");
}

#[tokio::test(start_paused = true)]
async fn completed_status_advances_to_success() {
    let api = Arc::new(FakeWithdrawalApi::default());
    api.script_statuses([WithdrawalStatus::Processing, WithdrawalStatus::Completed]);
    let flow = started(&api, no_countdown()).await;

    reach_qr_send(&flow).await;
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(flow.state().step, WithdrawalStep::QrSend);

    sleep(Duration::from_millis(1500)).await;
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::Success);
    assert_eq!(state.status, Some(WithdrawalStatus::Completed));
    assert_eq!(state.fiat_amount, Some(312.5));
    assert_eq!(state.progress, 100);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn back_from_qr_send_stops_polling_and_clears_the_address() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;

    reach_qr_send(&flow).await;
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(api.status_calls.get(), 2);

    flow.go_to_previous_step();
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::TokenSelection);
    assert!(state.wallet_address.is_none());
    assert!(state.transaction_id.is_none());
    assert!(!flow.is_polling());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_calls.get(), 2);

    reach_qr_send(&flow).await;
    assert_eq!(api.wallet_calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn back_from_success_reuses_the_address() {
    let api = Arc::new(FakeWithdrawalApi::default());
    api.script_statuses([WithdrawalStatus::Completed]);
    let flow = started(&api, no_countdown()).await;

    reach_qr_send(&flow).await;
    let address = flow.state().wallet_address;
    sleep(Duration::from_millis(500)).await;
    assert_eq!(flow.state().step, WithdrawalStep::Success);

    flow.go_to_previous_step();
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::QrSend);
    assert_eq!(state.wallet_address, address);
    assert!(flow.is_polling());
    assert_eq!(api.wallet_calls.get(), 1);

    flow.complete_qr_send();
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::Success);
    assert_eq!(state.fiat_amount, Some(100.0));
    assert!(!flow.is_polling());
}

#[tokio::test(start_paused = true)]
async fn qr_countdown_completes_with_the_fallback_amount() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let config = WithdrawalConfig {
        qr_countdown: Some(Duration::from_secs(5)),
        ..WithdrawalConfig::default()
    };
    let flow = started(&api, config).await;

    reach_qr_send(&flow).await;
    sleep(Duration::from_millis(4900)).await;
    assert_eq!(flow.state().step, WithdrawalStep::QrSend);

    sleep(Duration::from_millis(200)).await;
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::Success);
    assert_eq!(state.fiat_amount, Some(100.0));
    assert!(!flow.is_polling());
}

#[tokio::test(start_paused = true)]
async fn address_failure_stays_on_token_selection() {
    let api = Arc::new(FakeWithdrawalApi::default());
    api.fail_wallet_address(1);
    let config = WithdrawalConfig {
        retry: RetryPolicy::none(),
        ..no_countdown()
    };
    let flow = started(&api, config).await;

    flow.go_to_next_step().await;
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::TokenSelection);
    assert!(!state.is_loading);
    assert!(matches!(
        state.error,
        Some(FlowError::Service { code: ErrorCode::WalletServiceError, .. })
    ));
    assert!(!flow.is_polling());

    reach_qr_send(&flow).await;
    assert_eq!(api.wallet_calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_status_is_step_local_and_retryable() {
    let api = Arc::new(FakeWithdrawalApi::default());
    api.script_statuses([WithdrawalStatus::Failed, WithdrawalStatus::Completed]);
    let flow = started(&api, no_countdown()).await;

    reach_qr_send(&flow).await;
    sleep(Duration::from_millis(500)).await;
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::QrSend);
    assert_eq!(state.status, Some(WithdrawalStatus::Failed));
    assert!(matches!(state.error, Some(FlowError::VerificationFailed { .. })));
    assert!(!flow.is_polling());

    flow.retry_current_operation().await;
    assert!(flow.is_polling());
    sleep(Duration::from_millis(500)).await;
    assert_eq!(flow.state().step, WithdrawalStep::Success);
    assert_eq!(api.status_calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn selection_requires_a_bank_account() {
    let api = Arc::new(FakeWithdrawalApi::default());
    api.set_accounts(Vec::new());
    let flow = started(&api, no_countdown()).await;

    assert!(!flow.state().can_proceed);
    flow.go_to_next_step().await;

    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::TokenSelection);
    assert_eq!(state.error.as_ref().and_then(FlowError::field), Some("bankAccount"));
    assert_eq!(api.wallet_calls.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_token_amount_is_rejected() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let flow = started(&api, no_countdown()).await;

    flow.update_state(WithdrawalPatch::token_amount("12"));
    flow.go_to_next_step().await;

    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::TokenSelection);
    assert_eq!(state.error.as_ref().and_then(FlowError::field), Some("tokenAmount"));
    assert_eq!(api.wallet_calls.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn backing_out_of_the_first_step_exits() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let exits = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&exits);
    let flow = WithdrawalFlow::builder(api.clone())
        .config(no_countdown())
        .on_exit(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    flow.start().await;

    flow.go_to_previous_step();

    assert_eq!(exits.load(Ordering::SeqCst), 1);
    let state = flow.state();
    assert!(state.token.is_none());
    assert!(state.bank_accounts.is_empty());
    assert!(flow.bank_accounts_state().is_idle());
}

#[tokio::test(start_paused = true)]
async fn harness_forced_success_and_receipt() {
    let api = Arc::new(FakeWithdrawalApi::default());
    let harness = FlowHarness::new();
    let receipts: Arc<Mutex<Vec<WithdrawalReceipt>>> = Arc::default();
    let sink = Arc::clone(&receipts);
    let flow = WithdrawalFlow::builder(api.clone())
        .config(no_countdown())
        .harness(harness.clone())
        .on_complete(move |receipt| sink.lock().unwrap().push(receipt))
        .build();
    flow.start().await;

    harness.force_success();
    reach_qr_send(&flow).await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(flow.state().step, WithdrawalStep::Success);
    assert_eq!(harness.visited(), vec!["qr-send", "success"]);

    flow.go_to_next_step().await;
    {
        let receipts = receipts.lock().unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].transaction_id, "wd_1");
        assert_eq!(receipts[0].token, "ETH");
        assert_eq!(receipts[0].fiat_amount, 100.0);
    }
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::TokenSelection);
    assert!(state.wallet_address.is_none());
    assert_eq!(state.token.map(|token| token.id).as_deref(), Some("eth"));
    assert!(state.bank_account.is_some());
}

#[tokio::test(start_paused = true)]
async fn runs_end_to_end_against_the_simulator() {
    let config = SimConfig {
        withdrawal_status_weights: StatusWeights {
            pending: 0,
            received: 0,
            processing: 0,
            completed: 1,
            failed: 0,
        },
        ..SimConfig::reliable()
    }
    .with_seed(11);
    let flow = WithdrawalFlow::new(Arc::new(SimulatedWithdrawalApi::new(config)), no_countdown());

    flow.start().await;
    assert!(flow.state().bank_account.is_some());

    flow.go_to_next_step().await;
    assert_eq!(flow.state().step, WithdrawalStep::QrSend);

    sleep(Duration::from_secs(2)).await;
    let state = flow.state();
    assert_eq!(state.step, WithdrawalStep::Success);
    assert!(state.fiat_amount.is_some());
}
