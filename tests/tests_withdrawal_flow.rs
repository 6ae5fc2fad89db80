use std::sync::Arc;

use rust_decimal_macros::dec;

use pixledger::audit::OpContext;
use pixledger::configure::FeeSettings;
use pixledger::models::{Account, SettlementEvent, WithdrawalRequest, WithdrawalStatus};
use pixledger::settlement::SettlementProcessor;
use pixledger::store::GatewayStore;

fn settings() -> FeeSettings {
    FeeSettings {
        version: 1,
        deposit_fee_percent: dec!(4.00),
        deposit_fee_fixed: dec!(0.00),
        flexible_pricing_enabled: false,
        flexible_min_threshold: dec!(15.00),
        flexible_low_tier_fee: dec!(1.00),
        flexible_high_tier_percent: dec!(4.00),
        withdrawal_fee: dec!(1.00),
        acquirer_cost: dec!(0.02),
        affiliate_rate: dec!(0.50),
        manager_percent: dec!(10.00),
    }
}

fn ctx() -> OpContext {
    OpContext::new("webhook", "withdrawal_flow", "corr-test")
}

fn event(id: &str, transaction_id: u64) -> SettlementEvent {
    SettlementEvent {
        provider_event_id: id.to_string(),
        transaction_id,
        amount: dec!(0.00),
        status: "paid".to_string(),
        timestamp: 1_700_000_000_000,
    }
}

fn setup(balance: rust_decimal::Decimal) -> (Arc<GatewayStore>, SettlementProcessor) {
    let store = Arc::new(GatewayStore::open_temporary().unwrap());
    let mut account = Account::new(1, "Loja", "12345678901");
    account.balance = balance;
    store.put_account(&account).unwrap();
    let processor = SettlementProcessor::new(store.clone());
    (store, processor)
}

#[test]
fn test_register_computes_breakdown_and_blocks_funds() {
    let (store, processor) = setup(dec!(100.00));
    let withdrawal = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();

    assert_eq!(withdrawal.fee, dec!(1.00));
    assert_eq!(withdrawal.total_debited, dec!(6.00));
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(withdrawal.affiliate_carve_out, dec!(0.00));
    assert_eq!(withdrawal.platform_profit, dec!(0.98));

    // Pending withdrawals count as blocked balance; live balance
    // untouched until settlement.
    let account = store.require_account(1).unwrap();
    assert_eq!(account.balance, dec!(100.00));
    assert_eq!(account.pending_withdrawal, dec!(6.00));
}

#[test]
fn test_affiliate_changes_profit_split_only() {
    let (_, processor) = setup(dec!(100.00));
    let plain = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();

    let (store2, processor2) = setup(dec!(100.00));
    let mut account = store2.require_account(1).unwrap();
    account.affiliate_id = Some(55);
    store2.put_account(&account).unwrap();
    let with_affiliate = processor2
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();

    // Customer-facing numbers identical.
    assert_eq!(with_affiliate.fee, plain.fee);
    assert_eq!(with_affiliate.total_debited, plain.total_debited);
    // Internal carve-up differs.
    assert_eq!(with_affiliate.affiliate_carve_out, dec!(0.50));
    assert_eq!(with_affiliate.platform_profit, dec!(0.48));
    assert_eq!(
        with_affiliate.platform_profit
            + with_affiliate.acquirer_cost
            + with_affiliate.affiliate_carve_out,
        with_affiliate.fee
    );
}

#[test]
fn test_insufficient_available_balance_rejected() {
    let (store, processor) = setup(dec!(10.00));
    // First request blocks 6.00 of the 10.00.
    processor.register_withdrawal(1, dec!(5.00), &settings(), &ctx()).unwrap();

    // 4.00 available, next request needs 6.00.
    let err = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");

    // Nothing was created for the rejected request.
    assert_eq!(store.list_withdrawals_by_account(1).unwrap().len(), 1);
}

#[test]
fn test_racing_registration_backed_out_on_overshoot() {
    let (store, processor) = setup(dec!(10.00));

    // A request that passed the availability check but whose blocked
    // amount has not reached the aggregate yet. Writing the row without
    // recomputing reproduces that window.
    let peer = WithdrawalRequest {
        id: store.next_id().unwrap(),
        account_id: 1,
        amount: dec!(5.00),
        fee: dec!(1.00),
        total_debited: dec!(6.00),
        affiliate_carve_out: dec!(0.00),
        acquirer_cost: dec!(0.02),
        platform_profit: dec!(0.98),
        status: WithdrawalStatus::Pending,
        created_at: 1_700_000_000_000,
        settled_at: None,
    };
    store.put_withdrawal(&peer).unwrap();
    assert_eq!(store.require_account(1).unwrap().pending_withdrawal, dec!(0.00));

    // Both requests together need 12.00 against a 10.00 balance. The
    // second one must detect the overshoot after the aggregate catches
    // up and back itself out.
    let err = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");

    let rows = store.list_withdrawals_by_account(1).unwrap();
    assert_eq!(rows.len(), 2);
    let pending: Vec<_> =
        rows.iter().filter(|w| w.status == WithdrawalStatus::Pending).collect();
    let cancelled: Vec<_> =
        rows.iter().filter(|w| w.status == WithdrawalStatus::Cancelled).collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, peer.id);
    assert_eq!(cancelled.len(), 1);

    // Only the surviving request stays blocked.
    assert_eq!(store.require_account(1).unwrap().pending_withdrawal, dec!(6.00));
}

#[test]
fn test_settlement_debits_and_clears_pending() {
    let (store, processor) = setup(dec!(100.00));
    let withdrawal = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();

    let outcome = processor
        .settle_withdrawal(&event("evt_w1", withdrawal.id), &settings(), &ctx())
        .unwrap();
    assert_eq!(outcome.receipt().amount_applied, dec!(6.00));
    assert_eq!(outcome.receipt().balance_after, dec!(94.00));

    let account = store.require_account(1).unwrap();
    assert_eq!(account.balance, dec!(94.00));
    assert_eq!(account.pending_withdrawal, dec!(0.00));

    let settled = store.get_withdrawal(withdrawal.id).unwrap().unwrap();
    assert_eq!(settled.status, WithdrawalStatus::Completed);
}

#[test]
fn test_settlement_idempotency() {
    let (store, processor) = setup(dec!(100.00));
    let withdrawal = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();

    let first = processor
        .settle_withdrawal(&event("evt_w1", withdrawal.id), &settings(), &ctx())
        .unwrap();
    let second = processor
        .settle_withdrawal(&event("evt_w1", withdrawal.id), &settings(), &ctx())
        .unwrap();

    assert!(second.is_duplicate());
    assert_eq!(second.receipt(), first.receipt());
    assert_eq!(store.require_account(1).unwrap().balance, dec!(94.00));
}

#[test]
fn test_cancel_releases_blocked_funds_without_balance_touch() {
    let (store, processor) = setup(dec!(100.00));
    let withdrawal = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();
    assert_eq!(store.require_account(1).unwrap().pending_withdrawal, dec!(6.00));

    processor.cancel_withdrawal(withdrawal.id, &ctx()).unwrap();

    let account = store.require_account(1).unwrap();
    assert_eq!(account.balance, dec!(100.00));
    assert_eq!(account.pending_withdrawal, dec!(0.00));

    let err = processor.cancel_withdrawal(withdrawal.id, &ctx()).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STATE_TRANSITION");
}

#[test]
fn test_account_withdrawal_fee_override() {
    let (store, processor) = setup(dec!(100.00));
    let mut account = store.require_account(1).unwrap();
    account.withdrawal_fee = Some(dec!(2.50));
    store.put_account(&account).unwrap();

    let withdrawal = processor
        .register_withdrawal(1, dec!(5.00), &settings(), &ctx())
        .unwrap();
    assert_eq!(withdrawal.fee, dec!(2.50));
    assert_eq!(withdrawal.total_debited, dec!(7.50));
}
