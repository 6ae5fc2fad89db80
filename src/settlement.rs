//! Settlement entry points called by the acquirer-webhook collaborator.
//!
//! Every settlement is keyed by the provider event id. The id is claimed
//! in the webhook log before any mutation, so a retried delivery
//! (concurrent or hours later) returns the original receipt instead of
//! crediting twice. Split distribution runs strictly after the balance
//! mutation and its failures never reverse the customer-facing credit.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use crate::audit::{AuditTrail, OpContext};
use crate::balance_ledger::BalanceLedger;
use crate::configure::FeeSettings;
use crate::deposit_fee::compute_deposit_fee;
use crate::fee_policy::FeePolicyResolver;
use crate::logging::now_ms;
use crate::models::{
    BalanceField, DepositRequest, DepositStatus, FeeType, LedgerError, SettlementEvent,
    SettlementOutcome, SettlementReceipt, WithdrawalRequest, WithdrawalStatus,
};
use crate::reconciler::NetBalanceReconciler;
use crate::split_engine::SplitDistributionEngine;
use crate::store::GatewayStore;
use crate::webhook_guard::WebhookDedupGuard;
use crate::withdrawal_fee::compute_withdrawal_fee;

pub struct SettlementProcessor {
    store: Arc<GatewayStore>,
    ledger: Arc<BalanceLedger>,
    resolver: FeePolicyResolver,
    splits: SplitDistributionEngine,
    reconciler: NetBalanceReconciler,
    audit: AuditTrail,
    dedup: Mutex<WebhookDedupGuard>,
}

impl SettlementProcessor {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        let ledger = Arc::new(BalanceLedger::new(store.clone()));
        Self {
            resolver: FeePolicyResolver::new(store.clone()),
            splits: SplitDistributionEngine::new(store.clone(), ledger.clone()),
            reconciler: NetBalanceReconciler::new(store.clone(), ledger.clone()),
            audit: AuditTrail::new(),
            dedup: Mutex::new(WebhookDedupGuard::new()),
            ledger,
            store,
        }
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    pub fn split_engine(&self) -> &SplitDistributionEngine {
        &self.splits
    }

    pub fn reconciler(&self) -> &NetBalanceReconciler {
        &self.reconciler
    }

    // ---------- deposits ----------

    /// Create a PENDING deposit request (a PIX charge was issued).
    pub fn register_deposit(
        &self,
        account_id: u64,
        amount: Decimal,
        _ctx: &OpContext,
    ) -> Result<DepositRequest, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "deposit amount must be positive, got {}",
                amount
            )));
        }
        self.store.require_account(account_id)?;

        let deposit =
            DepositRequest::new(self.store.next_id()?, account_id, amount, now_ms());
        self.store.put_deposit(&deposit)?;
        Ok(deposit)
    }

    /// Apply a confirmed deposit: fee, balance credit, commission splits.
    pub fn settle_deposit(
        &self,
        event: &SettlementEvent,
        settings: &FeeSettings,
        ctx: &OpContext,
    ) -> Result<SettlementOutcome, LedgerError> {
        if let Some(receipt) = self.check_duplicate(event, ctx)? {
            return Ok(SettlementOutcome::Duplicate(receipt));
        }

        let mut deposit = self
            .store
            .get_deposit(event.transaction_id)?
            .ok_or(LedgerError::RequestNotFound(event.transaction_id))?;
        if deposit.status != DepositStatus::Pending {
            return Err(LedgerError::AlreadySettled(deposit.id));
        }

        let account = self.store.require_account(deposit.account_id)?;
        let params = self.resolver.resolve_deposit(deposit.account_id, settings)?;
        let breakdown = compute_deposit_fee(deposit.amount, &params)?;
        self.audit.fee_computed(
            ctx,
            deposit.id,
            FeeType::Deposit,
            deposit.amount,
            breakdown.fee,
            breakdown.tier_label.as_str(),
        );

        let mut receipt = SettlementReceipt {
            provider_event_id: event.provider_event_id.clone(),
            transaction_id: deposit.id,
            operation: FeeType::Deposit,
            fee: breakdown.fee,
            amount_applied: breakdown.net_amount,
            balance_after: Decimal::ZERO,
            settled_at: event.timestamp,
        };

        // Claim the event id before mutating anything. A concurrent
        // delivery of the same event loses this race and returns the
        // recorded receipt.
        if !self.store.insert_webhook_if_absent(&event.provider_event_id, &receipt)? {
            self.audit.duplicate_settlement_skipped(ctx, &event.provider_event_id);
            let original = self
                .store
                .get_webhook_receipt(&event.provider_event_id)?
                .unwrap_or_else(|| receipt.clone());
            return Ok(SettlementOutcome::Duplicate(original));
        }

        // Credit first. If the ledger refuses, release the claim so the
        // deposit stays Pending and the event id stays retryable.
        let change = match self.ledger.increment(
            deposit.account_id,
            breakdown.net_amount,
            BalanceField::Balance,
            ctx,
        ) {
            Ok(change) => change,
            Err(err) => {
                self.store.remove_webhook_claim(&event.provider_event_id)?;
                return Err(err);
            }
        };
        receipt.balance_after = change.after;
        self.store.put_webhook_receipt(&event.provider_event_id, &receipt)?;

        deposit.fee = Some(breakdown.fee);
        deposit.net_amount = Some(breakdown.net_amount);
        deposit.tier_label = Some(breakdown.tier_label.as_str().to_string());
        deposit.status = DepositStatus::PaidOut;
        deposit.settled_at = Some(event.timestamp);
        self.store.put_deposit(&deposit)?;

        // Splits run after the fee is final. A failure here is isolated:
        // the customer credit above stands.
        if let Err(err) = self.splits.distribute(
            deposit.id,
            deposit.account_id,
            breakdown.fee,
            FeeType::Deposit,
            event.timestamp,
            settings,
            ctx,
        ) {
            log::error!(
                "Split distribution failed for deposit {}: {}",
                deposit.id,
                err
            );
        }

        self.audit
            .settlement_applied(ctx, deposit.id, &event.provider_event_id, &account.document);
        self.dedup.lock().expect("dedup lock poisoned").record(&event.provider_event_id);

        Ok(SettlementOutcome::Applied(receipt))
    }

    /// Explicit compensating transition for a settled deposit.
    pub fn refund_deposit(&self, deposit_id: u64, ctx: &OpContext) -> Result<(), LedgerError> {
        let mut deposit = self
            .store
            .get_deposit(deposit_id)?
            .ok_or(LedgerError::RequestNotFound(deposit_id))?;
        if deposit.status != DepositStatus::PaidOut {
            return Err(LedgerError::InvalidStateTransition {
                from: deposit.status.as_str().to_string(),
                to: DepositStatus::Refunded.as_str().to_string(),
            });
        }

        let net = deposit.net_amount.unwrap_or(Decimal::ZERO);
        deposit.status = DepositStatus::Refunded;
        self.store.put_deposit(&deposit)?;
        self.ledger.decrement(deposit.account_id, net, BalanceField::Balance, ctx)?;
        Ok(())
    }

    // ---------- withdrawals ----------

    /// Create a PENDING withdrawal. The available-balance check lives
    /// here, upstream of the ledger.
    pub fn register_withdrawal(
        &self,
        account_id: u64,
        amount: Decimal,
        settings: &FeeSettings,
        ctx: &OpContext,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let account = self.store.require_account(account_id)?;
        let params = self.resolver.resolve_withdrawal(account_id, settings)?;
        let breakdown = compute_withdrawal_fee(amount, &params)?;

        let available = account.balance - account.pending_withdrawal;
        if available < breakdown.total_debit {
            return Err(LedgerError::InsufficientBalance {
                available,
                required: breakdown.total_debit,
            });
        }

        let mut withdrawal = WithdrawalRequest {
            id: self.store.next_id()?,
            account_id,
            amount,
            fee: breakdown.fee,
            total_debited: breakdown.total_debit,
            affiliate_carve_out: breakdown.affiliate_carve_out,
            acquirer_cost: breakdown.acquirer_cost,
            platform_profit: breakdown.platform_profit,
            status: WithdrawalStatus::Pending,
            created_at: now_ms(),
            settled_at: None,
        };
        self.store.put_withdrawal(&withdrawal)?;
        let pending = self.reconciler.recompute_pending_withdrawal(account_id, ctx)?;

        // The availability check above raced against nothing: a second
        // request admitted between the read and the insert can push the
        // pending total past the balance. Re-check against the recomputed
        // aggregate and back this request out if it overshoots.
        let account = self.store.require_account(account_id)?;
        if pending > account.balance {
            withdrawal.status = WithdrawalStatus::Cancelled;
            self.store.put_withdrawal(&withdrawal)?;
            self.reconciler.recompute_pending_withdrawal(account_id, ctx)?;
            return Err(LedgerError::InsufficientBalance {
                available: account.balance - (pending - withdrawal.total_debited),
                required: withdrawal.total_debited,
            });
        }
        Ok(withdrawal)
    }

    /// Apply a confirmed payout: balance debit, withdrawal-fee splits.
    pub fn settle_withdrawal(
        &self,
        event: &SettlementEvent,
        settings: &FeeSettings,
        ctx: &OpContext,
    ) -> Result<SettlementOutcome, LedgerError> {
        if let Some(receipt) = self.check_duplicate(event, ctx)? {
            return Ok(SettlementOutcome::Duplicate(receipt));
        }

        let mut withdrawal = self
            .store
            .get_withdrawal(event.transaction_id)?
            .ok_or(LedgerError::RequestNotFound(event.transaction_id))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(LedgerError::AlreadySettled(withdrawal.id));
        }

        let account = self.store.require_account(withdrawal.account_id)?;
        self.audit.fee_computed(
            ctx,
            withdrawal.id,
            FeeType::Withdrawal,
            withdrawal.amount,
            withdrawal.fee,
            "FLAT_WITHDRAWAL",
        );

        let mut receipt = SettlementReceipt {
            provider_event_id: event.provider_event_id.clone(),
            transaction_id: withdrawal.id,
            operation: FeeType::Withdrawal,
            fee: withdrawal.fee,
            amount_applied: withdrawal.total_debited,
            balance_after: Decimal::ZERO,
            settled_at: event.timestamp,
        };

        if !self.store.insert_webhook_if_absent(&event.provider_event_id, &receipt)? {
            self.audit.duplicate_settlement_skipped(ctx, &event.provider_event_id);
            let original = self
                .store
                .get_webhook_receipt(&event.provider_event_id)?
                .unwrap_or_else(|| receipt.clone());
            return Ok(SettlementOutcome::Duplicate(original));
        }

        // Debit first, release the claim on refusal; the withdrawal
        // stays Pending and the event id stays retryable.
        let change = match self.ledger.decrement(
            withdrawal.account_id,
            withdrawal.total_debited,
            BalanceField::Balance,
            ctx,
        ) {
            Ok(change) => change,
            Err(err) => {
                self.store.remove_webhook_claim(&event.provider_event_id)?;
                return Err(err);
            }
        };
        receipt.balance_after = change.after;
        self.store.put_webhook_receipt(&event.provider_event_id, &receipt)?;

        withdrawal.status = WithdrawalStatus::Completed;
        withdrawal.settled_at = Some(event.timestamp);
        self.store.put_withdrawal(&withdrawal)?;

        if let Err(err) = self.splits.distribute(
            withdrawal.id,
            withdrawal.account_id,
            withdrawal.fee,
            FeeType::Withdrawal,
            event.timestamp,
            settings,
            ctx,
        ) {
            log::error!(
                "Split distribution failed for withdrawal {}: {}",
                withdrawal.id,
                err
            );
        }

        self.reconciler.recompute_pending_withdrawal(withdrawal.account_id, ctx)?;
        self.audit.settlement_applied(
            ctx,
            withdrawal.id,
            &event.provider_event_id,
            &account.document,
        );
        self.dedup.lock().expect("dedup lock poisoned").record(&event.provider_event_id);

        Ok(SettlementOutcome::Applied(receipt))
    }

    /// Cancel a pending withdrawal. No balance touch: the debit never
    /// happened.
    pub fn cancel_withdrawal(
        &self,
        withdrawal_id: u64,
        ctx: &OpContext,
    ) -> Result<(), LedgerError> {
        let mut withdrawal = self
            .store
            .get_withdrawal(withdrawal_id)?
            .ok_or(LedgerError::RequestNotFound(withdrawal_id))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(LedgerError::InvalidStateTransition {
                from: withdrawal.status.as_str().to_string(),
                to: WithdrawalStatus::Cancelled.as_str().to_string(),
            });
        }

        withdrawal.status = WithdrawalStatus::Cancelled;
        self.store.put_withdrawal(&withdrawal)?;
        self.reconciler.recompute_pending_withdrawal(withdrawal.account_id, ctx)?;
        Ok(())
    }

    // ---------- idempotency ----------

    fn check_duplicate(
        &self,
        event: &SettlementEvent,
        ctx: &OpContext,
    ) -> Result<Option<SettlementReceipt>, LedgerError> {
        let recently_seen = self
            .dedup
            .lock()
            .expect("dedup lock poisoned")
            .seen(&event.provider_event_id);

        if recently_seen || self.store.get_webhook_receipt(&event.provider_event_id)?.is_some() {
            self.audit.duplicate_settlement_skipped(ctx, &event.provider_event_id);
            let receipt = self
                .store
                .get_webhook_receipt(&event.provider_event_id)?
                .ok_or_else(|| {
                    LedgerError::Unknown(format!(
                        "event {} cached as seen but receipt missing",
                        event.provider_event_id
                    ))
                })?;
            return Ok(Some(receipt));
        }
        Ok(None)
    }
}
