//! Distributes collected fees to internal beneficiaries.
//!
//! Two commission mechanisms run through one path: admin-configured
//! internal splits (SplitConfig rows) and the payer's manager
//! commission. Both are percentage-of-fee shares; the manager rule uses
//! the reserved config id 0 so its executions share the same
//! (config_id, transaction_id) idempotency boundary.
//!
//! One beneficiary failing never blocks the others, and never rolls back
//! the balance mutation that produced the fee. Failures are recorded
//! with status=failed and a reason, eligible for admin reprocessing.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::audit::{AuditTrail, OpContext};
use crate::balance_ledger::BalanceLedger;
use crate::configure::FeeSettings;
use crate::fee_policy::FeePolicyResolver;
use crate::logging::now_ms;
use crate::models::{
    BalanceField, CommissionRule, FeeType, LedgerError, ManagerCommission, SplitExecution,
    SplitExecutionEvent, SplitExecutionState, SplitExecutionStateMachine,
};
use crate::money::percent_of;
use crate::store::GatewayStore;

/// Reserved config id for the manager commission rule.
pub const MANAGER_RULE_ID: u64 = 0;

pub struct SplitDistributionEngine {
    store: Arc<GatewayStore>,
    ledger: Arc<BalanceLedger>,
    audit: AuditTrail,
}

impl SplitDistributionEngine {
    pub fn new(store: Arc<GatewayStore>, ledger: Arc<BalanceLedger>) -> Self {
        Self { store, ledger, audit: AuditTrail::new() }
    }

    /// Apply every commission rule active for the payer at settlement
    /// time. Returns the execution records, including ones that failed
    /// or were skipped as already-existing.
    pub fn distribute(
        &self,
        transaction_id: u64,
        payer_account_id: u64,
        fee: Decimal,
        fee_type: FeeType,
        settled_at: i64,
        settings: &FeeSettings,
        ctx: &OpContext,
    ) -> Result<Vec<SplitExecution>, LedgerError> {
        if fee <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let payer = self.store.require_account(payer_account_id)?;

        let mut rules: Vec<CommissionRule> = Vec::new();
        if fee_type == FeeType::Deposit {
            if let (Some(manager_id), Some(percentage)) =
                (payer.manager_id, FeePolicyResolver::manager_percent(&payer, settings))
            {
                rules.push(CommissionRule::Manager { manager_id, percentage });
            }
        }
        for config in self.store.list_configs_for(payer_account_id, fee_type)? {
            if config.is_applicable(settled_at) {
                rules.push(CommissionRule::InternalSplit(config));
            }
        }

        let mut executions = Vec::with_capacity(rules.len());
        for rule in rules {
            let exec =
                self.apply_rule(&rule, transaction_id, payer_account_id, fee, fee_type, ctx)?;
            executions.push(exec);
        }
        Ok(executions)
    }

    /// One rule, independently transactional. Storage errors propagate;
    /// payout errors are captured in the execution record.
    fn apply_rule(
        &self,
        rule: &CommissionRule,
        transaction_id: u64,
        payer_account_id: u64,
        fee: Decimal,
        fee_type: FeeType,
        ctx: &OpContext,
    ) -> Result<SplitExecution, LedgerError> {
        let config_id = match rule {
            CommissionRule::InternalSplit(cfg) => cfg.id,
            CommissionRule::Manager { .. } => MANAGER_RULE_ID,
        };

        let exec = SplitExecution {
            config_id,
            transaction_id,
            payer_account_id,
            beneficiary_account_id: rule.beneficiary_id(),
            fee_type,
            fee_amount: fee,
            split_amount: percent_of(fee, rule.percentage()),
            percentage_applied: rule.percentage(),
            status: SplitExecutionState::Pending,
            failure_reason: None,
            created_at: now_ms(),
        };

        // Idempotency boundary: one execution per (config, transaction).
        if !self.store.insert_split_execution_if_absent(&exec)? {
            let existing = self
                .store
                .get_split_execution(config_id, transaction_id)?
                .ok_or(LedgerError::SplitExecutionNotFound { config_id, transaction_id })?;
            return Ok(existing);
        }

        let exec = self.process_execution(exec, ctx)?;

        if let (CommissionRule::Manager { manager_id, percentage }, SplitExecutionState::Processed) =
            (rule, exec.status)
        {
            let commission = ManagerCommission {
                deposit_id: transaction_id,
                account_id: payer_account_id,
                manager_id: *manager_id,
                fee_amount: fee,
                percentage_applied: *percentage,
                commission: exec.split_amount,
                created_at: exec.created_at,
            };
            self.store.insert_manager_commission_if_absent(&commission)?;
        }

        Ok(exec)
    }

    /// Credit the beneficiary and drive the state machine. Payout errors
    /// land in the record, not in the return value.
    fn process_execution(
        &self,
        mut exec: SplitExecution,
        ctx: &OpContext,
    ) -> Result<SplitExecution, LedgerError> {
        let mut fsm = SplitExecutionStateMachine::from_state(exec.status);

        match self.ledger.increment(
            exec.beneficiary_account_id,
            exec.split_amount,
            BalanceField::Balance,
            ctx,
        ) {
            Ok(_) => {
                fsm.consume(SplitExecutionEvent::Process)?;
                exec.status = fsm.state();
                exec.failure_reason = None;
                self.store.put_split_execution(&exec)?;
                self.audit.split_executed(ctx, &exec);
            }
            Err(err) => {
                fsm.consume(SplitExecutionEvent::Fail)?;
                exec.status = fsm.state();
                exec.failure_reason = Some(err.to_string());
                self.store.put_split_execution(&exec)?;
                self.audit.split_failed(ctx, &exec, &err.to_string());
            }
        }

        Ok(exec)
    }

    /// Admin retry for failed executions. Re-validates the config is
    /// still active before resubmitting; stale configs stay failed.
    pub fn reprocess_failed(&self, ctx: &OpContext) -> Result<ReprocessStats, LedgerError> {
        let mut stats = ReprocessStats::default();

        for exec in self.store.list_failed_split_executions()? {
            stats.scanned += 1;

            let still_valid = if exec.config_id == MANAGER_RULE_ID {
                self.store
                    .get_account(exec.payer_account_id)?
                    .map(|a| a.manager_id == Some(exec.beneficiary_account_id))
                    .unwrap_or(false)
            } else {
                self.store
                    .get_split_config(exec.config_id)?
                    .map(|c| c.is_applicable(now_ms()))
                    .unwrap_or(false)
            };

            if !still_valid {
                stats.skipped += 1;
                continue;
            }

            let mut retried = exec.clone();
            let mut fsm = SplitExecutionStateMachine::from_state(retried.status);
            fsm.consume(SplitExecutionEvent::Retry)?;
            retried.status = fsm.state();
            self.store.put_split_execution(&retried)?;
            self.audit.split_retried(ctx, retried.config_id, retried.transaction_id);

            let outcome = self.process_execution(retried, ctx)?;
            match outcome.status {
                SplitExecutionState::Processed => stats.reprocessed += 1,
                _ => stats.still_failed += 1,
            }
        }

        Ok(stats)
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ReprocessStats {
    pub scanned: u32,
    pub reprocessed: u32,
    pub still_failed: u32,
    pub skipped: u32,
}
