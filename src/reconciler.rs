//! Recomputes derived aggregates from the settled-transaction history.
//!
//! Writes only `pending_withdrawal`. The authoritative `balance` field
//! is never overwritten here; it changes exclusively through explicit
//! BalanceLedger calls at settlement. The consistency auditor reports
//! divergence between the two views and fixes nothing.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::audit::OpContext;
use crate::balance_ledger::BalanceLedger;
use crate::models::{
    BalanceField, DepositStatus, LedgerError, SplitExecutionState, WithdrawalStatus,
};
use crate::store::GatewayStore;

pub struct NetBalanceReconciler {
    store: Arc<GatewayStore>,
    ledger: Arc<BalanceLedger>,
}

impl NetBalanceReconciler {
    pub fn new(store: Arc<GatewayStore>, ledger: Arc<BalanceLedger>) -> Self {
        Self { store, ledger }
    }

    /// Sum of PENDING withdrawal debits, written back to the
    /// `pending_withdrawal` field only.
    pub fn recompute_pending_withdrawal(
        &self,
        account_id: u64,
        ctx: &OpContext,
    ) -> Result<Decimal, LedgerError> {
        let pending: Decimal = self
            .store
            .list_withdrawals_by_account(account_id)?
            .iter()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .map(|w| w.total_debited)
            .sum();

        self.ledger
            .set_absolute(account_id, pending, BalanceField::PendingWithdrawal, ctx)?;
        Ok(pending)
    }
}

/// What the settled history says an account's balance should be,
/// next to what the balance field actually holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyReport {
    pub account_id: u64,
    pub balance: Decimal,
    pub expected: Decimal,
    pub divergence: Decimal,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.divergence == Decimal::ZERO
    }
}

#[derive(Debug, Default)]
pub struct ConsistencyStats {
    pub checked: u64,
    pub divergent: u64,
}

/// Read-only. A settlement path that forgot to call the ledger shows up
/// here as divergence; the report goes to ops, never to the balance.
pub struct ConsistencyAuditor {
    store: Arc<GatewayStore>,
}

impl ConsistencyAuditor {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    pub fn check_account(&self, account_id: u64) -> Result<ConsistencyReport, LedgerError> {
        let account = self.store.require_account(account_id)?;

        let mut expected = Decimal::ZERO;

        for dep in self.store.list_deposits_by_account(account_id)? {
            // Refunded deposits were credited then explicitly debited back.
            if dep.status == DepositStatus::PaidOut {
                expected += dep.net_amount.unwrap_or(Decimal::ZERO);
            }
        }

        for wd in self.store.list_withdrawals_by_account(account_id)? {
            if wd.status == WithdrawalStatus::Completed {
                expected -= wd.total_debited;
            }
        }

        for exec in self.store.list_all_split_executions()? {
            if exec.beneficiary_account_id == account_id
                && exec.status == SplitExecutionState::Processed
            {
                expected += exec.split_amount;
            }
        }

        Ok(ConsistencyReport {
            account_id,
            balance: account.balance,
            expected,
            divergence: account.balance - expected,
        })
    }

    pub fn scan_all(&self) -> Result<ConsistencyStats, LedgerError> {
        let mut stats = ConsistencyStats::default();
        for account in self.store.list_accounts()? {
            let report = self.check_account(account.id)?;
            stats.checked += 1;
            if !report.is_consistent() {
                stats.divergent += 1;
                log::warn!(
                    "Balance divergence on account {}: balance={}, expected={}, delta={}",
                    report.account_id,
                    report.balance,
                    report.expected,
                    report.divergence
                );
            }
        }
        Ok(stats)
    }
}
