//! The only component allowed to touch an account's stored monetary
//! fields. Read-modify-write under compare-and-swap with bounded retry;
//! every mutation leaves a before/after audit event.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::audit::{AuditTrail, OpContext};
use crate::models::{Account, BalanceField, LedgerError};
use crate::store::GatewayStore;

const MAX_CAS_RETRIES: u32 = 32;
const RETRY_BACKOFF_BASE_US: u64 = 50;

/// Before/after view of one applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    pub account_id: u64,
    pub field: BalanceField,
    pub before: Decimal,
    pub after: Decimal,
    pub version: u64,
}

impl BalanceChange {
    pub fn delta(&self) -> Decimal {
        self.after - self.before
    }
}

pub struct BalanceLedger {
    store: Arc<GatewayStore>,
    audit: AuditTrail,
}

impl BalanceLedger {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store, audit: AuditTrail::new() }
    }

    pub fn increment(
        &self,
        account_id: u64,
        amount: Decimal,
        field: BalanceField,
        ctx: &OpContext,
    ) -> Result<BalanceChange, LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "increment amount must be >= 0, got {}",
                amount
            )));
        }
        self.apply(account_id, field, ctx, |current| current + amount)
    }

    /// Not blocked below zero: business thresholds are the caller's job,
    /// this layer only guarantees the arithmetic and the audit trail.
    pub fn decrement(
        &self,
        account_id: u64,
        amount: Decimal,
        field: BalanceField,
        ctx: &OpContext,
    ) -> Result<BalanceChange, LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "decrement amount must be >= 0, got {}",
                amount
            )));
        }
        self.apply(account_id, field, ctx, |current| current - amount)
    }

    pub fn set_absolute(
        &self,
        account_id: u64,
        value: Decimal,
        field: BalanceField,
        ctx: &OpContext,
    ) -> Result<BalanceChange, LedgerError> {
        self.apply(account_id, field, ctx, |_| value)
    }

    /// CAS loop: re-read the row, compute, swap. A lost race re-reads and
    /// recomputes from the winner's value, so two concurrent increments
    /// of +X and +Y always land on original + X + Y.
    fn apply<F>(
        &self,
        account_id: u64,
        field: BalanceField,
        ctx: &OpContext,
        compute: F,
    ) -> Result<BalanceChange, LedgerError>
    where
        F: Fn(Decimal) -> Decimal,
    {
        for attempt in 0..MAX_CAS_RETRIES {
            let current: Account = self.store.require_account(account_id)?;
            let before = field.get(&current);
            let after = compute(before);

            let mut updated = current.clone();
            field.set(&mut updated, after);

            if self.store.cas_account(&current, &mut updated)? {
                self.audit.balance_changed(ctx, account_id, field, before, after);
                return Ok(BalanceChange {
                    account_id,
                    field,
                    before,
                    after,
                    version: updated.version,
                });
            }

            // Lost the race; back off and retry against the fresh row.
            thread::sleep(Duration::from_micros(
                RETRY_BACKOFF_BASE_US << attempt.min(8),
            ));
        }

        Err(LedgerError::ConcurrencyConflict { account_id, attempts: MAX_CAS_RETRIES })
    }
}
