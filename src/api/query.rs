//! Read-only aggregates for the reporting/dashboard collaborator.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{LedgerError, SplitExecution};
use crate::store::GatewayStore;

/// Fee breakdown of one settled transaction, deposit or withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeBreakdownView {
    Deposit {
        transaction_id: u64,
        gross: Decimal,
        fee: Option<Decimal>,
        net_amount: Option<Decimal>,
        tier_label: Option<String>,
        status: String,
    },
    Withdrawal {
        transaction_id: u64,
        amount: Decimal,
        fee: Decimal,
        total_debited: Decimal,
        affiliate_carve_out: Decimal,
        acquirer_cost: Decimal,
        platform_profit: Decimal,
        status: String,
    },
}

pub struct GatewayQuery {
    store: Arc<GatewayStore>,
}

impl GatewayQuery {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    pub fn get_balance(&self, account_id: u64) -> Result<Decimal, LedgerError> {
        Ok(self.store.require_account(account_id)?.balance)
    }

    pub fn get_pending_withdrawal(&self, account_id: u64) -> Result<Decimal, LedgerError> {
        Ok(self.store.require_account(account_id)?.pending_withdrawal)
    }

    /// Deposit and withdrawal ids live in separate tables; try both.
    pub fn get_fee_breakdown(
        &self,
        transaction_id: u64,
    ) -> Result<FeeBreakdownView, LedgerError> {
        if let Some(dep) = self.store.get_deposit(transaction_id)? {
            return Ok(FeeBreakdownView::Deposit {
                transaction_id: dep.id,
                gross: dep.amount,
                fee: dep.fee,
                net_amount: dep.net_amount,
                tier_label: dep.tier_label,
                status: dep.status.as_str().to_string(),
            });
        }
        if let Some(wd) = self.store.get_withdrawal(transaction_id)? {
            return Ok(FeeBreakdownView::Withdrawal {
                transaction_id: wd.id,
                amount: wd.amount,
                fee: wd.fee,
                total_debited: wd.total_debited,
                affiliate_carve_out: wd.affiliate_carve_out,
                acquirer_cost: wd.acquirer_cost,
                platform_profit: wd.platform_profit,
                status: wd.status.as_str().to_string(),
            });
        }
        Err(LedgerError::RequestNotFound(transaction_id))
    }

    pub fn list_split_executions(
        &self,
        beneficiary_account_id: u64,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<SplitExecution>, LedgerError> {
        self.store
            .list_split_executions_by_beneficiary(beneficiary_account_id, from_ms, to_ms)
    }
}
