//! Write-only audit trail.
//!
//! Every engine mutation reports here with an explicit OpContext carried
//! down from the HTTP/webhook boundary. No call-stack inspection, ever.
//! Sensitive identifiers are masked before they reach the log.

use rust_decimal::Decimal;

use crate::logging::{mask_identifier, LogEvent};
use crate::models::{BalanceField, FeeType, SplitExecution};

/// Who is doing what, threaded through every operation.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub actor_id: String,
    pub operation: String,
    pub correlation_id: String,
}

impl OpContext {
    pub fn new(actor_id: &str, operation: &str, correlation_id: &str) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            operation: operation.to_string(),
            correlation_id: correlation_id.to_string(),
        }
    }

    /// Context for internal jobs (scanners, reconciliation).
    pub fn system(operation: &str) -> Self {
        Self::new("system", operation, &format!("sys_{}", crate::logging::now_ms()))
    }
}

/// Structured event sink. Stateless; events go out through the `log`
/// facade as JSON.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail;

impl AuditTrail {
    pub fn new() -> Self {
        Self
    }

    fn base(&self, event: &str, ctx: &OpContext) -> LogEvent {
        LogEvent::new(event)
            .field("actor_id", ctx.actor_id.as_str())
            .field("operation", ctx.operation.as_str())
            .field("correlation_id", ctx.correlation_id.as_str())
    }

    pub fn balance_changed(
        &self,
        ctx: &OpContext,
        account_id: u64,
        field: BalanceField,
        before: Decimal,
        after: Decimal,
    ) {
        let event = self
            .base("BALANCE_CHANGED", ctx)
            .field("account_id", account_id)
            .field("field", field.as_str())
            .field("before", before.to_string())
            .field("after", after.to_string())
            .field("delta", (after - before).to_string())
            .build();
        log::info!("{}", event);
    }

    pub fn fee_computed(
        &self,
        ctx: &OpContext,
        transaction_id: u64,
        fee_type: FeeType,
        gross: Decimal,
        fee: Decimal,
        tier_label: &str,
    ) {
        let event = self
            .base("FEE_COMPUTED", ctx)
            .field("transaction_id", transaction_id)
            .field("fee_type", fee_type.as_str())
            .field("gross", gross.to_string())
            .field("fee", fee.to_string())
            .field("tier_label", tier_label)
            .build();
        log::info!("{}", event);
    }

    pub fn settlement_applied(
        &self,
        ctx: &OpContext,
        transaction_id: u64,
        provider_event_id: &str,
        document: &str,
    ) {
        let event = self
            .base("SETTLEMENT_APPLIED", ctx)
            .field("transaction_id", transaction_id)
            .field("provider_event_id", provider_event_id)
            .field("document", mask_identifier(document))
            .build();
        log::info!("{}", event);
    }

    pub fn duplicate_settlement_skipped(&self, ctx: &OpContext, provider_event_id: &str) {
        let event = self
            .base("DUPLICATE_SETTLEMENT_SKIPPED", ctx)
            .field("provider_event_id", provider_event_id)
            .build();
        log::info!("{}", event);
    }

    pub fn split_executed(&self, ctx: &OpContext, exec: &SplitExecution) {
        let event = self
            .base("SPLIT_EXECUTED", ctx)
            .field("config_id", exec.config_id)
            .field("transaction_id", exec.transaction_id)
            .field("beneficiary_account_id", exec.beneficiary_account_id)
            .field("split_amount", exec.split_amount.to_string())
            .field("percentage_applied", exec.percentage_applied.to_string())
            .field("status", exec.status.as_str())
            .build();
        log::info!("{}", event);
    }

    pub fn split_failed(&self, ctx: &OpContext, exec: &SplitExecution, reason: &str) {
        let event = self
            .base("SPLIT_FAILED", ctx)
            .field("config_id", exec.config_id)
            .field("transaction_id", exec.transaction_id)
            .field("beneficiary_account_id", exec.beneficiary_account_id)
            .field("reason", reason)
            .build();
        log::warn!("{}", event);
    }

    pub fn split_retried(&self, ctx: &OpContext, config_id: u64, transaction_id: u64) {
        let event = self
            .base("SPLIT_RETRIED", ctx)
            .field("config_id", config_id)
            .field("transaction_id", transaction_id)
            .build();
        log::info!("{}", event);
    }
}
