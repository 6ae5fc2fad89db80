use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deposit request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    PaidOut,
    Cancelled,
    Refunded,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaidOut => "paid_out",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid_out" => Some(Self::PaidOut),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

/// Withdrawal request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A PIX charge issued for an account. Fee fields are filled at
/// settlement time from the policy in force at that moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub id: u64,
    pub account_id: u64,
    pub amount: Decimal,
    pub fee: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    pub tier_label: Option<String>,
    pub status: DepositStatus,
    pub created_at: i64,
    pub settled_at: Option<i64>,
}

impl DepositRequest {
    pub fn new(id: u64, account_id: u64, amount: Decimal, created_at: i64) -> Self {
        Self {
            id,
            account_id,
            amount,
            fee: None,
            net_amount: None,
            tier_label: None,
            status: DepositStatus::Pending,
            created_at,
            settled_at: None,
        }
    }
}

/// A PIX payout requested by an account. The customer always receives
/// `amount`; `total_debited = amount + fee` is what leaves the balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: u64,
    pub account_id: u64,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total_debited: Decimal,
    pub affiliate_carve_out: Decimal,
    pub acquirer_cost: Decimal,
    pub platform_profit: Decimal,
    pub status: WithdrawalStatus,
    pub created_at: i64,
    pub settled_at: Option<i64>,
}

/// Settlement event delivered by the acquirer-webhook collaborator.
/// `provider_event_id` is the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub provider_event_id: String,
    pub transaction_id: u64,
    pub amount: Decimal,
    pub status: String,
    pub timestamp: i64,
}

/// What a settlement did. Persisted in the webhook idempotency log so a
/// replayed delivery can return the original result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub provider_event_id: String,
    pub transaction_id: u64,
    pub operation: super::split::FeeType,
    pub fee: Decimal,
    /// Net credited (deposit) or total debited (withdrawal).
    pub amount_applied: Decimal,
    pub balance_after: Decimal,
    pub settled_at: i64,
}

/// Result of a settlement entry point. A duplicate delivery is a no-op
/// success carrying the receipt recorded by the first delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Applied(SettlementReceipt),
    Duplicate(SettlementReceipt),
}

impl SettlementOutcome {
    pub fn receipt(&self) -> &SettlementReceipt {
        match self {
            Self::Applied(r) | Self::Duplicate(r) => r,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(DepositStatus::from_str("paid_out"), Some(DepositStatus::PaidOut));
        assert_eq!(DepositStatus::PaidOut.as_str(), "paid_out");
        assert_eq!(WithdrawalStatus::from_str("completed"), Some(WithdrawalStatus::Completed));
        assert_eq!(WithdrawalStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DepositStatus::Refunded.is_terminal());
        assert!(!DepositStatus::Pending.is_terminal());
        assert!(WithdrawalStatus::Completed.is_terminal());
    }

    #[test]
    fn test_new_deposit_has_no_fee() {
        let dep = DepositRequest::new(1, 100, dec!(50.00), 1_700_000_000_000);
        assert_eq!(dep.status, DepositStatus::Pending);
        assert!(dep.fee.is_none());
        assert!(dep.net_amount.is_none());
    }
}
