use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::split_fsm::SplitExecutionState;

/// Which collected fee a commission rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Deposit,
    Withdrawal,
}

impl FeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(Self::Deposit),
            "withdrawal" => Some(Self::Withdrawal),
            _ => None,
        }
    }
}

/// Routes a percentage of a payer's collected fees to an internal
/// beneficiary. At most one active config per
/// (payer, beneficiary, fee_type) tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub id: u64,
    pub payer_account_id: u64,
    pub beneficiary_account_id: u64,
    pub percentage: Decimal,
    pub fee_type: FeeType,
    pub active: bool,
    /// Optional validity window, millis since epoch.
    pub valid_from: Option<i64>,
    pub valid_until: Option<i64>,
    pub created_at: i64,
}

impl SplitConfig {
    /// Whether this config applies to a settlement at `at_ms`.
    pub fn is_applicable(&self, at_ms: i64) -> bool {
        if !self.active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if at_ms < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if at_ms > until {
                return false;
            }
        }
        true
    }
}

/// Immutable record of one application of a SplitConfig to one settled
/// transaction. The percentage is snapshotted at execution time so later
/// config edits never change already-recorded shares. Keyed by
/// (config_id, transaction_id), which is the idempotency boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitExecution {
    pub config_id: u64,
    pub transaction_id: u64,
    pub payer_account_id: u64,
    pub beneficiary_account_id: u64,
    pub fee_type: FeeType,
    pub fee_amount: Decimal,
    pub split_amount: Decimal,
    pub percentage_applied: Decimal,
    pub status: SplitExecutionState,
    pub failure_reason: Option<String>,
    pub created_at: i64,
}

/// Manager commission on a settled deposit, 1:1 with the DepositRequest.
/// Same share arithmetic as an internal split, different record type
/// because the surrounding service reports them separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerCommission {
    pub deposit_id: u64,
    pub account_id: u64,
    pub manager_id: u64,
    pub fee_amount: Decimal,
    pub percentage_applied: Decimal,
    pub commission: Decimal,
    pub created_at: i64,
}

/// The two commission mechanisms, unified: both are
/// percentage-of-fee shares owed to an internal beneficiary.
#[derive(Debug, Clone)]
pub enum CommissionRule {
    InternalSplit(SplitConfig),
    Manager { manager_id: u64, percentage: Decimal },
}

impl CommissionRule {
    pub fn beneficiary_id(&self) -> u64 {
        match self {
            Self::InternalSplit(cfg) => cfg.beneficiary_account_id,
            Self::Manager { manager_id, .. } => *manager_id,
        }
    }

    pub fn percentage(&self) -> Decimal {
        match self {
            Self::InternalSplit(cfg) => cfg.percentage,
            Self::Manager { percentage, .. } => *percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(active: bool, from: Option<i64>, until: Option<i64>) -> SplitConfig {
        SplitConfig {
            id: 1,
            payer_account_id: 10,
            beneficiary_account_id: 20,
            percentage: dec!(30),
            fee_type: FeeType::Deposit,
            active,
            valid_from: from,
            valid_until: until,
            created_at: 0,
        }
    }

    #[test]
    fn test_applicability_window() {
        assert!(config(true, None, None).is_applicable(1_000));
        assert!(!config(false, None, None).is_applicable(1_000));
        assert!(!config(true, Some(2_000), None).is_applicable(1_000));
        assert!(!config(true, None, Some(500)).is_applicable(1_000));
        assert!(config(true, Some(500), Some(1_500)).is_applicable(1_000));
    }

    #[test]
    fn test_commission_rule_accessors() {
        let rule = CommissionRule::InternalSplit(config(true, None, None));
        assert_eq!(rule.beneficiary_id(), 20);
        assert_eq!(rule.percentage(), dec!(30));

        let mgr = CommissionRule::Manager { manager_id: 99, percentage: dec!(10) };
        assert_eq!(mgr.beneficiary_id(), 99);
        assert_eq!(mgr.percentage(), dec!(10));
    }

    #[test]
    fn test_fee_type_round_trip() {
        assert_eq!(FeeType::from_str("withdrawal"), Some(FeeType::Withdrawal));
        assert_eq!(FeeType::Deposit.as_str(), "deposit");
    }
}
