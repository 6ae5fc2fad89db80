use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A gateway account. `balance` is authoritative and only ever mutated
/// through the BalanceLedger; `pending_withdrawal` is a derived aggregate
/// maintained by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub name: String,
    /// Tax document (CPF/CNPJ). Masked in all log output.
    pub document: String,

    pub balance: Decimal,
    pub pending_withdrawal: Decimal,
    /// Bumped on every persisted write, used by the CAS loop.
    pub version: u64,

    // Per-account fee overrides. None falls back to the global setting.
    pub custom_fees_enabled: bool,
    pub flexible_pricing_enabled: bool,
    pub deposit_fee_percent: Option<Decimal>,
    pub deposit_fee_fixed: Option<Decimal>,
    pub flexible_min_threshold: Option<Decimal>,
    pub flexible_low_tier_fee: Option<Decimal>,
    pub flexible_high_tier_percent: Option<Decimal>,
    pub withdrawal_fee: Option<Decimal>,

    // Internal beneficiaries
    pub manager_id: Option<u64>,
    pub manager_percent: Option<Decimal>,
    pub affiliate_id: Option<u64>,
}

impl Account {
    pub fn new(id: u64, name: &str, document: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            document: document.to_string(),
            balance: Decimal::ZERO,
            pending_withdrawal: Decimal::ZERO,
            version: 0,
            custom_fees_enabled: false,
            flexible_pricing_enabled: false,
            deposit_fee_percent: None,
            deposit_fee_fixed: None,
            flexible_min_threshold: None,
            flexible_low_tier_fee: None,
            flexible_high_tier_percent: None,
            withdrawal_fee: None,
            manager_id: None,
            manager_percent: None,
            affiliate_id: None,
        }
    }

    pub fn has_affiliate(&self) -> bool {
        self.affiliate_id.is_some()
    }

    pub fn has_manager(&self) -> bool {
        self.manager_id.is_some()
    }
}

/// Which monetary field of the account a ledger mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceField {
    Balance,
    PendingWithdrawal,
}

impl BalanceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::PendingWithdrawal => "pending_withdrawal",
        }
    }

    pub fn get(&self, account: &Account) -> Decimal {
        match self {
            Self::Balance => account.balance,
            Self::PendingWithdrawal => account.pending_withdrawal,
        }
    }

    pub fn set(&self, account: &mut Account, value: Decimal) {
        match self {
            Self::Balance => account.balance = value,
            Self::PendingWithdrawal => account.pending_withdrawal = value,
        }
    }
}
