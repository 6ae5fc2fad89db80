// Error types for the ledger and fee-settlement core
use std::fmt;

use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub enum LedgerError {
    // Validation errors
    InvalidAmount(String),
    InvalidPercentage(Decimal),
    SamePayerBeneficiary,
    DuplicateSplitConfig { payer_id: u64, beneficiary_id: u64, fee_type: String },
    MissingConfig(String),

    // Balance errors (raised by callers of the ledger, not the ledger itself)
    InsufficientBalance { available: Decimal, required: Decimal },

    // Record errors
    AccountNotFound(u64),
    RequestNotFound(u64),
    SplitConfigNotFound(u64),
    SplitExecutionNotFound { config_id: u64, transaction_id: u64 },

    // State errors
    InvalidStateTransition { from: String, to: String },
    AlreadySettled(u64),

    // Concurrency errors
    ConcurrencyConflict { account_id: u64, attempts: u32 },

    // Storage errors
    StoreError(String),
    CodecError(String),

    // Unknown
    Unknown(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            Self::InvalidPercentage(pct) => {
                write!(f, "Invalid percentage {}: must be > 0 and <= 100", pct)
            }
            Self::SamePayerBeneficiary => {
                write!(f, "Split payer and beneficiary must be different accounts")
            }
            Self::DuplicateSplitConfig { payer_id, beneficiary_id, fee_type } => write!(
                f,
                "Active split config already exists for payer {} -> beneficiary {} ({})",
                payer_id, beneficiary_id, fee_type
            ),
            Self::MissingConfig(what) => write!(f, "Missing required configuration: {}", what),
            Self::InsufficientBalance { available, required } => {
                write!(f, "Insufficient balance: have {}, need {}", available, required)
            }
            Self::AccountNotFound(id) => write!(f, "Account {} not found", id),
            Self::RequestNotFound(id) => write!(f, "Transaction {} not found", id),
            Self::SplitConfigNotFound(id) => write!(f, "Split config {} not found", id),
            Self::SplitExecutionNotFound { config_id, transaction_id } => write!(
                f,
                "Split execution not found for config {} / transaction {}",
                config_id, transaction_id
            ),
            Self::InvalidStateTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            Self::AlreadySettled(id) => write!(f, "Transaction {} already settled", id),
            Self::ConcurrencyConflict { account_id, attempts } => write!(
                f,
                "Balance update for account {} lost the race {} times, giving up",
                account_id, attempts
            ),
            Self::StoreError(msg) => write!(f, "Storage error: {}", msg),
            Self::CodecError(msg) => write!(f, "Record encode/decode error: {}", msg),
            Self::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::StoreError(err.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::CodecError(err.to_string())
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::Unknown(err.to_string())
    }
}

// Error code mapping for API responses
impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidPercentage(_) => "INVALID_PERCENTAGE",
            Self::SamePayerBeneficiary => "SAME_PAYER_BENEFICIARY",
            Self::DuplicateSplitConfig { .. } => "DUPLICATE_SPLIT_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::RequestNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::SplitConfigNotFound(_) => "SPLIT_CONFIG_NOT_FOUND",
            Self::SplitExecutionNotFound { .. } => "SPLIT_EXECUTION_NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::AlreadySettled(_) => "ALREADY_SETTLED",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::StoreError(_) => "STORE_ERROR",
            Self::CodecError(_) => "CODEC_ERROR",
            Self::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. } | Self::StoreError(_))
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidPercentage(_)
                | Self::SamePayerBeneficiary
                | Self::DuplicateSplitConfig { .. }
                | Self::InsufficientBalance { .. }
        )
    }
}
