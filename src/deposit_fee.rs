//! Deposit fee computation. Pure and deterministic: same gross amount
//! and parameters always produce the same breakdown, and
//! `fee + net_amount == gross` holds exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fee_policy::DepositFeeParams;
use crate::models::LedgerError;
use crate::money::{percent_of, round_centavos};

/// Which computation path produced the fee, recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierLabel {
    FlexibleFixed,
    FlexiblePercentual,
    BasicPercentualFixed,
}

impl TierLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlexibleFixed => "FLEXIBLE_FIXED",
            Self::FlexiblePercentual => "FLEXIBLE_PERCENTUAL",
            Self::BasicPercentualFixed => "BASIC_PERCENTUAL_FIXED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositFeeBreakdown {
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub tier_label: TierLabel,
}

pub fn compute_deposit_fee(
    gross: Decimal,
    params: &DepositFeeParams,
) -> Result<DepositFeeBreakdown, LedgerError> {
    if gross <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "gross deposit amount must be positive, got {}",
            gross
        )));
    }

    let (fee, tier_label) = match params {
        DepositFeeParams::Flexible { min_threshold, low_tier_fee, high_tier_percent } => {
            validate_percent(*high_tier_percent)?;
            if *low_tier_fee < Decimal::ZERO {
                return Err(LedgerError::InvalidAmount(format!(
                    "low tier fee must be >= 0, got {}",
                    low_tier_fee
                )));
            }
            if gross < *min_threshold {
                (round_centavos(*low_tier_fee), TierLabel::FlexibleFixed)
            } else {
                (percent_of(gross, *high_tier_percent), TierLabel::FlexiblePercentual)
            }
        }
        DepositFeeParams::Flat { percent, fixed } => {
            validate_percent(*percent)?;
            if *fixed < Decimal::ZERO {
                return Err(LedgerError::InvalidAmount(format!(
                    "fixed surcharge must be >= 0, got {}",
                    fixed
                )));
            }
            // No minimum-fee floor here.
            (
                round_centavos(percent_of(gross, *percent) + fixed),
                TierLabel::BasicPercentualFixed,
            )
        }
    };

    // A flexible low-tier fee can exceed a small gross amount; a
    // negative net must never reach the ledger.
    if fee > gross {
        return Err(LedgerError::InvalidAmount(format!(
            "fee {} exceeds gross amount {}",
            fee, gross
        )));
    }

    Ok(DepositFeeBreakdown { fee, net_amount: gross - fee, tier_label })
}

fn validate_percent(percent: Decimal) -> Result<(), LedgerError> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(LedgerError::InvalidPercentage(percent));
    }
    Ok(())
}
