//! Withdrawal fee computation.
//!
//! The customer always receives exactly what they asked for; the fee is
//! charged on top of the requested amount. An affiliate never changes
//! the fee the customer pays, only how the platform's cut of that fee is
//! carved up internally.

use rust_decimal::Decimal;

use crate::fee_policy::WithdrawalFeeParams;
use crate::models::LedgerError;
use crate::money::round_centavos;

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalFeeBreakdown {
    pub fee: Decimal,
    pub net_to_customer: Decimal,
    pub total_debit: Decimal,
    pub affiliate_carve_out: Decimal,
    pub acquirer_cost: Decimal,
    pub platform_profit: Decimal,
}

pub fn compute_withdrawal_fee(
    amount: Decimal,
    params: &WithdrawalFeeParams,
) -> Result<WithdrawalFeeBreakdown, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "withdrawal amount must be positive, got {}",
            amount
        )));
    }
    if params.acquirer_cost < Decimal::ZERO {
        return Err(LedgerError::MissingConfig(format!(
            "acquirer cost must be >= 0, got {}",
            params.acquirer_cost
        )));
    }
    if params.affiliate_rate < Decimal::ZERO {
        return Err(LedgerError::MissingConfig(format!(
            "affiliate rate must be >= 0, got {}",
            params.affiliate_rate
        )));
    }

    let fee = round_centavos(params.fee.max(Decimal::ZERO));
    let affiliate_carve_out = if params.has_affiliate {
        round_centavos(params.affiliate_rate)
    } else {
        Decimal::ZERO
    };
    let acquirer_cost = round_centavos(params.acquirer_cost);
    let platform_profit = (fee - acquirer_cost - affiliate_carve_out).max(Decimal::ZERO);

    Ok(WithdrawalFeeBreakdown {
        fee,
        net_to_customer: amount,
        total_debit: amount + fee,
        affiliate_carve_out,
        acquirer_cost,
        platform_profit,
    })
}
