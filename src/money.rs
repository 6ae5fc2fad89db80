use rust_decimal::{Decimal, RoundingStrategy};

/// All monetary values in the gateway are BRL with centavo precision.
pub const MONEY_SCALE: u32 = 2;

/// Round to centavos, half away from zero.
pub fn round_centavos(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Percentage-of-amount share, rounded to centavos.
pub fn percent_of(amount: Decimal, percentage: Decimal) -> Decimal {
    round_centavos(amount * percentage / Decimal::ONE_HUNDRED)
}
