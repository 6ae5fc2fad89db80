//! Resolves which pricing policy applies to an account and operation.
//!
//! Layering, first match wins:
//! 1. account custom fees + flexible pricing -> per-account tier params
//! 2. account custom fees -> per-account flat percentage + surcharge
//! 3. global flexible pricing -> global tier params
//! 4. global flat percentage + surcharge
//!
//! Account overrides fall back to the global snapshot field by field.
//! The account row is re-read from the store on every call: the caller's
//! in-memory copy may be stale relative to a concurrent admin edit.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::configure::FeeSettings;
use crate::models::{Account, LedgerError};
use crate::store::GatewayStore;

/// Parameters the DepositFeeEngine computes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositFeeParams {
    Flexible {
        min_threshold: Decimal,
        low_tier_fee: Decimal,
        high_tier_percent: Decimal,
    },
    Flat {
        percent: Decimal,
        fixed: Decimal,
    },
}

/// Parameters the WithdrawalFeeEngine computes from. Withdrawal pricing
/// has no tiering: one flat fee, account override first.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalFeeParams {
    pub fee: Decimal,
    pub acquirer_cost: Decimal,
    pub affiliate_rate: Decimal,
    pub has_affiliate: bool,
}

pub struct FeePolicyResolver {
    store: Arc<GatewayStore>,
}

impl FeePolicyResolver {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    pub fn resolve_deposit(
        &self,
        account_id: u64,
        settings: &FeeSettings,
    ) -> Result<DepositFeeParams, LedgerError> {
        let account = self.store.require_account(account_id)?;
        Ok(Self::deposit_params(&account, settings))
    }

    pub fn resolve_withdrawal(
        &self,
        account_id: u64,
        settings: &FeeSettings,
    ) -> Result<WithdrawalFeeParams, LedgerError> {
        let account = self.store.require_account(account_id)?;
        Ok(Self::withdrawal_params(&account, settings))
    }

    /// Pure resolution over an (account, settings) snapshot.
    pub fn deposit_params(account: &Account, settings: &FeeSettings) -> DepositFeeParams {
        if account.custom_fees_enabled && account.flexible_pricing_enabled {
            return DepositFeeParams::Flexible {
                min_threshold: account
                    .flexible_min_threshold
                    .unwrap_or(settings.flexible_min_threshold),
                low_tier_fee: account
                    .flexible_low_tier_fee
                    .unwrap_or(settings.flexible_low_tier_fee),
                high_tier_percent: account
                    .flexible_high_tier_percent
                    .unwrap_or(settings.flexible_high_tier_percent),
            };
        }

        if account.custom_fees_enabled {
            return DepositFeeParams::Flat {
                percent: account.deposit_fee_percent.unwrap_or(settings.deposit_fee_percent),
                fixed: account.deposit_fee_fixed.unwrap_or(settings.deposit_fee_fixed),
            };
        }

        if settings.flexible_pricing_enabled {
            return DepositFeeParams::Flexible {
                min_threshold: settings.flexible_min_threshold,
                low_tier_fee: settings.flexible_low_tier_fee,
                high_tier_percent: settings.flexible_high_tier_percent,
            };
        }

        DepositFeeParams::Flat {
            percent: settings.deposit_fee_percent,
            fixed: settings.deposit_fee_fixed,
        }
    }

    pub fn withdrawal_params(account: &Account, settings: &FeeSettings) -> WithdrawalFeeParams {
        WithdrawalFeeParams {
            fee: account.withdrawal_fee.unwrap_or(settings.withdrawal_fee),
            acquirer_cost: settings.acquirer_cost,
            affiliate_rate: settings.affiliate_rate,
            has_affiliate: account.has_affiliate(),
        }
    }

    /// Manager commission percentage, when the account has a manager.
    pub fn manager_percent(account: &Account, settings: &FeeSettings) -> Option<Decimal> {
        account
            .manager_id
            .map(|_| account.manager_percent.unwrap_or(settings.manager_percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> FeeSettings {
        FeeSettings {
            version: 1,
            deposit_fee_percent: dec!(4.00),
            deposit_fee_fixed: dec!(0.00),
            flexible_pricing_enabled: false,
            flexible_min_threshold: dec!(15.00),
            flexible_low_tier_fee: dec!(1.00),
            flexible_high_tier_percent: dec!(4.00),
            withdrawal_fee: dec!(1.00),
            acquirer_cost: dec!(0.02),
            affiliate_rate: dec!(0.50),
            manager_percent: dec!(10.00),
        }
    }

    #[test]
    fn test_default_is_global_flat() {
        let account = Account::new(1, "Loja", "12345678901");
        let params = FeePolicyResolver::deposit_params(&account, &settings());
        assert_eq!(params, DepositFeeParams::Flat { percent: dec!(4.00), fixed: dec!(0.00) });
    }

    #[test]
    fn test_global_flexible_beats_global_flat() {
        let account = Account::new(1, "Loja", "12345678901");
        let mut s = settings();
        s.flexible_pricing_enabled = true;
        let params = FeePolicyResolver::deposit_params(&account, &s);
        assert_eq!(
            params,
            DepositFeeParams::Flexible {
                min_threshold: dec!(15.00),
                low_tier_fee: dec!(1.00),
                high_tier_percent: dec!(4.00),
            }
        );
    }

    #[test]
    fn test_account_flat_override() {
        let mut account = Account::new(1, "Loja", "12345678901");
        account.custom_fees_enabled = true;
        account.deposit_fee_percent = Some(dec!(2.50));
        // fixed surcharge falls back to global
        let params = FeePolicyResolver::deposit_params(&account, &settings());
        assert_eq!(params, DepositFeeParams::Flat { percent: dec!(2.50), fixed: dec!(0.00) });
    }

    #[test]
    fn test_account_flat_override_wins_over_global_flexible() {
        let mut account = Account::new(1, "Loja", "12345678901");
        account.custom_fees_enabled = true;
        let mut s = settings();
        s.flexible_pricing_enabled = true;
        let params = FeePolicyResolver::deposit_params(&account, &s);
        assert!(matches!(params, DepositFeeParams::Flat { .. }));
    }

    #[test]
    fn test_account_flexible_with_field_fallback() {
        let mut account = Account::new(1, "Loja", "12345678901");
        account.custom_fees_enabled = true;
        account.flexible_pricing_enabled = true;
        account.flexible_high_tier_percent = Some(dec!(3.00));
        // threshold and low tier fee fall back to global
        let params = FeePolicyResolver::deposit_params(&account, &settings());
        assert_eq!(
            params,
            DepositFeeParams::Flexible {
                min_threshold: dec!(15.00),
                low_tier_fee: dec!(1.00),
                high_tier_percent: dec!(3.00),
            }
        );
    }

    #[test]
    fn test_withdrawal_override_and_affiliate() {
        let mut account = Account::new(1, "Loja", "12345678901");
        let params = FeePolicyResolver::withdrawal_params(&account, &settings());
        assert_eq!(params.fee, dec!(1.00));
        assert!(!params.has_affiliate);

        account.withdrawal_fee = Some(dec!(2.00));
        account.affiliate_id = Some(55);
        let params = FeePolicyResolver::withdrawal_params(&account, &settings());
        assert_eq!(params.fee, dec!(2.00));
        assert!(params.has_affiliate);
        assert_eq!(params.affiliate_rate, dec!(0.50));
    }

    #[test]
    fn test_manager_percent_resolution() {
        let mut account = Account::new(1, "Loja", "12345678901");
        assert_eq!(FeePolicyResolver::manager_percent(&account, &settings()), None);

        account.manager_id = Some(77);
        assert_eq!(
            FeePolicyResolver::manager_percent(&account, &settings()),
            Some(dec!(10.00))
        );

        account.manager_percent = Some(dec!(15.00));
        assert_eq!(
            FeePolicyResolver::manager_percent(&account, &settings()),
            Some(dec!(15.00))
        );
    }

    #[test]
    fn test_resolver_rereads_account() {
        let store = Arc::new(GatewayStore::open_temporary().unwrap());
        let mut account = Account::new(1, "Loja", "12345678901");
        store.put_account(&account).unwrap();
        let resolver = FeePolicyResolver::new(store.clone());

        // Admin edit lands after the caller grabbed its copy.
        account.custom_fees_enabled = true;
        account.deposit_fee_percent = Some(dec!(9.00));
        store.put_account(&account).unwrap();

        let params = resolver.resolve_deposit(1, &settings()).unwrap();
        assert_eq!(params, DepositFeeParams::Flat { percent: dec!(9.00), fixed: dec!(0.00) });
    }
}
