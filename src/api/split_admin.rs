//! Admin CRUD for split configurations.
//!
//! All validation happens before any row mutation: a rejected request
//! leaves the store untouched.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::logging::now_ms;
use crate::models::{FeeType, LedgerError, SplitConfig};
use crate::store::GatewayStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSplitConfigRequest {
    pub payer_account_id: u64,
    pub beneficiary_account_id: u64,
    pub percentage: Decimal,
    pub fee_type: FeeType,
    pub valid_from: Option<i64>,
    pub valid_until: Option<i64>,
}

pub struct SplitConfigAdmin {
    store: Arc<GatewayStore>,
}

impl SplitConfigAdmin {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, req: &CreateSplitConfigRequest) -> Result<SplitConfig, LedgerError> {
        self.validate(req)?;

        let config = SplitConfig {
            id: self.store.next_id()?,
            payer_account_id: req.payer_account_id,
            beneficiary_account_id: req.beneficiary_account_id,
            percentage: req.percentage,
            fee_type: req.fee_type,
            active: true,
            valid_from: req.valid_from,
            valid_until: req.valid_until,
            created_at: now_ms(),
        };
        self.store.put_split_config(&config)?;
        Ok(config)
    }

    pub fn update_percentage(
        &self,
        config_id: u64,
        percentage: Decimal,
    ) -> Result<SplitConfig, LedgerError> {
        validate_percentage(percentage)?;
        let mut config = self
            .store
            .get_split_config(config_id)?
            .ok_or(LedgerError::SplitConfigNotFound(config_id))?;
        config.percentage = percentage;
        self.store.put_split_config(&config)?;
        Ok(config)
    }

    pub fn deactivate(&self, config_id: u64) -> Result<SplitConfig, LedgerError> {
        let mut config = self
            .store
            .get_split_config(config_id)?
            .ok_or(LedgerError::SplitConfigNotFound(config_id))?;
        config.active = false;
        self.store.put_split_config(&config)?;
        Ok(config)
    }

    /// Re-enable a previously deactivated config. Subject to the same
    /// one-active-config-per-tuple rule as creation.
    pub fn activate(&self, config_id: u64) -> Result<SplitConfig, LedgerError> {
        let mut config = self
            .store
            .get_split_config(config_id)?
            .ok_or(LedgerError::SplitConfigNotFound(config_id))?;

        let duplicate = self
            .store
            .list_configs_for(config.payer_account_id, config.fee_type)?
            .into_iter()
            .any(|c| {
                c.id != config.id
                    && c.active
                    && c.beneficiary_account_id == config.beneficiary_account_id
            });
        if duplicate {
            return Err(LedgerError::DuplicateSplitConfig {
                payer_id: config.payer_account_id,
                beneficiary_id: config.beneficiary_account_id,
                fee_type: config.fee_type.as_str().to_string(),
            });
        }

        config.active = true;
        self.store.put_split_config(&config)?;
        Ok(config)
    }

    pub fn list_for_payer(
        &self,
        payer_account_id: u64,
        fee_type: FeeType,
    ) -> Result<Vec<SplitConfig>, LedgerError> {
        self.store.list_configs_for(payer_account_id, fee_type)
    }

    fn validate(&self, req: &CreateSplitConfigRequest) -> Result<(), LedgerError> {
        if req.payer_account_id == req.beneficiary_account_id {
            return Err(LedgerError::SamePayerBeneficiary);
        }
        validate_percentage(req.percentage)?;
        self.store.require_account(req.payer_account_id)?;
        self.store.require_account(req.beneficiary_account_id)?;

        let duplicate = self
            .store
            .list_configs_for(req.payer_account_id, req.fee_type)?
            .into_iter()
            .any(|c| c.active && c.beneficiary_account_id == req.beneficiary_account_id);
        if duplicate {
            return Err(LedgerError::DuplicateSplitConfig {
                payer_id: req.payer_account_id,
                beneficiary_id: req.beneficiary_account_id,
                fee_type: req.fee_type.as_str().to_string(),
            });
        }
        Ok(())
    }
}

fn validate_percentage(percentage: Decimal) -> Result<(), LedgerError> {
    if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(LedgerError::InvalidPercentage(percentage));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use rust_decimal_macros::dec;

    fn admin_with_accounts() -> (Arc<GatewayStore>, SplitConfigAdmin) {
        let store = Arc::new(GatewayStore::open_temporary().unwrap());
        store.put_account(&Account::new(1, "Payer", "11111111111")).unwrap();
        store.put_account(&Account::new(2, "Beneficiary", "22222222222")).unwrap();
        let admin = SplitConfigAdmin::new(store.clone());
        (store, admin)
    }

    fn req(payer: u64, beneficiary: u64, pct: Decimal) -> CreateSplitConfigRequest {
        CreateSplitConfigRequest {
            payer_account_id: payer,
            beneficiary_account_id: beneficiary,
            percentage: pct,
            fee_type: FeeType::Deposit,
            valid_from: None,
            valid_until: None,
        }
    }

    #[test]
    fn test_create_and_list() {
        let (_, admin) = admin_with_accounts();
        let config = admin.create(&req(1, 2, dec!(30))).unwrap();
        assert!(config.active);
        assert_eq!(config.percentage, dec!(30));
        let listed = admin.list_for_payer(1, FeeType::Deposit).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_same_account_rejected() {
        let (_, admin) = admin_with_accounts();
        let err = admin.create(&req(1, 1, dec!(30))).unwrap_err();
        assert_eq!(err.error_code(), "SAME_PAYER_BENEFICIARY");
    }

    #[test]
    fn test_percentage_bounds() {
        let (_, admin) = admin_with_accounts();
        assert!(admin.create(&req(1, 2, dec!(0))).is_err());
        assert!(admin.create(&req(1, 2, dec!(-5))).is_err());
        assert!(admin.create(&req(1, 2, dec!(100.01))).is_err());
        // 100 is inclusive
        assert!(admin.create(&req(1, 2, dec!(100))).is_ok());
    }

    #[test]
    fn test_duplicate_active_tuple_rejected() {
        let (_, admin) = admin_with_accounts();
        admin.create(&req(1, 2, dec!(30))).unwrap();
        let err = admin.create(&req(1, 2, dec!(20))).unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_SPLIT_CONFIG");
    }

    #[test]
    fn test_deactivate_allows_new_config() {
        let (_, admin) = admin_with_accounts();
        let first = admin.create(&req(1, 2, dec!(30))).unwrap();
        admin.deactivate(first.id).unwrap();
        assert!(admin.create(&req(1, 2, dec!(20))).is_ok());

        // Re-activating the old one would create a duplicate tuple.
        let err = admin.activate(first.id).unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_SPLIT_CONFIG");
    }

    #[test]
    fn test_unknown_accounts_rejected_before_mutation() {
        let (store, admin) = admin_with_accounts();
        let err = admin.create(&req(1, 99, dec!(30))).unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");
        assert!(store.list_split_configs().unwrap().is_empty());
    }

    #[test]
    fn test_update_percentage() {
        let (_, admin) = admin_with_accounts();
        let config = admin.create(&req(1, 2, dec!(30))).unwrap();
        let updated = admin.update_percentage(config.id, dec!(45)).unwrap();
        assert_eq!(updated.percentage, dec!(45));
        assert!(admin.update_percentage(config.id, dec!(200)).is_err());
    }
}
