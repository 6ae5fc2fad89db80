//! Embedded persistence for the settlement core.
//!
//! One sled tree per logical table. Records are bincode-serialized serde
//! structs; all u64 keys are stored big-endian so range scans stay
//! ordered. Insert-if-absent and compare-and-swap come straight from
//! sled and back the idempotency and atomicity guarantees upstream.
//!
//! Decimal fields serialize as strings (rust_decimal's serde-str):
//! bincode is not self-describing and cannot drive the default
//! deserialize_any path.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, IVec, Tree};

use crate::models::{
    Account, DepositRequest, ManagerCommission, SettlementReceipt, SplitConfig, SplitExecution,
    SplitExecutionState, WithdrawalRequest,
};
use crate::models::{FeeType, LedgerError};

const TREE_ACCOUNTS: &str = "accounts";
const TREE_DEPOSITS: &str = "deposit_requests";
const TREE_WITHDRAWALS: &str = "withdrawal_requests";
const TREE_SPLIT_CONFIGS: &str = "split_configs";
const TREE_SPLIT_EXECUTIONS: &str = "split_executions";
const TREE_MANAGER_COMMISSIONS: &str = "manager_commissions";
const TREE_WEBHOOK_LOG: &str = "webhook_log";

pub struct GatewayStore {
    db: Db,
    accounts: Tree,
    deposits: Tree,
    withdrawals: Tree,
    split_configs: Tree,
    split_executions: Tree,
    manager_commissions: Tree,
    webhook_log: Tree,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    bincode::serialize(value).map_err(LedgerError::from)
}

fn decode<T: DeserializeOwned>(bytes: &IVec) -> Result<T, LedgerError> {
    bincode::deserialize(bytes).map_err(LedgerError::from)
}

fn exec_key(config_id: u64, transaction_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&config_id.to_be_bytes());
    key[8..].copy_from_slice(&transaction_id.to_be_bytes());
    key
}

impl GatewayStore {
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory store for tests.
    pub fn open_temporary() -> Result<Self, LedgerError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, LedgerError> {
        Ok(Self {
            accounts: db.open_tree(TREE_ACCOUNTS)?,
            deposits: db.open_tree(TREE_DEPOSITS)?,
            withdrawals: db.open_tree(TREE_WITHDRAWALS)?,
            split_configs: db.open_tree(TREE_SPLIT_CONFIGS)?,
            split_executions: db.open_tree(TREE_SPLIT_EXECUTIONS)?,
            manager_commissions: db.open_tree(TREE_MANAGER_COMMISSIONS)?,
            webhook_log: db.open_tree(TREE_WEBHOOK_LOG)?,
            db,
        })
    }

    /// Monotonic id for new records.
    pub fn next_id(&self) -> Result<u64, LedgerError> {
        Ok(self.db.generate_id()?)
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush()?;
        Ok(())
    }

    // ---------- accounts ----------

    pub fn put_account(&self, account: &Account) -> Result<(), LedgerError> {
        self.accounts.insert(account.id.to_be_bytes(), encode(account)?)?;
        Ok(())
    }

    pub fn get_account(&self, id: u64) -> Result<Option<Account>, LedgerError> {
        match self.accounts.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove_account(&self, id: u64) -> Result<(), LedgerError> {
        self.accounts.remove(id.to_be_bytes())?;
        Ok(())
    }

    pub fn require_account(&self, id: u64) -> Result<Account, LedgerError> {
        self.get_account(id)?.ok_or(LedgerError::AccountNotFound(id))
    }

    /// Swap the stored account iff it is still byte-identical to
    /// `expected`. `updated` is persisted with its version bumped.
    /// Returns false when another writer got there first.
    pub fn cas_account(
        &self,
        expected: &Account,
        updated: &mut Account,
    ) -> Result<bool, LedgerError> {
        updated.version = expected.version + 1;
        let old = encode(expected)?;
        let new = encode(updated)?;
        let result = self
            .accounts
            .compare_and_swap(expected.id.to_be_bytes(), Some(old), Some(new))?;
        Ok(result.is_ok())
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ---------- deposit requests ----------

    pub fn put_deposit(&self, deposit: &DepositRequest) -> Result<(), LedgerError> {
        self.deposits.insert(deposit.id.to_be_bytes(), encode(deposit)?)?;
        Ok(())
    }

    pub fn get_deposit(&self, id: u64) -> Result<Option<DepositRequest>, LedgerError> {
        match self.deposits.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_deposits_by_account(
        &self,
        account_id: u64,
    ) -> Result<Vec<DepositRequest>, LedgerError> {
        let mut out = Vec::new();
        for item in self.deposits.iter() {
            let (_, bytes) = item?;
            let dep: DepositRequest = decode(&bytes)?;
            if dep.account_id == account_id {
                out.push(dep);
            }
        }
        Ok(out)
    }

    // ---------- withdrawal requests ----------

    pub fn put_withdrawal(&self, withdrawal: &WithdrawalRequest) -> Result<(), LedgerError> {
        self.withdrawals.insert(withdrawal.id.to_be_bytes(), encode(withdrawal)?)?;
        Ok(())
    }

    pub fn get_withdrawal(&self, id: u64) -> Result<Option<WithdrawalRequest>, LedgerError> {
        match self.withdrawals.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_withdrawals_by_account(
        &self,
        account_id: u64,
    ) -> Result<Vec<WithdrawalRequest>, LedgerError> {
        let mut out = Vec::new();
        for item in self.withdrawals.iter() {
            let (_, bytes) = item?;
            let wd: WithdrawalRequest = decode(&bytes)?;
            if wd.account_id == account_id {
                out.push(wd);
            }
        }
        Ok(out)
    }

    // ---------- split configs ----------

    pub fn put_split_config(&self, config: &SplitConfig) -> Result<(), LedgerError> {
        self.split_configs.insert(config.id.to_be_bytes(), encode(config)?)?;
        Ok(())
    }

    pub fn get_split_config(&self, id: u64) -> Result<Option<SplitConfig>, LedgerError> {
        match self.split_configs.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_split_configs(&self) -> Result<Vec<SplitConfig>, LedgerError> {
        let mut out = Vec::new();
        for item in self.split_configs.iter() {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// All configs for a payer and fee type, active or not. Applicability
    /// at settlement time is the engine's call.
    pub fn list_configs_for(
        &self,
        payer_account_id: u64,
        fee_type: FeeType,
    ) -> Result<Vec<SplitConfig>, LedgerError> {
        let mut out: Vec<SplitConfig> = self
            .list_split_configs()?
            .into_iter()
            .filter(|c| c.payer_account_id == payer_account_id && c.fee_type == fee_type)
            .collect();
        out.sort_by_key(|c| c.id);
        Ok(out)
    }

    // ---------- split executions ----------

    /// Insert keyed by (config_id, transaction_id). Returns false when an
    /// execution already exists for that key; the no-duplicate-payout
    /// boundary.
    pub fn insert_split_execution_if_absent(
        &self,
        execution: &SplitExecution,
    ) -> Result<bool, LedgerError> {
        let key = exec_key(execution.config_id, execution.transaction_id);
        let result = self.split_executions.compare_and_swap(
            key,
            None as Option<&[u8]>,
            Some(encode(execution)?),
        )?;
        Ok(result.is_ok())
    }

    /// Overwrite an existing execution (status transitions only).
    pub fn put_split_execution(&self, execution: &SplitExecution) -> Result<(), LedgerError> {
        let key = exec_key(execution.config_id, execution.transaction_id);
        self.split_executions.insert(key, encode(execution)?)?;
        Ok(())
    }

    pub fn get_split_execution(
        &self,
        config_id: u64,
        transaction_id: u64,
    ) -> Result<Option<SplitExecution>, LedgerError> {
        match self.split_executions.get(exec_key(config_id, transaction_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_split_executions_by_beneficiary(
        &self,
        beneficiary_account_id: u64,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<SplitExecution>, LedgerError> {
        let mut out = Vec::new();
        for item in self.split_executions.iter() {
            let (_, bytes) = item?;
            let exec: SplitExecution = decode(&bytes)?;
            if exec.beneficiary_account_id == beneficiary_account_id
                && exec.created_at >= from_ms
                && exec.created_at <= to_ms
            {
                out.push(exec);
            }
        }
        out.sort_by_key(|e| e.created_at);
        Ok(out)
    }

    pub fn list_split_executions_by_transaction(
        &self,
        transaction_id: u64,
    ) -> Result<Vec<SplitExecution>, LedgerError> {
        let mut out = Vec::new();
        for item in self.split_executions.iter() {
            let (_, bytes) = item?;
            let exec: SplitExecution = decode(&bytes)?;
            if exec.transaction_id == transaction_id {
                out.push(exec);
            }
        }
        Ok(out)
    }

    pub fn list_failed_split_executions(&self) -> Result<Vec<SplitExecution>, LedgerError> {
        let mut out = Vec::new();
        for item in self.split_executions.iter() {
            let (_, bytes) = item?;
            let exec: SplitExecution = decode(&bytes)?;
            if exec.status == SplitExecutionState::Failed {
                out.push(exec);
            }
        }
        Ok(out)
    }

    pub fn list_all_split_executions(&self) -> Result<Vec<SplitExecution>, LedgerError> {
        let mut out = Vec::new();
        for item in self.split_executions.iter() {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ---------- manager commissions ----------

    /// 1:1 with the deposit; insert-if-absent keeps webhook replays from
    /// paying the manager twice.
    pub fn insert_manager_commission_if_absent(
        &self,
        commission: &ManagerCommission,
    ) -> Result<bool, LedgerError> {
        let result = self.manager_commissions.compare_and_swap(
            commission.deposit_id.to_be_bytes(),
            None as Option<&[u8]>,
            Some(encode(commission)?),
        )?;
        Ok(result.is_ok())
    }

    pub fn get_manager_commission(
        &self,
        deposit_id: u64,
    ) -> Result<Option<ManagerCommission>, LedgerError> {
        match self.manager_commissions.get(deposit_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ---------- webhook idempotency log ----------

    /// Record a provider event id with its settlement receipt. Returns
    /// false when the event was already processed.
    pub fn insert_webhook_if_absent(
        &self,
        provider_event_id: &str,
        receipt: &SettlementReceipt,
    ) -> Result<bool, LedgerError> {
        let result = self.webhook_log.compare_and_swap(
            provider_event_id.as_bytes(),
            None as Option<&[u8]>,
            Some(encode(receipt)?),
        )?;
        Ok(result.is_ok())
    }

    /// Release a claim whose settlement did not go through. The event id
    /// becomes claimable again by a later delivery.
    pub fn remove_webhook_claim(&self, provider_event_id: &str) -> Result<(), LedgerError> {
        self.webhook_log.remove(provider_event_id.as_bytes())?;
        Ok(())
    }

    /// Overwrite the receipt recorded for an event (finalizing a claim).
    pub fn put_webhook_receipt(
        &self,
        provider_event_id: &str,
        receipt: &SettlementReceipt,
    ) -> Result<(), LedgerError> {
        self.webhook_log.insert(provider_event_id.as_bytes(), encode(receipt)?)?;
        Ok(())
    }

    pub fn get_webhook_receipt(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<SettlementReceipt>, LedgerError> {
        match self.webhook_log.get(provider_event_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_round_trip() {
        let store = GatewayStore::open_temporary().unwrap();
        let mut acc = Account::new(1, "Loja", "12345678901");
        acc.balance = dec!(123.45);
        acc.pending_withdrawal = dec!(6.00);
        acc.deposit_fee_percent = Some(dec!(2.50));
        store.put_account(&acc).unwrap();
        let loaded = store.require_account(1).unwrap();
        assert_eq!(loaded.name, "Loja");
        assert_eq!(loaded.balance, dec!(123.45));
        assert_eq!(loaded.pending_withdrawal, dec!(6.00));
        assert_eq!(loaded.deposit_fee_percent, Some(dec!(2.50)));
        assert!(store.get_account(2).unwrap().is_none());
        assert!(matches!(
            store.require_account(2).unwrap_err(),
            LedgerError::AccountNotFound(2)
        ));
    }

    #[test]
    fn test_deposit_round_trip_with_fee_fields() {
        let store = GatewayStore::open_temporary().unwrap();
        let mut dep = DepositRequest::new(5, 1, dec!(0.50), 1_700_000_000_000);
        store.put_deposit(&dep).unwrap();
        let loaded = store.get_deposit(5).unwrap().unwrap();
        assert_eq!(loaded.amount, dec!(0.50));
        assert!(loaded.fee.is_none());

        dep.fee = Some(dec!(0.02));
        dep.net_amount = Some(dec!(0.48));
        store.put_deposit(&dep).unwrap();
        let loaded = store.get_deposit(5).unwrap().unwrap();
        assert_eq!(loaded.fee, Some(dec!(0.02)));
        assert_eq!(loaded.net_amount, Some(dec!(0.48)));
    }

    #[test]
    fn test_cas_detects_stale_writer() {
        let store = GatewayStore::open_temporary().unwrap();
        let acc = Account::new(1, "Loja", "12345678901");
        store.put_account(&acc).unwrap();

        let snapshot_a = store.require_account(1).unwrap();
        let snapshot_b = store.require_account(1).unwrap();

        let mut update_a = snapshot_a.clone();
        update_a.balance = dec!(10.00);
        assert!(store.cas_account(&snapshot_a, &mut update_a).unwrap());

        // B's snapshot is now stale; its CAS must fail.
        let mut update_b = snapshot_b.clone();
        update_b.balance = dec!(20.00);
        assert!(!store.cas_account(&snapshot_b, &mut update_b).unwrap());

        assert_eq!(store.require_account(1).unwrap().balance, dec!(10.00));
    }

    #[test]
    fn test_split_execution_insert_if_absent() {
        let store = GatewayStore::open_temporary().unwrap();
        let exec = SplitExecution {
            config_id: 7,
            transaction_id: 42,
            payer_account_id: 1,
            beneficiary_account_id: 2,
            fee_type: FeeType::Deposit,
            fee_amount: dec!(10.00),
            split_amount: dec!(3.00),
            percentage_applied: dec!(30),
            status: SplitExecutionState::Pending,
            failure_reason: None,
            created_at: 0,
        };
        assert!(store.insert_split_execution_if_absent(&exec).unwrap());
        assert!(!store.insert_split_execution_if_absent(&exec).unwrap());
        assert!(store.get_split_execution(7, 42).unwrap().is_some());
        assert!(store.get_split_execution(7, 43).unwrap().is_none());
    }
}
