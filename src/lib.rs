pub mod api;
pub mod audit;
pub mod balance_ledger;
pub mod configure;
pub mod deposit_fee;
pub mod fee_policy;
pub mod logger;
pub mod logging;
pub mod models;
pub mod money;
pub mod reconciler;
pub mod settlement;
pub mod split_engine;
pub mod store;
pub mod webhook_guard;
pub mod withdrawal_fee;
