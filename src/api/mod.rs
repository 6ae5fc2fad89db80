pub mod query;
pub mod split_admin;

pub use query::*;
pub use split_admin::*;
