pub use account::*;
pub use errors::*;
pub use requests::*;
pub use split::*;
pub use split_fsm::*;

pub mod account;
pub mod errors;
pub mod requests;
pub mod split;
pub mod split_fsm;
