mod call_args;
mod chain_config;
mod event;
mod execution_config;
mod log;
mod message;
mod trace_config;
mod transaction;

pub use call_args::*;
pub use chain_config::*;
pub use event::*;
pub use execution_config::*;
pub use log::*;
pub use message::*;
pub use trace_config::*;
pub use transaction::*;

pub type BlockNumber = u64;
pub type BlockHash = crate::H256;
pub type Index = u64;
