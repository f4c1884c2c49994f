pub mod error;
mod keys;
mod overlay;
mod state;
mod store;

pub use keys::StateKey;
pub use overlay::{CacheStore, ChangeSet, StateReader};
pub use state::{AccountReader, AccountWriter};
pub use store::{Snapshot, Store};
