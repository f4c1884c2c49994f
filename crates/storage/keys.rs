//! Keys of the state namespace shared by the interpreter and host modules.

use std::fmt;

use hostevm_common::{Address, H256};

/// A single state entry. Keys order by variant first, so entries of the same kind
/// (and the same account) are adjacent when iterating a change set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StateKey {
    Nonce(Address),
    Balance(Address),
    Code(Address),
    Storage(Address, H256),
    /// Raw entry owned by a host module, the system contract keeps its registry here
    Module { module: &'static str, key: Vec<u8> },
}

impl StateKey {
    pub fn module(module: &'static str, key: impl Into<Vec<u8>>) -> Self {
        Self::Module {
            module,
            key: key.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::Nonce(address) => write!(f, "nonce/{address:#x}"),
            StateKey::Balance(address) => write!(f, "balance/{address:#x}"),
            StateKey::Code(address) => write!(f, "code/{address:#x}"),
            StateKey::Storage(address, slot) => write!(f, "storage/{address:#x}/{slot:#x}"),
            StateKey::Module { module, key } => {
                write!(f, "{module}/0x")?;
                key.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
        }
    }
}
