use ethereum_types::{Address, H256, U256};

use super::{BlockNumber, ChainConfig, Fork};

/// Everything the interpreter needs to know about the block a message runs in.
/// Resolved once per call, never cached across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub chain_config: ChainConfig,
    pub chain_id: u64,
    /// `None` before the fee market activates
    pub base_fee: Option<U256>,
    pub coinbase: Address,
    pub height: BlockNumber,
    /// Block timestamp, 0 when the caller does not know it
    pub time: u64,
}

impl ExecutionConfig {
    pub fn fork(&self) -> Fork {
        self.chain_config.fork(self.height)
    }
}

/// Position of the transaction being executed inside its block. Threaded through a
/// trace session so that logs keep block-wide indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxConfig {
    pub block_hash: H256,
    pub tx_hash: H256,
    pub tx_index: u64,
    pub log_index: u64,
}

impl TxConfig {
    pub fn empty(block_hash: H256) -> Self {
        Self {
            block_hash,
            ..Default::default()
        }
    }

    pub fn for_tx(self, tx_hash: H256, tx_index: u64) -> Self {
        Self {
            tx_hash,
            tx_index,
            ..self
        }
    }
}
