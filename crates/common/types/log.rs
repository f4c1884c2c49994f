use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::serde_utils;

/// An EVM log tagged with its position inside the block it was emitted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "serde_utils::bytes")]
    pub data: Bytes,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub block_number: u64,
    pub block_hash: H256,
    pub transaction_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub transaction_index: u64,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub log_index: u64,
    #[serde(default)]
    pub removed: bool,
}

impl Log {
    pub fn new(address: Address, topics: Vec<H256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
            ..Default::default()
        }
    }
}
