use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::{
    TX_ACCESS_LIST_ADDRESS_GAS, TX_ACCESS_LIST_STORAGE_KEY_GAS, TX_DATA_NON_ZERO_GAS,
    TX_DATA_ZERO_GAS, TX_GAS, TX_GAS_CONTRACT_CREATION,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

pub type AccessList = Vec<AccessListEntry>;

/// A fully resolved execution request handed to the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub gas_fee_cap: U256,
    pub gas_tip_cap: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    /// Simulated messages skip nonce and balance checks.
    pub skip_account_checks: bool,
}

impl Message {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    pub fn with_gas_limit(&self, gas_limit: u64) -> Self {
        Self {
            gas_limit,
            ..self.clone()
        }
    }

    pub fn intrinsic_gas(&self) -> u64 {
        intrinsic_gas(&self.data, &self.access_list, self.is_create())
    }
}

/// Gas charged before any opcode runs: base cost, calldata bytes and access list entries.
pub fn intrinsic_gas(data: &[u8], access_list: &[AccessListEntry], is_create: bool) -> u64 {
    let base = if is_create {
        TX_GAS_CONTRACT_CREATION
    } else {
        TX_GAS
    };
    let data_gas = data.iter().fold(0u64, |acc, byte| {
        let cost = if *byte == 0 {
            TX_DATA_ZERO_GAS
        } else {
            TX_DATA_NON_ZERO_GAS
        };
        acc.saturating_add(cost)
    });
    let access_list_gas = access_list.iter().fold(0u64, |acc, entry| {
        acc.saturating_add(TX_ACCESS_LIST_ADDRESS_GAS).saturating_add(
            TX_ACCESS_LIST_STORAGE_KEY_GAS.saturating_mul(entry.storage_keys.len() as u64),
        )
    });
    base.saturating_add(data_gas).saturating_add(access_list_gas)
}
