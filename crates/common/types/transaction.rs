use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use super::{AccessList, Message};
use crate::serde_utils;

/// A transaction delivered by the host chain. The sender has already been recovered
/// (or authenticated through custom verification) by the time it reaches us.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: H256,
    #[serde(rename = "from")]
    pub sender: Address,
    pub to: Option<Address>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub nonce: u64,
    pub value: U256,
    #[serde(rename = "gas", with = "serde_utils::u64::hex_str")]
    pub gas_limit: u64,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(rename = "input", with = "serde_utils::bytes")]
    pub data: Bytes,
    #[serde(default)]
    pub access_list: AccessList,
    #[serde(default, with = "serde_utils::bytes")]
    pub validation_data: Bytes,
}

impl Transaction {
    pub fn has_custom_verification(&self) -> bool {
        !self.validation_data.is_empty()
    }

    /// Effective gas price under `base_fee`: legacy transactions pay their gas price,
    /// fee market ones pay `min(tip + base_fee, fee_cap)`.
    pub fn effective_gas_price(&self, base_fee: Option<U256>) -> U256 {
        match (self.max_fee_per_gas, base_fee) {
            (Some(fee_cap), Some(base_fee)) => {
                let tip_cap = self.max_priority_fee_per_gas.unwrap_or_default();
                fee_cap.min(tip_cap.saturating_add(base_fee))
            }
            (Some(fee_cap), None) => fee_cap,
            (None, _) => self.gas_price.unwrap_or_default(),
        }
    }

    pub fn to_message(&self, base_fee: Option<U256>) -> Message {
        let gas_price = self.effective_gas_price(base_fee);
        Message {
            from: self.sender,
            to: self.to,
            nonce: self.nonce,
            value: self.value,
            gas_limit: self.gas_limit,
            gas_price,
            gas_fee_cap: self.max_fee_per_gas.unwrap_or(gas_price),
            gas_tip_cap: self.max_priority_fee_per_gas.unwrap_or(gas_price),
            data: self.data.clone(),
            access_list: self.access_list.clone(),
            skip_account_checks: false,
        }
    }
}
