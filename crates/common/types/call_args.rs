use bytes::Bytes;
use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{AccessList, Message};
use crate::{errors::MessageError, serde_utils};

/// Arguments of `eth_call`/`eth_estimateGas` as sent by Ethereum tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionArgs {
    pub from: Option<Address>,
    pub to: Option<Address>,
    #[serde(with = "serde_utils::u64::hex_str_opt")]
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub value: Option<U256>,
    #[serde(with = "serde_utils::u64::hex_str_opt")]
    pub nonce: Option<u64>,
    #[serde(with = "serde_utils::bytes::opt")]
    pub data: Option<Bytes>,
    #[serde(with = "serde_utils::bytes::opt")]
    pub input: Option<Bytes>,
    pub access_list: Option<AccessList>,
    pub chain_id: Option<U256>,
    /// Extension-defined verification payload; present on transactions whose sender is
    /// authenticated by a contract instead of a signature.
    #[serde(with = "serde_utils::bytes::opt")]
    pub validation_data: Option<Bytes>,
}

impl TransactionArgs {
    pub fn from(&self) -> Address {
        self.from.unwrap_or_default()
    }

    /// Calldata, preferring `input` over the legacy `data` field.
    pub fn data(&self) -> Result<Bytes, MessageError> {
        match (&self.input, &self.data) {
            (Some(input), Some(data)) if input != data => Err(MessageError::DataInputMismatch),
            (Some(input), _) => Ok(input.clone()),
            (None, Some(data)) => Ok(data.clone()),
            (None, None) => Ok(Bytes::new()),
        }
    }

    pub fn has_custom_verification(&self) -> bool {
        self.validation_data
            .as_ref()
            .is_some_and(|data| !data.is_empty())
    }

    /// Builds the simulated message. Gas defaults to (and is capped by) `global_gas_cap`
    /// when it is non zero. Pricing follows the fee market when a base fee is given.
    pub fn to_message(
        &self,
        global_gas_cap: u64,
        base_fee: Option<U256>,
    ) -> Result<Message, MessageError> {
        if self.gas_price.is_some()
            && (self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some())
        {
            return Err(MessageError::ConflictingFeeFields);
        }
        if let (Some(fee_cap), Some(tip_cap)) =
            (self.max_fee_per_gas, self.max_priority_fee_per_gas)
        {
            if fee_cap < tip_cap {
                return Err(MessageError::TipAboveFeeCap {
                    fee_cap: fee_cap.to_string(),
                    tip_cap: tip_cap.to_string(),
                });
            }
        }

        let mut gas_limit = match self.gas {
            Some(gas) => gas,
            None if global_gas_cap != 0 => global_gas_cap,
            None => u64::MAX / 2,
        };
        if global_gas_cap != 0 && global_gas_cap < gas_limit {
            warn!(requested = gas_limit, cap = global_gas_cap, "Caller gas above allowance, capping");
            gas_limit = global_gas_cap;
        }

        let (gas_price, gas_fee_cap, gas_tip_cap) = match base_fee {
            None => {
                let gas_price = self.gas_price.unwrap_or_default();
                (gas_price, gas_price, gas_price)
            }
            Some(base_fee) => match self.gas_price {
                Some(gas_price) => (gas_price, gas_price, gas_price),
                None => {
                    let fee_cap = self.max_fee_per_gas.unwrap_or_default();
                    let tip_cap = self.max_priority_fee_per_gas.unwrap_or_default();
                    // zero pricing stays zero so that simulations need no balance
                    let gas_price = if fee_cap.is_zero() && tip_cap.is_zero() {
                        U256::zero()
                    } else {
                        fee_cap.min(tip_cap.saturating_add(base_fee))
                    };
                    (gas_price, fee_cap, tip_cap)
                }
            },
        };

        Ok(Message {
            from: self.from(),
            to: self.to,
            nonce: self.nonce.unwrap_or_default(),
            value: self.value.unwrap_or_default(),
            gas_limit,
            gas_price,
            gas_fee_cap,
            gas_tip_cap,
            data: self.data()?,
            access_list: self.access_list.clone().unwrap_or_default(),
            skip_account_checks: true,
        })
    }
}
