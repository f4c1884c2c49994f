use hostevm_common::{Address, U256};
use hostevm_storage::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvmError {
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGasTooLow { have: u64, want: u64 },
    #[error("nonce too low: address {address:#x}, tx: {tx} state: {state}")]
    NonceTooLow { address: Address, tx: u64, state: u64 },
    #[error("nonce too high: address {address:#x}, tx: {tx} state: {state}")]
    NonceTooHigh { address: Address, tx: u64, state: u64 },
    #[error("insufficient funds for gas * price + value: address {address:#x} have {have} want {want}")]
    InsufficientFunds { address: Address, have: U256, want: U256 },
    #[error("Invalid Transaction: {0}")]
    Transaction(String),
    #[error("Hook error: {0}")]
    Hook(String),
    #[error("DB error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Custom(String),
}

impl EvmError {
    /// The transaction could not even pay for its intrinsic cost.
    pub fn is_intrinsic_gas_too_low(&self) -> bool {
        matches!(self, EvmError::IntrinsicGasTooLow { .. })
    }
}
