#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ChainIdError {
    #[error("chain-id '{0}' cannot be empty")]
    Empty(String),
    #[error("chain-id '{0}' does not conform to the required format <name>_<number>-<epoch>")]
    InvalidFormat(String),
    #[error("epoch number of chain-id '{0}' is not a valid integer")]
    InvalidEpoch(String),
    #[error("chain-id '{0}' has an invalid numeric identifier")]
    InvalidNumber(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("both gasPrice and (maxFeePerGas or maxPriorityFeePerGas) specified")]
    ConflictingFeeFields,
    #[error("maxFeePerGas ({fee_cap}) < maxPriorityFeePerGas ({tip_cap})")]
    TipAboveFeeCap { fee_cap: String, tip_cap: String },
    #[error("both data and input specified but they differ")]
    DataInputMismatch,
}
