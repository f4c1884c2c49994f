// === Gas constants ===

/// Gas charged for any transaction before its payload runs.
pub const TX_GAS: u64 = 21_000;
/// Gas charged for a contract creation transaction before its payload runs.
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;
/// Gas per zero byte of transaction data.
pub const TX_DATA_ZERO_GAS: u64 = 4;
/// Gas per non-zero byte of transaction data (EIP-2028).
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;
pub const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

// === Fee market events ===

/// Event type emitted once per block by the fee market module.
pub const EVENT_TYPE_FEE_MARKET: &str = "fee_market";
/// Attribute of [`EVENT_TYPE_FEE_MARKET`] events holding the decimal base fee.
pub const ATTRIBUTE_KEY_BASE_FEE: &str = "base_fee";
