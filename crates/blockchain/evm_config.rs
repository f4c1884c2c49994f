use hostevm_common::{
    Address, U256,
    constants::{ATTRIBUTE_KEY_BASE_FEE, EVENT_TYPE_FEE_MARKET},
    types::{BlockNumber, Event, ExecutionConfig},
    utils::parse_chain_id,
};
use tracing::debug;

use crate::{error::QueryError, host::ChainParams};

/// Builds the configuration a message executes with at `height`.
///
/// `proposer` defaults to the block proposer reported by the host. A missing or zero
/// `chain_id` is derived from the host chain id string.
pub fn resolve_execution_config(
    host: &dyn ChainParams,
    height: BlockNumber,
    proposer: Option<Address>,
    chain_id: Option<u64>,
) -> Result<ExecutionConfig, QueryError> {
    let chain_config = host.chain_config(height).map_err(|err| {
        QueryError::Resolution(format!("failed to load chain config at height {height}: {err}"))
    })?;
    let chain_id = resolve_chain_id(host, chain_id)?;
    Ok(ExecutionConfig {
        chain_config,
        chain_id,
        base_fee: resolve_base_fee(host, height),
        coinbase: proposer.unwrap_or_else(|| host.proposer(height)),
        height,
        time: 0,
    })
}

pub fn resolve_chain_id(host: &dyn ChainParams, chain_id: Option<u64>) -> Result<u64, QueryError> {
    match chain_id {
        Some(chain_id) if chain_id != 0 => Ok(chain_id),
        _ => Ok(parse_chain_id(&host.chain_id())?),
    }
}

/// Base fee at `height`: the fee market's own record when there is one, otherwise the
/// value announced in the block events. `None` means the fee market is not active.
pub fn resolve_base_fee(host: &dyn ChainParams, height: BlockNumber) -> Option<U256> {
    match host.base_fee(height) {
        Ok(Some(base_fee)) => return Some(base_fee),
        Ok(None) => {}
        Err(err) => debug!(height, %err, "Base fee query failed, falling back to block events"),
    }
    base_fee_from_events(&host.block_events(height))
}

/// Reads the base fee announced by the most recent fee market event.
pub fn base_fee_from_events(events: &[Event]) -> Option<U256> {
    // only the latest fee market event counts, even when its value is malformed
    let event = events
        .iter()
        .rev()
        .find(|event| event.kind == EVENT_TYPE_FEE_MARKET)?;
    let value = event.attribute(ATTRIBUTE_KEY_BASE_FEE)?;
    U256::from_dec_str(value).ok()
}
