use hostevm_common::{
    Address, H256, U256,
    types::{BlockNumber, ChainConfig, Event},
};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// Height scoped parameters reported by the host chain for its EVM module.
pub trait ChainParams: Send + Sync {
    /// Host chain id string, e.g. `hostevm_11820-1`
    fn chain_id(&self) -> String;

    fn chain_config(&self, height: BlockNumber) -> Result<ChainConfig, HostError>;

    /// Base fee recorded by the fee market module. `None` when the module has nothing
    /// for this height (not activated yet, or the state was pruned).
    fn base_fee(&self, height: BlockNumber) -> Result<Option<U256>, HostError>;

    /// Events emitted while finalizing the block at `height`, in emission order.
    fn block_events(&self, height: BlockNumber) -> Vec<Event>;

    /// 0 when the host does not enforce a block gas limit.
    fn block_gas_limit(&self, height: BlockNumber) -> u64;

    fn proposer(&self, height: BlockNumber) -> Address;

    fn header_hash(&self, height: BlockNumber) -> H256;
}
