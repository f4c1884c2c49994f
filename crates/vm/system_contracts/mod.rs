//! Privileged contract living at a reserved address. Calls sent there never reach the
//! interpreter: they are decoded and routed to a fixed set of native handlers that
//! manage the chain's aspects (extension programs bound to contracts).

pub mod abi;
mod dispatcher;
mod handlers;
mod store;

use hostevm_common::{
    Address, H160,
    types::{ExecutionConfig, Message, TxConfig},
};
use hostevm_storage::{AccountReader, AccountWriter, CacheStore, error::StoreError};
use tracing::debug;

pub use abi::AbiError;
pub use dispatcher::{Handler, HandlerContext, RawCall, SystemContract};
pub use handlers::{HANDLER_BASE_GAS, MAX_BINDINGS, aspect_id};
pub use store::{ASPECT_MODULE, AspectBinding, AspectMeta, AspectStore, GasMeter, Property};

use crate::{
    EvmError, ExecutionResult, HookContext, MessageExecutor, OUT_OF_GAS, tracers::Tracer,
};

/// Address of the aspect system contract.
pub const SYSTEM_CONTRACT_ADDRESS: Address = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0xA2, 0x7E, 0x14,
]);

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("method {0} not found")]
    MethodNotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Abi(#[from] AbiError),
    #[error("out of gas")]
    OutOfGas,
    #[error("aspect code cannot be empty")]
    EmptyCode,
    #[error("aspect {0:#x} already exists")]
    AspectExists(Address),
    #[error("aspect {0:#x} not found")]
    AspectNotFound(Address),
    #[error("aspect {aspect_id:#x} has no version {version}")]
    VersionNotFound { aspect_id: Address, version: u64 },
    #[error("unauthorized caller {caller:#x}, expected {expected:#x}")]
    Unauthorized { caller: Address, expected: Address },
    #[error("aspect {aspect_id:#x} is already bound to {contract:#x}")]
    AlreadyBound { aspect_id: Address, contract: Address },
    #[error("aspect {aspect_id:#x} is not bound to {contract:#x}")]
    NotBound { aspect_id: Address, contract: Address },
    #[error("contract {0:#x} reached the binding limit")]
    BindingLimit(Address),
    #[error("corrupted aspect registry entry {0}")]
    Corrupted(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// [`MessageExecutor`] decorator that serves calls to [`SYSTEM_CONTRACT_ADDRESS`]
/// natively and forwards every other message to the wrapped interpreter.
pub struct SystemContractExecutor<E> {
    inner: E,
    contract: SystemContract,
}

impl<E: MessageExecutor> SystemContractExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            contract: SystemContract::new(),
        }
    }

    pub fn contract(&self) -> &SystemContract {
        &self.contract
    }

    fn execute_system_call(
        &self,
        state: &mut CacheStore<'_>,
        msg: &Message,
        tracer: &mut dyn Tracer,
        commit: bool,
    ) -> Result<ExecutionResult, EvmError> {
        let intrinsic_gas = msg.intrinsic_gas();
        if msg.gas_limit < intrinsic_gas {
            return Err(EvmError::IntrinsicGasTooLow {
                have: msg.gas_limit,
                want: intrinsic_gas,
            });
        }
        tracer.capture_start(
            msg.from,
            SYSTEM_CONTRACT_ADDRESS,
            false,
            &msg.data,
            msg.gas_limit,
            msg.value,
        );

        let (result, changes) = {
            let mut call_state = state.branch();
            let dispatched = self.contract.dispatch(
                msg,
                &mut call_state,
                msg.gas_limit - intrinsic_gas,
                commit,
            );
            match dispatched {
                Ok((output, remaining_gas)) => (
                    ExecutionResult::Success {
                        gas_used: msg.gas_limit - remaining_gas,
                        logs: Vec::new(),
                        output,
                    },
                    Some(call_state.into_changes()),
                ),
                Err(DispatchError::Store(err)) => return Err(EvmError::Store(err)),
                Err(DispatchError::OutOfGas) => (
                    ExecutionResult::Halt {
                        reason: OUT_OF_GAS.to_string(),
                        gas_used: msg.gas_limit,
                    },
                    None,
                ),
                Err(err) => {
                    debug!(%err, caller = ?msg.from, "System contract call reverted");
                    (
                        ExecutionResult::Revert {
                            gas_used: msg.gas_limit,
                            output: abi::encode_revert_reason(&err.to_string()),
                        },
                        None,
                    )
                }
            }
        };
        // a failed call keeps none of its writes
        if let Some(changes) = changes {
            state.apply(changes);
        }

        if commit {
            let nonce = state.nonce(msg.from)?;
            state.set_nonce(msg.from, nonce.saturating_add(1));
        }
        tracer.capture_end(&result.output(), result.gas_used(), result.vm_error());
        Ok(result)
    }
}

impl<E: MessageExecutor> MessageExecutor for SystemContractExecutor<E> {
    fn execute(
        &self,
        state: &mut CacheStore<'_>,
        hooks: &HookContext<'_>,
        msg: &Message,
        tracer: &mut dyn Tracer,
        commit: bool,
        cfg: &ExecutionConfig,
        tx_config: &TxConfig,
        custom_verification: bool,
    ) -> Result<ExecutionResult, EvmError> {
        if msg.to != Some(SYSTEM_CONTRACT_ADDRESS) {
            return self.inner.execute(
                state,
                hooks,
                msg,
                tracer,
                commit,
                cfg,
                tx_config,
                custom_verification,
            );
        }
        self.execute_system_call(state, msg, tracer, commit)
    }
}
