use hostevm_common::types::{ExecutionConfig, Message, TxConfig};
use hostevm_storage::CacheStore;

use crate::{EvmError, ExecutionResult, hooks::HookContext, tracers::Tracer};

/// The bytecode interpreter as seen by the query engine.
///
/// Implementations read and write through `state` only; whether those writes survive is
/// decided by the caller, which owns the overlay. `commit` tells the interpreter whether
/// the effects are meant to be kept, for modules that behave differently when simulating.
///
/// Emitted logs must be tagged with `tx_config`: the i-th log of the message gets
/// `log_index = tx_config.log_index + i` plus the transaction hash/index and block hash.
///
/// Long running executions are expected to poll `tracer.stop_handle().is_stopped()` and
/// unwind once it is set.
pub trait MessageExecutor: Send + Sync {
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<ExecutionResult, EvmError>;
}
