use hostevm_common::types::{ExecutionConfig, Message, TxConfig};
use tracing::trace;

use crate::EvmError;

pub type ContextId = u64;

/// What a hook context is bound to: one message and the block it executes in.
#[derive(Debug, Clone, Copy)]
pub struct HookBinding<'c> {
    pub msg: &'c Message,
    pub cfg: &'c ExecutionConfig,
    pub tx_config: &'c TxConfig,
    pub commit: bool,
}

/// Extension runtime consulted by the interpreter at its join points. A context is
/// opened right before a message executes and closed once it is done with.
pub trait HookRuntime: Send + Sync {
    fn open(&self, binding: &HookBinding<'_>) -> Result<ContextId, EvmError>;
    fn close(&self, id: ContextId);
}

/// Runtime for hosts without extensions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHookRuntime;

impl HookRuntime for NoopHookRuntime {
    fn open(&self, _binding: &HookBinding<'_>) -> Result<ContextId, EvmError> {
        Ok(0)
    }

    fn close(&self, _id: ContextId) {}
}

/// Live hook context of one message execution. Closed on drop, whatever way the
/// execution ends.
pub struct HookContext<'r> {
    runtime: &'r dyn HookRuntime,
    id: ContextId,
    commit: bool,
}

impl<'r> HookContext<'r> {
    pub fn open(runtime: &'r dyn HookRuntime, binding: &HookBinding<'_>) -> Result<Self, EvmError> {
        let id = runtime.open(binding)?;
        trace!(
            id,
            commit = binding.commit,
            height = binding.cfg.height,
            tx_index = binding.tx_config.tx_index,
            "Opened hook context"
        );
        Ok(Self {
            runtime,
            id,
            commit: binding.commit,
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn is_commit(&self) -> bool {
        self.commit
    }
}

impl Drop for HookContext<'_> {
    fn drop(&mut self) {
        self.runtime.close(self.id);
        trace!(id = self.id, "Closed hook context");
    }
}
