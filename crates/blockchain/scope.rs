use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
};

use hostevm_common::types::{ExecutionConfig, Message, TxConfig};
use hostevm_storage::{CacheStore, ChangeSet, StateReader};
use hostevm_vm::{
    ExecutionResult, HookBinding, HookContext, HookRuntime, MessageExecutor, tracers::Tracer,
};
use tracing::{error, trace};

use crate::error::QueryError;

/// Runs messages one at a time, each in its own overlay and hook context.
#[derive(Clone, Copy)]
pub struct ScopedExecution<'a> {
    executor: &'a dyn MessageExecutor,
    hooks: &'a dyn HookRuntime,
    cfg: &'a ExecutionConfig,
}

/// What an execution left behind.
#[derive(Debug)]
pub struct ScopeOutcome {
    pub result: ExecutionResult,
    /// Writes of a committing execution, to be applied by the caller onto the parent
    /// view. Always `None` for non-committing runs.
    pub changes: Option<ChangeSet>,
}

impl<'a> ScopedExecution<'a> {
    pub fn new(
        executor: &'a dyn MessageExecutor,
        hooks: &'a dyn HookRuntime,
        cfg: &'a ExecutionConfig,
    ) -> Self {
        Self {
            executor,
            hooks,
            cfg,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        self.cfg
    }

    /// Executes `msg` on a fresh overlay over `parent`.
    ///
    /// The overlay is dropped when this returns, so nothing leaks into `parent` unless
    /// the caller applies the returned changes. A panicking executor is reported as an
    /// internal error of this call only.
    pub fn run(
        &self,
        parent: &dyn StateReader,
        msg: &Message,
        tracer: &mut dyn Tracer,
        commit: bool,
        tx_config: &TxConfig,
        custom_verification: bool,
    ) -> Result<ScopeOutcome, QueryError> {
        let mut overlay = CacheStore::new(parent);
        let executed = catch_unwind(AssertUnwindSafe(|| {
            let binding = HookBinding {
                msg,
                cfg: self.cfg,
                tx_config,
                commit,
            };
            let hooks = HookContext::open(self.hooks, &binding)?;
            self.executor.execute(
                &mut overlay,
                &hooks,
                msg,
                tracer,
                commit,
                self.cfg,
                tx_config,
                custom_verification,
            )
        }));
        let result = match executed {
            Ok(result) => result?,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(tx_hash = %tx_config.tx_hash, %reason, "Execution panicked");
                return Err(QueryError::Internal(format!("execution panicked: {reason}")));
            }
        };
        trace!(
            gas_used = result.gas_used(),
            commit,
            dirty = overlay.is_dirty(),
            "Scoped execution finished"
        );
        let changes = commit.then(|| overlay.into_changes());
        Ok(ScopeOutcome { result, changes })
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        return reason.to_string();
    }
    if let Some(reason) = panic.downcast_ref::<String>() {
        return reason.clone();
    }
    "unknown panic".to_string()
}
