mod errors;
mod execution_result;
mod executor;
mod hooks;

pub mod system_contracts;
pub mod tracers;

pub use errors::EvmError;
pub use execution_result::{EXECUTION_REVERTED, ExecutionResult, OUT_OF_GAS};
pub use executor::MessageExecutor;
pub use hooks::{ContextId, HookBinding, HookContext, HookRuntime, NoopHookRuntime};
