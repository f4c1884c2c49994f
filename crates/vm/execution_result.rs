use bytes::Bytes;
use hostevm_common::types::Log;

/// VM error reported for executions ended by the `REVERT` opcode.
pub const EXECUTION_REVERTED: &str = "execution reverted";
/// VM error reported when an execution runs out of gas.
pub const OUT_OF_GAS: &str = "out of gas";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success {
        gas_used: u64,
        logs: Vec<Log>,
        output: Bytes,
    },
    /// Reverted by `REVERT` opcode
    Revert { gas_used: u64, output: Bytes },
    /// Reverted for other reasons, spends all gas.
    Halt {
        reason: String,
        /// Halting will spend all the gas, which will be equal to gas_limit.
        gas_used: u64,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, ExecutionResult::Revert { .. })
    }

    pub fn is_out_of_gas(&self) -> bool {
        matches!(self, ExecutionResult::Halt { reason, .. } if reason == OUT_OF_GAS)
    }

    pub fn gas_used(&self) -> u64 {
        match self {
            ExecutionResult::Success { gas_used, .. } => *gas_used,
            ExecutionResult::Revert { gas_used, .. } => *gas_used,
            ExecutionResult::Halt { gas_used, .. } => *gas_used,
        }
    }

    pub fn logs(&self) -> &[Log] {
        match self {
            ExecutionResult::Success { logs, .. } => logs,
            _ => &[],
        }
    }

    pub fn output(&self) -> Bytes {
        match self {
            ExecutionResult::Success { output, .. } => output.clone(),
            ExecutionResult::Revert { output, .. } => output.clone(),
            ExecutionResult::Halt { .. } => Bytes::new(),
        }
    }

    /// Geth style VM error string, `None` when the execution succeeded.
    pub fn vm_error(&self) -> Option<&str> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Revert { .. } => Some(EXECUTION_REVERTED),
            ExecutionResult::Halt { reason, .. } => Some(reason),
        }
    }
}
