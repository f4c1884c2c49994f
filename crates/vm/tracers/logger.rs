use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use hostevm_common::{Address, H256, U256};
use serde::Serialize;
use tracing::debug;

use super::{StepInfo, StopHandle, Tracer, TracerError};

/// Options of the default (opcode level) tracer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub enable_memory: bool,
    pub disable_stack: bool,
    pub disable_storage: bool,
    pub enable_return_data: bool,
    /// Print the captured output once the execution ends
    pub debug: bool,
    /// Maximum number of steps to record (0 = unlimited)
    pub limit: usize,
}

/// One executed opcode, serialized like geth's `structLogs` entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLog {
    pub pc: u64,
    pub op: String,
    pub gas: u64,
    pub gas_cost: u64,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "is_zero")]
    pub refund: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionSummary<'a> {
    gas: u64,
    failed: bool,
    return_value: String,
    struct_logs: &'a [StructLog],
}

/// Records every executed opcode along with the parts of the machine state enabled
/// in its [`LogConfig`].
#[derive(Debug, Default)]
pub struct StructLogger {
    config: LogConfig,
    logs: Vec<StructLog>,
    storage: HashMap<Address, BTreeMap<H256, H256>>,
    output: Bytes,
    gas_used: u64,
    error: Option<String>,
    stop: StopHandle,
}

impl StructLogger {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn struct_logs(&self) -> &[StructLog] {
        &self.logs
    }

    fn is_full(&self) -> bool {
        self.config.limit != 0 && self.logs.len() >= self.config.limit
    }
}

impl Tracer for StructLogger {
    fn capture_state(&mut self, step: &StepInfo<'_>) {
        if self.stop.is_stopped() || self.is_full() {
            return;
        }

        let stack = (!self.config.disable_stack).then(|| {
            step.stack
                .iter()
                .map(|value: &U256| format!("{value:#x}"))
                .collect()
        });
        let memory = self
            .config
            .enable_memory
            .then(|| step.memory.chunks(32).map(hex::encode).collect());
        let return_data = (self.config.enable_return_data && !step.return_data.is_empty())
            .then(|| format!("0x{}", hex::encode(step.return_data)));

        let mut storage = None;
        if !self.config.disable_storage && matches!(step.op, "SLOAD" | "SSTORE") {
            let contract_storage = self.storage.entry(step.contract).or_default();
            if let Some((slot, value)) = step.storage {
                contract_storage.insert(slot, value);
            }
            storage = Some(
                contract_storage
                    .iter()
                    .map(|(slot, value)| (hex::encode(slot), hex::encode(value)))
                    .collect(),
            );
        }

        self.logs.push(StructLog {
            pc: step.pc,
            op: step.op.to_string(),
            gas: step.gas,
            gas_cost: step.cost,
            depth: step.depth,
            error: step.error.map(str::to_string),
            stack,
            return_data,
            memory,
            storage,
            refund: step.refund,
        });
    }

    fn capture_end(&mut self, output: &Bytes, gas_used: u64, error: Option<&str>) {
        self.output = output.clone();
        self.gas_used = gas_used;
        self.error = error.map(str::to_string);
        if self.config.debug {
            debug!(
                output = %hex::encode(output),
                gas_used,
                error = ?self.error,
                steps = self.logs.len(),
                "Struct logger finished"
            );
        }
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn result(&mut self) -> Result<serde_json::Value, TracerError> {
        if let Some(reason) = self.stop.reason() {
            return Err(TracerError::Stopped(reason.to_string()));
        }
        let summary = ExecutionSummary {
            gas: self.gas_used,
            failed: self.error.is_some(),
            return_value: hex::encode(&self.output),
            struct_logs: &self.logs,
        };
        Ok(serde_json::to_value(summary)?)
    }
}
