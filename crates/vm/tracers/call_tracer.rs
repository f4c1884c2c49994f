use bytes::Bytes;
use hostevm_common::{Address, H256, U256, types::Log};
use serde::{Deserialize, Serialize};

use super::{CallType, StopHandle, Tracer, TracerError, to_hex};
use crate::system_contracts::abi::decode_revert_reason;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallTracerConfig {
    /// Trace only the top call (a.k.a. the external transaction)
    pub only_top_call: bool,
    pub with_log: bool,
}

/// Call frame as reported by geth's `callTracer`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub from: Address,
    pub to: Address,
    #[serde(serialize_with = "to_hex")]
    pub value: U256,
    #[serde(serialize_with = "to_hex")]
    pub gas: u64,
    #[serde(serialize_with = "to_hex")]
    pub gas_used: u64,
    #[serde(serialize_with = "to_hex")]
    pub input: Bytes,
    #[serde(serialize_with = "to_hex")]
    pub output: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallFrame>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<CallTracerLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallTracerLog {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(serialize_with = "to_hex")]
    pub data: Bytes,
    /// Number of sub calls made by the frame before this log was emitted
    #[serde(serialize_with = "to_hex")]
    pub position: usize,
}

impl CallFrame {
    fn new(
        call_type: CallType,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: Bytes,
    ) -> Self {
        Self {
            call_type,
            from,
            to,
            value,
            gas,
            input,
            ..Default::default()
        }
    }

    fn process_output(&mut self, gas_used: u64, output: &Bytes, error: Option<&str>) {
        self.gas_used = gas_used;
        self.output = output.clone();
        self.error = error.map(str::to_string);
        if error.is_some() {
            self.revert_reason = decode_revert_reason(output);
        }
    }

    /// Logs of reverted frames never made it to the chain.
    fn clear_reverted_logs(&mut self) {
        if self.error.is_some() {
            self.logs.clear();
        }
        for subcall in &mut self.calls {
            subcall.clear_reverted_logs();
        }
    }
}

/// Tracks the call tree of a message. At the end of the execution only the top frame
/// is left on the stack.
#[derive(Debug, Default)]
pub struct CallTracer {
    callframes: Vec<CallFrame>,
    config: CallTracerConfig,
    finished: bool,
    stop: StopHandle,
}

impl CallTracer {
    pub fn new(config: CallTracerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    fn exit(&mut self, gas_used: u64, output: &Bytes, error: Option<&str>) {
        // the top frame stays on the stack until `capture_end`
        if self.callframes.len() < 2 {
            return;
        }
        let Some(mut frame) = self.callframes.pop() else {
            return;
        };
        frame.process_output(gas_used, output, error);
        if let Some(parent) = self.callframes.last_mut() {
            parent.calls.push(frame);
        }
    }
}

impl Tracer for CallTracer {
    fn capture_start(
        &mut self,
        from: Address,
        to: Address,
        create: bool,
        input: &Bytes,
        gas: u64,
        value: U256,
    ) {
        let call_type = if create {
            CallType::Create
        } else {
            CallType::Call
        };
        self.callframes = vec![CallFrame::new(
            call_type,
            from,
            to,
            value,
            gas,
            input.clone(),
        )];
        self.finished = false;
    }

    fn capture_enter(
        &mut self,
        call_type: CallType,
        from: Address,
        to: Address,
        input: &Bytes,
        gas: u64,
        value: U256,
    ) {
        if self.stop.is_stopped() || self.config.only_top_call || self.callframes.is_empty() {
            return;
        }
        self.callframes
            .push(CallFrame::new(call_type, from, to, value, gas, input.clone()));
    }

    fn capture_exit(&mut self, output: &Bytes, gas_used: u64, error: Option<&str>) {
        if self.config.only_top_call {
            return;
        }
        self.exit(gas_used, output, error);
    }

    fn capture_log(&mut self, log: &Log) {
        if !self.config.with_log || self.stop.is_stopped() {
            return;
        }
        if self.config.only_top_call && self.callframes.len() > 1 {
            return;
        }
        let Some(frame) = self.callframes.last_mut() else {
            return;
        };
        let log = CallTracerLog {
            address: log.address,
            topics: log.topics.clone(),
            data: log.data.clone(),
            position: frame.calls.len(),
        };
        frame.logs.push(log);
    }

    fn capture_end(&mut self, output: &Bytes, gas_used: u64, error: Option<&str>) {
        // frames left open by an interrupted execution are folded into their parents
        while self.callframes.len() > 1 {
            self.exit(0, &Bytes::new(), error);
        }
        if let Some(top) = self.callframes.last_mut() {
            top.process_output(gas_used, output, error);
            top.clear_reverted_logs();
        }
        self.finished = true;
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn result(&mut self) -> Result<serde_json::Value, TracerError> {
        if let Some(reason) = self.stop.reason() {
            return Err(TracerError::Stopped(reason.to_string()));
        }
        match self.callframes.first() {
            Some(top) if self.finished => Ok(serde_json::to_value(top)?),
            _ => Err(TracerError::MissingResult(
                "call tracer did not observe a complete execution".to_string(),
            )),
        }
    }
}
