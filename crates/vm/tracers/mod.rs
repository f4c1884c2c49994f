//! Execution tracers: observers the interpreter reports to while a message runs.
//!
//! The built-in set mirrors geth's: the struct logger (default), `callTracer`,
//! `4byteTracer` and `noopTracer`. Named tracers are created through
//! [`TracerDirectory`].

mod call_tracer;
mod directory;
mod four_byte;
mod logger;
mod noop;

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use hostevm_common::{Address, H256, U256, types::Log};
use serde::Serialize;

pub use call_tracer::{CallFrame, CallTracer, CallTracerConfig, CallTracerLog};
pub use directory::{TracerContext, TracerDirectory, TracerFactory};
pub use four_byte::FourByteTracer;
pub use logger::{LogConfig, StructLog, StructLogger};
pub use noop::NoopTracer;

pub const CALL_TRACER: &str = "callTracer";
pub const FOUR_BYTE_TRACER: &str = "4byteTracer";
pub const NOOP_TRACER: &str = "noopTracer";

#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    /// Tracing was interrupted through the tracer's [`StopHandle`].
    #[error("{0}")]
    Stopped(String),
    #[error("unknown tracer: {0}")]
    Unknown(String),
    #[error("Invalid tracer config: {0}")]
    InvalidConfig(String),
    #[error("Tracer has no result: {0}")]
    MissingResult(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Kind of call frame, serialized the way geth names the opcodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallType {
    #[default]
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
}

/// Snapshot of the interpreter right before an opcode executes.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo<'a> {
    pub pc: u64,
    /// Opcode mnemonic, e.g. `SSTORE`
    pub op: &'a str,
    pub gas: u64,
    pub cost: u64,
    pub depth: usize,
    pub refund: u64,
    /// Contract whose code is running
    pub contract: Address,
    pub stack: &'a [U256],
    pub memory: &'a [u8],
    pub return_data: &'a [u8],
    /// Slot and value touched by `SLOAD`/`SSTORE`
    pub storage: Option<(H256, H256)>,
    pub error: Option<&'a str>,
}

/// Cancellation flag shared between a tracer and whoever supervises the execution.
/// The first reason given wins.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    reason: Arc<OnceLock<String>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
    }

    pub fn is_stopped(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }
}

/// Observer of one message execution.
///
/// `capture_start`/`capture_end` bracket the top level call, `capture_enter`/
/// `capture_exit` every nested frame. All hooks default to no-ops.
pub trait Tracer: Send {
    fn capture_start(
        &mut self,
        _from: Address,
        _to: Address,
        _create: bool,
        _input: &Bytes,
        _gas: u64,
        _value: U256,
    ) {
    }

    fn capture_state(&mut self, _step: &StepInfo<'_>) {}

    fn capture_enter(
        &mut self,
        _call_type: CallType,
        _from: Address,
        _to: Address,
        _input: &Bytes,
        _gas: u64,
        _value: U256,
    ) {
    }

    fn capture_exit(&mut self, _output: &Bytes, _gas_used: u64, _error: Option<&str>) {}

    fn capture_log(&mut self, _log: &Log) {}

    fn capture_end(&mut self, _output: &Bytes, _gas_used: u64, _error: Option<&str>) {}

    fn stop_handle(&self) -> StopHandle;

    /// The trace in its JSON form, or the stop reason if the tracer was interrupted.
    fn result(&mut self) -> Result<serde_json::Value, TracerError>;
}

fn to_hex<T, S>(x: &T, s: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::LowerHex,
    S: serde::Serializer,
{
    s.serialize_str(&format!("0x{x:x}"))
}
