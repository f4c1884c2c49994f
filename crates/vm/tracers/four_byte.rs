use std::collections::BTreeMap;

use bytes::Bytes;
use hostevm_common::{Address, U256};

use super::{CallType, StopHandle, Tracer, TracerError};

/// Highest address of the precompiled contracts, calls to them are not counted.
const LAST_PRECOMPILE: u64 = 0x0a;

/// Counts the 4-byte selectors called during an execution, keyed as
/// `0x<selector>-<calldata size without selector>`.
#[derive(Debug, Default)]
pub struct FourByteTracer {
    ids: BTreeMap<String, u64>,
    stop: StopHandle,
}

impl FourByteTracer {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&mut self, to: Address, input: &Bytes) {
        if input.len() < 4 || is_precompile(to) {
            return;
        }
        let key = format!("0x{}-{}", hex::encode(&input[..4]), input.len() - 4);
        *self.ids.entry(key).or_default() += 1;
    }
}

fn is_precompile(address: Address) -> bool {
    address.as_bytes()[..12].iter().all(|byte| *byte == 0)
        && (1..=LAST_PRECOMPILE).contains(&address.to_low_u64_be())
}

impl Tracer for FourByteTracer {
    fn capture_start(
        &mut self,
        _from: Address,
        to: Address,
        create: bool,
        input: &Bytes,
        _gas: u64,
        _value: U256,
    ) {
        if !create {
            self.store(to, input);
        }
    }

    fn capture_enter(
        &mut self,
        call_type: CallType,
        _from: Address,
        to: Address,
        input: &Bytes,
        _gas: u64,
        _value: U256,
    ) {
        if self.stop.is_stopped() || matches!(call_type, CallType::Create | CallType::Create2) {
            return;
        }
        self.store(to, input);
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn result(&mut self) -> Result<serde_json::Value, TracerError> {
        if let Some(reason) = self.stop.reason() {
            return Err(TracerError::Stopped(reason.to_string()));
        }
        Ok(serde_json::to_value(&self.ids)?)
    }
}
