//! Synthetic collaborators used to drive the query engine without a real interpreter
//! or host chain.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use bytes::Bytes;
use hostevm_blockchain::{
    Simulator, SimulatorOptions,
    host::{ChainParams, HostError},
};
use hostevm_common::{
    Address, BigEndianHash, H256, U256,
    types::{BlockNumber, ChainConfig, Event, ExecutionConfig, Log, Message, Transaction, TxConfig},
};
use hostevm_storage::{AccountReader, AccountWriter, CacheStore, Store};
use hostevm_vm::{
    ContextId, EvmError, ExecutionResult, HookBinding, HookContext, HookRuntime, MessageExecutor,
    OUT_OF_GAS,
    system_contracts::abi::encode_revert_reason,
    tracers::{StopHandle, Tracer, TracerDirectory, TracerError},
};
use tracing_subscriber::EnvFilter;

pub const CHAIN_ID: u64 = 11820;
pub const HOST_CHAIN_ID: &str = "hostevm_11820-1";

/// What a [`ScriptedExecutor`] does with messages sent to a given address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Moves the message value to the recipient
    Transfer,
    /// Succeeds once the gas limit reaches the given amount, runs out of gas below it
    RequiresGas(u64),
    /// Always reverts with an `Error(string)` payload
    Revert(String),
    /// Succeeds emitting this many logs
    EmitLogs(usize),
    /// Adds one to slot 0 of the recipient and returns the new value
    Increment,
    /// Fails with an executor error
    Fail(String),
    Panic,
    /// Runs until its tracer is stopped
    Spin,
}

/// Interpreter stand-in whose outcome is scripted per recipient address. Unscripted
/// recipients get [`Behavior::Transfer`].
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    behaviors: HashMap<Address, Behavior>,
    executions: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: Address, behavior: Behavior) -> Self {
        self.behaviors.insert(address, behavior);
        self
    }

    /// Number of messages executed so far.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

fn success(gas_used: u64, logs: Vec<Log>, output: Bytes) -> ExecutionResult {
    ExecutionResult::Success {
        gas_used,
        logs,
        output,
    }
}

impl MessageExecutor for ScriptedExecutor {
    fn execute(
        &self,
        state: &mut CacheStore<'_>,
        _hooks: &HookContext<'_>,
        msg: &Message,
        tracer: &mut dyn Tracer,
        _commit: bool,
        cfg: &ExecutionConfig,
        tx_config: &TxConfig,
        _custom_verification: bool,
    ) -> Result<ExecutionResult, EvmError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let intrinsic_gas = msg.intrinsic_gas();
        if msg.gas_limit < intrinsic_gas {
            return Err(EvmError::IntrinsicGasTooLow {
                have: msg.gas_limit,
                want: intrinsic_gas,
            });
        }
        let to = msg.to.unwrap_or_default();
        tracer.capture_start(msg.from, to, msg.is_create(), &msg.data, msg.gas_limit, msg.value);
        let nonce = state.nonce(msg.from)?;
        state.set_nonce(msg.from, nonce + 1);

        let behavior = self
            .behaviors
            .get(&to)
            .cloned()
            .unwrap_or(Behavior::Transfer);
        let result = match behavior {
            Behavior::Transfer => {
                if !msg.value.is_zero() {
                    let sender_balance = state.balance(msg.from)?;
                    if sender_balance < msg.value {
                        return Err(EvmError::InsufficientFunds {
                            address: msg.from,
                            have: sender_balance,
                            want: msg.value,
                        });
                    }
                    let recipient_balance = state.balance(to)?;
                    state.set_balance(msg.from, sender_balance - msg.value);
                    state.set_balance(to, recipient_balance + msg.value);
                }
                success(intrinsic_gas, Vec::new(), Bytes::new())
            }
            Behavior::RequiresGas(gas) if msg.gas_limit >= gas => {
                success(gas, Vec::new(), Bytes::new())
            }
            Behavior::RequiresGas(_) => ExecutionResult::Halt {
                reason: OUT_OF_GAS.to_string(),
                gas_used: msg.gas_limit,
            },
            Behavior::Revert(reason) => ExecutionResult::Revert {
                gas_used: intrinsic_gas,
                output: encode_revert_reason(&reason),
            },
            Behavior::EmitLogs(count) => {
                let logs = (0..count as u64)
                    .map(|i| {
                        let log = Log {
                            block_number: cfg.height,
                            block_hash: tx_config.block_hash,
                            transaction_hash: tx_config.tx_hash,
                            transaction_index: tx_config.tx_index,
                            log_index: tx_config.log_index + i,
                            ..Log::new(to, vec![H256::from_low_u64_be(i)], Bytes::new())
                        };
                        tracer.capture_log(&log);
                        log
                    })
                    .collect();
                success(intrinsic_gas, logs, Bytes::new())
            }
            Behavior::Increment => {
                let value = state.storage(to, H256::zero())? + U256::one();
                state.set_storage(to, H256::zero(), value);
                let output = Bytes::copy_from_slice(H256::from_uint(&value).as_bytes());
                success(intrinsic_gas, Vec::new(), output)
            }
            Behavior::Fail(reason) => return Err(EvmError::Custom(reason)),
            Behavior::Panic => panic!("scripted interpreter panic"),
            Behavior::Spin => {
                let stop = tracer.stop_handle();
                let deadline = Instant::now() + Duration::from_secs(10);
                while !stop.is_stopped() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(1));
                }
                ExecutionResult::Halt {
                    reason: stop.reason().unwrap_or("spin deadline").to_string(),
                    gas_used: msg.gas_limit,
                }
            }
        };
        tracer.capture_end(&result.output(), result.gas_used(), result.vm_error());
        Ok(result)
    }
}

/// Host chain with the same parameters at every height.
#[derive(Debug, Clone)]
pub struct StaticChainParams {
    pub chain_id: String,
    pub chain_config: ChainConfig,
    pub base_fee: Option<U256>,
    pub events: Vec<Event>,
    pub block_gas_limit: u64,
    pub proposer: Address,
}

impl Default for StaticChainParams {
    fn default() -> Self {
        Self {
            chain_id: HOST_CHAIN_ID.to_string(),
            chain_config: ChainConfig::all_forks_at_genesis(CHAIN_ID),
            base_fee: None,
            events: Vec::new(),
            block_gas_limit: 0,
            proposer: Address::repeat_byte(0xc0),
        }
    }
}

impl ChainParams for StaticChainParams {
    fn chain_id(&self) -> String {
        self.chain_id.clone()
    }

    fn chain_config(&self, _height: BlockNumber) -> Result<ChainConfig, HostError> {
        Ok(self.chain_config.clone())
    }

    fn base_fee(&self, _height: BlockNumber) -> Result<Option<U256>, HostError> {
        Ok(self.base_fee)
    }

    fn block_events(&self, _height: BlockNumber) -> Vec<Event> {
        self.events.clone()
    }

    fn block_gas_limit(&self, _height: BlockNumber) -> u64 {
        self.block_gas_limit
    }

    fn proposer(&self, _height: BlockNumber) -> Address {
        self.proposer
    }

    fn header_hash(&self, height: BlockNumber) -> H256 {
        H256::from_low_u64_be(height)
    }
}

/// Block context a [`RecordingHookRuntime`] saw a hook context opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedContext {
    pub tx_hash: H256,
    pub block_hash: H256,
    pub tx_index: u64,
    pub height: BlockNumber,
    pub chain_id: u64,
    pub commit: bool,
}

/// Hook runtime that records the contexts it hands out and counts those it gets back.
#[derive(Debug, Default)]
pub struct RecordingHookRuntime {
    opened: Mutex<Vec<OpenedContext>>,
    closed: AtomicU64,
}

impl RecordingHookRuntime {
    pub fn opened(&self) -> u64 {
        self.contexts().len() as u64
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<OpenedContext> {
        self.opened.lock().map(|opened| opened.clone()).unwrap_or_default()
    }
}

impl HookRuntime for RecordingHookRuntime {
    fn open(&self, binding: &HookBinding<'_>) -> Result<ContextId, EvmError> {
        let mut opened = self
            .opened
            .lock()
            .map_err(|_| EvmError::Custom("hook runtime poisoned".to_string()))?;
        opened.push(OpenedContext {
            tx_hash: binding.tx_config.tx_hash,
            block_hash: binding.tx_config.block_hash,
            tx_index: binding.tx_config.tx_index,
            height: binding.cfg.height,
            chain_id: binding.cfg.chain_id,
            commit: binding.commit,
        });
        Ok(opened.len() as ContextId - 1)
    }

    fn close(&self, _id: ContextId) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub const LOG_INDEX_TRACER: &str = "logIndexTracer";

/// Reports the block position of every log the traced transaction emitted.
#[derive(Debug, Default)]
pub struct LogIndexTracer {
    positions: Vec<serde_json::Value>,
    stop: StopHandle,
}

impl Tracer for LogIndexTracer {
    fn capture_log(&mut self, log: &Log) {
        self.positions.push(serde_json::json!({
            "logIndex": log.log_index,
            "txIndex": log.transaction_index,
        }));
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn result(&mut self) -> Result<serde_json::Value, TracerError> {
        if let Some(reason) = self.stop.reason() {
            return Err(TracerError::Stopped(reason.to_string()));
        }
        Ok(serde_json::Value::Array(std::mem::take(&mut self.positions)))
    }
}

/// The built-in tracers plus [`LogIndexTracer`].
pub fn tracer_directory() -> TracerDirectory {
    let mut directory = TracerDirectory::default();
    directory.register(LOG_INDEX_TRACER, |_, _| Ok(Box::new(LogIndexTracer::default())));
    directory
}

/// Routes engine logs to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    // fails when another test installed it first
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn simulator<E: MessageExecutor + 'static>(
    store: Store,
    host: StaticChainParams,
    executor: E,
) -> Simulator {
    init_tracing();
    Simulator::new(
        store,
        Arc::new(host),
        Arc::new(executor),
        SimulatorOptions::default(),
    )
    .with_tracers(tracer_directory())
}

/// A legacy transaction from `from` to `to` with a zero gas price.
pub fn transaction(hash: u64, from: Address, to: Address, gas_limit: u64) -> Transaction {
    Transaction {
        hash: H256::from_low_u64_be(hash),
        sender: from,
        to: Some(to),
        gas_limit,
        ..Default::default()
    }
}
