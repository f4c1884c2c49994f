//! Query engine of the EVM module: simulated calls, gas estimation and transaction
//! tracing over the committed chain state, without ever mutating it.

pub mod error;
pub mod estimate;
pub mod evm_config;
pub mod host;
pub mod scope;
pub mod trace;

use std::{sync::Arc, time::Duration};

use hostevm_common::{
    Address, U256, serde_utils,
    types::{BlockNumber, ExecutionConfig, Transaction, TransactionArgs, TxConfig},
};
use hostevm_storage::{AccountReader, Store};
use hostevm_vm::{
    ExecutionResult, HookRuntime, MessageExecutor, NoopHookRuntime,
    tracers::{NoopTracer, TracerDirectory},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use error::QueryError;
use evm_config::{resolve_base_fee, resolve_execution_config};
use host::ChainParams;
use scope::ScopedExecution;

pub use trace::{TraceBlockRequest, TraceTxRequest};

/// Gas cap applied to calls when the request does not bring its own.
pub const DEFAULT_RPC_GAS_CAP: u64 = 25_000_000;
pub const DEFAULT_TRACE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorOptions {
    /// Gas cap of `call` and `estimate_gas` (0 = uncapped calls)
    pub rpc_gas_cap: u64,
    /// Timeout of trace requests that do not set one
    #[serde(with = "serde_utils::duration")]
    pub trace_timeout: Duration,
    /// Highest struct log limit a trace request may ask for (0 = unlimited)
    pub max_trace_limit: u64,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            rpc_gas_cap: DEFAULT_RPC_GAS_CAP,
            trace_timeout: DEFAULT_TRACE_TIMEOUT,
            max_trace_limit: 0,
        }
    }
}

/// A simulated call, as received from `eth_call`/`eth_estimateGas`.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    /// JSON encoded [`TransactionArgs`]
    pub args: String,
    /// Overrides [`SimulatorOptions::rpc_gas_cap`]
    pub gas_cap: Option<u64>,
    /// Height of the state the call runs against
    pub height: BlockNumber,
    pub proposer: Option<Address>,
    /// 0 or `None` derives the id from the host chain id
    pub chain_id: Option<u64>,
}

impl CallRequest {
    pub fn new(args: impl Into<String>, height: BlockNumber) -> Self {
        Self {
            args: args.into(),
            height,
            ..Default::default()
        }
    }

    pub fn parse_args(&self) -> Result<TransactionArgs, QueryError> {
        serde_json::from_str(&self.args)
            .map_err(|err| QueryError::InvalidArgument(format!("invalid call arguments: {err}")))
    }
}

/// Runs queries against the committed [`Store`] through the configured interpreter.
pub struct Simulator {
    store: Store,
    host: Arc<dyn ChainParams>,
    executor: Arc<dyn MessageExecutor>,
    hooks: Arc<dyn HookRuntime>,
    tracers: TracerDirectory,
    options: SimulatorOptions,
}

impl Simulator {
    pub fn new(
        store: Store,
        host: Arc<dyn ChainParams>,
        executor: Arc<dyn MessageExecutor>,
        options: SimulatorOptions,
    ) -> Self {
        Self {
            store,
            host,
            executor,
            hooks: Arc::new(NoopHookRuntime),
            tracers: TracerDirectory::default(),
            options,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HookRuntime>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_tracers(mut self, tracers: TracerDirectory) -> Self {
        self.tracers = tracers;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    pub(crate) fn host(&self) -> &dyn ChainParams {
        self.host.as_ref()
    }

    pub(crate) fn tracers(&self) -> &TracerDirectory {
        &self.tracers
    }

    pub(crate) fn scope<'a>(&'a self, cfg: &'a ExecutionConfig) -> ScopedExecution<'a> {
        ScopedExecution::new(self.executor.as_ref(), self.hooks.as_ref(), cfg)
    }

    pub(crate) fn gas_cap(&self, req: &CallRequest) -> u64 {
        req.gas_cap.unwrap_or(self.options.rpc_gas_cap)
    }

    /// Executes `req.args` against the state at `req.height` and discards its effects.
    #[instrument(level = "debug", name = "call", skip_all, fields(height = req.height))]
    pub fn call(&self, req: &CallRequest) -> Result<ExecutionResult, QueryError> {
        let args = req.parse_args()?;
        let cfg = resolve_execution_config(self.host(), req.height, req.proposer, req.chain_id)?;

        let mut msg = args.to_message(self.gas_cap(req), cfg.base_fee)?;
        let snapshot = self.store.snapshot()?;
        msg.nonce = snapshot.nonce(msg.from)?;

        let tx_config = TxConfig::empty(self.host.header_hash(req.height));
        let outcome = self.scope(&cfg).run(
            &snapshot,
            &msg,
            &mut NoopTracer::new(),
            false,
            &tx_config,
            args.has_custom_verification(),
        )?;
        debug!(gas_used = outcome.result.gas_used(), "Call finished");
        Ok(outcome.result)
    }

    /// Executes a delivered transaction at `height`. With `commit` its writes are
    /// applied to the store and visible to every later query.
    #[instrument(
        level = "debug",
        name = "apply_transaction",
        skip_all,
        fields(height = height, tx_hash = %tx.hash, commit = commit)
    )]
    pub fn apply_transaction(
        &self,
        tx: &Transaction,
        height: BlockNumber,
        commit: bool,
    ) -> Result<ExecutionResult, QueryError> {
        let cfg = resolve_execution_config(self.host(), height, None, None)?;
        let msg = tx.to_message(cfg.base_fee);
        let tx_config = TxConfig::empty(self.host.header_hash(height)).for_tx(tx.hash, 0);
        let outcome = self.scope(&cfg).run(
            &self.store,
            &msg,
            &mut NoopTracer::new(),
            commit,
            &tx_config,
            tx.has_custom_verification(),
        )?;
        if let Some(changes) = outcome.changes {
            self.store.apply(changes)?;
        }
        Ok(outcome.result)
    }

    /// Base fee in effect at `height`, `None` before the fee market activates.
    pub fn base_fee(&self, height: BlockNumber) -> Result<Option<U256>, QueryError> {
        Ok(resolve_base_fee(self.host(), height))
    }
}
