use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use hostevm_common::{
    Address, H256,
    serde_utils::parse_duration,
    types::{BlockNumber, ExecutionConfig, TraceConfig, Transaction, TxConfig, TxTraceResult},
};
use hostevm_storage::CacheStore;
use hostevm_vm::tracers::{LogConfig, NoopTracer, StopHandle, StructLogger, Tracer, TracerContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{Simulator, error::QueryError, evm_config::resolve_execution_config};

/// Stop reason given to tracers whose deadline passed.
pub const TIMEOUT_REASON: &str = "execution timeout";

/// `debug_traceTransaction`: the target transaction plus every transaction that runs
/// before it in the same block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceTxRequest {
    pub block_number: BlockNumber,
    pub block_time: u64,
    pub block_hash: H256,
    /// 0 or `None` derives the id from the host chain id
    pub chain_id: Option<u64>,
    pub proposer: Option<Address>,
    pub predecessors: Vec<Transaction>,
    pub msg: Transaction,
    pub trace_config: Option<TraceConfig>,
}

/// `debug_traceBlock*`: every transaction of a block, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceBlockRequest {
    pub block_number: BlockNumber,
    pub block_time: u64,
    pub block_hash: H256,
    pub chain_id: Option<u64>,
    pub proposer: Option<Address>,
    pub txs: Vec<Transaction>,
    pub trace_config: Option<TraceConfig>,
}

/// Validated tracing options of one request.
struct TraceSession {
    config: TraceConfig,
    cfg: ExecutionConfig,
    log_config: LogConfig,
    timeout: Duration,
}

/// Cancels its deadline watcher when dropped.
struct DeadlineGuard {
    _cancel: mpsc::Sender<()>,
}

/// Stops `stop` once `timeout` elapses, unless the returned guard is dropped first.
///
/// The watcher runs on its own thread so the deadline holds while the calling thread is
/// busy executing, whatever runtime (if any) drives it.
fn spawn_deadline_watcher(
    timeout: Duration,
    stop: StopHandle,
) -> Result<DeadlineGuard, QueryError> {
    let (cancel, cancelled) = mpsc::channel::<()>();
    thread::Builder::new()
        .name("trace_deadline".to_string())
        .spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                warn!(?timeout, "Trace deadline reached, stopping execution");
                stop.stop(TIMEOUT_REASON);
            }
        })
        .map_err(|err| QueryError::Internal(format!("failed to start trace deadline: {err}")))?;
    Ok(DeadlineGuard { _cancel: cancel })
}

/// Height whose state a block is replayed on top of.
fn context_height(block_number: BlockNumber) -> BlockNumber {
    block_number.saturating_sub(1).max(1)
}

impl Simulator {
    fn trace_session(
        &self,
        config: Option<&TraceConfig>,
        block_number: BlockNumber,
        block_time: u64,
        proposer: Option<Address>,
        chain_id: Option<u64>,
    ) -> Result<TraceSession, QueryError> {
        let config = config.cloned().unwrap_or_default();
        if config.limit < 0 {
            return Err(QueryError::InvalidArgument(format!(
                "output limit cannot be negative, got {}",
                config.limit
            )));
        }
        let limit = config.limit as u64;
        let max_limit = self.options().max_trace_limit;
        if max_limit != 0 && limit > max_limit {
            return Err(QueryError::InvalidArgument(format!(
                "output limit {limit} exceeds the maximum of {max_limit}"
            )));
        }
        let timeout = match config.timeout.as_deref() {
            Some(timeout) if !timeout.is_empty() => parse_duration(timeout).ok_or_else(|| {
                QueryError::InvalidArgument(format!(
                    "timeout value: invalid duration \"{timeout}\""
                ))
            })?,
            _ => self.options().trace_timeout,
        };

        let height = context_height(block_number);
        let mut cfg = resolve_execution_config(self.host(), height, proposer, chain_id)?;
        cfg.time = block_time;
        if let Some(overrides) = &config.overrides {
            cfg.chain_config = cfg.chain_config.with_overrides(overrides);
            if let Some(chain_id) = overrides.chain_id {
                cfg.chain_id = chain_id;
            }
        }

        let log_config = LogConfig {
            enable_memory: config.enable_memory,
            disable_stack: config.disable_stack,
            disable_storage: config.disable_storage,
            enable_return_data: config.enable_return_data,
            debug: config.debug,
            limit: limit as usize,
        };
        Ok(TraceSession {
            config,
            cfg,
            log_config,
            timeout,
        })
    }

    fn new_tracer(
        &self,
        session: &TraceSession,
        tx_config: &TxConfig,
        tracer_config: Option<&serde_json::Value>,
    ) -> Result<Box<dyn Tracer>, QueryError> {
        if session.config.tracer.is_empty() {
            return Ok(Box::new(StructLogger::new(session.log_config.clone())));
        }
        let ctx = TracerContext {
            tx_hash: tx_config.tx_hash,
            tx_index: tx_config.tx_index,
        };
        Ok(self
            .tracers()
            .new_tracer(&session.config.tracer, &ctx, tracer_config)?)
    }

    /// Traces `tx` on top of `state`. Returns the trace and the log index the next
    /// transaction of the block starts at. Committing runs leave their writes in `state`.
    fn trace_tx(
        &self,
        session: &TraceSession,
        state: &mut CacheStore<'_>,
        tx: &Transaction,
        tx_config: &TxConfig,
        tracer_config: Option<&serde_json::Value>,
        commit: bool,
    ) -> Result<(serde_json::Value, u64), QueryError> {
        let mut tracer = self.new_tracer(session, tx_config, tracer_config)?;
        let stop = tracer.stop_handle();
        let _watcher = spawn_deadline_watcher(session.timeout, stop.clone())?;

        let msg = tx.to_message(session.cfg.base_fee);
        let executed = self.scope(&session.cfg).run(
            &*state,
            &msg,
            tracer.as_mut(),
            commit,
            tx_config,
            tx.has_custom_verification(),
        );
        // an interrupted execution reports the interruption, whatever it returned
        if stop.is_stopped() {
            return Err(tracer.result().err().map_or_else(
                || QueryError::Timeout(TIMEOUT_REASON.to_string()),
                QueryError::from,
            ));
        }
        let outcome = executed?;
        let next_log_index = tx_config.log_index + outcome.result.logs().len() as u64;
        if let Some(changes) = outcome.changes {
            state.apply(changes);
        }
        Ok((tracer.result()?, next_log_index))
    }

    /// Replays the transactions preceding the target in its block, then traces it.
    #[instrument(
        level = "debug",
        name = "trace_transaction",
        skip_all,
        fields(block_number = req.block_number, tx_hash = %req.msg.hash)
    )]
    pub async fn trace_transaction(
        &self,
        req: &TraceTxRequest,
    ) -> Result<serde_json::Value, QueryError> {
        let session = self.trace_session(
            req.trace_config.as_ref(),
            req.block_number,
            req.block_time,
            req.proposer,
            req.chain_id,
        )?;
        let tracer_config = session
            .config
            .tracer_config
            .as_deref()
            .and_then(|raw| match serde_json::from_str(raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    debug!(%err, "Ignoring unparsable tracer config");
                    None
                }
            });

        let snapshot = self.store().snapshot()?;
        let mut state = snapshot.overlay();
        let mut tx_config = TxConfig::empty(req.block_hash);
        let scope = self.scope(&session.cfg);
        for (index, tx) in req.predecessors.iter().enumerate() {
            tx_config = tx_config.for_tx(tx.hash, index as u64);
            let msg = tx.to_message(session.cfg.base_fee);
            let replayed = scope.run(
                &state,
                &msg,
                &mut NoopTracer::new(),
                true,
                &tx_config,
                tx.has_custom_verification(),
            );
            match replayed {
                Ok(outcome) => {
                    tx_config.log_index += outcome.result.logs().len() as u64;
                    if let Some(changes) = outcome.changes {
                        state.apply(changes);
                    }
                }
                Err(err) => {
                    debug!(tx_hash = %tx.hash, index, %err, "Failed to replay predecessor, skipping");
                }
            }
        }

        tx_config.tx_hash = req.msg.hash;
        if !req.predecessors.is_empty() {
            tx_config.tx_index += 1;
        }
        let (result, _) = self.trace_tx(
            &session,
            &mut state,
            &req.msg,
            &tx_config,
            tracer_config.as_ref(),
            false,
        )?;
        Ok(result)
    }

    /// Traces every transaction of a block in order. Failures are reported per
    /// transaction and do not stop the rest of the block.
    #[instrument(
        level = "debug",
        name = "trace_block",
        skip_all,
        fields(block_number = req.block_number, txs = req.txs.len())
    )]
    pub async fn trace_block(
        &self,
        req: &TraceBlockRequest,
    ) -> Result<Vec<TxTraceResult>, QueryError> {
        let session = self.trace_session(
            req.trace_config.as_ref(),
            req.block_number,
            req.block_time,
            req.proposer,
            req.chain_id,
        )?;

        let snapshot = self.store().snapshot()?;
        let mut state = snapshot.overlay();
        let mut tx_config = TxConfig::empty(req.block_hash);
        let mut results = Vec::with_capacity(req.txs.len());
        for (index, tx) in req.txs.iter().enumerate() {
            tx_config = tx_config.for_tx(tx.hash, index as u64);
            match self.trace_tx(&session, &mut state, tx, &tx_config, None, true) {
                Ok((result, next_log_index)) => {
                    tx_config.log_index = next_log_index;
                    results.push(TxTraceResult::ok(result));
                }
                Err(err) => {
                    debug!(tx_hash = %tx.hash, index, %err, "Failed to trace transaction");
                    results.push(TxTraceResult::err(err));
                }
            }
        }
        Ok(results)
    }
}
