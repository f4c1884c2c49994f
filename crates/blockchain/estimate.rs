use hostevm_common::{
    constants::TX_GAS,
    types::{Message, TxConfig},
};
use hostevm_storage::{AccountReader, StateReader};
use hostevm_vm::{ExecutionResult, system_contracts::abi::decode_revert_reason, tracers::NoopTracer};
use tracing::{debug, instrument, trace};

use crate::{
    CallRequest, Simulator,
    error::QueryError,
    evm_config::resolve_execution_config,
    scope::ScopedExecution,
};

/// Interval the binary search narrows: `lo` is known to fail, `hi` is the best known
/// passing value, `cap` is the most the caller allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSearchBounds {
    pub lo: u64,
    pub hi: u64,
    pub cap: u64,
}

impl GasSearchBounds {
    /// `block_gas_limit` is 0 when the host does not report one.
    pub fn new(requested: Option<u64>, block_gas_limit: u64, gas_cap: u64) -> Self {
        let mut hi = match requested {
            Some(gas) if gas >= TX_GAS => gas,
            _ if block_gas_limit > 0 => block_gas_limit,
            _ => gas_cap,
        };
        if gas_cap != 0 && hi > gas_cap {
            debug!(requested = hi, cap = gas_cap, "Lowering gas estimation ceiling to the cap");
            hi = gas_cap;
        }
        Self {
            lo: TX_GAS - 1,
            hi,
            cap: hi,
        }
    }

    fn is_converged(&self) -> bool {
        self.lo.saturating_add(1) >= self.hi
    }

    fn midpoint(&self) -> u64 {
        self.lo + (self.hi - self.lo) / 2
    }
}

/// How a single probe of the search went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Succeeded,
    NeedsMoreGas,
}

/// Binary search for the lowest gas limit a message executes successfully with.
pub struct GasEstimator<'a> {
    scope: ScopedExecution<'a>,
    state: &'a dyn StateReader,
    msg: Message,
    tx_config: TxConfig,
    custom_verification: bool,
}

impl<'a> GasEstimator<'a> {
    pub fn new(
        scope: ScopedExecution<'a>,
        state: &'a dyn StateReader,
        msg: Message,
        tx_config: TxConfig,
        custom_verification: bool,
    ) -> Self {
        Self {
            scope,
            state,
            msg,
            tx_config,
            custom_verification,
        }
    }

    /// Runs the message once with `gas`, on a throwaway overlay.
    fn execute(&self, gas: u64) -> Result<ExecutionResult, QueryError> {
        let msg = self.msg.with_gas_limit(gas);
        let mut tracer = NoopTracer::new();
        let outcome = self.scope.run(
            self.state,
            &msg,
            &mut tracer,
            false,
            &self.tx_config,
            self.custom_verification,
        )?;
        Ok(outcome.result)
    }

    fn probe(&self, gas: u64) -> Result<Probe, QueryError> {
        match self.execute(gas) {
            Ok(result) if result.is_success() => Ok(Probe::Succeeded),
            // reverts and VM errors may be caused by the gas limit itself
            Ok(_) => Ok(Probe::NeedsMoreGas),
            Err(QueryError::Evm(err)) if err.is_intrinsic_gas_too_low() => {
                Ok(Probe::NeedsMoreGas)
            }
            Err(err) => Err(err),
        }
    }

    pub fn estimate(&self, mut bounds: GasSearchBounds) -> Result<u64, QueryError> {
        let mut probes = 0_u32;
        while !bounds.is_converged() {
            let gas = bounds.midpoint();
            probes += 1;
            match self.probe(gas)? {
                Probe::Succeeded => bounds.hi = gas,
                Probe::NeedsMoreGas => bounds.lo = gas,
            }
            trace!(gas, lo = bounds.lo, hi = bounds.hi, "Gas estimation probe");
        }
        debug!(probes, gas = bounds.hi, "Gas estimation converged");

        if bounds.hi == bounds.cap {
            self.check_cap(bounds.cap)?;
        }
        Ok(bounds.hi)
    }

    /// Tells apart a message that fails regardless of gas from one that really needs
    /// more than the cap.
    fn check_cap(&self, cap: u64) -> Result<(), QueryError> {
        let result = match self.execute(cap) {
            Ok(result) => result,
            Err(QueryError::Evm(err)) if err.is_intrinsic_gas_too_low() => {
                return Err(QueryError::GasAllowanceExceeded(cap));
            }
            Err(err) => return Err(err),
        };
        match result {
            ExecutionResult::Success { .. } => Ok(()),
            ExecutionResult::Revert { output, .. } => Err(QueryError::Revert {
                reason: decode_revert_reason(&output),
                data: output,
            }),
            result if result.is_out_of_gas() => Err(QueryError::GasAllowanceExceeded(cap)),
            ExecutionResult::Halt { reason, .. } => Err(QueryError::VmError(reason)),
        }
    }
}

impl Simulator {
    /// Lowest gas limit `req.args` executes successfully with, never above the gas cap.
    #[instrument(
        level = "debug",
        name = "estimate_gas",
        skip_all,
        fields(height = req.height)
    )]
    pub fn estimate_gas(&self, req: &CallRequest) -> Result<u64, QueryError> {
        let gas_cap = self.gas_cap(req);
        if gas_cap < TX_GAS {
            return Err(QueryError::InvalidArgument(format!(
                "gas cap cannot be lower than {TX_GAS}, got {gas_cap}"
            )));
        }
        let args = req.parse_args()?;
        let cfg = resolve_execution_config(self.host(), req.height, req.proposer, req.chain_id)?;
        let bounds =
            GasSearchBounds::new(args.gas, self.host().block_gas_limit(req.height), gas_cap);

        let mut msg = args.to_message(gas_cap, cfg.base_fee)?;
        // every attempt of the search reads the same committed state
        let snapshot = self.store().snapshot()?;
        msg.nonce = snapshot.nonce(args.from())?;

        let tx_config = TxConfig::empty(self.host().header_hash(req.height));
        let estimator = GasEstimator::new(
            self.scope(&cfg),
            &snapshot,
            msg,
            tx_config,
            args.has_custom_verification(),
        );
        estimator.estimate(bounds)
    }
}
