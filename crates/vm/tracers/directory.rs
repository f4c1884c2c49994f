use std::collections::BTreeMap;

use hostevm_common::H256;
use serde::Deserialize;
use tracing::debug;

use super::{
    CALL_TRACER, CallTracer, CallTracerConfig, FOUR_BYTE_TRACER, FourByteTracer, NOOP_TRACER,
    NoopTracer, Tracer, TracerError,
};

/// Facts about the transaction a named tracer is created for.
#[derive(Debug, Clone, Default)]
pub struct TracerContext {
    pub tx_hash: H256,
    pub tx_index: u64,
}

pub type TracerFactory =
    fn(&TracerContext, Option<&serde_json::Value>) -> Result<Box<dyn Tracer>, TracerError>;

/// Named tracers that can be requested through `TraceConfig::tracer`.
pub struct TracerDirectory {
    factories: BTreeMap<&'static str, TracerFactory>,
}

impl Default for TracerDirectory {
    fn default() -> Self {
        let mut directory = Self::empty();
        directory.register(CALL_TRACER, new_call_tracer);
        directory.register(FOUR_BYTE_TRACER, |_, _| Ok(Box::new(FourByteTracer::new())));
        directory.register(NOOP_TRACER, |_, _| Ok(Box::new(NoopTracer::new())));
        directory
    }
}

impl TracerDirectory {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, factory: TracerFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn new_tracer(
        &self,
        name: &str,
        ctx: &TracerContext,
        config: Option<&serde_json::Value>,
    ) -> Result<Box<dyn Tracer>, TracerError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TracerError::Unknown(name.to_string()))?;
        debug!(tracer = name, tx_hash = %ctx.tx_hash, tx_index = ctx.tx_index, "Creating named tracer");
        factory(ctx, config)
    }
}

fn new_call_tracer(
    _ctx: &TracerContext,
    config: Option<&serde_json::Value>,
) -> Result<Box<dyn Tracer>, TracerError> {
    let config = match config {
        Some(config) => CallTracerConfig::deserialize(config)
            .map_err(|err| TracerError::InvalidConfig(err.to_string()))?,
        None => CallTracerConfig::default(),
    };
    Ok(Box::new(CallTracer::new(config)))
}
