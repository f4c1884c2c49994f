use super::{StopHandle, Tracer, TracerError};

/// Tracer that records nothing. Used for replaying the transactions that precede
/// a traced one.
#[derive(Debug, Default)]
pub struct NoopTracer {
    stop: StopHandle,
}

impl NoopTracer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for NoopTracer {
    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn result(&mut self) -> Result<serde_json::Value, TracerError> {
        if let Some(reason) = self.stop.reason() {
            return Err(TracerError::Stopped(reason.to_string()));
        }
        Ok(serde_json::json!({}))
    }
}
