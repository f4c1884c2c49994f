use serde::{Deserialize, Serialize};

use super::ChainConfigOverrides;

/// Options of a `debug_trace*` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceConfig {
    /// Named tracer, empty selects the struct logger
    pub tracer: String,
    /// Raw JSON configuration handed to the named tracer
    pub tracer_config: Option<String>,
    /// Go style duration ("5s", "1m30s")
    pub timeout: Option<String>,
    /// Maximum number of struct logs to capture (0 = unlimited)
    pub limit: i64,
    pub enable_memory: bool,
    pub disable_stack: bool,
    pub disable_storage: bool,
    pub enable_return_data: bool,
    pub debug: bool,
    /// Fork schedule to replay the transaction with
    pub overrides: Option<ChainConfigOverrides>,
}

/// Outcome of tracing one transaction of a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxTraceResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TxTraceResult {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            result: None,
            error: Some(error.to_string()),
        }
    }
}
