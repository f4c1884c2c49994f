use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use ethereum_types::{Address, H160, H256, U256};
use hostevm_blockchain::{
    TraceBlockRequest, TraceTxRequest,
    error::{ErrorKind, QueryError},
};
use hostevm_common::types::{ChainConfigOverrides, TraceConfig, Transaction};
use hostevm_storage::{AccountReader, Store};
use hostevm_test::{
    Behavior, LOG_INDEX_TRACER, OpenedContext, RecordingHookRuntime, ScriptedExecutor,
    StaticChainParams, simulator, transaction,
};
use serde_json::json;

const EMIT_TWO: Address = H160([0x02; 20]);
const EMIT_THREE: Address = H160([0x03; 20]);
const EMIT_ONE: Address = H160([0x01; 20]);
const BROKEN: Address = H160([0xbb; 20]);
const COUNTER: Address = H160([0xcc; 20]);
const SPINNER: Address = H160([0x55; 20]);

fn sender() -> Address {
    Address::repeat_byte(0xaa)
}

fn executor() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .with(EMIT_ONE, Behavior::EmitLogs(1))
        .with(EMIT_TWO, Behavior::EmitLogs(2))
        .with(EMIT_THREE, Behavior::EmitLogs(3))
        .with(BROKEN, Behavior::Fail("boom".to_string()))
        .with(COUNTER, Behavior::Increment)
        .with(SPINNER, Behavior::Spin)
}

fn tx(hash: u64, to: Address) -> Transaction {
    transaction(hash, sender(), to, 100_000)
}

fn tracer(name: &str) -> TraceConfig {
    TraceConfig {
        tracer: name.to_string(),
        ..Default::default()
    }
}

fn tx_request(predecessors: Vec<Transaction>, msg: Transaction, config: TraceConfig) -> TraceTxRequest {
    TraceTxRequest {
        block_number: 12,
        block_hash: H256::repeat_byte(0x12),
        predecessors,
        msg,
        trace_config: Some(config),
        ..Default::default()
    }
}

#[tokio::test]
async fn log_indices_continue_across_predecessors() {
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor());
    let req = tx_request(
        vec![tx(1, EMIT_TWO), tx(2, BROKEN), tx(3, EMIT_THREE)],
        tx(4, EMIT_ONE),
        tracer(LOG_INDEX_TRACER),
    );
    let result = simulator.trace_transaction(&req).await.expect("traced");
    assert_eq!(result, json!([{ "logIndex": 5, "txIndex": 3 }]));
}

#[tokio::test]
async fn target_sees_predecessor_writes_but_nothing_persists() {
    let store = Store::new();
    let simulator = simulator(store.clone(), StaticChainParams::default(), executor());
    let req = tx_request(
        vec![tx(1, COUNTER), tx(2, COUNTER)],
        tx(3, COUNTER),
        tracer("callTracer"),
    );
    let result = simulator.trace_transaction(&req).await.expect("traced");
    assert_eq!(result["type"], json!("CALL"));
    assert_eq!(result["to"], json!(COUNTER));
    assert_eq!(
        result["output"],
        json!(format!("0x{}", hex::encode(H256::from_low_u64_be(3))))
    );
    assert_eq!(store.storage(COUNTER, H256::zero()).expect("readable"), U256::zero());
    assert_eq!(store.nonce(sender()).expect("readable"), 0);
}

#[tokio::test]
async fn struct_logger_is_the_default_tracer() {
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor());
    let result = simulator
        .trace_transaction(&tx_request(vec![], tx(1, EMIT_ONE), TraceConfig::default()))
        .await
        .expect("traced");
    assert_eq!(result["failed"], json!(false));
    assert_eq!(result["gas"], json!(21_000));
    assert_eq!(result["structLogs"], json!([]));
}

#[tokio::test]
async fn short_timeout_stops_a_long_execution() {
    let hooks = Arc::new(RecordingHookRuntime::default());
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor())
        .with_hooks(hooks.clone());
    let config = TraceConfig {
        timeout: Some("1ms".to_string()),
        ..tracer("callTracer")
    };
    let started = Instant::now();
    let err = simulator
        .trace_transaction(&tx_request(vec![], tx(1, SPINNER), config))
        .await
        .expect_err("deadline reached");
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    assert!(matches!(err, QueryError::Timeout(_)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.to_string(), "execution timeout");
    assert_eq!(hooks.opened(), hooks.closed());
}

#[tokio::test]
async fn invalid_trace_options_are_rejected() {
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor());

    let bad_timeout = TraceConfig {
        timeout: Some("soon".to_string()),
        ..Default::default()
    };
    let err = simulator
        .trace_transaction(&tx_request(vec![], tx(1, EMIT_ONE), bad_timeout))
        .await
        .expect_err("unparsable timeout");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().starts_with("timeout value"), "{err}");

    let negative_limit = TraceConfig {
        limit: -1,
        ..Default::default()
    };
    let err = simulator
        .trace_transaction(&tx_request(vec![], tx(1, EMIT_ONE), negative_limit))
        .await
        .expect_err("negative limit");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = simulator
        .trace_transaction(&tx_request(vec![], tx(1, EMIT_ONE), tracer("prestateTracer")))
        .await
        .expect_err("unknown tracer");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.to_string(), "unknown tracer: prestateTracer");
}

#[tokio::test]
async fn unparsable_tracer_config_is_ignored() {
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor());
    let config = TraceConfig {
        tracer_config: Some("{onlyTopCall: yes".to_string()),
        ..tracer("callTracer")
    };
    let result = simulator
        .trace_transaction(&tx_request(vec![], tx(1, EMIT_ONE), config))
        .await
        .expect("traced");
    assert_eq!(result["type"], json!("CALL"));

    let with_logs = TraceConfig {
        tracer_config: Some(r#"{"withLog": true}"#.to_string()),
        ..tracer("callTracer")
    };
    let result = simulator
        .trace_transaction(&tx_request(vec![], tx(1, EMIT_ONE), with_logs))
        .await
        .expect("traced");
    assert_eq!(result["logs"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn block_trace_reports_failures_inline() {
    let hooks = Arc::new(RecordingHookRuntime::default());
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor())
        .with_hooks(hooks.clone());
    let req = TraceBlockRequest {
        block_number: 12,
        block_hash: H256::repeat_byte(0x12),
        txs: vec![tx(1, EMIT_ONE), tx(2, BROKEN), tx(3, EMIT_TWO)],
        trace_config: Some(tracer(LOG_INDEX_TRACER)),
        ..Default::default()
    };
    let results = simulator.trace_block(&req).await.expect("block traced");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].result, Some(json!([{ "logIndex": 0, "txIndex": 0 }])));
    assert!(results[0].error.is_none());
    assert_eq!(results[1].error.as_deref(), Some("boom"));
    assert!(results[1].result.is_none());
    assert_eq!(
        results[2].result,
        Some(json!([
            { "logIndex": 1, "txIndex": 2 },
            { "logIndex": 2, "txIndex": 2 },
        ]))
    );
    assert_eq!(hooks.opened(), 3);
    assert_eq!(hooks.closed(), 3);
}

#[tokio::test]
async fn hook_contexts_are_bound_to_the_traced_block() {
    let hooks = Arc::new(RecordingHookRuntime::default());
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor())
        .with_hooks(hooks.clone());
    let req = TraceBlockRequest {
        block_number: 12,
        block_hash: H256::repeat_byte(0x12),
        chain_id: Some(9000),
        txs: vec![tx(1, EMIT_ONE), tx(2, EMIT_TWO)],
        trace_config: Some(tracer("callTracer")),
        ..Default::default()
    };
    simulator.trace_block(&req).await.expect("block traced");

    let expected: Vec<_> = [(1, 0), (2, 1)]
        .into_iter()
        .map(|(hash, tx_index)| OpenedContext {
            tx_hash: H256::from_low_u64_be(hash),
            block_hash: H256::repeat_byte(0x12),
            tx_index,
            height: 11,
            chain_id: 9000,
            commit: true,
        })
        .collect();
    assert_eq!(hooks.contexts(), expected);
}

#[tokio::test]
async fn trace_overrides_apply_to_the_traced_execution() {
    let hooks = Arc::new(RecordingHookRuntime::default());
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor())
        .with_hooks(hooks.clone());
    let config = TraceConfig {
        overrides: Some(ChainConfigOverrides {
            chain_id: Some(4242),
            ..Default::default()
        }),
        ..tracer("callTracer")
    };
    simulator
        .trace_transaction(&tx_request(vec![tx(1, EMIT_ONE)], tx(2, EMIT_TWO), config))
        .await
        .expect("traced");

    let chain_ids: Vec<_> = hooks.contexts().iter().map(|context| context.chain_id).collect();
    assert_eq!(chain_ids, vec![4242, 4242]);

    simulator
        .trace_transaction(&tx_request(vec![], tx(3, EMIT_ONE), tracer("callTracer")))
        .await
        .expect("traced");
    assert_eq!(hooks.contexts().last().map(|context| context.chain_id), Some(11820));
}

#[tokio::test]
async fn block_trace_replays_on_the_same_overlay() {
    let store = Store::new();
    let simulator = simulator(store.clone(), StaticChainParams::default(), executor());
    let req = TraceBlockRequest {
        block_number: 1,
        txs: vec![tx(1, COUNTER), tx(2, COUNTER)],
        trace_config: Some(tracer("callTracer")),
        ..Default::default()
    };
    let results = simulator.trace_block(&req).await.expect("block traced");
    let outputs: Vec<_> = results
        .iter()
        .map(|trace| trace.result.as_ref().map(|result| result["output"].clone()))
        .collect();
    assert_eq!(
        outputs,
        vec![
            Some(json!(format!("0x{}", hex::encode(H256::from_low_u64_be(1))))),
            Some(json!(format!("0x{}", hex::encode(H256::from_low_u64_be(2))))),
        ]
    );
    assert_eq!(store.storage(COUNTER, H256::zero()).expect("readable"), U256::zero());
}
