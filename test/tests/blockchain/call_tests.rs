use std::{sync::Arc, thread};

use ethereum_types::{Address, BigEndianHash, H256, U256};
use hostevm_blockchain::{CallRequest, error::ErrorKind, error::QueryError};
use hostevm_storage::{AccountReader, Store};
use hostevm_test::{
    Behavior, RecordingHookRuntime, ScriptedExecutor, StaticChainParams, simulator, transaction,
};

fn counter() -> Address {
    Address::repeat_byte(0xcc)
}

fn caller() -> Address {
    Address::repeat_byte(0xaa)
}

fn call_to(to: Address) -> CallRequest {
    let args = serde_json::json!({ "from": caller(), "to": to });
    CallRequest::new(args.to_string(), 10)
}

fn word(output: &[u8]) -> U256 {
    H256::from_slice(output).into_uint()
}

#[test]
fn concurrent_calls_never_see_each_other() {
    let store = Store::new();
    let executor = ScriptedExecutor::new().with(counter(), Behavior::Increment);
    let simulator = simulator(store.clone(), StaticChainParams::default(), executor);

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..10 {
                    let result = simulator.call(&call_to(counter())).expect("call succeeds");
                    assert_eq!(word(&result.output()), U256::one());
                }
            });
        }
    });

    assert_eq!(
        store.storage(counter(), H256::zero()).expect("readable"),
        U256::zero()
    );
    assert_eq!(store.nonce(caller()).expect("readable"), 0);
    assert_eq!(store.commits().expect("readable"), 0);
}

#[test]
fn committed_transactions_are_visible_to_later_calls() {
    let store = Store::new();
    let executor = ScriptedExecutor::new().with(counter(), Behavior::Increment);
    let simulator = simulator(store.clone(), StaticChainParams::default(), executor);

    let tx = transaction(1, caller(), counter(), 100_000);
    let simulated = simulator
        .apply_transaction(&tx, 10, false)
        .expect("executes");
    assert!(simulated.is_success());
    assert_eq!(
        store.storage(counter(), H256::zero()).expect("readable"),
        U256::zero()
    );

    simulator.apply_transaction(&tx, 10, true).expect("executes");
    assert_eq!(
        store.storage(counter(), H256::zero()).expect("readable"),
        U256::one()
    );
    assert_eq!(store.nonce(caller()).expect("readable"), 1);

    let result = simulator.call(&call_to(counter())).expect("call succeeds");
    assert_eq!(word(&result.output()), U256::from(2));
}

#[test]
fn reverted_calls_are_results_not_errors() {
    let target = Address::repeat_byte(0x0e);
    let executor = ScriptedExecutor::new().with(target, Behavior::Revert("paused".to_string()));
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor);

    let result = simulator.call(&call_to(target)).expect("call executes");
    assert!(result.is_revert());
    assert_eq!(result.vm_error(), Some("execution reverted"));
}

#[test]
fn hook_contexts_are_released_on_every_path() {
    let failing = Address::repeat_byte(0x0f);
    let panicking = Address::repeat_byte(0x0d);
    let executor = ScriptedExecutor::new()
        .with(failing, Behavior::Fail("state unavailable".to_string()))
        .with(panicking, Behavior::Panic);
    let hooks = Arc::new(RecordingHookRuntime::default());
    let simulator = simulator(Store::new(), StaticChainParams::default(), executor)
        .with_hooks(hooks.clone());

    simulator.call(&call_to(counter())).expect("call succeeds");

    let err = simulator.call(&call_to(failing)).expect_err("executor fails");
    assert_eq!(err.to_string(), "state unavailable");
    assert_eq!(err.kind(), ErrorKind::Execution);

    let err = simulator.call(&call_to(panicking)).expect_err("executor panics");
    assert!(matches!(&err, QueryError::Internal(reason) if reason.contains("scripted interpreter panic")));
    assert_eq!(err.kind(), ErrorKind::Internal);

    assert_eq!(hooks.opened(), 3);
    assert_eq!(hooks.closed(), 3);
}

#[test]
fn malformed_requests_are_invalid_arguments() {
    let simulator = simulator(
        Store::new(),
        StaticChainParams::default(),
        ScriptedExecutor::new(),
    );

    let err = simulator
        .call(&CallRequest::new("[1, 2", 10))
        .expect_err("not json");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let conflicting = serde_json::json!({
        "from": caller(),
        "to": counter(),
        "gasPrice": "0x1",
        "maxFeePerGas": "0x2",
    });
    let err = simulator
        .call(&CallRequest::new(conflicting.to_string(), 10))
        .expect_err("both fee styles");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let broken_host = StaticChainParams {
        chain_id: "no-chain-id".to_string(),
        ..Default::default()
    };
    let simulator = hostevm_test::simulator(Store::new(), broken_host, ScriptedExecutor::new());
    let err = simulator.call(&call_to(counter())).expect_err("bad chain id");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let mut explicit = call_to(counter());
    explicit.chain_id = Some(7);
    assert!(simulator.call(&explicit).expect("explicit chain id").is_success());
}
