use bytes::Bytes;
use ethereum_types::Address;
use hostevm_blockchain::{CallRequest, Simulator, error::QueryError};
use hostevm_common::{constants::TX_GAS, types::Transaction};
use hostevm_storage::Store;
use hostevm_test::{ScriptedExecutor, StaticChainParams, simulator};
use hostevm_vm::{
    ExecutionResult,
    system_contracts::{
        SYSTEM_CONTRACT_ADDRESS, SystemContractExecutor, aspect_id,
        abi::{self, Function, Value},
    },
};

const DEPLOY: &str = "deploy(bytes,(string,bytes)[],address,bytes,uint256[])";

fn owner() -> Address {
    Address::repeat_byte(0x0a)
}

fn system_simulator(store: Store) -> Simulator {
    simulator(
        store,
        StaticChainParams::default(),
        SystemContractExecutor::new(ScriptedExecutor::new()),
    )
}

fn calldata(signature: &str, values: &[Value]) -> Bytes {
    Function::parse(signature)
        .expect("valid signature")
        .encode_input(values)
        .into()
}

fn deploy_data() -> Bytes {
    calldata(DEPLOY, &[
        Value::Bytes(Bytes::from_static(b"\0asm")),
        Value::Array(vec![]),
        Value::Address(owner()),
        Value::Bytes(Bytes::new()),
        Value::Array(vec![Value::uint(2)]),
    ])
}

fn system_call(from: Address, data: &Bytes) -> CallRequest {
    system_call_with_gas(from, data, None)
}

fn system_call_with_gas(from: Address, data: &Bytes, gas: Option<u64>) -> CallRequest {
    let mut args = serde_json::json!({
        "from": from,
        "to": SYSTEM_CONTRACT_ADDRESS,
        "input": format!("0x{}", hex::encode(data)),
    });
    if let Some(gas) = gas {
        args["gas"] = serde_json::Value::String(format!("{gas:#x}"));
    }
    CallRequest::new(args.to_string(), 10)
}

fn version_of(simulator: &Simulator, id: Address) -> Bytes {
    simulator
        .call(&system_call(owner(), &calldata("versionOf(address)", &[Value::Address(id)])))
        .expect("query executes")
        .output()
}

fn revert_reason(result: &ExecutionResult) -> Option<String> {
    match result {
        ExecutionResult::Revert { output, .. } => abi::decode_revert_reason(output),
        _ => None,
    }
}

#[test]
fn committed_deploy_is_visible_to_queries() {
    let store = Store::new();
    let simulator = system_simulator(store);
    let tx = Transaction {
        sender: owner(),
        to: Some(SYSTEM_CONTRACT_ADDRESS),
        gas_limit: 1_000_000,
        data: deploy_data(),
        ..Default::default()
    };
    let result = simulator
        .apply_transaction(&tx, 10, true)
        .expect("deploy executes");
    assert!(result.is_success(), "{result:?}");
    let id = aspect_id(owner(), 0);
    assert_eq!(result.output().as_ref(), abi::encode(&[Value::Address(id)]).as_slice());

    assert_eq!(
        version_of(&simulator, id).as_ref(),
        abi::encode(&[Value::uint(1)]).as_slice()
    );
}

#[test]
fn simulated_deploy_does_not_persist() {
    let simulator = system_simulator(Store::new());
    let result = simulator
        .call(&system_call(owner(), &deploy_data()))
        .expect("deploy executes");
    assert!(result.is_success(), "{result:?}");

    let id = aspect_id(owner(), 0);
    assert_eq!(
        version_of(&simulator, id).as_ref(),
        abi::encode(&[Value::uint(0)]).as_slice()
    );
}

#[test]
fn unknown_methods_revert() {
    let simulator = system_simulator(Store::new());
    let data = calldata("operation(address,bytes)", &[
        Value::Address(owner()),
        Value::Bytes(Bytes::new()),
    ]);
    let result = simulator
        .call(&system_call(owner(), &data))
        .expect("call executes");
    let reason = revert_reason(&result).expect("revert reason");
    assert!(reason.starts_with("method 0x") && reason.ends_with("not found"), "{reason}");

    let err = simulator
        .estimate_gas(&system_call(owner(), &data))
        .expect_err("never succeeds");
    assert!(matches!(err, QueryError::Revert { reason: Some(_), .. }), "{err}");
}

#[test]
fn system_calls_can_be_estimated() {
    let simulator = system_simulator(Store::new());
    let gas = simulator
        .estimate_gas(&system_call(owner(), &deploy_data()))
        .expect("estimation succeeds");
    assert!(gas > TX_GAS);
    let short = simulator
        .call(&system_call_with_gas(owner(), &deploy_data(), Some(gas - 1)))
        .expect("call executes");
    assert!(!short.is_success());
    let exact = simulator
        .call(&system_call_with_gas(owner(), &deploy_data(), Some(gas)))
        .expect("call executes");
    assert!(exact.is_success(), "{exact:?}");
}
