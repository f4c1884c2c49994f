use ethereum_types::U256;
use hostevm_blockchain::evm_config::base_fee_from_events;
use hostevm_common::{
    constants::{ATTRIBUTE_KEY_BASE_FEE, EVENT_TYPE_FEE_MARKET},
    types::Event,
};
use hostevm_storage::Store;
use hostevm_test::{ScriptedExecutor, StaticChainParams, simulator};

fn fee_event(value: u64) -> Event {
    Event::new(EVENT_TYPE_FEE_MARKET).with_attribute(ATTRIBUTE_KEY_BASE_FEE, value.to_string())
}

/// Deterministic mix of fee market and unrelated events.
fn events(seed: u64, len: usize) -> Vec<Event> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            if state >> 62 == 0 {
                fee_event(state % 1_000_000_000)
            } else {
                Event::new("coin_received").with_attribute("amount", (state % 97).to_string())
            }
        })
        .collect()
}

fn last_forward_occurrence(events: &[Event]) -> Option<U256> {
    let mut found = None;
    for event in events {
        if event.kind == EVENT_TYPE_FEE_MARKET {
            found = event
                .attribute(ATTRIBUTE_KEY_BASE_FEE)
                .and_then(|value| U256::from_dec_str(value).ok());
        }
    }
    found
}

#[test]
fn reverse_scan_matches_the_last_forward_occurrence() {
    for seed in 0..200 {
        let events = events(seed, (seed % 17) as usize);
        assert_eq!(
            base_fee_from_events(&events),
            last_forward_occurrence(&events),
            "seed {seed}"
        );
    }
}

#[test]
fn simulator_falls_back_to_block_events() {
    let host = StaticChainParams {
        events: vec![fee_event(100), Event::new("transfer"), fee_event(250)],
        ..Default::default()
    };
    let simulator = simulator(Store::new(), host.clone(), ScriptedExecutor::new());
    assert_eq!(simulator.base_fee(5).expect("resolves"), Some(U256::from(250)));

    let with_module = StaticChainParams {
        base_fee: Some(U256::from(7)),
        ..host
    };
    let simulator = hostevm_test::simulator(Store::new(), with_module, ScriptedExecutor::new());
    assert_eq!(simulator.base_fee(5).expect("resolves"), Some(U256::from(7)));

    let pre_fee_market =
        hostevm_test::simulator(Store::new(), StaticChainParams::default(), ScriptedExecutor::new());
    assert_eq!(pre_fee_market.base_fee(5).expect("resolves"), None);
}
