use crate::common::{FlakyStatusStore, TestHarness};
use calc_flow::config::EngineConfig;
use calc_flow::registry::{Calculation, InMemoryCalculationRegistry, MachineRegistry};
use calc_flow::state_machine::{StateId, StateMachineError};
use calc_flow::workflows::CalculationType;
use futures::future::join_all;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_yields_one_running_instance() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = harness.registry.clone();
            let machine_id = machine_id.clone();
            tokio::spawn(async move {
                let machine = registry.acquire("vssdv", &machine_id).await.unwrap();
                assert!(machine.is_running());
                machine
            })
        })
        .collect();

    let machines: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(harness.registry.len(), 1);
    assert!(machines
        .iter()
        .all(|machine| Arc::ptr_eq(machine, &machines[0])));
    assert!(harness.statuses(&machine_id).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_machines_progress_independently() {
    let harness = TestHarness::new();
    let machine_ids: Vec<String> = (0..8)
        .map(|_| harness.register(CalculationType::CashFlow))
        .collect();

    let handles: Vec<_> = machine_ids
        .iter()
        .cloned()
        .map(|machine_id| {
            let registry = harness.registry.clone();
            tokio::spawn(async move {
                let machine = registry.acquire("cash_flow", &machine_id).await.unwrap();
                for event in ["DATA_PREPARED", "DATA_STAGED", "ETL_START"] {
                    assert!(machine.send(event).await.unwrap().accepted);
                }
            })
        })
        .collect();

    for joined in join_all(handles).await {
        joined.unwrap();
    }

    for machine_id in &machine_ids {
        assert_eq!(
            harness.statuses(machine_id),
            vec!["DATA_PREPARED", "DATA_STAGED", "ETL_START"]
        );
    }
}

#[tokio::test]
async fn test_send_after_release_is_rejected() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let machine = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();

    harness.registry.release(&machine_id).await.unwrap();

    assert!(!machine.is_running());
    assert!(matches!(
        machine.send("DATA_PREPARED").await,
        Err(StateMachineError::MachineNotRunning { .. })
    ));
    assert!(harness.statuses(&machine_id).is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_every_machine() {
    let harness = TestHarness::new();
    let cash_flow = harness.register(CalculationType::CashFlow);
    let vssdv = harness.register(CalculationType::Vssdv);

    let first = harness.registry.acquire("CASH_FLOW", &cash_flow).await.unwrap();
    let second = harness.registry.acquire("Vssdv", &vssdv).await.unwrap();
    assert_eq!(harness.registry.stats().running_machines, 2);

    tokio_test::assert_ok!(harness.registry.shutdown().await);

    assert!(harness.registry.is_empty());
    assert!(!first.is_running());
    assert!(!second.is_running());
}

#[tokio::test]
async fn test_unknown_type_is_rejected_before_lookup() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);

    let result = harness.registry.acquire("interest_rate", &machine_id).await;
    match result {
        Err(StateMachineError::UnknownMachineType { machine_type }) => {
            assert_eq!(machine_type, "interest_rate");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_instance_released_mid_acquire_is_not_restarted() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();

    // an acquire that looked the instance up just before a concurrent release
    let looked_up = harness.registry.get(&machine_id).unwrap();
    harness.registry.release(&machine_id).await.unwrap();

    assert!(matches!(
        looked_up.activate().await,
        Err(StateMachineError::MachineReleased { .. })
    ));
    assert!(!looked_up.is_running());

    let fresh = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&fresh, &looked_up));
    assert_eq!(harness.registry.stats().running_machines, 1);

    assert!(fresh.send("DATA_PREPARED").await.unwrap().accepted);
    assert!(matches!(
        looked_up.send("DATA_PREPARED").await,
        Err(StateMachineError::MachineNotRunning { .. })
    ));
    assert_eq!(harness.statuses(&machine_id), vec!["DATA_PREPARED"]);
}

#[tokio::test]
async fn test_stalled_stop_times_out_and_evicts() {
    let store = Arc::new(FlakyStatusStore::new());
    let calculations = Arc::new(InMemoryCalculationRegistry::new());
    let machine_id = calculations.register(Calculation::new("stalled", CalculationType::CashFlow));
    let registry = MachineRegistry::new(
        store.clone(),
        calculations,
        EngineConfig {
            lifecycle_timeout_ms: 50,
            command_buffer_size: 4,
        },
    )
    .unwrap();
    let machine = registry.acquire("cash_flow", &machine_id).await.unwrap();

    // the processor blocks inside append, so the stop command is never read
    store.set_stalled(true);
    let pending_send = tokio::spawn({
        let machine = machine.clone();
        async move { machine.send("DATA_PREPARED").await }
    });
    store.wait_for_append().await;

    match registry.release(&machine_id).await {
        Err(StateMachineError::LifecycleTimeout {
            operation,
            timeout_ms,
            ..
        }) => {
            assert_eq!(operation, "stop");
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(registry.get(&machine_id).is_none());
    assert!(!machine.is_running());
    assert!(matches!(
        pending_send.await.unwrap(),
        Err(StateMachineError::MachineNotRunning { .. })
    ));
    assert!(store.statuses(&machine_id).is_empty());

    // the next acquire starts over from the store
    store.set_stalled(false);
    let fresh = registry.acquire("cash_flow", &machine_id).await.unwrap();
    assert_eq!(fresh.current_states(), vec![StateId::from("STARTED")]);
    registry.shutdown().await.unwrap();
}
