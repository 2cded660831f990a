use crate::common::{black_model, fast_engine_config, var_model, FlakyStatusStore, TestHarness};
use calc_flow::registry::{Calculation, InMemoryCalculationRegistry, MachineRegistry};
use calc_flow::state_machine::{StateId, StateMachineError, StatusSnapshot, StatusStore};
use calc_flow::workflows::pipeline::STAGES;
use calc_flow::workflows::CalculationType;
use std::sync::Arc;

async fn seed(harness: &TestHarness, machine_id: &str, status: &str) {
    let snapshot = StatusSnapshot::from_status(machine_id, status, chrono::Utc::now()).unwrap();
    harness.store.append(machine_id, &snapshot).await.unwrap();
}

#[tokio::test]
async fn test_restart_resumes_from_latest_snapshot() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let machine = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();
    for event in ["DATA_PREPARED", "DATA_STAGED", "ETL_START"] {
        machine.send(event).await.unwrap();
    }
    harness.registry.shutdown().await.unwrap();

    // a fresh registry over the same store stands in for a new process
    let restarted = TestHarness::with_store(harness.store.clone());
    let calculation = harness.calculations.get(&machine_id).unwrap();
    restarted.register_calculation(calculation);

    let machine = restarted
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();
    assert_eq!(machine.current_states(), vec![StateId::from("ETL_START")]);
    assert_eq!(restarted.statuses(&machine_id).len(), 3);

    assert!(machine.send("ETL_SENT").await.unwrap().accepted);
    assert_eq!(
        restarted.statuses(&machine_id).last().map(String::as_str),
        Some("ETL_SENT")
    );
}

#[tokio::test]
async fn test_release_then_acquire_writes_nothing() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();
    machine.send("VAR_MODEL_DATA_PREPARED").await.unwrap();
    let before = harness.statuses(&machine_id);

    harness.registry.release(&machine_id).await.unwrap();
    let reacquired = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    assert!(!Arc::ptr_eq(&machine, &reacquired));
    assert_eq!(harness.statuses(&machine_id), before);
    assert_eq!(
        reacquired.current_states(),
        vec![
            StateId::from("STARTED"),
            StateId::from("VAR_MODEL_DATA_PREPARED"),
            StateId::from("BLACK_MODEL_STARTED"),
        ]
    );
}

#[tokio::test]
async fn test_mid_fork_snapshot_restores_both_regions() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    seed(
        &harness,
        &machine_id,
        "STARTED;VAR_MODEL_ETL_SENT;BLACK_MODEL_STARTED",
    )
    .await;

    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();
    machine.send("BLACK_MODEL_DATA_PREPARED").await.unwrap();

    assert_eq!(
        harness.statuses(&machine_id).last().map(String::as_str),
        Some("STARTED;VAR_MODEL_ETL_SENT;BLACK_MODEL_DATA_PREPARED")
    );
}

#[tokio::test]
async fn test_pending_join_is_completed_on_acquire() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    seed(
        &harness,
        &machine_id,
        "STARTED;VAR_MODEL_FINISHED;BLACK_MODEL_FINISHED",
    )
    .await;

    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    assert_eq!(machine.current_states(), vec![StateId::from("VSSDV_STARTED")]);
    assert_eq!(
        harness.statuses(&machine_id),
        vec![
            "STARTED;VAR_MODEL_FINISHED;BLACK_MODEL_FINISHED",
            "VSSDV_STARTED",
        ]
    );
}

#[tokio::test]
async fn test_corrupt_snapshots_fail_acquire_and_evict() {
    let cases = [
        "UNKNOWN_STATE",
        "STARTED;VAR_MODEL_STARTED",
        "STARTED;BLACK_MODEL_STARTED;VAR_MODEL_STARTED",
        "VSSDV_STARTED;VAR_MODEL_STARTED;BLACK_MODEL_STARTED",
        "VAR_MODEL_STARTED",
    ];

    for status in cases {
        let harness = TestHarness::new();
        let machine_id = harness.register(CalculationType::Vssdv);
        seed(&harness, &machine_id, status).await;

        let result = harness.registry.acquire("vssdv", &machine_id).await;
        assert!(
            matches!(result, Err(StateMachineError::CorruptSnapshot { .. })),
            "{status} should be reported as corrupt"
        );
        assert!(harness.registry.get(&machine_id).is_none());
        assert_eq!(harness.statuses(&machine_id), vec![status]);
    }
}

fn flaky_registry() -> (Arc<FlakyStatusStore>, MachineRegistry, String) {
    flaky_registry_for(CalculationType::CashFlow)
}

fn flaky_registry_for(
    calculation_type: CalculationType,
) -> (Arc<FlakyStatusStore>, MachineRegistry, String) {
    let store = Arc::new(FlakyStatusStore::new());
    let calculations = Arc::new(InMemoryCalculationRegistry::new());
    let machine_id = calculations.register(Calculation::new("flaky", calculation_type));
    let registry = MachineRegistry::new(store.clone(), calculations, fast_engine_config()).unwrap();
    (store, registry, machine_id)
}

#[tokio::test]
async fn test_store_failure_does_not_advance_state() {
    let (store, registry, machine_id) = flaky_registry();
    let machine = registry.acquire("cash_flow", &machine_id).await.unwrap();
    machine.send("DATA_PREPARED").await.unwrap();

    store.set_failing(true);
    let result = machine.send("DATA_STAGED").await;
    assert!(matches!(
        result,
        Err(StateMachineError::StoreUnavailable { .. })
    ));
    assert_eq!(machine.current_states(), vec![StateId::from("DATA_PREPARED")]);

    store.set_failing(false);
    assert!(machine.send("DATA_STAGED").await.unwrap().accepted);
    assert_eq!(store.statuses(&machine_id), vec!["DATA_PREPARED", "DATA_STAGED"]);
}

#[tokio::test]
async fn test_rejected_events_never_reach_the_store() {
    let (store, registry, machine_id) = flaky_registry();
    let machine = registry.acquire("cash_flow", &machine_id).await.unwrap();

    for event in ["ETL_DONE", "FINISHED", "NOT_AN_EVENT", "STARTED"] {
        assert!(!machine.send(event).await.unwrap().accepted);
    }
    assert_eq!(store.append_calls(), 0);

    machine.send("DATA_PREPARED").await.unwrap();
    assert_eq!(store.append_calls(), 1);
}

#[tokio::test]
async fn test_join_step_failure_keeps_forked_state_until_reacquire() {
    let (store, registry, machine_id) = flaky_registry_for(CalculationType::Vssdv);
    let machine = registry.acquire("vssdv", &machine_id).await.unwrap();

    for stage in &STAGES[1..] {
        assert!(machine.send(var_model(stage)).await.unwrap().accepted);
    }
    for stage in &STAGES[1..STAGES.len() - 1] {
        assert!(machine.send(black_model(stage)).await.unwrap().accepted);
    }

    // the branch-finish step is written, the join step that follows is not
    store.fail_after(1);
    let result = machine.send(black_model("FINISHED")).await;
    assert!(matches!(
        result,
        Err(StateMachineError::StoreUnavailable { .. })
    ));

    let forked = vec![
        StateId::from("STARTED"),
        StateId::from(var_model("FINISHED")),
        StateId::from(black_model("FINISHED")),
    ];
    assert_eq!(machine.current_states(), forked);
    assert_eq!(
        store.statuses(&machine_id).last().map(String::as_str),
        Some("STARTED;VAR_MODEL_FINISHED;BLACK_MODEL_FINISHED")
    );

    store.set_failing(false);
    registry.release(&machine_id).await.unwrap();
    let machine = registry.acquire("vssdv", &machine_id).await.unwrap();

    assert_eq!(machine.current_states(), vec![StateId::from("VSSDV_STARTED")]);
    assert_eq!(
        store.statuses(&machine_id).last().map(String::as_str),
        Some("VSSDV_STARTED")
    );
}
