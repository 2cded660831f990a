use crate::common::{black_model, var_model, vssdv, TestHarness};
use calc_flow::state_machine::{MachineInstance, StateId};
use calc_flow::workflows::pipeline::STAGES;
use calc_flow::workflows::CalculationType;

fn ids(states: &[String]) -> Vec<StateId> {
    states.iter().map(|state| StateId::from(state.as_str())).collect()
}

async fn finish_branch(machine: &MachineInstance, branch: fn(&str) -> String) {
    for stage in &STAGES[1..] {
        let event = branch(stage);
        let outcome = machine.send(event.clone()).await.unwrap();
        assert!(outcome.accepted, "{event} should be accepted");
    }
}

#[tokio::test]
async fn test_fork_on_start_writes_nothing() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    assert_eq!(
        machine.current_states(),
        ids(&[
            "STARTED".to_string(),
            var_model("STARTED"),
            black_model("STARTED"),
        ])
    );
    assert!(harness.statuses(&machine_id).is_empty());
}

#[tokio::test]
async fn test_branch_progress_snapshot_keeps_declared_order() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    machine.send(var_model("DATA_PREPARED")).await.unwrap();
    machine.send(black_model("DATA_PREPARED")).await.unwrap();
    machine.send(black_model("DATA_STAGED")).await.unwrap();

    let history = harness.store.history(&machine_id);
    assert_eq!(history[0].main_state.as_str(), "STARTED");
    assert_eq!(
        history[0].secondary_states,
        ids(&[var_model("DATA_PREPARED"), black_model("STARTED")])
    );
    assert_eq!(
        harness.statuses(&machine_id),
        vec![
            "STARTED;VAR_MODEL_DATA_PREPARED;BLACK_MODEL_STARTED",
            "STARTED;VAR_MODEL_DATA_PREPARED;BLACK_MODEL_DATA_PREPARED",
            "STARTED;VAR_MODEL_DATA_PREPARED;BLACK_MODEL_DATA_STAGED",
        ]
    );
}

#[tokio::test]
async fn test_join_clears_secondaries() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    finish_branch(&machine, var_model).await;
    assert_eq!(machine.current_states().len(), 3);

    finish_branch(&machine, black_model).await;
    assert_eq!(machine.current_states(), ids(&[vssdv("STARTED")]));

    let statuses = harness.statuses(&machine_id);
    let tail = &statuses[statuses.len() - 2..];
    assert_eq!(
        tail,
        [
            "STARTED;VAR_MODEL_FINISHED;BLACK_MODEL_FINISHED".to_string(),
            "VSSDV_STARTED".to_string(),
        ]
    );

    let join_snapshot = harness.store.history(&machine_id).pop().unwrap();
    assert!(join_snapshot.secondary_states.is_empty());
}

#[tokio::test]
async fn test_final_phase_runs_after_join() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    finish_branch(&machine, black_model).await;
    finish_branch(&machine, var_model).await;
    // branch events are rejected once the branches have been joined
    assert!(!machine.send(var_model("DATA_PREPARED")).await.unwrap().accepted);

    finish_branch(&machine, vssdv).await;
    assert_eq!(machine.current_states(), ids(&[vssdv("FINISHED")]));
    assert!(!machine.send("ERROR").await.unwrap().accepted);
}

#[tokio::test]
async fn test_error_from_forked_state_collapses_regions() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let machine = harness.registry.acquire("vssdv", &machine_id).await.unwrap();

    machine.send(var_model("DATA_PREPARED")).await.unwrap();
    let outcome = machine.send("ERROR").await.unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.states, vec![StateId::from("ERROR")]);
    assert_eq!(harness.statuses(&machine_id).last().map(String::as_str), Some("ERROR"));

    let events = machine.definition().events();
    for event in events {
        assert!(
            !machine.send(event.clone()).await.unwrap().accepted,
            "{event} accepted from ERROR"
        );
    }
}
