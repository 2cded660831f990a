use crate::common::TestHarness;
use calc_flow::state_machine::StateId;
use calc_flow::workflows::pipeline::STAGES;
use calc_flow::workflows::CalculationType;

#[tokio::test]
async fn test_linear_happy_path_persists_one_snapshot_per_event() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let machine = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();

    let events = [
        "DATA_PREPARED",
        "DATA_STAGED",
        "ETL_START",
        "ETL_SENT",
        "ETL_ACCEPTED",
        "ETL_DONE",
    ];
    for event in events {
        let outcome = machine.send(event).await.unwrap();
        assert!(outcome.accepted, "{event} should be accepted");
    }

    assert_eq!(machine.current_states(), vec![StateId::from("ETL_DONE")]);

    let history = harness.store.history(&machine_id);
    assert_eq!(history.len(), 6);
    assert!(history
        .iter()
        .all(|snapshot| snapshot.secondary_states.is_empty()));
    assert_eq!(harness.statuses(&machine_id), events.to_vec());
}

#[tokio::test]
async fn test_invalid_then_valid_event() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let machine = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();

    let rejected = machine.send("ETL_DONE").await.unwrap();
    assert!(!rejected.accepted);
    assert_eq!(rejected.states, vec![StateId::from("STARTED")]);
    assert!(harness.statuses(&machine_id).is_empty());

    let accepted = machine.send("DATA_PREPARED").await.unwrap();
    assert!(accepted.accepted);

    let history = harness.store.history(&machine_id);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].main_state.as_str(), "DATA_PREPARED");
    assert!(history[0].secondary_states.is_empty());
}

#[tokio::test]
async fn test_error_collapses_and_absorbs_further_events() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let machine = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();

    machine.send("DATA_PREPARED").await.unwrap();
    let outcome = machine.send("ERROR").await.unwrap();
    assert!(outcome.accepted);
    assert_eq!(outcome.states, vec![StateId::from("ERROR")]);

    for stage in STAGES.iter().chain(["ERROR"].iter()) {
        let outcome = machine.send(*stage).await.unwrap();
        assert!(!outcome.accepted, "{stage} accepted from ERROR");
    }
    assert_eq!(harness.statuses(&machine_id), vec!["DATA_PREPARED", "ERROR"]);
}

#[tokio::test]
async fn test_finished_calculation_rejects_error_event() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let machine = harness
        .registry
        .acquire("cash_flow", &machine_id)
        .await
        .unwrap();

    for stage in &STAGES[1..] {
        assert!(machine.send(*stage).await.unwrap().accepted);
    }
    assert_eq!(machine.current_states(), vec![StateId::from("FINISHED")]);

    assert!(!machine.send("ERROR").await.unwrap().accepted);
    assert_eq!(harness.statuses(&machine_id).len(), STAGES.len() - 1);
}
