use crate::common::TestHarness;
use calc_flow::services::CalculationService;
use calc_flow::state_machine::{StateId, StateMachineError};
use calc_flow::workflows::CalculationType;

#[tokio::test]
async fn test_next_state_walks_cash_flow_to_finished() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let service = CalculationService::new(harness.registry.clone());

    let states = service.next_state("cash_flow", &machine_id).await.unwrap();
    assert_eq!(states, vec![StateId::from("DATA_PREPARED")]);

    let mut steps = 1;
    loop {
        match service.next_state("cash_flow", &machine_id).await {
            Ok(_) => steps += 1,
            Err(StateMachineError::NoTransitionAvailable { states, .. }) => {
                assert_eq!(states, vec!["FINISHED".to_string()]);
                break;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(steps, 16);
    assert_eq!(harness.statuses(&machine_id).len(), 16);
}

#[tokio::test]
async fn test_next_state_drives_vssdv_through_join() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::Vssdv);
    let service = CalculationService::new(harness.registry.clone());

    let mut last = Vec::new();
    while let Ok(states) = service.next_state("vssdv", &machine_id).await {
        last = states;
    }

    assert_eq!(last, vec![StateId::from("VSSDV_FINISHED")]);
    assert!(harness
        .statuses(&machine_id)
        .contains(&"VSSDV_STARTED".to_string()));
    assert_eq!(
        service.current_states("vssdv", &machine_id).await.unwrap(),
        vec![StateId::from("VSSDV_FINISHED")]
    );
}

#[tokio::test]
async fn test_send_event_reports_rejection() {
    let harness = TestHarness::new();
    let machine_id = harness.register(CalculationType::CashFlow);
    let service = CalculationService::new(harness.registry.clone());

    let result = service.send_event("cash_flow", &machine_id, "CALC_DONE").await;
    assert!(matches!(
        result,
        Err(StateMachineError::EventNotAccepted { .. })
    ));

    let states = service
        .send_event("cash_flow", &machine_id, "ERROR")
        .await
        .unwrap();
    assert_eq!(states, vec![StateId::from("ERROR")]);
}
