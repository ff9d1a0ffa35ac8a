mod common;

use common::{failing_script, harness, order, Harness, Order};
use rill_core::{
    CoreError, ProcessInstance, ProcessInstanceStatus, RecoveryAction, UnitOfWork, VariableMap,
};
use rill_test_utils::assertions::{assert_errored_at, assert_single_action, assert_status, ExpectedAction};
use rill_test_utils::ProcessScript;
use std::sync::Arc;

/// Start the failing process and complete its approval task
fn errored(h: &Harness) -> ProcessInstance<Order> {
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    instance
        .complete_work_item("wi-1", VariableMap::new(), &[], &mut UnitOfWork::new())
        .unwrap();
    instance
}

#[test]
fn test_engine_failure_is_recorded_as_error_state() {
    let h = harness(failing_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    instance
        .complete_work_item("wi-1", VariableMap::new(), &[], &mut uow)
        .unwrap();

    assert_errored_at(&instance, "n3").unwrap();
    let snapshot = instance.error().unwrap().unwrap();
    assert_eq!(snapshot.failed_node_id(), "n3");
    assert_eq!(snapshot.error_message(), "divide by zero");

    // ERROR is in flight, so the snapshot is persisted with the instance
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();
    let final_actions = uow.final_actions();
    match final_actions[instance.id()] {
        rill_core::StoreAction::Update(view) => {
            assert_eq!(view.status, ProcessInstanceStatus::Error);
            assert_eq!(view.error.as_ref(), Some(&snapshot));
        }
        other => panic!("unexpected action {:?}", other),
    }
}

#[test]
fn test_retrigger_clears_error() {
    let h = harness(failing_script());
    let mut instance = errored(&h);
    assert_status(&instance, ProcessInstanceStatus::Error).unwrap();

    let mut uow = UnitOfWork::new();
    instance.retrigger(&mut uow).unwrap();

    assert_ne!(instance.status(), ProcessInstanceStatus::Error);
    assert!(instance.cached_error().is_none());
    assert!(instance.error().unwrap().is_none());
    // The node succeeds the second time and the process runs to the end
    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert!(instance.variables().approved);
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
}

#[test]
fn test_retrigger_failing_again_captures_fresh_snapshot() {
    let h = harness(
        ProcessScript::new(common::ORDERS)
            .fail("n3", "divide by zero", 2)
            .work_item("n4", "Review", VariableMap::new()),
    );
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    assert_errored_at(&instance, "n3").unwrap();

    let mut uow = UnitOfWork::new();
    instance.retrigger(&mut uow).unwrap();

    assert_errored_at(&instance, "n3").unwrap();
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();

    instance.retrigger(&mut UnitOfWork::new()).unwrap();
    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
    assert_eq!(instance.work_items(&[]).unwrap()[0].name, "Review");
}

#[test]
fn test_skip_completes_failed_node_without_running_it() {
    let h = harness(failing_script());
    let mut instance = errored(&h);

    let mut uow = UnitOfWork::new();
    instance.skip(&mut uow).unwrap();

    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert!(instance.cached_error().is_none());
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
}

#[test]
fn test_recover_records_event() {
    let h = harness(failing_script());
    let mut instance = errored(&h);
    instance.take_events();

    instance
        .recover(RecoveryAction::Skip, &mut UnitOfWork::new())
        .unwrap();

    let types: Vec<_> = instance.take_events().iter().map(|e| e.event_type()).collect();
    assert!(types.contains(&"process_instance.recovered"));
    assert!(types.contains(&"process_instance.state_changed"));
}

#[test]
fn test_recovery_without_error_is_invalid_state() {
    let h = harness(failing_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    assert!(matches!(instance.retrigger(&mut uow), Err(CoreError::InvalidState(_))));
    assert!(matches!(instance.skip(&mut uow), Err(CoreError::InvalidState(_))));
    assert!(uow.is_empty());
    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
}

#[test]
fn test_error_snapshot_survives_eviction() {
    let h = harness(failing_script());
    let mut instance = errored(&h);

    instance.detach(h.runtime.reload_supplier(instance.id()));
    h.runtime.forget(instance.id());

    assert!(!instance.is_attached());
    let snapshot = instance.error().unwrap().unwrap();
    assert_eq!(snapshot.failed_node_id(), "n3");
    assert_eq!(snapshot.error_message(), "divide by zero");
}

#[test]
fn test_recovery_of_lost_instance_is_not_found() {
    let h = harness(failing_script());
    let mut instance = errored(&h);
    instance.detach(Arc::new(|| -> Option<rill_core::SharedProcessInstance> { None }));

    let err = instance.retrigger(&mut UnitOfWork::new()).unwrap_err();
    assert_eq!(
        err,
        CoreError::ProcessInstanceNotFound(instance.id().to_string())
    );
    assert_errored_at(&instance, "n3").unwrap();
}

#[test]
fn test_abort_from_error_removes_and_clears_snapshot() {
    let h = harness(failing_script());
    let mut instance = errored(&h);

    let mut uow = UnitOfWork::new();
    instance.abort(&mut uow).unwrap();

    assert_status(&instance, ProcessInstanceStatus::Aborted).unwrap();
    assert!(instance.cached_error().is_none());
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
}
