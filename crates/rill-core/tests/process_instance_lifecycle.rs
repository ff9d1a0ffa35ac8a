mod common;

use common::{approval_script, harness, order, params, ORDERS};
use rill_core::{
    CoreError, EngineProcessInstance, ProcessInstanceStatus, Signal, UnitOfWork, VariableMap,
    VARIABLES_KEY,
};
use rill_test_utils::assertions::{assert_no_actions, assert_single_action, assert_status, ExpectedAction};
use rill_test_utils::ProcessScript;
use serde_json::json;

#[test]
fn test_start_leaves_instance_active_with_one_work_item() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    assert_status(&instance, ProcessInstanceStatus::Pending).unwrap();

    let mut uow = UnitOfWork::new();
    instance.start(&mut uow).unwrap();

    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
    let items = instance.work_items(&[]).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "wi-1");
    assert_eq!(items[0].name, "Approve order");
    assert_eq!(uow.len(), 1);
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();
}

#[test]
fn test_completing_last_work_item_enqueues_single_removal() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    instance
        .complete_work_item("wi-1", params(&[("result", json!("ok"))]), &[], &mut uow)
        .unwrap();

    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert_eq!(instance.variables().result.as_deref(), Some("ok"));
    assert_eq!(uow.len(), 1);
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
}

#[test]
fn test_synchronous_completion_on_start() {
    let h = harness(ProcessScript::new(ORDERS).set_variable("approved", json!(true)));
    let mut instance = h.process.create_instance(order()).unwrap();

    let mut uow = UnitOfWork::new();
    instance.start(&mut uow).unwrap();

    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert!(instance.variables().approved);
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
}

#[test]
fn test_start_on_started_instance_is_invalid_state() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    let err = instance.start(&mut uow).unwrap_err();

    assert!(matches!(err, CoreError::InvalidState(_)));
    assert!(uow.is_empty());
    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
}

#[test]
fn test_start_after_abort_is_invalid_state() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.abort(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    assert!(matches!(instance.start(&mut uow), Err(CoreError::InvalidState(_))));
    assert_no_actions(&uow, instance.id()).unwrap();
}

#[test]
fn test_abort_always_enqueues_removal() {
    let h = harness(approval_script());

    // Pending
    let mut pending = h.process.create_instance(order()).unwrap();
    let mut uow = UnitOfWork::new();
    pending.abort(&mut uow).unwrap();
    assert_status(&pending, ProcessInstanceStatus::Aborted).unwrap();
    assert_single_action(&uow, pending.id(), ExpectedAction::Remove).unwrap();

    // Active
    let mut active = h.process.create_instance(order()).unwrap();
    active.start(&mut UnitOfWork::new()).unwrap();
    let mut uow = UnitOfWork::new();
    active.abort(&mut uow).unwrap();
    assert_status(&active, ProcessInstanceStatus::Aborted).unwrap();
    assert_single_action(&uow, active.id(), ExpectedAction::Remove).unwrap();
    assert!(active.cached_error().is_none());
}

#[test]
fn test_abort_unregisters_completion_listener() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    let engine = h.runtime.instance(instance.id()).unwrap();
    assert_eq!(engine.listener_count(), 1);

    instance.abort(&mut UnitOfWork::new()).unwrap();
    assert_eq!(engine.listener_count(), 0);
}

#[test]
fn test_engine_suspension_enqueues_single_removal() {
    let h = harness(
        ProcessScript::new(ORDERS)
            .work_item("n1", "Approve", VariableMap::new())
            .suspend("n2"),
    );
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    let engine = h.runtime.instance(instance.id()).unwrap();

    let mut uow = h.process.unit_of_work();
    instance
        .complete_work_item("wi-1", VariableMap::new(), &[], &mut uow)
        .unwrap();

    assert_status(&instance, ProcessInstanceStatus::Suspended).unwrap();
    assert_eq!(uow.len(), 1);
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
    assert_eq!(engine.listener_count(), 0);
    assert!(instance.cached_error().is_none());
}

#[test]
fn test_reloading_finished_instance_does_not_listen_again() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    instance
        .complete_work_item("wi-1", VariableMap::new(), &[], &mut UnitOfWork::new())
        .unwrap();
    let engine = h.runtime.instance(instance.id()).unwrap();
    assert_eq!(engine.listener_count(), 0);

    instance.detach(h.runtime.reload_supplier(instance.id()));
    assert!(instance.work_items(&[]).unwrap().is_empty());

    assert!(instance.is_attached());
    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert_eq!(engine.listener_count(), 0);
}

#[test]
fn test_reloading_active_instance_listens_again() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    let engine = h.runtime.instance(instance.id()).unwrap();

    instance.detach(h.runtime.reload_supplier(instance.id()));
    assert_eq!(instance.work_items(&[]).unwrap().len(), 1);
    assert_eq!(engine.listener_count(), 1);
}

#[test]
fn test_signal_drives_instance_to_completion() {
    let h = harness(ProcessScript::new(ORDERS).wait_signal("n2", "payment"));
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    // Wrong channel leaves the instance waiting
    let mut uow = UnitOfWork::new();
    instance
        .send(Signal::new("shipment", json!({})), &mut uow)
        .unwrap();
    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();

    let mut uow = UnitOfWork::new();
    instance
        .send(Signal::new("payment", json!({ "paid": true })), &mut uow)
        .unwrap();
    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();

    // The completion the engine posted was already observed
    let mut later = UnitOfWork::new();
    assert_eq!(instance.process_completions(&mut later).unwrap(), 0);
    assert!(later.is_empty());
}

#[test]
fn test_external_completion_is_dispatched_once() {
    let h = harness(ProcessScript::new(ORDERS).wait_signal("n2", "payment"));
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    h.runtime
        .broadcast_signal("payment", json!({ "paid": true }))
        .unwrap();
    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();

    let mut uow = UnitOfWork::new();
    assert_eq!(instance.process_completions(&mut uow).unwrap(), 1);
    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();

    let mut again = UnitOfWork::new();
    assert_eq!(instance.process_completions(&mut again).unwrap(), 0);
    assert!(again.is_empty());
}

#[test]
fn test_update_variables_writes_engine_store() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut updated = instance.variables().clone();
    updated.amount = 99.5;
    updated.approved = true;

    let mut uow = UnitOfWork::new();
    instance.update_variables(&updated, &mut uow).unwrap();

    let engine = h.runtime.instance(instance.id()).unwrap();
    let variables = engine.variables();
    assert_eq!(variables["amount"], json!(99.5));
    assert_eq!(variables[VARIABLES_KEY]["approved"], json!(true));
    assert_eq!(instance.variables(), &updated);
    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();
}

#[test]
fn test_record_round_trips_when_engine_makes_no_change() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    assert_eq!(instance.variables(), &order());
}

#[test]
fn test_unknown_process_definition_fails_creation() {
    let h = harness(approval_script());
    let other = rill_core::Process::<common::Order>::new(
        rill_core::ProcessDefinition::new("missing", "Missing"),
        h.runtime.clone(),
        h.store.clone(),
    );

    let err = other.create_instance(order()).unwrap_err();
    assert!(matches!(err, CoreError::ProcessDefinitionError(_)));
}

#[test]
fn test_lifecycle_records_domain_events() {
    let h = harness(approval_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();
    instance
        .complete_work_item("wi-1", VariableMap::new(), &[], &mut UnitOfWork::new())
        .unwrap();

    let events = instance.take_events();
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            "process_instance.created",
            "process_instance.state_changed",
            "work_item.transitioned",
            "process_instance.state_changed",
        ]
    );
    assert!(events.iter().all(|e| e.process_instance_id() == instance.id()));
    assert!(instance.take_events().is_empty());
}
