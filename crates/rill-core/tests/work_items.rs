mod common;

use common::{harness, order, params, ORDERS};
use rill_core::domain::work_item::{phase, state};
use rill_core::{
    CoreError, Identity, Policy, ProcessInstanceStatus, RuntimeConfig, SecurityPolicy, Transition,
    UnitOfWork, VariableMap,
};
use rill_test_utils::assertions::{assert_single_action, assert_status, ExpectedAction};
use rill_test_utils::ProcessScript;
use serde_json::json;
use std::sync::Arc;

fn restricted_script() -> ProcessScript {
    ProcessScript::new(ORDERS)
        .work_item(
            "n1",
            "Approve",
            params(&[
                ("TaskName", json!("Approve order")),
                ("ActorId", json!("alice")),
                ("GroupId", json!("managers, auditors")),
                ("ExcludedOwnerId", json!("mallory")),
            ]),
        )
        .work_item("n2", "Ship", VariableMap::new())
}

fn policy(name: &str, roles: &[&str]) -> Arc<dyn Policy> {
    SecurityPolicy::of(Identity::new(name, roles.iter().copied()))
}

#[test]
fn test_policies_filter_work_items() {
    let h = harness(restricted_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    assert_eq!(instance.work_items(&[]).unwrap().len(), 1);
    assert_eq!(instance.work_items(&[policy("alice", &[])]).unwrap().len(), 1);
    assert_eq!(instance.work_items(&[policy("carol", &["auditors"])]).unwrap().len(), 1);
    assert!(instance.work_items(&[policy("bob", &["clerks"])]).unwrap().is_empty());
    assert!(instance
        .work_items(&[policy("mallory", &["managers"])])
        .unwrap()
        .is_empty());
}

#[test]
fn test_hidden_work_item_is_not_found() {
    let h = harness(restricted_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let item = instance.work_item("wi-1", &[policy("alice", &[])]).unwrap();
    assert_eq!(item.name, "Approve order");
    assert_eq!(item.state, state::PENDING);

    let err = instance.work_item("wi-1", &[policy("bob", &[])]).unwrap_err();
    assert_eq!(
        err,
        CoreError::WorkItemNotFound {
            work_item_id: "wi-1".to_string(),
            process_instance_id: instance.id().to_string(),
        }
    );
    assert!(instance.work_item("wi-42", &[]).unwrap_err().is_not_found());
}

#[test]
fn test_unauthorized_completion_is_rejected() {
    let h = harness(restricted_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    let err = instance
        .complete_work_item("wi-1", VariableMap::new(), &[policy("bob", &[])], &mut uow)
        .unwrap_err();

    assert!(matches!(err, CoreError::NotAuthorized(_)));
    assert!(uow.is_empty());
    assert_eq!(instance.work_items(&[]).unwrap().len(), 1);
}

#[test]
fn test_completion_moves_to_next_work_item() {
    let h = harness(restricted_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    instance
        .complete_work_item(
            "wi-1",
            params(&[("approved", json!(true))]),
            &[policy("alice", &[])],
            &mut uow,
        )
        .unwrap();

    assert_status(&instance, ProcessInstanceStatus::Active).unwrap();
    assert!(instance.variables().approved);
    let items = instance.work_items(&[]).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "wi-2");
    // Node name is used when the task name parameter is absent
    assert_eq!(items[0].name, "Ship");
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();
}

#[test]
fn test_abort_work_item_moves_on() {
    let h = harness(restricted_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    instance
        .abort_work_item("wi-1", &[], &mut UnitOfWork::new())
        .unwrap();
    assert_eq!(instance.work_items(&[]).unwrap()[0].id, "wi-2");

    let mut uow = UnitOfWork::new();
    instance.abort_work_item("wi-2", &[], &mut uow).unwrap();
    assert_status(&instance, ProcessInstanceStatus::Completed).unwrap();
    assert_single_action(&uow, instance.id(), ExpectedAction::Remove).unwrap();
}

#[test]
fn test_claim_transition_updates_phase() {
    let h = harness(restricted_script());
    let mut instance = h.process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    let mut uow = UnitOfWork::new();
    let claim = Transition::new(phase::CLAIM).with_policy(policy("alice", &[]));
    instance.transition_work_item("wi-1", claim, &mut uow).unwrap();

    let item = instance.work_item("wi-1", &[]).unwrap();
    assert_eq!(item.phase_id.as_deref(), Some(phase::CLAIM));
    assert_eq!(item.state, state::ACTIVE);
    assert_single_action(&uow, instance.id(), ExpectedAction::Update).unwrap();

    let complete = Transition::new(phase::COMPLETE)
        .with_data(params(&[("result", json!("shipped"))]))
        .with_policy(policy("alice", &[]));
    instance
        .transition_work_item("wi-1", complete, &mut UnitOfWork::new())
        .unwrap();
    assert_eq!(instance.variables().result.as_deref(), Some("shipped"));
}

#[test]
fn test_task_name_parameter_is_configurable() {
    let h = harness(
        ProcessScript::new(ORDERS).work_item(
            "n1",
            "Approve",
            params(&[("TaskName", json!("ignored")), ("Label", json!("Sign off"))]),
        ),
    );
    let config = RuntimeConfig {
        task_name_parameter: "Label".to_string(),
        ..RuntimeConfig::default()
    };
    let process = h.process.clone().with_config(config);

    let mut instance = process.create_instance(order()).unwrap();
    instance.start(&mut UnitOfWork::new()).unwrap();

    assert_eq!(instance.work_items(&[]).unwrap()[0].name, "Sign off");
}
