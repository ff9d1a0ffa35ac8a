#![allow(dead_code)]

use rill_core::{Process, ProcessDefinition, VariableMap};
use rill_state_inmemory::InMemoryProcessInstances;
use rill_test_utils::{init_tracing, ProcessScript, ScriptedRuntime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const ORDERS: &str = "orders";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub customer: String,
    pub amount: f64,
    pub approved: bool,
    pub result: Option<String>,
}

rill_core::model!(Order { customer, amount, approved, result });

pub fn order() -> Order {
    Order {
        customer: "ACME".to_string(),
        amount: 120.0,
        ..Order::default()
    }
}

pub fn params(entries: &[(&str, serde_json::Value)]) -> VariableMap {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// One approval task, then done
pub fn approval_script() -> ProcessScript {
    ProcessScript::new(ORDERS).work_item(
        "n1",
        "Approve",
        params(&[("TaskName", json!("Approve order"))]),
    )
}

/// Approval task followed by a node that fails once
pub fn failing_script() -> ProcessScript {
    ProcessScript::new(ORDERS)
        .work_item("n1", "Approve", VariableMap::new())
        .fail("n3", "divide by zero", 1)
        .set_variable("approved", json!(true))
}

pub struct Harness {
    pub runtime: Arc<ScriptedRuntime>,
    pub store: Arc<InMemoryProcessInstances>,
    pub process: Process<Order>,
}

pub fn harness(script: ProcessScript) -> Harness {
    init_tracing();

    let runtime = ScriptedRuntime::with_script(script);
    let store = Arc::new(InMemoryProcessInstances::new());
    let process = Process::new(
        ProcessDefinition::new(ORDERS, "Order approval").with_version("1.0"),
        runtime.clone(),
        store.clone(),
    );

    Harness {
        runtime,
        store,
        process,
    }
}
