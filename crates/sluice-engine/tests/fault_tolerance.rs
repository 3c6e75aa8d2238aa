//! Controller loss and supervisory takeover.
//!
//! Twin reservoirs each run their own level controller. A failure
//! injection kills one controller mid-run; its reservoir drifts away
//! from the shared setpoint. The supervisor watches both twins and, once
//! the levels diverge past its threshold, commands a corrective setpoint
//! to the surviving controller.

use sluice_core::{AgentId, ComponentId};
use sluice_engine::{ScenarioSpec, Scheduler};

fn scenario() -> ScenarioSpec {
    serde_json::from_value(serde_json::json!({
        "simulation": { "duration": 6000.0, "dt": 10.0 },
        "components": [
            { "id": "res_a", "kind": "reservoir",
              "initial_state": { "water_level": 51.0 },
              "parameters": { "surface_area": 1.0e4 } },
            { "id": "gate_a", "kind": "gate", "parameters": {} },
            { "id": "res_b", "kind": "reservoir",
              "initial_state": { "water_level": 51.0 },
              "parameters": { "surface_area": 1.0e4 } },
            { "id": "gate_b", "kind": "gate", "parameters": {} }
        ],
        "edges": [
            { "upstream": "res_a", "downstream": "gate_a" },
            { "upstream": "res_b", "downstream": "gate_b" }
        ],
        "agents": [
            { "id": "inflow_a", "kind": "constant_inflow",
              "config": { "target_id": "res_a", "rate": 10.0 } },
            { "id": "inflow_b", "kind": "constant_inflow",
              "config": { "target_id": "res_b", "rate": 10.0 } },
            { "id": "twin_a", "kind": "digital_twin",
              "config": { "component_id": "res_a" } },
            { "id": "twin_b", "kind": "digital_twin",
              "config": { "component_id": "res_b" } },
            { "id": "ctrl_a", "kind": "control",
              "config": { "law": "bang_bang", "setpoint": 51.0,
                          "observed_id": "res_a", "controlled_id": "gate_a" } },
            { "id": "ctrl_b", "kind": "control",
              "config": { "law": "bang_bang", "setpoint": 51.0,
                          "observed_id": "res_b", "controlled_id": "gate_b" } },
            { "id": "saboteur", "kind": "failure_injection",
              "config": { "target_agent": "ctrl_a", "at_time": 1000.0 } },
            { "id": "supervisor", "kind": "supervisory",
              "config": { "observed_id_a": "res_a", "observed_id_b": "res_b",
                          "target_agent": "ctrl_b", "threshold": 1.0,
                          "corrective_setpoint": 50.2 } }
        ]
    }))
    .unwrap()
}

#[test]
fn failed_controller_is_deactivated_and_survivor_retargeted() {
    let mut scheduler = Scheduler::assemble(&scenario()).unwrap();
    let steps = scheduler.total_steps();
    for _ in 0..steps {
        scheduler.step().unwrap();
    }

    assert!(!scheduler.agent_active(&AgentId::new("ctrl_a")));
    assert!(scheduler.agent_active(&AgentId::new("ctrl_b")));

    let record = scheduler.record();
    let a = record.series(&ComponentId::new("res_a"), "water_level");
    let b = record.series(&ComponentId::new("res_b"), "water_level");

    // Before the failure both loops hold the shared setpoint.
    assert!((b[50] - 51.0).abs() < 0.5, "b drifted early: {}", b[50]);
    assert!((a[50] - 51.0).abs() < 0.5, "a drifted early: {}", a[50]);

    // After takeover the survivor tracks the corrective setpoint while
    // the orphaned reservoir keeps drifting.
    let a_final = *a.last().unwrap();
    let b_final = *b.last().unwrap();
    assert!(
        b_final > 49.5 && b_final < 50.7,
        "survivor missed corrective setpoint: {b_final}"
    );
    assert!(
        (a_final - b_final).abs() > 1.0,
        "orphaned reservoir did not drift: a {a_final}, b {b_final}"
    );
}

#[test]
fn without_the_saboteur_both_levels_stay_put() {
    let mut spec = scenario();
    spec.agents.retain(|agent| agent.id.as_str() != "saboteur");
    let record = Scheduler::assemble(&spec).unwrap().run().unwrap();

    let a_final = *record
        .series(&ComponentId::new("res_a"), "water_level")
        .last()
        .unwrap();
    let b_final = *record
        .series(&ComponentId::new("res_b"), "water_level")
        .last()
        .unwrap();
    // No divergence, so the supervisor never fires and both loops keep
    // the shared setpoint.
    assert!((a_final - 51.0).abs() < 0.6, "a: {a_final}");
    assert!((b_final - 51.0).abs() < 0.6, "b: {b_final}");
}
