//! Scripted central dispatch: a timed setpoint command retargets a
//! running control loop mid-simulation.
//!
//! The local loop holds the reservoir at 51.0 m until simulated time
//! reaches 500 s; then a one-shot command raises the controller's
//! setpoint to 51.5 m and the loop settles around the new target. The
//! command must take effect at the first step at or after its time,
//! never before.

use sluice_core::ComponentId;
use sluice_engine::{ScenarioSpec, Scheduler};

fn scenario() -> ScenarioSpec {
    serde_json::from_value(serde_json::json!({
        "simulation": { "duration": 4000.0, "dt": 10.0 },
        "components": [
            { "id": "res_1", "kind": "reservoir",
              "initial_state": { "water_level": 51.0 },
              "parameters": { "surface_area": 1.0e4 } },
            { "id": "gate_1", "kind": "gate", "parameters": {} }
        ],
        "edges": [
            { "upstream": "res_1", "downstream": "gate_1" }
        ],
        "agents": [
            { "id": "inflow_1", "kind": "constant_inflow",
              "config": { "target_id": "res_1", "rate": 10.0 } },
            { "id": "twin_1", "kind": "digital_twin",
              "config": { "component_id": "res_1" } },
            { "id": "ctrl_1", "kind": "control",
              "config": { "law": "bang_bang", "setpoint": 51.0,
                          "observed_id": "res_1", "controlled_id": "gate_1" } },
            { "id": "dispatch", "kind": "timed_setpoint",
              "config": { "target_agent": "ctrl_1", "setpoint": 51.5,
                          "at_time": 500.0 } }
        ]
    }))
    .unwrap()
}

#[test]
fn setpoint_change_applies_at_its_scheduled_time() {
    let record = Scheduler::assemble(&scenario()).unwrap().run().unwrap();
    let levels = record.series(&ComponentId::new("res_1"), "water_level");

    // Before t = 500 s (step 50) the loop holds the original setpoint;
    // the level never approaches the raised one.
    let early_max = levels[..45].iter().cloned().fold(f64::MIN, f64::max);
    assert!(
        early_max < 51.4,
        "level moved toward the new setpoint too early: {early_max}"
    );

    // Afterwards the loop settles around 51.5.
    let late = &levels[300..];
    let late_max = late.iter().cloned().fold(f64::MIN, f64::max);
    let late_min = late.iter().cloned().fold(f64::MAX, f64::min);
    assert!(late_max > 51.45, "never reached new setpoint: {late_max}");
    assert!(late_max < 51.8, "overshot new setpoint: {late_max}");
    assert!(late_min > 50.8, "fell far below new setpoint: {late_min}");
}
