//! Pull-based task distribution through the scheduler.
//!
//! A manager with a batch of computation tasks and a pool of workers
//! run as ordinary agents; the whole protocol (announce, assign,
//! compute, report) plays out inside the dispatch rounds of a handful
//! of steps. Every task must complete exactly once, and results must be
//! attributable to workers.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use sluice_agent::{Agent, AgentContext};
use sluice_bus::{Message, Topic};
use sluice_core::{payload, AgentError, AgentId, Payload};
use sluice_engine::{ScenarioSpec, Scheduler};
use sluice_tasks::{Task, TaskManagerAgent, WorkerAgent};

const REQUEST_TOPIC: &str = "tasks/request";
const RESULT_TOPIC: &str = "tasks/result";

/// Records every result message for post-run assertions.
struct ResultProbe {
    id: AgentId,
    seen: Arc<Mutex<Vec<(String, String, f64)>>>,
}

impl Agent for ResultProbe {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn subscriptions(&self) -> Vec<Topic> {
        vec![Topic::from(RESULT_TOPIC)]
    }

    fn on_message(
        &mut self,
        _ctx: &mut AgentContext<'_>,
        message: &Message,
    ) -> Result<(), AgentError> {
        let task = message.get_str("task_id").unwrap_or_default().to_owned();
        let worker = message.get_str("worker").unwrap_or_default().to_owned();
        let square = message.get_f64("square").unwrap_or(f64::NAN);
        self.seen.lock().unwrap().push((task, worker, square));
        Ok(())
    }
}

fn empty_scenario() -> ScenarioSpec {
    serde_json::from_value(serde_json::json!({
        "simulation": { "duration": 5.0, "dt": 1.0 }
    }))
    .unwrap()
}

fn square_handler() -> Box<dyn sluice_tasks::TaskHandler> {
    Box::new(|task: &Payload| {
        let n = task.get("n").and_then(|v| v.as_f64()).unwrap_or(0.0);
        payload! { "square" => n * n }
    })
}

#[test]
fn every_task_completes_exactly_once() {
    let task_count = 8;
    let worker_count = 3;

    let mut scheduler = Scheduler::assemble(&empty_scenario()).unwrap();
    let tasks: Vec<Task> = (0..task_count)
        .map(|i| Task::new(format!("task_{i}"), payload! { "n" => i as i64 }))
        .collect();
    scheduler
        .add_agent(Box::new(TaskManagerAgent::new(
            AgentId::new("manager"),
            Topic::from(REQUEST_TOPIC),
            Topic::from(RESULT_TOPIC),
            tasks,
        )))
        .unwrap();
    for i in 0..worker_count {
        scheduler
            .add_agent(Box::new(WorkerAgent::new(
                AgentId::new(format!("w{i}")),
                Topic::from(REQUEST_TOPIC),
                Topic::from(RESULT_TOPIC),
                square_handler(),
            )))
            .unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    scheduler
        .add_agent(Box::new(ResultProbe {
            id: AgentId::new("probe"),
            seen: Arc::clone(&seen),
        }))
        .unwrap();

    scheduler.run().unwrap();

    let results = seen.lock().unwrap();
    assert_eq!(results.len(), task_count, "results: {results:?}");

    // Exactly once: every task id appears, none twice.
    let ids: BTreeSet<&str> = results.iter().map(|(t, _, _)| t.as_str()).collect();
    assert_eq!(ids.len(), task_count);
    for i in 0..task_count {
        assert!(ids.contains(format!("task_{i}").as_str()));
    }

    // The pool shares the load: with more tasks than workers, every
    // worker computed something.
    let workers: BTreeSet<&str> = results.iter().map(|(_, w, _)| w.as_str()).collect();
    assert_eq!(workers.len(), worker_count);

    // And the results are right.
    for (task, _, square) in results.iter() {
        let n: f64 = task.trim_start_matches("task_").parse().unwrap();
        assert_eq!(*square, n * n, "wrong result for {task}");
    }
}

#[test]
fn single_worker_drains_the_whole_batch() {
    let mut scheduler = Scheduler::assemble(&empty_scenario()).unwrap();
    scheduler
        .add_agent(Box::new(TaskManagerAgent::new(
            AgentId::new("manager"),
            Topic::from(REQUEST_TOPIC),
            Topic::from(RESULT_TOPIC),
            (0..5)
                .map(|i| Task::new(format!("task_{i}"), payload! { "n" => i as i64 }))
                .collect(),
        )))
        .unwrap();
    scheduler
        .add_agent(Box::new(WorkerAgent::new(
            AgentId::new("solo"),
            Topic::from(REQUEST_TOPIC),
            Topic::from(RESULT_TOPIC),
            square_handler(),
        )))
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    scheduler
        .add_agent(Box::new(ResultProbe {
            id: AgentId::new("probe"),
            seen: Arc::clone(&seen),
        }))
        .unwrap();

    scheduler.run().unwrap();

    let results = seen.lock().unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|(_, w, _)| w == "solo"));
}
