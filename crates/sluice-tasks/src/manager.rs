//! The manager side of the pull protocol.

use std::collections::VecDeque;

use indexmap::IndexMap;
use sluice_agent::{Agent, AgentContext};
use sluice_bus::{Message, Topic};
use sluice_core::{AgentError, AgentId, Payload, Value};
use tracing::{debug, info};

use crate::task::{Task, TaskState};

/// Distributes a fixed batch of tasks to pulling workers.
///
/// Holds the pending queue (FIFO) and the per-task state machine.
/// Assignment happens inside the readiness handler; because the bus
/// serializes delivery to this agent, no task can be popped twice.
///
/// Worker loss policy is explicit: with `reassign_after` set, a task
/// still `Assigned` after that many steps returns to the head of the
/// pending queue, and the stale assignment's late result (same task id,
/// already `Completed` or re-`Assigned` elsewhere) is ignored as a
/// duplicate. Left unset, a lost worker's task stays `Assigned`
/// forever, matching the base protocol.
pub struct TaskManagerAgent {
    id: AgentId,
    request_topic: Topic,
    result_topic: Topic,
    tasks: IndexMap<String, (Task, TaskState)>,
    pending: VecDeque<String>,
    idle_workers: VecDeque<AgentId>,
    results: IndexMap<String, Payload>,
    completed: usize,
    reassign_after: Option<u64>,
}

impl TaskManagerAgent {
    /// Build a manager over a task batch.
    ///
    /// Workers announce on `request_topic`; results arrive on
    /// `result_topic`.
    pub fn new(
        id: AgentId,
        request_topic: Topic,
        result_topic: Topic,
        tasks: Vec<Task>,
    ) -> Self {
        let mut map = IndexMap::new();
        let mut pending = VecDeque::new();
        for task in tasks {
            pending.push_back(task.id.clone());
            map.insert(task.id.clone(), (task, TaskState::Pending));
        }
        Self {
            id,
            request_topic,
            result_topic,
            tasks: map,
            pending,
            idle_workers: VecDeque::new(),
            results: IndexMap::new(),
            completed: 0,
            reassign_after: None,
        }
    }

    /// Enable timeout-based re-queue after `steps` steps assigned.
    pub fn with_reassign_after(mut self, steps: u64) -> Self {
        self.reassign_after = Some(steps);
        self
    }

    /// True once every enqueued task has a matching result.
    pub fn is_complete(&self) -> bool {
        self.completed == self.tasks.len()
    }

    /// Completed count so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Results received, keyed by task id.
    pub fn results(&self) -> &IndexMap<String, Payload> {
        &self.results
    }

    /// State of one task, if known.
    pub fn task_state(&self, task_id: &str) -> Option<&TaskState> {
        self.tasks.get(task_id).map(|(_, state)| state)
    }

    /// Pair idle workers with pending tasks until one side runs out.
    fn assign_ready(&mut self, ctx: &mut AgentContext<'_>) {
        loop {
            if self.pending.is_empty() || self.idle_workers.is_empty() {
                break;
            }
            let Some(task_id) = self.pending.pop_front() else {
                break;
            };
            let Some(worker) = self.idle_workers.pop_front() else {
                break;
            };

            let (task, state) = match self.tasks.get_mut(&task_id) {
                Some(entry) => entry,
                None => {
                    // Unknown id in the queue; keep the worker idle.
                    self.idle_workers.push_front(worker);
                    continue;
                }
            };
            *state = TaskState::Assigned {
                worker: worker.clone(),
                since: ctx.clock().step(),
            };

            let mut message = task.payload.clone();
            message.insert("task_id".to_owned(), Value::Text(task.id.clone()));
            debug!(manager = %self.id, task = %task.id, worker = %worker, "assigning task");
            ctx.publish(Topic::new(format!("task/{worker}")), message);
        }
    }

    fn handle_readiness(&mut self, ctx: &mut AgentContext<'_>, message: &Message) {
        let Some(worker) = message.get_str("worker") else {
            return;
        };
        let worker = AgentId::new(worker);
        if !self.idle_workers.contains(&worker) {
            self.idle_workers.push_back(worker);
        }
        self.assign_ready(ctx);
    }

    fn handle_result(&mut self, message: &Message) {
        let Some(task_id) = message.get_str("task_id") else {
            return;
        };
        let Some((_, state)) = self.tasks.get_mut(task_id) else {
            debug!(manager = %self.id, task = task_id, "result for unknown task, ignoring");
            return;
        };
        match state {
            TaskState::Assigned { worker, .. } => {
                // Only the current assignee may complete the task; a late
                // result from a timed-out worker carries the old worker id.
                if message.get_str("worker") != Some(worker.as_str()) {
                    debug!(
                        manager = %self.id,
                        task = task_id,
                        worker = ?message.get_str("worker"),
                        "result from a superseded assignment, ignoring"
                    );
                    return;
                }
                *state = TaskState::Completed;
                self.results
                    .insert(task_id.to_owned(), message.payload().clone());
                self.completed += 1;
                if self.is_complete() {
                    info!(manager = %self.id, total = self.tasks.len(), "all tasks completed");
                }
            }
            // Stale result after a timeout re-queue, or a duplicate.
            _ => {
                debug!(manager = %self.id, task = task_id, "ignoring duplicate or stale result");
            }
        }
    }

    /// Return timed-out assignments to the head of the queue.
    fn requeue_stale(&mut self, ctx: &mut AgentContext<'_>) {
        let Some(budget) = self.reassign_after else {
            return;
        };
        let now = ctx.clock().step().0;
        let mut stale: Vec<String> = Vec::new();
        for (task_id, (_, state)) in &self.tasks {
            if let TaskState::Assigned { since, .. } = state {
                if now.saturating_sub(since.0) >= budget {
                    stale.push(task_id.clone());
                }
            }
        }
        for task_id in stale {
            info!(manager = %self.id, task = %task_id, "assignment timed out, re-queueing");
            if let Some((_, state)) = self.tasks.get_mut(&task_id) {
                *state = TaskState::Pending;
            }
            self.pending.push_front(task_id);
        }
    }
}

impl Agent for TaskManagerAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn subscriptions(&self) -> Vec<Topic> {
        vec![self.request_topic.clone(), self.result_topic.clone()]
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        self.requeue_stale(ctx);
        self.assign_ready(ctx);
        Ok(())
    }

    fn on_message(
        &mut self,
        ctx: &mut AgentContext<'_>,
        message: &Message,
    ) -> Result<(), AgentError> {
        if message.topic() == &self.request_topic {
            self.handle_readiness(ctx, message);
        } else if message.topic() == &self.result_topic {
            self.handle_result(message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Snapshots;
    use sluice_bus::{MessageBus, SubscriberId};
    use sluice_core::{payload, SimClock, StateMap, StepId};

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task::new(format!("task_{i}"), payload! { "n" => i as i64 }))
            .collect()
    }

    fn manager(n: usize) -> TaskManagerAgent {
        TaskManagerAgent::new(
            AgentId::new("manager"),
            Topic::from("tasks/request"),
            Topic::from("tasks/result"),
            tasks(n),
        )
    }

    fn readiness(worker: &str) -> Payload {
        payload! { "worker" => worker }
    }

    /// Route one staged message through the manager's handler.
    fn deliver(
        mgr: &mut TaskManagerAgent,
        bus: &mut MessageBus,
        topic: &str,
        payload: Payload,
        step: u64,
    ) {
        bus.publish(Topic::from(topic), payload, StepId(step));
        bus.subscribe(Topic::from(topic), SubscriberId("probe".into()));
        bus.flush();
        let snapshots: Snapshots<sluice_core::ComponentId, StateMap> = Snapshots::new();
        for m in bus.take_inbox(&SubscriberId("probe".into())) {
            let mut ctx = AgentContext::new(SimClock::new(1.0), bus, &snapshots);
            mgr.on_message(&mut ctx, &m).unwrap();
        }
    }

    #[test]
    fn readiness_pops_exactly_one_task() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("task/w1"), SubscriberId("w1_probe".into()));
        let mut mgr = manager(3);

        deliver(&mut mgr, &mut bus, "tasks/request", readiness("w1"), 0);
        bus.flush();
        let inbox = bus.take_inbox(&SubscriberId("w1_probe".into()));
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].get_str("task_id"), Some("task_0"));
        assert!(matches!(
            mgr.task_state("task_0"),
            Some(TaskState::Assigned { .. })
        ));
        assert!(matches!(mgr.task_state("task_1"), Some(TaskState::Pending)));
    }

    #[test]
    fn result_completes_and_duplicates_are_ignored() {
        let mut bus = MessageBus::new();
        let mut mgr = manager(1);
        deliver(&mut mgr, &mut bus, "tasks/request", readiness("w1"), 0);

        let result = payload! { "task_id" => "task_0", "worker" => "w1", "value" => 42.0 };
        deliver(&mut mgr, &mut bus, "tasks/result", result.clone(), 1);
        assert!(mgr.is_complete());
        assert_eq!(mgr.completed(), 1);

        deliver(&mut mgr, &mut bus, "tasks/result", result, 2);
        assert_eq!(mgr.completed(), 1);
    }

    /// Run the manager's step hook with the clock advanced to `step`.
    fn step_at(mgr: &mut TaskManagerAgent, bus: &mut MessageBus, step: u64) {
        let mut clock = SimClock::new(1.0);
        for _ in 0..step {
            clock.advance();
        }
        let snapshots: Snapshots<sluice_core::ComponentId, StateMap> = Snapshots::new();
        let mut ctx = AgentContext::new(clock, bus, &snapshots);
        mgr.on_step(&mut ctx).unwrap();
    }

    #[test]
    fn timed_out_assignment_requeues_and_the_stale_result_is_ignored() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("task/w1"), SubscriberId("p1".into()));
        bus.subscribe(Topic::from("task/w2"), SubscriberId("p2".into()));
        let mut mgr = manager(1).with_reassign_after(2);

        deliver(&mut mgr, &mut bus, "tasks/request", readiness("w1"), 0);
        bus.flush();
        assert_eq!(bus.take_inbox(&SubscriberId("p1".into())).len(), 1);

        // Nothing back from w1 after two steps: the assignment expires.
        step_at(&mut mgr, &mut bus, 2);
        assert!(matches!(mgr.task_state("task_0"), Some(TaskState::Pending)));

        deliver(&mut mgr, &mut bus, "tasks/request", readiness("w2"), 2);
        bus.flush();
        assert_eq!(bus.take_inbox(&SubscriberId("p2".into())).len(), 1);

        // w1's late result arrives after the re-assignment to w2.
        let stale = payload! { "task_id" => "task_0", "worker" => "w1", "value" => 1.0 };
        deliver(&mut mgr, &mut bus, "tasks/result", stale, 3);
        assert!(!mgr.is_complete());
        assert!(matches!(
            mgr.task_state("task_0"),
            Some(TaskState::Assigned { .. })
        ));

        let fresh = payload! { "task_id" => "task_0", "worker" => "w2", "value" => 2.0 };
        deliver(&mut mgr, &mut bus, "tasks/result", fresh, 3);
        assert!(mgr.is_complete());
        assert_eq!(mgr.results()["task_0"]["worker"].as_str(), Some("w2"));
    }

    #[test]
    fn no_double_assignment_for_one_pending_task() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("task/w1"), SubscriberId("p1".into()));
        bus.subscribe(Topic::from("task/w2"), SubscriberId("p2".into()));
        let mut mgr = manager(1);

        deliver(&mut mgr, &mut bus, "tasks/request", readiness("w1"), 0);
        deliver(&mut mgr, &mut bus, "tasks/request", readiness("w2"), 0);
        bus.flush();
        let to_w1 = bus.take_inbox(&SubscriberId("p1".into())).len();
        let to_w2 = bus.take_inbox(&SubscriberId("p2".into())).len();
        assert_eq!(to_w1 + to_w2, 1);
    }
}
