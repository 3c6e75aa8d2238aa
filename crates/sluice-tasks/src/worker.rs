//! The worker side of the pull protocol.

use sluice_agent::{Agent, AgentContext};
use sluice_bus::{Message, Topic};
use sluice_core::{payload, AgentError, AgentId, Payload, Value};

/// Computes one task's result from its payload.
///
/// Handlers must be deterministic for reproducible runs; any `FnMut`
/// closure with the right shape works.
pub trait TaskHandler: Send {
    /// Run the work. The returned payload is merged into the result
    /// message alongside the task id and worker id.
    fn run(&mut self, payload: &Payload) -> Payload;
}

impl<F> TaskHandler for F
where
    F: FnMut(&Payload) -> Payload + Send,
{
    fn run(&mut self, payload: &Payload) -> Payload {
        self(payload)
    }
}

/// Pulls tasks by announcing readiness, computes, and reports.
///
/// Idle announcement happens once at startup and again after every
/// completed task, so the worker always has at most one task in flight.
pub struct WorkerAgent {
    id: AgentId,
    request_topic: Topic,
    result_topic: Topic,
    task_topic: Topic,
    handler: Box<dyn TaskHandler>,
    announced: bool,
}

impl WorkerAgent {
    /// Build a worker. Its private task topic is `task/<worker_id>`.
    pub fn new(
        id: AgentId,
        request_topic: Topic,
        result_topic: Topic,
        handler: Box<dyn TaskHandler>,
    ) -> Self {
        let task_topic = Topic::new(format!("task/{id}"));
        Self {
            id,
            request_topic,
            result_topic,
            task_topic,
            handler,
            announced: false,
        }
    }

    fn announce(&self, ctx: &mut AgentContext<'_>) {
        let topic = self.request_topic.clone();
        ctx.publish(topic, payload! { "worker" => self.id.as_str() });
    }
}

impl Agent for WorkerAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn subscriptions(&self) -> Vec<Topic> {
        vec![self.task_topic.clone()]
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        if !self.announced {
            self.announce(ctx);
            self.announced = true;
        }
        Ok(())
    }

    fn on_message(
        &mut self,
        ctx: &mut AgentContext<'_>,
        message: &Message,
    ) -> Result<(), AgentError> {
        let task_id = message
            .get_str("task_id")
            .ok_or_else(|| AgentError::MissingField {
                key: "task_id".to_owned(),
            })?
            .to_owned();

        let mut result = self.handler.run(message.payload());
        result.insert("task_id".to_owned(), Value::Text(task_id));
        result.insert("worker".to_owned(), Value::Text(self.id.as_str().to_owned()));
        let topic = self.result_topic.clone();
        ctx.publish(topic, result);

        // Ready for the next task.
        self.announce(ctx);
        Ok(())
    }
}
