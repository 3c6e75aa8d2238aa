//! Per-step state recording.
//!
//! The scheduler appends one [`StepRecord`] after each completed step:
//! post-transition state of every component, keyed by id, in
//! declaration order. The whole record serializes to JSON for offline
//! analysis and regression comparison; two runs of the same scenario
//! must produce identical records.

use indexmap::IndexMap;
use serde::Serialize;
use sluice_core::{ComponentId, StateMap, StepId};

/// State of every component after one completed step.
#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    /// The executed step.
    pub step: StepId,
    /// Simulated time at the start of the step, in seconds.
    pub time: f64,
    /// Post-transition state snapshots, in component declaration order.
    pub states: IndexMap<ComponentId, StateMap>,
}

/// The complete trace of one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunRecord {
    /// The fixed step size in seconds.
    pub dt: f64,
    /// One record per completed step, in order.
    pub steps: Vec<StepRecord>,
}

impl RunRecord {
    pub(crate) fn new(dt: f64) -> Self {
        Self {
            dt,
            steps: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    /// Number of completed steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if no step completed.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The last completed step's record, if any.
    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    /// One component's state trace across the run.
    pub fn trace_of<'a>(&'a self, id: &'a ComponentId) -> impl Iterator<Item = &'a StateMap> {
        self.steps.iter().filter_map(move |s| s.states.get(id))
    }

    /// One component's final state, if recorded.
    pub fn final_state(&self, id: &ComponentId) -> Option<&StateMap> {
        self.last().and_then(|s| s.states.get(id))
    }

    /// One numeric field of one component across the run.
    pub fn series(&self, id: &ComponentId, field: &str) -> Vec<f64> {
        self.trace_of(id)
            .filter_map(|s| s.get(field).and_then(|v| v.as_f64()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::payload;

    fn record_with(level: f64) -> StepRecord {
        let mut states = IndexMap::new();
        states.insert(
            ComponentId::new("res_1"),
            payload! { "water_level" => level },
        );
        StepRecord {
            step: StepId(0),
            time: 0.0,
            states,
        }
    }

    #[test]
    fn series_extracts_one_field() {
        let mut run = RunRecord::new(1.0);
        run.push(record_with(50.0));
        run.push(record_with(50.5));
        assert_eq!(
            run.series(&ComponentId::new("res_1"), "water_level"),
            vec![50.0, 50.5]
        );
        assert!(run.series(&ComponentId::new("absent"), "water_level").is_empty());
    }

    #[test]
    fn run_record_serializes_to_json() {
        let mut run = RunRecord::new(1.0);
        run.push(record_with(50.0));
        let text = serde_json::to_string(&run).unwrap();
        assert!(text.contains("\"water_level\":50.0"));
        assert!(text.contains("\"dt\":1.0"));
    }
}
