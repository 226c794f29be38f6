//! Run progress events
//!
//! The orchestrator reports progress over an unbounded channel so the HTTP
//! layer can stream it as server-sent events. Sending never blocks a run and a
//! dropped receiver is ignored.

use crate::orchestrator::plan_types::{Plan, Stage};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Progress notification emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The planner call is about to be issued
    PlanningStarted {
        /// Run identifier
        run_id: Uuid,
    },
    /// The plan was parsed
    PlanReady {
        /// Run identifier
        run_id: Uuid,
        /// Parsed plan
        plan: Plan,
    },
    /// An executor call is about to be issued
    StepStarted {
        /// Step position
        step_index: usize,
        /// Step text
        description: String,
    },
    /// An executor call returned
    StepCompleted {
        /// Step position
        step_index: usize,
        /// Executor output
        output: String,
        /// Call duration
        elapsed_ms: u64,
    },
    /// An executor call failed
    StepFailed {
        /// Step position
        step_index: usize,
        /// Failure message
        error: String,
    },
    /// The synthesizer call is about to be issued
    SynthesisStarted {
        /// Number of step results fed to the synthesizer
        step_count: usize,
    },
    /// The run finished with an answer
    Completed {
        /// Run identifier
        run_id: Uuid,
        /// Final answer text
        answer: String,
        /// Generation calls issued
        generation_calls: usize,
    },
    /// The run aborted
    Failed {
        /// Run identifier
        run_id: Uuid,
        /// Stage that failed
        stage: Stage,
        /// Failing step, for execution failures
        step_index: Option<usize>,
        /// Failure message
        error: String,
    },
}

/// Sending half for run events
pub type EventSender = mpsc::UnboundedSender<RunEvent>;

/// Optional event destination
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<EventSender>);

impl EventSink {
    /// Sink that drops every event
    pub fn none() -> Self {
        Self(None)
    }

    /// Sink forwarding to `sender`
    pub fn new(sender: EventSender) -> Self {
        Self(Some(sender))
    }

    /// Deliver `event` if anyone is listening
    pub fn emit(&self, event: RunEvent) {
        if let Some(sender) = &self.0 {
            // receiver gone means the client disconnected; the run goes on
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tag() {
        let event = RunEvent::StepFailed {
            step_index: 2,
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_failed");
        assert_eq!(json["step_index"], 2);
    }

    #[tokio::test]
    async fn test_sink_forwards_and_tolerates_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        sink.emit(RunEvent::SynthesisStarted { step_count: 3 });
        assert_eq!(
            rx.recv().await,
            Some(RunEvent::SynthesisStarted { step_count: 3 })
        );

        drop(rx);
        sink.emit(RunEvent::SynthesisStarted { step_count: 0 });
        EventSink::none().emit(RunEvent::SynthesisStarted { step_count: 0 });
    }
}
