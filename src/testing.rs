//! Testing infrastructure: recording sinks and template fixtures.
//!
//! These helpers are part of the public API so integration tests (and
//! downstream crates embedding the engine) can drive it deterministically.

use std::sync::Mutex;

use crate::notify::{NotificationEvent, NotificationSink};
use crate::template::{Frequency, GrowthTemplate, StageDefinition, TaskDefinition};

/// Sink that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    /// Number of events received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("sink lock poisoned").len()
    }

    /// Whether no event has been received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Two-stage fixture used across the test suite: stage 1 spans days 1-5
/// with one daily "water" task, requires "sprouted", grace 2; stage 2 spans
/// days 6-10 with a daily "water" task and no requirements.
#[must_use]
pub fn scenario_template() -> GrowthTemplate {
    GrowthTemplate::new(
        "scenario",
        "Scenario",
        vec![
            StageDefinition {
                stage_number: 1,
                name: "seedling".into(),
                day_start: 1,
                day_end: 5,
                task_definitions: vec![TaskDefinition::new("water", Frequency::Daily)
                    .with_description("Keep the soil moist")],
                required_observation_keys: vec!["sprouted".into()],
                grace_days: 2,
            },
            StageDefinition {
                stage_number: 2,
                name: "vegetative".into(),
                day_start: 6,
                day_end: 10,
                task_definitions: vec![TaskDefinition::new("water", Frequency::Daily)],
                required_observation_keys: Vec::new(),
                grace_days: 0,
            },
        ],
    )
    .expect("scenario template is valid")
}
