//! Stage-transition evaluation: completion, grace periods, auto-skip.
//!
//! A stage's window closes once `day_of_life` exceeds its `day_end`. At that
//! point the evaluator settles it exactly once: completed when every required
//! observation is confirmed true, kept active (with a reminder) while inside
//! the grace period, and skipped once the grace period runs out. Advancing to
//! the next stage opens its ledger in the same step, so there is never a
//! current stage without a ledger.

use tracing::{debug, info};

use crate::calendar::LocalDay;
use crate::error::{Result, SproutError};
use crate::notebook::{Notebook, StageStatus};
use crate::notify::{EventKind, NotificationEvent};
use crate::template::GrowthTemplate;

/// Decision taken for the stage that was current when evaluation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Stage window still open, or still inside its grace period.
    Unchanged,
    /// Stage completed with all required observations confirmed.
    Completed,
    /// Stage auto-skipped after the grace period ran out.
    Skipped,
}

/// Settle the current stage (and any further stages whose windows have also
/// closed) for `today`.
///
/// Loops so that a notebook untouched for weeks catches up in one call; each
/// settled stage pushes its own event onto `events`. The returned outcome is
/// the decision for the stage that was current on entry.
///
/// # Errors
///
/// Returns [`SproutError::NoActiveLedger`] if `current_stage` is not defined
/// by the template, which indicates upstream data corruption.
pub fn evaluate(
    notebook: &mut Notebook,
    template: &GrowthTemplate,
    today: LocalDay,
    events: &mut Vec<NotificationEvent>,
) -> Result<TransitionOutcome> {
    let mut first_outcome: Option<TransitionOutcome> = None;

    loop {
        let stage = template
            .stage(notebook.current_stage)
            .ok_or_else(|| SproutError::NoActiveLedger {
                stage_number: notebook.current_stage,
                template_id: template.template_id.clone(),
            })?
            .clone();
        notebook.ensure_ledger(&stage);

        let day = notebook.day_of_life(today);
        let ledger = notebook
            .ledger(stage.stage_number)
            .expect("ledger just ensured");

        // Terminal: the last stage already settled.
        if !ledger.is_active() {
            break;
        }

        // Window still open; nothing to decide.
        if day <= i64::from(stage.day_end) {
            break;
        }

        if ledger.observations_satisfied(&stage.required_observation_keys) {
            let ledger = notebook
                .ledger_mut(stage.stage_number)
                .expect("ledger exists");
            ledger.status = StageStatus::Completed;
            info!(
                notebook = %notebook.id,
                stage = stage.stage_number,
                "stage completed"
            );
            events.push(NotificationEvent::new(
                EventKind::StageComplete,
                notebook.id,
                stage.stage_number,
                serde_json::json!({ "day_of_life": day, "stage_name": stage.name }),
            ));
            first_outcome.get_or_insert(TransitionOutcome::Completed);
            if let Some(next) = template.next_stage(stage.stage_number) {
                notebook.advance_to(next);
                continue;
            }
            break;
        }

        let missed = day - i64::from(stage.day_end);
        if missed <= i64::from(stage.grace_days) {
            debug!(
                notebook = %notebook.id,
                stage = stage.stage_number,
                missed,
                grace = stage.grace_days,
                "stage inside grace period"
            );
            events.push(NotificationEvent::new(
                EventKind::Reminder,
                notebook.id,
                stage.stage_number,
                serde_json::json!({
                    "day_of_life": day,
                    "days_missed": missed,
                    "grace_days": stage.grace_days,
                    "missing_observations": missing_keys(notebook, &stage),
                }),
            ));
            break;
        }

        // Grace exhausted: force the skip and advance regardless.
        let ledger = notebook
            .ledger_mut(stage.stage_number)
            .expect("ledger exists");
        ledger.status = StageStatus::Skipped;
        info!(
            notebook = %notebook.id,
            stage = stage.stage_number,
            missed,
            "stage auto-skipped"
        );
        events.push(NotificationEvent::new(
            EventKind::StageSkipped,
            notebook.id,
            stage.stage_number,
            serde_json::json!({
                "day_of_life": day,
                "days_missed": missed,
                "missing_observations": missing_keys(notebook, &stage),
            }),
        ));
        first_outcome.get_or_insert(TransitionOutcome::Skipped);
        if let Some(next) = template.next_stage(stage.stage_number) {
            notebook.advance_to(next);
            continue;
        }
        break;
    }

    Ok(first_outcome.unwrap_or(TransitionOutcome::Unchanged))
}

fn missing_keys(notebook: &Notebook, stage: &crate::template::StageDefinition) -> Vec<String> {
    let ledger = match notebook.ledger(stage.stage_number) {
        Some(l) => l,
        None => return stage.required_observation_keys.clone(),
    };
    stage
        .required_observation_keys
        .iter()
        .filter(|key| !ledger.observation(key).is_some_and(|o| o.value))
        .cloned()
        .collect()
}
