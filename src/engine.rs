//! The journal engine facade.
//!
//! [`JournalEngine`] wires the calendar, template provider, notebook store,
//! and notification sink together and exposes the four operations the
//! interactive layer and the daily sweep call:
//!
//! - [`generate_today`](JournalEngine::generate_today) - idempotent daily
//!   checklist generation with stage settlement and overdue carry-forward
//! - [`complete_task`](JournalEngine::complete_task) - mark a checklist (or
//!   overdue) task done
//! - [`record_observation`](JournalEngine::record_observation) - confirm a
//!   stage observation and immediately re-evaluate the transition
//! - [`progress`](JournalEngine::progress) - overall completion percentage
//!
//! Every operation loads the notebook, mutates a working copy, and commits
//! through the store's revision check-and-set, so the whole invocation is a
//! single atomic unit. Notification events are handed to the sink only after
//! the commit succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::calendar::{Calendar, Clock, LocalDay};
use crate::checklist;
use crate::error::{Result, SproutError};
use crate::notebook::{Notebook, NotebookId, TaskInstance};
use crate::notify::{self, NotificationSink};
use crate::progress;
use crate::store::NotebookStore;
use crate::template::{GrowthTemplate, TemplateProvider};
use crate::transition::TransitionOutcome;

/// Outcome of one sweep run across all notebooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Notebooks whose checklist was generated (or already current).
    pub generated: usize,
    /// Deleted notebooks skipped.
    pub skipped_deleted: usize,
    /// Notebooks whose generation failed; failures never abort the sweep.
    pub failed: usize,
}

/// The stage/checklist temporal engine.
pub struct JournalEngine<S, T, N> {
    store: S,
    templates: T,
    sink: N,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
}

impl<S, T, N> JournalEngine<S, T, N>
where
    S: NotebookStore,
    T: TemplateProvider,
    N: NotificationSink,
{
    /// Assemble an engine from its collaborators.
    pub fn new(store: S, templates: T, sink: N, clock: Arc<dyn Clock>, calendar: Calendar) -> Self {
        Self {
            store,
            templates,
            sink,
            clock,
            calendar,
        }
    }

    /// The notebook store (for listing ids in the sweep driver).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The template provider.
    pub fn templates(&self) -> &T {
        &self.templates
    }

    fn today(&self) -> LocalDay {
        self.calendar.local_day(self.clock.now())
    }

    fn load_live(&self, id: NotebookId) -> Result<Notebook> {
        let notebook = self.store.load(id)?;
        if notebook.deleted {
            return Err(SproutError::notebook_not_found(id));
        }
        Ok(notebook)
    }

    fn template_for(&self, notebook: &Notebook) -> Result<Arc<GrowthTemplate>> {
        self.templates.template(&notebook.template_id)
    }

    /// Create a notebook following `template_id`, planted on `planted_date`,
    /// and persist it with its first stage ledger already open.
    pub fn create_notebook(&self, template_id: &str, planted_date: LocalDay) -> Result<Notebook> {
        let template = self.templates.template(template_id)?;
        let notebook = Notebook::new(&template, planted_date, self.today(), self.clock.now())?;
        self.store.insert(&notebook)?;
        info!(notebook = %notebook.id, template = template_id, "notebook created");
        Ok(notebook)
    }

    /// Generate (or return) today's checklist for the notebook.
    ///
    /// Idempotent within one local day: once `last_generated_day` matches
    /// today, the call returns the stored checklist without touching the
    /// ledger. A lost check-and-set race is retried once after re-reading;
    /// if the winner already generated today, that result is returned as
    /// success.
    pub fn generate_today(&self, id: NotebookId) -> Result<Vec<TaskInstance>> {
        let mut attempts = 0;
        loop {
            let mut notebook = self.load_live(id)?;
            let today = self.today();

            if notebook.last_generated_day == Some(today) {
                debug!(notebook = %id, day = %today, "checklist already generated");
                return Ok(notebook.daily_checklist);
            }

            let template = self.template_for(&notebook)?;
            let events = checklist::roll_to_today(&mut notebook, &template, &self.calendar, today)?;

            match self.store.save(&mut notebook) {
                Ok(()) => {
                    notify::emit_all(&self.sink, &events);
                    return Ok(notebook.daily_checklist);
                }
                Err(e @ SproutError::ConcurrentGenerationConflict { .. }) => {
                    attempts += 1;
                    if attempts > 1 {
                        return Err(e);
                    }
                    debug!(notebook = %id, "generation lost a race, re-reading");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Mark the named task completed.
    ///
    /// Looks in today's checklist first; if the name is not pending there,
    /// falls back to the active ledger's overdue records. Today's daily log
    /// is updated in the same commit.
    pub fn complete_task(&self, id: NotebookId, task_name: &str) -> Result<()> {
        let mut notebook = self.load_live(id)?;
        let now = self.clock.now();
        let today = self.today();
        let stage_number = notebook.current_stage;

        let completed_in_checklist = match notebook.pending_instance_mut(task_name) {
            Some(instance) => {
                instance.is_completed = true;
                instance.completed_at = Some(now);
                true
            }
            None => false,
        };

        if completed_in_checklist {
            let pct = notebook.checklist_completion_pct();
            // The checklist may still belong to an earlier local day if the
            // rollover has not run yet; date the log after the day it was
            // generated for, not the wall clock.
            let log_day = notebook.last_generated_day.unwrap_or(today);
            let template_id = notebook.template_id.clone();
            let ledger = notebook
                .ledger_mut(stage_number)
                .ok_or_else(|| no_active_ledger(stage_number, &template_id))?;
            ledger.record_completion(task_name, now);
            ledger.upsert_daily_log(log_day, pct);
        } else {
            let template_id = notebook.template_id.clone();
            let ledger = notebook
                .ledger_mut(stage_number)
                .ok_or_else(|| no_active_ledger(stage_number, &template_id))?;
            if !ledger.complete_overdue(task_name) {
                return Err(SproutError::UnknownTask {
                    task_name: task_name.to_string(),
                });
            }
            ledger.record_completion(task_name, now);
        }

        self.store.save(&mut notebook)?;
        info!(notebook = %id, task = task_name, "task completed");
        Ok(())
    }

    /// Record an observation on the current stage and immediately re-run the
    /// transition evaluator, so confirming the last required key can settle
    /// the stage without waiting for the next sweep.
    pub fn record_observation(
        &self,
        id: NotebookId,
        key: &str,
        value: bool,
    ) -> Result<TransitionOutcome> {
        let mut notebook = self.load_live(id)?;
        let template = self.template_for(&notebook)?;
        let now = self.clock.now();
        let today = self.today();
        let stage_number = notebook.current_stage;

        let stage = template
            .stage(stage_number)
            .ok_or_else(|| no_active_ledger(stage_number, &notebook.template_id))?;
        if !stage.declares_observation(key) {
            return Err(SproutError::UnknownObservationKey {
                key: key.to_string(),
                stage_number,
            });
        }

        let template_id = notebook.template_id.clone();
        let ledger = notebook
            .ledger_mut(stage_number)
            .ok_or_else(|| no_active_ledger(stage_number, &template_id))?;
        if !ledger.is_active() {
            // Closed ledgers are immutable history.
            return Err(SproutError::StageClosed {
                stage_number,
                status: ledger.status.to_string(),
            });
        }
        ledger.set_observation(key, value, now);

        let mut events = Vec::new();
        let outcome = crate::transition::evaluate(&mut notebook, &template, today, &mut events)?;

        self.store.save(&mut notebook)?;
        notify::emit_all(&self.sink, &events);
        debug!(notebook = %id, key, value, ?outcome, "observation recorded");
        Ok(outcome)
    }

    /// Overall completion percentage in [0, 100].
    pub fn progress(&self, id: NotebookId) -> Result<u8> {
        let notebook = self.load_live(id)?;
        let template = self.template_for(&notebook)?;
        Ok(progress::recompute(&notebook, &template))
    }

    /// Load a notebook for display (deleted ones are not found).
    pub fn notebook(&self, id: NotebookId) -> Result<Notebook> {
        self.load_live(id)
    }

    /// Soft-delete a notebook; the sweep will skip it from now on.
    pub fn delete_notebook(&self, id: NotebookId) -> Result<()> {
        let mut notebook = self.store.load(id)?;
        if !notebook.deleted {
            notebook.deleted = true;
            self.store.save(&mut notebook)?;
        }
        info!(notebook = %id, "notebook deleted");
        Ok(())
    }

    /// Run the daily generation across every notebook in the store.
    ///
    /// Notebooks are independent; a failure on one is logged and counted,
    /// never propagated.
    pub fn sweep(&self) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();
        for id in self.store.list_ids()? {
            match self.store.load(id) {
                Ok(nb) if nb.deleted => summary.skipped_deleted += 1,
                Ok(_) => match self.generate_today(id) {
                    Ok(_) => summary.generated += 1,
                    Err(e) => {
                        warn!(notebook = %id, "sweep generation failed: {e}");
                        summary.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(notebook = %id, "sweep load failed: {e}");
                    summary.failed += 1;
                }
            }
        }
        info!(
            generated = summary.generated,
            skipped = summary.skipped_deleted,
            failed = summary.failed,
            "sweep finished"
        );
        Ok(summary)
    }

    /// Current instant from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's local day.
    pub fn local_today(&self) -> LocalDay {
        self.today()
    }
}

fn no_active_ledger(stage_number: u32, template_id: &str) -> SproutError {
    SproutError::NoActiveLedger {
        stage_number,
        template_id: template_id.to_string(),
    }
}
