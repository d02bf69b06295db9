//! Notebook aggregate and per-stage ledgers.
//!
//! A [`Notebook`] is the single source of truth persisted between engine
//! invocations: the day-of-life anchor, the current stage, today's checklist,
//! and one [`StageLedger`] for every stage that has ever become current.
//!
//! Ledger invariants upheld here rather than repaired after the fact:
//! `current_stage` only increases, a ledger's status transitions
//! active -> {completed | skipped} exactly once, and a ledger is created in
//! the same operation that makes its stage current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{day_of_life, LocalDay};
use crate::error::{Result, SproutError};
use crate::template::{Frequency, GrowthTemplate, StageDefinition};

/// Unique notebook identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(Uuid);

impl NotebookId {
    /// Generate a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its string form.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SproutError::notebook_not_found(s))
    }
}

impl Default for NotebookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotebookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a stage ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage is the current one and still accepting mutations.
    Active,
    /// Stage finished with all required observations confirmed.
    Completed,
    /// Stage was force-closed after its grace period ran out.
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Active => write!(f, "active"),
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A task completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub task_name: String,
    pub completed_at: DateTime<Utc>,
}

/// A recorded observation; last write wins per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub key: String,
    pub value: bool,
    pub observed_at: DateTime<Utc>,
}

/// Completion percentage for one generated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: LocalDay,
    pub completion_pct: f64,
}

/// Status of a carried-forward overdue task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdueStatus {
    /// Still waiting for the user.
    Overdue,
    /// Completed after its original day.
    Completed,
    /// Abandoned when its stage was skipped.
    Skipped,
}

/// A task instance generated for a past day that was never completed in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueTask {
    pub task_name: String,
    /// The local day the instance was generated for.
    pub original_date: LocalDay,
    pub status: OverdueStatus,
}

/// An ephemeral task instance in today's checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub task_name: String,
    pub frequency: Frequency,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskInstance {
    /// A fresh, pending instance.
    #[must_use]
    pub fn pending(task_name: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            task_name: task_name.into(),
            frequency,
            is_completed: false,
            completed_at: None,
        }
    }
}

/// The mutable historical record for one stage of one notebook.
///
/// Created the instant its stage becomes current, mutated while active, and
/// kept forever as immutable history once completed or skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLedger {
    pub stage_number: u32,
    /// `planted_date + day_start - 1`.
    pub started_at: LocalDay,
    pub status: StageStatus,
    pub completed_tasks: Vec<CompletedTask>,
    pub observations: Vec<ObservationRecord>,
    pub daily_logs: Vec<DailyLog>,
    pub overdue_tasks: Vec<OverdueTask>,
}

impl StageLedger {
    /// Open a new active ledger.
    #[must_use]
    pub fn new(stage_number: u32, started_at: LocalDay) -> Self {
        Self {
            stage_number,
            started_at,
            status: StageStatus::Active,
            completed_tasks: Vec::new(),
            observations: Vec::new(),
            daily_logs: Vec::new(),
            overdue_tasks: Vec::new(),
        }
    }

    /// Whether the ledger still accepts mutations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == StageStatus::Active
    }

    /// Record a task completion.
    pub fn record_completion(&mut self, task_name: impl Into<String>, at: DateTime<Utc>) {
        self.completed_tasks.push(CompletedTask {
            task_name: task_name.into(),
            completed_at: at,
        });
    }

    /// Whether the ledger holds any completion record for the task.
    #[must_use]
    pub fn has_completed(&self, task_name: &str) -> bool {
        self.completed_tasks.iter().any(|t| t.task_name == task_name)
    }

    /// The most recent completion record for the task, if any.
    #[must_use]
    pub fn completion(&self, task_name: &str) -> Option<&CompletedTask> {
        self.completed_tasks
            .iter()
            .rev()
            .find(|t| t.task_name == task_name)
    }

    /// Write or overwrite the observation for `key` (last write wins).
    pub fn set_observation(&mut self, key: impl Into<String>, value: bool, at: DateTime<Utc>) {
        let key = key.into();
        if let Some(existing) = self.observations.iter_mut().find(|o| o.key == key) {
            existing.value = value;
            existing.observed_at = at;
        } else {
            self.observations.push(ObservationRecord {
                key,
                value,
                observed_at: at,
            });
        }
    }

    /// The recorded observation for `key`, if any.
    #[must_use]
    pub fn observation(&self, key: &str) -> Option<&ObservationRecord> {
        self.observations.iter().find(|o| o.key == key)
    }

    /// Whether every required key has been confirmed true.
    #[must_use]
    pub fn observations_satisfied(&self, required_keys: &[String]) -> bool {
        required_keys
            .iter()
            .all(|key| self.observation(key).is_some_and(|o| o.value))
    }

    /// Write or overwrite the completion log for one day.
    pub fn upsert_daily_log(&mut self, date: LocalDay, completion_pct: f64) {
        if let Some(existing) = self.daily_logs.iter_mut().find(|l| l.date == date) {
            existing.completion_pct = completion_pct;
        } else {
            self.daily_logs.push(DailyLog {
                date,
                completion_pct,
            });
        }
    }

    /// Carry a missed task forward as an explicit overdue record.
    ///
    /// A (task, day) pair is recorded at most once so a retried rollover
    /// cannot duplicate the carry-forward.
    pub fn push_overdue(&mut self, task_name: impl Into<String>, original_date: LocalDay) {
        let task_name = task_name.into();
        let already = self
            .overdue_tasks
            .iter()
            .any(|o| o.task_name == task_name && o.original_date == original_date);
        if !already {
            self.overdue_tasks.push(OverdueTask {
                task_name,
                original_date,
                status: OverdueStatus::Overdue,
            });
        }
    }

    /// Mark the oldest still-overdue record for `task_name` as completed.
    ///
    /// Returns `false` if no such record exists.
    pub fn complete_overdue(&mut self, task_name: &str) -> bool {
        if let Some(record) = self
            .overdue_tasks
            .iter_mut()
            .find(|o| o.task_name == task_name && o.status == OverdueStatus::Overdue)
        {
            record.status = OverdueStatus::Completed;
            true
        } else {
            false
        }
    }
}

/// The aggregate root: one growing journal for one plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: NotebookId,
    /// Template this notebook follows.
    pub template_id: String,
    /// Day-of-life anchor; never in the future at creation time.
    pub planted_date: LocalDay,
    /// Current stage number; monotonically non-decreasing.
    pub current_stage: u32,
    /// Guard for idempotent generation.
    pub last_generated_day: Option<LocalDay>,
    /// Today's task instances, replaced wholesale on regeneration.
    pub daily_checklist: Vec<TaskInstance>,
    /// One ledger per stage that has ever become current.
    pub stages_tracking: Vec<StageLedger>,
    /// Soft-deletion flag; the sweep skips deleted notebooks.
    pub deleted: bool,
    /// Optimistic-concurrency revision, bumped by the store on every save.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

impl Notebook {
    /// Create a notebook following `template`, planted on `planted_date`.
    ///
    /// The first stage's ledger is created here, in the same operation that
    /// makes the stage current.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::InvalidNotebook`] if `planted_date` is after
    /// `today`.
    pub fn new(
        template: &GrowthTemplate,
        planted_date: LocalDay,
        today: LocalDay,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if planted_date > today {
            return Err(SproutError::invalid_notebook(format!(
                "planted_date {planted_date} is in the future (today is {today})"
            )));
        }
        let first = template.first_stage();
        let ledger = StageLedger::new(
            first.stage_number,
            ledger_start(planted_date, first),
        );
        Ok(Self {
            id: NotebookId::new(),
            template_id: template.template_id.clone(),
            planted_date,
            current_stage: first.stage_number,
            last_generated_day: None,
            daily_checklist: Vec::new(),
            stages_tracking: vec![ledger],
            deleted: false,
            revision: 0,
            created_at,
        })
    }

    /// 1-based day of this plant's life on `today`.
    #[must_use]
    pub fn day_of_life(&self, today: LocalDay) -> i64 {
        day_of_life(self.planted_date, today)
    }

    /// The ledger for a stage number, if it has ever become current.
    #[must_use]
    pub fn ledger(&self, stage_number: u32) -> Option<&StageLedger> {
        self.stages_tracking
            .iter()
            .find(|l| l.stage_number == stage_number)
    }

    /// Mutable ledger access.
    pub fn ledger_mut(&mut self, stage_number: u32) -> Option<&mut StageLedger> {
        self.stages_tracking
            .iter_mut()
            .find(|l| l.stage_number == stage_number)
    }

    /// Ensure a ledger exists for `stage`, creating it lazily.
    pub fn ensure_ledger(&mut self, stage: &StageDefinition) -> &mut StageLedger {
        let exists = self
            .stages_tracking
            .iter()
            .any(|l| l.stage_number == stage.stage_number);
        if !exists {
            self.stages_tracking.push(StageLedger::new(
                stage.stage_number,
                ledger_start(self.planted_date, stage),
            ));
        }
        self.ledger_mut(stage.stage_number)
            .expect("ledger just ensured")
    }

    /// Advance to `next` stage, opening its ledger in the same step.
    ///
    /// `current_stage` never decreases; an out-of-order advance is ignored.
    pub fn advance_to(&mut self, next: &StageDefinition) {
        if next.stage_number <= self.current_stage {
            return;
        }
        self.current_stage = next.stage_number;
        self.ensure_ledger(next);
    }

    /// Find a pending instance in today's checklist.
    pub fn pending_instance_mut(&mut self, task_name: &str) -> Option<&mut TaskInstance> {
        self.daily_checklist
            .iter_mut()
            .find(|t| t.task_name == task_name && !t.is_completed)
    }

    /// Completion percentage of the current checklist (100 when empty).
    #[must_use]
    pub fn checklist_completion_pct(&self) -> f64 {
        if self.daily_checklist.is_empty() {
            return 100.0;
        }
        let done = self
            .daily_checklist
            .iter()
            .filter(|t| t.is_completed)
            .count();
        100.0 * done as f64 / self.daily_checklist.len() as f64
    }
}

fn ledger_start(planted_date: LocalDay, stage: &StageDefinition) -> LocalDay {
    planted_date.plus_days(i64::from(stage.day_start) - 1)
}
