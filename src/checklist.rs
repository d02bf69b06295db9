//! Daily checklist generation and overdue carry-forward.
//!
//! [`roll_to_today`] performs the once-per-local-day rollover: it writes the
//! completion log for the previous generated day, settles stage transitions,
//! carries every unfinished instance forward as an explicit overdue record
//! (no task disappears silently), and replaces the checklist wholesale with
//! today's instances. Callers guard it with the `last_generated_day`
//! idempotence check; calling it twice for the same day is a caller bug.

use tracing::debug;

use crate::calendar::{Calendar, LocalDay};
use crate::error::{Result, SproutError};
use crate::notebook::{Notebook, StageLedger, TaskInstance};
use crate::notify::NotificationEvent;
use crate::template::{Frequency, GrowthTemplate, StageDefinition};
use crate::transition;

/// Roll the notebook forward to `today` and regenerate its checklist.
///
/// Mutates the notebook only; persistence and the idempotence short-circuit
/// are the engine's job. Returns the notification events produced by any
/// stage transitions along the way.
///
/// # Errors
///
/// Returns [`SproutError::NoActiveLedger`] if `current_stage` is not defined
/// by the template. The notebook is a working copy, so an error leaves the
/// persisted record untouched.
pub fn roll_to_today(
    notebook: &mut Notebook,
    template: &GrowthTemplate,
    calendar: &Calendar,
    today: LocalDay,
) -> Result<Vec<NotificationEvent>> {
    let mut events = Vec::new();
    let previous_day = notebook.last_generated_day;

    // Settle the previous generated day's completion log before the
    // checklist it describes is discarded. The log lands in the ledger of
    // the stage that is current as the rollover starts; a mid-day advance
    // (an observation settling the stage after generation) moves it to the
    // new ledger, same as the overdue carry-forward below.
    if let Some(prev) = previous_day {
        let pct = notebook.checklist_completion_pct();
        let stage_number = notebook.current_stage;
        if let Some(ledger) = notebook.ledger_mut(stage_number) {
            ledger.upsert_daily_log(prev, pct);
        }
    }

    // Make current_stage reflect the correct stage for today.
    transition::evaluate(notebook, template, today, &mut events)?;

    // Carry unfinished instances forward into the (possibly new) active
    // ledger. `once` tasks are carried too: a user may still want to
    // complete them, they are just never regenerated.
    if let Some(prev) = previous_day {
        let pending: Vec<String> = notebook
            .daily_checklist
            .iter()
            .filter(|t| !t.is_completed)
            .map(|t| t.task_name.clone())
            .collect();
        if !pending.is_empty() {
            debug!(
                notebook = %notebook.id,
                day = %prev,
                count = pending.len(),
                "carrying unfinished tasks forward as overdue"
            );
            let stage_number = notebook.current_stage;
            if let Some(ledger) = notebook.ledger_mut(stage_number) {
                for task_name in pending {
                    ledger.push_overdue(task_name, prev);
                }
            }
        }
    }

    let stage = template
        .stage(notebook.current_stage)
        .ok_or_else(|| SproutError::NoActiveLedger {
            stage_number: notebook.current_stage,
            template_id: template.template_id.clone(),
        })?;
    let ledger = notebook
        .ledger(stage.stage_number)
        .expect("transition evaluation ensures the current ledger");

    // A settled terminal stage generates nothing.
    notebook.daily_checklist = if ledger.is_active() {
        let day = notebook.day_of_life(today);
        build_checklist(stage, ledger, calendar, day, today)
    } else {
        Vec::new()
    };
    notebook.last_generated_day = Some(today);

    Ok(events)
}

/// Deterministically build today's task instances for one stage.
fn build_checklist(
    stage: &StageDefinition,
    ledger: &StageLedger,
    calendar: &Calendar,
    day_of_life: i64,
    today: LocalDay,
) -> Vec<TaskInstance> {
    let day_in_stage = day_of_life - i64::from(stage.day_start) + 1;

    stage
        .task_definitions
        .iter()
        .filter(|task| is_due(task.frequency, day_in_stage, today, ledger, &task.task_name))
        .map(|task| {
            let mut instance = TaskInstance::pending(&task.task_name, task.frequency);
            // Defensive idempotence: a completion already recorded for
            // today survives a concurrent re-trigger of generation.
            if let Some(done) = ledger.completion(&task.task_name) {
                if calendar.local_day(done.completed_at) == today {
                    instance.is_completed = true;
                    instance.completed_at = Some(done.completed_at);
                }
            }
            instance
        })
        .collect()
}

fn is_due(
    frequency: Frequency,
    day_in_stage: i64,
    today: LocalDay,
    ledger: &StageLedger,
    task_name: &str,
) -> bool {
    if day_in_stage < 1 {
        return false;
    }
    match frequency {
        Frequency::Daily => true,
        Frequency::EveryNDays { n } => (day_in_stage - 1) % i64::from(n) == 0,
        Frequency::Weekly { weekday } => today.weekday() == weekday,
        Frequency::Once => day_in_stage == 1 && !ledger.has_completed(task_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::{OverdueStatus, StageStatus};
    use crate::template::TaskDefinition;
    use chrono::{TimeZone, Utc, Weekday};

    fn template() -> GrowthTemplate {
        GrowthTemplate::new(
            "t",
            "T",
            vec![
                StageDefinition {
                    stage_number: 1,
                    name: "seedling".into(),
                    day_start: 1,
                    day_end: 10,
                    task_definitions: vec![
                        TaskDefinition::new("water", Frequency::Daily),
                        TaskDefinition::new("feed", Frequency::EveryNDays { n: 3 }),
                        TaskDefinition::new("prune", Frequency::Weekly { weekday: Weekday::Mon }),
                        TaskDefinition::new("label pot", Frequency::Once),
                    ],
                    required_observation_keys: vec!["sprouted".into()],
                    grace_days: 2,
                },
                StageDefinition {
                    stage_number: 2,
                    name: "vegetative".into(),
                    day_start: 11,
                    day_end: 20,
                    task_definitions: vec![TaskDefinition::new("water", Frequency::Daily)],
                    required_observation_keys: Vec::new(),
                    grace_days: 0,
                },
            ],
        )
        .unwrap()
    }

    fn day(d: i64) -> LocalDay {
        // Planted March 1st 2026 (a Sunday); day_of_life d = March d.
        LocalDay::from_ymd(2026, 3, 1).unwrap().plus_days(d - 1)
    }

    fn notebook(tpl: &GrowthTemplate) -> Notebook {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap();
        Notebook::new(tpl, day(1), day(1), at).unwrap()
    }

    fn names(instances: &[TaskInstance]) -> Vec<&str> {
        instances.iter().map(|t| t.task_name.as_str()).collect()
    }

    #[test]
    fn test_day_one_includes_daily_interval_and_once() {
        let tpl = template();
        let mut nb = notebook(&tpl);
        let cal = Calendar::vn();

        roll_to_today(&mut nb, &tpl, &cal, day(1)).unwrap();
        // March 1st 2026 is a Sunday, so the Monday task is absent.
        assert_eq!(names(&nb.daily_checklist), vec!["water", "feed", "label pot"]);
        assert!(nb.daily_checklist.iter().all(|t| !t.is_completed));
        assert_eq!(nb.last_generated_day, Some(day(1)));
    }

    #[test]
    fn test_every_n_days_schedule() {
        let tpl = template();
        let cal = Calendar::vn();

        // every_n_days(3) with day_start = 1 fires on stage-days 1, 4, 7, 10.
        for d in 1..=10 {
            let mut nb = notebook(&tpl);
            roll_to_today(&mut nb, &tpl, &cal, day(d)).unwrap();
            let due = names(&nb.daily_checklist).contains(&"feed");
            assert_eq!(due, (d - 1) % 3 == 0, "day {d}");
        }
    }

    #[test]
    fn test_weekly_fires_on_weekday_only() {
        let tpl = template();
        let cal = Calendar::vn();

        // March 2nd 2026 is a Monday.
        let mut nb = notebook(&tpl);
        roll_to_today(&mut nb, &tpl, &cal, day(2)).unwrap();
        assert!(names(&nb.daily_checklist).contains(&"prune"));

        let mut nb = notebook(&tpl);
        roll_to_today(&mut nb, &tpl, &cal, day(3)).unwrap();
        assert!(!names(&nb.daily_checklist).contains(&"prune"));
    }

    #[test]
    fn test_once_not_regenerated_after_day_one() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);

        roll_to_today(&mut nb, &tpl, &cal, day(1)).unwrap();
        assert!(names(&nb.daily_checklist).contains(&"label pot"));

        roll_to_today(&mut nb, &tpl, &cal, day(2)).unwrap();
        assert!(!names(&nb.daily_checklist).contains(&"label pot"));

        // The missed `once` task is carried as overdue, not dropped.
        let ledger = nb.ledger(1).unwrap();
        assert!(ledger
            .overdue_tasks
            .iter()
            .any(|o| o.task_name == "label pot" && o.original_date == day(1)));
    }

    #[test]
    fn test_carry_forward_conservation() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);
        let done_at = Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap();

        roll_to_today(&mut nb, &tpl, &cal, day(1)).unwrap();

        // Complete "water" on day 1, leave the rest.
        nb.pending_instance_mut("water").unwrap().is_completed = true;
        nb.pending_instance_mut("feed").unwrap(); // still pending
        nb.ledger_mut(1).unwrap().record_completion("water", done_at);

        roll_to_today(&mut nb, &tpl, &cal, day(2)).unwrap();

        let ledger = nb.ledger(1).unwrap();
        // Completed in time: in completed_tasks, not overdue.
        assert!(ledger.has_completed("water"));
        assert!(!ledger.overdue_tasks.iter().any(|o| o.task_name == "water"));
        // Missed: overdue exactly once, not in completed_tasks.
        let feed_overdue: Vec<_> = ledger
            .overdue_tasks
            .iter()
            .filter(|o| o.task_name == "feed")
            .collect();
        assert_eq!(feed_overdue.len(), 1);
        assert_eq!(feed_overdue[0].original_date, day(1));
        assert_eq!(feed_overdue[0].status, OverdueStatus::Overdue);
        assert!(!ledger.has_completed("feed"));
    }

    #[test]
    fn test_rollover_writes_previous_day_log() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);

        roll_to_today(&mut nb, &tpl, &cal, day(1)).unwrap();
        let issued = nb.daily_checklist.len();
        nb.pending_instance_mut("water").unwrap().is_completed = true;

        roll_to_today(&mut nb, &tpl, &cal, day(2)).unwrap();

        let ledger = nb.ledger(1).unwrap();
        assert_eq!(ledger.daily_logs.len(), 1);
        assert_eq!(ledger.daily_logs[0].date, day(1));
        let expected = 100.0 / issued as f64;
        assert!((ledger.daily_logs[0].completion_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn test_completed_today_prefill() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);

        // A completion recorded earlier today (local time) survives a
        // concurrent regeneration.
        let done_at = Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap();
        nb.ledger_mut(1).unwrap().record_completion("water", done_at);

        roll_to_today(&mut nb, &tpl, &cal, day(1)).unwrap();
        let water = nb
            .daily_checklist
            .iter()
            .find(|t| t.task_name == "water")
            .unwrap();
        assert!(water.is_completed);
        assert_eq!(water.completed_at, Some(done_at));
    }

    #[test]
    fn test_tasks_keep_generating_during_grace() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);

        // Day 11 is past day_end 10 but inside grace; daily task still due.
        roll_to_today(&mut nb, &tpl, &cal, day(11)).unwrap();
        assert_eq!(nb.current_stage, 1);
        assert!(names(&nb.daily_checklist).contains(&"water"));
    }

    #[test]
    fn test_overdue_lands_in_new_stage_ledger_after_skip() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);

        roll_to_today(&mut nb, &tpl, &cal, day(12)).unwrap();
        assert_eq!(nb.current_stage, 1);
        assert!(!nb.daily_checklist.is_empty());

        // Day 13 skips stage 1; day-12 leftovers carry into stage 2's ledger.
        roll_to_today(&mut nb, &tpl, &cal, day(13)).unwrap();
        assert_eq!(nb.current_stage, 2);
        let stage2 = nb.ledger(2).unwrap();
        assert!(stage2
            .overdue_tasks
            .iter()
            .any(|o| o.task_name == "water" && o.original_date == day(12)));
    }

    #[test]
    fn test_terminal_stage_generates_empty_checklist() {
        let tpl = template();
        let cal = Calendar::vn();
        let mut nb = notebook(&tpl);
        let at = Utc.with_ymd_and_hms(2026, 3, 5, 8, 0, 0).unwrap();
        nb.ledger_mut(1).unwrap().set_observation("sprouted", true, at);

        roll_to_today(&mut nb, &tpl, &cal, day(25)).unwrap();
        assert_eq!(nb.ledger(2).unwrap().status, StageStatus::Completed);
        assert!(nb.daily_checklist.is_empty());
        assert_eq!(nb.last_generated_day, Some(day(25)));
    }

    #[test]
    fn test_empty_day_logs_hundred_percent() {
        // Stage 2 has only a daily task; give it none by using a template
        // where stage 2 has no tasks at all.
        let tpl = GrowthTemplate::new(
            "empty",
            "Empty",
            vec![StageDefinition {
                stage_number: 1,
                name: "s".into(),
                day_start: 1,
                day_end: 30,
                task_definitions: Vec::new(),
                required_observation_keys: Vec::new(),
                grace_days: 0,
            }],
        )
        .unwrap();
        let cal = Calendar::vn();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap();
        let mut nb = Notebook::new(&tpl, day(1), day(1), at).unwrap();

        roll_to_today(&mut nb, &tpl, &cal, day(1)).unwrap();
        assert!(nb.daily_checklist.is_empty());

        roll_to_today(&mut nb, &tpl, &cal, day(2)).unwrap();
        let log = &nb.ledger(1).unwrap().daily_logs[0];
        assert_eq!(log.date, day(1));
        assert!((log.completion_pct - 100.0).abs() < f64::EPSILON);
    }
}
