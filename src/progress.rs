//! Overall completion percentage across the whole template.
//!
//! Stages strictly before the current one contribute their full day-span
//! whether they were completed or skipped: a skipped stage still consumed
//! its calendar time. The current stage contributes its elapsed logged days
//! weighted by the average daily completion percentage.

use crate::notebook::Notebook;
use crate::template::GrowthTemplate;

/// Recompute the notebook's completion percentage in [0, 100].
#[must_use]
pub fn recompute(notebook: &Notebook, template: &GrowthTemplate) -> u8 {
    let total_days = f64::from(template.total_days());
    if total_days <= 0.0 {
        return 0;
    }

    let mut contributed = 0.0;
    for stage in template.stages() {
        if stage.stage_number < notebook.current_stage {
            contributed += f64::from(stage.span_days());
        } else if stage.stage_number == notebook.current_stage {
            let Some(ledger) = notebook.ledger(stage.stage_number) else {
                continue;
            };
            if !ledger.is_active() {
                // Terminal settled stage counts in full.
                contributed += f64::from(stage.span_days());
            } else if !ledger.daily_logs.is_empty() {
                let sum: f64 = ledger.daily_logs.iter().map(|l| l.completion_pct).sum();
                let fraction = sum / ledger.daily_logs.len() as f64 / 100.0;
                contributed += ledger.daily_logs.len() as f64 * fraction;
            }
        }
    }

    let percent = (100.0 * contributed / total_days).round();
    percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::LocalDay;
    use crate::notebook::StageStatus;
    use crate::template::StageDefinition;
    use chrono::{TimeZone, Utc};

    fn two_stage_template() -> GrowthTemplate {
        GrowthTemplate::new(
            "t",
            "T",
            vec![
                StageDefinition {
                    stage_number: 1,
                    name: "a".into(),
                    day_start: 1,
                    day_end: 5,
                    task_definitions: Vec::new(),
                    required_observation_keys: Vec::new(),
                    grace_days: 0,
                },
                StageDefinition {
                    stage_number: 2,
                    name: "b".into(),
                    day_start: 6,
                    day_end: 10,
                    task_definitions: Vec::new(),
                    required_observation_keys: Vec::new(),
                    grace_days: 0,
                },
            ],
        )
        .unwrap()
    }

    fn day(d: i64) -> LocalDay {
        LocalDay::from_ymd(2026, 3, 1).unwrap().plus_days(d - 1)
    }

    fn notebook(tpl: &GrowthTemplate) -> Notebook {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap();
        Notebook::new(tpl, day(1), day(1), at).unwrap()
    }

    #[test]
    fn test_fresh_notebook_is_zero() {
        let tpl = two_stage_template();
        let nb = notebook(&tpl);
        assert_eq!(recompute(&nb, &tpl), 0);
    }

    #[test]
    fn test_worked_example_sixty_five_percent() {
        // Stage 1: 5 days all logged at 100%. Stage 2 current: 2 elapsed
        // days logged at 50% and 100%.
        // round(100 * (5 + 2 * 0.75) / 10) = 65.
        let tpl = two_stage_template();
        let mut nb = notebook(&tpl);

        for d in 1..=5 {
            nb.ledger_mut(1).unwrap().upsert_daily_log(day(d), 100.0);
        }
        nb.ledger_mut(1).unwrap().status = StageStatus::Completed;
        nb.advance_to(tpl.stage(2).unwrap());
        nb.ledger_mut(2).unwrap().upsert_daily_log(day(6), 50.0);
        nb.ledger_mut(2).unwrap().upsert_daily_log(day(7), 100.0);

        assert_eq!(recompute(&nb, &tpl), 65);
    }

    #[test]
    fn test_skipped_stage_counts_full_span() {
        let tpl = two_stage_template();
        let mut nb = notebook(&tpl);

        nb.ledger_mut(1).unwrap().status = StageStatus::Skipped;
        nb.advance_to(tpl.stage(2).unwrap());

        // 5 of 10 days contributed by the skipped stage.
        assert_eq!(recompute(&nb, &tpl), 50);
    }

    #[test]
    fn test_terminal_completed_notebook_is_hundred() {
        let tpl = two_stage_template();
        let mut nb = notebook(&tpl);

        nb.ledger_mut(1).unwrap().status = StageStatus::Completed;
        nb.advance_to(tpl.stage(2).unwrap());
        nb.ledger_mut(2).unwrap().status = StageStatus::Completed;

        assert_eq!(recompute(&nb, &tpl), 100);
    }

    #[test]
    fn test_partial_current_stage_only() {
        let tpl = two_stage_template();
        let mut nb = notebook(&tpl);

        // 3 logged days averaging 50% in a 10-day template: 15%.
        nb.ledger_mut(1).unwrap().upsert_daily_log(day(1), 0.0);
        nb.ledger_mut(1).unwrap().upsert_daily_log(day(2), 50.0);
        nb.ledger_mut(1).unwrap().upsert_daily_log(day(3), 100.0);

        assert_eq!(recompute(&nb, &tpl), 15);
    }
}
