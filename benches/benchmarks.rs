//! Criterion benchmarks for the hot paths of the engine: the daily rollover
//! and the progress aggregation, over a season-long multi-stage template.

use chrono::Weekday;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use sprout::calendar::{Calendar, LocalDay};
use sprout::checklist::roll_to_today;
use sprout::notebook::Notebook;
use sprout::progress;
use sprout::template::{Frequency, GrowthTemplate, StageDefinition, TaskDefinition};

/// Six stages covering 180 days with a realistic mix of frequencies.
fn season_template() -> GrowthTemplate {
    let stage = |number: u32, start: u32, end: u32| StageDefinition {
        stage_number: number,
        name: format!("stage-{number}"),
        day_start: start,
        day_end: end,
        task_definitions: vec![
            TaskDefinition::new("water", Frequency::Daily),
            TaskDefinition::new("feed", Frequency::EveryNDays { n: 3 }),
            TaskDefinition::new("inspect", Frequency::Weekly { weekday: Weekday::Mon }),
            TaskDefinition::new("repot", Frequency::Once),
        ],
        required_observation_keys: Vec::new(),
        grace_days: 2,
    };
    GrowthTemplate::new(
        "season",
        "Season",
        vec![
            stage(1, 1, 14),
            stage(2, 15, 45),
            stage(3, 46, 90),
            stage(4, 91, 130),
            stage(5, 131, 160),
            stage(6, 161, 180),
        ],
    )
    .unwrap()
}

fn planted() -> LocalDay {
    LocalDay::from_ymd(2026, 3, 1).unwrap()
}

fn fresh_notebook(template: &GrowthTemplate) -> Notebook {
    let at = chrono::DateTime::from_timestamp(1_772_000_000, 0).unwrap();
    Notebook::new(template, planted(), planted(), at).unwrap()
}

/// A notebook rolled forward day by day for `days` days, never tended.
fn aged_notebook(template: &GrowthTemplate, days: i64) -> Notebook {
    let calendar = Calendar::vn();
    let mut notebook = fresh_notebook(template);
    for d in 1..=days {
        roll_to_today(&mut notebook, template, &calendar, planted().plus_days(d - 1)).unwrap();
    }
    notebook
}

fn bench_daily_rollover(c: &mut Criterion) {
    let template = season_template();
    let calendar = Calendar::vn();

    let mut group = c.benchmark_group("rollover");

    let fresh = fresh_notebook(&template);
    group.bench_function("first_day", |b| {
        b.iter_batched(
            || fresh.clone(),
            |mut nb| {
                roll_to_today(&mut nb, &template, &calendar, black_box(planted())).unwrap();
                nb
            },
            BatchSize::SmallInput,
        );
    });

    // Mid-season notebook with a large overdue backlog.
    let aged = aged_notebook(&template, 90);
    let day_91 = planted().plus_days(90);
    group.bench_function("day_91_with_backlog", |b| {
        b.iter_batched(
            || aged.clone(),
            |mut nb| {
                roll_to_today(&mut nb, &template, &calendar, black_box(day_91)).unwrap();
                nb
            },
            BatchSize::SmallInput,
        );
    });

    // Catch-up after a month untouched: several stage windows settle in one
    // call.
    let stale = aged_notebook(&template, 30);
    let day_60 = planted().plus_days(59);
    group.bench_function("thirty_day_catch_up", |b| {
        b.iter_batched(
            || stale.clone(),
            |mut nb| {
                roll_to_today(&mut nb, &template, &calendar, black_box(day_60)).unwrap();
                nb
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_progress(c: &mut Criterion) {
    let template = season_template();
    let aged = aged_notebook(&template, 120);

    c.bench_function("progress_recompute", |b| {
        b.iter(|| progress::recompute(black_box(&aged), black_box(&template)));
    });
}

criterion_group!(benches, bench_daily_rollover, bench_progress);
criterion_main!(benches);
