//! Sprout - plant growth journal engine
//!
//! The stage/checklist temporal engine behind a plant "growing journal":
//! it derives the day of a plant's life cycle, deterministically generates
//! the care tasks due today from a staged template, carries missed tasks
//! forward as explicit overdue records, settles stages (complete, grace
//! period, auto-skip), and aggregates an overall completion percentage.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`calendar`] - Local-day normalization, day arithmetic, injected clock
//! - [`template`] - Immutable growth templates and template providers
//! - [`notebook`] - The notebook aggregate and per-stage ledgers
//! - [`checklist`] - Daily checklist generation and overdue carry-forward
//! - [`transition`] - Stage completion / grace-period / auto-skip evaluation
//! - [`progress`] - Overall completion percentage
//! - [`engine`] - The facade wiring store, templates, clock, and sink
//! - [`store`] - Notebook persistence with optimistic check-and-set
//! - [`notify`] - Fire-and-forget notification events
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sprout::calendar::{Calendar, FixedClock};
//! use sprout::engine::JournalEngine;
//! use sprout::store::MemoryStore;
//! use sprout::template::InMemoryTemplateStore;
//! use sprout::testing::{scenario_template, RecordingSink};
//! use chrono::{TimeZone, Utc};
//!
//! let clock = Arc::new(FixedClock::at(
//!     Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap(),
//! ));
//! let engine = JournalEngine::new(
//!     MemoryStore::new(),
//!     InMemoryTemplateStore::with_templates([scenario_template()]),
//!     RecordingSink::new(),
//!     clock,
//!     Calendar::vn(),
//! );
//!
//! let notebook = engine.create_notebook("scenario", engine.local_today()).unwrap();
//! let checklist = engine.generate_today(notebook.id).unwrap();
//! assert_eq!(checklist[0].task_name, "water");
//! ```

pub mod calendar;
pub mod checklist;
pub mod config;
pub mod engine;
pub mod error;
pub mod notebook;
pub mod notify;
pub mod progress;
pub mod store;
pub mod template;
pub mod testing;
pub mod transition;

// Re-export commonly used types
pub use error::{Result, SproutError};

// Re-export calendar types
pub use calendar::{day_of_life, Calendar, Clock, FixedClock, LocalDay, SystemClock};

// Re-export template types
pub use template::{
    FileTemplateStore, Frequency, GrowthTemplate, InMemoryTemplateStore, StageDefinition,
    TaskDefinition, TemplateProvider,
};

// Re-export notebook types
pub use notebook::{
    CompletedTask, DailyLog, Notebook, NotebookId, ObservationRecord, OverdueStatus, OverdueTask,
    StageLedger, StageStatus, TaskInstance,
};

// Re-export engine types
pub use engine::{JournalEngine, SweepSummary};
pub use transition::TransitionOutcome;

// Re-export persistence and notification seams
pub use notify::{EventKind, NotificationEvent, NotificationSink, TracingSink};
pub use store::{JsonFileStore, MemoryStore, NotebookStore};

// Re-export configuration
pub use config::AppConfig;
