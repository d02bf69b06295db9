//! Growth template model and template providers.
//!
//! A [`GrowthTemplate`] is an immutable, ordered list of stage definitions:
//! each stage covers an inclusive day-of-life range and carries the recurring
//! care tasks, required observation keys, and grace period for that phase of
//! the plant's life. Templates are validated once at construction and never
//! mutated after publish, so providers may cache them freely.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SproutError};

/// How often a care task recurs within its stage.
///
/// Modeled as a closed tagged variant so frequency evaluation is exhaustive:
/// adding a frequency without handling it everywhere fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frequency {
    /// Due every day of the stage.
    Daily,
    /// Due on stage-days 1, 1+n, 1+2n, ...
    EveryNDays { n: u32 },
    /// Due on a fixed weekday.
    Weekly { weekday: Weekday },
    /// Due exactly once, on the first day of the stage.
    Once,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::EveryNDays { n } => write!(f, "every {n} days"),
            Frequency::Weekly { weekday } => write!(f, "weekly ({weekday})"),
            Frequency::Once => write!(f, "once"),
        }
    }
}

/// A single recurring care task within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique name within the stage, e.g. "water".
    pub task_name: String,
    /// Recurrence rule.
    pub frequency: Frequency,
    /// Free-text instructions shown to the user.
    #[serde(default)]
    pub description: String,
}

impl TaskDefinition {
    /// Convenience constructor.
    #[must_use]
    pub fn new(task_name: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            task_name: task_name.into(),
            frequency,
            description: String::new(),
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One stage of a growth template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// 1-based stage number, unique within the template; ordering is numeric.
    pub stage_number: u32,
    /// Human-readable stage name, e.g. "seedling".
    pub name: String,
    /// First day-of-life covered by this stage (1-based, inclusive).
    pub day_start: u32,
    /// Last day-of-life covered by this stage (inclusive).
    pub day_end: u32,
    /// Recurring care tasks for the stage.
    #[serde(default)]
    pub task_definitions: Vec<TaskDefinition>,
    /// Observation keys that must be confirmed true before the stage can
    /// complete.
    #[serde(default)]
    pub required_observation_keys: Vec<String>,
    /// Days past `day_end` tolerated before the stage is auto-skipped.
    #[serde(default)]
    pub grace_days: u32,
}

impl StageDefinition {
    /// Number of days this stage spans.
    #[must_use]
    pub fn span_days(&self) -> u32 {
        self.day_end - self.day_start + 1
    }

    /// Whether the stage declares the given observation key.
    #[must_use]
    pub fn declares_observation(&self, key: &str) -> bool {
        self.required_observation_keys.iter().any(|k| k == key)
    }
}

/// An immutable, validated growth template.
///
/// # Example
///
/// ```
/// use sprout::template::{Frequency, GrowthTemplate, StageDefinition, TaskDefinition};
///
/// let template = GrowthTemplate::new(
///     "chili-basic",
///     "Chili (basic)",
///     vec![StageDefinition {
///         stage_number: 1,
///         name: "seedling".into(),
///         day_start: 1,
///         day_end: 10,
///         task_definitions: vec![TaskDefinition::new("water", Frequency::Daily)],
///         required_observation_keys: vec!["sprouted".into()],
///         grace_days: 2,
///     }],
/// )
/// .unwrap();
/// assert_eq!(template.total_days(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthTemplate {
    /// Stable template identifier.
    pub template_id: String,
    /// Human-readable template name.
    pub name: String,
    stages: Vec<StageDefinition>,
}

impl GrowthTemplate {
    /// Build and validate a template.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::InvalidTemplate`] if the template is empty,
    /// stage numbers are not strictly increasing, a day range is inverted or
    /// overlaps its predecessor, or an `every_n_days` frequency has `n == 0`.
    pub fn new(
        template_id: impl Into<String>,
        name: impl Into<String>,
        stages: Vec<StageDefinition>,
    ) -> Result<Self> {
        let template = Self {
            template_id: template_id.into(),
            name: name.into(),
            stages,
        };
        template.validate()?;
        Ok(template)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| SproutError::invalid_template(&self.template_id, reason);

        if self.stages.is_empty() {
            return Err(invalid("template has no stages".into()));
        }

        let mut prev: Option<&StageDefinition> = None;
        for stage in &self.stages {
            if stage.stage_number == 0 {
                return Err(invalid("stage numbers are 1-based".into()));
            }
            if stage.day_start == 0 {
                return Err(invalid(format!(
                    "stage {}: day_start is 1-based",
                    stage.stage_number
                )));
            }
            if stage.day_end < stage.day_start {
                return Err(invalid(format!(
                    "stage {}: day range {}..={} is inverted",
                    stage.stage_number, stage.day_start, stage.day_end
                )));
            }
            if let Some(prev) = prev {
                if stage.stage_number <= prev.stage_number {
                    return Err(invalid(format!(
                        "stage numbers must be strictly increasing ({} after {})",
                        stage.stage_number, prev.stage_number
                    )));
                }
                if stage.day_start <= prev.day_end {
                    return Err(invalid(format!(
                        "stage {} overlaps stage {} (starts day {} before day {} ends)",
                        stage.stage_number, prev.stage_number, stage.day_start, prev.day_end
                    )));
                }
            }
            for task in &stage.task_definitions {
                if task.task_name.is_empty() {
                    return Err(invalid(format!(
                        "stage {}: task with empty name",
                        stage.stage_number
                    )));
                }
                if let Frequency::EveryNDays { n: 0 } = task.frequency {
                    return Err(invalid(format!(
                        "stage {} task '{}': every_n_days requires n >= 1",
                        stage.stage_number, task.task_name
                    )));
                }
            }
            prev = Some(stage);
        }
        Ok(())
    }

    /// The ordered stage list.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// The first stage of the template.
    #[must_use]
    pub fn first_stage(&self) -> &StageDefinition {
        &self.stages[0]
    }

    /// Look up a stage by number.
    #[must_use]
    pub fn stage(&self, stage_number: u32) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.stage_number == stage_number)
    }

    /// The stage following the given stage number, if any.
    #[must_use]
    pub fn next_stage(&self, stage_number: u32) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.stage_number > stage_number)
    }

    /// Total day-span across all stages.
    #[must_use]
    pub fn total_days(&self) -> u32 {
        self.stages.iter().map(StageDefinition::span_days).sum()
    }
}

/// Read-only provider of growth templates.
///
/// Templates are immutable after publish, so implementations may cache
/// aggressively. Any failure maps to [`SproutError::TemplateUnavailable`]
/// and leaves the caller's ledger untouched.
pub trait TemplateProvider: Send + Sync {
    /// Fetch the template with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::TemplateUnavailable`] if the store is
    /// unreachable or the id is unknown.
    fn template(&self, template_id: &str) -> Result<Arc<GrowthTemplate>>;
}

/// In-memory template store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: HashMap<String, Arc<GrowthTemplate>>,
}

impl InMemoryTemplateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template to the store.
    pub fn insert(&mut self, template: GrowthTemplate) {
        self.templates
            .insert(template.template_id.clone(), Arc::new(template));
    }

    /// Build a store from a set of templates.
    #[must_use]
    pub fn with_templates(templates: impl IntoIterator<Item = GrowthTemplate>) -> Self {
        let mut store = Self::new();
        for template in templates {
            store.insert(template);
        }
        store
    }
}

impl TemplateProvider for InMemoryTemplateStore {
    fn template(&self, template_id: &str) -> Result<Arc<GrowthTemplate>> {
        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| SproutError::template_unavailable(template_id, "unknown template id"))
    }
}

/// Directory-backed template store with a permanent in-memory cache.
///
/// Each template lives in `<dir>/<template_id>.json`. Files are parsed and
/// validated on first access and cached forever afterwards.
#[derive(Debug)]
pub struct FileTemplateStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<GrowthTemplate>>>,
}

impl FileTemplateStore {
    /// Create a store over the given directory.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Path to the file backing a template id.
    #[must_use]
    pub fn template_path(&self, template_id: &str) -> PathBuf {
        self.dir.join(format!("{template_id}.json"))
    }

    /// Persist a template into the store directory.
    pub fn publish(&self, template: &GrowthTemplate) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(template)?;
        fs::write(self.template_path(&template.template_id), json)?;
        debug!(template_id = %template.template_id, "published template");
        Ok(())
    }

    /// List the template ids present in the store directory.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl TemplateProvider for FileTemplateStore {
    fn template(&self, template_id: &str) -> Result<Arc<GrowthTemplate>> {
        if let Some(cached) = self
            .cache
            .lock()
            .expect("template cache lock poisoned")
            .get(template_id)
        {
            return Ok(cached.clone());
        }

        let path = self.template_path(template_id);
        let contents = fs::read_to_string(&path).map_err(|e| {
            SproutError::template_unavailable(template_id, format!("{}: {e}", path.display()))
        })?;
        let template: GrowthTemplate = serde_json::from_str(&contents).map_err(|e| {
            SproutError::template_unavailable(template_id, format!("malformed template: {e}"))
        })?;
        template.validate()?;
        if template.template_id != template_id {
            return Err(SproutError::template_unavailable(
                template_id,
                format!("file declares id '{}'", template.template_id),
            ));
        }

        let template = Arc::new(template);
        self.cache
            .lock()
            .expect("template cache lock poisoned")
            .insert(template_id.to_string(), template.clone());
        Ok(template)
    }
}
