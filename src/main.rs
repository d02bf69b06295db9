//! Sprout - plant growth journal engine
//!
//! CLI over the journal engine: create notebooks, generate and complete
//! today's care checklist, record stage observations, and run the daily
//! sweep across every notebook.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use sprout::calendar::SystemClock;
use sprout::engine::{JournalEngine, SweepSummary};
use sprout::notebook::{Notebook, NotebookId, TaskInstance};
use sprout::notify::TracingSink;
use sprout::store::{JsonFileStore, NotebookStore};
use sprout::template::{FileTemplateStore, GrowthTemplate, TemplateProvider};
use sprout::{AppConfig, LocalDay, SproutError};

type Engine = JournalEngine<JsonFileStore, FileTemplateStore, TracingSink>;

#[derive(Parser)]
#[command(name = "sprout")]
#[command(version = "0.1.0")]
#[command(about = "Plant growth journal - staged care checklists", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to sprout.toml (defaults to <data dir>/sprout.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the notebook data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a notebook following a growth template
    Init {
        /// Template id to follow
        template: String,

        /// Planting date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        planted: Option<String>,
    },

    /// Generate (or show) today's checklist for a notebook
    Today {
        /// Notebook id
        notebook: String,
    },

    /// Mark a task completed (today's checklist first, then overdue)
    Complete {
        /// Notebook id
        notebook: String,

        /// Task name as shown in the checklist
        task: String,
    },

    /// Record a stage observation
    Observe {
        /// Notebook id
        notebook: String,

        /// Observation key declared by the current stage
        key: String,

        /// Observed value
        #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
        value: bool,
    },

    /// Show the overall completion percentage
    Progress {
        /// Notebook id
        notebook: String,
    },

    /// Show a notebook summary
    Show {
        /// Notebook id
        notebook: String,
    },

    /// Mark a notebook deleted (the sweep will skip it)
    Delete {
        /// Notebook id
        notebook: String,
    },

    /// Run today's generation across every notebook
    Sweep,

    /// Manage growth templates
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },
}

#[derive(Subcommand)]
enum TemplatesAction {
    /// List available template ids
    List,

    /// Publish a template from a JSON file
    Publish {
        /// Path to a template JSON file
        file: PathBuf,
    },

    /// Show a template's stages
    Show {
        /// Template id
        template: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sprout=debug,info"
    } else {
        "sprout=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> sprout::Result<()> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load(default_config_path())?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let engine = build_engine(&config);

    match cli.command {
        Commands::Init { template, planted } => {
            let planted = match planted {
                Some(s) => parse_local_day(&s)?,
                None => engine.local_today(),
            };
            let notebook = engine.create_notebook(&template, planted)?;
            println!(
                "{} notebook {} (template '{}', planted {})",
                "Created".green().bold(),
                notebook.id,
                template,
                planted
            );
        }

        Commands::Today { notebook } => {
            let id = NotebookId::parse(&notebook)?;
            let checklist = engine.generate_today(id)?;
            let nb = engine.notebook(id)?;
            print_checklist(&nb, &checklist);
        }

        Commands::Complete { notebook, task } => {
            let id = NotebookId::parse(&notebook)?;
            engine.complete_task(id, &task)?;
            println!("{} {}", "Completed".green().bold(), task);
        }

        Commands::Observe {
            notebook,
            key,
            value,
        } => {
            let id = NotebookId::parse(&notebook)?;
            let outcome = engine.record_observation(id, &key, value)?;
            println!(
                "{} {} = {} ({:?})",
                "Recorded".green().bold(),
                key,
                value,
                outcome
            );
        }

        Commands::Progress { notebook } => {
            let id = NotebookId::parse(&notebook)?;
            let percent = engine.progress(id)?;
            println!("{percent}%");
        }

        Commands::Show { notebook } => {
            let id = NotebookId::parse(&notebook)?;
            let nb = engine.notebook(id)?;
            let percent = engine.progress(id)?;
            print_summary(&engine, &nb, percent);
        }

        Commands::Delete { notebook } => {
            let id = NotebookId::parse(&notebook)?;
            engine.delete_notebook(id)?;
            println!("{} notebook {}", "Deleted".yellow().bold(), id);
        }

        Commands::Sweep => {
            let summary = parallel_sweep(Arc::new(engine)).await?;
            println!(
                "{} {} generated, {} skipped, {} failed",
                "Sweep:".green().bold(),
                summary.generated,
                summary.skipped_deleted,
                summary.failed
            );
        }

        Commands::Templates { action } => match action {
            TemplatesAction::List => {
                let store = FileTemplateStore::new(&config.templates_dir);
                let ids = store.list()?;
                if ids.is_empty() {
                    println!("No templates in {}", config.templates_dir.display());
                }
                for id in ids {
                    println!("{id}");
                }
            }
            TemplatesAction::Publish { file } => {
                let contents = std::fs::read_to_string(&file)?;
                let parsed: GrowthTemplate = serde_json::from_str(&contents)?;
                // Re-validate through the constructor before publishing.
                let template = GrowthTemplate::new(
                    parsed.template_id.clone(),
                    parsed.name.clone(),
                    parsed.stages().to_vec(),
                )?;
                let store = FileTemplateStore::new(&config.templates_dir);
                store.publish(&template)?;
                println!(
                    "{} template '{}'",
                    "Published".green().bold(),
                    template.template_id
                );
            }
            TemplatesAction::Show { template } => {
                let store = FileTemplateStore::new(&config.templates_dir);
                let tpl = store.template(&template)?;
                println!("{} ({})", tpl.name.bold(), tpl.template_id);
                for stage in tpl.stages() {
                    println!(
                        "  {}. {} days {}-{} (grace {})",
                        stage.stage_number,
                        stage.name,
                        stage.day_start,
                        stage.day_end,
                        stage.grace_days
                    );
                    for task in &stage.task_definitions {
                        println!("     - {} [{}]", task.task_name, task.frequency);
                    }
                    for key in &stage.required_observation_keys {
                        println!("     ? {key}");
                    }
                }
            }
        },
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sprout")
        .join("sprout.toml")
}

fn build_engine(config: &AppConfig) -> Engine {
    JournalEngine::new(
        JsonFileStore::new(&config.data_dir),
        FileTemplateStore::new(&config.templates_dir),
        TracingSink,
        Arc::new(SystemClock),
        config.calendar(),
    )
}

fn parse_local_day(s: &str) -> sprout::Result<LocalDay> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(LocalDay::from)
        .map_err(|e| SproutError::config(format!("invalid date '{s}': {e}")))
}

fn print_checklist(notebook: &Notebook, checklist: &[TaskInstance]) {
    let day = notebook
        .last_generated_day
        .map(|d| d.to_string())
        .unwrap_or_default();
    println!(
        "{} day {} of life, stage {}",
        day.bold(),
        notebook.day_of_life(notebook.last_generated_day.unwrap_or(notebook.planted_date)),
        notebook.current_stage
    );
    if checklist.is_empty() {
        println!("  nothing due today");
    }
    for task in checklist {
        let mark = if task.is_completed {
            "✓".green()
        } else {
            "○".yellow()
        };
        println!("  {} {} [{}]", mark, task.task_name, task.frequency);
    }
    let overdue: usize = notebook
        .stages_tracking
        .iter()
        .flat_map(|l| &l.overdue_tasks)
        .filter(|o| o.status == sprout::OverdueStatus::Overdue)
        .count();
    if overdue > 0 {
        println!("  {} {overdue} overdue task(s)", "!".red().bold());
    }
}

fn print_summary(engine: &Engine, notebook: &Notebook, percent: u8) {
    println!("{}", notebook.id.to_string().bold());
    println!("  template:  {}", notebook.template_id);
    println!("  planted:   {}", notebook.planted_date);
    println!(
        "  day:       {}",
        notebook.day_of_life(engine.local_today())
    );
    println!("  stage:     {}", notebook.current_stage);
    println!("  progress:  {percent}%");
    for ledger in &notebook.stages_tracking {
        let status = match ledger.status {
            sprout::StageStatus::Active => "active".green(),
            sprout::StageStatus::Completed => "completed".blue(),
            sprout::StageStatus::Skipped => "skipped".red(),
        };
        println!(
            "  stage {}: {} ({} done, {} overdue, {} logs)",
            ledger.stage_number,
            status,
            ledger.completed_tasks.len(),
            ledger.overdue_tasks.len(),
            ledger.daily_logs.len()
        );
    }
}

/// Sweep all notebooks in parallel; notebooks are independent records, so
/// each one runs on its own blocking task.
async fn parallel_sweep(engine: Arc<Engine>) -> sprout::Result<SweepSummary> {
    let ids = engine.store().list_ids()?;
    let bar = ProgressBar::new(ids.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.green} {pos}/{len} notebooks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut handles = Vec::with_capacity(ids.len());
    for id in ids {
        let engine = engine.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            match engine.store().load(id) {
                Ok(nb) if nb.deleted => SweepOutcome::Skipped,
                Ok(_) => match engine.generate_today(id) {
                    Ok(_) => SweepOutcome::Generated,
                    Err(e) => {
                        tracing::warn!(notebook = %id, "sweep generation failed: {e}");
                        SweepOutcome::Failed
                    }
                },
                Err(e) => {
                    tracing::warn!(notebook = %id, "sweep load failed: {e}");
                    SweepOutcome::Failed
                }
            }
        }));
    }

    let mut summary = SweepSummary::default();
    for outcome in futures::future::join_all(handles).await {
        match outcome {
            Ok(SweepOutcome::Generated) => summary.generated += 1,
            Ok(SweepOutcome::Skipped) => summary.skipped_deleted += 1,
            _ => summary.failed += 1,
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(summary)
}

enum SweepOutcome {
    Generated,
    Skipped,
    Failed,
}
