//! Custom error types for Sprout.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Sprout operations
#[derive(Error, Debug)]
pub enum SproutError {
    // =========================================================================
    // Template Errors
    // =========================================================================
    /// Template store unreachable or template id unknown.
    /// Generation aborts and the ledger is left untouched; callers may retry.
    #[error("Template '{template_id}' unavailable: {reason}")]
    TemplateUnavailable { template_id: String, reason: String },

    /// Template failed validation at construction time
    #[error("Invalid template '{template_id}': {reason}")]
    InvalidTemplate { template_id: String, reason: String },

    // =========================================================================
    // Notebook Errors
    // =========================================================================
    /// Notebook does not exist (or has been deleted)
    #[error("Notebook not found: {id}")]
    NotebookNotFound { id: String },

    /// Notebook failed validation at creation time
    #[error("Invalid notebook: {reason}")]
    InvalidNotebook { reason: String },

    /// `current_stage` has no matching stage in the template. This indicates
    /// data corruption upstream (e.g. an incompatible template mutation) and
    /// is surfaced rather than papered over.
    #[error("No active ledger: stage {stage_number} is not defined by template '{template_id}'")]
    NoActiveLedger {
        stage_number: u32,
        template_id: String,
    },

    // =========================================================================
    // Operation Errors
    // =========================================================================
    /// Observation key not declared by the current stage's template
    #[error("Unknown observation key '{key}' for stage {stage_number}")]
    UnknownObservationKey { key: String, stage_number: u32 },

    /// Task name not present in today's checklist or the overdue set
    #[error("Unknown task '{task_name}': not in today's checklist or overdue")]
    UnknownTask { task_name: String },

    /// Observation recorded against a ledger that is already settled
    #[error("Stage {stage_number} is closed ({status}); its ledger is immutable history")]
    StageClosed { stage_number: u32, status: String },

    /// The optimistic check-and-set on the notebook record lost a race.
    /// Callers should re-read and, if `last_generated_day` is now current,
    /// treat the operation as already done; else retry once.
    #[error("Concurrent update conflict on notebook {id}")]
    ConcurrentGenerationConflict { id: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load or validate configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SproutError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a template-unavailable error
    pub fn template_unavailable(
        template_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TemplateUnavailable {
            template_id: template_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-template error
    pub fn invalid_template(template_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template_id: template_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a notebook-not-found error
    pub fn notebook_not_found(id: impl ToString) -> Self {
        Self::NotebookNotFound { id: id.to_string() }
    }

    /// Create an invalid-notebook error
    pub fn invalid_notebook(reason: impl Into<String>) -> Self {
        Self::InvalidNotebook {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a conflict error
    pub fn conflict(id: impl ToString) -> Self {
        Self::ConcurrentGenerationConflict { id: id.to_string() }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if the caller should retry the same operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TemplateUnavailable { .. } | Self::ConcurrentGenerationConflict { .. }
        )
    }

    /// Check if this error indicates upstream data corruption
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoActiveLedger { .. })
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotebookNotFound { .. } => 2,
            Self::TemplateUnavailable { .. } | Self::InvalidTemplate { .. } => 3,
            Self::NoActiveLedger { .. } => 4,
            Self::UnknownObservationKey { .. }
            | Self::UnknownTask { .. }
            | Self::StageClosed { .. } => 5,
            Self::ConcurrentGenerationConflict { .. } => 6,
            Self::Config { .. } | Self::InvalidNotebook { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for Sprout results
pub type Result<T> = std::result::Result<T, SproutError>;
