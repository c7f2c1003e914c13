//! Warnings collected during one conversion.
//!
//! Every degraded outcome (an unresolvable image, an unknown charset, a
//! calendar that would not parse) is logged through `tracing` and also kept
//! here, so the run can report "completed with warnings" and write the
//! `_warnings_and_errors.txt` sidecar.

use std::path::Path;

use crate::error::{ConvertError, Result};

/// Collector for the warnings of one invocation.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it as a `WARN` tracing event.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Write all warnings, one `WARNING: ...` line each.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let mut report = String::new();
        for warning in &self.warnings {
            report.push_str("WARNING: ");
            report.push_str(warning);
            report.push('\n');
        }
        std::fs::write(path, report).map_err(|e| ConvertError::io(path, e))
    }
}
