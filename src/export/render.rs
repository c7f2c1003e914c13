//! HTML to PDF rendering through an external program.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ConvertError, Result};

/// Default renderer binary.
pub const WKHTMLTOPDF: &str = "wkhtmltopdf";

/// Renderer stderr lines that are expected and carry no information.
static IGNORED_STDERR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"QFont::setPixelSize: Pixel size <= 0 \(0\)",
        r"Exit with code 1 due to network error: ContentNotFoundError",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid stderr pattern {p}: {e}")))
    .collect()
});

/// Turns a complete UTF-8 HTML document into a document file.
pub trait DocumentRenderer {
    fn render(&self, html: &[u8], output: &Path) -> Result<()>;
}

/// `wkhtmltopdf` reading the page from stdin.
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    program: PathBuf,
}

impl WkHtmlToPdf {
    /// Resolve `command` on `PATH`.
    pub fn locate(command: &str) -> Result<Self> {
        let program =
            which::which(command).map_err(|_| ConvertError::RendererMissing(command.to_string()))?;
        tracing::debug!(program = %program.display(), "Found renderer");
        Ok(Self { program })
    }
}

impl DocumentRenderer for WkHtmlToPdf {
    fn render(&self, html: &[u8], output: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args([
                "-q",
                "--load-error-handling",
                "ignore",
                "--load-media-error-handling",
                "ignore",
                "--encoding",
                "utf-8",
                "-",
            ])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConvertError::RenderError(format!("failed to start renderer: {e}")))?;

        // Feed stdin from another thread so a full stdout/stderr pipe cannot
        // block the write.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConvertError::RenderError("renderer stdin unavailable".into()))?;
        let page = html.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&page));

        let result = child
            .wait_with_output()
            .map_err(|e| ConvertError::RenderError(format!("failed to wait for renderer: {e}")))?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Renderer closed stdin early"),
            Err(_) => tracing::debug!("Renderer stdin writer panicked"),
        }

        if !result.stdout.is_empty() {
            tracing::debug!(bytes = result.stdout.len(), "Renderer wrote to stdout");
        }
        let stderr = String::from_utf8_lossy(&result.stderr);
        let filtered = filter_stderr(&stderr);
        let code = result.status.code();
        match (result.status.success(), stderr.trim().is_empty(), filtered.is_empty()) {
            (false, true, _) => {
                tracing::debug!(?code, "Renderer failed with no error output")
            }
            (false, false, false) => {
                tracing::debug!(?code, stderr = %filtered, "Renderer failed")
            }
            (true, _, false) => {
                tracing::debug!(stderr = %filtered, "Renderer succeeded with unexpected output")
            }
            _ => {}
        }
        Ok(())
    }
}

/// Strip the known benign messages from renderer stderr.
pub fn filter_stderr(stderr: &str) -> String {
    let mut remaining = stderr.to_string();
    for pattern in IGNORED_STDERR.iter() {
        let count = pattern.find_iter(&remaining).count();
        if count > 0 {
            tracing::debug!(count, pattern = pattern.as_str(), "Removed benign renderer output");
            remaining = pattern.replace_all(&remaining, "").into_owned();
        }
    }
    remaining.trim_end().to_string()
}
