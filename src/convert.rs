//! One conversion, end to end.
//!
//! Parse the input once, resolve the body and calendar, inline `cid:`
//! images, render the page, then extract every part the body did not
//! consume. Warnings collected on the way decide the exit status and
//! trigger the sidecar files.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::content::body::{self, BodyKind};
use crate::content::calendar;
use crate::content::fetch::ImageFetcher;
use crate::content::sanitize::{self, RemotePolicy};
use crate::diagnostics::Diagnostics;
use crate::error::{ConvertError, Result};
use crate::export::attachment::{self, AttachmentOptions};
use crate::export::document::{self, PageContent};
use crate::export::metadata::MetadataStamper;
use crate::export::render::DocumentRenderer;
use crate::model::mail::PartSet;
use crate::parser::eml::{self, InputSource};
use crate::parser::mime;
use crate::walker::MimeWalker;

/// Suffix of the warnings report written next to the document.
pub const WARNINGS_SUFFIX: &str = "_warnings_and_errors.txt";

/// Suffix of the copy of the input written next to the document.
pub const ORIGINAL_SUFFIX: &str = "_original.eml";

/// Everything one invocation needs to know.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input: InputSource,
    /// Encoding label of the input; `None` parses the bytes as they are.
    pub input_encoding: Option<String>,
    /// Explicit document path; a timestamped name is generated otherwise.
    pub output_file: Option<PathBuf>,
    pub output_directory: PathBuf,
    pub overwrite: bool,
    /// Render the body document.
    pub body: bool,
    /// Extract attachments.
    pub attachments: bool,
    /// Prepend the header block.
    pub headers: bool,
    pub remote: RemotePolicy,
    pub add_prefix_date: bool,
    pub ignore_floating: bool,
    pub suppress_warnings: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input: InputSource::Stdin,
            input_encoding: None,
            output_file: None,
            output_directory: PathBuf::from("."),
            overwrite: false,
            body: true,
            attachments: true,
            headers: false,
            remote: RemotePolicy::default(),
            add_prefix_date: false,
            ignore_floating: false,
            suppress_warnings: false,
        }
    }
}

/// Result of a completed conversion.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub warnings_occurred: bool,
    pub suppress_warnings: bool,
    /// Document path (chosen even when the body was not rendered).
    pub output: PathBuf,
    /// Attachment files written.
    pub attachments: Vec<PathBuf>,
}

impl Outcome {
    /// 1 when warnings occurred and were not suppressed, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.warnings_occurred && !self.suppress_warnings {
            1
        } else {
            0
        }
    }
}

/// Run one conversion.
pub fn run(
    options: &ConvertOptions,
    renderer: &dyn DocumentRenderer,
    stamper: &dyn MetadataStamper,
    fetcher: &dyn ImageFetcher,
) -> Result<Outcome> {
    let output_dir = options.output_directory.as_path();
    if !output_dir.is_dir() {
        return Err(ConvertError::OutputDirectoryMissing(output_dir.to_path_buf()));
    }
    let output = output_file_name(options)?;
    tracing::info!(output = %output.display(), "Output file name chosen");

    let raw = eml::read_input(&options.input)?;
    let message = mime::parse_message(&eml::transcode(&raw, options.input_encoding.as_deref())?)?;
    let walker = MimeWalker::new(&message);
    let mut diag = Diagnostics::new();

    let body = body::resolve_body(&walker, &mut diag);
    let (body_html, consumed) = if body.kind == BodyKind::Html {
        sanitize::inline_cid_images(&body.html, &walker, &mut diag)
    } else {
        (body.html, PartSet::new())
    };
    tracing::debug!(consumed = consumed.len(), "Parts inlined into the body");

    if options.body {
        let body_html = sanitize::remove_invalid_sources(&body_html, &options.remote, fetcher);
        let calendar_html = calendar::render_calendar(&walker, &mut diag);
        let names = attachment::list_attachment_names(&walker, &consumed);
        let header_block = options.headers.then(|| document::header_block(&message.headers));

        let html = document::assemble_html(&PageContent {
            header_block: header_block.as_deref(),
            body: &body_html,
            calendar: &calendar_html,
            attachment_names: &names,
        });
        document::produce_document(&html, &output, &message.headers, renderer, stamper)?;
    }

    let attachment_options = AttachmentOptions {
        prefix_date: options
            .add_prefix_date
            .then(|| Local::now().date_naive()),
        ignore_floating: options.ignore_floating,
        overwrite: options.overwrite,
    };

    let mut written = Vec::new();
    if options.attachments {
        written = attachment::extract_attachments(
            &walker,
            &consumed,
            output_dir,
            &attachment_options,
            &mut diag,
        )?;
    }

    if !options.body && written.is_empty() {
        tracing::info!(
            "No body and no attachments extracted, retrying with filenamed inline parts"
        );
        let recoverable = attachment::recovery_candidates(&walker, &consumed);
        if !recoverable.is_empty() {
            tracing::debug!(count = recoverable.len(), "Inline parts with a filename found");
            written = attachment::extract_attachments(
                &walker,
                &consumed.difference(&recoverable),
                output_dir,
                &attachment_options,
                &mut diag,
            )?;
        }
        if written.is_empty() {
            diag.warn(
                "Second try: didn't print body (on request) and still didn't find any attachments \
                 even when looked for referenced ones with a filename. Giving up.",
            );
        }
    }

    if diag.has_warnings() {
        write_sidecars(&output, &diag, &raw)?;
    }

    Ok(Outcome {
        warnings_occurred: diag.has_warnings(),
        suppress_warnings: options.suppress_warnings,
        output,
        attachments: written,
    })
}

/// The explicit output file, refused when it exists without overwrite, or
/// a fresh `<dir>/YYYY-MM-DDTHH-MM-SS.pdf`.
fn output_file_name(options: &ConvertOptions) -> Result<PathBuf> {
    match &options.output_file {
        Some(path) => {
            if path.is_file() && !options.overwrite {
                return Err(ConvertError::OutputExists(path.clone()));
            }
            Ok(path.clone())
        }
        None => {
            let name = Local::now().format("%Y-%m-%dT%H-%M-%S.pdf").to_string();
            Ok(attachment::unique_path(&options.output_directory.join(name)))
        }
    }
}

/// `out.pdf` + `_original.eml` → `out_original.eml`, in the same directory.
pub fn sidecar_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}{suffix}"))
}

fn write_sidecars(output: &Path, diag: &Diagnostics, raw: &[u8]) -> Result<()> {
    diag.write_report(&sidecar_path(output, WARNINGS_SUFFIX))?;
    let original = sidecar_path(output, ORIGINAL_SUFFIX);
    std::fs::write(&original, raw).map_err(|e| ConvertError::io(&original, e))
}
