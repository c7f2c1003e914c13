//! Extract attachments from a message.
//!
//! Every leaf that is neither a text body nor inlined into the document is
//! an attachment. Names come from the part's declared filename, else its
//! Content-ID, else a generated prefix.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::error::{ConvertError, Result};
use crate::model::attachment::AttachmentDescriptor;
use crate::model::mail::PartSet;
use crate::model::part::MimePart;
use crate::parser::{header, transfer};
use crate::walker::MimeWalker;

/// Content types that are never written out as attachments.
pub const MIME_TYPES_BLACKLIST: &[&str] = &["text/html", "text/plain"];

/// Base name for parts with neither a filename nor a Content-ID.
pub const FLOATING_ATTACHMENT_PREFIX: &str = "floating_attachment";

/// Extensions too ambiguous to be picked automatically. With the JPEG
/// aliases gone, `image/jpeg` resolves to `jpg`.
const EXTENSION_BLACKLIST: &[&str] = &["jfif", "jpe", "jpeg", "pjp", "pjpeg"];

const MAX_FILENAME_LEN: usize = 200;

static DATE_IN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[-_]\d{2}[-_]\d{2}").unwrap_or_else(|e| panic!("invalid date regex: {e}"))
});

/// Where a derived filename came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// Content-Disposition `filename` or Content-Type `name`.
    Explicit,
    ContentId,
    Generated,
}

/// Extraction settings.
#[derive(Debug, Clone, Default)]
pub struct AttachmentOptions {
    /// Prefix names lacking a date with this day (`YYYY-MM-DD-`).
    pub prefix_date: Option<NaiveDate>,
    /// Skip parts without an explicit filename.
    pub ignore_floating: bool,
    /// Replace existing files instead of suffixing `_1`, `_2`, ...
    pub overwrite: bool,
}

/// Derive the base filename of a part, without date prefix or collision
/// suffix.
pub fn derive_filename(part: &MimePart) -> (String, NameSource) {
    if let Some(name) = part.explicit_filename() {
        return (sanitize_filename(&name), NameSource::Explicit);
    }

    let (base, source) = match part.content_id().map(header::strip_angle_brackets) {
        Some(cid) if !cid.trim().is_empty() => (sanitize_filename(cid), NameSource::ContentId),
        _ => (FLOATING_ATTACHMENT_PREFIX.to_string(), NameSource::Generated),
    };
    (with_type_extension(base, part.mime_type()), source)
}

/// Append the preferred extension of `mime_type` unless `name` already
/// carries one of its known extensions.
fn with_type_extension(name: String, mime_type: &str) -> String {
    let Some(extensions) = mime_guess::get_mime_extensions_str(mime_type) else {
        return name;
    };
    let lower = name.to_lowercase();
    if extensions
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
    {
        return name;
    }
    match extensions
        .iter()
        .copied()
        .filter(|ext| !EXTENSION_BLACKLIST.contains(ext))
        .min()
    {
        Some(ext) => format!("{name}.{ext}"),
        None => name,
    }
}

/// Neutralise path separators and control characters so the name stays
/// inside the output directory.
pub fn sanitize_filename(s: &str) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();

    match sanitized.as_str() {
        "" => FLOATING_ATTACHMENT_PREFIX.to_string(),
        "." | ".." => sanitized.replace('.', "_"),
        _ => sanitized,
    }
}

/// Prepend `YYYY-MM-DD-` unless the name already contains a date.
pub fn add_date_prefix(name: &str, day: NaiveDate) -> String {
    if DATE_IN_NAME.is_match(name) {
        name.to_string()
    } else {
        format!("{}{name}", day.format("%Y-%m-%d-"))
    }
}

/// Whether a leaf may be written out as an attachment at all.
fn is_candidate(part: &MimePart) -> bool {
    !MIME_TYPES_BLACKLIST.contains(&part.mime_type())
}

/// Build the descriptors of every attachment not in `ignore`, in traversal
/// order. Payloads that fail to transfer-decode are written raw with a
/// warning.
pub fn plan_attachments(
    walker: &MimeWalker<'_>,
    ignore: &PartSet,
    options: &AttachmentOptions,
    diag: &mut Diagnostics,
) -> Vec<AttachmentDescriptor> {
    let mut planned = Vec::new();
    for leaf in walker.leaves() {
        if ignore.contains(leaf.id) || !is_candidate(leaf.part) {
            continue;
        }

        let (mut filename, source) = derive_filename(leaf.part);
        if source != NameSource::Explicit && options.ignore_floating {
            tracing::debug!(leaf = leaf.id.0, "Skipping floating attachment");
            continue;
        }
        if let Some(day) = options.prefix_date {
            filename = add_date_prefix(&filename, day);
        }

        let payload = match transfer::decode_payload(leaf.part) {
            Ok(bytes) => bytes,
            Err(e) => {
                diag.warn(format!(
                    "Could not decode attachment {filename} ({e}); writing raw bytes"
                ));
                leaf.part.payload.clone()
            }
        };

        planned.push(AttachmentDescriptor {
            filename,
            content_type: leaf.part.mime_type().to_string(),
            payload,
            source: leaf.id,
        });
    }
    planned
}

/// Write planned attachments into `output_dir`; returns the written paths.
///
/// With `overwrite`, files left by an earlier run are replaced, but two
/// attachments of this run never share a path.
pub fn write_attachments(
    attachments: &[AttachmentDescriptor],
    output_dir: &Path,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(attachments.len());
    let mut written: HashSet<PathBuf> = HashSet::new();
    for attachment in attachments {
        let target = output_dir.join(&attachment.filename);
        let path = if overwrite {
            first_free_path(&target, |candidate| written.contains(candidate))
        } else {
            unique_path(&target)
        };
        tracing::info!(
            path = %path.display(),
            content_type = %attachment.content_type,
            "Extracting attachment"
        );
        std::fs::write(&path, &attachment.payload).map_err(|e| ConvertError::io(&path, e))?;
        written.insert(path.clone());
        paths.push(path);
    }
    Ok(paths)
}

/// Plan and write in one step.
pub fn extract_attachments(
    walker: &MimeWalker<'_>,
    ignore: &PartSet,
    output_dir: &Path,
    options: &AttachmentOptions,
    diag: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let planned = plan_attachments(walker, ignore, options, diag);
    tracing::debug!(count = planned.len(), "Attachments found");
    write_attachments(&planned, output_dir, options.overwrite)
}

/// Leaves a recovery pass may extract: consumed parts that declare an
/// explicit filename.
pub fn recovery_candidates(walker: &MimeWalker<'_>, consumed: &PartSet) -> PartSet {
    consumed
        .iter()
        .filter(|id| {
            walker
                .get(*id)
                .is_some_and(|leaf| leaf.part.explicit_filename().is_some())
        })
        .collect()
}

/// Sorted derived names of the attachments not in `ignore`, for the
/// document listing.
pub fn list_attachment_names(walker: &MimeWalker<'_>, ignore: &PartSet) -> Vec<String> {
    let mut names: Vec<String> = walker
        .leaves()
        .filter(|leaf| !ignore.contains(leaf.id) && is_candidate(leaf.part))
        .map(|leaf| derive_filename(leaf.part).0)
        .collect();
    names.sort();
    names
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    first_free_path(path, |candidate| candidate.exists())
}

/// `path`, or the first `{stem}_{i}.{ext}` for which `taken` is false.
fn first_free_path(path: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(path) {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    (1..)
        .map(|i| {
            if ext.is_empty() {
                parent.join(format!("{stem}_{i}"))
            } else {
                parent.join(format!("{stem}_{i}.{ext}"))
            }
        })
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}
