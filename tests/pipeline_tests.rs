//! End-to-end conversions of the `.eml` fixtures with a stub renderer.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;

use eml2pdf::content::fetch::NoFetch;
use eml2pdf::content::sanitize::RemotePolicy;
use eml2pdf::convert::{self, ConvertOptions, Outcome};
use eml2pdf::error::{ConvertError, Result};
use eml2pdf::export::metadata::{decode_pdf_text, PdfInfoStamper};
use eml2pdf::export::render::DocumentRenderer;
use eml2pdf::parser::eml::InputSource;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Keeps the page it was given and writes a one-page PDF.
#[derive(Default)]
struct StubRenderer {
    html: RefCell<Option<String>>,
}

impl StubRenderer {
    fn page(&self) -> String {
        self.html.borrow().clone().expect("renderer was not called")
    }
}

impl DocumentRenderer for StubRenderer {
    fn render(&self, html: &[u8], output: &Path) -> Result<()> {
        *self.html.borrow_mut() = Some(String::from_utf8_lossy(html).into_owned());

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let info_id = doc.add_object(dictionary! {
            "Creator" => Object::string_literal("stub"),
        });
        doc.trailer.set("Info", info_id);
        doc.save(output)
            .map(|_| ())
            .map_err(|e| ConvertError::RenderError(e.to_string()))
    }
}

fn options(input: &str, dir: &TempDir) -> ConvertOptions {
    ConvertOptions {
        input: InputSource::File(fixture(input)),
        output_directory: dir.path().to_path_buf(),
        remote: RemotePolicy::new(false, &[]),
        ..Default::default()
    }
}

fn convert(options: &ConvertOptions, renderer: &StubRenderer) -> Result<Outcome> {
    convert::run(options, renderer, &PdfInfoStamper, &NoFetch)
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn info_value(pdf: &Path, key: &[u8]) -> Option<String> {
    let doc = Document::load(pdf).unwrap();
    let id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_object(id).unwrap().as_dict().unwrap();
    info.get(key)
        .ok()
        .map(|v| decode_pdf_text(v.as_str().unwrap()))
}

// ─── Inline images, duplicates and metadata ─────────────────────────

#[test]
fn test_inline_image_and_duplicate_attachments() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("inline_image.eml", &dir);
    opts.headers = true;

    let outcome = convert(&opts, &renderer).unwrap();
    assert!(!outcome.warnings_occurred);
    assert_eq!(outcome.exit_code(), 0);

    let page = renderer.page();
    assert!(page.contains("data:image/png;base64,iVBORw0KGgo"));
    assert!(!page.contains("cid:"));
    assert!(!page.contains("emltrk.com"));
    assert!(page.contains("café"));
    assert!(page.contains("José García"));
    assert!(page.contains("<li>invoice.pdf</li><li>invoice.pdf</li>"));
    assert!(!page.contains("logo.png"));

    assert_eq!(
        file_names(&outcome.attachments),
        vec!["invoice.pdf", "invoice_1.pdf"]
    );
    dir.child("invoice_1.pdf")
        .assert(predicate::str::contains("second"));
    dir.child("logo.png").assert(predicate::path::missing());

    assert_eq!(
        info_value(&outcome.output, b"Author").as_deref(),
        Some("José García <jose@example.com>")
    );
    assert_eq!(
        info_value(&outcome.output, b"Title").as_deref(),
        Some("Invoices for March")
    );
    assert_eq!(
        info_value(&outcome.output, b"X-eml2pdf-To").as_deref(),
        Some("Bob <bob@example.com>")
    );
    assert_eq!(info_value(&outcome.output, b"Producer").as_deref(), Some("eml2pdf"));
    assert_eq!(info_value(&outcome.output, b"Creator").as_deref(), Some("stub"));

    let report = convert::sidecar_path(&outcome.output, convert::WARNINGS_SUFFIX);
    assert!(!report.exists());
}

#[test]
fn test_rerun_suffixes_then_overwrite_replaces() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("inline_image.eml", &dir);
    opts.body = false;

    convert(&opts, &renderer).unwrap();
    let second = convert(&opts, &renderer).unwrap();
    assert_eq!(
        file_names(&second.attachments),
        vec!["invoice_2.pdf", "invoice_3.pdf"]
    );

    opts.overwrite = true;
    let third = convert(&opts, &renderer).unwrap();
    assert_eq!(
        file_names(&third.attachments),
        vec!["invoice.pdf", "invoice_1.pdf"]
    );
    dir.child("invoice.pdf").assert(predicate::str::contains("first"));
    dir.child("invoice_1.pdf").assert(predicate::str::contains("second"));
    dir.child("invoice_2.pdf").assert(predicate::path::exists());
}

// ─── Warnings and sidecars ──────────────────────────────────────────

#[test]
fn test_unresolved_cid_writes_sidecars() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let opts = options("broken_cid.eml", &dir);

    let outcome = convert(&opts, &renderer).unwrap();
    assert!(outcome.warnings_occurred);
    assert_eq!(outcome.exit_code(), 1);

    let page = renderer.page();
    assert!(page.contains(r#"<img width="10">"#));
    assert!(!page.contains("cid:"));
    assert!(!page.contains("broken"));

    let report = convert::sidecar_path(&outcome.output, convert::WARNINGS_SUFFIX);
    let text = std::fs::read_to_string(report).unwrap();
    assert!(text.starts_with("WARNING: Could not find image cid nowhere@example.com"));

    let original = convert::sidecar_path(&outcome.output, convert::ORIGINAL_SUFFIX);
    assert_eq!(
        std::fs::read(original).unwrap(),
        std::fs::read(fixture("broken_cid.eml")).unwrap()
    );
}

#[test]
fn test_suppressed_warnings_exit_clean() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("broken_cid.eml", &dir);
    opts.suppress_warnings = true;

    let outcome = convert(&opts, &renderer).unwrap();
    assert!(outcome.warnings_occurred);
    assert_eq!(outcome.exit_code(), 0);
}

// ─── Plain text and calendar bodies ─────────────────────────────────

#[test]
fn test_plain_latin1_body() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let outcome = convert(&options("plain_latin1.eml", &dir), &renderer).unwrap();

    let page = renderer.page();
    assert!(page.contains("<meta charset=\"utf-8\"/>"));
    assert!(page.contains("La señal &lt;importante&gt; &amp; urgente."));
    assert_eq!(info_value(&outcome.output, b"Title").as_deref(), Some("Señal"));
    assert!(outcome.attachments.is_empty());
}

#[test]
fn test_calendar_table_and_ics_extracted() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let outcome = convert(&options("calendar.eml", &dir), &renderer).unwrap();
    assert!(!outcome.warnings_occurred);

    let page = renderer.page();
    assert!(page.contains("You are invited."));
    assert!(page.contains("<table"));
    assert!(page.contains("Quarterly review"));
    assert!(page.contains("Room 4, second floor"));
    assert!(page.contains("boss@example.com"));
    assert!(page.contains("ann@example.com"));
    assert!(page.contains("<li>invite.ics</li>"));

    assert_eq!(file_names(&outcome.attachments), vec!["invite.ics"]);
    dir.child("invite.ics").assert(predicate::str::contains("BEGIN:VEVENT"));
}

// ─── Two-pass recovery ──────────────────────────────────────────────

#[test]
fn test_recovery_extracts_only_named_inline_parts() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("inline_only.eml", &dir);
    opts.body = false;

    let outcome = convert(&opts, &renderer).unwrap();
    assert!(renderer.html.borrow().is_none());
    assert_eq!(file_names(&outcome.attachments), vec!["chart.png"]);
    dir.child("unnamed.png").assert(predicate::path::missing());
    assert!(!outcome.warnings_occurred);
}

#[test]
fn test_recovery_gives_up_with_warning() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("plain_latin1.eml", &dir);
    opts.body = false;

    let outcome = convert(&opts, &renderer).unwrap();
    assert!(outcome.attachments.is_empty());
    assert!(outcome.warnings_occurred);
    let report = convert::sidecar_path(&outcome.output, convert::WARNINGS_SUFFIX);
    assert!(std::fs::read_to_string(report).unwrap().contains("Giving up"));
}

#[test]
fn test_body_only_writes_no_attachments() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("inline_image.eml", &dir);
    opts.attachments = false;

    let outcome = convert(&opts, &renderer).unwrap();
    assert!(outcome.attachments.is_empty());
    dir.child("invoice.pdf").assert(predicate::path::missing());
    assert!(outcome.output.exists());
}

// ─── Fatal configuration errors ─────────────────────────────────────

#[test]
fn test_missing_output_directory() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("broken_cid.eml", &dir);
    opts.output_directory = dir.path().join("does-not-exist");

    let err = convert(&opts, &renderer).unwrap_err();
    assert!(matches!(err, ConvertError::OutputDirectoryMissing(_)));
    assert!(err.is_fatal_config());
}

#[test]
fn test_existing_output_file_refused() {
    let dir = TempDir::new().unwrap();
    let existing = dir.child("mail.pdf");
    existing.write_str("%PDF-1.4").unwrap();
    let renderer = StubRenderer::default();
    let mut opts = options("broken_cid.eml", &dir);
    opts.output_file = Some(existing.path().to_path_buf());

    let err = convert(&opts, &renderer).unwrap_err();
    assert!(matches!(err, ConvertError::OutputExists(_)));
    assert!(renderer.html.borrow().is_none());
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let renderer = StubRenderer::default();
    let err = convert(&options("no-such-mail.eml", &dir), &renderer).unwrap_err();
    assert!(matches!(err, ConvertError::FileNotFound(_)));
}
