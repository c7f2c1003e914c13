//! Internationalization (i18n) module.
//!
//! Provides localized strings for the rendered document (header labels,
//! calendar tables, attachment listing) and for the CLI help.
//! English is the default language; Spanish is available as an alternative.

use std::sync::OnceLock;

static CURRENT_LANG: OnceLock<Lang> = OnceLock::new();

/// Supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    /// English (default)
    En,
    /// Spanish
    Es,
}

impl Lang {
    /// Parse a language code string (e.g. "en", "es", "en_US", "es_ES").
    /// Returns `None` for unrecognized codes.
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.to_lowercase();
        let prefix = normalized.split(['_', '-', '.']).next().unwrap_or("");
        match prefix {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            _ => None,
        }
    }

    /// Return the ISO 639-1 code for this language.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }
}

/// Initialize the global language. Call once at startup.
/// If already initialized, this is a no-op.
pub fn set_lang(lang: Lang) {
    let _ = CURRENT_LANG.set(lang);
}

/// Get the currently configured language (defaults to English).
pub fn lang() -> Lang {
    CURRENT_LANG.get().copied().unwrap_or(Lang::En)
}

/// Detect language from `EML2PDF_LANG`, then `LC_MESSAGES` / `LANG`.
pub fn detect_system_lang() -> Lang {
    std::env::var("EML2PDF_LANG")
        .ok()
        .and_then(|v| Lang::from_code(&v))
        .or_else(|| {
            std::env::var("LC_MESSAGES")
                .ok()
                .and_then(|v| Lang::from_code(&v))
        })
        .or_else(|| std::env::var("LANG").ok().and_then(|v| Lang::from_code(&v)))
        .unwrap_or(Lang::En)
}

/// Macro for defining translatable message functions.
/// Each function returns a `&'static str` based on the current language.
macro_rules! msg {
    ($name:ident, $en:expr, $es:expr) => {
        /// Returns a localized string for the current language.
        pub fn $name() -> &'static str {
            match lang() {
                Lang::En => $en,
                Lang::Es => $es,
            }
        }
    };
}

// ── General ──────────────────────────────────────────────────────

msg!(app_name, "eml2pdf", "eml2pdf");
msg!(
    app_about,
    "Convert an email into a PDF document and extract its attachments.",
    "Convierte un correo en un documento PDF y extrae sus adjuntos."
);
msg!(
    app_long_about,
    "eml2pdf \u{2014} Convert an RFC 5322 email (.eml) into a PDF document.\nInline images are embedded, calendar invitations summarized and\nattachments written next to the PDF.",
    "eml2pdf \u{2014} Convierte un correo RFC 5322 (.eml) en un documento PDF.\nLas im\u{e1}genes en l\u{ed}nea se incrustan, las invitaciones de calendario se\nresumen y los adjuntos se guardan junto al PDF."
);

// ── CLI help strings ─────────────────────────────────────────────

msg!(
    help_input_file,
    "Input .eml file; '-' reads from standard input",
    "Fichero .eml de entrada; '-' lee de la entrada est\u{e1}ndar"
);
msg!(
    help_input_encoding,
    "Encoding of the input file (e.g. iso-8859-1); transcoded to UTF-8 before parsing",
    "Codificaci\u{f3}n del fichero de entrada (p. ej. iso-8859-1); se convierte a UTF-8 antes de analizarlo"
);
msg!(
    help_output_file,
    "Output PDF file; defaults to a timestamped name in the output directory",
    "Fichero PDF de salida; por defecto un nombre con fecha en el directorio de salida"
);
msg!(
    help_output_directory,
    "Directory for the PDF and the extracted attachments",
    "Directorio para el PDF y los adjuntos extra\u{ed}dos"
);
msg!(
    help_overwrite,
    "Replace existing output and attachment files",
    "Reemplazar ficheros de salida y adjuntos existentes"
);
msg!(
    help_no_remote_links,
    "Do not fetch remote images; drop them from the document",
    "No descargar im\u{e1}genes remotas; se eliminan del documento"
);
msg!(
    help_no_body,
    "Do not render the body; only extract attachments",
    "No generar el cuerpo; solo extraer los adjuntos"
);
msg!(
    help_no_attachments,
    "Do not extract attachments; only render the body",
    "No extraer adjuntos; solo generar el cuerpo"
);
msg!(
    help_headers,
    "Prepend From, To, Date and Subject to the document",
    "A\u{f1}adir De, Para, Fecha y Asunto al principio del documento"
);
msg!(
    help_add_prefix_date,
    "Prefix attachment names with today's date unless they contain one",
    "Anteponer la fecha de hoy a los adjuntos que no incluyan una"
);
msg!(
    help_ignore_floating,
    "Skip attachments that do not declare a filename",
    "Omitir adjuntos que no declaran nombre de fichero"
);
msg!(
    help_mostly_hide_warnings,
    "Only log errors, and exit with 0 even when warnings occurred",
    "Registrar solo errores y salir con 0 aunque haya avisos"
);
msg!(
    help_verbose,
    "Verbose logging (-v info, -vv debug, -vvv trace)",
    "Registro detallado (-v info, -vv debug, -vvv trace)"
);
msg!(
    help_lang,
    "Language (en, es). Defaults to system locale",
    "Idioma (en, es). Por defecto usa el idioma del sistema"
);
msg!(
    help_cmd_completions,
    "Generate shell completions",
    "Generar autocompletado para la shell"
);
msg!(
    help_cmd_manpage,
    "Generate the man page",
    "Generar la p\u{e1}gina de manual"
);
msg!(help_shell, "Shell to generate for", "Shell para la que generar");

// ── Document: header block ───────────────────────────────────────

msg!(hdr_from, "From", "De");
msg!(hdr_to, "To", "Para");
msg!(hdr_date, "Date", "Fecha");
msg!(hdr_subject, "Subject", "Asunto");

// ── Document: attachment listing ─────────────────────────────────

msg!(doc_attachment, "Attachment", "Adjunto");
msg!(doc_attachments, "Attachments", "Adjuntos");

// ── Document: calendar ───────────────────────────────────────────

msg!(cal_appointment, "Appointment", "Cita");
msg!(cal_title, "Title", "T\u{ed}tulo");
msg!(cal_description, "Description", "Descripci\u{f3}n");
msg!(cal_location, "Location", "Lugar");
msg!(cal_when, "When", "Cu\u{e1}ndo");
msg!(cal_organizer, "Organizer", "Organizador");
msg!(cal_attendees, "Attendees", "Asistentes");
msg!(cal_datetime_format, "%Y-%m-%d %H:%M", "%d/%m/%Y %H:%M");

// ── CLI output ───────────────────────────────────────────────────

msg!(
    cli_completed_with_warnings,
    "Completed with warnings; see",
    "Terminado con avisos; ver"
);
msg!(cli_error, "Error", "Error");
