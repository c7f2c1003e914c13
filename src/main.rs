//! CLI entry point for `eml2pdf`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use eml2pdf::config::Config;
use eml2pdf::content::fetch::{HttpImageFetcher, ImageFetcher, NoFetch};
use eml2pdf::content::sanitize::RemotePolicy;
use eml2pdf::convert::{self, ConvertOptions, Outcome};
use eml2pdf::error::ConvertError;
use eml2pdf::export::metadata::PdfInfoStamper;
use eml2pdf::export::render::WkHtmlToPdf;
use eml2pdf::i18n;
use eml2pdf::parser::eml::InputSource;

/// Exit status for fatal configuration errors (missing renderer, missing
/// output directory, existing output, invalid arguments).
const EXIT_FATAL_CONFIG: u8 = 2;
/// Exit status for any other failure.
const EXIT_UNEXPECTED: u8 = 3;

#[derive(Parser)]
#[command(name = "eml2pdf", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input .eml file; '-' reads from standard input
    #[arg(short = 'i', long, value_name = "FILE", default_value = "-")]
    input_file: String,

    /// Encoding of the input file
    #[arg(long, value_name = "ENCODING")]
    input_encoding: Option<String>,

    /// Output PDF file
    #[arg(short = 'o', long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Directory for the PDF and the extracted attachments
    #[arg(short = 'd', long, value_name = "DIR")]
    output_directory: Option<PathBuf>,

    /// Replace existing output and attachment files
    #[arg(long)]
    overwrite: bool,

    /// Do not fetch remote images
    #[arg(long)]
    no_remote_links: bool,

    /// Only extract attachments
    #[arg(long, conflicts_with = "no_attachments")]
    no_body: bool,

    /// Only render the body
    #[arg(long)]
    no_attachments: bool,

    /// Prepend From, To, Date and Subject
    #[arg(long)]
    headers: bool,

    /// Prefix attachment names with today's date
    #[arg(long)]
    add_prefix_date: bool,

    /// Skip attachments without a filename
    #[arg(long)]
    ignore_floating_attachments: bool,

    /// Only log errors and exit with 0 on warnings
    #[arg(long, conflicts_with = "verbose")]
    mostly_hide_warnings: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language (en, es). Defaults to system locale.
    #[arg(long, value_name = "LANG")]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Detect language from --lang, then the config file, then the system
/// environment, before clap processes --help.
fn detect_lang_early(config: &Config) -> i18n::Lang {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--lang" {
            if let Some(lang) = args.get(i + 1).and_then(|c| i18n::Lang::from_code(c)) {
                return lang;
            }
        }
        if let Some(lang) = arg.strip_prefix("--lang=").and_then(i18n::Lang::from_code) {
            return lang;
        }
    }
    config
        .general
        .lang
        .as_deref()
        .and_then(i18n::Lang::from_code)
        .unwrap_or_else(i18n::detect_system_lang)
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command() -> clap::Command {
    let help: [(&str, &'static str); 14] = [
        ("input_file", i18n::help_input_file()),
        ("input_encoding", i18n::help_input_encoding()),
        ("output_file", i18n::help_output_file()),
        ("output_directory", i18n::help_output_directory()),
        ("overwrite", i18n::help_overwrite()),
        ("no_remote_links", i18n::help_no_remote_links()),
        ("no_body", i18n::help_no_body()),
        ("no_attachments", i18n::help_no_attachments()),
        ("headers", i18n::help_headers()),
        ("add_prefix_date", i18n::help_add_prefix_date()),
        ("ignore_floating_attachments", i18n::help_ignore_floating()),
        ("mostly_hide_warnings", i18n::help_mostly_hide_warnings()),
        ("verbose", i18n::help_verbose()),
        ("lang", i18n::help_lang()),
    ];

    let mut cmd = Cli::command()
        .about(i18n::app_about())
        .long_about(i18n::app_long_about());
    for (id, text) in help {
        cmd = cmd.mut_arg(id, |a| a.help(text));
    }
    cmd.mut_subcommand("completions", |s| {
        s.about(i18n::help_cmd_completions())
            .mut_arg("shell", |a| a.help(i18n::help_shell()))
    })
    .mut_subcommand("manpage", |s| s.about(i18n::help_cmd_manpage()))
}

fn main() -> ExitCode {
    let config = eml2pdf::config::load_config();
    i18n::set_lang(detect_lang_early(&config));

    let matches = build_localized_command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match cli.command {
        Some(Commands::Completions { shell }) => return finish_helper(cmd_completions(shell)),
        Some(Commands::Manpage) => return finish_helper(cmd_manpage()),
        None => {}
    }

    let log_level = if cli.mostly_hide_warnings {
        "error"
    } else {
        match cli.verbose {
            0 => config.general.log_level.as_str(),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    setup_logging(log_level, &config);

    match cmd_convert(&cli, &config) {
        Ok(outcome) => {
            if outcome.exit_code() != 0 {
                eprintln!(
                    "{} {}",
                    i18n::cli_completed_with_warnings(),
                    convert::sidecar_path(&outcome.output, convert::WARNINGS_SUFFIX).display()
                );
            }
            ExitCode::from(outcome.exit_code() as u8)
        }
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("{}: {e:#}", i18n::cli_error());
            match e.downcast_ref::<ConvertError>() {
                Some(err) if err.is_fatal_config() => ExitCode::from(EXIT_FATAL_CONFIG),
                _ => ExitCode::from(EXIT_UNEXPECTED),
            }
        }
    }
}

fn finish_helper(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e:#}", i18n::cli_error());
            ExitCode::from(EXIT_UNEXPECTED)
        }
    }
}

/// Merge flags over the config file and run one conversion.
fn cmd_convert(cli: &Cli, config: &Config) -> anyhow::Result<Outcome> {
    let remote_enabled = config.body.remote_images && !cli.no_remote_links;
    let options = ConvertOptions {
        input: InputSource::from_arg(&cli.input_file),
        input_encoding: cli.input_encoding.clone(),
        output_file: cli.output_file.clone(),
        output_directory: cli
            .output_directory
            .clone()
            .unwrap_or_else(|| config.output.directory.clone()),
        overwrite: cli.overwrite || config.output.overwrite,
        body: !cli.no_body,
        attachments: !cli.no_attachments,
        headers: cli.headers || config.body.headers,
        remote: RemotePolicy::new(remote_enabled, &config.body.image_host_blacklist),
        add_prefix_date: cli.add_prefix_date || config.attachments.add_prefix_date,
        ignore_floating: cli.ignore_floating_attachments || config.attachments.ignore_floating,
        suppress_warnings: cli.mostly_hide_warnings,
    };
    tracing::info!(?options, "Options used");

    let renderer = WkHtmlToPdf::locate(&config.renderer.command)?;
    let fetcher: Box<dyn ImageFetcher> = if remote_enabled {
        Box::new(HttpImageFetcher::new(Duration::from_secs(
            config.body.fetch_timeout_secs,
        ))?)
    } else {
        Box::new(NoFetch)
    };

    Ok(convert::run(&options, &renderer, &PdfInfoStamper, fetcher.as_ref())?)
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // Try to set up file logging
    let log_path = eml2pdf::config::log_file_path(config);
    let log_dir = eml2pdf::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "eml2pdf.log".to_string());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "eml2pdf", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
