//! Purpose: `powereditor` CLI entry point.
//! Role: Binary crate root; parses args, resolves settings, runs commands, emits JSON on stdout.
//! Invariants: Pre-flight validation finishes before any network activity.
//! Invariants: Fatal errors go to stderr as text on a TTY and as JSON otherwise.
//! Invariants: Per-product problems are notices on stderr; the run keeps going.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use powereditor::api::{Error, ErrorKind, to_exit_code};
use powereditor::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, cli.global, color_mode)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "powereditor",
    version,
    about = "Export and import power-editor content stored in Shopify metafields",
    long_about = None,
    after_help = r#"EXAMPLES
  $ powereditor -s my-shop.myshopify.com -k KEY -p PASSWORD collection export 123456
  $ powereditor collection export 123456 --include-product-info -o blackroll.json
  $ powereditor import blackroll.json --primary-key handle

CONFIGURATION
  Credentials resolve as: flags > config file (./config.yml or --config) > environment
  (POWEREDITOR_KEY, POWEREDITOR_PASSWORD, POWEREDITOR_STORE, POWEREDITOR_NAMESPACE)."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct GlobalArgs {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: ./config.yml)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,
    #[arg(
        short = 'k',
        long,
        global = true,
        help = "Shopify API key; overrides config file and environment"
    )]
    key: Option<String>,
    #[arg(
        short = 'p',
        long,
        global = true,
        help = "Shopify API password; overrides config file and environment"
    )]
    password: Option<String>,
    #[arg(
        short = 's',
        long,
        global = true,
        help = "Shop domain, e.g. my-shop.myshopify.com"
    )]
    store: Option<String>,
    #[arg(
        short = 'o',
        long,
        global = true,
        default_value = "output.json",
        help = "File the export is written to",
        value_hint = ValueHint::FilePath
    )]
    output: PathBuf,
    #[arg(
        short = 'n',
        long,
        global = true,
        help = "Metafield namespace (default: power-editor)"
    )]
    namespace: Option<String>,
    #[arg(
        long = "api-version",
        global = true,
        help = "Shopify Admin API version (default: 2024-01)"
    )]
    api_version: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Work with collections",
        after_help = r#"EXAMPLES
  $ powereditor collection export 123456
  $ powereditor collection export 123456 -i -o with-info.json"#
    )]
    Collection {
        #[command(subcommand)]
        command: CollectionCommand,
    },
    #[command(
        about = "Import a previously exported data dump",
        long_about = r#"Import a previously exported data dump.

Every field of every product is re-encoded and written back as a full overwrite.
Products that cannot be matched to exactly one shop product are skipped."#,
        after_help = r#"EXAMPLES
  $ powereditor import output.json
  $ powereditor import output.json --primary-key handle
  $ powereditor import output.json --primary-key title --metafields-only"#
    )]
    Import {
        #[arg(help = "Path to the export file", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        #[arg(
            long = "primary-key",
            default_value = "id",
            help = "Field used to find the product to update: id|handle|title"
        )]
        primary_key: String,
        #[arg(
            short = 'm',
            long = "metafields-only",
            help = "Don't import product titles, descriptions, or SEO tags"
        )]
        metafields_only: bool,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CollectionCommand {
    #[command(about = "Export a collection's power-editor content")]
    Export {
        #[arg(help = "Numeric collection ID")]
        collection_id: Option<String>,
        #[arg(
            short = 'i',
            long = "include-product-info",
            help = "Include product content (titles, descriptions) in export"
        )]
        include_product_info: bool,
    },
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn notice_for(kind: &str, cmd: &str, product: &str, err: &Error) -> Notice {
    let mut details = Map::new();
    details.insert("error_kind".to_string(), json!(format!("{:?}", err.kind())));
    if let Some(hint) = err.hint() {
        details.insert("hint".to_string(), json!(hint));
    }
    Notice {
        kind: kind.to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: cmd.to_string(),
        product: product.to_string(),
        message: error_message(err),
        details,
    }
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!(
            "{label} {} {}: {}",
            notice.kind, notice.product, notice.message
        );
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Ambiguous => "more than one match".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Remote => "shop api error".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

/// One-line form of an error for aggregated pre-flight messages.
fn problem_text(err: &Error) -> String {
    match err.path() {
        Some(path) => format!("{} ({})", error_message(err), path.display()),
        None => error_message(err),
    }
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `powereditor --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "powereditor") else {
        return "Try `powereditor --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `powereditor --help`.".to_string();
    }
    format!("Try `powereditor {} --help`.", parts.join(" "))
}
