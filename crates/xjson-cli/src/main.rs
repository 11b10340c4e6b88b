#![doc = include_str!("../README.md")]

use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;

use bpaf::Bpaf;
use serde::Deserialize;
use tracing_subscriber::prelude::*;
use xjson_core::LoadOptions;

const CONFIG_FILENAME: &str = "xjson.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorsArg {
    Off,
    Force,
}

impl core::str::FromStr for ColorsArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "force" => Ok(Self::Force),
            _ => Err(format!("expected 'off' or 'force', got '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LogLevel {
    #[default]
    None,
    Debug,
    Info,
    Warn,
    Error,
}

impl core::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("expected 'none', 'debug', 'info', 'warn', or 'error', got '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Bpaf)]
struct GlobalOptions {
    #[bpaf(long("colors"), argument("off|force"))]
    colors: Option<ColorsArg>,

    #[bpaf(long("log-level"), argument("none|debug|info|warn|error"))]
    log_level: Option<LogLevel>,

    /// Raise IncludeNotFound instead of silently substituting missing includes
    #[bpaf(long("strict"), switch)]
    strict: bool,

    /// Base directory for resolving relative includes
    #[bpaf(long("includes-path"), argument("DIR"), optional)]
    includes_path: Option<PathBuf>,
}

/// Defaults read from an `xjson.toml` in the current directory, overridden
/// by whatever flags were actually passed on the command line.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    colors: Option<String>,
    log_level: Option<String>,
    strict: Option<bool>,
    includes_path: Option<PathBuf>,
}

fn load_file_config() -> FileConfig {
    match std::fs::read_to_string(CONFIG_FILENAME) {
        Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
            eprintln!("warning: ignoring malformed {CONFIG_FILENAME}: {e}");
            FileConfig::default()
        }),
        Err(_) => FileConfig::default(),
    }
}

/// Merge CLI flags over `xjson.toml` defaults; an explicit flag always wins.
fn merge_options(global: &GlobalOptions, file: &FileConfig) -> (Option<ColorsArg>, LogLevel, bool, Option<PathBuf>) {
    let colors = global
        .colors
        .or_else(|| file.colors.as_deref().and_then(|s| s.parse().ok()));
    let log_level = global
        .log_level
        .or_else(|| file.log_level.as_deref().and_then(|s| s.parse().ok()))
        .unwrap_or_default();
    let strict = global.strict || file.strict.unwrap_or(false);
    let includes_path = global.includes_path.clone().or_else(|| file.includes_path.clone());
    (colors, log_level, strict, includes_path)
}

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version, generate(cli))]
/// Load and print extended-JSON documents
enum Cli {
    #[bpaf(command("load"))]
    /// Load a document from a file
    Load {
        #[bpaf(external(global_options))]
        global: GlobalOptions,
        #[bpaf(positional("FILE"))]
        file: PathBuf,
    },
    #[bpaf(command("loads"))]
    /// Load a document from stdin ("-") or an inline argument
    Loads {
        #[bpaf(external(global_options))]
        global: GlobalOptions,
        #[bpaf(positional("TEXT"))]
        text: String,
    },
}

fn setup_tracing(level: LogLevel) {
    let filter = match level {
        LogLevel::None => match tracing_subscriber::EnvFilter::try_from_env("XJSON_LOG") {
            Ok(f) => f,
            Err(_) => return,
        },
        LogLevel::Debug => tracing_subscriber::EnvFilter::new("debug"),
        LogLevel::Info => tracing_subscriber::EnvFilter::new("info"),
        LogLevel::Warn => tracing_subscriber::EnvFilter::new("warn"),
        LogLevel::Error => tracing_subscriber::EnvFilter::new("error"),
    };

    tracing_subscriber::registry()
        .with(
            tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn setup_miette(colors: Option<ColorsArg>) {
    let theme = match colors {
        Some(ColorsArg::Off) => miette::GraphicalTheme::none(),
        Some(ColorsArg::Force) => miette::GraphicalTheme::unicode(),
        None => {
            if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
                miette::GraphicalTheme::unicode()
            } else {
                miette::GraphicalTheme::unicode_nocolor()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .context_lines(2)
                .graphical_theme(theme.clone())
                .build(),
        )
    }))
    .ok();
}

fn options(strict: bool, includes_path: Option<PathBuf>) -> LoadOptions {
    LoadOptions { error_on_missing: strict, includes_path, ..LoadOptions::default() }
}

fn main() -> ExitCode {
    let command = cli().run();
    let file_config = load_file_config();

    let (colors, result) = match command {
        Cli::Load { global, file } => {
            let (colors, log_level, strict, includes_path) = merge_options(&global, &file_config);
            setup_tracing(log_level);
            setup_miette(colors);
            let opts = options(strict, includes_path);
            (colors, xjson_core::load(&file, &opts).map_err(anyhow::Error::from))
        }
        Cli::Loads { global, text } => {
            let (colors, log_level, strict, includes_path) = merge_options(&global, &file_config);
            setup_tracing(log_level);
            setup_miette(colors);
            let opts = options(strict, includes_path);
            let source = if text == "-" {
                let mut buf = String::new();
                match std::io::stdin().read_to_string(&mut buf) {
                    Ok(_) => buf,
                    Err(e) => return report(colors, anyhow::Error::from(e)),
                }
            } else {
                text
            };
            (colors, xjson_core::loads(&source, &opts).map_err(anyhow::Error::from))
        }
    };

    match result {
        Ok(document) => match serde_json::to_writer_pretty(std::io::stdout(), &document) {
            Ok(()) => {
                println!();
                ExitCode::SUCCESS
            }
            Err(e) => report(colors, anyhow::Error::from(e)),
        },
        Err(e) => report(colors, e),
    }
}

fn report(colors: Option<ColorsArg>, err: anyhow::Error) -> ExitCode {
    setup_miette(colors);
    eprintln!("Error: {err:#}");
    ExitCode::from(2)
}
