//! The program logger.
//!
//! Progress messages go to stdout and warnings and errors to stderr, coloured when the stream is a
//! terminal. When a model is run, the same two streams are also written to log files in the output
//! folder.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::Dispatch;
use fern::colors::{Color, ColoredLevelConfig};
use log::{Level, LevelFilter};
use std::env;
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Log level used if neither the environment nor the settings file specify one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The environment variable which overrides the log level from the settings file
pub const LOG_LEVEL_ENV_VAR: &str = "AVPP_LOG_LEVEL";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// One of the two streams log messages are split into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    /// Info, debug and trace messages
    Progress,
    /// Warnings and errors
    Problems,
}

impl Stream {
    fn accepts(self, level: Level) -> bool {
        match self {
            Self::Progress => level > Level::Warn,
            Self::Problems => level <= Level::Warn,
        }
    }

    /// The name of the log file for this stream in the output folder
    fn file_name(self) -> &'static str {
        match self {
            Self::Progress => "avpp_info.log",
            Self::Problems => "avpp_error.log",
        }
    }

    /// The most verbose level written to this stream's log file. Progress is logged at info level
    /// at least.
    fn file_level(self, log_level: LevelFilter) -> LevelFilter {
        match self {
            Self::Progress => log_level.max(LevelFilter::Info),
            Self::Problems => LevelFilter::Warn,
        }
    }

    /// A dispatch for the messages of this stream, coloured if `colours` are given
    fn dispatch(self, level: LevelFilter, colours: Option<ColoredLevelConfig>) -> Dispatch {
        Dispatch::new()
            .level(level)
            .filter(move |metadata| self.accepts(metadata.level()))
            .format(move |out, message, record| {
                let timestamp = Local::now().format("%H:%M:%S");
                let target = record.target();
                if let Some(colours) = colours {
                    let level = colours.color(record.level());
                    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
                } else {
                    let level = record.level();
                    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
                }
            })
    }
}

/// Initialise the program logger.
///
/// The log level is taken from the `AVPP_LOG_LEVEL` environment variable if set, otherwise from
/// the settings file, otherwise [`DEFAULT_LOG_LEVEL`]. Valid levels are `off`, `error`, `warn`,
/// `info`, `debug` and `trace`.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_path`: Folder in which to create log files, if any
pub fn init(log_level_from_settings: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = match env::var(LOG_LEVEL_ENV_VAR) {
        Ok(level) => parse_log_level(&level)
            .with_context(|| format!("Invalid value for {LOG_LEVEL_ENV_VAR}"))?,
        Err(_) => parse_log_level(log_level_from_settings.unwrap_or(DEFAULT_LOG_LEVEL))?,
    };

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let colours_if = |is_terminal: bool| is_terminal.then_some(colours);

    let mut dispatch = Dispatch::new()
        .chain(
            Stream::Progress
                .dispatch(log_level, colours_if(std::io::stdout().is_terminal()))
                .chain(std::io::stdout()),
        )
        .chain(
            Stream::Problems
                .dispatch(
                    log_level.min(LevelFilter::Warn),
                    colours_if(std::io::stderr().is_terminal()),
                )
                .chain(std::io::stderr()),
        );

    if let Some(log_file_path) = log_file_path {
        for stream in [Stream::Progress, Stream::Problems] {
            let file_path = log_file_path.join(stream.file_name());
            let file = File::create(&file_path)
                .with_context(|| format!("Could not create log file {}", file_path.display()))?;
            let level = stream.file_level(log_level);
            dispatch = dispatch.chain(stream.dispatch(level, None).chain(file));
        }
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Convert a log level name (in any case) to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}
