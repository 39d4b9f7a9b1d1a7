//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "dotfiles::stage";

/// Environment variable holding a console filter directive, e.g.
/// `dotfiles_engine::jobs=debug`.
const FILTER_ENV: &str = "DOTFILES_LOG";

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// Appends every event to the per-command log file, timestamped and with
/// ANSI codes stripped. Debug lines carry the emitting module so resolver
/// decisions (skipped imports, dropped tasks) can be traced afterwards.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `command` and write a run header.
    ///
    /// Returns `None` if the cache directory or the file is unavailable.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version =
            option_env!("DOTFILES_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "==========================================\n\
             dotfiles {command} {version} {}\n\
             ==========================================\n",
            format_utc_datetime(),
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let level = *metadata.level();
        let target = metadata.target();

        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = strip_ansi(&extractor.message);
        let ts = format_utc_time();

        let line = match level {
            tracing::Level::INFO if target == STAGE_TARGET => format!("[{ts}] ==> {msg}"),
            tracing::Level::ERROR => format!("[{ts}]     [error] {msg}"),
            tracing::Level::WARN => format!("[{ts}]     [warn] {msg}"),
            tracing::Level::DEBUG | tracing::Level::TRACE => {
                format!("[{ts}]     [debug] {target}: {msg}")
            }
            tracing::Level::INFO => format!("[{ts}]     {msg}"),
        };

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console formatter: stage headers, coloured warnings and errors, dimmed
/// debug output.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();

        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = &extractor.message;

        match level {
            tracing::Level::ERROR => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}"),
            tracing::Level::WARN => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}"),
            tracing::Level::INFO if metadata.target() == STAGE_TARGET => {
                writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m")
            }
            tracing::Level::INFO => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Console filter: `DOTFILES_LOG` when set, otherwise `debug` with
/// `verbose` and `info` without.
fn console_filter(verbose: bool) -> tracing_subscriber::EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::EnvFilter::try_from_env(FILTER_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
}

/// Initialise the global [`tracing`] subscriber.
///
/// Console output goes to stderr so command output on stdout stays
/// machine-readable. The file layer always records `debug` and above to
/// `$XDG_CACHE_HOME/dotfiles/<command>.log`. Call once at startup.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(std::io::stderr)
        .with_filter(console_filter(verbose));

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
