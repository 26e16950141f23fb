//! Logging for `budget-calc`.
//!
//! Events go to stderr so that stdout carries only command output. The level
//! can be changed after startup (the config file is read after the subscriber
//! is installed), and a log file can be attached late for the same reason.

use std::{
    fs::File,
    io::{self, IsTerminal, Write},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use anyhow::{Result, anyhow, bail};
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext, MakeWriter,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
};

/// Filter used when neither `RUST_LOG`, `--log-level` nor the config file
/// say otherwise. Command output goes to stdout, so keep stderr quiet.
pub const DEFAULT_FILTER: &str = "warn";

// ─── event format ────────────────────────────────────────────────────────────

/// `<local timestamp> <LEVEL> <file:line> <fields>`, colored on a terminal.
struct BudgetEventFormat;

impl<S, N> FormatEvent<S, N> for BudgetEventFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        if ansi {
            write!(writer, "\x1b[2m")?
        }
        write!(
            writer,
            "{} ",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )?;
        if ansi {
            write!(writer, "\x1b[0m")?
        }

        let (pre, post) = if ansi {
            level_colors(*meta.level())
        } else {
            ("", "")
        };
        write!(writer, "{}{:>5}{} ", pre, meta.level(), post)?;

        if let (Some(file), Some(line)) = (meta.file().map(source_location), meta.line()) {
            if ansi {
                write!(writer, "\x1b[36m{file}:{line}\x1b[0m ")?;
            } else {
                write!(writer, "{file}:{line} ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Drops the leading `src/` so records read `commands.rs:42`.
fn source_location(file: &str) -> &str {
    file.strip_prefix("src/")
        .or_else(|| file.strip_prefix("src\\"))
        .unwrap_or(file)
}

fn level_colors(level: Level) -> (&'static str, &'static str) {
    match level {
        Level::ERROR => ("\x1b[1;31m", "\x1b[0m"),
        Level::WARN => ("\x1b[1;33m", "\x1b[0m"),
        Level::INFO => ("\x1b[1;32m", "\x1b[0m"),
        Level::DEBUG => ("\x1b[1;34m", "\x1b[0m"),
        Level::TRACE => ("\x1b[1;35m", "\x1b[0m"),
    }
}

// ─── log file ────────────────────────────────────────────────────────────────

type SharedLogFile = Arc<Mutex<Option<File>>>;

/// Writer for the `[logging] file` setting. Discards output until a file is
/// attached.
#[derive(Clone)]
struct LogFileTarget(SharedLogFile);

struct LogFileWriter<'a>(MutexGuard<'a, Option<File>>);

impl Write for LogFileWriter<'_> {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        match &mut *self.0 {
            Some(f) => f.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.0 {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFileTarget {
    type Writer = LogFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        // Poisoned only by a panic elsewhere; the file handle is still valid.
        LogFileWriter(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

// ─── installed subscriber state ──────────────────────────────────────────────

type ReloadFilter = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;

static RELOAD_FILTER: OnceLock<ReloadFilter> = OnceLock::new();
static LOG_FILE: OnceLock<SharedLogFile> = OnceLock::new();

fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| anyhow!("invalid log level '{directive}': {e}"))
}

fn store_filter_handle<S>(handle: reload::Handle<EnvFilter, S>)
where
    S: Subscriber + Send + Sync + 'static,
{
    let _ = RELOAD_FILTER.set(Box::new(move |directive: &str| {
        handle
            .reload(parse_filter(directive)?)
            .map_err(|e| anyhow!("filter reload failed: {e}"))
    }));
}

// ─── setup ───────────────────────────────────────────────────────────────────

/// Picks the startup filter: `RUST_LOG` wins, then the explicit directive,
/// then [`DEFAULT_FILTER`].
pub fn startup_filter(directive: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(directive.unwrap_or(DEFAULT_FILTER))
}

/// Installs the global subscriber. Later calls keep the first one.
///
/// Stderr output is colored only on a terminal. Nothing is written to a
/// file until [`enable_file_logging`] names one.
pub fn init_logging(filter: EnvFilter) {
    let log_file: SharedLogFile = Arc::new(Mutex::new(None));
    let _ = LOG_FILE.set(log_file.clone());

    let (level_filter, level_handle) = reload::Layer::new(filter);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(BudgetEventFormat)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(BudgetEventFormat)
        .with_ansi(false)
        .with_writer(LogFileTarget(log_file));

    if tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
    {
        store_filter_handle(level_handle);
    }
}

/// Replaces the active filter. Accepts a bare level or any `EnvFilter`
/// directive.
pub fn set_log_level(directive: &str) -> Result<()> {
    match RELOAD_FILTER.get() {
        Some(reload_filter) => reload_filter(directive),
        None => bail!("logging not yet initialized"),
    }
}

/// Appends log records to `path` from now on. The directory must exist.
pub fn enable_file_logging(path: &Path) -> Result<()> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow!("cannot open log file '{}': {e}", path.display()))?;

    match LOG_FILE.get() {
        Some(slot) => {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
            Ok(())
        }
        None => bail!("logging not yet initialized"),
    }
}
