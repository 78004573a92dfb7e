/*
Logging for the node-image-atlas tool.

- `BufferLogger`: keeps the last MAX_LOG_LINES crate log lines in memory
- `CompositeLogger`: console output (env_logger) plus the buffer
- `setup_logger()`: installs both, RUST_LOG overrides the default filter
- `setup_panic_hook()`: writes panics with a backtrace to panic.log
- `export_debug_logs()`: writes the buffer to debug.log

Debug builds show DEBUG and above, release builds ERROR only unless RUST_LOG
is set. Only records whose target starts with LOG_TARGET are kept.
*/

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{Level, LevelFilter, Metadata, Record};
#[allow(unused_imports)]
use log::{debug, info, warn, error};

const MAX_LOG_LINES: usize = 1000;
const LOG_TARGET: &str = "node_image_atlas";

/// Most recent log lines, oldest first
pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct BufferLogger {
    log_buffer: LogBuffer,
    capacity: usize,
}

impl BufferLogger {
    fn new(capacity: usize) -> Self {
        Self {
            log_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn log_to_buffer(&self, message: &str, target: &str, line: Option<u32>) {
        let mut buffer = self.log_buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }

        // The module is already in the target, so only the line is added
        let formatted_message = if let Some(line_num) = line {
            format!("{target}:{line_num} {message}")
        } else {
            format!("{target} {message}")
        };

        buffer.push_back(formatted_message);
    }

    fn shared_buffer(&self) -> LogBuffer {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(LOG_TARGET) && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("{:<5} {}", record.level(), record.args());
            self.log_to_buffer(&message, record.target(), record.line());
        }
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

/// Installs the composite logger. Fails when a logger is already set.
pub fn setup_logger(verbose: bool) -> Result<LogBuffer, log::SetLoggerError> {
    let buffer_logger = BufferLogger::new(MAX_LOG_LINES);
    let shared_buffer = buffer_logger.shared_buffer();

    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        let level = if verbose || cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Error
        };
        builder.filter(None, LevelFilter::Off);
        builder.filter(Some(LOG_TARGET), level);
    }

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let module_info = match (record.module_path(), record.line()) {
            (Some(module), Some(line)) => format!("{module}:{line}"),
            (Some(module), None) => module.to_string(),
            (None, Some(line)) => format!("line:{line}"),
            (None, None) => "unknown".to_string(),
        };

        let mut level_style = buf.style();
        let mut meta_style = buf.style();

        match record.level() {
            Level::Error => level_style.set_color(Color::Red).set_bold(true),
            Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
            Level::Info => level_style.set_color(Color::Green).set_bold(true),
            Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
            Level::Trace => level_style.set_color(Color::White),
        };

        // Color::Rgb does not render on macOS terminals
        #[cfg(target_os = "macos")]
        meta_style.set_color(Color::Blue);
        #[cfg(not(target_os = "macos"))]
        meta_style.set_color(Color::Rgb(120, 120, 120));

        writeln!(
            buf,
            "{} {} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info),
            record.args()
        )
    });

    let composite_logger = CompositeLogger {
        console_logger: builder.build(),
        buffer_logger,
    };
    log::set_boxed_logger(Box::new(composite_logger))?;

    // Filtering happens in the loggers themselves
    log::set_max_level(LevelFilter::Trace);

    Ok(shared_buffer)
}

pub fn get_log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_name).join("logs")
}

/// Writes the buffered log lines to `<data_dir>/<app_name>/logs/debug.log`.
pub fn export_debug_logs(app_name: &str, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    export_debug_logs_to(&get_log_directory(app_name), log_buffer)
}

pub fn export_debug_logs_to(log_dir: &Path, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    let debug_log_path = log_dir.join("debug.log");

    // Copy out first so logging below can't deadlock on the buffer
    let log_entries: Vec<String> = log_buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect();

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&debug_log_path)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");
    writeln!(file, "{timestamp} [DEBUG EXPORT] =====================================")?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] node-image-atlas debug log export")?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] Entries: {} (max {MAX_LOG_LINES})", log_entries.len())?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] =====================================")?;
    writeln!(file)?;

    if log_entries.is_empty() {
        writeln!(file, "{timestamp} [DEBUG EXPORT] No log entries found in buffer")?;
    }
    for log_entry in &log_entries {
        writeln!(file, "{timestamp} {log_entry}")?;
    }
    file.flush()?;

    info!("Debug logs exported to: {}", debug_log_path.display());
    Ok(debug_log_path)
}

/// Logs panics with a backtrace to stderr and to `panic.log` next to the
/// debug log, followed by the buffered log lines.
pub fn setup_panic_hook(app_name: &str, log_buffer: LogBuffer) {
    let log_dir = get_log_directory(app_name);
    let log_file_path = log_dir.join("panic.log");

    panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let location = match info.location() {
            Some(location) => format!("{}:{}", location.file(), location.line()),
            None => "unknown location".to_string(),
        };
        let header_msg = format!("[PANIC] at {location} - {info}");
        let backtrace_lines: Vec<String> = format!("{backtrace:?}")
            .lines()
            .map(|line| format!("[BACKTRACE] {}", line.trim()))
            .collect();

        eprintln!("\n\n{header_msg}");
        eprintln!("[PANIC] Backtrace:");
        for line in &backtrace_lines {
            eprintln!("{line}");
        }

        let written = std::fs::create_dir_all(&log_dir).and_then(|_| {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&log_file_path)?;
            writeln!(file, "{timestamp} {header_msg}")?;
            writeln!(file, "{timestamp} [PANIC] Backtrace:")?;
            for line in &backtrace_lines {
                writeln!(file, "{timestamp} {line}")?;
            }
            writeln!(file)?;
            writeln!(file, "{timestamp} [PANIC] Last {MAX_LOG_LINES} log entries:")?;
            let buffer = log_buffer.lock().unwrap_or_else(PoisonError::into_inner);
            for log in buffer.iter() {
                writeln!(file, "{timestamp} {log}")?;
            }
            Ok(())
        });

        match written {
            Ok(()) => eprintln!("\nA complete crash log has been written to: {}", log_file_path.display()),
            Err(e) => eprintln!("\nFailed to write crash log: {e}"),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    fn record_line(logger: &BufferLogger, target: &str, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .target(target)
                .level(level)
                .line(Some(7))
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn test_buffer_keeps_latest_lines() {
        let logger = BufferLogger::new(2);
        for message in ["one", "two", "three"] {
            record_line(&logger, "node_image_atlas::atlas", Level::Info, message);
        }

        let buffer = logger.shared_buffer();
        let lines: Vec<String> = buffer.lock().unwrap().iter().cloned().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "node_image_atlas::atlas:7 INFO  two");
        assert!(lines[1].ends_with("three"));
    }

    #[test]
    fn test_buffer_ignores_other_crates_and_trace() {
        let logger = BufferLogger::new(10);
        record_line(&logger, "reqwest::connect", Level::Info, "other crate");
        record_line(&logger, "node_image_atlas", Level::Trace, "too verbose");
        assert!(logger.shared_buffer().lock().unwrap().is_empty());
    }

    #[test]
    fn test_export_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::from(vec![
            "node_image_atlas:1 INFO  packed".to_string(),
        ])));

        let path = export_debug_logs_to(dir.path(), &buffer).unwrap();
        assert_eq!(path, dir.path().join("debug.log"));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("Entries: 1"));
        assert!(contents.contains("node_image_atlas:1 INFO  packed"));
    }
}
