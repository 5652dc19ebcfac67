// Tue Jan 13 2026 - Alex

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Coloured output on stderr.
pub fn init_logger(level: LevelFilter) {
    install(PipelineLogger { level, sink: None });
}

/// Plain lines appended to `file_path` instead of stderr.
pub fn init_logger_with_file(level: LevelFilter, file_path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(file_path)?;
    install(PipelineLogger {
        level,
        sink: Some(Mutex::new(file)),
    });
    Ok(())
}

/// Honours `RUST_LOG` instead of the command line.
pub fn init_from_env() {
    env_logger::init();
}

pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn install(logger: PipelineLogger) {
    let level = logger.level;
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(level);
    }
}

/// Last path segment of a log target, e.g. `worker` for `kernel_discovery::engine::worker`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn level_tag(level: Level) -> ColoredString {
    let tag = format!("{:5}", level);
    match level {
        Level::Error => tag.red().bold(),
        Level::Warn => tag.yellow().bold(),
        Level::Info => tag.green().bold(),
        Level::Debug => tag.blue(),
        Level::Trace => tag.magenta(),
    }
}

struct PipelineLogger {
    level: LevelFilter,
    sink: Option<Mutex<File>>,
}

impl Log for PipelineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("main");

        match &self.sink {
            Some(sink) => {
                let line = format!(
                    "{} {:5} {} [{}] {}\n",
                    timestamp(),
                    record.level(),
                    thread,
                    record.target(),
                    record.args()
                );
                if let Ok(mut file) = sink.lock() {
                    let _ = file.write_all(line.as_bytes());
                }
            }
            None => {
                let target = format!("[{}:{}]", thread, short_target(record.target()));
                eprintln!("{} {} {}", level_tag(record.level()), target.dimmed(), record.args());
            }
        }
    }

    fn flush(&self) {
        if let Some(Ok(mut file)) = self.sink.as_ref().map(Mutex::lock) {
            let _ = file.flush();
        }
    }
}

fn timestamp() -> String {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:03}", since_epoch.as_secs(), since_epoch.subsec_millis())
}

/// Logs how long a stage took when dropped.
pub struct ScopedTimer {
    stage: &'static str,
    started: Instant,
}

impl ScopedTimer {
    pub fn new(stage: &'static str) -> Self {
        log::debug!("{} started", stage);
        Self {
            stage,
            started: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let millis = self.started.elapsed().as_secs_f64() * 1000.0;
        log::debug!("{} finished in {:.2}ms", self.stage, millis);
    }
}
