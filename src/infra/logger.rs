use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Appends log records to `<data_dir>/threadview.log`.
pub struct FileLogger {
    path: PathBuf,
    level: LevelFilter,
    warned: AtomicBool,
}

impl FileLogger {
    pub fn new(data_dir: &Path, level: LevelFilter) -> Self {
        Self {
            path: data_dir.join("threadview.log"),
            level,
            warned: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_write(&self, line: &str) -> Result<(), std::io::Error> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        if let Err(e) = self.try_write(&line) {
            // Only complain once; a broken log file should not flood stderr.
            if !self.warned.swap(true, Ordering::Relaxed) {
                eprintln!("warning: failed to write to {}: {}", self.path.display(), e);
            }
        }
    }

    fn flush(&self) {}
}

fn format_line(record: &Record) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!(
        "[{}] {} {}: {}",
        timestamp,
        record.level(),
        record.target(),
        record.args()
    )
}

/// Installs the file logger as the global `log` backend.
pub fn init(data_dir: &Path, level: LevelFilter) {
    let logger = FileLogger::new(data_dir, level);
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(level);
    }
}
