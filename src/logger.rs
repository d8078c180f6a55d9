use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to create the log file")]
    CreateFile(#[source] io::Error),
}

/// Builder for the process-wide diagnostics logger.
///
/// The operator's view (server output echoes, `> ` send echoes, the startup
/// banner) goes to stdout; the logger writes to stderr and, best-effort, to
/// a per-session file so the two never mix.
#[derive(Default)]
pub struct LoggerBuilder {
    file: Option<File>,
    stderr: bool,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session log file under `dir`. Failures are swallowed:
    /// logging simply falls back to stderr only.
    pub fn enable_file<P>(mut self, dir: P) -> Self
    where
        P: AsRef<Path>,
    {
        self.file = create_session_file(dir.as_ref()).ok();
        self
    }

    pub fn enable_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn build(self) -> Logger {
        let exec_name = env::args()
            .next()
            .and_then(|arg| {
                Path::new(&arg)
                    .file_name()
                    .and_then(|path| path.to_str())
                    .map(|s| s.to_owned())
            })
            .unwrap_or_default();

        Logger {
            file: self.file.map(Mutex::new),
            stderr: self.stderr,
            exec_name,
            pid: std::process::id(),
        }
    }
}

fn create_session_file(dir: &Path) -> Result<File, Error> {
    let date_string = Local::now().format("%Y%m%d-%H%M%S").to_string();

    let mut last_io_error = None;
    // A heuristic approach to avoid infinite failure loop.
    for attempt in 0..100u64 {
        let file_name = if attempt == 0 {
            format!("mcwarden-{date_string}.log")
        } else {
            let discriminator = attempt + 1;
            format!("mcwarden-{date_string}-{discriminator}.log")
        };
        let path = dir.join(file_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => return Ok(file),
            Err(err) => {
                last_io_error = Some(err);
            }
        }
    }

    Err(Error::CreateFile(last_io_error.unwrap()))
}

pub struct Logger {
    file: Option<Mutex<File>>,
    stderr: bool,
    exec_name: String,
    pid: u32,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = Local::now();
        let formatted_now = now.format("%Y-%m-%d %T%:::z");
        let exec_name = &self.exec_name;
        let pid = self.pid;

        // Format and indent the args string.
        let mut args = format!("{}", record.args());
        args = args.replace('\n', "\n\t");

        let message = format!(
            "{formatted_now} {exec_name}[{pid}] {}: {}:{}: {args}\n",
            &record.level().as_str()[0..1],
            record.file().unwrap_or("<unknown>"),
            record.line().unwrap_or_default(),
        );

        if self.stderr {
            eprint!("{message}");
        }
        if let Some(file) = &self.file {
            _ = file.lock().write_all(message.as_bytes());
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            _ = file.lock().flush();
        }
    }
}

/// Installs the logger: always on stderr, plus a session file under
/// `~/.mcwarden/logs` when the directory is usable.
pub fn init(verbose: bool) {
    let mut logger = LoggerBuilder::new();

    if let Some(home_dir) = home::home_dir() {
        let mut logs_dir = home_dir;
        logs_dir.push(".mcwarden");
        logs_dir.push("logs");
        if logs_dir.exists() || fs::create_dir_all(&logs_dir).is_ok() {
            logger = logger.enable_file(logs_dir);
        }
    }

    logger = logger.enable_stderr();

    if verbose || cfg!(debug_assertions) {
        log::set_max_level(log::LevelFilter::Trace);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }
    log::set_boxed_logger(Box::new(logger.build())).expect("failed to init logger");
}
