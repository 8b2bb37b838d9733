/*
 * meli - msgstore
 *
 * Copyright 2019 Manos Pitsidianakis
 *
 * This file is part of meli.
 *
 * meli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * meli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with meli. If not, see <http://www.gnu.org/licenses/>.
 */

use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, PartialOrd, Serialize)]
#[repr(u8)]
pub enum LogLevel {
    OFF = 0,
    ERROR,
    WARN,
    #[default]
    INFO,
    DEBUG,
    TRACE,
}

impl From<u8> for LogLevel {
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 => Self::OFF,
            1 => Self::ERROR,
            2 => Self::WARN,
            3 => Self::INFO,
            4 => Self::DEBUG,
            _ => Self::TRACE,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(l: Level) -> Self {
        match l {
            Level::Error => Self::ERROR,
            Level::Warn => Self::WARN,
            Level::Info => Self::INFO,
            Level::Debug => Self::DEBUG,
            Level::Trace => Self::TRACE,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::ERROR => Self::Error,
            LogLevel::WARN => Self::Warn,
            LogLevel::OFF | LogLevel::INFO => Self::Info,
            LogLevel::DEBUG => Self::Debug,
            LogLevel::TRACE => Self::Trace,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::OFF => Self::Off,
            LogLevel::ERROR => Self::Error,
            LogLevel::WARN => Self::Warn,
            LogLevel::INFO => Self::Info,
            LogLevel::DEBUG => Self::Debug,
            LogLevel::TRACE => Self::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::OFF => "OFF",
                Self::ERROR => "ERROR",
                Self::WARN => "WARN",
                Self::INFO => "INFO",
                Self::DEBUG => "DEBUG",
                Self::TRACE => "TRACE",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, PartialOrd, Serialize)]
pub enum Destination {
    File,
    #[default]
    Stderr,
    None,
}

struct FileOutput {
    writer: BufWriter<std::fs::File>,
    path: PathBuf,
}

#[derive(Clone)]
pub struct StderrLogger {
    dest: Arc<Mutex<Option<FileOutput>>>,
    level: Arc<AtomicU8>,
    print_level: bool,
    print_module_names: bool,
    debug_dest: Destination,
}

impl std::fmt::Debug for StderrLogger {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct(stringify!(StderrLogger))
            .field("level", &self.log_level())
            .field("print_level", &self.print_level)
            .field("print_module_names", &self.print_module_names)
            .field("debug_dest", &self.debug_dest)
            .finish()
    }
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl StderrLogger {
    /// Create a logger and install it as the global `log` logger. Only the
    /// first logger created in a process is installed; later ones share
    /// nothing with it.
    pub fn new(level: LogLevel) -> Self {
        use std::sync::Once;

        static INIT_STDERR_LOGGING: Once = Once::new();

        let logger = Self {
            dest: Arc::new(Mutex::new(None)),
            level: Arc::new(AtomicU8::new(level as u8)),
            print_level: true,
            print_module_names: true,
            debug_dest: Destination::Stderr,
        };

        log::set_max_level(LevelFilter::from(logger.log_level()));

        INIT_STDERR_LOGGING.call_once(|| {
            _ = log::set_boxed_logger(Box::new(logger.clone()));
        });
        logger
    }

    pub fn log_level(&self) -> LogLevel {
        self.level.load(Ordering::SeqCst).into()
    }

    pub fn change_log_level(&self, new_val: LogLevel) {
        self.level.store(new_val as u8, Ordering::SeqCst);
        log::set_max_level(LevelFilter::from(new_val));
    }

    /// Append log records to `path` instead of the debug destination.
    pub fn change_log_dest(&mut self, path: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .read(true)
            .open(path)?;
        let mut dest = self.dest.lock().unwrap_or_else(|p| p.into_inner());
        *dest = Some(FileOutput {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    pub fn log_dest(&self) -> Option<PathBuf> {
        self.dest
            .lock()
            .ok()
            .and_then(|d| d.as_ref().map(|d| d.path.clone()))
    }
}

fn write_record(
    writer: &mut impl Write,
    record: &Record,
    (print_level, print_module_names): (bool, bool),
) -> Option<()> {
    writer
        .write_all(
            super::datetime::timestamp_to_string_utc(super::datetime::now()).as_bytes(),
        )
        .ok()?;
    writer.write_all(b" [").ok()?;
    if print_level {
        writer
            .write_all(record.level().to_string().as_bytes())
            .ok()?;
    }
    write!(writer, "]: ").ok()?;
    if print_module_names {
        write!(writer, "{}: ", record.metadata().target()).ok()?;
    }
    write!(writer, "{}", record.args()).ok()?;
    writer.write_all(b"\n").ok()?;
    writer.flush().ok()?;
    Some(())
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        !["polling", "async_io"]
            .iter()
            .any(|t| metadata.target().starts_with(t))
            && metadata.level() <= Level::from(self.log_level())
            && !matches!(self.log_level(), LogLevel::OFF)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let flags = (self.print_level, self.print_module_names);
        let written = self.dest.lock().ok().and_then(|mut d| {
            d.as_mut()
                .and_then(|d| write_record(&mut d.writer, record, flags))
        });
        if written.is_some() {
            return;
        }
        match self.debug_dest {
            Destination::None | Destination::File => {}
            Destination::Stderr => {
                _ = write_record(&mut std::io::stderr(), record, flags);
            }
        }
    }

    fn flush(&self) {
        _ = self
            .dest
            .lock()
            .ok()
            .and_then(|mut w| w.as_mut().and_then(|w| w.writer.flush().ok()));
    }
}
