/// Structured logging for the EEI analysis service
///
/// Provides context-rich logging with pipeline stage and location
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for unattended runs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::EeiError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dataset,
    Normalize,
    Entropy,
    Index,
    Sensitivity,
    Attribution,
    ChangePoint,
    Normality,
    Report,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Dataset => write!(f, "DATA"),
            Stage::Normalize => write!(f, "NORM"),
            Stage::Entropy => write!(f, "ENTROPY"),
            Stage::Index => write!(f, "EEI"),
            Stage::Sensitivity => write!(f, "SOBOL"),
            Stage::Attribution => write!(f, "SHAP"),
            Stage::ChangePoint => write!(f, "CUSUM"),
            Stage::Normality => write!(f, "SW"),
            Stage::Report => write!(f, "REPORT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Bad input or configuration - the run cannot succeed until it is fixed
    Input,
    /// The analysis itself could not produce a result on valid input
    Numerical,
    /// Output could not be written
    Output,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Input => write!(f, "INPUT"),
            FailureType::Numerical => write!(f, "NUMERICAL"),
            FailureType::Output => write!(f, "OUTPUT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut global) = LOGGER.lock() {
            *global = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, location: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let location_part = location.map(|l| format!(" [{}]", l)).unwrap_or_default();
        let log_entry = format_entry(&timestamp.to_string(), level, stage, &location_part, message);

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, location_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, location_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn format_entry(timestamp: &str, level: LogLevel, stage: Stage, location_part: &str, message: &str) -> String {
    format!("{} {} {}{}: {}", timestamp, level, stage, location_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn dispatch(level: LogLevel, stage: Stage, location: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, location, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, location: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, stage, location, message);
}

/// Log a warning message
pub fn warn(stage: Stage, location: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, stage, location, message);
}

/// Log an error message
pub fn error(stage: Stage, location: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, stage, location, message);
}

/// Log a debug message
pub fn debug(stage: Stage, location: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, stage, location, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a pipeline error by what has to change for the next run to pass
pub fn classify_failure(err: &EeiError) -> FailureType {
    match err {
        EeiError::InvalidData(_) | EeiError::Config(_) => FailureType::Input,
        EeiError::InsufficientSamples { .. } | EeiError::Analysis(_) => FailureType::Numerical,
        EeiError::Io(_) | EeiError::Table(_) | EeiError::Chart(_) => FailureType::Output,
    }
}

/// Log a stage failure with automatic classification
pub fn log_stage_failure(stage: Stage, operation: &str, err: &EeiError) {
    let message = format!("{} failed [{}]: {}", operation, classify_failure(err), err);
    error(stage, None, &message);
}
