//! Logging configuration
//!
//! Describes where log output goes. The binary turns this into a
//! `tracing_subscriber` registry; the core only owns the settings and the
//! log directory housekeeping.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level: trace, debug, info, warn or error
    pub level: String,
    /// Write to stderr
    pub console_output: bool,
    /// Write to a timestamped file in `log_directory`
    pub file_output: bool,
    pub log_directory: PathBuf,
    /// Number of log files kept by [`LogConfig::cleanup_old_logs`]
    pub max_log_files: usize,
    /// Session start, fixes the current log file name
    #[serde(skip, default = "session_stamp")]
    session: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_directory: default_log_directory(),
            max_log_files: 10,
            session: session_stamp(),
        }
    }
}

fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("beamsync").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn session_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

impl LogConfig {
    /// Parse the configured level, falling back to INFO
    pub fn parse_level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }

    /// Create the log directory if needed
    pub fn ensure_log_directory(&self) -> std::io::Result<()> {
        if self.file_output {
            std::fs::create_dir_all(&self.log_directory)?;
        }
        Ok(())
    }

    /// Path of the log file for this session
    pub fn current_log_path(&self) -> PathBuf {
        self.log_directory
            .join(format!("beamsync_{}.log", self.session))
    }

    /// Delete the oldest log files so at most `max_log_files` remain
    pub fn cleanup_old_logs(&self) -> std::io::Result<()> {
        if !self.log_directory.is_dir() {
            return Ok(());
        }
        let mut logs: Vec<PathBuf> = std::fs::read_dir(&self.log_directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("beamsync_") && n.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        if logs.len() <= self.max_log_files {
            return Ok(());
        }
        // Timestamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_log_files;
        for path in logs.into_iter().take(excess) {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
