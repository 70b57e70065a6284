// SDPL - a statistical data-processing language interpreter.
// Copyright (C) 2026 The SDPL Project
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Process-wide tunables, built once at startup and threaded explicitly
//! through the driver (never a global singleton), the way
//! `pspp::settings::Settings` is constructed and passed around.

use std::{env, path::PathBuf};

use crate::message::Severity;

/// Minimum severity that reaches the log sink, controlled by
/// `SDPL_LOG_LEVEL`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    /// The diagnostic [Severity] floor this level admits.
    pub fn floor(&self) -> Severity {
        match self {
            LogLevel::Error => Severity::Error,
            LogLevel::Warn | LogLevel::Info | LogLevel::Debug => Severity::Warning,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Warn
    }
}

/// Process-wide tunables assembled from CLI flags and environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `SDPL_LOG_LEVEL`.
    pub log_level: LogLevel,

    /// `--work` / `SDPL_WORK`; `None` means use a fresh temp directory.
    pub work_dir: Option<PathBuf>,

    /// `--no-listing`.
    pub suppress_listing: bool,

    /// Tolerance used when comparing two numeric [crate::value::Value]s.
    pub epsilon: f64,

    /// Upper bound on `DO WHILE`/`DO UNTIL` iterations, a cooperative
    /// cancellation backstop against a runaway condition (mirrors
    /// `pspp::settings::Settings::max_loops`).
    pub max_do_iterations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            work_dir: None,
            suppress_listing: false,
            epsilon: 1e-9,
            max_do_iterations: 1_000_000,
        }
    }
}

impl Settings {
    /// Builds settings from explicit CLI overrides plus environment
    /// variables, with CLI flags taking precedence.
    pub fn from_env(work_flag: Option<PathBuf>, no_listing: bool) -> Self {
        let mut settings = Self::default();
        if let Ok(level) = env::var("SDPL_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&level) {
                settings.log_level = level;
            }
        }
        settings.work_dir = work_flag.or_else(|| env::var("SDPL_WORK").ok().map(PathBuf::from));
        settings.suppress_listing = no_listing;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("bogus"), None);
    }

    #[test]
    fn cli_flag_wins_over_env() {
        // SAFETY: test runs single-threaded with respect to this var; no
        // other test in this crate reads or writes SDPL_WORK.
        unsafe {
            env::set_var("SDPL_WORK", "/from/env");
        }
        let settings = Settings::from_env(Some(PathBuf::from("/from/flag")), false);
        assert_eq!(settings.work_dir, Some(PathBuf::from("/from/flag")));
        unsafe {
            env::remove_var("SDPL_WORK");
        }
    }
}
