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

//! Library resolution (C14): maps a libref to a directory on disk, with a
//! lazily-created `WORK` scratch library torn down on drop.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error as ThisError;

#[derive(Clone, Debug, ThisError)]
pub enum LibraryError {
    #[error("cannot create library directory {0}: {1}")]
    Create(PathBuf, String),
    #[error("library path {0} does not exist")]
    NotFound(PathBuf),
}

/// A resolved storage location for one libref. `Permanent` libraries are
/// `LIBNAME`-assigned paths the caller owns; `Work` owns a temp directory
/// removed automatically when the library is dropped.
pub enum Library {
    Permanent(PathBuf),
    Work(TempDir),
}

impl Library {
    /// Creates the default `WORK` scratch library: a fresh, uniquely-named
    /// directory under the system temp directory.
    pub fn work() -> Self {
        Self::work_in(None)
    }

    /// Creates the `WORK` scratch library under `base` (the `--work` /
    /// `SDPL_WORK` override) when given, falling back to the system temp
    /// directory otherwise. `base` is created if it doesn't already exist.
    pub fn work_in(base: Option<&Path>) -> Self {
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base).expect("failed to create WORK base directory");
                TempDir::with_prefix_in("sdpl-work-", base)
            }
            None => TempDir::with_prefix("sdpl-work-"),
        }
        .expect("failed to create WORK scratch directory");
        Library::Work(dir)
    }

    /// Resolves an existing permanent library path (`LIBNAME lib "path";`).
    pub fn resolve(path: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(LibraryError::NotFound(path));
        }
        Ok(Library::Permanent(path))
    }

    /// Creates a permanent library directory if it does not already exist.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let path = path.into();
        std::fs::create_dir_all(&path)
            .map_err(|e| LibraryError::Create(path.clone(), e.to_string()))?;
        Ok(Library::Permanent(path))
    }

    pub fn path(&self) -> &Path {
        match self {
            Library::Permanent(p) => p,
            Library::Work(dir) => dir.path(),
        }
    }

    /// The path a member dataset's TDF file would live at within this
    /// library.
    pub fn member_path(&self, member: &str) -> PathBuf {
        self.path().join(format!("{}.tdf", member.to_ascii_lowercase()))
    }
}
