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

//! Process-wide run state (C9): libref table, the dataset registry, and the
//! "most recently created" pointer that `PROC ... DATA=` defaults from. One
//! `Env` is threaded explicitly through the driver, never a global.

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::identifier::Identifier;
use crate::library::Library;
use crate::pdv::Dataset;

pub const WORK_LIBREF: &str = "WORK";

#[derive(Default)]
pub struct Env {
    librefs: IndexMap<Identifier, Library>,
    datasets: IndexMap<Identifier, Dataset>,
    last_created: Option<Identifier>,
    work_dir: Option<PathBuf>,
    pub title: Option<String>,
    pub options: Vec<(Identifier, String)>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [Env::new], but honors `--work` / `SDPL_WORK` (see
    /// [crate::settings::Settings::work_dir]) as the base directory for the
    /// `WORK` library instead of the system temp directory.
    pub fn with_work_dir(work_dir: Option<PathBuf>) -> Self {
        Self {
            work_dir,
            ..Self::default()
        }
    }

    pub fn assign_libref(&mut self, libref: Identifier, library: Library) {
        self.librefs.insert(libref, library);
    }

    pub fn library(&self, libref: &Identifier) -> Option<&Library> {
        self.librefs.get(libref)
    }

    /// The `WORK` library, created lazily on first use.
    pub fn work_library(&mut self) -> &Library {
        let work = Identifier::new_unchecked(WORK_LIBREF);
        if !self.librefs.contains_key(&work) {
            self.librefs.insert(work.clone(), Library::work_in(self.work_dir.as_deref()));
        }
        self.librefs.get(&work).unwrap()
    }

    pub fn dataset(&self, name: &Identifier) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn dataset_mut(&mut self, name: &Identifier) -> Option<&mut Dataset> {
        self.datasets.get_mut(name)
    }

    pub fn insert_dataset(&mut self, dataset: Dataset) {
        let name = Identifier::new_unchecked(dataset.name.clone());
        self.last_created = Some(name.clone());
        self.datasets.insert(name, dataset);
    }

    /// The dataset `PROC ... DATA=` and `PROC ... SET=` fall back to when no
    /// `DATA=` clause is given.
    pub fn last_created(&self) -> Option<&Identifier> {
        self.last_created.as_ref()
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &Identifier> {
        self.datasets.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdv::VarType;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn tracks_last_created_dataset() {
        let mut env = Env::new();
        env.insert_dataset(Dataset::new("a", vec![(id("x"), VarType::Numeric, 0)]));
        env.insert_dataset(Dataset::new("b", vec![(id("y"), VarType::Numeric, 0)]));
        assert_eq!(env.last_created(), Some(&id("b")));
        assert!(env.dataset(&id("a")).is_some());
    }

    #[test]
    fn work_library_is_created_lazily() {
        let mut env = Env::new();
        assert!(env.library(&id("WORK")).is_none());
        env.work_library();
        assert!(env.library(&id("WORK")).is_some());
    }

    #[test]
    fn with_work_dir_places_work_library_under_the_given_base() {
        let base = std::env::temp_dir().join(format!("sdpl-test-env-work-{}", std::process::id()));
        let mut env = Env::with_work_dir(Some(base.clone()));
        assert!(env.work_library().path().starts_with(&base));
        std::fs::remove_dir_all(&base).ok();
    }
}
