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

use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

fn write_source(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn runs_a_program_and_exits_zero() {
    let dir = tempdir().unwrap();
    let source = write_source(
        &dir,
        "prog.sdpl",
        "data out; x = 1; output; run; proc print data=out; run;",
    );

    let mut cmd = Command::cargo_bin("sdpl").unwrap();
    cmd.arg(&source)
        .assert()
        .success()
        .stdout(predicates::str::contains("Obs"))
        .stdout(predicates::str::contains('x'));
}

#[test]
fn no_listing_flag_suppresses_print_output() {
    let dir = tempdir().unwrap();
    let source = write_source(
        &dir,
        "prog.sdpl",
        "data out; x = 1; output; run; proc print data=out; run;",
    );

    let mut cmd = Command::cargo_bin("sdpl").unwrap();
    cmd.arg(&source)
        .arg("--no-listing")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn work_flag_places_published_datasets_under_the_given_directory() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir(&work).unwrap();
    let source = write_source(&dir, "prog.sdpl", "data out; x = 1; output; run;");

    let mut cmd = Command::cargo_bin("sdpl").unwrap();
    cmd.arg(&source).arg("--work").arg(&work).assert().success();

    // The WORK scratch directory is itself a uniquely-named subdirectory
    // created under `--work`, not `--work` itself.
    let scratch = fs::read_dir(&work)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.path().is_dir())
        .expect("expected a WORK scratch subdirectory")
        .path();
    let tdf = fs::read_dir(&scratch)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.path().extension().and_then(|e| e.to_str()) == Some("tdf"));
    assert!(tdf.is_some(), "expected an .tdf file under {}", scratch.display());
}

#[test]
fn missing_source_file_exits_with_error_code() {
    let mut cmd = Command::cargo_bin("sdpl").unwrap();
    cmd.arg("/no/such/file.sdpl").assert().code(2);
}

#[test]
fn parse_error_in_source_still_exits_nonzero() {
    let dir = tempdir().unwrap();
    // Truncated DATA step (no body, no RUN): the missing `;` after `out` is
    // a parse error, and there is nothing left in the source to recover
    // into, so the run ends cleanly with a recorded error.
    let source = write_source(&dir, "bad.sdpl", "data out");

    let mut cmd = Command::cargo_bin("sdpl").unwrap();
    cmd.arg(&source).assert().code(1);
}
