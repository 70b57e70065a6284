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

//! Program driver (C10): lexes, parses, then walks the AST top to bottom,
//! routing each top-level statement to the executor, the PROC runner, or the
//! environment directly.

use std::io::Write;

use thiserror::Error as ThisError;

use crate::ast::{DatasetRef, Program, ProcStep, TopStmt};
use crate::env::Env;
use crate::exec::{run_data_step, ExecError};
use crate::lexer::{LexError, Lexer};
use crate::library::{Library, LibraryError};
use crate::message::{Diagnostic, Diagnostics};
use crate::parser::{ParseError, Parser};
use crate::proc::{run_proc, ProcError};
use crate::settings::Settings;
use crate::tdf::{BinTdf, DatasetCodec};

#[derive(Debug, ThisError)]
pub enum SdplError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Proc(#[from] ProcError),
    #[error(transparent)]
    Library(#[from] LibraryError),
}

/// Parses and runs an entire source text, writing PROC PRINT listings to
/// `out` unless `settings.suppress_listing` is set.
///
/// Returns the diagnostics collected along the way; a lex failure is fatal
/// (no token stream means nothing else can run) but parse errors, runtime
/// errors, and cancellation are recorded as diagnostics and the driver moves
/// on to the next top-level statement.
pub fn run_source(
    source: &str,
    env: &mut Env,
    settings: &Settings,
    out: &mut dyn Write,
    cancel: &dyn Fn() -> bool,
) -> Result<Diagnostics, SdplError> {
    let mut diags = Diagnostics::new();

    let (tokens, datalines) = Lexer::new(source).tokenize()?;
    let (program, parse_errors) = Parser::new(tokens, datalines).parse_program();
    for err in parse_errors {
        diags.push(parse_error_to_diagnostic(err));
    }

    run_program(&program, env, settings, out, &mut diags, cancel);
    Ok(diags)
}

fn parse_error_to_diagnostic(err: ParseError) -> Diagnostic {
    Diagnostic::error(err.to_string())
}

/// Executes an already-parsed [Program], one top-level statement at a time.
/// Polls `cancel` between statements in addition to the per-row polling
/// `exec`/`proc` already perform internally.
pub fn run_program(
    program: &Program,
    env: &mut Env,
    settings: &Settings,
    out: &mut dyn Write,
    diags: &mut Diagnostics,
    cancel: &dyn Fn() -> bool,
) {
    for stmt in &program.statements {
        if cancel() {
            diags.push(Diagnostic::warning("run cancelled"));
            break;
        }
        run_top_stmt(stmt, env, settings, out, diags, cancel);
    }
}

fn run_top_stmt(
    stmt: &TopStmt,
    env: &mut Env,
    settings: &Settings,
    out: &mut dyn Write,
    diags: &mut Diagnostics,
    cancel: &dyn Fn() -> bool,
) {
    match stmt {
        TopStmt::Libname { libref, path } => match Library::create(path) {
            Ok(library) => env.assign_libref(libref.clone(), library),
            Err(e) => diags.push(Diagnostic::error(e.to_string())),
        },
        TopStmt::Options(opts) => env.options.extend(opts.iter().cloned()),
        TopStmt::Title(text) => env.title = Some(text.clone()),
        TopStmt::Data(step) => {
            if let Err(e) = run_data_step(step, env, settings, diags, cancel) {
                diags.push(step_error_diagnostic(matches!(e, ExecError::Cancelled), e.to_string()));
            } else {
                for target in &step.outputs {
                    persist_dataset(env, target, diags);
                }
            }
        }
        TopStmt::Proc(step) => {
            let result = if settings.suppress_listing && matches!(step, ProcStep::Print(_)) {
                let mut sink = std::io::sink();
                run_proc(step, env, &mut sink, diags, cancel)
            } else {
                run_proc(step, env, out, diags, cancel)
            };
            match result {
                Err(e) => diags.push(step_error_diagnostic(matches!(e, ProcError::Cancelled), e.to_string())),
                Ok(()) => {
                    if let ProcStep::Sort(sort) = step {
                        if let Some(target) = sort.out.clone().or_else(|| sort.data.clone()) {
                            persist_dataset(env, &target, diags);
                        }
                    }
                }
            }
        }
    }
}

/// Cancellation aborts only the step it interrupts and must not itself count
/// toward the program's error exit code — everything else a step fails with
/// does.
fn step_error_diagnostic(cancelled: bool, text: String) -> Diagnostic {
    if cancelled {
        Diagnostic::warning(text)
    } else {
        Diagnostic::error(text)
    }
}

/// Saves a just-published dataset to its owning library's on-disk TDF file
/// (`<libdir>/<member>.tdf`, `WORK` when `target` is unqualified). A save
/// failure is reported as a diagnostic rather than undoing the already
/// in-memory dataset.
fn persist_dataset(env: &mut Env, target: &DatasetRef, diags: &mut Diagnostics) {
    let Some(dataset) = env.dataset(&target.member).cloned() else {
        return;
    };
    let library = match &target.libref {
        Some(libref) => match env.library(libref) {
            Some(library) => library,
            None => {
                diags.push(Diagnostic::error(format!("undefined libref {libref}")));
                return;
            }
        },
        None => env.work_library(),
    };
    let path = library.member_path(&dataset.name);
    if let Err(e) = BinTdf::save(&dataset, &path) {
        diags.push(Diagnostic::error(format!("saving dataset {}: {e}", dataset.name)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_data_step_then_print_and_collects_listing() {
        let source = "DATA a; x = 1; y = 2; OUTPUT; RUN; PROC PRINT DATA=a; RUN;";
        let mut env = Env::new();
        let settings = Settings::default();
        let mut buf = Vec::new();
        let diags = run_source(source, &mut env, &settings, &mut buf, &|| false).unwrap();
        assert!(!diags.has_errors());
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains('x'));
        assert!(env.dataset(&crate::identifier::Identifier::new("a").unwrap()).is_some());
    }

    #[test]
    fn cancellation_mid_data_step_is_a_warning_not_an_error() {
        use std::cell::Cell;
        let source = "DATA in; input x; datalines;\n1\n2\n3\n;\nrun;";
        let mut env = Env::new();
        let settings = Settings::default();
        let mut buf = Vec::new();
        run_source(source, &mut env, &settings, &mut buf, &|| false).unwrap();

        let source = "DATA out; set in; y = x * 2; output; run;";
        let rows_seen = Cell::new(0);
        let cancel = || {
            rows_seen.set(rows_seen.get() + 1);
            rows_seen.get() > 1
        };
        let diags = run_source(source, &mut env, &settings, &mut buf, &cancel).unwrap();
        assert!(!diags.has_errors());
        assert_eq!(diags.exit_code(), 0);
        assert!(diags.items().iter().any(|d| d.severity == crate::message::Severity::Warning));
        assert!(env.dataset(&crate::identifier::Identifier::new("out").unwrap()).is_none());
    }

    #[test]
    fn suppress_listing_silences_print_output() {
        let source = "DATA a; x = 1; OUTPUT; RUN; PROC PRINT DATA=a; RUN;";
        let mut env = Env::new();
        let mut settings = Settings::default();
        settings.suppress_listing = true;
        let mut buf = Vec::new();
        run_source(source, &mut env, &settings, &mut buf, &|| false).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn cancellation_before_any_statement_stops_the_run() {
        let source = "DATA a; x = 1; OUTPUT; RUN;";
        let mut env = Env::new();
        let settings = Settings::default();
        let mut buf = Vec::new();
        let diags = run_source(source, &mut env, &settings, &mut buf, &|| true).unwrap();
        assert!(env.dataset(&crate::identifier::Identifier::new("a").unwrap()).is_none());
        assert!(diags.items().iter().any(|d| d.text.contains("cancelled")));
    }

    #[test]
    fn data_step_output_is_persisted_to_the_work_library_as_tdf() {
        let source = "DATA a; x = 1; OUTPUT; RUN;";
        let mut env = Env::new();
        let settings = Settings::default();
        let mut buf = Vec::new();
        let diags = run_source(source, &mut env, &settings, &mut buf, &|| false).unwrap();
        assert!(!diags.has_errors());
        let path = env.work_library().member_path("a");
        assert!(path.is_file());
        let loaded = BinTdf::load(&path).unwrap();
        assert_eq!(loaded.rows.len(), 1);
    }

    #[test]
    fn proc_sort_output_is_persisted_to_the_work_library_as_tdf() {
        let source = "DATA in; input x; datalines;\n2\n1\n;\nrun; proc sort data=in out=sorted; by x; run;";
        let mut env = Env::new();
        let settings = Settings::default();
        let mut buf = Vec::new();
        let diags = run_source(source, &mut env, &settings, &mut buf, &|| false).unwrap();
        assert!(!diags.has_errors());
        let path = env.work_library().member_path("sorted");
        assert!(path.is_file());
    }

    #[test]
    fn title_and_options_update_the_environment() {
        let source = "TITLE \"Report\"; OPTIONS linesize=80; DATA a; x = 1; OUTPUT; RUN;";
        let mut env = Env::new();
        let settings = Settings::default();
        let mut buf = Vec::new();
        run_source(source, &mut env, &settings, &mut buf, &|| false).unwrap();
        assert_eq!(env.title.as_deref(), Some("Report"));
        assert!(!env.options.is_empty());
    }
}
