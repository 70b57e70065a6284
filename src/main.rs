/* SDPL - a statistical data-processing language interpreter.
 * Copyright (C) 2026 The SDPL Project
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>. */

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use sdpl::driver::run_source;
use sdpl::env::Env;
use sdpl::settings::Settings;

/// Runs an SDPL program against a dataset environment, printing PROC PRINT
/// listings to standard output.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the .sdpl source file to run.
    source: PathBuf,

    /// Directory backing the WORK library; defaults to a fresh temp
    /// directory (also settable via SDPL_WORK).
    #[arg(long)]
    work: Option<PathBuf>,

    /// Suppress PROC PRINT listings.
    #[arg(long)]
    no_listing: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let source = fs::read_to_string(&cli.source)
        .with_context(|| format!("reading {}", cli.source.display()))?;
    let settings = Settings::from_env(cli.work, cli.no_listing);
    let mut env = Env::with_work_dir(settings.work_dir.clone());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let diags = run_source(&source, &mut env, &settings, &mut out, &|| false)
        .context("running program")?;

    for diag in diags.items() {
        if diag.severity.at_least(settings.log_level.floor()) {
            eprintln!("{diag}");
        }
    }

    Ok(ExitCode::from(diags.exit_code() as u8))
}
