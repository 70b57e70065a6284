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

//! PROC executor (C8): PRINT and SORT.

use std::cmp::Ordering;
use std::io::{self, Write};

use thiserror::Error as ThisError;

use crate::ast::{ProcPrint, ProcSort, ProcStep};
use crate::env::Env;
use crate::eval::{eval, EvalContext};
use crate::identifier::Identifier;
use crate::message::Diagnostics;
use crate::pdv::{Dataset, Pdv, Row, VarType};
use crate::value::Value;

#[derive(Debug, ThisError)]
pub enum ProcError {
    #[error("no data set to operate on and no dataset has been created yet")]
    NoDataset,
    #[error("dataset {0} not found")]
    MissingDataset(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("step cancelled")]
    Cancelled,
}

pub fn run_proc(
    step: &ProcStep,
    env: &mut Env,
    out: &mut dyn Write,
    diags: &mut Diagnostics,
    cancel: &dyn Fn() -> bool,
) -> Result<(), ProcError> {
    match step {
        ProcStep::Print(print) => run_print(print, env, out, cancel),
        ProcStep::Sort(sort) => run_sort(sort, env, diags, cancel),
    }
}

fn resolve_data<'a>(data: &Option<crate::ast::DatasetRef>, env: &'a Env) -> Result<&'a Identifier, ProcError> {
    match data {
        Some(r) => Ok(&r.member),
        None => env.last_created().ok_or(ProcError::NoDataset),
    }
}

fn run_print(
    print: &ProcPrint,
    env: &Env,
    out: &mut dyn Write,
    cancel: &dyn Fn() -> bool,
) -> Result<(), ProcError> {
    let name = resolve_data(&print.data, env)?.clone();
    let dataset = env
        .dataset(&name)
        .ok_or_else(|| ProcError::MissingDataset(name.to_string()))?;

    let columns: Vec<&Identifier> = if print.var.is_empty() {
        dataset.columns.iter().map(|(n, ..)| n).collect()
    } else {
        print.var.iter().collect()
    };

    let widths: Vec<usize> = columns
        .iter()
        .map(|c| {
            let header_len = c.as_str().len();
            let max_cell = dataset
                .rows
                .iter()
                .take(print.obs.unwrap_or(usize::MAX))
                .filter_map(|r| r.get(c))
                .map(format_value)
                .map(|s| s.len())
                .max()
                .unwrap_or(0);
            header_len.max(max_cell)
        })
        .collect();

    write!(out, "Obs")?;
    for (c, w) in columns.iter().zip(&widths) {
        write!(out, "  {:>width$}", c.as_str(), width = w)?;
    }
    writeln!(out)?;

    let limit = print.obs.unwrap_or(dataset.rows.len());
    for (i, row) in dataset.rows.iter().take(limit).enumerate() {
        if cancel() {
            return Err(ProcError::Cancelled);
        }
        write!(out, "{:>3}", i + 1)?;
        for (c, w) in columns.iter().zip(&widths) {
            let text = row.get(c).map(format_value).unwrap_or_default();
            write!(out, "  {:>width$}", text, width = w)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Number(Some(n)) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{n:.0}")
            } else {
                format!("{n}")
            }
        }
        Value::Number(None) => ".".to_string(),
        Value::String(s) => s.trim_end().to_string(),
    }
}

fn run_sort(
    sort: &ProcSort,
    env: &mut Env,
    diags: &mut Diagnostics,
    cancel: &dyn Fn() -> bool,
) -> Result<(), ProcError> {
    let in_name = resolve_data(&sort.data, env)?.clone();
    let dataset = env
        .dataset(&in_name)
        .ok_or_else(|| ProcError::MissingDataset(in_name.to_string()))?
        .clone();

    let columns = dataset.columns.clone();
    let mut rows: Vec<Row> = Vec::with_capacity(dataset.rows.len());
    for row in dataset.rows {
        if cancel() {
            return Err(ProcError::Cancelled);
        }
        let keep = match &sort.where_ {
            Some(cond) => row_matches(&row, &columns, cond, diags),
            None => true,
        };
        if keep {
            rows.push(row);
        }
    }

    rows.sort_by(|a, b| compare_rows(a, b, &sort.by));

    if sort.duplicates {
        rows.dedup_by(|a, b| a.row_eq(b, 1e-9));
    }
    if sort.nodupkey {
        rows.dedup_by(|a, b| keys_equal(a, b, &sort.by));
    }

    let out_name = match &sort.out {
        Some(r) => r.member.clone(),
        None => in_name.clone(),
    };

    env.insert_dataset(Dataset {
        name: out_name.to_string(),
        columns,
        rows,
    });
    Ok(())
}

fn compare_rows(a: &Row, b: &Row, by: &[Identifier]) -> Ordering {
    for key in by {
        let ord = match (a.get(key), b.get(key)) {
            (Some(x), Some(y)) => x.sort_cmp(y),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn keys_equal(a: &Row, b: &Row, by: &[Identifier]) -> bool {
    by.iter().all(|key| match (a.get(key), b.get(key)) {
        (Some(x), Some(y)) => x.row_eq(y, 1e-9),
        (None, None) => true,
        _ => false,
    })
}

fn row_matches(
    row: &Row,
    columns: &[(Identifier, VarType, usize)],
    cond: &crate::ast::Expr,
    diags: &mut Diagnostics,
) -> bool {
    let mut pdv = Pdv::new();
    for (name, var_type, len) in columns {
        let _ = match var_type {
            VarType::Numeric => pdv.declare_numeric(name),
            VarType::Character => pdv.declare_string(name, *len),
        };
        if let Some(idx) = pdv.slot_index(name) {
            if let Some(value) = row.get(name) {
                pdv.set_value(idx, value.clone());
            }
        }
    }
    let arrays = std::collections::HashMap::new();
    let ctx = EvalContext { pdv: &pdv, arrays: &arrays };
    eval(cond, &ctx, diags).map(|v| v.is_truthy()).unwrap_or(false)
}
