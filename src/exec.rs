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

//! DATA-step executor (C7): compile -> iterate -> finalize.

use std::collections::HashMap;

use thiserror::Error as ThisError;

use crate::ast::{DataStep, DatasetRef, DoHeader, Stmt};
use crate::env::Env;
use crate::eval::{eval, ArrayBinding, EvalContext, EvalError};
use crate::identifier::Identifier;
use crate::message::{Diagnostic, Diagnostics};
use crate::pdv::{Dataset, Pdv, PdvError, Row, VarType};
use crate::settings::Settings;
use crate::value::Value;

#[derive(Debug, ThisError)]
pub enum ExecError {
    #[error("dataset {0} not found")]
    MissingDataset(String),
    #[error(transparent)]
    Pdv(#[from] PdvError),
    #[error("step cancelled")]
    Cancelled,
}

/// Metadata collected from a DATA step's declarative statements before any
/// row is iterated; everything else in the body becomes an executable
/// action run once per iteration.
struct Compiled<'a> {
    dropped: Vec<&'a Identifier>,
    kept: Vec<&'a Identifier>,
    arrays: HashMap<Identifier, ArrayBinding>,
    set_inputs: &'a [DatasetRef],
    merge: Option<(&'a [DatasetRef], &'a [Identifier])>,
    input_vars: &'a [crate::ast::InputVar],
    datalines: &'a [String],
    actions: Vec<&'a Stmt>,
    has_output: bool,
}

/// Walks a DATA step's declarative statements in source order, declaring
/// each variable into `pdv` as it is reached so the output column order
/// matches the order variables are first named in the program rather than a
/// fixed statement-kind precedence.
fn compile_and_declare<'a>(
    step: &'a DataStep,
    pdv: &mut Pdv,
    env: &Env,
    diags: &mut Diagnostics,
) -> Result<Compiled<'a>, ExecError> {
    let mut c = Compiled {
        dropped: Vec::new(),
        kept: Vec::new(),
        arrays: HashMap::new(),
        set_inputs: &[],
        merge: None,
        input_vars: &[],
        datalines: &[],
        actions: Vec::new(),
        has_output: false,
    };
    for stmt in &step.body {
        match stmt {
            Stmt::Length { name, is_string, len } => {
                if *is_string {
                    pdv.declare_string(name, *len)?;
                } else {
                    pdv.declare_numeric(name)?;
                }
            }
            Stmt::Retain { name, initial } => {
                let value = match initial {
                    Some(expr) => {
                        let ctx = EvalContext { pdv: &*pdv, arrays: &c.arrays };
                        eval(expr, &ctx, diags).unwrap_or(Value::missing())
                    }
                    None => match pdv.get(name) {
                        Some(slot) if slot.var_type == VarType::Character => Value::blank(slot.len),
                        _ => Value::missing(),
                    },
                };
                pdv.retain(name, value)?;
            }
            Stmt::Drop(names) => c.dropped.extend(names.iter()),
            Stmt::Keep(names) => c.kept.extend(names.iter()),
            Stmt::Array { name, size, vars } => {
                for var in vars {
                    if pdv.get(var).is_none() {
                        pdv.declare_numeric(var)?;
                    }
                }
                c.arrays.insert(
                    name.clone(),
                    ArrayBinding {
                        size: *size,
                        vars: vars.clone(),
                    },
                );
            }
            Stmt::Set(inputs) => {
                declare_dataset_columns(inputs, env, pdv)?;
                c.set_inputs = inputs;
            }
            Stmt::Merge { inputs, by } => {
                for name in by {
                    if pdv.get(name).is_none() {
                        pdv.declare_numeric(name)?;
                    }
                }
                declare_dataset_columns(inputs, env, pdv)?;
                c.merge = Some((inputs, by));
            }
            Stmt::Input(vars) => {
                for var in vars {
                    if var.is_string {
                        pdv.declare_string(&var.name, 8)?;
                    } else {
                        pdv.declare_numeric(&var.name)?;
                    }
                }
                c.input_vars = vars;
            }
            Stmt::Datalines(lines) => c.datalines = lines,
            other => c.actions.push(other),
        }
    }
    for name in &c.dropped {
        if pdv.get(name).is_some() {
            pdv.set_dropped(name)?;
        }
    }
    c.has_output = contains_output(&step.body);
    Ok(c)
}

fn declare_dataset_columns(inputs: &[DatasetRef], env: &Env, pdv: &mut Pdv) -> Result<(), ExecError> {
    for input in inputs {
        let dataset = env
            .dataset(&input.member)
            .ok_or_else(|| ExecError::MissingDataset(input.member.to_string()))?;
        for (name, var_type, len) in &dataset.columns {
            match var_type {
                VarType::Numeric => pdv.declare_numeric(name)?,
                VarType::Character => pdv.declare_string(name, *len)?,
            };
        }
    }
    Ok(())
}

fn contains_output(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|s| match s {
        Stmt::Output(_) => true,
        Stmt::If { then_branch, else_branch, .. } => {
            contains_output(std::slice::from_ref(then_branch))
                || else_branch
                    .as_ref()
                    .is_some_and(|e| contains_output(std::slice::from_ref(e)))
        }
        Stmt::Do { body, .. } => contains_output(body),
        _ => false,
    })
}

/// Accumulates rows bound for each declared output dataset while the body
/// runs; flushed into `Env` at finalize.
struct OutputSink {
    names: Vec<Identifier>,
    rows: HashMap<Identifier, Vec<Row>>,
}

impl OutputSink {
    fn new(outputs: &[DatasetRef]) -> Self {
        let names: Vec<Identifier> = outputs.iter().map(|r| r.member.clone()).collect();
        let rows = names.iter().map(|n| (n.clone(), Vec::new())).collect();
        Self { names, rows }
    }

    fn emit(&mut self, target: Option<&Identifier>, row: Row) {
        match target {
            Some(name) => {
                self.rows.entry(name.clone()).or_default().push(row);
            }
            None => {
                for name in &self.names {
                    self.rows.get_mut(name).unwrap().push(row.clone());
                }
            }
        }
    }
}

pub fn run_data_step(
    step: &DataStep,
    env: &mut Env,
    settings: &Settings,
    diags: &mut Diagnostics,
    cancel: &dyn Fn() -> bool,
) -> Result<(), ExecError> {
    let mut pdv = Pdv::new();
    let compiled = compile_and_declare(step, &mut pdv, env, diags)?;

    let mut sink = OutputSink::new(&step.outputs);

    let source_rows: Vec<Row> = if !compiled.set_inputs.is_empty() {
        gather_set_rows(compiled.set_inputs, env)?
    } else if let Some((inputs, by)) = compiled.merge {
        gather_merge_rows(inputs, by, env, &mut pdv, &mut sink, &compiled, diags, settings, cancel)?
    } else if !compiled.input_vars.is_empty() {
        gather_datalines_rows(compiled.input_vars, compiled.datalines)
    } else {
        Vec::new()
    };

    let ran_merge = compiled.merge.is_some();
    if !ran_merge {
        if source_rows.is_empty() && (compiled.set_inputs.is_empty() && compiled.input_vars.is_empty()) {
            // "create from scratch" mode: run the body exactly once.
            run_one_iteration(&mut pdv, None, &compiled, &mut sink, diags, settings);
        } else {
            for row in &source_rows {
                if cancel() {
                    return Err(ExecError::Cancelled);
                }
                run_one_iteration(&mut pdv, Some(row), &compiled, &mut sink, diags, settings);
            }
        }
    }

    if !compiled.kept.is_empty() {
        let kept: Vec<Identifier> = compiled.kept.iter().map(|n| (*n).clone()).collect();
        pdv.restrict_to_keep_list(&kept);
    }

    for name in &sink.names {
        let mut rows = sink.rows.remove(name).unwrap_or_default();
        let columns: Vec<(Identifier, VarType, usize)> = pdv
            .output_columns()
            .into_iter()
            .map(|n| {
                let slot = pdv.get(n).unwrap();
                (slot.name.clone(), slot.var_type, slot.len)
            })
            .collect();
        // A row emitted by an early OUTPUT predates columns the body later
        // declares; backfill those with the same default `Pdv::declare`
        // hands a freshly-declared slot, so every row carries every final
        // column.
        for row in &mut rows {
            for (col_name, var_type, len) in &columns {
                let default = match var_type {
                    VarType::Numeric => Value::missing(),
                    VarType::Character => Value::blank(*len),
                };
                row.fill_missing(col_name.clone(), default);
            }
        }
        env.insert_dataset(Dataset {
            name: name.to_string(),
            columns,
            rows,
        });
    }

    Ok(())
}

fn run_one_iteration(
    pdv: &mut Pdv,
    source_row: Option<&Row>,
    compiled: &Compiled,
    sink: &mut OutputSink,
    diags: &mut Diagnostics,
    settings: &Settings,
) {
    pdv.reset_for_iteration();
    if let Some(row) = source_row {
        apply_row(pdv, row);
    }

    let mut emitted = false;
    for stmt in &compiled.actions {
        exec_stmt(stmt, pdv, &compiled.arrays, sink, diags, settings, &mut emitted);
    }

    if !compiled.has_output {
        sink.emit(None, pdv.snapshot());
    }
}

fn apply_row(pdv: &mut Pdv, row: &Row) {
    for (name, value) in row.cells() {
        if let Some(idx) = pdv.slot_index(name) {
            pdv.set_value(idx, value.clone());
        }
    }
}

fn exec_stmt(
    stmt: &Stmt,
    pdv: &mut Pdv,
    arrays: &HashMap<Identifier, ArrayBinding>,
    sink: &mut OutputSink,
    diags: &mut Diagnostics,
    settings: &Settings,
    emitted: &mut bool,
) {
    match stmt {
        Stmt::Assign(name, expr) => {
            let ctx = EvalContext { pdv, arrays };
            match eval(expr, &ctx, diags) {
                Ok(value) => assign(pdv, name, value, diags),
                Err(e) => report_eval_error(diags, e),
            }
        }
        Stmt::ArrayAssign(name, index_expr, value_expr) => {
            let ctx = EvalContext { pdv, arrays };
            let index = match eval(index_expr, &ctx, diags) {
                Ok(v) => v.as_number().flatten(),
                Err(e) => {
                    report_eval_error(diags, e);
                    return;
                }
            };
            let value = match eval(value_expr, &ctx, diags) {
                Ok(v) => v,
                Err(e) => {
                    report_eval_error(diags, e);
                    return;
                }
            };
            let Some(binding) = arrays.get(name) else {
                diags.push(Diagnostic::error(format!("reference to undefined array {name}")));
                return;
            };
            let Some(i) = index else {
                return;
            };
            if !(1.0..=binding.size as f64).contains(&i) || i.fract() != 0.0 {
                diags.push(Diagnostic::error(format!(
                    "array index {i} is out of range for array {name} of size {}",
                    binding.size
                )));
                return;
            }
            let var = binding.vars[i as usize - 1].clone();
            assign(pdv, &var, value, diags);
        }
        Stmt::If { cond, then_branch, else_branch } => {
            let ctx = EvalContext { pdv, arrays };
            match eval(cond, &ctx, diags) {
                Ok(v) if v.is_truthy() => exec_stmt(then_branch, pdv, arrays, sink, diags, settings, emitted),
                Ok(_) => {
                    if let Some(branch) = else_branch {
                        exec_stmt(branch, pdv, arrays, sink, diags, settings, emitted);
                    }
                }
                Err(e) => report_eval_error(diags, e),
            }
        }
        Stmt::Do { header, body } => exec_do(header, body, pdv, arrays, sink, diags, settings, emitted),
        Stmt::Output(target) => {
            sink.emit(target.as_ref().map(|r| &r.member), pdv.snapshot());
            *emitted = true;
        }
        Stmt::Length { .. }
        | Stmt::Retain { .. }
        | Stmt::Drop(_)
        | Stmt::Keep(_)
        | Stmt::Array { .. }
        | Stmt::Set(_)
        | Stmt::Merge { .. }
        | Stmt::Input(_)
        | Stmt::Datalines(_) => unreachable!("declarative statement in action list"),
    }
}

fn exec_do(
    header: &DoHeader,
    body: &[Stmt],
    pdv: &mut Pdv,
    arrays: &HashMap<Identifier, ArrayBinding>,
    sink: &mut OutputSink,
    diags: &mut Diagnostics,
    settings: &Settings,
    emitted: &mut bool,
) {
    let mut run_body = |pdv: &mut Pdv| {
        for stmt in body {
            exec_stmt(stmt, pdv, arrays, sink, diags, settings, emitted);
        }
    };

    match header {
        DoHeader::Block => run_body(pdv),
        DoHeader::Count { var, lo, hi, step } => {
            let ctx = EvalContext { pdv, arrays };
            let lo_v = match eval(lo, &ctx, diags) {
                Ok(v) => v.as_number().flatten().unwrap_or(0.0),
                Err(e) => return report_eval_error(diags, e),
            };
            let hi_v = match eval(hi, &ctx, diags) {
                Ok(v) => v.as_number().flatten().unwrap_or(0.0),
                Err(e) => return report_eval_error(diags, e),
            };
            let step_v = match step {
                Some(expr) => {
                    let ctx = EvalContext { pdv, arrays };
                    match eval(expr, &ctx, diags) {
                        Ok(v) => v.as_number().flatten().unwrap_or(1.0),
                        Err(e) => return report_eval_error(diags, e),
                    }
                }
                None => 1.0,
            };
            if pdv.get(var).is_none() {
                let _ = pdv.declare_numeric(var);
            }
            if let Some(idx) = pdv.slot_index(var) {
                let mut i = lo_v;
                let mut iterations = 0usize;
                while (step_v > 0.0 && i <= hi_v) || (step_v < 0.0 && i >= hi_v) {
                    pdv.set_value(idx, Value::Number(Some(i)));
                    run_body(pdv);
                    i += step_v;
                    iterations += 1;
                    if iterations >= settings.max_do_iterations {
                        diags.push(Diagnostic::warning(format!(
                            "DO loop over {var} exceeded {} iterations; stopping",
                            settings.max_do_iterations
                        )));
                        break;
                    }
                }
                pdv.set_value(idx, Value::Number(Some(i)));
            }
        }
        DoHeader::While(cond) => {
            let mut iterations = 0usize;
            loop {
                let ctx = EvalContext { pdv, arrays };
                let truthy = match eval(cond, &ctx, diags) {
                    Ok(v) => v.is_truthy(),
                    Err(e) => {
                        report_eval_error(diags, e);
                        break;
                    }
                };
                if !truthy {
                    break;
                }
                run_body(pdv);
                iterations += 1;
                if iterations >= settings.max_do_iterations {
                    diags.push(Diagnostic::warning("DO WHILE exceeded the iteration cap; stopping".to_string()));
                    break;
                }
            }
        }
        DoHeader::Until(cond) => {
            let mut iterations = 0usize;
            loop {
                run_body(pdv);
                iterations += 1;
                let ctx = EvalContext { pdv, arrays };
                let truthy = match eval(cond, &ctx, diags) {
                    Ok(v) => v.is_truthy(),
                    Err(e) => {
                        report_eval_error(diags, e);
                        break;
                    }
                };
                if truthy || iterations >= settings.max_do_iterations {
                    break;
                }
            }
        }
    }
}

fn assign(pdv: &mut Pdv, name: &Identifier, value: Value, diags: &mut Diagnostics) {
    let var_type = match &value {
        Value::Number(_) => VarType::Numeric,
        Value::String(_) => VarType::Character,
    };
    let len = match &value {
        Value::String(s) => s.trim_end().len().max(8),
        Value::Number(_) => 0,
    };
    match pdv.declare(name, var_type, len) {
        Ok(idx) => {
            let value = match var_type {
                VarType::Character => {
                    let declared_len = pdv.get_by_index(idx).unwrap().len;
                    value.pad_to(declared_len)
                }
                VarType::Numeric => value,
            };
            pdv.set_value(idx, value);
        }
        Err(e) => diags.push(Diagnostic::error(e.to_string())),
    }
}

fn report_eval_error(diags: &mut Diagnostics, err: EvalError) {
    diags.push(Diagnostic::warning(err.to_string()));
}

fn gather_set_rows(inputs: &[DatasetRef], env: &Env) -> Result<Vec<Row>, ExecError> {
    let mut rows = Vec::new();
    for input in inputs {
        let dataset = env
            .dataset(&input.member)
            .ok_or_else(|| ExecError::MissingDataset(input.member.to_string()))?;
        rows.extend(dataset.rows.iter().cloned());
    }
    Ok(rows)
}

fn key_of(row: &Row, by: &[Identifier]) -> Vec<Value> {
    by.iter()
        .map(|name| row.get(name).cloned().unwrap_or(Value::missing()))
        .collect()
}

fn keys_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.row_eq(y, 1e-9))
}

fn keys_cmp(a: &[Value], b: &[Value]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.sort_cmp(y);
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

/// Groups rows, assumed already sorted by `by`, into consecutive runs
/// sharing the same key.
fn group_by_key(rows: &[Row], by: &[Identifier]) -> Vec<(Vec<Value>, Vec<&Row>)> {
    let mut groups: Vec<(Vec<Value>, Vec<&Row>)> = Vec::new();
    for row in rows {
        let key = key_of(row, by);
        if let Some((last_key, last_group)) = groups.last_mut() {
            if keys_eq(last_key, &key) {
                last_group.push(row);
                continue;
            }
        }
        groups.push((key, vec![row]));
    }
    groups
}

/// Runs a BY-group match-merge directly, since MERGE interleaves row
/// iteration with body execution per BY-group rather than producing a flat
/// row list up front.
#[allow(clippy::too_many_arguments)]
fn gather_merge_rows(
    inputs: &[DatasetRef],
    by: &[Identifier],
    env: &mut Env,
    pdv: &mut Pdv,
    sink: &mut OutputSink,
    compiled: &Compiled,
    diags: &mut Diagnostics,
    settings: &Settings,
    cancel: &dyn Fn() -> bool,
) -> Result<Vec<Row>, ExecError> {
    let mut datasets = Vec::with_capacity(inputs.len());
    for input in inputs {
        let dataset = env
            .dataset(&input.member)
            .ok_or_else(|| ExecError::MissingDataset(input.member.to_string()))?;
        datasets.push(dataset.clone());
    }

    let groups: Vec<Vec<(Vec<Value>, Vec<&Row>)>> = datasets
        .iter()
        .map(|d| group_by_key(&d.rows, by))
        .collect();
    let mut cursors = vec![0usize; groups.len()];

    loop {
        let mut next_key: Option<Vec<Value>> = None;
        for (i, g) in groups.iter().enumerate() {
            if cursors[i] < g.len() {
                let key = &g[cursors[i]].0;
                next_key = match next_key {
                    Some(best) if keys_cmp(&best, key) != std::cmp::Ordering::Greater => Some(best),
                    _ => Some(key.clone()),
                };
            }
        }
        let Some(key) = next_key else { break };

        let mut iteration_count = 1;
        let mut active: Vec<Option<&[&Row]>> = Vec::with_capacity(groups.len());
        for (i, g) in groups.iter().enumerate() {
            if cursors[i] < g.len() && keys_eq(&g[cursors[i]].0, &key) {
                let rows = g[cursors[i]].1.as_slice();
                iteration_count = iteration_count.max(rows.len());
                active.push(Some(rows));
                cursors[i] += 1;
            } else {
                active.push(None);
            }
        }

        for idx in 0..iteration_count {
            if cancel() {
                return Err(ExecError::Cancelled);
            }
            pdv.reset_for_iteration();
            for (k, name) in by.iter().enumerate() {
                if let Some(slot_idx) = pdv.slot_index(name) {
                    pdv.set_value(slot_idx, key[k].clone());
                }
            }
            for rows in active.iter().flatten() {
                let row = rows.get(idx).or_else(|| rows.last());
                if let Some(row) = row {
                    apply_row(pdv, row);
                }
            }
            let mut emitted = false;
            for stmt in &compiled.actions {
                exec_stmt(stmt, pdv, &compiled.arrays, sink, diags, settings, &mut emitted);
            }
            if !compiled.has_output {
                sink.emit(None, pdv.snapshot());
            }
        }
    }

    Ok(Vec::new())
}

fn gather_datalines_rows(input_vars: &[crate::ast::InputVar], datalines: &[String]) -> Vec<Row> {
    let mut rows = Vec::with_capacity(datalines.len());
    for line in datalines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut cells = Vec::with_capacity(input_vars.len());
        for (i, var) in input_vars.iter().enumerate() {
            let value = if var.is_string {
                Value::String(tokens.get(i).unwrap_or(&"").to_string()).pad_to(8)
            } else {
                Value::Number(tokens.get(i).and_then(|t| t.parse::<f64>().ok()))
            };
            cells.push((var.name.clone(), value));
        }
        rows.push(Row::new(cells));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Expr, InputVar};

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn create_from_scratch_runs_body_once() {
        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("a"))],
            body: vec![Stmt::Assign(id("x"), Expr::NumLit(10.0)), Stmt::Output(None)],
        };
        let mut env = Env::new();
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        run_data_step(&step, &mut env, &settings, &mut diags, &|| false).unwrap();
        let dataset = env.dataset(&id("a")).unwrap();
        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(dataset.rows[0].get(&id("x")).unwrap().as_number(), Some(Some(10.0)));
    }

    #[test]
    fn implicit_output_fires_once_per_iteration_without_explicit_output() {
        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("a"))],
            body: vec![Stmt::Assign(id("x"), Expr::NumLit(1.0))],
        };
        let mut env = Env::new();
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        run_data_step(&step, &mut env, &settings, &mut diags, &|| false).unwrap();
        assert_eq!(env.dataset(&id("a")).unwrap().rows.len(), 1);
    }

    #[test]
    fn do_count_loop_leaves_index_at_hi_plus_step() {
        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("a"))],
            body: vec![
                Stmt::Do {
                    header: DoHeader::Count {
                        var: id("i"),
                        lo: Expr::NumLit(1.0),
                        hi: Expr::NumLit(3.0),
                        step: None,
                    },
                    body: vec![],
                },
                Stmt::Output(None),
            ],
        };
        let mut env = Env::new();
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        run_data_step(&step, &mut env, &settings, &mut diags, &|| false).unwrap();
        let dataset = env.dataset(&id("a")).unwrap();
        assert_eq!(dataset.rows[0].get(&id("i")).unwrap().as_number(), Some(Some(4.0)));
    }

    #[test]
    fn retain_survives_across_input_rows() {
        let mut env = Env::new();
        env.insert_dataset(Dataset::new(
            "input",
            vec![(id("x"), VarType::Numeric, 0)],
        ));
        {
            let dataset = env.dataset_mut(&id("input")).unwrap();
            dataset.rows.push(Row::new(vec![(id("x"), Value::Number(Some(1.0)))]));
            dataset.rows.push(Row::new(vec![(id("x"), Value::Number(Some(2.0)))]));
        }

        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("out"))],
            body: vec![
                Stmt::Set(vec![DatasetRef::bare(id("input"))]),
                Stmt::Retain {
                    name: id("total"),
                    initial: Some(Expr::NumLit(0.0)),
                },
                Stmt::Assign(
                    id("total"),
                    Expr::Binary(BinOp::Add, Box::new(Expr::VarRef(id("total"))), Box::new(Expr::VarRef(id("x")))),
                ),
            ],
        };
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        run_data_step(&step, &mut env, &settings, &mut diags, &|| false).unwrap();
        let dataset = env.dataset(&id("out")).unwrap();
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.rows[0].get(&id("total")).unwrap().as_number(), Some(Some(1.0)));
        assert_eq!(dataset.rows[1].get(&id("total")).unwrap().as_number(), Some(Some(3.0)));
    }

    #[test]
    fn merge_one_to_one_by_key() {
        let mut env = Env::new();
        env.insert_dataset(Dataset::new("a", vec![(id("id"), VarType::Numeric, 0), (id("x"), VarType::Numeric, 0)]));
        env.insert_dataset(Dataset::new("b", vec![(id("id"), VarType::Numeric, 0), (id("y"), VarType::Numeric, 0)]));
        {
            let a = env.dataset_mut(&id("a")).unwrap();
            a.rows.push(Row::new(vec![(id("id"), Value::Number(Some(1.0))), (id("x"), Value::Number(Some(10.0)))]));
            a.rows.push(Row::new(vec![(id("id"), Value::Number(Some(2.0))), (id("x"), Value::Number(Some(20.0)))]));
        }
        {
            let b = env.dataset_mut(&id("b")).unwrap();
            b.rows.push(Row::new(vec![(id("id"), Value::Number(Some(1.0))), (id("y"), Value::Number(Some(100.0)))]));
            b.rows.push(Row::new(vec![(id("id"), Value::Number(Some(2.0))), (id("y"), Value::Number(Some(200.0)))]));
        }

        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("out"))],
            body: vec![Stmt::Merge {
                inputs: vec![DatasetRef::bare(id("a")), DatasetRef::bare(id("b"))],
                by: vec![id("id")],
            }],
        };
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        run_data_step(&step, &mut env, &settings, &mut diags, &|| false).unwrap();
        let dataset = env.dataset(&id("out")).unwrap();
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.rows[0].get(&id("x")).unwrap().as_number(), Some(Some(10.0)));
        assert_eq!(dataset.rows[0].get(&id("y")).unwrap().as_number(), Some(Some(100.0)));
    }

    #[test]
    fn cancellation_discards_in_progress_output() {
        let mut env = Env::new();
        env.insert_dataset(Dataset::new("input", vec![(id("x"), VarType::Numeric, 0)]));
        {
            let dataset = env.dataset_mut(&id("input")).unwrap();
            dataset.rows.push(Row::new(vec![(id("x"), Value::Number(Some(1.0)))]));
            dataset.rows.push(Row::new(vec![(id("x"), Value::Number(Some(2.0)))]));
        }
        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("out"))],
            body: vec![Stmt::Set(vec![DatasetRef::bare(id("input"))])],
        };
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        let err = run_data_step(&step, &mut env, &settings, &mut diags, &|| true).unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert!(env.dataset(&id("out")).is_none());
    }

    #[test]
    fn column_order_follows_set_columns_then_later_declarations() {
        // Mirrors: data in; input x num1 num2 num3; ... data out; set in;
        // retain sum 0; array nums {3} num1 num2 num3; ...
        let mut env = Env::new();
        env.insert_dataset(Dataset::new(
            "in",
            vec![
                (id("x"), VarType::Numeric, 0),
                (id("num1"), VarType::Numeric, 0),
                (id("num2"), VarType::Numeric, 0),
                (id("num3"), VarType::Numeric, 0),
            ],
        ));
        {
            let dataset = env.dataset_mut(&id("in")).unwrap();
            dataset.rows.push(Row::new(vec![
                (id("x"), Value::Number(Some(1.0))),
                (id("num1"), Value::Number(Some(5.0))),
                (id("num2"), Value::Number(Some(10.0))),
                (id("num3"), Value::Number(Some(15.0))),
            ]));
        }

        let step = DataStep {
            outputs: vec![DatasetRef::bare(id("out"))],
            body: vec![
                Stmt::Set(vec![DatasetRef::bare(id("in"))]),
                Stmt::Retain {
                    name: id("sum"),
                    initial: Some(Expr::NumLit(0.0)),
                },
                Stmt::Array {
                    name: id("nums"),
                    size: 3,
                    vars: vec![id("num1"), id("num2"), id("num3")],
                },
            ],
        };
        let settings = Settings::default();
        let mut diags = Diagnostics::new();
        run_data_step(&step, &mut env, &settings, &mut diags, &|| false).unwrap();
        let dataset = env.dataset(&id("out")).unwrap();
        let names: Vec<String> = dataset.columns.iter().map(|(n, ..)| n.to_string()).collect();
        assert_eq!(names, vec!["x", "num1", "num2", "num3", "sum"]);
    }

    #[test]
    fn datalines_input_parses_numeric_and_string_fields() {
        let vars = vec![
            InputVar { name: id("name"), is_string: true },
            InputVar { name: id("score"), is_string: false },
        ];
        let lines = vec!["Alice 90".to_string(), "Bob 85".to_string()];
        let rows = gather_datalines_rows(&vars, &lines);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(&id("score")).unwrap().as_number(), Some(Some(90.0)));
    }
}
