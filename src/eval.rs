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

//! Expression evaluator (C6): a pure function from AST expression and PDV to
//! a [Value], plus the built-in function table.

use std::collections::HashMap;

use chrono::NaiveDate;
use thiserror::Error as ThisError;

use crate::ast::{BinOp, Expr, UnaryOp};
use crate::identifier::Identifier;
use crate::message::{Diagnostic, Diagnostics};
use crate::pdv::Pdv;
use crate::value::Value;

/// An array binding: `name {size} var1 ... varN`.
#[derive(Clone, Debug)]
pub struct ArrayBinding {
    pub size: usize,
    pub vars: Vec<Identifier>,
}

#[derive(Clone, Debug, ThisError, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivideByZero,
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("{0} is out of domain for {1}")]
    DomainError(f64, String),
    #[error("array index {0} is out of range for array {1} of size {2}")]
    ArrayOutOfRange(f64, String, usize),
    #[error("reference to undefined array {0}")]
    UndefinedArray(String),
    #[error("reference to undefined variable {0}")]
    UndefinedVariable(String),
    #[error("wrong number of arguments to {0}")]
    ArgCount(String),
    #[error("unknown date interval {0}")]
    UnknownInterval(String),
}

/// The evaluation context: the current PDV plus any array bindings declared
/// in the enclosing DATA step.
pub struct EvalContext<'a> {
    pub pdv: &'a Pdv,
    pub arrays: &'a HashMap<Identifier, ArrayBinding>,
}

/// SAS-epoch date, day 0 = 1960-01-01.
fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1960, 1, 1).unwrap()
}

pub fn eval(expr: &Expr, ctx: &EvalContext, diags: &mut Diagnostics) -> Result<Value, EvalError> {
    match expr {
        Expr::NumLit(n) => Ok(Value::Number(Some(*n))),
        Expr::StrLit(s) => Ok(Value::String(s.clone())),
        Expr::VarRef(name) => match ctx.pdv.get(name) {
            Some(slot) => Ok(slot.value.clone()),
            None => Err(EvalError::UndefinedVariable(name.to_string())),
        },
        Expr::ArrayRef(name, index_expr) => {
            let binding = ctx
                .arrays
                .get(name)
                .ok_or_else(|| EvalError::UndefinedArray(name.to_string()))?;
            let index = as_number(&eval(index_expr, ctx, diags)?, diags);
            let i = index.unwrap_or(f64::NAN);
            if !(1.0..=binding.size as f64).contains(&i) || i.fract() != 0.0 {
                return Err(EvalError::ArrayOutOfRange(i, name.to_string(), binding.size));
            }
            let var = &binding.vars[i as usize - 1];
            ctx.pdv
                .get(var)
                .map(|slot| slot.value.clone())
                .ok_or_else(|| EvalError::UndefinedVariable(var.to_string()))
        }
        Expr::Unary(op, operand) => {
            let v = eval(operand, ctx, diags)?;
            match op {
                UnaryOp::Neg => Ok(Value::Number(as_number(&v, diags).map(|n| -n))),
                UnaryOp::Not => Ok(Value::Number(Some(if v.is_truthy() { 0.0 } else { 1.0 }))),
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(op, lhs, rhs, ctx, diags),
        Expr::Call(name, args) => eval_call(name, args, ctx, diags),
    }
}

/// Promotes a value to a number: strings attempt parse; a non-parseable
/// string yields missing plus a recorded warning.
fn as_number(value: &Value, diags: &mut Diagnostics) -> Option<f64> {
    match value {
        Value::Number(n) => *n,
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Some(n),
            Err(_) => {
                if !s.trim().is_empty() {
                    diags.push(Diagnostic::warning(format!(
                        "cannot convert {s:?} to a number; treating as missing"
                    )));
                }
                None
            }
        },
    }
}

fn eval_binary(
    op: &BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &EvalContext,
    diags: &mut Diagnostics,
) -> Result<Value, EvalError> {
    match op {
        BinOp::And => {
            let l = eval(lhs, ctx, diags)?;
            if !l.is_truthy() {
                return Ok(Value::Number(Some(0.0)));
            }
            let r = eval(rhs, ctx, diags)?;
            return Ok(Value::Number(Some(f64::from(r.is_truthy()))));
        }
        BinOp::Or => {
            let l = eval(lhs, ctx, diags)?;
            if l.is_truthy() {
                return Ok(Value::Number(Some(1.0)));
            }
            let r = eval(rhs, ctx, diags)?;
            return Ok(Value::Number(Some(f64::from(r.is_truthy()))));
        }
        _ => {}
    }

    let l = eval(lhs, ctx, diags)?;
    let r = eval(rhs, ctx, diags)?;

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
            let (ln, rn) = (as_number(&l, diags), as_number(&r, diags));
            let result = match (ln, rn) {
                (Some(a), Some(b)) => match op {
                    BinOp::Add => Some(a + b),
                    BinOp::Sub => Some(a - b),
                    BinOp::Mul => Some(a * b),
                    BinOp::Div => {
                        if b == 0.0 {
                            return Err(EvalError::DivideByZero);
                        }
                        Some(a / b)
                    }
                    BinOp::Pow => Some(a.powf(b)),
                    _ => unreachable!(),
                },
                _ => None,
            };
            Ok(Value::Number(result))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
            let truth = compare(&l, &r, diags, op);
            Ok(Value::Number(Some(f64::from(truth))))
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

/// String-vs-string compares after right-trim to the shorter declared
/// length; otherwise numeric with epsilon.
fn compare(l: &Value, r: &Value, diags: &mut Diagnostics, op: &BinOp) -> bool {
    const EPSILON: f64 = 1e-9;
    let ordering = match (l, r) {
        (Value::String(a), Value::String(b)) => {
            let shorter = a.trim_end().len().min(b.trim_end().len());
            let at = &a.trim_end()[..shorter.min(a.trim_end().len())];
            let bt = &b.trim_end()[..shorter.min(b.trim_end().len())];
            at.cmp(bt)
        }
        _ => {
            let a = as_number(l, diags).unwrap_or(f64::NAN);
            let b = as_number(r, diags).unwrap_or(f64::NAN);
            if (a - b).abs() <= EPSILON {
                std::cmp::Ordering::Equal
            } else {
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Less)
            }
        }
    };
    match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        BinOp::Eq => ordering.is_eq(),
        BinOp::Ne => ordering.is_ne(),
        _ => unreachable!(),
    }
}

fn eval_call(
    name: &Identifier,
    args: &[Expr],
    ctx: &EvalContext,
    diags: &mut Diagnostics,
) -> Result<Value, EvalError> {
    let fname = name.as_str().to_ascii_lowercase();
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, ctx, diags)?);
    }

    macro_rules! num_arg {
        ($i:expr) => {
            as_number(&values[$i], diags)
        };
    }

    match fname.as_str() {
        "sqrt" => unary_math(&values, diags, &fname, |x| {
            if x < 0.0 {
                Err(EvalError::DomainError(x, "sqrt".into()))
            } else {
                Ok(x.sqrt())
            }
        }),
        "abs" => unary_math(&values, diags, &fname, |x| Ok(x.abs())),
        "log" => unary_math(&values, diags, &fname, |x| {
            if x <= 0.0 {
                Err(EvalError::DomainError(x, "log".into()))
            } else {
                Ok(x.ln())
            }
        }),
        "log10" => unary_math(&values, diags, &fname, |x| {
            if x <= 0.0 {
                Err(EvalError::DomainError(x, "log10".into()))
            } else {
                Ok(x.log10())
            }
        }),
        "exp" => unary_math(&values, diags, &fname, |x| Ok(x.exp())),
        "ceil" => unary_math(&values, diags, &fname, |x| Ok(x.ceil())),
        "floor" => unary_math(&values, diags, &fname, |x| Ok(x.floor())),
        "round" => {
            if values.len() == 1 {
                unary_math(&values, diags, &fname, |x| Ok(x.round()))
            } else if values.len() == 2 {
                let x = num_arg!(0);
                let unit = num_arg!(1);
                Ok(Value::Number(match (x, unit) {
                    (Some(x), Some(unit)) if unit != 0.0 => Some((x / unit).round() * unit),
                    (Some(x), _) => Some(x),
                    _ => None,
                }))
            } else {
                Err(EvalError::ArgCount("round".into()))
            }
        }
        "substr" => {
            if values.len() < 2 || values.len() > 3 {
                return Err(EvalError::ArgCount("substr".into()));
            }
            let s = values[0].as_str().unwrap_or("").to_string();
            let start = num_arg!(1).unwrap_or(1.0).max(1.0) as usize;
            let chars: Vec<char> = s.chars().collect();
            let begin = (start - 1).min(chars.len());
            let len = if values.len() == 3 {
                num_arg!(2).unwrap_or(0.0).max(0.0) as usize
            } else {
                chars.len().saturating_sub(begin)
            };
            let end = (begin + len).min(chars.len());
            Ok(Value::String(chars[begin..end].iter().collect()))
        }
        "trim" => {
            let s = values.first().and_then(|v| v.as_str()).unwrap_or("");
            Ok(Value::String(s.trim_end().to_string()))
        }
        "upcase" => {
            let s = values.first().and_then(|v| v.as_str()).unwrap_or("");
            Ok(Value::String(s.to_ascii_uppercase()))
        }
        "lowcase" => {
            let s = values.first().and_then(|v| v.as_str()).unwrap_or("");
            Ok(Value::String(s.to_ascii_lowercase()))
        }
        "today" => {
            let days = (chrono::Local::now().date_naive() - epoch()).num_days();
            Ok(Value::Number(Some(days as f64)))
        }
        "intck" => {
            if values.len() != 3 {
                return Err(EvalError::ArgCount("intck".into()));
            }
            let interval = values[0].as_str().unwrap_or("").to_string();
            let a = num_arg!(1);
            let b = num_arg!(2);
            intck(&interval, a, b)
        }
        "intnx" => {
            if values.len() < 3 || values.len() > 4 {
                return Err(EvalError::ArgCount("intnx".into()));
            }
            let interval = values[0].as_str().unwrap_or("").to_string();
            let a = num_arg!(1);
            let n = num_arg!(2).unwrap_or(0.0) as i64;
            intnx(&interval, a, n)
        }
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn unary_math(
    values: &[Value],
    diags: &mut Diagnostics,
    name: &str,
    f: impl Fn(f64) -> Result<f64, EvalError>,
) -> Result<Value, EvalError> {
    if values.len() != 1 {
        return Err(EvalError::ArgCount(name.to_string()));
    }
    match as_number(&values[0], diags) {
        Some(x) => Ok(Value::Number(Some(f(x)?))),
        None => Ok(Value::missing()),
    }
}

fn day_to_date(day: f64) -> NaiveDate {
    epoch() + chrono::Duration::days(day as i64)
}

fn intck(interval: &str, a: Option<f64>, b: Option<f64>) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(Value::missing());
    };
    let (a, b) = (day_to_date(a), day_to_date(b));
    let count = match interval.to_ascii_lowercase().as_str() {
        "day" => (b - a).num_days(),
        "week" => (b - a).num_days() / 7,
        "month" => {
            ((b.year() - a.year()) as i64) * 12 + (b.month() as i64 - a.month() as i64)
        }
        "year" => (b.year() - a.year()) as i64,
        other => return Err(EvalError::UnknownInterval(other.to_string())),
    };
    Ok(Value::Number(Some(count as f64)))
}

fn intnx(interval: &str, a: Option<f64>, n: i64) -> Result<Value, EvalError> {
    use chrono::Datelike;
    let Some(a) = a else {
        return Ok(Value::missing());
    };
    let date = day_to_date(a);
    let result = match interval.to_ascii_lowercase().as_str() {
        "day" => date + chrono::Duration::days(n),
        "week" => date + chrono::Duration::days(n * 7),
        "month" => {
            let total_months = date.year() * 12 + (date.month() as i32 - 1) + n as i32;
            let year = total_months.div_euclid(12);
            let month = total_months.rem_euclid(12) + 1;
            NaiveDate::from_ymd_opt(year, month as u32, 1).unwrap()
        }
        "year" => NaiveDate::from_ymd_opt(date.year() + n as i32, date.month(), 1).unwrap(),
        other => return Err(EvalError::UnknownInterval(other.to_string())),
    };
    let days = (result - epoch()).num_days();
    Ok(Value::Number(Some(days as f64)))
}

use chrono::Datelike;
