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

//! Parser (C4): recursive descent over the token stream, with precedence
//! climbing for expressions and panic-mode statement recovery, grounded on the per-statement parse loop of `pspp::command.rs`.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error as ThisError;

use crate::ast::*;
use crate::identifier::Identifier;
use crate::message::Point;
use crate::token::{Keyword, Punct, Token, TokenKind};

#[derive(Clone, Debug, ThisError, PartialEq)]
#[error("expected {expected}, got {got:?} at {point}")]
pub struct ParseError {
    pub expected: String,
    pub got: String,
    pub point: Point,
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    datalines: HashMap<usize, Vec<String>>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, datalines: crate::lexer::DatalinesBlocks) -> Self {
        Self {
            tokens,
            datalines: datalines.blocks.into_iter().collect(),
            pos: 0,
        }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        ParseError {
            expected: expected.into(),
            got: format!("{:?}", self.cur().kind),
            point: self.cur().point,
        }
    }

    fn expect_punct(&mut self, punct: Punct) -> PResult<()> {
        if self.cur().is_punct(punct) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("{punct:?}")))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> PResult<()> {
        if self.cur().is_keyword(keyword) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(keyword.as_str()))
        }
    }

    fn accept_punct(&mut self, punct: Punct) -> bool {
        if self.cur().is_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn accept_keyword(&mut self, keyword: Keyword) -> bool {
        if self.cur().is_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Matches an alias keyword not in the formal keyword table (e.g.
    /// `NODUP` for `DUPLICATES`) by case-insensitive text comparison.
    fn accept_word(&mut self, word: &str) -> bool {
        if self.cur().text.eq_ignore_ascii_case(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> PResult<Identifier> {
        match &self.cur().kind {
            TokenKind::Identifier(id) => {
                let id = id.clone();
                self.bump();
                Ok(id)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn expect_string(&mut self) -> PResult<String> {
        match &self.cur().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            _ => Err(self.error("string literal")),
        }
    }

    /// Parses `ident ("." ident)?` into a dataset reference.
    fn parse_dataset_ref(&mut self) -> PResult<DatasetRef> {
        let first = self.expect_identifier()?;
        if self.accept_punct(Punct::Dot) {
            let member = self.expect_identifier()?;
            Ok(DatasetRef {
                libref: Some(first),
                member,
            })
        } else {
            Ok(DatasetRef::bare(first))
        }
    }

    /// Skips to the next statement boundary (`;`) or `RUN`, for panic-mode
    /// recovery.
    fn recover_to_boundary(&mut self) {
        loop {
            if self.cur().is_eof() {
                return;
            }
            if self.cur().is_punct(Punct::Semicolon) {
                self.bump();
                return;
            }
            if self.cur().is_keyword(Keyword::Run) {
                return;
            }
            self.bump();
        }
    }

    pub fn parse_program(mut self) -> (Program, Vec<ParseError>) {
        let mut program = Program::default();
        let mut errors = Vec::new();
        while !self.cur().is_eof() {
            match self.parse_top_stmt() {
                Ok(stmt) => program.statements.push(stmt),
                Err(err) => {
                    errors.push(err);
                    self.recover_to_boundary();
                }
            }
        }
        (program, errors)
    }

    fn parse_top_stmt(&mut self) -> PResult<TopStmt> {
        if self.accept_keyword(Keyword::Libname) {
            let libref = self.expect_identifier()?;
            let path = self.expect_string()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(TopStmt::Libname { libref, path });
        }
        if self.accept_keyword(Keyword::Options) {
            let mut opts = Vec::new();
            while !self.cur().is_punct(Punct::Semicolon) && !self.cur().is_eof() {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Equal)?;
                let value = match &self.cur().kind {
                    TokenKind::String(s) => {
                        let s = s.clone();
                        self.bump();
                        s
                    }
                    TokenKind::Identifier(id) => {
                        let s = id.as_str().to_string();
                        self.bump();
                        s
                    }
                    TokenKind::Number(n) => {
                        let s = n.to_string();
                        self.bump();
                        s
                    }
                    _ => return Err(self.error("option value")),
                };
                opts.push((name, value));
            }
            self.expect_punct(Punct::Semicolon)?;
            return Ok(TopStmt::Options(opts));
        }
        if self.accept_keyword(Keyword::Title) {
            let title = self.expect_string()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(TopStmt::Title(title));
        }
        if self.cur().is_keyword(Keyword::Data) {
            return self.parse_data_step().map(TopStmt::Data);
        }
        if self.cur().is_keyword(Keyword::Proc) {
            return self.parse_proc_step().map(TopStmt::Proc);
        }
        Err(self.error("LIBNAME, OPTIONS, TITLE, DATA, or PROC"))
    }

    fn parse_dataset_ref_list(&mut self) -> PResult<Vec<DatasetRef>> {
        let mut refs = vec![self.parse_dataset_ref()?];
        while self.accept_punct(Punct::Comma) {
            refs.push(self.parse_dataset_ref()?);
        }
        Ok(refs)
    }

    fn parse_data_step(&mut self) -> PResult<DataStep> {
        self.expect_keyword(Keyword::Data)?;
        let outputs = self.parse_dataset_ref_list()?;
        self.expect_punct(Punct::Semicolon)?;
        let mut body = Vec::new();
        loop {
            if self.cur().is_eof() {
                return Err(self.error("RUN"));
            }
            if self.accept_keyword(Keyword::Run) {
                self.expect_punct(Punct::Semicolon)?;
                break;
            }
            body.push(self.parse_data_stmt()?);
        }
        Ok(DataStep { outputs, body })
    }

    fn parse_identifier_list(&mut self) -> PResult<Vec<Identifier>> {
        let mut vars = vec![self.expect_identifier()?];
        while let TokenKind::Identifier(_) = &self.cur().kind {
            vars.push(self.expect_identifier()?);
        }
        Ok(vars)
    }

    fn parse_data_stmt(&mut self) -> PResult<Stmt> {
        if self.accept_keyword(Keyword::Set) {
            let inputs = self.parse_dataset_ref_list()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Set(inputs));
        }
        if self.accept_keyword(Keyword::Merge) {
            let inputs = self.parse_dataset_ref_list()?;
            self.expect_punct(Punct::Semicolon)?;
            self.expect_keyword(Keyword::By)?;
            let by = self.parse_identifier_list()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Merge { inputs, by });
        }
        if self.accept_keyword(Keyword::Input) {
            let mut vars = Vec::new();
            loop {
                let name = self.expect_identifier()?;
                let is_string = self.accept_punct(Punct::Dollar);
                vars.push(InputVar { name, is_string });
                if self.cur().is_punct(Punct::Semicolon) {
                    break;
                }
            }
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Input(vars));
        }
        if self.cur().is_keyword(Keyword::Datalines) {
            let index = self.pos;
            self.bump();
            self.expect_punct(Punct::Semicolon)?;
            let lines = self.datalines.remove(&index).unwrap_or_default();
            return Ok(Stmt::Datalines(lines));
        }
        if self.accept_keyword(Keyword::Length) {
            let name = self.expect_identifier()?;
            let is_string = self.accept_punct(Punct::Dollar);
            let len = match self.cur().as_number() {
                Some(n) => {
                    self.bump();
                    n as usize
                }
                None => 8,
            };
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Length {
                name,
                is_string,
                len,
            });
        }
        if self.accept_keyword(Keyword::Retain) {
            let name = self.expect_identifier()?;
            let initial = if self.cur().is_punct(Punct::Semicolon) {
                None
            } else {
                Some(self.parse_primary_literal()?)
            };
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Retain { name, initial });
        }
        if self.accept_keyword(Keyword::Drop) {
            let vars = self.parse_identifier_list()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Drop(vars));
        }
        if self.accept_keyword(Keyword::Keep) {
            let vars = self.parse_identifier_list()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Keep(vars));
        }
        if self.accept_keyword(Keyword::Array) {
            let name = self.expect_identifier()?;
            self.expect_punct(Punct::LBrace)?;
            let size = self
                .cur()
                .as_number()
                .ok_or_else(|| self.error("array size"))? as usize;
            self.bump();
            self.expect_punct(Punct::RBrace)?;
            let vars = self.parse_identifier_list()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Array { name, size, vars });
        }
        if self.accept_keyword(Keyword::If) {
            let cond = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let then_branch = Box::new(self.parse_single_stmt()?);
            let else_branch = if self.accept_keyword(Keyword::Else) {
                Some(Box::new(self.parse_single_stmt()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                cond,
                then_branch,
                else_branch,
            });
        }
        if self.cur().is_keyword(Keyword::Do) {
            return self.parse_do();
        }
        if self.accept_keyword(Keyword::Output) {
            let dataset = if self.cur().is_punct(Punct::Semicolon) {
                None
            } else {
                Some(self.parse_dataset_ref()?)
            };
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::Output(dataset));
        }
        // Assignment: `name = expr;` or `name{index} = expr;`.
        let name = self.expect_identifier()?;
        if self.accept_punct(Punct::LBrace) {
            let index = self.parse_expr()?;
            self.expect_punct(Punct::RBrace)?;
            self.expect_punct(Punct::Equal)?;
            let value = self.parse_expr()?;
            self.expect_punct(Punct::Semicolon)?;
            return Ok(Stmt::ArrayAssign(name, index, value));
        }
        self.expect_punct(Punct::Equal)?;
        let value = self.parse_expr()?;
        self.expect_punct(Punct::Semicolon)?;
        Ok(Stmt::Assign(name, value))
    }

    /// A statement appearing as the (optional single, non-block) arm of an
    /// `IF ... THEN` / `ELSE`, which may itself be a `DO; ... END;` block.
    fn parse_single_stmt(&mut self) -> PResult<Stmt> {
        if self.cur().is_keyword(Keyword::Do) {
            return self.parse_do();
        }
        self.parse_data_stmt()
    }

    fn parse_do(&mut self) -> PResult<Stmt> {
        self.expect_keyword(Keyword::Do)?;
        let header = if self.accept_keyword(Keyword::While) {
            self.expect_punct(Punct::LParen)?;
            let cond = self.parse_expr()?;
            self.expect_punct(Punct::RParen)?;
            DoHeader::While(cond)
        } else if self.accept_keyword(Keyword::Until) {
            self.expect_punct(Punct::LParen)?;
            let cond = self.parse_expr()?;
            self.expect_punct(Punct::RParen)?;
            DoHeader::Until(cond)
        } else if let TokenKind::Identifier(_) = &self.cur().kind {
            let var = self.expect_identifier()?;
            self.expect_punct(Punct::Equal)?;
            let lo = self.parse_expr()?;
            self.expect_keyword(Keyword::To)?;
            let hi = self.parse_expr()?;
            let step = if self.accept_word("BY") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            DoHeader::Count { var, lo, hi, step }
        } else {
            DoHeader::Block
        };
        self.expect_punct(Punct::Semicolon)?;
        let mut stmts = Vec::new();
        while !self.cur().is_keyword(Keyword::End) {
            if self.cur().is_eof() {
                return Err(self.error("END"));
            }
            stmts.push(self.parse_data_stmt()?);
        }
        self.expect_keyword(Keyword::End)?;
        self.expect_punct(Punct::Semicolon)?;
        Ok(Stmt::Do {
            header,
            body: stmts,
        })
    }

    fn parse_proc_step(&mut self) -> PResult<ProcStep> {
        self.expect_keyword(Keyword::Proc)?;
        if self.accept_keyword(Keyword::Print) {
            let mut print = ProcPrint::default();
            self.parse_proc_head(&mut print.data, &mut None)?;
            self.expect_punct(Punct::Semicolon)?;
            loop {
                if self.accept_keyword(Keyword::Run) {
                    self.expect_punct(Punct::Semicolon)?;
                    break;
                }
                if self.accept_keyword(Keyword::Var) {
                    print.var = self.parse_identifier_list()?;
                    self.expect_punct(Punct::Semicolon)?;
                } else if self.accept_word("OBS") {
                    self.expect_punct(Punct::Equal)?;
                    let n = self.cur().as_number().ok_or_else(|| self.error("OBS= value"))?;
                    self.bump();
                    print.obs = Some(n as usize);
                    self.expect_punct(Punct::Semicolon)?;
                } else {
                    return Err(self.error("VAR, OBS=, or RUN"));
                }
            }
            return Ok(ProcStep::Print(print));
        }
        if self.accept_keyword(Keyword::Sort) {
            let mut sort = ProcSort::default();
            let mut out = None;
            self.parse_proc_head(&mut sort.data, &mut out)?;
            sort.out = out;
            while self.accept_keyword(Keyword::Nodupkey) {
                sort.nodupkey = true;
            }
            if self.accept_keyword(Keyword::Duplicates) || self.accept_word("NODUP") {
                sort.duplicates = true;
            }
            self.expect_punct(Punct::Semicolon)?;
            loop {
                if self.accept_keyword(Keyword::Run) {
                    self.expect_punct(Punct::Semicolon)?;
                    break;
                }
                if self.accept_keyword(Keyword::By) {
                    sort.by = self.parse_identifier_list()?;
                    self.expect_punct(Punct::Semicolon)?;
                } else if self.accept_keyword(Keyword::Where) {
                    sort.where_ = Some(self.parse_expr()?);
                    self.expect_punct(Punct::Semicolon)?;
                } else {
                    return Err(self.error("BY, WHERE, or RUN"));
                }
            }
            return Ok(ProcStep::Sort(sort));
        }
        Err(self.error("PRINT or SORT"))
    }

    /// Parses the `DATA=`/`OUT=`/`NODUPKEY` clauses that precede the first
    /// `;` of a PROC step.
    fn parse_proc_head(
        &mut self,
        data: &mut Option<DatasetRef>,
        out: &mut Option<DatasetRef>,
    ) -> PResult<()> {
        loop {
            if self.accept_word("DATA") {
                self.expect_punct(Punct::Equal)?;
                *data = Some(self.parse_dataset_ref()?);
            } else if self.accept_keyword(Keyword::Out) {
                self.expect_punct(Punct::Equal)?;
                *out = Some(self.parse_dataset_ref()?);
            } else if self.cur().is_keyword(Keyword::Nodupkey) {
                // Handled by caller (only meaningful for PROC SORT); stop
                // consuming head clauses once we see it.
                break;
            } else {
                break;
            }
        }
        // NODUPKEY belongs to PROC SORT only; swallow it here if present so
        // both proc bodies share this head parser.
        Ok(())
    }

    // ---- Expressions: OR, AND, NOT (prefix), comparison, additive,
    // multiplicative, unary minus, power, postfix call/index, primary. ----

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.cur().is_punct(Punct::Or) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.cur().is_punct(Punct::And) {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.cur().is_punct(Punct::Not) {
            self.bump();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.cur().kind {
            TokenKind::Punct(Punct::Lt) => Some(BinOp::Lt),
            TokenKind::Punct(Punct::Le) => Some(BinOp::Le),
            TokenKind::Punct(Punct::Gt) => Some(BinOp::Gt),
            TokenKind::Punct(Punct::Ge) => Some(BinOp::Ge),
            TokenKind::Punct(Punct::EqEq) => Some(BinOp::Eq),
            TokenKind::Punct(Punct::Ne) => Some(BinOp::Ne),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let rhs = self.parse_additive()?;
            return Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Punct(Punct::Plus) => BinOp::Add,
                TokenKind::Punct(Punct::Minus) => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Punct(Punct::Star) => BinOp::Mul,
                TokenKind::Punct(Punct::Slash) => BinOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.cur().is_punct(Punct::Minus) {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.cur().is_punct(Punct::Plus) {
            self.bump();
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if self.cur().is_punct(Punct::Star) && self.tokens.get(self.pos + 1).is_some_and(|t| t.is_punct(Punct::Star)) {
            self.bump();
            self.bump();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let primary = self.parse_primary()?;
        if let Expr::VarRef(name) = &primary {
            if self.cur().is_punct(Punct::LBrace) {
                self.bump();
                let index = self.parse_expr()?;
                self.expect_punct(Punct::RBrace)?;
                return Ok(Expr::ArrayRef(name.clone(), Box::new(index)));
            }
            if self.cur().is_punct(Punct::LParen) {
                self.bump();
                let mut args = Vec::new();
                if !self.cur().is_punct(Punct::RParen) {
                    args.push(self.parse_expr()?);
                    while self.accept_punct(Punct::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect_punct(Punct::RParen)?;
                return Ok(Expr::Call(name.clone(), args));
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match &self.cur().kind {
            TokenKind::Number(n) => {
                let n = *n;
                self.bump();
                Ok(Expr::NumLit(n))
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.bump();
                Ok(Expr::StrLit(s))
            }
            TokenKind::Identifier(id) => {
                let id = id.clone();
                self.bump();
                Ok(Expr::VarRef(id))
            }
            TokenKind::Punct(Punct::LParen) => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect_punct(Punct::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error("expression")),
        }
    }

    /// A restricted primary used for `RETAIN var initial;` initializers,
    /// which are always a bare literal, never a full expression.
    fn parse_primary_literal(&mut self) -> PResult<Expr> {
        self.parse_primary()
    }
}

impl Display for DatasetRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if let Some(libref) = &self.libref {
            write!(f, "{libref}.{}", self.member)
        } else {
            write!(f, "{}", self.member)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Program, Vec<ParseError>) {
        let (tokens, blocks) = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens, blocks).parse_program()
    }

    #[test]
    fn simple_data_step() {
        let (program, errors) = parse("data out; a = 10; output; run;");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(program.statements.len(), 1);
        let TopStmt::Data(step) = &program.statements[0] else {
            panic!("expected DataStep");
        };
        assert_eq!(step.outputs, vec![DatasetRef::bare(Identifier::new("out").unwrap())]);
        assert_eq!(step.body.len(), 2);
    }

    #[test]
    fn precedence_climbing() {
        let (program, errors) = parse("data a; x = 1 + 2 * 3; run;");
        assert!(errors.is_empty());
        let TopStmt::Data(step) = &program.statements[0] else {
            panic!()
        };
        let Stmt::Assign(_, expr) = &step.body[0] else {
            panic!()
        };
        assert_eq!(
            *expr,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::NumLit(1.0)),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::NumLit(2.0)),
                    Box::new(Expr::NumLit(3.0))
                ))
            )
        );
    }

    #[test]
    fn recovers_after_malformed_step() {
        let (program, errors) = parse("data a; x = ; run; data b; y = 1; output; run;");
        assert_eq!(errors.len(), 1);
        assert_eq!(program.statements.len(), 1);
        let TopStmt::Data(step) = &program.statements[0] else {
            panic!()
        };
        assert_eq!(step.outputs[0].member.as_str(), "b");
    }

    #[test]
    fn proc_sort_nodupkey() {
        let (program, errors) = parse("proc sort data=in out=out nodupkey; by x; run;");
        assert!(errors.is_empty(), "{errors:?}");
        let TopStmt::Proc(ProcStep::Sort(sort)) = &program.statements[0] else {
            panic!()
        };
        assert!(sort.nodupkey);
        assert_eq!(sort.by.len(), 1);
    }
}
