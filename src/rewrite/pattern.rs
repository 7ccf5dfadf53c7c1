//! Rewrite patterns.
//!
//! A pattern is built from a pattern function. Its parameters are the pattern variables, which
//! capture arbitrary subtrees when matched. Every other identifier in the body is a free name:
//! the matcher maps free names to target names consistently and injectively, and the applier
//! gives free names of a right-hand side that the match never saw a fresh identity.
//!
//! Two shapes are accepted:
//!
//! - an expression pattern, whose body is a single effect statement
//! - a statement pattern, whose body is matched as a window of consecutive statements
//!
//! Call targets are matched by identity and never treated as free names.

use std::collections::BTreeSet;

use crate::{
    ast::{
        names::{bound_names, referenced_names},
        Block, Expr, FuncDef, Id, NamedId, Stmt, StmtKind, Symbol,
    },
    Error, Result,
};

/// What a pattern matches.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// A single expression, matched at any expression position
    Expr(Expr),
    /// A sequence of statements, matched against consecutive statements of a block
    Stmts(Vec<Stmt>),
}

/// A matchable syntactic skeleton with pattern variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    name: Symbol,
    vars: Vec<NamedId>,
    free: BTreeSet<NamedId>,
    kind: PatternKind,
}

impl Pattern {
    /// Builds a pattern from a function: an expression pattern when the body is one effect
    /// statement, a statement pattern otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] when a parameter is the wildcard or repeated.
    pub fn from_func(func: &FuncDef) -> Result<Self> {
        match func.body.stmts.as_slice() {
            [Stmt {
                kind: StmtKind::Effect(_),
                ..
            }] => Self::from_expr_func(func),
            _ => Self::from_stmt_func(func),
        }
    }

    /// Builds an expression pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] when the body is not a single effect statement or a
    /// parameter is the wildcard or repeated.
    pub fn from_expr_func(func: &FuncDef) -> Result<Self> {
        let vars = pattern_vars(func)?;
        let expr = match func.body.stmts.as_slice() {
            [Stmt {
                kind: StmtKind::Effect(expr),
                ..
            }] => expr.clone(),
            _ => {
                return Err(invalid(
                    &func.name,
                    "an expression pattern needs a single effect statement",
                ))
            }
        };
        let block = Block::new(vec![Stmt::effect(expr.clone())]);
        Ok(Self::build(
            func.name.clone(),
            vars,
            &block,
            PatternKind::Expr(expr),
        ))
    }

    /// Builds a statement pattern from the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an empty body or a wildcard or repeated parameter.
    pub fn from_stmt_func(func: &FuncDef) -> Result<Self> {
        let vars = pattern_vars(func)?;
        if func.body.is_empty() {
            return Err(invalid(&func.name, "a statement pattern needs a body"));
        }
        Ok(Self::build(
            func.name.clone(),
            vars,
            &func.body,
            PatternKind::Stmts(func.body.stmts.clone()),
        ))
    }

    fn build(name: Symbol, vars: Vec<NamedId>, block: &Block, kind: PatternKind) -> Self {
        let mut free = bound_names(block);
        free.extend(referenced_names(block));
        for var in &vars {
            free.remove(var);
        }
        Self {
            name,
            vars,
            free,
            kind,
        }
    }

    /// The pattern function name.
    #[must_use]
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Pattern variables, in parameter order.
    #[must_use]
    pub fn vars(&self) -> &[NamedId] {
        &self.vars
    }

    /// Returns `true` if `name` is a pattern variable.
    #[must_use]
    pub fn is_var(&self, name: &NamedId) -> bool {
        self.vars.contains(name)
    }

    /// Names of the pattern that are neither pattern variables nor call targets.
    #[must_use]
    pub fn free_names(&self) -> &BTreeSet<NamedId> {
        &self.free
    }

    /// Returns `true` if `name` is a free name of the pattern.
    #[must_use]
    pub fn is_free(&self, name: &NamedId) -> bool {
        self.free.contains(name)
    }

    /// The pattern body.
    #[must_use]
    pub const fn kind(&self) -> &PatternKind {
        &self.kind
    }

    /// Returns `true` for an expression pattern.
    #[must_use]
    pub const fn is_expr(&self) -> bool {
        matches!(self.kind, PatternKind::Expr(_))
    }

    /// Number of statements a statement pattern spans; zero for expression patterns.
    #[must_use]
    pub fn window(&self) -> usize {
        match &self.kind {
            PatternKind::Expr(_) => 0,
            PatternKind::Stmts(stmts) => stmts.len(),
        }
    }
}

fn invalid(name: &Symbol, reason: &str) -> Error {
    Error::InvalidPattern {
        name: name.clone(),
        reason: reason.to_string(),
    }
}

fn pattern_vars(func: &FuncDef) -> Result<Vec<NamedId>> {
    let mut vars = Vec::with_capacity(func.args.len());
    for arg in &func.args {
        let Id::Named(name) = &arg.name else {
            return Err(invalid(&func.name, "pattern variables cannot be `_`"));
        };
        if vars.contains(name) {
            return Err(invalid(
                &func.name,
                &format!("pattern variable `{name}` is repeated"),
            ));
        }
        vars.push(name.clone());
    }
    Ok(vars)
}
