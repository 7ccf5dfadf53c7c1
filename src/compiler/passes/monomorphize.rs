//! Monomorphization pass.
//!
//! Specializes a polymorphic function by replacing its type variables (`T`) and context
//! variables (`real[R]`) with concrete annotations. The substitution is either given
//! explicitly or derived by matching the parameter annotations against concrete argument
//! types; both can be combined, in which case they must agree.
//!
//! # Example
//!
//! With `T := real` and `R := IEEEContext(8, 32, RNE)`:
//!
//! ```text
//! def f(x: T, y: real[R]):       def f(x: real, y: real[IEEEContext(8, 32, RNE)]):
//!     z: T = x                       z: real = x
//!     return z + y                   return z + y
//! ```
//!
//! Variables the substitution does not mention stay polymorphic. The result is type checked,
//! so a substitution the body cannot accept is reported as a [`Error::TypeConflict`].

use std::collections::BTreeMap;

use crate::{
    analysis::TypeInfer,
    ast::{fold, Context, ContextAnn, Fold, FuncDef, NodeId, Stmt, StmtKind, Symbol, TypeAnn},
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Error, Result,
};

/// Monomorphization pass.
#[derive(Debug, Clone, Default)]
pub struct Monomorphize {
    types: BTreeMap<Symbol, TypeAnn>,
    contexts: BTreeMap<Symbol, Context>,
    arg_types: Option<Vec<TypeAnn>>,
}

/// A type and context substitution.
#[derive(Debug, Default)]
struct Subst {
    types: BTreeMap<Symbol, TypeAnn>,
    contexts: BTreeMap<Symbol, Context>,
}

impl Subst {
    fn bind_type(&mut self, var: &Symbol, ty: &TypeAnn, site: NodeId) -> Result<()> {
        match self.types.get(var) {
            Some(existing) if existing != ty => Err(Error::TypeConflict {
                site,
                expected: existing.to_string(),
                actual: ty.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.types.insert(var.clone(), ty.clone());
                Ok(())
            }
        }
    }

    fn bind_context(&mut self, var: &Symbol, ctx: &Context, site: NodeId) -> Result<()> {
        match self.contexts.get(var) {
            Some(existing) if existing != ctx => Err(Error::ContextConflict {
                site,
                first: existing.to_string(),
                second: ctx.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.contexts.insert(var.clone(), ctx.clone());
                Ok(())
            }
        }
    }

    /// Matches a declared annotation against a concrete one, extending the substitution.
    fn unify(&mut self, declared: &TypeAnn, concrete: &TypeAnn, site: NodeId) -> Result<()> {
        match (declared, concrete) {
            (TypeAnn::Any, _) | (_, TypeAnn::Any) => Ok(()),
            (TypeAnn::Var(var), ty) => self.bind_type(var, ty, site),
            (TypeAnn::Real(declared), TypeAnn::Real(concrete)) => match (declared, concrete) {
                (ContextAnn::Var(var), ContextAnn::Known(ctx)) => {
                    self.bind_context(var, ctx, site)
                }
                (ContextAnn::Known(a), ContextAnn::Known(b)) if a != b => {
                    Err(Error::ContextConflict {
                        site,
                        first: a.to_string(),
                        second: b.to_string(),
                    })
                }
                _ => Ok(()),
            },
            (TypeAnn::Tuple(declared), TypeAnn::Tuple(concrete)) => {
                if declared.len() != concrete.len() {
                    return Err(Error::ArityMismatch {
                        site,
                        expected: declared.len(),
                        actual: concrete.len(),
                    });
                }
                for (d, c) in declared.iter().zip(concrete) {
                    self.unify(d, c, site)?;
                }
                Ok(())
            }
            (TypeAnn::List(declared), TypeAnn::List(concrete)) => {
                self.unify(declared, concrete, site)
            }
            (declared, concrete) if declared == concrete => Ok(()),
            (declared, concrete) => Err(Error::TypeConflict {
                site,
                expected: declared.to_string(),
                actual: concrete.to_string(),
            }),
        }
    }

    fn apply(&self, ann: &TypeAnn) -> TypeAnn {
        match ann {
            TypeAnn::Var(var) => self.types.get(var).cloned().unwrap_or_else(|| ann.clone()),
            TypeAnn::Real(ContextAnn::Var(var)) => match self.contexts.get(var) {
                Some(ctx) => TypeAnn::Real(ContextAnn::Known(ctx.clone())),
                None => ann.clone(),
            },
            TypeAnn::Tuple(elts) => TypeAnn::Tuple(elts.iter().map(|elt| self.apply(elt)).collect()),
            TypeAnn::List(elt) => TypeAnn::List(Box::new(self.apply(elt))),
            _ => ann.clone(),
        }
    }
}

impl Monomorphize {
    /// Creates a pass substituting the given type variables.
    #[must_use]
    pub fn with_types(types: BTreeMap<Symbol, TypeAnn>) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    /// Creates a pass deriving the substitution from concrete argument types, one per
    /// parameter.
    #[must_use]
    pub fn from_arg_types(arg_types: Vec<TypeAnn>) -> Self {
        Self {
            arg_types: Some(arg_types),
            ..Self::default()
        }
    }

    /// Adds context variable bindings.
    #[must_use]
    pub fn with_contexts(mut self, contexts: BTreeMap<Symbol, Context>) -> Self {
        self.contexts = contexts;
        self
    }

    fn subst(&self, func: &FuncDef) -> Result<Subst> {
        let mut subst = Subst::default();
        for (var, ty) in &self.types {
            subst.bind_type(var, ty, func.id)?;
        }
        for (var, ctx) in &self.contexts {
            subst.bind_context(var, ctx, func.id)?;
        }
        if let Some(arg_types) = &self.arg_types {
            if arg_types.len() != func.args.len() {
                return Err(Error::ArityMismatch {
                    site: func.id,
                    expected: func.args.len(),
                    actual: arg_types.len(),
                });
            }
            for (arg, concrete) in func.args.iter().zip(arg_types) {
                if let Some(declared) = &arg.ann {
                    subst.unify(declared, concrete, arg.id)?;
                }
            }
        }
        Ok(subst)
    }
}

impl Pass for Monomorphize {
    fn name(&self) -> &'static str {
        "monomorphize"
    }

    fn description(&self) -> &'static str {
        "Replaces type and context variables with concrete annotations"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let subst = self.subst(func)?;
        let changes = EventLog::new();
        let mut out = func.clone();
        for arg in &mut out.args {
            let Some(ann) = &arg.ann else {
                continue;
            };
            let concrete = subst.apply(ann);
            if concrete != *ann {
                changes
                    .record(EventKind::Monomorphized)
                    .at(&func.name, arg.id)
                    .pass(self.name())
                    .message(format!("{ann} -> {concrete}"));
                arg.ann = Some(concrete);
            }
        }
        let mut specializer = Specializer {
            subst: &subst,
            func: &func.name,
            changes: &changes,
            pass: self.name(),
        };
        let out = specializer.fold_func(out)?;
        if !changes.is_empty() {
            TypeInfer::check(&out)?;
        }
        finish(self.name(), out, changes, ctx)
    }
}

struct Specializer<'a> {
    subst: &'a Subst,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

impl Fold for Specializer<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let mut stmt = fold::fold_stmt(self, stmt)?;
        if let StmtKind::Assign { ann: Some(ann), .. } = &mut stmt.kind {
            let concrete = self.subst.apply(ann);
            if concrete != *ann {
                self.changes
                    .record(EventKind::Monomorphized)
                    .at(self.func, stmt.id)
                    .pass(self.pass)
                    .message(format!("{ann} -> {concrete}"));
                *ann = concrete;
            }
        }
        Ok(vec![stmt])
    }
}
