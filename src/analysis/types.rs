//! Type inference.
//!
//! A light Hindley-Milner inference over FPy's small type language:
//!
//! ```text
//! t ::= bool | real | context | tuple[t, ...] | list[t] | (t, ...) -> t | 'n
//! ```
//!
//! Every definition gets one monomorphic type; φ-definitions are unified with both operands.
//! Operators map to fixed signatures (see [`op_signature`]). Calls to user-defined functions
//! infer the callee first and instantiate its signature with fresh variables, so a polymorphic
//! helper can be called at different types. Annotations constrain parameters and assignments;
//! annotation type variables with the same name share one inference variable within a function.
//!
//! Unification is structural with an occurs check. Failures surface as
//! [`crate::Error::TypeConflict`] carrying the node being typed, and tuple destructuring or
//! call arity errors as [`crate::Error::ArityMismatch`].

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use crate::{
    analysis::defuse::{DefineUse, DefineUseAnalysis},
    analysis::defs::{DefId, DefSite, Definition},
    ast::{
        BinaryOpKind, Binding, Block, Callee, CompareOp, Expr, ExprKind, ForeignValue, FuncDef,
        Id, NaryOpKind, NodeId, Stmt, StmtKind, Symbol, TernaryOpKind, TypeAnn, UnaryOpKind,
    },
    error::invariant_error,
    Error, Result,
};

/// An inference variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub(crate) usize);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'t{}", self.0)
    }
}

/// An FPy type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean
    Bool,
    /// Real number, under whatever rounding context applies
    Real,
    /// Rounding context value
    Context,
    /// Fixed-length heterogeneous tuple
    Tuple(Vec<Type>),
    /// Homogeneous list
    List(Box<Type>),
    /// Function from parameter types to a result type
    Function(Vec<Type>, Box<Type>),
    /// Not yet determined
    Var(TypeVar),
}

impl Type {
    /// Shorthand for `list[elt]`.
    #[must_use]
    pub fn list(elt: Type) -> Self {
        Self::List(Box::new(elt))
    }

    /// Shorthand for `(params) -> ret`.
    #[must_use]
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::Function(params, Box::new(ret))
    }

    /// Returns `true` if no type variable occurs in the type.
    #[must_use]
    pub fn is_monomorphic(&self) -> bool {
        self.vars().is_empty()
    }

    /// Every type variable occurring in the type.
    #[must_use]
    pub fn vars(&self) -> BTreeSet<TypeVar> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<TypeVar>) {
        match self {
            Self::Var(v) => {
                vars.insert(*v);
            }
            Self::Tuple(elts) => elts.iter().for_each(|t| t.collect_vars(vars)),
            Self::List(elt) => elt.collect_vars(vars),
            Self::Function(params, ret) => {
                params.iter().for_each(|t| t.collect_vars(vars));
                ret.collect_vars(vars);
            }
            Self::Bool | Self::Real | Self::Context => {}
        }
    }

    /// Converts back into an annotation; type variables become annotation variables.
    #[must_use]
    pub fn to_ann(&self) -> TypeAnn {
        match self {
            Self::Bool => TypeAnn::Bool,
            Self::Real => TypeAnn::real(),
            Self::Context => TypeAnn::Context,
            Self::Tuple(elts) => TypeAnn::Tuple(elts.iter().map(Type::to_ann).collect()),
            Self::List(elt) => TypeAnn::List(Box::new(elt.to_ann())),
            Self::Function(..) => TypeAnn::Any,
            Self::Var(v) => TypeAnn::Var(Symbol::from(format!("t{}", v.0))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, elts: &[Type]) -> fmt::Result {
            for (i, elt) in elts.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                elt.fmt(f)?;
            }
            Ok(())
        }

        match self {
            Self::Bool => f.write_str("bool"),
            Self::Real => f.write_str("real"),
            Self::Context => f.write_str("context"),
            Self::Tuple(elts) => {
                f.write_str("tuple[")?;
                list(f, elts)?;
                f.write_str("]")
            }
            Self::List(elt) => write!(f, "list[{elt}]"),
            Self::Function(params, ret) => {
                f.write_str("(")?;
                list(f, params)?;
                write!(f, ") -> {ret}")
            }
            Self::Var(v) => v.fmt(f),
        }
    }
}

/// Parameter and result types of an operator with `arity` operands.
///
/// `fresh` supplies type variables for polymorphic operators (list operations). Returns `None`
/// only for arities the operator cannot take.
pub fn op_signature(
    op: OpRef,
    arity: usize,
    fresh: &mut dyn FnMut() -> Type,
) -> Option<(Vec<Type>, Type)> {
    let reals = |n: usize| vec![Type::Real; n];
    Some(match op {
        OpRef::Nullary => (vec![], Type::Real),
        OpRef::Unary(op) => match op {
            UnaryOpKind::Not => (vec![Type::Bool], Type::Bool),
            UnaryOpKind::IsFinite
            | UnaryOpKind::IsInf
            | UnaryOpKind::IsNan
            | UnaryOpKind::IsNormal
            | UnaryOpKind::Signbit => (reals(1), Type::Bool),
            UnaryOpKind::Range => (reals(1), Type::list(Type::Real)),
            UnaryOpKind::Len | UnaryOpKind::Dim => (vec![Type::list(fresh())], Type::Real),
            UnaryOpKind::Sum => (vec![Type::list(Type::Real)], Type::Real),
            UnaryOpKind::Enumerate => {
                let a = fresh();
                (
                    vec![Type::list(a.clone())],
                    Type::list(Type::Tuple(vec![Type::Real, a])),
                )
            }
            _ => (reals(1), Type::Real),
        },
        OpRef::Binary(op) => match op {
            BinaryOpKind::Size => (vec![Type::list(fresh()), Type::Real], Type::Real),
            BinaryOpKind::Range => (reals(2), Type::list(Type::Real)),
            _ => (reals(2), Type::Real),
        },
        OpRef::Ternary(op) => match op {
            TernaryOpKind::Fma => (reals(3), Type::Real),
            TernaryOpKind::Range => (reals(3), Type::list(Type::Real)),
        },
        OpRef::Nary(op) => match op {
            NaryOpKind::And | NaryOpKind::Or => (vec![Type::Bool; arity], Type::Bool),
            NaryOpKind::Min | NaryOpKind::Max if arity > 0 => (reals(arity), Type::Real),
            NaryOpKind::Min | NaryOpKind::Max => return None,
            NaryOpKind::Zip => {
                let elts: Vec<Type> = (0..arity).map(|_| fresh()).collect();
                (
                    elts.iter().cloned().map(Type::list).collect(),
                    Type::list(Type::Tuple(elts)),
                )
            }
            NaryOpKind::Empty => {
                let mut ty = fresh();
                for _ in 0..arity {
                    ty = Type::list(ty);
                }
                (reals(arity), ty)
            }
        },
    })
}

/// An operator of any arity class, for [`op_signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpRef {
    /// Any nullary operator (all are real constants)
    Nullary,
    /// Unary operator
    Unary(UnaryOpKind),
    /// Binary operator
    Binary(BinaryOpKind),
    /// Ternary operator
    Ternary(TernaryOpKind),
    /// Variadic operator
    Nary(NaryOpKind),
}

/// Substitution state: each variable is unbound or bound to a type.
#[derive(Debug, Default)]
struct Unifier {
    bindings: Vec<Option<Type>>,
}

impl Unifier {
    fn fresh(&mut self) -> Type {
        self.bindings.push(None);
        Type::Var(TypeVar(self.bindings.len() - 1))
    }

    /// Follows variable bindings at the top of `ty` only.
    fn shallow(&self, ty: &Type) -> Type {
        let mut ty = ty.clone();
        while let Type::Var(v) = ty {
            match self.bindings.get(v.0).and_then(Option::as_ref) {
                Some(bound) => ty = bound.clone(),
                None => break,
            }
        }
        ty
    }

    fn resolve(&self, ty: &Type) -> Type {
        match self.shallow(ty) {
            Type::Tuple(elts) => Type::Tuple(elts.iter().map(|t| self.resolve(t)).collect()),
            Type::List(elt) => Type::list(self.resolve(&elt)),
            Type::Function(params, ret) => Type::function(
                params.iter().map(|t| self.resolve(t)).collect(),
                self.resolve(&ret),
            ),
            other => other,
        }
    }

    fn occurs(&self, var: TypeVar, ty: &Type) -> bool {
        match self.shallow(ty) {
            Type::Var(v) => v == var,
            Type::Tuple(elts) => elts.iter().any(|t| self.occurs(var, t)),
            Type::List(elt) => self.occurs(var, &elt),
            Type::Function(params, ret) => {
                params.iter().any(|t| self.occurs(var, t)) || self.occurs(var, &ret)
            }
            Type::Bool | Type::Real | Type::Context => false,
        }
    }

    fn conflict(&self, expected: &Type, actual: &Type, site: NodeId) -> Error {
        Error::TypeConflict {
            site,
            expected: self.resolve(expected).to_string(),
            actual: self.resolve(actual).to_string(),
        }
    }

    fn unify(&mut self, expected: &Type, actual: &Type, site: NodeId) -> Result<()> {
        let a = self.shallow(expected);
        let b = self.shallow(actual);
        match (&a, &b) {
            (Type::Var(x), Type::Var(y)) if x == y => Ok(()),
            (Type::Var(x), other) | (other, Type::Var(x)) => {
                if self.occurs(*x, other) {
                    return Err(self.conflict(&a, &b, site));
                }
                self.bindings[x.0] = Some(other.clone());
                Ok(())
            }
            (Type::Bool, Type::Bool) | (Type::Real, Type::Real) | (Type::Context, Type::Context) => {
                Ok(())
            }
            (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys) {
                    self.unify(x, y, site)?;
                }
                Ok(())
            }
            (Type::List(x), Type::List(y)) => self.unify(x, y, site),
            (Type::Function(xs, xr), Type::Function(ys, yr)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys) {
                    self.unify(x, y, site)?;
                }
                self.unify(xr, yr, site)
            }
            _ => Err(self.conflict(&a, &b, site)),
        }
    }

    /// Replaces every variable of a resolved type with a fresh one.
    fn instantiate(&mut self, ty: &Type) -> Type {
        let mut map = HashMap::new();
        self.instantiate_with(ty, &mut map)
    }

    fn instantiate_with(&mut self, ty: &Type, map: &mut HashMap<TypeVar, Type>) -> Type {
        match ty {
            Type::Var(v) => map.entry(*v).or_insert_with(|| self.fresh()).clone(),
            Type::Tuple(elts) => Type::Tuple(
                elts.iter()
                    .map(|t| self.instantiate_with(t, map))
                    .collect(),
            ),
            Type::List(elt) => Type::list(self.instantiate_with(elt, map)),
            Type::Function(params, ret) => {
                let params = params
                    .iter()
                    .map(|t| self.instantiate_with(t, map))
                    .collect();
                Type::function(params, self.instantiate_with(ret, map))
            }
            other => other.clone(),
        }
    }
}

/// Entry point of type inference.
pub struct TypeInfer;

impl TypeInfer {
    /// Infers the type of every definition and expression of `func`.
    ///
    /// # Errors
    ///
    /// Propagates reaching-definition errors; returns [`Error::TypeConflict`] on a unification
    /// failure and [`Error::ArityMismatch`] for tuple destructuring or call arity errors.
    pub fn check(func: &FuncDef) -> Result<TypeAnalysis> {
        let du = DefineUse::analyze(func)?;
        let mut uf = Unifier::default();
        let ret = uf.fresh();
        let mut checker = Checker {
            du: &du,
            uf,
            ann_vars: HashMap::new(),
            def_types: Vec::new(),
            expr_types: HashMap::new(),
            ret,
        };
        for _ in 0..du.reach().len() {
            let var = checker.uf.fresh();
            checker.def_types.push(var);
        }

        let mut params = Vec::with_capacity(func.args.len());
        for arg in &func.args {
            let ty = match &arg.ann {
                Some(ann) => checker.from_ann(ann),
                None => checker.uf.fresh(),
            };
            if let Some(name) = arg.name.as_named() {
                if let Some(def) = du.reach().def_at(arg.id, name) {
                    let def_ty = checker.def_type(def)?;
                    checker.uf.unify(&ty, &def_ty, arg.id)?;
                }
            }
            params.push(ty);
        }
        for (id, def) in du.reach().iter() {
            if let Definition::Assign(assign) = def {
                if let DefSite::Free(_) = assign.site {
                    if let Some(value) = func.env.get(assign.name.base_symbol()) {
                        let ty = checker.foreign_type(value);
                        let def_ty = checker.def_type(id)?;
                        checker.uf.unify(&ty, &def_ty, func.id)?;
                    }
                }
            }
        }

        checker.visit_block(&func.body)?;

        for (id, def) in du.reach().iter() {
            if let Definition::Phi(phi) = def {
                let ty = checker.def_type(id)?;
                let lhs = checker.def_type(phi.lhs)?;
                let rhs = checker.def_type(phi.rhs)?;
                checker.uf.unify(&ty, &lhs, phi.site)?;
                checker.uf.unify(&ty, &rhs, phi.site)?;
            }
        }

        let Checker {
            uf,
            def_types,
            expr_types,
            ret,
            ..
        } = checker;
        let analysis = TypeAnalysis {
            params: params.iter().map(|t| uf.resolve(t)).collect(),
            ret: uf.resolve(&ret),
            def_types: def_types.iter().map(|t| uf.resolve(t)).collect(),
            expr_types: expr_types
                .into_iter()
                .map(|(id, t)| (id, uf.resolve(&t)))
                .collect(),
        };
        log::trace!("type of `{}`: {}", func.name, analysis.signature());
        Ok(analysis)
    }
}

struct Checker<'a> {
    du: &'a DefineUseAnalysis,
    uf: Unifier,
    ann_vars: HashMap<Symbol, Type>,
    def_types: Vec<Type>,
    expr_types: HashMap<NodeId, Type>,
    ret: Type,
}

impl Checker<'_> {
    fn def_type(&self, def: DefId) -> Result<Type> {
        self.def_types
            .get(def.index())
            .cloned()
            .ok_or_else(|| invariant_error!("definition {} out of range", def))
    }

    fn from_ann(&mut self, ann: &TypeAnn) -> Type {
        match ann {
            TypeAnn::Any => self.uf.fresh(),
            TypeAnn::Bool => Type::Bool,
            TypeAnn::Real(_) => Type::Real,
            TypeAnn::Context => Type::Context,
            TypeAnn::Tuple(elts) => Type::Tuple(elts.iter().map(|t| self.from_ann(t)).collect()),
            TypeAnn::List(elt) => Type::list(self.from_ann(elt)),
            TypeAnn::Var(name) => {
                if let Some(ty) = self.ann_vars.get(name) {
                    return ty.clone();
                }
                let ty = self.uf.fresh();
                self.ann_vars.insert(name.clone(), ty.clone());
                ty
            }
        }
    }

    fn foreign_type(&mut self, value: &ForeignValue) -> Type {
        match value {
            ForeignValue::Bool(_) => Type::Bool,
            ForeignValue::Number(_) => Type::Real,
            ForeignValue::Context(_) => Type::Context,
            ForeignValue::Tuple(elts) => {
                Type::Tuple(elts.iter().map(|v| self.foreign_type(v)).collect())
            }
            ForeignValue::RoundingMode(_) | ForeignValue::Opaque(_) => self.uf.fresh(),
        }
    }

    /// Unifies the definitions a binding creates at `site` with `ty`.
    fn bind(&mut self, target: &Binding, ty: &Type, site: NodeId) -> Result<()> {
        match target {
            Binding::Id(Id::Underscore) => Ok(()),
            Binding::Id(Id::Named(name)) => {
                let Some(def) = self.du.reach().def_at(site, name) else {
                    return Err(invariant_error!("`{}` is not defined at {}", name, site));
                };
                let def_ty = self.def_type(def)?;
                self.uf.unify(&def_ty, ty, site)
            }
            Binding::Tuple(elts) => {
                let elt_types = match self.uf.shallow(ty) {
                    Type::Tuple(types) => {
                        if types.len() != elts.len() {
                            return Err(Error::ArityMismatch {
                                site,
                                expected: elts.len(),
                                actual: types.len(),
                            });
                        }
                        types
                    }
                    other => {
                        let types: Vec<Type> = elts.iter().map(|_| self.uf.fresh()).collect();
                        self.uf.unify(&Type::Tuple(types.clone()), &other, site)?;
                        types
                    }
                };
                for (elt, elt_ty) in elts.iter().zip(&elt_types) {
                    self.bind(elt, elt_ty, site)?;
                }
                Ok(())
            }
        }
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Assign { target, ann, expr } => {
                let ty = self.infer(expr)?;
                if let Some(ann) = ann {
                    let expected = self.from_ann(ann);
                    self.uf.unify(&expected, &ty, stmt.id)?;
                }
                self.bind(target, &ty, stmt.id)
            }
            StmtKind::IndexedAssign { var, indices, expr } => {
                for index in indices {
                    let ty = self.infer(index)?;
                    self.uf.unify(&Type::Real, &ty, index.id)?;
                }
                let elt = self.infer(expr)?;
                let mut array = elt;
                for _ in indices {
                    array = Type::list(array);
                }
                let Some(old) = self.du.def_of_use(stmt.id) else {
                    return Err(invariant_error!("`{}` is not resolved at {}", var, stmt.id));
                };
                let old_ty = self.def_type(old)?;
                self.uf.unify(&old_ty, &array, stmt.id)?;
                if let Some(new) = self.du.reach().def_at(stmt.id, var) {
                    let new_ty = self.def_type(new)?;
                    self.uf.unify(&new_ty, &old_ty, stmt.id)?;
                }
                Ok(())
            }
            StmtKind::If1 { cond, body } => {
                self.expect(cond, &Type::Bool)?;
                self.visit_block(body)
            }
            StmtKind::If { cond, ift, iff } => {
                self.expect(cond, &Type::Bool)?;
                self.visit_block(ift)?;
                self.visit_block(iff)
            }
            StmtKind::While { cond, body } => {
                self.expect(cond, &Type::Bool)?;
                self.visit_block(body)
            }
            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                let elt = self.uf.fresh();
                self.expect(iterable, &Type::list(elt.clone()))?;
                self.bind(target, &elt, stmt.id)?;
                self.visit_block(body)
            }
            StmtKind::Context { name, ctx, body } => {
                self.expect(ctx, &Type::Context)?;
                if let Some(name) = name {
                    self.bind(&Binding::named(name.clone()), &Type::Context, stmt.id)?;
                }
                self.visit_block(body)
            }
            StmtKind::Assert { test, msg } => {
                self.expect(test, &Type::Bool)?;
                if let Some(msg) = msg {
                    self.infer(msg)?;
                }
                Ok(())
            }
            StmtKind::Effect(expr) => self.infer(expr).map(|_| ()),
            StmtKind::Return(expr) => {
                let ret = self.ret.clone();
                self.expect(expr, &ret)
            }
            StmtKind::Pass => Ok(()),
        }
    }

    fn expect(&mut self, expr: &Expr, expected: &Type) -> Result<()> {
        let ty = self.infer(expr)?;
        self.uf.unify(expected, &ty, expr.id)
    }

    fn apply_sig(&mut self, op: OpRef, args: &[&Expr], site: NodeId) -> Result<Type> {
        let uf = &mut self.uf;
        let Some((params, ret)) = op_signature(op, args.len(), &mut || uf.fresh()) else {
            return Err(Error::ArityMismatch {
                site,
                expected: 1,
                actual: args.len(),
            });
        };
        if params.len() != args.len() {
            return Err(Error::ArityMismatch {
                site,
                expected: params.len(),
                actual: args.len(),
            });
        }
        for (arg, param) in args.iter().zip(&params) {
            self.expect(arg, param)?;
        }
        Ok(ret)
    }

    fn infer(&mut self, expr: &Expr) -> Result<Type> {
        let ty = self.infer_kind(expr)?;
        self.expr_types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn infer_kind(&mut self, expr: &Expr) -> Result<Type> {
        match &expr.kind {
            ExprKind::Var(name) => match self.du.def_of_use(expr.id) {
                Some(def) => self.def_type(def),
                None => Err(Error::UndefinedName {
                    name: name.clone(),
                    site: expr.id,
                }),
            },
            ExprKind::Bool(_) => Ok(Type::Bool),
            ExprKind::Decnum(_)
            | ExprKind::Hexnum(_)
            | ExprKind::Integer(_)
            | ExprKind::Rational { .. }
            | ExprKind::Digits { .. } => Ok(Type::Real),
            ExprKind::Foreign(value) => Ok(self.foreign_type(value)),
            ExprKind::Nullary { .. } => self.apply_sig(OpRef::Nullary, &[], expr.id),
            ExprKind::Unary { op, arg, .. } => self.apply_sig(OpRef::Unary(*op), &[arg.as_ref()], expr.id),
            ExprKind::Binary { op, lhs, rhs, .. } => {
                self.apply_sig(OpRef::Binary(*op), &[lhs.as_ref(), rhs.as_ref()], expr.id)
            }
            ExprKind::Ternary {
                op,
                first,
                second,
                third,
                ..
            } => self.apply_sig(
                OpRef::Ternary(*op),
                &[first.as_ref(), second.as_ref(), third.as_ref()],
                expr.id,
            ),
            ExprKind::Nary { op, args, .. } => {
                let args: Vec<&Expr> = args.iter().collect();
                self.apply_sig(OpRef::Nary(*op), &args, expr.id)
            }
            ExprKind::Compare { ops, args } => {
                let mut types = Vec::with_capacity(args.len());
                for arg in args {
                    types.push(self.infer(arg)?);
                }
                for (i, op) in ops.iter().enumerate() {
                    let (Some(lhs), Some(rhs)) = (types.get(i), types.get(i + 1)) else {
                        return Err(Error::ArityMismatch {
                            site: expr.id,
                            expected: ops.len() + 1,
                            actual: args.len(),
                        });
                    };
                    if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                        self.uf.unify(&Type::Real, lhs, expr.id)?;
                    }
                    self.uf.unify(lhs, rhs, expr.id)?;
                }
                Ok(Type::Bool)
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
                ..
            } => {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.infer(arg)?);
                }
                for (_, kwarg) in kwargs {
                    self.infer(kwarg)?;
                }
                let signature = match callee {
                    Some(Callee::Function(target)) => {
                        let sig = TypeInfer::check(target)?.signature();
                        Some(self.uf.instantiate(&sig))
                    }
                    Some(Callee::External(ext)) => match &ext.signature {
                        Some((params, ret)) => {
                            let saved = std::mem::take(&mut self.ann_vars);
                            let params = params.iter().map(|p| self.from_ann(p)).collect();
                            let ret = self.from_ann(ret);
                            self.ann_vars = saved;
                            Some(Type::function(params, ret))
                        }
                        None => None,
                    },
                    None => match self.du.def_of_use(expr.id) {
                        Some(def) => Some(self.def_type(def)?),
                        None => None,
                    },
                };
                let ret = self.uf.fresh();
                let Some(signature) = signature else {
                    return Ok(ret);
                };
                if let Type::Function(params, _) = self.uf.shallow(&signature) {
                    if params.len() != arg_types.len() {
                        return Err(Error::ArityMismatch {
                            site: expr.id,
                            expected: params.len(),
                            actual: arg_types.len(),
                        });
                    }
                }
                self.uf
                    .unify(&signature, &Type::function(arg_types, ret.clone()), expr.id)?;
                Ok(ret)
            }
            ExprKind::Tuple(elts) => {
                let mut types = Vec::with_capacity(elts.len());
                for elt in elts {
                    types.push(self.infer(elt)?);
                }
                Ok(Type::Tuple(types))
            }
            ExprKind::List(elts) => {
                let elt_ty = self.uf.fresh();
                for elt in elts {
                    self.expect(elt, &elt_ty)?;
                }
                Ok(Type::list(elt_ty))
            }
            ExprKind::ListComp {
                targets,
                iterables,
                elt,
            } => {
                for (target, iterable) in targets.iter().zip(iterables) {
                    let elt_ty = self.uf.fresh();
                    self.expect(iterable, &Type::list(elt_ty.clone()))?;
                    self.bind(target, &elt_ty, expr.id)?;
                }
                let ty = self.infer(elt)?;
                Ok(Type::list(ty))
            }
            ExprKind::ListRef { value, index } => {
                let value_ty = self.infer(value)?;
                self.expect(index, &Type::Real)?;
                if let (Type::Tuple(elts), ExprKind::Integer(i)) =
                    (self.uf.shallow(&value_ty), &index.kind)
                {
                    let Some(elt) = usize::try_from(i).ok().and_then(|i| elts.get(i)) else {
                        return Err(Error::ArityMismatch {
                            site: expr.id,
                            expected: elts.len(),
                            actual: usize::try_from(i).unwrap_or(usize::MAX),
                        });
                    };
                    return Ok(elt.clone());
                }
                let elt = self.uf.fresh();
                self.uf.unify(&Type::list(elt.clone()), &value_ty, expr.id)?;
                Ok(elt)
            }
            ExprKind::ListSlice { value, start, stop } => {
                let elt = self.uf.fresh();
                let ty = Type::list(elt);
                self.expect(value, &ty)?;
                for bound in [start, stop].into_iter().flatten() {
                    self.expect(bound, &Type::Real)?;
                }
                Ok(ty)
            }
            ExprKind::ListSet {
                value,
                indices,
                elt,
            } => {
                let value_ty = self.infer(value)?;
                for index in indices {
                    self.expect(index, &Type::Real)?;
                }
                let mut array = self.infer(elt)?;
                for _ in indices {
                    array = Type::list(array);
                }
                self.uf.unify(&array, &value_ty, expr.id)?;
                Ok(value_ty)
            }
            ExprKind::IfExpr { cond, ift, iff } => {
                self.expect(cond, &Type::Bool)?;
                let ty = self.infer(ift)?;
                self.expect(iff, &ty)?;
                Ok(ty)
            }
            ExprKind::Context { args, kwargs, .. } => {
                for arg in args {
                    self.infer(arg)?;
                }
                for (_, kwarg) in kwargs {
                    self.infer(kwarg)?;
                }
                Ok(Type::Context)
            }
        }
    }
}

/// The result of [`TypeInfer`].
#[derive(Debug, Clone)]
pub struct TypeAnalysis {
    params: Vec<Type>,
    ret: Type,
    def_types: Vec<Type>,
    expr_types: HashMap<NodeId, Type>,
}

impl TypeAnalysis {
    /// Parameter types in order.
    #[must_use]
    pub fn arg_types(&self) -> &[Type] {
        &self.params
    }

    /// The return type; a variable if the function never returns.
    #[must_use]
    pub const fn return_type(&self) -> &Type {
        &self.ret
    }

    /// The function type `(params) -> ret`.
    #[must_use]
    pub fn signature(&self) -> Type {
        Type::function(self.params.clone(), self.ret.clone())
    }

    /// The type of a definition.
    #[must_use]
    pub fn type_of_def(&self, def: DefId) -> Option<&Type> {
        self.def_types.get(def.index())
    }

    /// The type of an expression node.
    #[must_use]
    pub fn type_of_expr(&self, expr: NodeId) -> Option<&Type> {
        self.expr_types.get(&expr)
    }

    /// Returns `true` if the signature contains no type variable.
    #[must_use]
    pub fn is_monomorphic(&self) -> bool {
        self.signature().is_monomorphic()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ast::{Argument, ExternalFn},
        test::helpers::{func, scenario_if_merge, scenario_simple, scenario_while},
    };

    #[test]
    fn test_simple_signature() {
        let ta = TypeInfer::check(&scenario_simple()).unwrap();
        assert_eq!(ta.signature(), Type::function(vec![Type::Real], Type::Real));
        assert!(ta.is_monomorphic());
    }

    #[test]
    fn test_phis_unify_operands() {
        let ta = TypeInfer::check(&scenario_while()).unwrap();
        assert_eq!(ta.return_type(), &Type::Real);
        let ta = TypeInfer::check(&scenario_if_merge()).unwrap();
        assert_eq!(ta.arg_types(), &[Type::Real]);
    }

    #[test]
    fn test_branch_type_conflict() {
        let f = func(
            &["x"],
            vec![
                Stmt::if2(
                    Expr::var("x"),
                    vec![Stmt::assign("y", Expr::int(1))],
                    vec![Stmt::assign("y", Expr::boolean(true))],
                ),
                Stmt::ret(Expr::var("y")),
            ],
        );
        match TypeInfer::check(&f) {
            Err(Error::TypeConflict { expected, actual, .. }) => {
                assert_eq!(expected, "real");
                assert_eq!(actual, "bool");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_identity_is_polymorphic_and_instantiated() {
        let id = Arc::new(func(&["x"], vec![Stmt::ret(Expr::var("x"))]));
        let ta = TypeInfer::check(&id).unwrap();
        assert!(!ta.is_monomorphic());

        let call_real = Expr::call("id", Some(Callee::Function(id.clone())), vec![Expr::int(1)]);
        let call_bool = Expr::call(
            "id",
            Some(Callee::Function(id.clone())),
            vec![Expr::boolean(true)],
        );
        let (real_id, bool_id) = (call_real.id, call_bool.id);
        let caller = func(
            &[],
            vec![
                Stmt::assign("a", call_real),
                Stmt::assign("b", call_bool),
                Stmt::ret(Expr::tuple(vec![Expr::var("a"), Expr::var("b")])),
            ],
        );
        let ta = TypeInfer::check(&caller).unwrap();
        assert_eq!(ta.type_of_expr(real_id), Some(&Type::Real));
        assert_eq!(ta.type_of_expr(bool_id), Some(&Type::Bool));
        assert_eq!(ta.return_type(), &Type::Tuple(vec![Type::Real, Type::Bool]));
    }

    #[test]
    fn test_call_arity_mismatch() {
        let ext = ExternalFn {
            name: "hypot2".into(),
            pure: true,
            signature: Some((vec![TypeAnn::real(), TypeAnn::real()], TypeAnn::real())),
        };
        let call = Expr::call(
            "hypot2",
            Some(Callee::External(Arc::new(ext))),
            vec![Expr::var("x")],
        );
        let site = call.id;
        let f = func(&["x"], vec![Stmt::ret(call)]);
        assert_eq!(
            TypeInfer::check(&f).unwrap_err(),
            Error::ArityMismatch {
                site,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_tuple_destructuring_arity() {
        let arg = Argument::new("t").with_ann(TypeAnn::Tuple(vec![TypeAnn::real(); 3]));
        let stmt = Stmt::assign(
            Binding::tuple(vec![Binding::from("a"), Binding::from("b")]),
            Expr::var("t"),
        );
        let site = stmt.id;
        let f = FuncDef::new(
            "f",
            vec![arg],
            Block::new(vec![stmt, Stmt::ret(Expr::var("a"))]),
        );
        assert_eq!(
            TypeInfer::check(&f).unwrap_err(),
            Error::ArityMismatch {
                site,
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_occurs_check() {
        let f = func(
            &["xs"],
            vec![Stmt::ret(Expr::compare(
                CompareOp::Eq,
                Expr::var("xs"),
                Expr::list(vec![Expr::var("xs")]),
            ))],
        );
        assert!(matches!(
            TypeInfer::check(&f),
            Err(Error::TypeConflict { .. })
        ));
    }

    #[test]
    fn test_comprehension_and_loops() {
        let comp = Expr::list_comp(
            vec![Binding::from("i")],
            vec![Expr::var("xs")],
            Expr::add(Expr::var("i"), Expr::int(1)),
        );
        let comp_id = comp.id;
        let f = func(
            &["xs"],
            vec![
                Stmt::assign("ys", comp),
                Stmt::assign("s", Expr::int(0)),
                Stmt::for_loop(
                    "y",
                    Expr::var("ys"),
                    vec![Stmt::assign("s", Expr::add(Expr::var("s"), Expr::var("y")))],
                ),
                Stmt::ret(Expr::var("s")),
            ],
        );
        let ta = TypeInfer::check(&f).unwrap();
        assert_eq!(ta.arg_types(), &[Type::list(Type::Real)]);
        assert_eq!(ta.type_of_expr(comp_id), Some(&Type::list(Type::Real)));
    }

    #[test]
    fn test_annotation_variables_are_shared() {
        let a = Argument::new("a").with_ann(TypeAnn::Var("T".into()));
        let b = Argument::new("b").with_ann(TypeAnn::Var("T".into()));
        let f = FuncDef::new(
            "f",
            vec![a, b],
            Block::new(vec![Stmt::ret(Expr::if_expr(
                Expr::boolean(true),
                Expr::var("a"),
                Expr::var("b"),
            ))]),
        );
        let ta = TypeInfer::check(&f).unwrap();
        assert_eq!(ta.arg_types()[0], ta.arg_types()[1]);
        assert_eq!(ta.return_type(), &ta.arg_types()[0]);
        assert!(!ta.is_monomorphic());
    }

    #[test]
    fn test_type_display() {
        let ty = Type::function(
            vec![Type::list(Type::Real), Type::Tuple(vec![Type::Bool, Type::Context])],
            Type::Var(TypeVar(3)),
        );
        assert_eq!(ty.to_string(), "(list[real], tuple[bool, context]) -> 't3");
    }
}
