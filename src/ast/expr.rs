//! Expression nodes.
//!
//! Operator identity lives in the operator-kind enums, never in strings. Operators that the
//! source spelled as a function call (`sqrt(x)`, `fma(a, b, c)`) keep that spelling in their
//! `func` field so the printer can reproduce it; the spelling has no semantic weight.

use num::BigInt;
use strum::{EnumCount, EnumIter, IntoStaticStr};

use super::{Callee, ForeignValue, Loc, NamedId, NodeId, Symbol};

/// Operators without operands (mathematical constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum NullaryOpKind {
    /// Not a number
    Nan,
    /// Positive infinity
    Inf,
    /// π
    Pi,
    /// Euler's number
    E,
    /// log2(e)
    Log2E,
    /// log10(e)
    Log10E,
    /// ln(2)
    Ln2,
    /// π/2
    Pi2,
    /// π/4
    Pi4,
    /// 1/π
    #[strum(serialize = "M_1_PI")]
    InvPi,
    /// 2/π
    #[strum(serialize = "M_2_PI")]
    TwoInvPi,
    /// 2/sqrt(π)
    #[strum(serialize = "M_2_SQRTPI")]
    TwoInvSqrtPi,
    /// sqrt(2)
    Sqrt2,
    /// 1/sqrt(2)
    #[strum(serialize = "SQRT1_2")]
    InvSqrt2,
}

/// Operators of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOpKind {
    /// Negation, `-x`
    Neg,
    /// Logical negation, `not x`
    Not,
    /// Absolute value
    Fabs,
    /// Square root
    Sqrt,
    /// Cube root
    Cbrt,
    /// Round toward positive infinity
    Ceil,
    /// Round toward negative infinity
    Floor,
    /// Round to integer in the current rounding mode
    #[strum(serialize = "nearbyint")]
    NearbyInt,
    /// Round to nearest integer, ties away from zero
    Round,
    /// Round toward zero
    Trunc,
    /// Arc cosine
    Acos,
    /// Arc sine
    Asin,
    /// Arc tangent
    Atan,
    /// Cosine
    Cos,
    /// Sine
    Sin,
    /// Tangent
    Tan,
    /// Inverse hyperbolic cosine
    Acosh,
    /// Inverse hyperbolic sine
    Asinh,
    /// Inverse hyperbolic tangent
    Atanh,
    /// Hyperbolic cosine
    Cosh,
    /// Hyperbolic sine
    Sinh,
    /// Hyperbolic tangent
    Tanh,
    /// e^x
    Exp,
    /// 2^x
    Exp2,
    /// e^x - 1
    Expm1,
    /// Natural logarithm
    Log,
    /// Base-10 logarithm
    Log10,
    /// ln(1 + x)
    Log1p,
    /// Base-2 logarithm
    Log2,
    /// Error function
    Erf,
    /// Complementary error function
    Erfc,
    /// Log-gamma
    Lgamma,
    /// Gamma
    Tgamma,
    /// Finite predicate
    #[strum(serialize = "isfinite")]
    IsFinite,
    /// Infinity predicate
    #[strum(serialize = "isinf")]
    IsInf,
    /// NaN predicate
    #[strum(serialize = "isnan")]
    IsNan,
    /// Normal-number predicate
    #[strum(serialize = "isnormal")]
    IsNormal,
    /// Sign bit predicate
    Signbit,
    /// Round to the current context
    Cast,
    /// `range(n)`
    Range,
    /// Length of a list
    Len,
    /// Number of dimensions of a nested list
    Dim,
    /// Sum of a list
    Sum,
    /// `enumerate(xs)`
    Enumerate,
}

/// Operators of two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOpKind {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Copy sign of the second operand onto the first
    Copysign,
    /// Positive difference
    Fdim,
    /// Maximum
    Fmax,
    /// Minimum
    Fmin,
    /// Remainder with the sign of the dividend
    Fmod,
    /// IEEE remainder
    Remainder,
    /// sqrt(x^2 + y^2)
    Hypot,
    /// Two-argument arc tangent
    Atan2,
    /// Power
    Pow,
    /// Size of a list along a dimension
    Size,
    /// `range(start, stop)`
    Range,
}

/// Operators of three operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TernaryOpKind {
    /// Fused multiply-add
    Fma,
    /// `range(start, stop, step)`
    Range,
}

/// Operators of any number of operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum NaryOpKind {
    /// Short-circuit conjunction
    And,
    /// Short-circuit disjunction
    Or,
    /// Element-wise pairing of lists
    Zip,
    /// Minimum of operands
    Min,
    /// Maximum of operands
    Max,
    /// `empty(n, ...)` nested list constructor
    Empty,
}

/// Ordered comparison operators of a comparison chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
pub enum CompareOp {
    /// `<`
    #[strum(serialize = "<")]
    Lt,
    /// `<=`
    #[strum(serialize = "<=")]
    Le,
    /// `>=`
    #[strum(serialize = ">=")]
    Ge,
    /// `>`
    #[strum(serialize = ">")]
    Gt,
    /// `==`
    #[strum(serialize = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    Ne,
}

impl CompareOp {
    /// The source spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.into()
    }
}

macro_rules! impl_op_name {
    ($($kind:ty),*) => {
        $(
            impl $kind {
                /// The canonical function spelling of this operator.
                #[must_use]
                pub fn name(self) -> &'static str {
                    self.into()
                }
            }
        )*
    };
}

impl_op_name!(NullaryOpKind, UnaryOpKind, BinaryOpKind, TernaryOpKind, NaryOpKind);

/// An element of a binding pattern: a name, the wildcard, or a nested tuple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Binds a single identifier
    Id(super::Id),
    /// Destructures a tuple
    Tuple(Vec<Binding>),
}

impl Binding {
    /// Creates a tuple binding.
    #[must_use]
    pub fn tuple(elts: Vec<Binding>) -> Self {
        Self::Tuple(elts)
    }

    /// Creates a single-name binding.
    #[must_use]
    pub fn named(name: NamedId) -> Self {
        Self::Id(super::Id::Named(name))
    }

    /// All names bound by the pattern, left to right.
    #[must_use]
    pub fn names(&self) -> Vec<&NamedId> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a NamedId>) {
        match self {
            Self::Id(id) => {
                if let Some(name) = id.as_named() {
                    out.push(name);
                }
            }
            Self::Tuple(elts) => {
                for elt in elts {
                    elt.collect_names(out);
                }
            }
        }
    }

    /// Returns the single bound name if the binding is a plain named identifier.
    #[must_use]
    pub fn as_name(&self) -> Option<&NamedId> {
        match self {
            Self::Id(id) => id.as_named(),
            Self::Tuple(_) => None,
        }
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Self::Id(super::Id::from(value))
    }
}

impl From<NamedId> for Binding {
    fn from(value: NamedId) -> Self {
        Self::named(value)
    }
}

impl From<super::Id> for Binding {
    fn from(value: super::Id) -> Self {
        Self::Id(value)
    }
}

/// The variants of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Variable reference
    Var(NamedId),
    /// `True` / `False`
    Bool(bool),
    /// Decimal literal, kept as written
    Decnum(Symbol),
    /// Hexadecimal floating-point literal, kept as written
    Hexnum(Symbol),
    /// Integer literal
    Integer(BigInt),
    /// `rational(p, q)`
    Rational {
        /// Numerator
        p: BigInt,
        /// Denominator
        q: BigInt,
    },
    /// `digits(m, e, b)` = m * b^e
    Digits {
        /// Significand
        m: BigInt,
        /// Exponent
        e: BigInt,
        /// Base
        b: BigInt,
    },
    /// Value embedded from the host
    Foreign(ForeignValue),
    /// Constant operator
    Nullary {
        /// Operator
        op: NullaryOpKind,
        /// Source spelling for the named flavor
        func: Option<Symbol>,
    },
    /// One-operand operator
    Unary {
        /// Operator
        op: UnaryOpKind,
        /// Source spelling for the named flavor
        func: Option<Symbol>,
        /// Operand
        arg: Box<Expr>,
    },
    /// Two-operand operator
    Binary {
        /// Operator
        op: BinaryOpKind,
        /// Source spelling for the named flavor
        func: Option<Symbol>,
        /// First operand
        lhs: Box<Expr>,
        /// Second operand
        rhs: Box<Expr>,
    },
    /// Three-operand operator
    Ternary {
        /// Operator
        op: TernaryOpKind,
        /// Source spelling for the named flavor
        func: Option<Symbol>,
        /// First operand
        first: Box<Expr>,
        /// Second operand
        second: Box<Expr>,
        /// Third operand
        third: Box<Expr>,
    },
    /// Variadic operator
    Nary {
        /// Operator
        op: NaryOpKind,
        /// Source spelling for the named flavor
        func: Option<Symbol>,
        /// Operands
        args: Vec<Expr>,
    },
    /// `a0 op0 a1 op1 a2 ...`, with `ops.len() + 1 == args.len()`
    Compare {
        /// Operators between consecutive operands
        ops: Vec<CompareOp>,
        /// Operands
        args: Vec<Expr>,
    },
    /// Call of a user-defined or host function
    Call {
        /// Name the call was written with
        func: NamedId,
        /// Resolved target, if the frontend could resolve it
        callee: Option<Callee>,
        /// Positional arguments
        args: Vec<Expr>,
        /// Keyword arguments in source order
        kwargs: Vec<(Symbol, Expr)>,
    },
    /// Tuple constructor
    Tuple(Vec<Expr>),
    /// List constructor
    List(Vec<Expr>),
    /// `[elt for t0 in i0 for t1 in i1 ...]`
    ListComp {
        /// Comprehension targets
        targets: Vec<Binding>,
        /// Iterated lists, parallel to `targets`
        iterables: Vec<Expr>,
        /// Element expression
        elt: Box<Expr>,
    },
    /// `value[index]`
    ListRef {
        /// Indexed list or tuple
        value: Box<Expr>,
        /// Index
        index: Box<Expr>,
    },
    /// `value[start:stop]`
    ListSlice {
        /// Sliced list
        value: Box<Expr>,
        /// Inclusive start
        start: Option<Box<Expr>>,
        /// Exclusive stop
        stop: Option<Box<Expr>>,
    },
    /// Functional update: a copy of `value` with `value[i0][i1]... = elt`
    ListSet {
        /// Updated list
        value: Box<Expr>,
        /// Index path
        indices: Vec<Expr>,
        /// New element
        elt: Box<Expr>,
    },
    /// `ift if cond else iff`
    IfExpr {
        /// Condition
        cond: Box<Expr>,
        /// Value when the condition holds
        ift: Box<Expr>,
        /// Value otherwise
        iff: Box<Expr>,
    },
    /// Context constructor, e.g. `IEEEContext(11, 64, RNE)`
    Context {
        /// Constructor name
        ctor: Symbol,
        /// Positional arguments
        args: Vec<Expr>,
        /// Keyword arguments
        kwargs: Vec<(Symbol, Expr)>,
    },
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Identity of the node
    pub id: NodeId,
    /// The expression itself
    pub kind: ExprKind,
    /// Source location
    pub loc: Option<Loc>,
}

impl Expr {
    /// Wraps a kind into a node with a fresh id.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            loc: None,
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn with_loc(mut self, loc: Loc) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Variable reference.
    #[must_use]
    pub fn var(name: impl Into<NamedId>) -> Self {
        Self::new(ExprKind::Var(name.into()))
    }

    /// Boolean literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    /// Integer literal.
    #[must_use]
    pub fn int(value: impl Into<BigInt>) -> Self {
        Self::new(ExprKind::Integer(value.into()))
    }

    /// Decimal literal.
    #[must_use]
    pub fn decnum(text: impl Into<Symbol>) -> Self {
        Self::new(ExprKind::Decnum(text.into()))
    }

    /// Hexadecimal literal.
    #[must_use]
    pub fn hexnum(text: impl Into<Symbol>) -> Self {
        Self::new(ExprKind::Hexnum(text.into()))
    }

    /// `rational(p, q)` literal.
    #[must_use]
    pub fn rational(p: impl Into<BigInt>, q: impl Into<BigInt>) -> Self {
        Self::new(ExprKind::Rational {
            p: p.into(),
            q: q.into(),
        })
    }

    /// `digits(m, e, b)` literal.
    #[must_use]
    pub fn digits(m: impl Into<BigInt>, e: impl Into<BigInt>, b: impl Into<BigInt>) -> Self {
        Self::new(ExprKind::Digits {
            m: m.into(),
            e: e.into(),
            b: b.into(),
        })
    }

    /// Foreign value literal.
    #[must_use]
    pub fn foreign(value: ForeignValue) -> Self {
        Self::new(ExprKind::Foreign(value))
    }

    /// Anonymous constant operator.
    #[must_use]
    pub fn nullary(op: NullaryOpKind) -> Self {
        Self::new(ExprKind::Nullary { op, func: None })
    }

    /// Anonymous unary operator.
    #[must_use]
    pub fn unary(op: UnaryOpKind, arg: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op,
            func: None,
            arg: Box::new(arg),
        })
    }

    /// Anonymous binary operator.
    #[must_use]
    pub fn binary(op: BinaryOpKind, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            func: None,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Anonymous ternary operator.
    #[must_use]
    pub fn ternary(op: TernaryOpKind, first: Expr, second: Expr, third: Expr) -> Self {
        Self::new(ExprKind::Ternary {
            op,
            func: None,
            first: Box::new(first),
            second: Box::new(second),
            third: Box::new(third),
        })
    }

    /// Anonymous variadic operator.
    #[must_use]
    pub fn nary(op: NaryOpKind, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Nary {
            op,
            func: None,
            args,
        })
    }

    /// Marks an operator node as written in named-function style.
    ///
    /// Has no effect on non-operator nodes.
    #[must_use]
    pub fn named(mut self, spelling: impl Into<Symbol>) -> Self {
        match &mut self.kind {
            ExprKind::Nullary { func, .. }
            | ExprKind::Unary { func, .. }
            | ExprKind::Binary { func, .. }
            | ExprKind::Ternary { func, .. }
            | ExprKind::Nary { func, .. } => *func = Some(spelling.into()),
            _ => {}
        }
        self
    }

    /// `lhs + rhs`
    #[must_use]
    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOpKind::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    #[must_use]
    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOpKind::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    #[must_use]
    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOpKind::Mul, lhs, rhs)
    }

    /// `lhs / rhs`
    #[must_use]
    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOpKind::Div, lhs, rhs)
    }

    /// Single comparison `lhs op rhs`.
    #[must_use]
    pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Compare {
            ops: vec![op],
            args: vec![lhs, rhs],
        })
    }

    /// Comparison chain.
    #[must_use]
    pub fn compare_chain(ops: Vec<CompareOp>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Compare { ops, args })
    }

    /// Call with positional arguments.
    #[must_use]
    pub fn call(func: impl Into<NamedId>, callee: Option<Callee>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            func: func.into(),
            callee,
            args,
            kwargs: Vec::new(),
        })
    }

    /// Tuple constructor.
    #[must_use]
    pub fn tuple(elts: Vec<Expr>) -> Self {
        Self::new(ExprKind::Tuple(elts))
    }

    /// List constructor.
    #[must_use]
    pub fn list(elts: Vec<Expr>) -> Self {
        Self::new(ExprKind::List(elts))
    }

    /// List comprehension.
    #[must_use]
    pub fn list_comp(targets: Vec<Binding>, iterables: Vec<Expr>, elt: Expr) -> Self {
        Self::new(ExprKind::ListComp {
            targets,
            iterables,
            elt: Box::new(elt),
        })
    }

    /// `value[index]`
    #[must_use]
    pub fn list_ref(value: Expr, index: Expr) -> Self {
        Self::new(ExprKind::ListRef {
            value: Box::new(value),
            index: Box::new(index),
        })
    }

    /// `value[start:stop]`
    #[must_use]
    pub fn list_slice(value: Expr, start: Option<Expr>, stop: Option<Expr>) -> Self {
        Self::new(ExprKind::ListSlice {
            value: Box::new(value),
            start: start.map(Box::new),
            stop: stop.map(Box::new),
        })
    }

    /// Functional list update.
    #[must_use]
    pub fn list_set(value: Expr, indices: Vec<Expr>, elt: Expr) -> Self {
        Self::new(ExprKind::ListSet {
            value: Box::new(value),
            indices,
            elt: Box::new(elt),
        })
    }

    /// `ift if cond else iff`
    #[must_use]
    pub fn if_expr(cond: Expr, ift: Expr, iff: Expr) -> Self {
        Self::new(ExprKind::IfExpr {
            cond: Box::new(cond),
            ift: Box::new(ift),
            iff: Box::new(iff),
        })
    }

    /// Context constructor expression.
    #[must_use]
    pub fn context(ctor: impl Into<Symbol>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Context {
            ctor: ctor.into(),
            args,
            kwargs: Vec::new(),
        })
    }

    /// Returns the referenced variable if this is a variable reference.
    #[must_use]
    pub const fn as_var(&self) -> Option<&NamedId> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` for literal leaves (numbers, booleans, foreign values).
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Bool(_)
                | ExprKind::Decnum(_)
                | ExprKind::Hexnum(_)
                | ExprKind::Integer(_)
                | ExprKind::Rational { .. }
                | ExprKind::Digits { .. }
                | ExprKind::Foreign(_)
        )
    }

    /// Mutable access to the immediate children, in the order of [`Expr::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            ExprKind::Var(_)
            | ExprKind::Bool(_)
            | ExprKind::Decnum(_)
            | ExprKind::Hexnum(_)
            | ExprKind::Integer(_)
            | ExprKind::Rational { .. }
            | ExprKind::Digits { .. }
            | ExprKind::Foreign(_)
            | ExprKind::Nullary { .. } => Vec::new(),
            ExprKind::Unary { arg, .. } => vec![&mut **arg],
            ExprKind::Binary { lhs, rhs, .. } => vec![&mut **lhs, &mut **rhs],
            ExprKind::Ternary {
                first,
                second,
                third,
                ..
            } => vec![&mut **first, &mut **second, &mut **third],
            ExprKind::Nary { args, .. }
            | ExprKind::Compare { args, .. }
            | ExprKind::Tuple(args)
            | ExprKind::List(args) => args.iter_mut().collect(),
            ExprKind::Call { args, kwargs, .. } | ExprKind::Context { args, kwargs, .. } => args
                .iter_mut()
                .chain(kwargs.iter_mut().map(|(_, e)| e))
                .collect(),
            ExprKind::ListComp {
                iterables, elt, ..
            } => iterables
                .iter_mut()
                .chain(std::iter::once(&mut **elt))
                .collect(),
            ExprKind::ListRef { value, index } => vec![&mut **value, &mut **index],
            ExprKind::ListSlice { value, start, stop } => std::iter::once(&mut **value)
                .chain(start.as_deref_mut())
                .chain(stop.as_deref_mut())
                .collect(),
            ExprKind::ListSet {
                value,
                indices,
                elt,
            } => std::iter::once(&mut **value)
                .chain(indices.iter_mut())
                .chain(std::iter::once(&mut **elt))
                .collect(),
            ExprKind::IfExpr { cond, ift, iff } => vec![&mut **cond, &mut **ift, &mut **iff],
        }
    }

    /// Immediate children in evaluation order.
    ///
    /// Comprehension elements are included even though they are evaluated in an extended scope.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Var(_)
            | ExprKind::Bool(_)
            | ExprKind::Decnum(_)
            | ExprKind::Hexnum(_)
            | ExprKind::Integer(_)
            | ExprKind::Rational { .. }
            | ExprKind::Digits { .. }
            | ExprKind::Foreign(_)
            | ExprKind::Nullary { .. } => Vec::new(),
            ExprKind::Unary { arg, .. } => vec![&**arg],
            ExprKind::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            ExprKind::Ternary {
                first,
                second,
                third,
                ..
            } => vec![&**first, &**second, &**third],
            ExprKind::Nary { args, .. }
            | ExprKind::Compare { args, .. }
            | ExprKind::Tuple(args)
            | ExprKind::List(args) => args.iter().collect(),
            ExprKind::Call { args, kwargs, .. } | ExprKind::Context { args, kwargs, .. } => args
                .iter()
                .chain(kwargs.iter().map(|(_, e)| e))
                .collect(),
            ExprKind::ListComp {
                iterables, elt, ..
            } => iterables.iter().chain(std::iter::once(&**elt)).collect(),
            ExprKind::ListRef { value, index } => vec![&**value, &**index],
            ExprKind::ListSlice { value, start, stop } => std::iter::once(&**value)
                .chain(start.as_deref())
                .chain(stop.as_deref())
                .collect(),
            ExprKind::ListSet {
                value,
                indices,
                elt,
            } => std::iter::once(&**value)
                .chain(indices.iter())
                .chain(std::iter::once(&**elt))
                .collect(),
            ExprKind::IfExpr { cond, ift, iff } => vec![&**cond, &**ift, &**iff],
        }
    }
}
