//! Statement and block nodes.

use super::{Binding, Expr, Loc, NamedId, NodeId, TypeAnn};

/// The variants of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `target[: ann] = expr`
    Assign {
        /// Bound pattern
        target: Binding,
        /// Optional type annotation
        ann: Option<TypeAnn>,
        /// Right-hand side
        expr: Expr,
    },
    /// `var[i0][i1]... = expr`
    IndexedAssign {
        /// Mutated array
        var: NamedId,
        /// Index path
        indices: Vec<Expr>,
        /// Stored value
        expr: Expr,
    },
    /// `if cond: body`
    If1 {
        /// Condition
        cond: Expr,
        /// Guarded block
        body: Block,
    },
    /// `if cond: ift else: iff`
    If {
        /// Condition
        cond: Expr,
        /// Taken when the condition holds
        ift: Block,
        /// Taken otherwise
        iff: Block,
    },
    /// `while cond: body`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Block,
    },
    /// `for target in iterable: body`
    For {
        /// Loop target pattern
        target: Binding,
        /// Iterated list
        iterable: Expr,
        /// Loop body
        body: Block,
    },
    /// `with ctx [as name]: body`
    Context {
        /// Optional name bound to the context value
        name: Option<NamedId>,
        /// Context value
        ctx: Expr,
        /// Scoped block
        body: Block,
    },
    /// `assert test[, msg]`
    Assert {
        /// Asserted condition
        test: Expr,
        /// Optional message
        msg: Option<Expr>,
    },
    /// Expression evaluated for its side effects
    Effect(Expr),
    /// `return expr`
    Return(Expr),
    /// `pass`
    Pass,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Identity of the node
    pub id: NodeId,
    /// The statement itself
    pub kind: StmtKind,
    /// Source location
    pub loc: Option<Loc>,
}

impl Stmt {
    /// Wraps a kind into a node with a fresh id.
    #[must_use]
    pub fn new(kind: StmtKind) -> Self {
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

    /// Unannotated assignment.
    #[must_use]
    pub fn assign(target: impl Into<Binding>, expr: Expr) -> Self {
        Self::new(StmtKind::Assign {
            target: target.into(),
            ann: None,
            expr,
        })
    }

    /// Annotated assignment.
    #[must_use]
    pub fn assign_ann(target: impl Into<Binding>, ann: TypeAnn, expr: Expr) -> Self {
        Self::new(StmtKind::Assign {
            target: target.into(),
            ann: Some(ann),
            expr,
        })
    }

    /// Indexed assignment.
    #[must_use]
    pub fn indexed_assign(var: impl Into<NamedId>, indices: Vec<Expr>, expr: Expr) -> Self {
        Self::new(StmtKind::IndexedAssign {
            var: var.into(),
            indices,
            expr,
        })
    }

    /// One-arm if.
    #[must_use]
    pub fn if1(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::If1 {
            cond,
            body: Block::new(body),
        })
    }

    /// Two-arm if.
    #[must_use]
    pub fn if2(cond: Expr, ift: Vec<Stmt>, iff: Vec<Stmt>) -> Self {
        Self::new(StmtKind::If {
            cond,
            ift: Block::new(ift),
            iff: Block::new(iff),
        })
    }

    /// While loop.
    #[must_use]
    pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::While {
            cond,
            body: Block::new(body),
        })
    }

    /// For loop.
    #[must_use]
    pub fn for_loop(target: impl Into<Binding>, iterable: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::For {
            target: target.into(),
            iterable,
            body: Block::new(body),
        })
    }

    /// Context statement.
    #[must_use]
    pub fn context(name: Option<NamedId>, ctx: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Context {
            name,
            ctx,
            body: Block::new(body),
        })
    }

    /// Assertion without message.
    #[must_use]
    pub fn assert(test: Expr) -> Self {
        Self::new(StmtKind::Assert { test, msg: None })
    }

    /// Effect statement.
    #[must_use]
    pub fn effect(expr: Expr) -> Self {
        Self::new(StmtKind::Effect(expr))
    }

    /// Return statement.
    #[must_use]
    pub fn ret(expr: Expr) -> Self {
        Self::new(StmtKind::Return(expr))
    }

    /// `pass`
    #[must_use]
    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }

    /// Expressions directly owned by the statement, in evaluation order.
    #[must_use]
    pub fn exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Assign { expr, .. } | StmtKind::Effect(expr) | StmtKind::Return(expr) => {
                vec![expr]
            }
            StmtKind::IndexedAssign { indices, expr, .. } => {
                indices.iter().chain(std::iter::once(expr)).collect()
            }
            StmtKind::If1 { cond, .. } | StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
                vec![cond]
            }
            StmtKind::For { iterable, .. } => vec![iterable],
            StmtKind::Context { ctx, .. } => vec![ctx],
            StmtKind::Assert { test, msg } => std::iter::once(test).chain(msg.as_ref()).collect(),
            StmtKind::Pass => Vec::new(),
        }
    }

    /// Mutable access to the expressions directly owned by the statement.
    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            StmtKind::Assign { expr, .. } | StmtKind::Effect(expr) | StmtKind::Return(expr) => {
                vec![expr]
            }
            StmtKind::IndexedAssign { indices, expr, .. } => {
                indices.iter_mut().chain(std::iter::once(expr)).collect()
            }
            StmtKind::If1 { cond, .. } | StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
                vec![cond]
            }
            StmtKind::For { iterable, .. } => vec![iterable],
            StmtKind::Context { ctx, .. } => vec![ctx],
            StmtKind::Assert { test, msg } => {
                std::iter::once(test).chain(msg.as_mut()).collect()
            }
            StmtKind::Pass => Vec::new(),
        }
    }

    /// Mutable access to the nested blocks.
    pub fn blocks_mut(&mut self) -> Vec<&mut Block> {
        match &mut self.kind {
            StmtKind::If1 { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::For { body, .. }
            | StmtKind::Context { body, .. } => vec![body],
            StmtKind::If { ift, iff, .. } => vec![ift, iff],
            _ => Vec::new(),
        }
    }

    /// Nested blocks in source order.
    #[must_use]
    pub fn blocks(&self) -> Vec<&Block> {
        match &self.kind {
            StmtKind::If1 { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::For { body, .. }
            | StmtKind::Context { body, .. } => vec![body],
            StmtKind::If { ift, iff, .. } => vec![ift, iff],
            _ => Vec::new(),
        }
    }
}

/// An ordered sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Identity of the block
    pub id: NodeId,
    /// Statements in execution order
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Creates a block with a fresh id.
    #[must_use]
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self {
            id: NodeId::fresh(),
            stmts,
        }
    }

    /// Returns `true` if the block has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stmts.len()
    }
}
