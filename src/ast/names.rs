//! Name utilities shared by the analyses and passes.
//!
//! - [`Gensym`] hands out identifiers guaranteed not to clash with any name already in use.
//! - [`rename_block`] and friends α-rename binders and uses together.
//! - [`assigned_names`], [`bound_names`], [`referenced_names`] and [`free_variables`] compute the
//!   name sets the reaching-definitions pre-pass, inlining and dead-code elimination need.
//! - [`refresh_ids`] and friends turn a cloned subtree into a structural copy with new node ids.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{
    fold::{self, Fold},
    visit::{self, Visit},
    Binding, Block, Expr, ExprKind, FuncDef, NamedId, NodeId, Stmt, StmtKind, Symbol,
};
use crate::Result;

/// Fresh-name generator.
///
/// Names are produced as `base` with an increasing disambiguator, skipping every name reserved
/// so far. Seed it with [`Gensym::from_func`] so generated names never capture existing ones.
#[derive(Debug, Clone, Default)]
pub struct Gensym {
    used: BTreeSet<NamedId>,
    counters: HashMap<Symbol, u32>,
}

impl Gensym {
    /// Creates a generator with nothing reserved.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator that avoids every name occurring in `func`.
    #[must_use]
    pub fn from_func(func: &FuncDef) -> Self {
        let mut gensym = Self::new();
        for name in all_names(func) {
            gensym.reserve(name);
        }
        gensym
    }

    /// Marks a name as taken.
    pub fn reserve(&mut self, name: NamedId) {
        self.used.insert(name);
    }

    /// Returns `true` if the name is taken.
    #[must_use]
    pub fn is_reserved(&self, name: &NamedId) -> bool {
        self.used.contains(name)
    }

    /// Generates a fresh name with the given base spelling.
    pub fn fresh(&mut self, base: &str) -> NamedId {
        let symbol: Symbol = Symbol::from(base);
        let counter = self.counters.entry(symbol.clone()).or_insert(0);
        loop {
            let candidate = NamedId::with_count(symbol.clone(), *counter);
            *counter += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Generates a fresh name derived from an existing one.
    pub fn refresh(&mut self, name: &NamedId) -> NamedId {
        self.fresh(name.base())
    }
}

struct Rename<'a> {
    map: &'a BTreeMap<NamedId, NamedId>,
}

impl Fold for Rename<'_> {
    fn fold_name(&mut self, name: NamedId) -> Result<NamedId> {
        Ok(self.map.get(&name).cloned().unwrap_or(name))
    }
}

/// α-renames every occurrence (binder or use) of the mapped names in a block.
///
/// # Errors
///
/// Never fails today; the signature follows [`Fold`].
pub fn rename_block(block: Block, map: &BTreeMap<NamedId, NamedId>) -> Result<Block> {
    Rename { map }.fold_block(block)
}

/// α-renames every occurrence of the mapped names in a statement.
///
/// # Errors
///
/// Never fails today; the signature follows [`Fold`].
pub fn rename_stmt(stmt: Stmt, map: &BTreeMap<NamedId, NamedId>) -> Result<Vec<Stmt>> {
    Rename { map }.fold_stmt(stmt)
}

/// α-renames every occurrence of the mapped names in an expression.
///
/// # Errors
///
/// Never fails today; the signature follows [`Fold`].
pub fn rename_expr(expr: Expr, map: &BTreeMap<NamedId, NamedId>) -> Result<Expr> {
    Rename { map }.fold_expr(expr)
}

/// α-renames a binding pattern.
#[must_use]
pub fn rename_binding(binding: &Binding, map: &BTreeMap<NamedId, NamedId>) -> Binding {
    match binding {
        Binding::Id(super::Id::Named(name)) => {
            Binding::named(map.get(name).cloned().unwrap_or_else(|| name.clone()))
        }
        Binding::Id(super::Id::Underscore) => binding.clone(),
        Binding::Tuple(elts) => {
            Binding::Tuple(elts.iter().map(|elt| rename_binding(elt, map)).collect())
        }
    }
}

/// Gives an expression and all of its descendants new node ids.
pub fn refresh_expr(expr: &mut Expr) {
    expr.id = NodeId::fresh();
    for child in expr.children_mut() {
        refresh_expr(child);
    }
}

/// Gives a statement and all of its descendants new node ids.
pub fn refresh_stmt(stmt: &mut Stmt) {
    stmt.id = NodeId::fresh();
    for expr in stmt.exprs_mut() {
        refresh_expr(expr);
    }
    for block in stmt.blocks_mut() {
        refresh_block(block);
    }
}

/// Gives a block and all of its descendants new node ids.
pub fn refresh_block(block: &mut Block) {
    block.id = NodeId::fresh();
    for stmt in &mut block.stmts {
        refresh_stmt(stmt);
    }
}

/// Structural copy of a block: same shape, new node ids throughout.
#[must_use]
pub fn refresh_ids(block: &Block) -> Block {
    let mut copy = block.clone();
    refresh_block(&mut copy);
    copy
}

#[derive(Default)]
struct NameSets {
    assigned: BTreeSet<NamedId>,
    comp_bound: BTreeSet<NamedId>,
    vars: BTreeSet<NamedId>,
    calls: BTreeSet<NamedId>,
}

struct NameCollector {
    sets: NameSets,
}

impl Visit for NameCollector {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::IndexedAssign { var, .. } => {
                self.sets.assigned.insert(var.clone());
                self.sets.vars.insert(var.clone());
            }
            StmtKind::Context {
                name: Some(name), ..
            } => {
                self.sets.assigned.insert(name.clone());
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Var(name) => {
                self.sets.vars.insert(name.clone());
            }
            ExprKind::Call { func, .. } => {
                self.sets.calls.insert(func.clone());
            }
            ExprKind::ListComp {
                targets,
                iterables,
                elt,
            } => {
                for iterable in iterables {
                    self.visit_expr(iterable);
                }
                for target in targets {
                    self.sets
                        .comp_bound
                        .extend(target.names().into_iter().cloned());
                }
                self.visit_expr(elt);
                return;
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }

    fn visit_binding(&mut self, binding: &Binding, _site: NodeId) {
        self.sets
            .assigned
            .extend(binding.names().into_iter().cloned());
    }
}

fn collect_block(block: &Block) -> NameSets {
    let mut collector = NameCollector {
        sets: NameSets::default(),
    };
    collector.visit_block(block);
    collector.sets
}

/// Names assigned anywhere in a block, including nested blocks.
///
/// Covers assignment and loop targets, indexed-assignment arrays and `with ... as` names.
/// Comprehension targets are local to their expression and excluded.
#[must_use]
pub fn assigned_names(block: &Block) -> BTreeSet<NamedId> {
    collect_block(block).assigned
}

/// Names bound anywhere in a block, comprehension targets included.
#[must_use]
pub fn bound_names(block: &Block) -> BTreeSet<NamedId> {
    let collected = collect_block(block);
    collected
        .assigned
        .into_iter()
        .chain(collected.comp_bound)
        .collect()
}

/// Names read as variables anywhere in a block (indexed-assignment arrays count as reads).
#[must_use]
pub fn referenced_names(block: &Block) -> BTreeSet<NamedId> {
    collect_block(block).vars
}

/// Names used as call targets anywhere in a block.
#[must_use]
pub fn called_names(block: &Block) -> BTreeSet<NamedId> {
    collect_block(block).calls
}

/// Names a function reads but never binds: the set its `free_vars` must cover.
#[must_use]
pub fn free_variables(func: &FuncDef) -> BTreeSet<NamedId> {
    let collected = collect_block(&func.body);
    let params: BTreeSet<&NamedId> = func.param_names().collect();
    collected
        .vars
        .into_iter()
        .filter(|name| {
            !params.contains(name)
                && !collected.assigned.contains(name)
                && !collected.comp_bound.contains(name)
        })
        .collect()
}

/// Every identifier occurring in a function: parameters, free variables, binders and uses.
#[must_use]
pub fn all_names(func: &FuncDef) -> BTreeSet<NamedId> {
    let collected = collect_block(&func.body);
    let mut names: BTreeSet<NamedId> = func.param_names().cloned().collect();
    names.extend(func.free_vars.iter().cloned());
    names.extend(collected.assigned);
    names.extend(collected.comp_bound);
    names.extend(collected.vars);
    names.extend(collected.calls);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn sample() -> FuncDef {
        FuncDef::new(
            "f",
            vec![Argument::new("x")],
            Block::new(vec![
                Stmt::assign("y", Expr::add(Expr::var("x"), Expr::var("g"))),
                Stmt::while_loop(
                    Expr::compare(CompareOp::Lt, Expr::var("y"), Expr::int(10)),
                    vec![Stmt::assign(
                        "y",
                        Expr::list_comp(
                            vec![Binding::from("i")],
                            vec![Expr::var("xs")],
                            Expr::var("i"),
                        ),
                    )],
                ),
                Stmt::ret(Expr::call("h", None, vec![Expr::var("y")])),
            ]),
        )
        .with_free_vars(["g", "xs"])
    }

    #[test]
    fn test_name_sets() {
        let func = sample();
        let assigned = assigned_names(&func.body);
        assert_eq!(assigned, BTreeSet::from([NamedId::new("y")]));

        let bound = bound_names(&func.body);
        assert!(bound.contains(&NamedId::new("i")));

        let free = free_variables(&func);
        assert_eq!(free, BTreeSet::from([NamedId::new("g"), NamedId::new("xs")]));

        let called = called_names(&func.body);
        assert_eq!(called, BTreeSet::from([NamedId::new("h")]));
    }

    #[test]
    fn test_gensym_avoids_existing_names() {
        let func = sample();
        let mut gensym = Gensym::from_func(&func);
        gensym.reserve(NamedId::with_count("y", 0));
        let a = gensym.fresh("y");
        let b = gensym.fresh("y");
        assert_eq!(a, NamedId::with_count("y", 1));
        assert_eq!(b, NamedId::with_count("y", 2));
    }

    #[test]
    fn test_rename_updates_binders_and_uses() {
        let block = Block::new(vec![
            Stmt::assign("y", Expr::var("x")),
            Stmt::indexed_assign("y", vec![Expr::int(0)], Expr::var("y")),
        ]);
        let map = BTreeMap::from([(NamedId::new("y"), NamedId::with_count("y", 7))]);
        let renamed = rename_block(block, &map).unwrap();
        let fresh = NamedId::with_count("y", 7);
        assert_eq!(assigned_names(&renamed), BTreeSet::from([fresh.clone()]));
        assert!(referenced_names(&renamed).contains(&fresh));
        assert!(!referenced_names(&renamed).contains(&NamedId::new("y")));
    }

    #[test]
    fn test_refresh_ids_copies_structure() {
        let block = sample().body;
        let copy = refresh_ids(&block);
        assert!(copy.is_equiv(&block));
        assert_ne!(copy.id, block.id);
        assert_ne!(copy.stmts[0].id, block.stmts[0].id);
    }
}
