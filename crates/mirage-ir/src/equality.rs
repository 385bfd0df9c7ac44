//! Structural equality and total ordering
//!
//! A three-way comparator over expressions and statements, usable as a
//! sort/map key. Nodes of different kinds order by their registration tag;
//! same-kind nodes order by result type, then child fields in a fixed
//! per-kind order, short-circuiting on the first difference.
//!
//! Because subtrees are shared (the IR is a DAG), naive recursion re-compares
//! a shared subtree once per reference, which is exponential on deeply shared
//! trees. Passing a [`CompareCache`] records pairs already found equal and
//! bounds the comparison to one real descent per distinct pair. Only genuine
//! equality is ever cached.

use crate::expr::{Expr, ExprKind};
use crate::hash;
use crate::stmt::{Stmt, StmtKind};
use mirage_error::internal_error;
use std::cell::RefCell;
use std::cmp::Ordering;

/// A fixed-size, lossy table of expression pairs known to be equal.
///
/// Indexed by the pairs' precomputed structural hashes; colliding inserts
/// overwrite. Losing an entry only costs a re-comparison, never correctness.
#[derive(Debug)]
pub struct CompareCache {
    entries: Vec<Option<(Expr, Expr)>>,
    mask: usize,
}

impl CompareCache {
    /// A cache with 2^bits entries.
    pub fn new(bits: u32) -> Self {
        let size = 1usize << bits;
        tracing::debug!(entries = size, "comparison cache created");
        Self {
            entries: vec![None; size],
            mask: size - 1,
        }
    }

    fn index(&self, a: &Expr, b: &Expr) -> usize {
        hash::combine(a.hash(), b.hash()) as usize & self.mask
    }

    fn contains(&self, a: &Expr, b: &Expr) -> bool {
        match &self.entries[self.index(a, b)] {
            Some((x, y)) => x.same_as(a) && y.same_as(b),
            None => false,
        }
    }

    fn insert(&mut self, a: &Expr, b: &Expr) {
        let idx = self.index(a, b);
        self.entries[idx] = Some((a.clone(), b.clone()));
    }
}

/// The worker that compares two IR trees.
struct Comparer<'a> {
    cache: Option<&'a mut CompareCache>,
}

impl<'a> Comparer<'a> {
    fn new(cache: Option<&'a mut CompareCache>) -> Self {
        Self { cache }
    }

    fn compare_expr(&mut self, a: &Expr, b: &Expr) -> Ordering {
        if a.same_as(b) {
            return Ordering::Equal;
        }
        match (a.defined(), b.defined()) {
            (false, false) => return Ordering::Equal,
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (true, true) => {}
        }
        let an = a.node().unwrap();
        let bn = b.node().unwrap();

        let by_tag = an.kind.tag().cmp(&bn.kind.tag());
        if by_tag != Ordering::Equal {
            return by_tag;
        }
        let by_type = an.ty.cmp(&bn.ty);
        if by_type != Ordering::Equal {
            return by_type;
        }

        // Perhaps these exprs have already been compared and found equal.
        if let Some(cache) = self.cache.as_deref() {
            if cache.contains(a, b) {
                return Ordering::Equal;
            }
        }

        let result = self.compare_expr_children(&an.kind, &bn.kind);

        if result == Ordering::Equal {
            if let Some(cache) = self.cache.as_deref_mut() {
                cache.insert(a, b);
            }
        }
        result
    }

    fn compare_expr_children(&mut self, a: &ExprKind, b: &ExprKind) -> Ordering {
        use ExprKind::*;
        match (a, b) {
            (IntImm { value: x }, IntImm { value: y }) => x.cmp(y),
            (FloatImm { value: x }, FloatImm { value: y }) => x.total_cmp(y),
            (StringImm { value: x }, StringImm { value: y }) => x.cmp(y),
            (Cast { value: x }, Cast { value: y }) => self.compare_expr(x, y),
            (Variable { name: x, .. }, Variable { name: y, .. }) => x.cmp(y),
            (Add { a: a1, b: b1 }, Add { a: a2, b: b2 })
            | (Sub { a: a1, b: b1 }, Sub { a: a2, b: b2 })
            | (Mul { a: a1, b: b1 }, Mul { a: a2, b: b2 })
            | (Div { a: a1, b: b1 }, Div { a: a2, b: b2 })
            | (Mod { a: a1, b: b1 }, Mod { a: a2, b: b2 })
            | (Min { a: a1, b: b1 }, Min { a: a2, b: b2 })
            | (Max { a: a1, b: b1 }, Max { a: a2, b: b2 })
            | (EQ { a: a1, b: b1 }, EQ { a: a2, b: b2 })
            | (NE { a: a1, b: b1 }, NE { a: a2, b: b2 })
            | (LT { a: a1, b: b1 }, LT { a: a2, b: b2 })
            | (LE { a: a1, b: b1 }, LE { a: a2, b: b2 })
            | (GT { a: a1, b: b1 }, GT { a: a2, b: b2 })
            | (GE { a: a1, b: b1 }, GE { a: a2, b: b2 })
            | (And { a: a1, b: b1 }, And { a: a2, b: b2 })
            | (Or { a: a1, b: b1 }, Or { a: a2, b: b2 }) => self
                .compare_expr(a1, a2)
                .then_with(|| self.compare_expr(b1, b2)),
            (Not { a: x }, Not { a: y }) => self.compare_expr(x, y),
            (
                Select {
                    condition: c1,
                    true_value: t1,
                    false_value: f1,
                },
                Select {
                    condition: c2,
                    true_value: t2,
                    false_value: f2,
                },
            ) => self
                .compare_expr(c1, c2)
                .then_with(|| self.compare_expr(t1, t2))
                .then_with(|| self.compare_expr(f1, f2)),
            (
                Load {
                    name: n1, index: i1, ..
                },
                Load {
                    name: n2, index: i2, ..
                },
            ) => n1.cmp(n2).then_with(|| self.compare_expr(i1, i2)),
            (
                Ramp {
                    base: b1,
                    stride: s1,
                    ..
                },
                Ramp {
                    base: b2,
                    stride: s2,
                    ..
                },
            ) => {
                // Width is already covered by the type comparison.
                self.compare_expr(b1, b2)
                    .then_with(|| self.compare_expr(s1, s2))
            }
            (Broadcast { value: x, .. }, Broadcast { value: y, .. }) => self.compare_expr(x, y),
            (
                Call {
                    name: n1,
                    args: a1,
                    call_type: c1,
                    value_index: v1,
                    ..
                },
                Call {
                    name: n2,
                    args: a2,
                    call_type: c2,
                    value_index: v2,
                    ..
                },
            ) => n1
                .cmp(n2)
                .then(c1.cmp(c2))
                .then(v1.cmp(v2))
                .then_with(|| self.compare_expr_list(a1, a2)),
            (
                Let {
                    name: n1,
                    value: v1,
                    body: b1,
                },
                Let {
                    name: n2,
                    value: v2,
                    body: b2,
                },
            ) => n1
                .cmp(n2)
                .then_with(|| self.compare_expr(v1, v2))
                .then_with(|| self.compare_expr(b1, b2)),
            _ => internal_error!("expression kinds with equal tags disagree"),
        }
    }

    fn compare_expr_list(&mut self, a: &[Expr], b: &[Expr]) -> Ordering {
        let mut result = a.len().cmp(&b.len());
        for (x, y) in a.iter().zip(b) {
            if result != Ordering::Equal {
                break;
            }
            result = self.compare_expr(x, y);
        }
        result
    }

    fn compare_stmt(&mut self, a: &Stmt, b: &Stmt) -> Ordering {
        if a.same_as(b) {
            return Ordering::Equal;
        }
        match (a.defined(), b.defined()) {
            (false, false) => return Ordering::Equal,
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (true, true) => {}
        }
        let an = a.node().unwrap();
        let bn = b.node().unwrap();

        let by_tag = an.kind.tag().cmp(&bn.kind.tag());
        if by_tag != Ordering::Equal {
            return by_tag;
        }
        self.compare_stmt_children(&an.kind, &bn.kind)
    }

    fn compare_stmt_children(&mut self, a: &StmtKind, b: &StmtKind) -> Ordering {
        use StmtKind::*;
        match (a, b) {
            (
                LetStmt {
                    name: n1,
                    value: v1,
                    body: b1,
                },
                LetStmt {
                    name: n2,
                    value: v2,
                    body: b2,
                },
            ) => n1
                .cmp(n2)
                .then_with(|| self.compare_expr(v1, v2))
                .then_with(|| self.compare_stmt(b1, b2)),
            (
                AssertStmt {
                    condition: c1,
                    message: m1,
                },
                AssertStmt {
                    condition: c2,
                    message: m2,
                },
            ) => self
                .compare_expr(c1, c2)
                .then_with(|| self.compare_expr(m1, m2)),
            (
                Pipeline {
                    name: n1,
                    produce: p1,
                    update: u1,
                    consume: c1,
                },
                Pipeline {
                    name: n2,
                    produce: p2,
                    update: u2,
                    consume: c2,
                },
            ) => n1
                .cmp(n2)
                .then_with(|| self.compare_stmt(p1, p2))
                .then_with(|| self.compare_stmt(u1, u2))
                .then_with(|| self.compare_stmt(c1, c2)),
            (
                For {
                    name: n1,
                    min: m1,
                    extent: e1,
                    for_type: f1,
                    body: b1,
                },
                For {
                    name: n2,
                    min: m2,
                    extent: e2,
                    for_type: f2,
                    body: b2,
                },
            ) => n1
                .cmp(n2)
                .then(f1.cmp(f2))
                .then_with(|| self.compare_expr(m1, m2))
                .then_with(|| self.compare_expr(e1, e2))
                .then_with(|| self.compare_stmt(b1, b2)),
            (
                Store {
                    name: n1,
                    value: v1,
                    index: i1,
                },
                Store {
                    name: n2,
                    value: v2,
                    index: i2,
                },
            ) => n1
                .cmp(n2)
                .then_with(|| self.compare_expr(v1, v2))
                .then_with(|| self.compare_expr(i1, i2)),
            (
                Provide {
                    name: n1,
                    values: v1,
                    args: a1,
                },
                Provide {
                    name: n2,
                    values: v2,
                    args: a2,
                },
            ) => n1
                .cmp(n2)
                .then_with(|| self.compare_expr_list(a1, a2))
                .then_with(|| self.compare_expr_list(v1, v2)),
            (
                Allocate {
                    name: n1,
                    extents: e1,
                    condition: c1,
                    body: b1,
                    ..
                },
                Allocate {
                    name: n2,
                    extents: e2,
                    condition: c2,
                    body: b2,
                    ..
                },
            ) => n1
                .cmp(n2)
                .then_with(|| self.compare_expr_list(e1, e2))
                .then_with(|| self.compare_stmt(b1, b2))
                .then_with(|| self.compare_expr(c1, c2)),
            (Free { name: n1 }, Free { name: n2 }) => n1.cmp(n2),
            (
                Realize {
                    name: n1,
                    types: t1,
                    bounds: r1,
                    condition: c1,
                    body: b1,
                },
                Realize {
                    name: n2,
                    types: t2,
                    bounds: r2,
                    condition: c2,
                    body: b2,
                },
            ) => {
                let mut result = n1
                    .cmp(n2)
                    .then(t1.len().cmp(&t2.len()))
                    .then(r1.len().cmp(&r2.len()));
                for (x, y) in t1.iter().zip(t2) {
                    if result != Ordering::Equal {
                        break;
                    }
                    result = x.cmp(y);
                }
                for (x, y) in r1.iter().zip(r2) {
                    if result != Ordering::Equal {
                        break;
                    }
                    result = self
                        .compare_expr(&x.min, &y.min)
                        .then_with(|| self.compare_expr(&x.extent, &y.extent));
                }
                result
                    .then_with(|| self.compare_stmt(b1, b2))
                    .then_with(|| self.compare_expr(c1, c2))
            }
            (
                Block {
                    first: f1,
                    rest: r1,
                },
                Block {
                    first: f2,
                    rest: r2,
                },
            ) => self
                .compare_stmt(f1, f2)
                .then_with(|| self.compare_stmt(r1, r2)),
            (
                IfThenElse {
                    condition: c1,
                    then_case: t1,
                    else_case: e1,
                },
                IfThenElse {
                    condition: c2,
                    then_case: t2,
                    else_case: e2,
                },
            ) => self
                .compare_expr(c1, c2)
                .then_with(|| self.compare_stmt(t1, t2))
                .then_with(|| self.compare_stmt(e1, e2)),
            (Evaluate { value: v1 }, Evaluate { value: v2 }) => self.compare_expr(v1, v2),
            _ => internal_error!("statement kinds with equal tags disagree"),
        }
    }
}

/// Three-way structural comparison of two expressions.
pub fn compare_expr(a: &Expr, b: &Expr) -> Ordering {
    Comparer::new(None).compare_expr(a, b)
}

/// Three-way structural comparison of two statements.
pub fn compare_stmt(a: &Stmt, b: &Stmt) -> Ordering {
    Comparer::new(None).compare_stmt(a, b)
}

/// Three-way comparison with a cache of known-equal subexpression pairs.
/// Worth supplying whenever the operands share many subexpressions.
pub fn compare_expr_cached(a: &Expr, b: &Expr, cache: &mut CompareCache) -> Ordering {
    Comparer::new(Some(cache)).compare_expr(a, b)
}

/// Whether two expressions are structurally equal.
pub fn equal(a: &Expr, b: &Expr) -> bool {
    compare_expr(a, b) == Ordering::Equal
}

/// Whether two statements are structurally equal.
pub fn equal_stmt(a: &Stmt, b: &Stmt) -> bool {
    compare_stmt(a, b) == Ordering::Equal
}

/// An expression wrapper ordered by deep structural comparison, usable as a
/// `BTreeMap`/`BTreeSet` key.
#[derive(Debug, Clone)]
pub struct ExprCompare(pub Expr);

impl PartialEq for ExprCompare {
    fn eq(&self, other: &Self) -> bool {
        equal(&self.0, &other.0)
    }
}

impl Eq for ExprCompare {}

impl PartialOrd for ExprCompare {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExprCompare {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_expr(&self.0, &other.0)
    }
}

/// A statement wrapper ordered by deep structural comparison.
#[derive(Debug, Clone)]
pub struct StmtCompare(pub Stmt);

impl PartialEq for StmtCompare {
    fn eq(&self, other: &Self) -> bool {
        equal_stmt(&self.0, &other.0)
    }
}

impl Eq for StmtCompare {}

impl PartialOrd for StmtCompare {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StmtCompare {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_stmt(&self.0, &other.0)
    }
}

/// An expression key that routes comparisons through a shared cache.
///
/// All keys in one container must share the same cache. Useful for
/// common-subexpression elimination, where the same large subtrees are
/// compared against each other many times.
#[derive(Debug, Clone)]
pub struct ExprWithCache<'a> {
    pub expr: Expr,
    pub cache: &'a RefCell<CompareCache>,
}

impl<'a> ExprWithCache<'a> {
    pub fn new(expr: Expr, cache: &'a RefCell<CompareCache>) -> Self {
        Self { expr, cache }
    }
}

impl PartialEq for ExprWithCache<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExprWithCache<'_> {}

impl PartialOrd for ExprWithCache<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExprWithCache<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut cache = self.cache.borrow_mut();
        compare_expr_cached(&self.expr, &other.expr, &mut cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn check_equal(a: &Expr, b: &Expr) {
        let mut cache = CompareCache::new(10);
        let r = compare_expr_cached(a, b, &mut cache);
        assert_eq!(r, Ordering::Equal, "comparing {:?} and {:?}", a, b);
    }

    fn check_not_equal(a: &Expr, b: &Expr) {
        let mut cache = CompareCache::new(10);
        let r1 = compare_expr_cached(a, b, &mut cache);
        let r2 = compare_expr_cached(b, a, &mut cache);
        assert_ne!(r1, Ordering::Equal);
        assert_eq!(r1.reverse(), r2, "mirror comparison disagrees");
    }

    #[test]
    fn test_ramp_equality() {
        let x = Expr::var(Type::int(32), "x");
        check_equal(
            &Expr::ramp(x.clone(), Expr::int(4), 3),
            &Expr::ramp(x.clone(), Expr::int(4), 3),
        );
        check_not_equal(
            &Expr::ramp(x.clone(), Expr::int(2), 3),
            &Expr::ramp(x.clone(), Expr::int(4), 3),
        );
    }

    #[test]
    fn test_variable_equality() {
        let x = Expr::var(Type::int(32), "x");
        check_equal(&x, &Expr::var(Type::int(32), "x"));
        check_not_equal(&x, &Expr::var(Type::int(32), "y"));
        // Same name, different type: ordered by type.
        check_not_equal(&x, &Expr::var(Type::float(32), "x"));
    }

    #[test]
    fn test_reflexive_under_sharing() {
        let x = Expr::var(Type::int(32), "x");
        let e = x.clone() * x.clone() + x;
        assert!(equal(&e, &e));
        assert!(equal(&e.clone(), &e));
    }

    #[test]
    fn test_undefined_sorts_first() {
        let x = Expr::var(Type::int(32), "x");
        assert_eq!(compare_expr(&Expr::undefined(), &x), Ordering::Less);
        assert_eq!(compare_expr(&x, &Expr::undefined()), Ordering::Greater);
        assert!(equal(&Expr::undefined(), &Expr::undefined()));
    }

    #[test]
    fn test_total_order_is_antisymmetric() {
        let x = Expr::var(Type::int(32), "x");
        let samples = vec![
            Expr::int(3),
            Expr::int(4),
            Expr::float(1.0),
            x.clone(),
            Expr::var(Type::int(32), "y"),
            x.clone() + Expr::int(1),
            x.clone() * Expr::int(2),
            Expr::ramp(x.clone(), Expr::int(1), 4),
            Expr::broadcast(x.clone(), 4),
        ];
        for a in &samples {
            for b in &samples {
                let ab = compare_expr(a, b);
                let ba = compare_expr(b, a);
                assert_eq!(ab.reverse(), ba);
                if a.same_as(b) {
                    assert_eq!(ab, Ordering::Equal);
                }
            }
        }
    }

    // Something that would hang if comparison had poor computational
    // complexity on heavily shared trees.
    #[test]
    fn test_cached_compare_on_shared_dag() {
        let x = Expr::var(Type::int(32), "x");
        let mut e1 = x.clone();
        let mut e2 = x.clone();
        for _ in 0..100 {
            e1 = e1.clone() * e1.clone() + e1;
            e2 = e2.clone() * e2.clone() + e2;
        }
        check_equal(&e1, &e2);
        // Only discovered to be unequal way down the tree.
        e2 = e2.clone() * e2.clone() + e2;
        check_not_equal(&e1, &e2);
    }

    #[test]
    fn test_stmt_comparison() {
        let a = Stmt::store("buf", Expr::int(1), Expr::int(0));
        let b = Stmt::store("buf", Expr::int(1), Expr::int(0));
        let c = Stmt::store("buf", Expr::int(2), Expr::int(0));
        assert!(equal_stmt(&a, &b));
        assert_eq!(compare_stmt(&a, &c).reverse(), compare_stmt(&c, &a));
        assert_ne!(compare_stmt(&a, &c), Ordering::Equal);
    }

    #[test]
    fn test_expr_compare_as_map_key() {
        use std::collections::BTreeMap;
        let x = Expr::var(Type::int(32), "x");
        let mut map = BTreeMap::new();
        map.insert(ExprCompare(x.clone() + Expr::int(1)), "a");
        map.insert(ExprCompare(x.clone() + Expr::int(2)), "b");
        // Structurally equal key hits the same slot.
        map.insert(ExprCompare(x.clone() + Expr::int(1)), "c");
        assert_eq!(map.len(), 2);
        assert_eq!(map[&ExprCompare(x + Expr::int(1))], "c");
    }

    #[test]
    fn test_expr_with_cache_key() {
        use std::collections::BTreeSet;
        let cache = RefCell::new(CompareCache::new(8));
        let x = Expr::var(Type::int(32), "x");
        let mut e = x.clone();
        for _ in 0..50 {
            e = e.clone() * e.clone() + e;
        }
        let mut set = BTreeSet::new();
        set.insert(ExprWithCache::new(e.clone(), &cache));
        set.insert(ExprWithCache::new(e.clone(), &cache));
        assert_eq!(set.len(), 1);
    }
}
