//! Fan-out rewriting
//!
//! [`MultiMutate`] maps one expression to an ordered list of expressions
//! (and likewise for statements), which is what vectorization-splitting
//! transforms need: one vector operation becomes N scalar operations, one
//! let-bound name forks into a renamed copy per branch.
//!
//! The recursive contract: mutate each child independently, take the longest
//! child candidate list as the fork count, and build one result per fork
//! index, reusing a child's single candidate for every index when it did not
//! fork. `None` means "no rewrite applies to this subtree" and propagates
//! upward; it is a soft signal, not an error. A successful mutation always
//! yields at least one result.
//!
//! Transforms implement the trait, override the node kinds they rewrite, and
//! delegate everything else to [`mutate_expr_default`] /
//! [`mutate_stmt_default`].

use crate::expr::{Expr, ExprKind};
use crate::scope::Scope;
use crate::stmt::{Range, Region, Stmt, StmtKind};
use crate::types::Type;
use mirage_error::internal_assert;

/// A rewrite that can turn one node into several.
pub trait MultiMutate {
    /// Bookkeeping for names forked upstream: maps a let or loop variable
    /// name to the number of copies it forked into. References to a
    /// registered name expand into `name.0 .. name.{k-1}`.
    fn let_forks(&mut self) -> &mut Scope<usize>;

    /// Mutate an expression into its fork candidates. `None` means the
    /// subtree could not be rewritten.
    fn mutate_expr(&mut self, expr: &Expr) -> Option<Vec<Expr>> {
        mutate_expr_default(self, expr)
    }

    /// Mutate a statement into its fork candidates.
    fn mutate_stmt(&mut self, stmt: &Stmt) -> Option<Vec<Stmt>> {
        mutate_stmt_default(self, stmt)
    }

    /// Mutate a type. The default fork of Cast, Load, and Call nodes uses
    /// this to pick the types of the copies; by default nothing forks.
    fn mutate_type(&mut self, ty: Type) -> Vec<Type> {
        vec![ty]
    }
}

/// The i-th candidate, or the only candidate broadcast to every index.
///
/// A child that did not fork supplies its single value to every fork of its
/// siblings; anything else is a contract violation by the caller.
fn first_or_nth<T: Clone>(vec: &[T], n: usize) -> T {
    if n < vec.len() {
        return vec[n].clone();
    }
    internal_assert!(
        vec.len() == 1,
        "child forked {} ways where {} were needed",
        vec.len(),
        n + 1
    );
    vec[0].clone()
}

fn binary_parts(kind: &ExprKind) -> Option<(&Expr, &Expr, fn(Expr, Expr) -> Expr)> {
    use ExprKind::*;
    match kind {
        Add { a, b } => Some((a, b, Expr::add)),
        Sub { a, b } => Some((a, b, Expr::sub)),
        Mul { a, b } => Some((a, b, Expr::mul)),
        Div { a, b } => Some((a, b, Expr::div)),
        Mod { a, b } => Some((a, b, Expr::modulo)),
        Min { a, b } => Some((a, b, Expr::min)),
        Max { a, b } => Some((a, b, Expr::max)),
        EQ { a, b } => Some((a, b, Expr::eq)),
        NE { a, b } => Some((a, b, Expr::ne)),
        LT { a, b } => Some((a, b, Expr::lt)),
        LE { a, b } => Some((a, b, Expr::le)),
        GT { a, b } => Some((a, b, Expr::gt)),
        GE { a, b } => Some((a, b, Expr::ge)),
        And { a, b } => Some((a, b, Expr::and)),
        Or { a, b } => Some((a, b, Expr::or)),
        _ => None,
    }
}

/// The default per-kind expression fan-out.
pub fn mutate_expr_default<M: MultiMutate + ?Sized>(m: &mut M, expr: &Expr) -> Option<Vec<Expr>> {
    let Some(node) = expr.node() else {
        // The undefined expression passes through; optional children stay
        // optional in every fork.
        return Some(vec![Expr::undefined()]);
    };

    if let Some((a, b, make)) = binary_parts(&node.kind) {
        let forks_a = m.mutate_expr(a)?;
        let forks_b = m.mutate_expr(b)?;
        let size = forks_a.len().max(forks_b.len());
        let mut result = Vec::with_capacity(size);
        for i in 0..size {
            let fa = first_or_nth(&forks_a, i);
            let fb = first_or_nth(&forks_b, i);
            if fa.same_as(a) && fb.same_as(b) {
                result.push(expr.clone());
            } else {
                result.push(make(fa, fb));
            }
        }
        return Some(result);
    }

    match &node.kind {
        // The binary kinds are handled above by `binary_parts`; control never
        // reaches here for them.
        ExprKind::Add { .. }
        | ExprKind::Sub { .. }
        | ExprKind::Mul { .. }
        | ExprKind::Div { .. }
        | ExprKind::Mod { .. }
        | ExprKind::Min { .. }
        | ExprKind::Max { .. }
        | ExprKind::EQ { .. }
        | ExprKind::NE { .. }
        | ExprKind::LT { .. }
        | ExprKind::LE { .. }
        | ExprKind::GT { .. }
        | ExprKind::GE { .. }
        | ExprKind::And { .. }
        | ExprKind::Or { .. } => unreachable!("binary kinds are handled by binary_parts"),
        ExprKind::IntImm { .. } | ExprKind::FloatImm { .. } | ExprKind::StringImm { .. } => {
            Some(vec![expr.clone()])
        }
        ExprKind::Cast { value } => {
            let values = m.mutate_expr(value)?;
            let types = m.mutate_type(node.ty);
            if types.is_empty() {
                return None;
            }
            let size = values.len().max(types.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let v = first_or_nth(&values, i);
                let t = first_or_nth(&types, i);
                if v.same_as(value) && t == node.ty {
                    result.push(expr.clone());
                } else {
                    result.push(Expr::cast(t, v));
                }
            }
            Some(result)
        }
        ExprKind::Variable { name, .. } => {
            if m.let_forks().contains(name) {
                let num_forks = *m.let_forks().get(name);
                tracing::trace!(variable = %name, forks = num_forks, "expanding forked variable");
                Some(
                    (0..num_forks)
                        .map(|i| Expr::var(node.ty, format!("{}.{}", name, i)))
                        .collect(),
                )
            } else {
                Some(vec![expr.clone()])
            }
        }
        ExprKind::Not { a } => {
            let forks = m.mutate_expr(a)?;
            Some(
                forks
                    .into_iter()
                    .map(|f| if f.same_as(a) { expr.clone() } else { Expr::not(f) })
                    .collect(),
            )
        }
        ExprKind::Select {
            condition,
            true_value,
            false_value,
        } => {
            let conditions = m.mutate_expr(condition)?;
            let trues = m.mutate_expr(true_value)?;
            let falses = m.mutate_expr(false_value)?;
            let size = conditions.len().max(trues.len()).max(falses.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let c = first_or_nth(&conditions, i);
                let t = first_or_nth(&trues, i);
                let f = first_or_nth(&falses, i);
                if c.same_as(condition) && t.same_as(true_value) && f.same_as(false_value) {
                    result.push(expr.clone());
                } else {
                    result.push(Expr::select(c, t, f));
                }
            }
            Some(result)
        }
        ExprKind::Load {
            name,
            index,
            image,
            param,
        } => {
            let indexes = m.mutate_expr(index)?;
            let types = m.mutate_type(node.ty);
            if types.is_empty() {
                return None;
            }
            let size = indexes.len().max(types.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let idx = first_or_nth(&indexes, i);
                let t = first_or_nth(&types, i);
                if idx.same_as(index) && t == node.ty {
                    result.push(expr.clone());
                } else {
                    result.push(Expr::load(t, name.clone(), idx, image.clone(), param.clone()));
                }
            }
            Some(result)
        }
        ExprKind::Ramp { base, stride, width } => {
            let bases = m.mutate_expr(base)?;
            let strides = m.mutate_expr(stride)?;
            let size = bases.len().max(strides.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let b = first_or_nth(&bases, i);
                let s = first_or_nth(&strides, i);
                if b.same_as(base) && s.same_as(stride) {
                    result.push(expr.clone());
                } else {
                    result.push(Expr::ramp(b, s, *width));
                }
            }
            Some(result)
        }
        ExprKind::Broadcast { value, width } => {
            let values = m.mutate_expr(value)?;
            Some(
                values
                    .into_iter()
                    .map(|v| {
                        if v.same_as(value) {
                            expr.clone()
                        } else {
                            Expr::broadcast(v, *width)
                        }
                    })
                    .collect(),
            )
        }
        ExprKind::Call {
            name,
            args,
            call_type,
            func,
            value_index,
            image,
            param,
        } => {
            let types = m.mutate_type(node.ty);
            if types.is_empty() {
                return None;
            }
            let mut size = types.len();
            let mut arg_forks = Vec::with_capacity(args.len());
            for arg in args {
                let forks = m.mutate_expr(arg)?;
                size = size.max(forks.len());
                arg_forks.push(forks);
            }
            let mut result = Vec::with_capacity(size);
            for j in 0..size {
                let t = first_or_nth(&types, j);
                let mut unchanged = t == node.ty;
                let mut new_args = Vec::with_capacity(args.len());
                for (i, forks) in arg_forks.iter().enumerate() {
                    let a = first_or_nth(forks, j);
                    unchanged &= a.same_as(&args[i]);
                    new_args.push(a);
                }
                if unchanged {
                    result.push(expr.clone());
                } else {
                    result.push(Expr::call(
                        t,
                        name.clone(),
                        new_args,
                        *call_type,
                        func.clone(),
                        *value_index,
                        image.clone(),
                        param.clone(),
                    ));
                }
            }
            Some(result)
        }
        ExprKind::Let { name, value, body } => {
            let values = m.mutate_expr(value)?;
            let bodies = m.mutate_expr(body)?;
            let size = values.len().max(bodies.len());
            if size == 1 {
                if values[0].same_as(value) && bodies[0].same_as(body) {
                    Some(vec![expr.clone()])
                } else {
                    Some(vec![Expr::let_in(
                        name.clone(),
                        values[0].clone(),
                        bodies[0].clone(),
                    )])
                }
            } else if bodies.len() == 1 {
                // Only the value forked: wrap the renamed bindings around the
                // single body in series.
                let mut wrapped = bodies[0].clone();
                for (i, v) in values.iter().enumerate() {
                    wrapped = Expr::let_in(format!("{}.{}", name, i), v.clone(), wrapped);
                }
                Some(vec![wrapped])
            } else {
                // Keep names unique by renaming the binding in each fork, and
                // record the fork count so deeper references to the name
                // expand the same way.
                m.let_forks().push(name.clone(), size);
                let mut result = Vec::with_capacity(size);
                for i in 0..size {
                    let v = first_or_nth(&values, i);
                    let b = first_or_nth(&bodies, i);
                    result.push(Expr::let_in(format!("{}.{}", name, i), v, b));
                }
                Some(result)
            }
        }
    }
}

/// The default per-kind statement fan-out.
pub fn mutate_stmt_default<M: MultiMutate + ?Sized>(m: &mut M, stmt: &Stmt) -> Option<Vec<Stmt>> {
    let Some(node) = stmt.node() else {
        return Some(vec![Stmt::undefined()]);
    };

    match &node.kind {
        StmtKind::LetStmt { name, value, body } => {
            let values = m.mutate_expr(value)?;
            let bodies = m.mutate_stmt(body)?;
            let size = values.len().max(bodies.len());
            if size == 1 {
                if values[0].same_as(value) && bodies[0].same_as(body) {
                    Some(vec![stmt.clone()])
                } else {
                    Some(vec![Stmt::let_stmt(
                        name.clone(),
                        values[0].clone(),
                        bodies[0].clone(),
                    )])
                }
            } else if bodies.len() == 1 {
                let mut wrapped = bodies[0].clone();
                for (i, v) in values.iter().enumerate() {
                    wrapped = Stmt::let_stmt(format!("{}.{}", name, i), v.clone(), wrapped);
                }
                Some(vec![wrapped])
            } else {
                m.let_forks().push(name.clone(), size);
                let mut result = Vec::with_capacity(size);
                for i in 0..size {
                    let v = first_or_nth(&values, i);
                    let b = first_or_nth(&bodies, i);
                    result.push(Stmt::let_stmt(format!("{}.{}", name, i), v, b));
                }
                Some(result)
            }
        }
        StmtKind::AssertStmt { condition, message } => {
            let conditions = m.mutate_expr(condition)?;
            let messages = m.mutate_expr(message)?;
            let size = conditions.len().max(messages.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let c = first_or_nth(&conditions, i);
                let msg = first_or_nth(&messages, i);
                if c.same_as(condition) && msg.same_as(message) {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::assert_stmt(c, msg));
                }
            }
            Some(result)
        }
        StmtKind::Pipeline {
            name,
            produce,
            update,
            consume,
        } => {
            let produces = m.mutate_stmt(produce)?;
            let updates = m.mutate_stmt(update)?;
            let consumes = m.mutate_stmt(consume)?;
            let size = produces.len().max(updates.len()).max(consumes.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let p = first_or_nth(&produces, i);
                let u = first_or_nth(&updates, i);
                let c = first_or_nth(&consumes, i);
                if p.same_as(produce) && u.same_as(update) && c.same_as(consume) {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::pipeline(name.clone(), p, u, c));
                }
            }
            Some(result)
        }
        StmtKind::For {
            name,
            min,
            extent,
            for_type,
            body,
        } => {
            let mins = m.mutate_expr(min)?;
            let extents = m.mutate_expr(extent)?;
            let bodies = m.mutate_stmt(body)?;
            let size = mins.len().max(extents.len()).max(bodies.len());
            if size == 1 {
                let (mn, e, b) = (mins[0].clone(), extents[0].clone(), bodies[0].clone());
                if mn.same_as(min) && e.same_as(extent) && b.same_as(body) {
                    Some(vec![stmt.clone()])
                } else {
                    Some(vec![Stmt::for_loop(name.clone(), mn, e, *for_type, b)])
                }
            } else {
                // The loop variable is visible to the body as an ordinary
                // variable reference, so forked loops rename it like a
                // forked let.
                tracing::trace!(loop_var = %name, forks = size, "forking loop");
                m.let_forks().push(name.clone(), size);
                let mut result = Vec::with_capacity(size);
                for i in 0..size {
                    let mn = first_or_nth(&mins, i);
                    let e = first_or_nth(&extents, i);
                    let b = first_or_nth(&bodies, i);
                    result.push(Stmt::for_loop(format!("{}.{}", name, i), mn, e, *for_type, b));
                }
                Some(result)
            }
        }
        StmtKind::Store { name, value, index } => {
            let values = m.mutate_expr(value)?;
            let indexes = m.mutate_expr(index)?;
            let size = values.len().max(indexes.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let v = first_or_nth(&values, i);
                let idx = first_or_nth(&indexes, i);
                if v.same_as(value) && idx.same_as(index) {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::store(name.clone(), v, idx));
                }
            }
            Some(result)
        }
        StmtKind::Provide { name, values, args } => {
            let mut size = 0;
            let mut arg_forks = Vec::with_capacity(args.len());
            for a in args {
                let forks = m.mutate_expr(a)?;
                size = size.max(forks.len());
                arg_forks.push(forks);
            }
            let mut value_forks = Vec::with_capacity(values.len());
            for v in values {
                let forks = m.mutate_expr(v)?;
                size = size.max(forks.len());
                value_forks.push(forks);
            }
            let mut result = Vec::with_capacity(size);
            for j in 0..size {
                let mut unchanged = true;
                let mut new_args = Vec::with_capacity(args.len());
                for (i, forks) in arg_forks.iter().enumerate() {
                    let a = first_or_nth(forks, j);
                    unchanged &= a.same_as(&args[i]);
                    new_args.push(a);
                }
                let mut new_values = Vec::with_capacity(values.len());
                for (i, forks) in value_forks.iter().enumerate() {
                    let v = first_or_nth(forks, j);
                    unchanged &= v.same_as(&values[i]);
                    new_values.push(v);
                }
                if unchanged {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::provide(name.clone(), new_values, new_args));
                }
            }
            Some(result)
        }
        StmtKind::Allocate {
            name,
            ty,
            extents,
            condition,
            body,
        } => {
            let mut size = 0;
            let mut extent_forks = Vec::with_capacity(extents.len());
            for e in extents {
                let forks = m.mutate_expr(e)?;
                size = size.max(forks.len());
                extent_forks.push(forks);
            }
            let bodies = m.mutate_stmt(body)?;
            size = size.max(bodies.len());
            let conditions = m.mutate_expr(condition)?;
            size = size.max(conditions.len());
            let mut result = Vec::with_capacity(size);
            for j in 0..size {
                let b = first_or_nth(&bodies, j);
                let c = first_or_nth(&conditions, j);
                let mut unchanged = b.same_as(body) && c.same_as(condition);
                let mut new_extents = Vec::with_capacity(extents.len());
                for (i, forks) in extent_forks.iter().enumerate() {
                    let e = first_or_nth(forks, j);
                    unchanged &= e.same_as(&extents[i]);
                    new_extents.push(e);
                }
                if unchanged {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::allocate(name.clone(), *ty, new_extents, c, b));
                }
            }
            Some(result)
        }
        StmtKind::Free { .. } => Some(vec![stmt.clone()]),
        StmtKind::Realize {
            name,
            types,
            bounds,
            condition,
            body,
        } => {
            let mut size = 0;
            let mut min_forks = Vec::with_capacity(bounds.len());
            let mut extent_forks = Vec::with_capacity(bounds.len());
            for range in bounds {
                let mins = m.mutate_expr(&range.min)?;
                let extents = m.mutate_expr(&range.extent)?;
                size = size.max(mins.len()).max(extents.len());
                min_forks.push(mins);
                extent_forks.push(extents);
            }
            let bodies = m.mutate_stmt(body)?;
            size = size.max(bodies.len());
            let conditions = m.mutate_expr(condition)?;
            size = size.max(conditions.len());
            let mut result = Vec::with_capacity(size);
            for j in 0..size {
                let c = first_or_nth(&conditions, j);
                let b = first_or_nth(&bodies, j);
                let mut unchanged = c.same_as(condition) && b.same_as(body);
                let mut new_bounds = Region::with_capacity(bounds.len());
                for i in 0..bounds.len() {
                    let mn = first_or_nth(&min_forks[i], j);
                    let e = first_or_nth(&extent_forks[i], j);
                    unchanged &= mn.same_as(&bounds[i].min) && e.same_as(&bounds[i].extent);
                    new_bounds.push(Range::new(mn, e));
                }
                if unchanged {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::realize(name.clone(), types.clone(), new_bounds, c, b));
                }
            }
            Some(result)
        }
        StmtKind::Block { first, rest } => {
            let firsts = m.mutate_stmt(first)?;
            let rests = m.mutate_stmt(rest)?;
            let size = firsts.len().max(rests.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let f = first_or_nth(&firsts, i);
                let r = first_or_nth(&rests, i);
                if f.same_as(first) && r.same_as(rest) {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::block(f, r));
                }
            }
            Some(result)
        }
        StmtKind::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            let conditions = m.mutate_expr(condition)?;
            let thens = m.mutate_stmt(then_case)?;
            let elses = m.mutate_stmt(else_case)?;
            let size = conditions.len().max(thens.len()).max(elses.len());
            let mut result = Vec::with_capacity(size);
            for i in 0..size {
                let c = first_or_nth(&conditions, i);
                let t = first_or_nth(&thens, i);
                let e = first_or_nth(&elses, i);
                if c.same_as(condition) && t.same_as(then_case) && e.same_as(else_case) {
                    result.push(stmt.clone());
                } else {
                    result.push(Stmt::if_then_else(c, t, e));
                }
            }
            Some(result)
        }
        StmtKind::Evaluate { value } => {
            let values = m.mutate_expr(value)?;
            Some(
                values
                    .into_iter()
                    .map(|v| {
                        if v.same_as(value) {
                            stmt.clone()
                        } else {
                            Stmt::evaluate(v)
                        }
                    })
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    /// The identity transform: nothing forks unless `let_forks` says so.
    struct Identity {
        forks: Scope<usize>,
    }

    impl Identity {
        fn new() -> Self {
            Self { forks: Scope::new() }
        }
    }

    impl MultiMutate for Identity {
        fn let_forks(&mut self) -> &mut Scope<usize> {
            &mut self.forks
        }
    }

    /// Forks every reference to one variable into `n` renamed copies.
    struct ForkVar {
        forks: Scope<usize>,
    }

    impl ForkVar {
        fn new(name: &str, n: usize) -> Self {
            let mut forks = Scope::new();
            forks.push(name, n);
            Self { forks }
        }
    }

    impl MultiMutate for ForkVar {
        fn let_forks(&mut self) -> &mut Scope<usize> {
            &mut self.forks
        }
    }

    #[test]
    fn test_passthrough_reuses_nodes() {
        let x = Expr::var(Type::int(32), "x");
        let e = x.clone() * Expr::int(2) + Expr::int(1);
        let result = Identity::new().mutate_expr(&e).unwrap();
        assert_eq!(result.len(), 1);
        // Unchanged children mean the identical node comes back, not a
        // reconstruction.
        assert!(result[0].same_as(&e));
    }

    #[test]
    fn test_variable_fork_expansion() {
        let v = Expr::var(Type::int(32), "v");
        let result = ForkVar::new("v", 3).mutate_expr(&v).unwrap();
        assert_eq!(result.len(), 3);
        for (i, e) in result.iter().enumerate() {
            let Some(ExprKind::Variable { name, .. }) = e.kind() else {
                panic!("expected a variable");
            };
            assert_eq!(name, &format!("v.{}", i));
        }
    }

    #[test]
    fn test_fork_broadcasts_to_siblings() {
        // v forks 3 ways; the constant operand is reused in every fork.
        let v = Expr::var(Type::int(32), "v");
        let e = v + Expr::int(7);
        let result = ForkVar::new("v", 3).mutate_expr(&e).unwrap();
        assert_eq!(result.len(), 3);
        for (i, e) in result.iter().enumerate() {
            let Some(ExprKind::Add { a, b }) = e.kind() else {
                panic!("expected an add");
            };
            let Some(ExprKind::Variable { name, .. }) = a.kind() else {
                panic!("expected a variable lhs");
            };
            assert_eq!(name, &format!("v.{}", i));
            assert!(matches!(b.kind(), Some(ExprKind::IntImm { value: 7 })));
        }
    }

    #[test]
    fn test_let_forks_when_both_sides_fork() {
        // let w = v + 1 in w * v, with v forked 2 ways: the binding is
        // renamed per fork and w is registered as forked.
        let v = Expr::var(Type::int(32), "v");
        let w = Expr::var(Type::int(32), "w");
        let e = Expr::let_in("w", v.clone() + Expr::int(1), w * v);
        let mut mutator = ForkVar::new("v", 2);
        let result = mutator.mutate_expr(&e).unwrap();
        assert_eq!(result.len(), 2);
        for (i, e) in result.iter().enumerate() {
            let Some(ExprKind::Let { name, .. }) = e.kind() else {
                panic!("expected a let");
            };
            assert_eq!(name, &format!("w.{}", i));
        }
        assert!(mutator.let_forks().contains("w"));
        assert_eq!(*mutator.let_forks().get("w"), 2);
    }

    #[test]
    fn test_let_value_only_fork_wraps_body() {
        // The bound value forks but the body does not: the forked bindings
        // wrap the single body as nested lets.
        let v = Expr::var(Type::int(32), "v");
        let e = Expr::let_in("w", v, Expr::int(100));
        let result = ForkVar::new("v", 2).mutate_expr(&e).unwrap();
        assert_eq!(result.len(), 1);
        let Some(ExprKind::Let { name, body, .. }) = result[0].kind() else {
            panic!("expected a let");
        };
        // Bindings wrap in series: w.1 outermost, w.0 inside.
        assert_eq!(name, "w.1");
        assert!(matches!(
            body.kind(),
            Some(ExprKind::Let { name, .. }) if name == "w.0"
        ));
    }

    #[test]
    fn test_let_stmt_forks_like_let() {
        // let w = v in out[v] = w, with v forked 2 ways: both the bound
        // value and the body fork, so the binding renames per fork.
        let v = Expr::var(Type::int(32), "v");
        let w = Expr::var(Type::int(32), "w");
        let s = Stmt::let_stmt("w", v.clone(), Stmt::store("out", w, v));
        let mut mutator = ForkVar::new("v", 2);
        let result = mutator.mutate_stmt(&s).unwrap();
        assert_eq!(result.len(), 2);
        for (i, s) in result.iter().enumerate() {
            let Some(StmtKind::LetStmt { name, value, .. }) = s.kind() else {
                panic!("expected a let statement");
            };
            assert_eq!(name, &format!("w.{}", i));
            assert!(matches!(
                value.kind(),
                Some(ExprKind::Variable { name, .. }) if name == &format!("v.{}", i)
            ));
        }
        assert_eq!(*mutator.let_forks().get("w"), 2);
    }

    #[test]
    fn test_for_forks_rename_loop_var() {
        use crate::stmt::ForType;
        let v = Expr::var(Type::int(32), "v");
        let body = Stmt::store("out", v.clone(), Expr::int(0));
        let loop_ = Stmt::for_loop("x", Expr::int(0), v, ForType::Serial, body);
        let mut mutator = ForkVar::new("v", 2);
        let result = mutator.mutate_stmt(&loop_).unwrap();
        assert_eq!(result.len(), 2);
        for (i, s) in result.iter().enumerate() {
            let Some(StmtKind::For { name, .. }) = s.kind() else {
                panic!("expected a for");
            };
            assert_eq!(name, &format!("x.{}", i));
        }
        assert!(mutator.let_forks().contains("x"));
    }

    #[test]
    fn test_undefined_children_pass_through() {
        // A pipeline with no update phase keeps the undefined slot in every
        // fork.
        let v = Expr::var(Type::int(32), "v");
        let produce = Stmt::store("f", v, Expr::int(0));
        let consume = Stmt::evaluate(Expr::int(0));
        let p = Stmt::pipeline("f", produce, Stmt::undefined(), consume);
        let result = ForkVar::new("v", 2).mutate_stmt(&p).unwrap();
        assert_eq!(result.len(), 2);
        for s in &result {
            let Some(StmtKind::Pipeline { update, .. }) = s.kind() else {
                panic!("expected a pipeline");
            };
            assert!(!update.defined());
        }
    }

    #[test]
    fn test_failure_propagates() {
        /// Refuses to rewrite loads.
        struct NoLoads {
            forks: Scope<usize>,
        }
        impl MultiMutate for NoLoads {
            fn let_forks(&mut self) -> &mut Scope<usize> {
                &mut self.forks
            }
            fn mutate_expr(&mut self, expr: &Expr) -> Option<Vec<Expr>> {
                if matches!(expr.kind(), Some(ExprKind::Load { .. })) {
                    return None;
                }
                mutate_expr_default(self, expr)
            }
        }
        let load = Expr::load(
            Type::int(32),
            "buf",
            Expr::int(0),
            crate::param::Buffer::undefined(),
            crate::param::Parameter::undefined(),
        );
        let e = load + Expr::int(1);
        let mut mutator = NoLoads { forks: Scope::new() };
        assert!(mutator.mutate_expr(&e).is_none());
    }
}
