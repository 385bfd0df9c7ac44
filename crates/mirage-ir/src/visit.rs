//! IR traversal
//!
//! [`IrVisitor`] is the extension point every read-only pass is built on:
//! override `visit_expr`/`visit_stmt` for the nodes the pass cares about and
//! delegate to [`walk_expr`]/[`walk_stmt`] for the rest. The walkers match
//! exhaustively over the node kinds, so adding a kind breaks every pass at
//! compile time rather than silently skipping nodes.

use crate::expr::{Expr, ExprKind};
use crate::stmt::{Stmt, StmtKind};

/// A read-only pass over an IR tree.
pub trait IrVisitor {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }
}

/// Visits every child expression/statement of `expr`, in construction order.
pub fn walk_expr<V: IrVisitor + ?Sized>(v: &mut V, expr: &Expr) {
    let Some(kind) = expr.kind() else {
        return;
    };
    match kind {
        ExprKind::IntImm { .. }
        | ExprKind::FloatImm { .. }
        | ExprKind::StringImm { .. }
        | ExprKind::Variable { .. } => {}
        ExprKind::Cast { value } | ExprKind::Broadcast { value, .. } => v.visit_expr(value),
        ExprKind::Add { a, b }
        | ExprKind::Sub { a, b }
        | ExprKind::Mul { a, b }
        | ExprKind::Div { a, b }
        | ExprKind::Mod { a, b }
        | ExprKind::Min { a, b }
        | ExprKind::Max { a, b }
        | ExprKind::EQ { a, b }
        | ExprKind::NE { a, b }
        | ExprKind::LT { a, b }
        | ExprKind::LE { a, b }
        | ExprKind::GT { a, b }
        | ExprKind::GE { a, b }
        | ExprKind::And { a, b }
        | ExprKind::Or { a, b } => {
            v.visit_expr(a);
            v.visit_expr(b);
        }
        ExprKind::Not { a } => v.visit_expr(a),
        ExprKind::Select {
            condition,
            true_value,
            false_value,
        } => {
            v.visit_expr(condition);
            v.visit_expr(true_value);
            v.visit_expr(false_value);
        }
        ExprKind::Load { index, .. } => v.visit_expr(index),
        ExprKind::Ramp { base, stride, .. } => {
            v.visit_expr(base);
            v.visit_expr(stride);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::Let { value, body, .. } => {
            v.visit_expr(value);
            v.visit_expr(body);
        }
    }
}

/// Visits every child expression/statement of `stmt`, in construction order.
pub fn walk_stmt<V: IrVisitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    let Some(kind) = stmt.kind() else {
        return;
    };
    match kind {
        StmtKind::LetStmt { value, body, .. } => {
            v.visit_expr(value);
            v.visit_stmt(body);
        }
        StmtKind::AssertStmt { condition, message } => {
            v.visit_expr(condition);
            if message.defined() {
                v.visit_expr(message);
            }
        }
        StmtKind::Pipeline {
            produce,
            update,
            consume,
            ..
        } => {
            v.visit_stmt(produce);
            if update.defined() {
                v.visit_stmt(update);
            }
            v.visit_stmt(consume);
        }
        StmtKind::For {
            min, extent, body, ..
        } => {
            v.visit_expr(min);
            v.visit_expr(extent);
            v.visit_stmt(body);
        }
        StmtKind::Store { value, index, .. } => {
            v.visit_expr(value);
            v.visit_expr(index);
        }
        StmtKind::Provide { values, args, .. } => {
            for value in values {
                v.visit_expr(value);
            }
            for arg in args {
                v.visit_expr(arg);
            }
        }
        StmtKind::Allocate {
            extents,
            condition,
            body,
            ..
        } => {
            for extent in extents {
                v.visit_expr(extent);
            }
            v.visit_expr(condition);
            v.visit_stmt(body);
        }
        StmtKind::Free { .. } => {}
        StmtKind::Realize {
            bounds,
            condition,
            body,
            ..
        } => {
            for range in bounds {
                v.visit_expr(&range.min);
                v.visit_expr(&range.extent);
            }
            v.visit_expr(condition);
            v.visit_stmt(body);
        }
        StmtKind::Block { first, rest } => {
            v.visit_stmt(first);
            if rest.defined() {
                v.visit_stmt(rest);
            }
        }
        StmtKind::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            v.visit_expr(condition);
            v.visit_stmt(then_case);
            if else_case.defined() {
                v.visit_stmt(else_case);
            }
        }
        StmtKind::Evaluate { value } => v.visit_expr(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::ForType;
    use crate::types::Type;

    /// Counts variable references by name.
    struct CountVars {
        name: &'static str,
        count: usize,
    }

    impl IrVisitor for CountVars {
        fn visit_expr(&mut self, expr: &Expr) {
            if let Some(ExprKind::Variable { name, .. }) = expr.kind() {
                if name == self.name {
                    self.count += 1;
                }
            }
            walk_expr(self, expr);
        }
    }

    #[test]
    fn test_walk_reaches_shared_subtrees() {
        let x = Expr::var(Type::int(32), "x");
        // x appears three times, twice through the shared Mul child.
        let e = x.clone() * x.clone() + x.clone();
        let mut pass = CountVars { name: "x", count: 0 };
        pass.visit_expr(&e);
        assert_eq!(pass.count, 3);
    }

    #[test]
    fn test_walk_descends_through_stmts() {
        let x = Expr::var(Type::int(32), "x");
        let body = Stmt::store("out", x.clone() + Expr::int(1), x.clone());
        let loop_ = Stmt::for_loop("x", Expr::int(0), Expr::int(8), ForType::Serial, body);
        let mut pass = CountVars { name: "x", count: 0 };
        pass.visit_stmt(&loop_);
        assert_eq!(pass.count, 2);
    }
}
