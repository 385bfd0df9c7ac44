//! Scalarization
//!
//! Rewrites vector code into per-lane scalar code: a width-N operation
//! becomes N scalar operations, a `Ramp` becomes its lane expressions, a
//! `Broadcast` collapses to its scalar value. Statement fan-outs are merged
//! back into `Block` sequences so a loop body stays a single statement.
//!
//! This is the canonical fan-out transform over [`MultiMutate`]; lowering
//! passes run it on targets with no vector units.

use crate::expr::{Expr, ExprKind};
use crate::multi_mutate::{mutate_expr_default, mutate_stmt_default, MultiMutate};
use crate::scope::Scope;
use crate::stmt::Stmt;
use crate::types::Type;

/// Splits vector operations into one scalar operation per lane.
#[derive(Default)]
pub struct Scalarize {
    let_forks: Scope<usize>,
}

impl Scalarize {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MultiMutate for Scalarize {
    fn let_forks(&mut self) -> &mut Scope<usize> {
        &mut self.let_forks
    }

    fn mutate_expr(&mut self, expr: &Expr) -> Option<Vec<Expr>> {
        match expr.kind() {
            Some(ExprKind::Variable { .. }) => {
                // Fork expansion first, then narrow each copy to the scalar
                // element type.
                let result = mutate_expr_default(self, expr)?;
                Some(
                    result
                        .into_iter()
                        .map(|e| match e.kind() {
                            Some(ExprKind::Variable { name, .. }) => {
                                Expr::var(e.ty().element_of(), name.clone())
                            }
                            _ => e,
                        })
                        .collect(),
                )
            }
            Some(ExprKind::Broadcast { value, .. }) => Some(vec![value.clone()]),
            Some(ExprKind::Ramp { base, stride, width }) => {
                let mut lanes = Vec::with_capacity(usize::from(*width));
                for i in 0..*width {
                    lanes.push(
                        base.clone()
                            + Expr::cast(base.ty(), Expr::int(i32::from(i))) * stride.clone(),
                    );
                }
                Some(lanes)
            }
            _ => mutate_expr_default(self, expr),
        }
    }

    fn mutate_stmt(&mut self, stmt: &Stmt) -> Option<Vec<Stmt>> {
        // Merge statement forks into a block so containers like loops never
        // see more than one copy of their body.
        let mut result = mutate_stmt_default(self, stmt)?;
        let mut merged = result.pop()?;
        while let Some(prev) = result.pop() {
            merged = Stmt::block(prev, merged);
        }
        Some(vec![merged])
    }

    fn mutate_type(&mut self, ty: Type) -> Vec<Type> {
        (0..ty.width).map(|_| ty.element_of()).collect()
    }
}

/// Scalarizes a statement, returning `None` if some subtree could not be
/// expanded.
pub fn scalarize(stmt: &Stmt) -> Option<Stmt> {
    let mut result = Scalarize::new().mutate_stmt(stmt)?;
    tracing::debug!(stmts = result.len(), "scalarize finished");
    result.pop()
}
