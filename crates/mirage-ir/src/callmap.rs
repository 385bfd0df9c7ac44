//! Call-graph extraction
//!
//! Collects the pipeline stages referenced from a function's definitions,
//! either at depth one or transitively. Stage names must be unique within a
//! pipeline; two distinct functions sharing a name is a fatal naming
//! collision.

use crate::expr::{CallType, Expr, ExprKind};
use crate::function::Function;
use crate::visit::{walk_expr, IrVisitor};
use mirage_error::internal_assert;
use serde::Serialize;
use std::collections::BTreeMap;

/// Finds all the stage calls in an expression tree.
struct FindCalls {
    recursive: bool,
    calls: BTreeMap<String, Function>,
}

impl FindCalls {
    fn new(recursive: bool) -> Self {
        Self {
            recursive,
            calls: BTreeMap::new(),
        }
    }

    fn include_function(&mut self, f: &Function) {
        let name = f.name();
        match self.calls.get(&name) {
            None => {
                tracing::debug!(stage = %name, "call graph includes stage");
                self.calls.insert(name, f.clone());
                if self.recursive {
                    // Everything called in the definition of f, and in the
                    // definitions of f's update steps.
                    for value in f.values() {
                        self.visit_expr(&value);
                    }
                    for update in f.updates() {
                        for value in &update.values {
                            self.visit_expr(value);
                        }
                        for arg in &update.args {
                            self.visit_expr(arg);
                        }
                    }
                }
            }
            Some(existing) => {
                internal_assert!(
                    existing.same_as(f),
                    "Can't compile a pipeline using multiple functions with the same name: {}",
                    name
                );
            }
        }
    }

    fn visit_definitions(&mut self, f: &Function, include_pure: bool, include_updates: bool) {
        if include_pure {
            for value in f.values() {
                self.visit_expr(&value);
            }
        }
        if include_updates {
            for update in f.updates() {
                for value in &update.values {
                    self.visit_expr(value);
                }
                for arg in &update.args {
                    self.visit_expr(arg);
                }
            }
        }
    }
}

impl IrVisitor for FindCalls {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
        if let Some(ExprKind::Call {
            call_type: CallType::Stage,
            func,
            ..
        }) = expr.kind()
        {
            self.include_function(func);
        }
    }
}

/// The stages called from `root`'s pure and update definitions, keyed by
/// name. With `recurse` set, callees' own definitions are searched too.
pub fn find_calls(root: &Function, recurse: bool) -> BTreeMap<String, Function> {
    let mut pass = FindCalls::new(recurse);
    pass.visit_definitions(root, true, true);
    pass.calls
}

/// The stages called from `root`'s update definitions only, at depth one.
pub fn find_update_calls(root: &Function) -> BTreeMap<String, Function> {
    let mut pass = FindCalls::new(false);
    pass.visit_definitions(root, false, true);
    pass.calls
}

/// The call map's names in dump form: `"f", "g", "h"`.
pub fn call_names(calls: &BTreeMap<String, Function>) -> String {
    calls
        .keys()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row of a serialized call graph.
#[derive(Debug, Serialize)]
pub struct CallSummary {
    pub name: String,
    pub dimensions: usize,
    pub outputs: usize,
    pub updates: usize,
}

/// A serializable summary of everything `root` calls.
pub fn summarize_calls(root: &Function, recurse: bool) -> Vec<CallSummary> {
    find_calls(root, recurse)
        .values()
        .map(|f| CallSummary {
            name: f.name(),
            dimensions: f.dimensions(),
            outputs: f.outputs(),
            updates: f.updates().len(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ReductionDomain;
    use crate::types::Type;

    fn simple_stage(name: &str) -> Function {
        let f = Function::new(name);
        f.define(
            vec!["x".into()],
            vec![Expr::var(Type::int(32), "x") + Expr::int(1)],
        );
        f
    }

    fn x() -> Expr {
        Expr::var(Type::int(32), "x")
    }

    #[test]
    fn test_pure_and_update_calls_at_depth_one() {
        let f = simple_stage("f");
        let h = simple_stage("h");

        let g = Function::new("g");
        g.define(
            vec!["x".into()],
            vec![Expr::call_stage(Type::int(32), f.clone(), vec![x()], 0)],
        );
        g.define_update(
            vec![x()],
            vec![Expr::call_stage(Type::int(32), h.clone(), vec![x()], 0)],
            ReductionDomain::undefined(),
        );

        let calls = find_calls(&g, false);
        assert_eq!(calls.len(), 2);
        assert!(calls["f"].same_as(&f));
        assert!(calls["h"].same_as(&h));

        let update_calls = find_update_calls(&g);
        assert_eq!(update_calls.len(), 1);
        assert!(update_calls["h"].same_as(&h));
    }

    #[test]
    fn test_recursive_extraction_reaches_transitive_callees() {
        let k = simple_stage("k");
        let f = Function::new("f");
        f.define(
            vec!["x".into()],
            vec![Expr::call_stage(Type::int(32), k.clone(), vec![x()], 0)],
        );
        let g = Function::new("g");
        g.define(
            vec!["x".into()],
            vec![Expr::call_stage(Type::int(32), f.clone(), vec![x()], 0)],
        );

        let shallow = find_calls(&g, false);
        assert_eq!(call_names(&shallow), "\"f\"");

        let deep = find_calls(&g, true);
        assert_eq!(call_names(&deep), "\"f\", \"k\"");
        assert!(deep["k"].same_as(&k));
    }

    #[test]
    fn test_recursive_extraction_reaches_callee_updates() {
        // f's update step calls u; recursion from g must surface it.
        let u = simple_stage("u");
        let f = simple_stage("f");
        f.define_update(
            vec![x()],
            vec![Expr::call_stage(Type::int(32), u.clone(), vec![x()], 0)],
            ReductionDomain::undefined(),
        );
        let g = Function::new("g");
        g.define(
            vec!["x".into()],
            vec![Expr::call_stage(Type::int(32), f, vec![x()], 0)],
        );

        let deep = find_calls(&g, true);
        assert!(deep.contains_key("u"));
        assert!(deep["u"].same_as(&u));
    }

    #[test]
    fn test_self_reference_terminates() {
        // A reduction that reads its own previous values must not recurse
        // forever.
        let f = simple_stage("f");
        f.define_update(
            vec![x()],
            vec![Expr::call_stage(Type::int(32), f.clone(), vec![x()], 0)],
            ReductionDomain::undefined(),
        );
        let calls = find_calls(&f, true);
        assert_eq!(calls.len(), 1);
        assert!(calls["f"].same_as(&f));
    }

    #[test]
    #[should_panic(expected = "multiple functions with the same name")]
    fn test_name_collision_is_fatal() {
        let f1 = simple_stage("f");
        let f2 = simple_stage("f");
        let g = Function::new("g");
        g.define(
            vec!["x".into()],
            vec![
                Expr::call_stage(Type::int(32), f1, vec![x()], 0)
                    + Expr::call_stage(Type::int(32), f2, vec![x()], 0),
            ],
        );
        find_calls(&g, false);
    }

    #[test]
    fn test_summary_rows() {
        let f = simple_stage("f");
        let g = Function::new("g");
        g.define(
            vec!["x".into(), "y".into()],
            vec![Expr::call_stage(Type::int(32), f, vec![x()], 0)],
        );
        let summary = summarize_calls(&g, false);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].name, "f");
        assert_eq!(summary[0].dimensions, 1);
        assert_eq!(summary[0].outputs, 1);
        assert_eq!(summary[0].updates, 0);
    }
}
