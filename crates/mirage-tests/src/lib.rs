//! End-to-end tests for the Mirage IR core
//!
//! This crate builds realistic pipelines through the public surface —
//! functions with pure and update definitions, lowered loop nests, vector
//! stores — and drives the comparison, call-graph, and fan-out machinery
//! over them the way the scheduling and lowering passes do.

use mirage_ir::{
    Buffer, Expr, ForType, Function, Range, ReductionDomain, ReductionVariable, Stmt, Type,
};

/// A three-stage stencil: `g` calls `f` in its pure definition and `h` in an
/// update definition. Returns (g, f, h).
pub fn build_stencil_pipeline() -> (Function, Function, Function) {
    let x = Expr::var(Type::int(32), "x");

    let f = Function::new("f");
    f.define(vec!["x".into()], vec![x.clone() * Expr::int(2)]);

    let h = Function::new("h");
    h.define(vec!["x".into()], vec![x.clone() + Expr::int(1)]);

    let g = Function::new("g");
    g.define(
        vec!["x".into()],
        vec![Expr::call_stage(Type::int(32), f.clone(), vec![x.clone()], 0)],
    );
    let domain = ReductionDomain::new(vec![ReductionVariable {
        var: "r".into(),
        min: Expr::int(0),
        extent: Expr::int(8),
    }]);
    g.define_update(
        vec![Expr::var(Type::int(32), "r")],
        vec![Expr::call_stage(
            Type::int(32),
            h.clone(),
            vec![Expr::var(Type::int(32), "r")],
            0,
        )],
        domain,
    );

    (g, f, h)
}

/// A vectorized loop nest whose store writes `lanes` lanes per iteration,
/// reading a bound input image.
pub fn vector_store_nest(lanes: u16) -> Stmt {
    let input = Buffer::new("input", Type::uint(8), 1);
    let x = Expr::var(Type::int(32), "x");

    let value = Expr::broadcast(
        Expr::call_image(Type::uint(8), input, vec![x.clone()]),
        lanes,
    );
    let index = Expr::ramp(x.clone() * Expr::int(i32::from(lanes)), Expr::int(1), lanes);
    let store = Stmt::store("out", value, index);
    let loop_x = Stmt::for_loop(
        "x",
        Expr::int(0),
        Expr::int(16),
        ForType::Vectorized,
        store,
    );
    Stmt::realize(
        "out",
        vec![Type::uint(8)],
        vec![Range::new(Expr::int(0), Expr::int(64))],
        Expr::const_true(),
        loop_x,
    )
}

/// Applies `e = e*e + e` to a shared base variable `depth` times, producing
/// a small handle over an exponentially large virtual tree.
pub fn deep_shared_expr(depth: usize) -> Expr {
    let mut e = Expr::var(Type::int(32), "x");
    for _ in 0..depth {
        e = e.clone() * e.clone() + e;
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_ir::{
        compare_expr, compare_expr_cached, equal, find_calls, find_update_calls, scalarize,
        summarize_calls, CompareCache, ExprKind, MultiMutate, Scalarize, Scope, StmtKind,
    };
    use std::cmp::Ordering;

    #[test]
    fn test_hash_stable_across_rebuilds() {
        let a = vector_store_nest(4);
        let b = vector_store_nest(4);
        assert!(!a.same_as(&b));
        assert_eq!(a.hash(), b.hash());
        assert_ne!(vector_store_nest(8).hash(), a.hash());
    }

    #[test]
    fn test_structural_equality_of_rebuilt_nests() {
        let a = vector_store_nest(4);
        let b = vector_store_nest(4);
        assert!(mirage_ir::equal_stmt(&a, &b));
        assert!(!mirage_ir::equal_stmt(&a, &vector_store_nest(8)));
    }

    #[test]
    fn test_call_graph_of_stencil() {
        let (g, f, h) = build_stencil_pipeline();

        let calls = find_calls(&g, false);
        assert_eq!(calls.len(), 2);
        assert!(calls["f"].same_as(&f));
        assert!(calls["h"].same_as(&h));

        let update_calls = find_update_calls(&g);
        assert_eq!(update_calls.len(), 1);
        assert!(update_calls["h"].same_as(&h));
        assert!(!update_calls.contains_key("f"));
    }

    #[test]
    fn test_call_summary_serializes() {
        let (g, _, _) = build_stencil_pipeline();
        let summary = summarize_calls(&g, false);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"name\":\"f\""));
        assert!(json.contains("\"name\":\"h\""));
    }

    #[test]
    fn test_cached_comparison_is_fast_on_shared_trees() {
        let e1 = deep_shared_expr(100);
        let e2 = deep_shared_expr(100);
        let mut cache = CompareCache::new(10);
        assert_eq!(compare_expr_cached(&e1, &e2, &mut cache), Ordering::Equal);

        // One more level on one side flips the result, and its mirror.
        let e3 = e2.clone() * e2.clone() + e2;
        let down = compare_expr_cached(&e1, &e3, &mut cache);
        let up = compare_expr_cached(&e3, &e1, &mut cache);
        assert_ne!(down, Ordering::Equal);
        assert_eq!(down.reverse(), up);
    }

    #[test]
    fn test_uncached_comparison_agrees_on_small_trees() {
        let e1 = deep_shared_expr(6);
        let e2 = deep_shared_expr(6);
        assert_eq!(compare_expr(&e1, &e2), Ordering::Equal);
    }

    #[test]
    fn test_scalarize_ramp_lanes_in_index_order() {
        let base = Expr::var(Type::int(32), "base");
        let stride = Expr::var(Type::int(32), "stride");
        let ramp = Expr::ramp(base.clone(), stride.clone(), 4);
        let lanes = Scalarize::new().mutate_expr(&ramp).unwrap();
        assert_eq!(lanes.len(), 4);
        for (i, lane) in lanes.iter().enumerate() {
            let expected = base.clone()
                + Expr::cast(Type::int(32), Expr::int(i as i32)) * stride.clone();
            assert!(equal(lane, &expected), "lane {} out of order", i);
        }
    }

    #[test]
    fn test_scalarize_whole_nest() {
        let nest = vector_store_nest(2);
        let scalar = scalarize(&nest).expect("scalarize applies to vector stores");

        // The realize and loop survive; the vector store became a block of
        // scalar stores.
        let Some(StmtKind::Realize { body, .. }) = scalar.kind() else {
            panic!("expected realize at the root");
        };
        let Some(StmtKind::For { body, .. }) = body.kind() else {
            panic!("expected the loop under the realize");
        };
        assert!(matches!(body.kind(), Some(StmtKind::Block { .. })));
    }

    #[test]
    fn test_multi_mutator_passthrough_returns_original() {
        struct Nothing {
            forks: Scope<usize>,
        }
        impl MultiMutate for Nothing {
            fn let_forks(&mut self) -> &mut Scope<usize> {
                &mut self.forks
            }
        }
        let nest = vector_store_nest(4);
        let result = Nothing { forks: Scope::new() }.mutate_stmt(&nest).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].same_as(&nest));
    }

    #[test]
    fn test_variable_forking_through_seeded_scope() {
        struct Forked {
            forks: Scope<usize>,
        }
        impl MultiMutate for Forked {
            fn let_forks(&mut self) -> &mut Scope<usize> {
                &mut self.forks
            }
        }
        let mut forks = Scope::new();
        forks.push("v", 3);
        let v = Expr::var(Type::int(32), "v");
        let result = Forked { forks }.mutate_expr(&v).unwrap();
        let names: Vec<_> = result
            .iter()
            .map(|e| match e.kind() {
                Some(ExprKind::Variable { name, .. }) => name.clone(),
                _ => panic!("expected variables"),
            })
            .collect();
        assert_eq!(names, vec!["v.0", "v.1", "v.2"]);
    }

    #[test]
    fn test_printer_renders_nest() {
        let rendered = vector_store_nest(4).to_string();
        assert!(rendered.contains("realize out<u8>"));
        assert!(rendered.contains("vectorized for (x, 0, 16)"));
        assert!(rendered.contains("out[ramp((x * 4), 1, 4)]"));
    }

    #[test]
    fn test_small_int_cache_survives_heavy_use() {
        // Repeated construction and teardown must keep handing out the same
        // immortal nodes.
        for _ in 0..1000 {
            let a = Expr::int(0);
            let b = Expr::int(0);
            assert!(a.same_as(&b));
            let tree = a + Expr::int(5) * b;
            drop(tree);
        }
        assert!(Expr::int(5).same_as(&Expr::int(5)));
    }
}
