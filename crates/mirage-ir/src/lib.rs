//! mirage-ir - Intermediate representation core of the Mirage compiler
//!
//! The Mirage IR is a reference-counted expression/statement tree (a DAG,
//! since subtrees are shared) that every compiler pass consumes:
//!
//! ```text
//! Pipeline construction (Function definitions)
//!         ↓
//!    IR trees (Expr / Stmt, built via checked factories)
//!         ↓
//!   [Passes over IrVisitor / MultiMutate]
//!   ├── structural equality & total ordering (equality)
//!   ├── call-graph extraction (callmap)
//!   └── fan-out rewrites, e.g. scalarization (multi_mutate, scalarize)
//!         ↓
//!   Scheduling / lowering / codegen (separate crates)
//! ```
//!
//! Nodes are immutable after construction; every factory checks its typing
//! and shape invariants and precomputes a structural hash, so downstream
//! passes can assume well-formed trees without re-validating.

pub mod callmap;
pub mod equality;
pub mod expr;
pub mod function;
pub mod hash;
pub mod multi_mutate;
pub mod param;
pub mod print;
pub mod scalarize;
pub mod scope;
pub mod stmt;
pub mod types;
pub mod visit;

pub use callmap::{call_names, find_calls, find_update_calls, summarize_calls, CallSummary};
pub use equality::{
    compare_expr, compare_expr_cached, compare_stmt, equal, equal_stmt, CompareCache, ExprCompare,
    ExprWithCache, StmtCompare,
};
pub use expr::{intrinsic, CallType, Expr, ExprKind, ExprNode};
pub use function::{Function, ReductionDomain, ReductionVariable, UpdateDefinition};
pub use multi_mutate::{mutate_expr_default, mutate_stmt_default, MultiMutate};
pub use param::{Buffer, Parameter};
pub use scalarize::{scalarize, Scalarize};
pub use scope::Scope;
pub use stmt::{ForType, Range, Region, Stmt, StmtKind, StmtNode};
pub use types::{Type, TypeCode};
pub use visit::{walk_expr, walk_stmt, IrVisitor};
