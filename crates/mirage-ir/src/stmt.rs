//! Statement nodes
//!
//! Statements are effect-producing nodes with no value: stores, loops,
//! allocations, and the produce/update/consume pipeline structure. Like
//! expressions they are immutable shared handles with precomputed structural
//! hashes, built through invariant-checking factories.

use crate::expr::{hash_of, tag, Expr};
use crate::hash;
use crate::types::Type;
use mirage_error::{internal_assert, internal_error};
use std::sync::Arc;

/// Execution strategy of a `For` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ForType {
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
}

/// A one-dimensional bound: [min, min + extent).
#[derive(Debug, Clone)]
pub struct Range {
    pub min: Expr,
    pub extent: Expr,
}

impl Range {
    pub fn new(min: Expr, extent: Expr) -> Self {
        Self { min, extent }
    }
}

/// A multi-dimensional region, one [`Range`] per dimension.
pub type Region = Vec<Range>;

/// The kind payload of a statement node.
#[derive(Debug)]
pub enum StmtKind {
    /// Scoped binding of a name within a statement body
    LetStmt { name: String, value: Expr, body: Stmt },
    /// Aborts the pipeline at run time if the condition is false
    AssertStmt { condition: Expr, message: Expr },
    /// The three-phase realization of a stage: produce, optionally update,
    /// then consume
    Pipeline {
        name: String,
        produce: Stmt,
        update: Stmt,
        consume: Stmt,
    },
    For {
        name: String,
        min: Expr,
        extent: Expr,
        for_type: ForType,
        body: Stmt,
    },
    /// Write one value to named storage at an index
    Store { name: String, value: Expr, index: Expr },
    /// Write a stage's output tuple at a multi-dimensional coordinate
    Provide {
        name: String,
        values: Vec<Expr>,
        args: Vec<Expr>,
    },
    /// Scoped allocation of named storage, guarded by a condition
    Allocate {
        name: String,
        ty: Type,
        extents: Vec<Expr>,
        condition: Expr,
        body: Stmt,
    },
    Free { name: String },
    /// Allocate and bound a region for a stage over the body's lifetime
    Realize {
        name: String,
        types: Vec<Type>,
        bounds: Region,
        condition: Expr,
        body: Stmt,
    },
    /// Two statements in sequence; `rest` may be undefined
    Block { first: Stmt, rest: Stmt },
    IfThenElse {
        condition: Expr,
        then_case: Stmt,
        else_case: Stmt,
    },
    /// Evaluate an expression for its side effects
    Evaluate { value: Expr },
}

impl StmtKind {
    pub(crate) fn tag(&self) -> u32 {
        match self {
            StmtKind::LetStmt { .. } => tag::LET_STMT,
            StmtKind::AssertStmt { .. } => tag::ASSERT_STMT,
            StmtKind::Pipeline { .. } => tag::PIPELINE,
            StmtKind::For { .. } => tag::FOR,
            StmtKind::Store { .. } => tag::STORE,
            StmtKind::Provide { .. } => tag::PROVIDE,
            StmtKind::Allocate { .. } => tag::ALLOCATE,
            StmtKind::Free { .. } => tag::FREE,
            StmtKind::Realize { .. } => tag::REALIZE,
            StmtKind::Block { .. } => tag::BLOCK,
            StmtKind::IfThenElse { .. } => tag::IF_THEN_ELSE,
            StmtKind::Evaluate { .. } => tag::EVALUATE,
        }
    }
}

/// A heap-allocated statement node.
#[derive(Debug)]
pub struct StmtNode {
    pub hash: u64,
    pub kind: StmtKind,
}

/// A shared handle to a statement node, or the undefined statement.
#[derive(Debug, Clone, Default)]
pub struct Stmt {
    node: Option<Arc<StmtNode>>,
}

/// Hash of a child statement; the undefined statement hashes to zero.
pub(crate) fn stmt_hash_of(s: &Stmt) -> u64 {
    s.node.as_ref().map(|n| n.hash).unwrap_or(0)
}

fn check_defined(e: &Expr, op: &str) {
    internal_assert!(e.defined(), "{} of undefined", op);
}

fn check_stmt_defined(s: &Stmt, op: &str) {
    internal_assert!(s.defined(), "{} of undefined", op);
}

impl Stmt {
    fn new_node(hash: u64, kind: StmtKind) -> Stmt {
        Stmt {
            node: Some(Arc::new(StmtNode { hash, kind })),
        }
    }

    /// The undefined statement. Absent optional children (a pipeline's
    /// update phase, a block's tail, an if's else) are represented this way.
    pub fn undefined() -> Stmt {
        Stmt::default()
    }

    pub fn defined(&self) -> bool {
        self.node.is_some()
    }

    /// Whether two handles point at the same underlying node
    pub fn same_as(&self, other: &Stmt) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// The precomputed structural hash. Fatal on the undefined statement.
    pub fn hash(&self) -> u64 {
        match &self.node {
            Some(n) => n.hash,
            None => internal_error!("hash of undefined statement"),
        }
    }

    pub fn node(&self) -> Option<&StmtNode> {
        self.node.as_deref()
    }

    pub fn kind(&self) -> Option<&StmtKind> {
        self.node.as_deref().map(|n| &n.kind)
    }

    /// Binds `name` to `value` within a statement body
    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Stmt {
        check_defined(&value, "LetStmt");
        check_stmt_defined(&body, "LetStmt");
        let name = name.into();
        let mut h = hash::hash_small(tag::LET_STMT);
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash_of(&value));
        h = hash::combine(h, stmt_hash_of(&body));
        Stmt::new_node(h, StmtKind::LetStmt { name, value, body })
    }

    /// Run-time assertion with an optional message expression
    pub fn assert_stmt(condition: Expr, message: Expr) -> Stmt {
        check_defined(&condition, "AssertStmt");
        let mut h = hash::hash_small(tag::ASSERT_STMT);
        h = hash::combine(h, hash_of(&condition));
        h = hash::combine(h, hash_of(&message));
        Stmt::new_node(h, StmtKind::AssertStmt { condition, message })
    }

    /// Run-time assertion whose message is built by the `stringify`
    /// intrinsic over the given parts
    pub fn assert_with_message(condition: Expr, message: Vec<Expr>) -> Stmt {
        internal_assert!(!message.is_empty(), "Assert with empty message");
        let m = Expr::call_intrinsic(Type::handle(), crate::expr::intrinsic::STRINGIFY, message);
        Stmt::assert_stmt(condition, m)
    }

    /// Produce/update/consume structure for the named stage; `update` may be
    /// undefined when the stage has no update definitions
    pub fn pipeline(name: impl Into<String>, produce: Stmt, update: Stmt, consume: Stmt) -> Stmt {
        check_stmt_defined(&produce, "Pipeline");
        // update is allowed to be undefined
        check_stmt_defined(&consume, "Pipeline");
        let name = name.into();
        let mut h = hash::hash_small(tag::PIPELINE);
        h = hash::combine(h, stmt_hash_of(&produce));
        h = hash::combine(h, stmt_hash_of(&update));
        h = hash::combine(h, stmt_hash_of(&consume));
        Stmt::new_node(h, StmtKind::Pipeline { name, produce, update, consume })
    }

    /// Loop over [min, min + extent) with the given execution strategy
    pub fn for_loop(
        name: impl Into<String>,
        min: Expr,
        extent: Expr,
        for_type: ForType,
        body: Stmt,
    ) -> Stmt {
        check_defined(&min, "For");
        check_defined(&extent, "For");
        internal_assert!(min.ty().is_scalar(), "For with vector min");
        internal_assert!(extent.ty().is_scalar(), "For with vector extent");
        check_stmt_defined(&body, "For");
        let name = name.into();
        let mut h = hash::hash_small(tag::FOR);
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash_of(&min));
        h = hash::combine(h, hash_of(&extent));
        h = hash::combine(h, hash::hash_small(for_type as u32));
        h = hash::combine(h, stmt_hash_of(&body));
        Stmt::new_node(h, StmtKind::For { name, min, extent, for_type, body })
    }

    /// Write `value` to the named storage at `index`
    pub fn store(name: impl Into<String>, value: Expr, index: Expr) -> Stmt {
        check_defined(&value, "Store");
        check_defined(&index, "Store");
        let name = name.into();
        let mut h = hash::hash_small(tag::STORE);
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash_of(&value));
        h = hash::combine(h, hash_of(&index));
        Stmt::new_node(h, StmtKind::Store { name, value, index })
    }

    /// Write a stage's output tuple at a coordinate
    pub fn provide(name: impl Into<String>, values: Vec<Expr>, args: Vec<Expr>) -> Stmt {
        let name = name.into();
        let mut h = hash::hash_small(tag::PROVIDE);
        h = hash::combine(h, hash::hash_string(&name));
        internal_assert!(!values.is_empty(), "Provide of no values");
        for v in &values {
            internal_assert!(v.defined(), "Provide of undefined value");
            h = hash::combine(h, hash_of(v));
        }
        for a in &args {
            internal_assert!(a.defined(), "Provide to undefined location");
            h = hash::combine(h, hash_of(a));
        }
        Stmt::new_node(h, StmtKind::Provide { name, values, args })
    }

    /// Allocate named storage of the given type and extents over the body's
    /// lifetime, guarded by a condition
    pub fn allocate(
        name: impl Into<String>,
        ty: Type,
        extents: Vec<Expr>,
        condition: Expr,
        body: Stmt,
    ) -> Stmt {
        let name = name.into();
        check_defined(&condition, "Allocate");
        check_stmt_defined(&body, "Allocate");
        internal_assert!(!extents.is_empty(), "Allocate of no extents");
        let mut h = hash::hash_small(tag::ALLOCATE);
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash::hash_type(ty));
        h = hash::combine(h, hash_of(&condition));
        h = hash::combine(h, stmt_hash_of(&body));
        for e in &extents {
            internal_assert!(e.defined(), "Allocate of undefined extent");
            internal_assert!(e.ty().is_scalar(), "Allocate of vector extent");
            h = hash::combine(h, hash_of(e));
        }
        Stmt::new_node(h, StmtKind::Allocate { name, ty, extents, condition, body })
    }

    /// Free the named storage
    pub fn free(name: impl Into<String>) -> Stmt {
        let name = name.into();
        let h = hash::combine(hash::hash_small(tag::FREE), hash::hash_string(&name));
        Stmt::new_node(h, StmtKind::Free { name })
    }

    /// Allocate and bound a region for the named stage over the body's
    /// lifetime
    pub fn realize(
        name: impl Into<String>,
        types: Vec<Type>,
        bounds: Region,
        condition: Expr,
        body: Stmt,
    ) -> Stmt {
        let name = name.into();
        check_defined(&condition, "Realize");
        let mut h = hash::hash_small(tag::REALIZE);
        h = hash::combine(h, hash_of(&condition));
        h = hash::combine(h, stmt_hash_of(&body));
        for b in &bounds {
            internal_assert!(b.min.defined(), "Realize of undefined");
            internal_assert!(b.extent.defined(), "Realize of undefined");
            internal_assert!(b.min.ty().is_scalar(), "Realize of vector size");
            internal_assert!(b.extent.ty().is_scalar(), "Realize of vector size");
            h = hash::combine(h, hash_of(&b.min));
            h = hash::combine(h, hash_of(&b.extent));
        }
        for t in &types {
            h = hash::combine(h, hash::hash_type(*t));
        }
        check_stmt_defined(&body, "Realize");
        internal_assert!(!types.is_empty(), "Realize has empty type");
        Stmt::new_node(h, StmtKind::Realize { name, types, bounds, condition, body })
    }

    /// `first` then `rest`; `rest` may be undefined for a one-statement
    /// block
    pub fn block(first: Stmt, rest: Stmt) -> Stmt {
        check_stmt_defined(&first, "Block");
        // rest is allowed to be undefined
        let mut h = hash::hash_small(tag::BLOCK);
        h = hash::combine(h, stmt_hash_of(&first));
        h = hash::combine(h, stmt_hash_of(&rest));
        Stmt::new_node(h, StmtKind::Block { first, rest })
    }

    /// Conditional; `else_case` may be undefined
    pub fn if_then_else(condition: Expr, then_case: Stmt, else_case: Stmt) -> Stmt {
        internal_assert!(
            condition.defined() && then_case.defined(),
            "IfThenElse of undefined"
        );
        // else_case may be undefined
        let mut h = hash::hash_small(tag::IF_THEN_ELSE);
        h = hash::combine(h, hash_of(&condition));
        h = hash::combine(h, stmt_hash_of(&then_case));
        h = hash::combine(h, stmt_hash_of(&else_case));
        Stmt::new_node(h, StmtKind::IfThenElse { condition, then_case, else_case })
    }

    /// Evaluate an expression for its side effects
    pub fn evaluate(value: Expr) -> Stmt {
        check_defined(&value, "Evaluate");
        let h = hash::combine(hash::hash_small(tag::EVALUATE), hash_of(&value));
        Stmt::new_node(h, StmtKind::Evaluate { value })
    }
}
