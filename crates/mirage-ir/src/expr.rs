//! Expression nodes
//!
//! Expressions are immutable, reference-counted, and freely shared between
//! parents, so an expression "tree" is in general a DAG. Every node is built
//! through a factory on [`Expr`] that checks the construction invariants and
//! precomputes a structural hash over the kind tag and all child fields.
//! Factories never simplify, fold, or coerce; callers pre-coerce.

use crate::function::{Function, ReductionDomain};
use crate::hash;
use crate::param::{Buffer, Parameter};
use crate::types::Type;
use mirage_error::{internal_assert, internal_error};
use std::ops;
use std::sync::{Arc, OnceLock};

/// Stable per-kind tags, assigned at registration. Structural comparison
/// orders nodes of different kinds by tag, so these never change meaning.
pub(crate) mod tag {
    pub const INT_IMM: u32 = 0;
    pub const FLOAT_IMM: u32 = 1;
    pub const STRING_IMM: u32 = 2;
    pub const CAST: u32 = 3;
    pub const VARIABLE: u32 = 4;
    pub const ADD: u32 = 5;
    pub const SUB: u32 = 6;
    pub const MUL: u32 = 7;
    pub const DIV: u32 = 8;
    pub const MOD: u32 = 9;
    pub const MIN: u32 = 10;
    pub const MAX: u32 = 11;
    pub const EQ: u32 = 12;
    pub const NE: u32 = 13;
    pub const LT: u32 = 14;
    pub const LE: u32 = 15;
    pub const GT: u32 = 16;
    pub const GE: u32 = 17;
    pub const AND: u32 = 18;
    pub const OR: u32 = 19;
    pub const NOT: u32 = 20;
    pub const SELECT: u32 = 21;
    pub const LOAD: u32 = 22;
    pub const RAMP: u32 = 23;
    pub const BROADCAST: u32 = 24;
    pub const CALL: u32 = 25;
    pub const LET: u32 = 26;
    pub const LET_STMT: u32 = 27;
    pub const ASSERT_STMT: u32 = 28;
    pub const PIPELINE: u32 = 29;
    pub const FOR: u32 = 30;
    pub const STORE: u32 = 31;
    pub const PROVIDE: u32 = 32;
    pub const ALLOCATE: u32 = 33;
    pub const FREE: u32 = 34;
    pub const REALIZE: u32 = 35;
    pub const BLOCK: u32 = 36;
    pub const IF_THEN_ELSE: u32 = 37;
    pub const EVALUATE: u32 = 38;
}

/// Names of the compiler-known intrinsics callable through
/// [`Expr::call_intrinsic`].
pub mod intrinsic {
    pub const ABS: &str = "abs";
    pub const BITWISE_AND: &str = "bitwise_and";
    pub const BITWISE_NOT: &str = "bitwise_not";
    pub const BITWISE_OR: &str = "bitwise_or";
    pub const BITWISE_XOR: &str = "bitwise_xor";
    pub const DEBUG_TO_FILE: &str = "debug_to_file";
    pub const IF_THEN_ELSE: &str = "if_then_else";
    pub const INTERLEAVE_VECTORS: &str = "interleave_vectors";
    pub const LERP: &str = "lerp";
    pub const REINTERPRET: &str = "reinterpret";
    pub const SHIFT_LEFT: &str = "shift_left";
    pub const SHIFT_RIGHT: &str = "shift_right";
    pub const SHUFFLE_VECTOR: &str = "shuffle_vector";
    pub const STRINGIFY: &str = "stringify";
    pub const UNDEF: &str = "undef";
}

/// How a `Call` node resolves its callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallType {
    /// Load from a concrete image or a buffer-valued parameter
    Image,
    /// Call to an externally-linked routine
    Extern,
    /// Call to another pipeline stage ([`Function`])
    Stage,
    /// Compiler-known intrinsic
    Intrinsic,
}

/// The kind payload of an expression node.
#[derive(Debug)]
pub enum ExprKind {
    IntImm { value: i32 },
    FloatImm { value: f32 },
    StringImm { value: String },
    /// Reinterpret a value as the node's type
    Cast { value: Expr },
    Variable {
        name: String,
        image: Buffer,
        param: Parameter,
        reduction_domain: ReductionDomain,
    },
    Add { a: Expr, b: Expr },
    Sub { a: Expr, b: Expr },
    Mul { a: Expr, b: Expr },
    Div { a: Expr, b: Expr },
    Mod { a: Expr, b: Expr },
    Min { a: Expr, b: Expr },
    Max { a: Expr, b: Expr },
    EQ { a: Expr, b: Expr },
    NE { a: Expr, b: Expr },
    LT { a: Expr, b: Expr },
    LE { a: Expr, b: Expr },
    GT { a: Expr, b: Expr },
    GE { a: Expr, b: Expr },
    And { a: Expr, b: Expr },
    Or { a: Expr, b: Expr },
    Not { a: Expr },
    /// Ternary select; does not short-circuit
    Select {
        condition: Expr,
        true_value: Expr,
        false_value: Expr,
    },
    /// Load from named storage at an index
    Load {
        name: String,
        index: Expr,
        image: Buffer,
        param: Parameter,
    },
    /// The vector [base, base + stride, base + 2*stride, ...]
    Ramp { base: Expr, stride: Expr, width: u16 },
    /// A scalar value repeated across vector lanes
    Broadcast { value: Expr, width: u16 },
    Call {
        name: String,
        args: Vec<Expr>,
        call_type: CallType,
        func: Function,
        value_index: usize,
        image: Buffer,
        param: Parameter,
    },
    /// Scoped binding of a name within an expression body
    Let { name: String, value: Expr, body: Expr },
}

impl ExprKind {
    pub(crate) fn tag(&self) -> u32 {
        match self {
            ExprKind::IntImm { .. } => tag::INT_IMM,
            ExprKind::FloatImm { .. } => tag::FLOAT_IMM,
            ExprKind::StringImm { .. } => tag::STRING_IMM,
            ExprKind::Cast { .. } => tag::CAST,
            ExprKind::Variable { .. } => tag::VARIABLE,
            ExprKind::Add { .. } => tag::ADD,
            ExprKind::Sub { .. } => tag::SUB,
            ExprKind::Mul { .. } => tag::MUL,
            ExprKind::Div { .. } => tag::DIV,
            ExprKind::Mod { .. } => tag::MOD,
            ExprKind::Min { .. } => tag::MIN,
            ExprKind::Max { .. } => tag::MAX,
            ExprKind::EQ { .. } => tag::EQ,
            ExprKind::NE { .. } => tag::NE,
            ExprKind::LT { .. } => tag::LT,
            ExprKind::LE { .. } => tag::LE,
            ExprKind::GT { .. } => tag::GT,
            ExprKind::GE { .. } => tag::GE,
            ExprKind::And { .. } => tag::AND,
            ExprKind::Or { .. } => tag::OR,
            ExprKind::Not { .. } => tag::NOT,
            ExprKind::Select { .. } => tag::SELECT,
            ExprKind::Load { .. } => tag::LOAD,
            ExprKind::Ramp { .. } => tag::RAMP,
            ExprKind::Broadcast { .. } => tag::BROADCAST,
            ExprKind::Call { .. } => tag::CALL,
            ExprKind::Let { .. } => tag::LET,
        }
    }
}

/// A heap-allocated expression node: result type, precomputed structural
/// hash, and the kind payload.
#[derive(Debug)]
pub struct ExprNode {
    pub ty: Type,
    pub hash: u64,
    pub kind: ExprKind,
}

/// A shared handle to an expression node, or the undefined expression.
///
/// Cloning is cheap (a reference-count bump) and never copies the node, so
/// subtrees are shared rather than duplicated. Nodes are immutable once
/// constructed; rewriting passes build new nodes and rewire parents.
#[derive(Debug, Clone, Default)]
pub struct Expr {
    node: Option<Arc<ExprNode>>,
}

/// Hash of a child expression; the undefined expression hashes to zero.
pub(crate) fn hash_of(e: &Expr) -> u64 {
    e.node.as_ref().map(|n| n.hash).unwrap_or(0)
}

fn check_defined(e: &Expr, op: &str) {
    internal_assert!(e.defined(), "{} of undefined", op);
}

fn check_matching_binary(a: &Expr, b: &Expr, op: &str) -> Type {
    check_defined(a, op);
    check_defined(b, op);
    internal_assert!(a.ty() == b.ty(), "{} of mismatched types", op);
    a.ty()
}

impl Expr {
    fn new_node(ty: Type, hash: u64, kind: ExprKind) -> Expr {
        Expr {
            node: Some(Arc::new(ExprNode { ty, hash, kind })),
        }
    }

    /// The undefined expression. Absent optional children (a pipeline's
    /// update stage, an if with no else) are represented this way.
    pub fn undefined() -> Expr {
        Expr::default()
    }

    pub fn defined(&self) -> bool {
        self.node.is_some()
    }

    /// Whether two handles point at the same underlying node
    pub fn same_as(&self, other: &Expr) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// The node's result type. Fatal on the undefined expression.
    pub fn ty(&self) -> Type {
        match &self.node {
            Some(n) => n.ty,
            None => internal_error!("type of undefined expression"),
        }
    }

    /// The precomputed structural hash. Fatal on the undefined expression.
    pub fn hash(&self) -> u64 {
        match &self.node {
            Some(n) => n.hash,
            None => internal_error!("hash of undefined expression"),
        }
    }

    pub fn node(&self) -> Option<&ExprNode> {
        self.node.as_deref()
    }

    pub fn kind(&self) -> Option<&ExprKind> {
        self.node.as_deref().map(|n| &n.kind)
    }

    /// An `i32` immediate. Values in −8..=8 come from an immortal shared
    /// cache rather than a fresh allocation.
    pub fn int(value: i32) -> Expr {
        if (-8..=8).contains(&value) {
            return small_int_cache()[(value + 8) as usize].clone();
        }
        Expr::new_int(value)
    }

    fn new_int(value: i32) -> Expr {
        Expr::new_node(Type::int(32), hash::hash_int(value), ExprKind::IntImm { value })
    }

    /// An `f32` immediate
    pub fn float(value: f32) -> Expr {
        Expr::new_node(
            Type::float(32),
            hash::hash_float(value),
            ExprKind::FloatImm { value },
        )
    }

    /// A string immediate (handle-typed; used for assert messages and
    /// debug intrinsics)
    pub fn string(value: impl Into<String>) -> Expr {
        let value = value.into();
        let h = hash::hash_string(&value);
        Expr::new_node(Type::handle(), h, ExprKind::StringImm { value })
    }

    /// The scalar boolean constant true
    pub fn const_true() -> Expr {
        Expr::cast(Type::bool_type(), Expr::int(1))
    }

    /// The scalar boolean constant false
    pub fn const_false() -> Expr {
        Expr::cast(Type::bool_type(), Expr::int(0))
    }

    /// Reinterprets `value` as type `ty`
    pub fn cast(ty: Type, value: Expr) -> Expr {
        check_defined(&value, "Cast");
        let mut h = hash::hash_small(tag::CAST);
        h = hash::combine(h, hash::hash_type(ty));
        h = hash::combine(h, hash_of(&value));
        Expr::new_node(ty, h, ExprKind::Cast { value })
    }

    /// A reference to a name bound by an enclosing let, loop, or pipeline
    /// dimension
    pub fn var(ty: Type, name: impl Into<String>) -> Expr {
        Expr::variable(
            ty,
            name,
            Buffer::undefined(),
            Parameter::undefined(),
            ReductionDomain::undefined(),
        )
    }

    /// A variable reference bound to a buffer, parameter, or reduction
    /// domain
    pub fn variable(
        ty: Type,
        name: impl Into<String>,
        image: Buffer,
        param: Parameter,
        reduction_domain: ReductionDomain,
    ) -> Expr {
        let name = name.into();
        internal_assert!(!name.is_empty(), "Variable with empty name");
        let h = hash::combine(hash::hash_type(ty), hash::hash_string(&name));
        Expr::new_node(
            ty,
            h,
            ExprKind::Variable { name, image, param, reduction_domain },
        )
    }

    fn binary_arith(a: Expr, b: Expr, t: u32, op: &str, build: fn(Expr, Expr) -> ExprKind) -> Expr {
        let ty = check_matching_binary(&a, &b, op);
        let mut h = hash::hash_small(t);
        h = hash::combine(h, hash_of(&a));
        h = hash::combine(h, hash_of(&b));
        Expr::new_node(ty, h, build(a, b))
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::ADD, "Add", |a, b| ExprKind::Add { a, b })
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::SUB, "Sub", |a, b| ExprKind::Sub { a, b })
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::MUL, "Mul", |a, b| ExprKind::Mul { a, b })
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::DIV, "Div", |a, b| ExprKind::Div { a, b })
    }

    pub fn modulo(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::MOD, "Mod", |a, b| ExprKind::Mod { a, b })
    }

    pub fn min(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::MIN, "Min", |a, b| ExprKind::Min { a, b })
    }

    pub fn max(a: Expr, b: Expr) -> Expr {
        Expr::binary_arith(a, b, tag::MAX, "Max", |a, b| ExprKind::Max { a, b })
    }

    /// Comparison ops force a boolean result with the operands' vector
    /// width.
    fn comparison(a: Expr, b: Expr, t: u32, op: &str, build: fn(Expr, Expr) -> ExprKind) -> Expr {
        let ty = check_matching_binary(&a, &b, op);
        let mut h = hash::hash_small(t);
        h = hash::combine(h, hash_of(&a));
        h = hash::combine(h, hash_of(&b));
        Expr::new_node(Type::bool_vec(ty.width), h, build(a, b))
    }

    pub fn eq(a: Expr, b: Expr) -> Expr {
        Expr::comparison(a, b, tag::EQ, "EQ", |a, b| ExprKind::EQ { a, b })
    }

    pub fn ne(a: Expr, b: Expr) -> Expr {
        Expr::comparison(a, b, tag::NE, "NE", |a, b| ExprKind::NE { a, b })
    }

    pub fn lt(a: Expr, b: Expr) -> Expr {
        Expr::comparison(a, b, tag::LT, "LT", |a, b| ExprKind::LT { a, b })
    }

    pub fn le(a: Expr, b: Expr) -> Expr {
        Expr::comparison(a, b, tag::LE, "LE", |a, b| ExprKind::LE { a, b })
    }

    pub fn gt(a: Expr, b: Expr) -> Expr {
        Expr::comparison(a, b, tag::GT, "GT", |a, b| ExprKind::GT { a, b })
    }

    pub fn ge(a: Expr, b: Expr) -> Expr {
        Expr::comparison(a, b, tag::GE, "GE", |a, b| ExprKind::GE { a, b })
    }

    fn logical(a: Expr, b: Expr, t: u32, op: &str, build: fn(Expr, Expr) -> ExprKind) -> Expr {
        check_defined(&a, op);
        check_defined(&b, op);
        internal_assert!(a.ty().is_bool(), "lhs of {} is not a bool", op);
        internal_assert!(b.ty().is_bool(), "rhs of {} is not a bool", op);
        let width = a.ty().width;
        let mut h = hash::hash_small(t);
        h = hash::combine(h, hash_of(&a));
        h = hash::combine(h, hash_of(&b));
        Expr::new_node(Type::bool_vec(width), h, build(a, b))
    }

    pub fn and(a: Expr, b: Expr) -> Expr {
        Expr::logical(a, b, tag::AND, "And", |a, b| ExprKind::And { a, b })
    }

    pub fn or(a: Expr, b: Expr) -> Expr {
        Expr::logical(a, b, tag::OR, "Or", |a, b| ExprKind::Or { a, b })
    }

    pub fn not(a: Expr) -> Expr {
        check_defined(&a, "Not");
        internal_assert!(a.ty().is_bool(), "argument of Not is not a bool");
        let width = a.ty().width;
        let h = hash::combine(hash::hash_small(tag::NOT), hash_of(&a));
        Expr::new_node(Type::bool_vec(width), h, ExprKind::Not { a })
    }

    /// `condition ? true_value : false_value`. The condition must be a
    /// boolean whose width is 1 or the width of the two values, which must
    /// agree in type.
    pub fn select(condition: Expr, true_value: Expr, false_value: Expr) -> Expr {
        check_defined(&condition, "Select");
        check_defined(&true_value, "Select");
        check_defined(&false_value, "Select");
        internal_assert!(condition.ty().is_bool(), "First argument to Select is not a bool");
        internal_assert!(
            true_value.ty() == false_value.ty(),
            "Select of mismatched types"
        );
        internal_assert!(
            condition.ty().is_scalar() || condition.ty().width == true_value.ty().width,
            "In Select, vector width of condition must either be 1, or equal to vector width of arguments"
        );
        let ty = true_value.ty();
        let mut h = hash::hash_small(tag::SELECT);
        h = hash::combine(h, hash_of(&condition));
        h = hash::combine(h, hash_of(&true_value));
        h = hash::combine(h, hash_of(&false_value));
        Expr::new_node(ty, h, ExprKind::Select { condition, true_value, false_value })
    }

    /// Load of type `ty` from the named storage. The index width must match
    /// the load width.
    pub fn load(ty: Type, name: impl Into<String>, index: Expr, image: Buffer, param: Parameter) -> Expr {
        check_defined(&index, "Load");
        internal_assert!(
            ty.width == index.ty().width,
            "Vector width of Load must match vector width of index"
        );
        let name = name.into();
        let mut h = hash::hash_small(tag::LOAD);
        h = hash::combine(h, hash::hash_type(ty));
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash_of(&index));
        Expr::new_node(ty, h, ExprKind::Load { name, index, image, param })
    }

    /// The strided vector [base, base + stride, ...] of `width` lanes
    pub fn ramp(base: Expr, stride: Expr, width: u16) -> Expr {
        check_defined(&base, "Ramp");
        check_defined(&stride, "Ramp");
        internal_assert!(base.ty().is_scalar(), "Ramp with vector base");
        internal_assert!(stride.ty().is_scalar(), "Ramp with vector stride");
        internal_assert!(width > 1, "Ramp of width <= 1");
        internal_assert!(stride.ty() == base.ty(), "Ramp of mismatched types");
        let ty = base.ty().vector_of(width);
        let mut h = hash::hash_small(tag::RAMP);
        h = hash::combine(h, hash_of(&base));
        h = hash::combine(h, hash_of(&stride));
        h = hash::combine(h, hash::hash_small(u32::from(width)));
        Expr::new_node(ty, h, ExprKind::Ramp { base, stride, width })
    }

    /// A scalar value repeated across `width` lanes
    pub fn broadcast(value: Expr, width: u16) -> Expr {
        check_defined(&value, "Broadcast");
        internal_assert!(value.ty().is_scalar(), "Broadcast of vector");
        internal_assert!(width > 1, "Broadcast of width <= 1");
        let ty = value.ty().vector_of(width);
        let mut h = hash::hash_small(tag::BROADCAST);
        h = hash::combine(h, hash_of(&value));
        h = hash::combine(h, hash::hash_small(u32::from(width)));
        Expr::new_node(ty, h, ExprKind::Broadcast { value, width })
    }

    /// The general call factory. Stage calls are checked against the
    /// callee's definition; image calls must be bound to an image or a
    /// buffer parameter; both require 32-bit integer index arguments.
    #[allow(clippy::too_many_arguments)]
    pub fn call(
        ty: Type,
        name: impl Into<String>,
        args: Vec<Expr>,
        call_type: CallType,
        func: Function,
        value_index: usize,
        image: Buffer,
        param: Parameter,
    ) -> Expr {
        let name = name.into();
        let mut h = hash::hash_type(ty);
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash::hash_small(call_type as u32));
        h = hash::combine(h, hash::hash_small(value_index as u32));
        for arg in &args {
            check_defined(arg, "Call");
            h = hash::combine(h, hash_of(arg));
        }
        match call_type {
            CallType::Stage => {
                internal_assert!(
                    value_index < func.outputs(),
                    "Value index out of range in call to pipeline stage"
                );
                internal_assert!(
                    func.has_pure_definition() || func.has_extern_definition(),
                    "Call to undefined pipeline stage"
                );
                internal_assert!(
                    args.len() <= func.dimensions(),
                    "Call node with too many arguments"
                );
                for arg in &args {
                    internal_assert!(
                        arg.ty() == Type::int(32),
                        "Args to call to pipeline stage must be type i32"
                    );
                }
            }
            CallType::Image => {
                internal_assert!(
                    param.defined() || image.defined(),
                    "Call node to undefined image"
                );
                for arg in &args {
                    internal_assert!(
                        arg.ty() == Type::int(32),
                        "Args to load from image must be type i32"
                    );
                }
            }
            CallType::Extern | CallType::Intrinsic => {}
        }
        Expr::new_node(
            ty,
            h,
            ExprKind::Call { name, args, call_type, func, value_index, image, param },
        )
    }

    /// Call to another pipeline stage, by handle
    pub fn call_stage(ty: Type, func: Function, args: Vec<Expr>, value_index: usize) -> Expr {
        let name = func.name();
        Expr::call(
            ty,
            name,
            args,
            CallType::Stage,
            func,
            value_index,
            Buffer::undefined(),
            Parameter::undefined(),
        )
    }

    /// Call to a compiler-known intrinsic (see [`intrinsic`])
    pub fn call_intrinsic(ty: Type, name: &str, args: Vec<Expr>) -> Expr {
        Expr::call(
            ty,
            name,
            args,
            CallType::Intrinsic,
            Function::undefined(),
            0,
            Buffer::undefined(),
            Parameter::undefined(),
        )
    }

    /// Load from a concrete image
    pub fn call_image(ty: Type, image: Buffer, args: Vec<Expr>) -> Expr {
        let name = image.name().to_string();
        Expr::call(
            ty,
            name,
            args,
            CallType::Image,
            Function::undefined(),
            0,
            image,
            Parameter::undefined(),
        )
    }

    /// Binds `name` to `value` within `body`; the node's type is the body's
    pub fn let_in(name: impl Into<String>, value: Expr, body: Expr) -> Expr {
        check_defined(&value, "Let");
        check_defined(&body, "Let");
        let name = name.into();
        let ty = body.ty();
        let mut h = hash::hash_small(tag::LET);
        h = hash::combine(h, hash::hash_string(&name));
        h = hash::combine(h, hash_of(&value));
        h = hash::combine(h, hash_of(&body));
        Expr::new_node(ty, h, ExprKind::Let { name, value, body })
    }
}

/// The immortal cache of small integer immediates. Initialized once,
/// never freed; every `Expr::int` in −8..=8 aliases these nodes.
fn small_int_cache() -> &'static [Expr; 17] {
    static CACHE: OnceLock<[Expr; 17]> = OnceLock::new();
    CACHE.get_or_init(|| std::array::from_fn(|i| Expr::new_int(i as i32 - 8)))
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::int(value)
    }
}

impl From<f32> for Expr {
    fn from(value: f32) -> Self {
        Expr::float(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::string(value)
    }
}

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::add(self, rhs)
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::sub(self, rhs)
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::mul(self, rhs)
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::div(self, rhs)
    }
}

impl ops::Rem for Expr {
    type Output = Expr;
    fn rem(self, rhs: Expr) -> Expr {
        Expr::modulo(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_int_cache_shares_nodes() {
        let a = Expr::int(3);
        let b = Expr::int(3);
        assert!(a.same_as(&b));
        // Outside the cached range every make allocates.
        let c = Expr::int(100);
        let d = Expr::int(100);
        assert!(!c.same_as(&d));
    }

    #[test]
    fn test_hash_stability() {
        let x = Expr::var(Type::int(32), "x");
        let y = Expr::var(Type::int(32), "x");
        let a = Expr::add(x.clone(), Expr::int(1));
        let b = Expr::add(y, Expr::int(1));
        assert!(!a.same_as(&b));
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_comparison_type() {
        let a = Expr::var(Type::int(32).vector_of(4), "a");
        let b = Expr::var(Type::int(32).vector_of(4), "b");
        let c = Expr::lt(a, b);
        assert_eq!(c.ty(), Type::bool_vec(4));
    }

    #[test]
    #[should_panic(expected = "mismatched types")]
    fn test_comparison_mismatch_is_fatal() {
        Expr::eq(Expr::int(1), Expr::float(1.0));
    }

    #[test]
    #[should_panic(expected = "Add of undefined")]
    fn test_add_undefined_is_fatal() {
        Expr::add(Expr::undefined(), Expr::int(1));
    }

    #[test]
    #[should_panic(expected = "not a bool")]
    fn test_and_requires_bool() {
        Expr::and(Expr::int(1), Expr::int(0));
    }

    #[test]
    fn test_select_width_rule() {
        let c = Expr::var(Type::bool_type(), "c");
        let t = Expr::var(Type::float(32).vector_of(8), "t");
        let f = Expr::var(Type::float(32).vector_of(8), "f");
        // Scalar condition against vector values is allowed.
        let s = Expr::select(c, t.clone(), f.clone());
        assert_eq!(s.ty(), Type::float(32).vector_of(8));
        // So is a matching-width vector condition.
        let cv = Expr::var(Type::bool_vec(8), "cv");
        Expr::select(cv, t, f);
    }

    #[test]
    #[should_panic(expected = "vector width of condition")]
    fn test_select_width_mismatch_is_fatal() {
        let cv = Expr::var(Type::bool_vec(2), "cv");
        let t = Expr::var(Type::float(32).vector_of(8), "t");
        let f = Expr::var(Type::float(32).vector_of(8), "f");
        Expr::select(cv, t, f);
    }

    #[test]
    #[should_panic(expected = "Ramp of width")]
    fn test_ramp_width_is_fatal() {
        Expr::ramp(Expr::int(0), Expr::int(1), 1);
    }

    #[test]
    #[should_panic(expected = "Broadcast of vector")]
    fn test_broadcast_of_vector_is_fatal() {
        let v = Expr::var(Type::int(32).vector_of(4), "v");
        Expr::broadcast(v, 4);
    }

    #[test]
    fn test_stage_call_checks() {
        let f = crate::function::Function::new("f");
        f.define(vec!["x".into()], vec![Expr::int(0)]);
        let call = Expr::call_stage(Type::int(32), f, vec![Expr::var(Type::int(32), "x")], 0);
        assert_eq!(call.ty(), Type::int(32));
    }

    #[test]
    #[should_panic(expected = "Value index out of range")]
    fn test_stage_call_value_index_is_fatal() {
        let f = crate::function::Function::new("f");
        f.define(vec!["x".into()], vec![Expr::int(0)]);
        Expr::call_stage(Type::int(32), f, vec![Expr::var(Type::int(32), "x")], 1);
    }

    #[test]
    #[should_panic(expected = "must be type i32")]
    fn test_stage_call_arg_type_is_fatal() {
        let f = crate::function::Function::new("f");
        f.define(vec!["x".into()], vec![Expr::int(0)]);
        Expr::call_stage(Type::int(32), f, vec![Expr::float(0.0)], 0);
    }

    #[test]
    #[should_panic(expected = "undefined image")]
    fn test_image_call_requires_binding() {
        Expr::call(
            Type::uint(8),
            "input",
            vec![Expr::int(0)],
            CallType::Image,
            Function::undefined(),
            0,
            Buffer::undefined(),
            Parameter::undefined(),
        );
    }

    #[test]
    fn test_operator_sugar() {
        let x = Expr::var(Type::int(32), "x");
        let e = x.clone() * x.clone() + x.clone();
        assert!(matches!(e.kind(), Some(ExprKind::Add { .. })));
    }

    #[test]
    fn test_literal_conversions() {
        let i: Expr = 5.into();
        assert!(matches!(i.kind(), Some(ExprKind::IntImm { value: 5 })));
        let s: Expr = "boom".into();
        assert!(matches!(s.kind(), Some(ExprKind::StringImm { .. })));
    }
}
