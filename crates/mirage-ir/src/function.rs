//! Pipeline functions
//!
//! A [`Function`] is a named stage of an image pipeline: a pure definition
//! giving one value expression per output, plus any number of update
//! (reduction) definitions that accumulate into previously-computed values.
//!
//! Functions are shared handles. A `Call` node holds the callee's handle, and
//! update definitions may reference their own function, so identity is
//! pointer identity (`same_as`), never structural.

use crate::expr::Expr;
use mirage_error::{internal_assert, internal_error};
use parking_lot::RwLock;
use std::sync::Arc;

/// One variable of a reduction domain, iterated over [min, min + extent).
#[derive(Debug, Clone)]
pub struct ReductionVariable {
    pub var: String,
    pub min: Expr,
    pub extent: Expr,
}

/// The iteration domain of an update definition.
///
/// A shared handle; undefined for update definitions with no free reduction
/// variables.
#[derive(Debug, Clone, Default)]
pub struct ReductionDomain {
    contents: Option<Arc<Vec<ReductionVariable>>>,
}

impl ReductionDomain {
    pub fn new(variables: Vec<ReductionVariable>) -> Self {
        for rv in &variables {
            internal_assert!(rv.min.defined(), "Reduction domain with undefined min");
            internal_assert!(rv.extent.defined(), "Reduction domain with undefined extent");
            internal_assert!(rv.min.ty().is_scalar(), "Reduction domain with vector min");
            internal_assert!(rv.extent.ty().is_scalar(), "Reduction domain with vector extent");
        }
        Self {
            contents: Some(Arc::new(variables)),
        }
    }

    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn defined(&self) -> bool {
        self.contents.is_some()
    }

    pub fn variables(&self) -> &[ReductionVariable] {
        self.contents.as_ref().map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn same_as(&self, other: &ReductionDomain) -> bool {
        match (&self.contents, &other.contents) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// An update (reduction) definition: left-hand-side index arguments, the
/// values to accumulate, and the reduction domain they range over.
#[derive(Debug, Clone)]
pub struct UpdateDefinition {
    pub args: Vec<Expr>,
    pub values: Vec<Expr>,
    pub domain: ReductionDomain,
}

#[derive(Debug, Default)]
struct FunctionContents {
    name: String,
    /// Names of the pure dimension arguments
    args: Vec<String>,
    /// Pure definition, one expression per output
    values: Vec<Expr>,
    /// Update definitions, applied in order after the pure definition
    updates: Vec<UpdateDefinition>,
    /// Name of the external implementation, if this stage is extern
    extern_name: Option<String>,
}

/// A named pipeline stage, shared by reference.
///
/// Definitions are installed after the handle is created, which is what lets
/// an update definition call the function it belongs to.
#[derive(Debug, Clone, Default)]
pub struct Function {
    contents: Option<Arc<RwLock<FunctionContents>>>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            contents: Some(Arc::new(RwLock::new(FunctionContents {
                name: name.into(),
                ..FunctionContents::default()
            }))),
        }
    }

    /// The undefined function, carried by call nodes that do not target a
    /// pipeline stage (extern, intrinsic, and image calls).
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn defined(&self) -> bool {
        self.contents.is_some()
    }

    fn contents(&self) -> &Arc<RwLock<FunctionContents>> {
        match &self.contents {
            Some(c) => c,
            None => internal_error!("operation on undefined function"),
        }
    }

    pub fn name(&self) -> String {
        self.contents().read().name.clone()
    }

    /// Installs the pure definition.
    pub fn define(&self, args: Vec<String>, values: Vec<Expr>) {
        internal_assert!(!values.is_empty(), "Function {} defined with no values", self.name());
        for v in &values {
            internal_assert!(v.defined(), "Function {} defined with undefined value", self.name());
        }
        let mut contents = self.contents().write();
        internal_assert!(
            contents.values.is_empty(),
            "Function {} already has a pure definition",
            contents.name
        );
        tracing::debug!(function = %contents.name, outputs = values.len(), "pure definition installed");
        contents.args = args;
        contents.values = values;
    }

    /// Installs an update definition. The pure definition must exist first.
    pub fn define_update(&self, args: Vec<Expr>, values: Vec<Expr>, domain: ReductionDomain) {
        internal_assert!(
            self.has_pure_definition(),
            "Function {} has update definition without pure definition",
            self.name()
        );
        internal_assert!(!values.is_empty(), "Update of {} with no values", self.name());
        for a in &args {
            internal_assert!(a.defined(), "Update of {} with undefined argument", self.name());
        }
        for v in &values {
            internal_assert!(v.defined(), "Update of {} with undefined value", self.name());
        }
        let mut contents = self.contents().write();
        tracing::debug!(function = %contents.name, update = contents.updates.len(), "update definition installed");
        contents.updates.push(UpdateDefinition { args, values, domain });
    }

    /// Marks this stage as implemented by an external routine.
    pub fn define_extern(&self, extern_name: impl Into<String>, args: Vec<String>) {
        let mut contents = self.contents().write();
        internal_assert!(
            contents.values.is_empty() && contents.extern_name.is_none(),
            "Function {} is already defined",
            contents.name
        );
        contents.args = args;
        contents.extern_name = Some(extern_name.into());
    }

    /// Names of the pure dimension arguments
    pub fn args(&self) -> Vec<String> {
        self.contents().read().args.clone()
    }

    /// Number of dimensions the stage is defined over
    pub fn dimensions(&self) -> usize {
        self.contents().read().args.len()
    }

    /// Number of output values the stage produces
    pub fn outputs(&self) -> usize {
        let contents = self.contents().read();
        if contents.values.is_empty() && contents.extern_name.is_some() {
            1
        } else {
            contents.values.len()
        }
    }

    /// The pure definition's value expressions
    pub fn values(&self) -> Vec<Expr> {
        self.contents().read().values.clone()
    }

    /// The update definitions, in installation order
    pub fn updates(&self) -> Vec<UpdateDefinition> {
        self.contents().read().updates.clone()
    }

    pub fn has_pure_definition(&self) -> bool {
        self.defined() && !self.contents().read().values.is_empty()
    }

    pub fn has_update_definition(&self) -> bool {
        self.defined() && !self.contents().read().updates.is_empty()
    }

    pub fn has_extern_definition(&self) -> bool {
        self.defined() && self.contents().read().extern_name.is_some()
    }

    /// Whether two handles refer to the same underlying function
    pub fn same_as(&self, other: &Function) -> bool {
        match (&self.contents, &other.contents) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_define_and_query() {
        let f = Function::new("blur_x");
        f.define(
            vec!["x".into(), "y".into()],
            vec![Expr::var(Type::int(32), "x")],
        );
        assert_eq!(f.name(), "blur_x");
        assert_eq!(f.dimensions(), 2);
        assert_eq!(f.outputs(), 1);
        assert!(f.has_pure_definition());
        assert!(!f.has_update_definition());
    }

    #[test]
    fn test_update_definition() {
        let f = Function::new("hist");
        f.define(vec!["i".into()], vec![Expr::int(0)]);
        let dom = ReductionDomain::new(vec![ReductionVariable {
            var: "r".into(),
            min: Expr::int(0),
            extent: Expr::int(256),
        }]);
        f.define_update(
            vec![Expr::var(Type::int(32), "r")],
            vec![Expr::int(1)],
            dom,
        );
        assert!(f.has_update_definition());
        assert_eq!(f.updates().len(), 1);
    }

    #[test]
    #[should_panic(expected = "already has a pure definition")]
    fn test_double_definition_is_fatal() {
        let f = Function::new("f");
        f.define(vec!["x".into()], vec![Expr::int(0)]);
        f.define(vec!["x".into()], vec![Expr::int(1)]);
    }

    #[test]
    #[should_panic(expected = "without pure definition")]
    fn test_update_requires_pure() {
        let f = Function::new("f");
        f.define_update(vec![Expr::int(0)], vec![Expr::int(1)], ReductionDomain::undefined());
    }

    #[test]
    fn test_identity() {
        let f = Function::new("f");
        let g = f.clone();
        assert!(f.same_as(&g));
        assert!(!f.same_as(&Function::new("f")));
        assert!(Function::undefined().same_as(&Function::undefined()));
    }
}
