//! Concrete image buffers and external parameters
//!
//! `Load`, `Call`, and `Variable` nodes can be bound to a concrete image
//! buffer or to an external parameter supplied at pipeline run time. Both are
//! cheap shared handles with an undefined (unbound) default state.

use crate::types::Type;
use std::sync::Arc;

#[derive(Debug)]
struct BufferContents {
    name: String,
    ty: Type,
    dimensions: u8,
}

/// A concrete image buffer an IR tree can read from.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    contents: Option<Arc<BufferContents>>,
}

impl Buffer {
    pub fn new(name: impl Into<String>, ty: Type, dimensions: u8) -> Self {
        Self {
            contents: Some(Arc::new(BufferContents {
                name: name.into(),
                ty,
                dimensions,
            })),
        }
    }

    /// The unbound buffer
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn defined(&self) -> bool {
        self.contents.is_some()
    }

    pub fn name(&self) -> &str {
        self.contents
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("")
    }

    pub fn ty(&self) -> Option<Type> {
        self.contents.as_ref().map(|c| c.ty)
    }

    pub fn dimensions(&self) -> u8 {
        self.contents.as_ref().map(|c| c.dimensions).unwrap_or(0)
    }

    /// Whether two handles refer to the same underlying buffer
    pub fn same_as(&self, other: &Buffer) -> bool {
        match (&self.contents, &other.contents) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct ParameterContents {
    name: String,
    ty: Type,
    is_buffer: bool,
}

/// An external parameter bound at pipeline run time: either a scalar
/// argument or a whole input/output buffer.
#[derive(Debug, Clone, Default)]
pub struct Parameter {
    contents: Option<Arc<ParameterContents>>,
}

impl Parameter {
    /// A scalar runtime parameter
    pub fn scalar(name: impl Into<String>, ty: Type) -> Self {
        Self {
            contents: Some(Arc::new(ParameterContents {
                name: name.into(),
                ty,
                is_buffer: false,
            })),
        }
    }

    /// A buffer-valued runtime parameter
    pub fn buffer(name: impl Into<String>, ty: Type) -> Self {
        Self {
            contents: Some(Arc::new(ParameterContents {
                name: name.into(),
                ty,
                is_buffer: true,
            })),
        }
    }

    /// The unbound parameter
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn defined(&self) -> bool {
        self.contents.is_some()
    }

    pub fn name(&self) -> &str {
        self.contents
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("")
    }

    pub fn ty(&self) -> Option<Type> {
        self.contents.as_ref().map(|c| c.ty)
    }

    pub fn is_buffer(&self) -> bool {
        self.contents.as_ref().map(|c| c.is_buffer).unwrap_or(false)
    }

    /// Whether two handles refer to the same underlying parameter
    pub fn same_as(&self, other: &Parameter) -> bool {
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

    #[test]
    fn test_undefined_buffer() {
        let b = Buffer::undefined();
        assert!(!b.defined());
        assert!(b.same_as(&Buffer::undefined()));
    }

    #[test]
    fn test_buffer_identity() {
        let a = Buffer::new("input", Type::uint(8), 2);
        let b = a.clone();
        let c = Buffer::new("input", Type::uint(8), 2);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_parameter_kinds() {
        let s = Parameter::scalar("threshold", Type::float(32));
        let b = Parameter::buffer("input", Type::uint(8));
        assert!(!s.is_buffer());
        assert!(b.is_buffer());
        assert_eq!(s.name(), "threshold");
    }
}
