//! Lexically-scoped symbol table
//!
//! Maps names to stacks of values, so shadowed bindings are restored when
//! the inner binding is popped. Used by rewriting passes to track per-name
//! state (the multi-mutator records fork counts here).

use mirage_error::internal_error;
use std::collections::HashMap;

/// A name → stack-of-values table with push/pop shadowing semantics.
#[derive(Debug, Default)]
pub struct Scope<T> {
    table: HashMap<String, Vec<T>>,
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Binds `name` to `value`, shadowing any existing binding.
    pub fn push(&mut self, name: impl Into<String>, value: T) {
        self.table.entry(name.into()).or_default().push(value);
    }

    /// Removes the innermost binding of `name`, restoring the shadowed one.
    /// Fatal if the name is not bound.
    pub fn pop(&mut self, name: &str) {
        match self.table.get_mut(name) {
            Some(stack) if !stack.is_empty() => {
                stack.pop();
                if stack.is_empty() {
                    self.table.remove(name);
                }
            }
            _ => internal_error!("popping {} from an empty scope", name),
        }
    }

    /// The innermost binding of `name`. Fatal if not bound; use
    /// [`Scope::contains`] to probe first.
    pub fn get(&self, name: &str) -> &T {
        match self.table.get(name).and_then(|stack| stack.last()) {
            Some(value) => value,
            None => internal_error!("{} not in scope", name),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table
            .get(name)
            .map(|stack| !stack.is_empty())
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_get_pop() {
        let mut scope: Scope<usize> = Scope::new();
        scope.push("x", 3);
        assert!(scope.contains("x"));
        assert_eq!(*scope.get("x"), 3);
        scope.pop("x");
        assert!(!scope.contains("x"));
    }

    #[test]
    fn test_shadowing_restores() {
        let mut scope: Scope<usize> = Scope::new();
        scope.push("x", 1);
        scope.push("x", 2);
        assert_eq!(*scope.get("x"), 2);
        scope.pop("x");
        assert_eq!(*scope.get("x"), 1);
    }

    #[test]
    #[should_panic(expected = "empty scope")]
    fn test_pop_unbound_is_fatal() {
        let mut scope: Scope<usize> = Scope::new();
        scope.pop("ghost");
    }
}
