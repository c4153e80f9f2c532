//! Lexical scope stack for the data-flow walk
//!
//! Each entry records the variables declared in one block. Function bodies
//! open a boundary scope: lookups never see past it, since a function
//! cannot reach the variables of the code around its definition.

use std::collections::HashSet;

#[derive(Debug, Default)]
struct Scope {
    variables: HashSet<String>,
    is_function: bool,
}

/// Stack-based scope tracking
#[derive(Debug)]
pub struct ScopeStack {
    /// Stack of scopes, index 0 is the program's outermost scope
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// Create a stack holding the outermost scope
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope {
                variables: HashSet::new(),
                is_function: true,
            }],
        }
    }

    /// Push a plain block scope
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Push the scope of a function body, hiding every enclosing variable
    pub fn push_function_scope(&mut self) {
        self.scopes.push(Scope {
            variables: HashSet::new(),
            is_function: true,
        });
    }

    /// Pop the current scope and return the variables it declared.
    ///
    /// The outermost scope is never popped.
    pub fn pop_scope(&mut self) -> HashSet<String> {
        if self.scopes.len() <= 1 {
            return HashSet::new();
        }
        self.scopes.pop().map(|scope| scope.variables).unwrap_or_default()
    }

    /// Declare a variable in the current (topmost) scope
    pub fn declare(&mut self, name: impl Into<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.variables.insert(name.into());
        }
    }

    /// Whether `name` is visible from the current point
    pub fn in_scope(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.variables.contains(name) {
                return true;
            }
            if scope.is_function {
                return false;
            }
        }
        false
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
