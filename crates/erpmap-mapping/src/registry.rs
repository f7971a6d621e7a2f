//! Transform registry
//!
//! Maps transform names to functions and resolves `NAME` / `NAME:ARG` specs.

use erpmap_model::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::builtins::{DateFormat, First, Join, Sum, Trim, Upper};

/// A named value transform
///
/// Implementations must be pure: the same `(value, arg)` always yields the
/// same result.
pub trait TransformFunction: Send + Sync {
    /// Name used in rule specs
    fn name(&self) -> &str;

    /// Transform `value`, with the optional argument after the first `:`
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted.
    fn apply(&self, value: &Value, arg: Option<&str>) -> crate::Result<Value>;
}

/// Type alias for closure-backed transforms
pub type TransformFn = dyn Fn(&Value, Option<&str>) -> crate::Result<Value> + Send + Sync;

/// Adapter turning a closure into a [`TransformFunction`]
pub struct FnTransform {
    name: String,
    func: Box<TransformFn>,
}

impl FnTransform {
    /// Create a transform from a name and a closure
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Value, Option<&str>) -> crate::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl TransformFunction for FnTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, value: &Value, arg: Option<&str>) -> crate::Result<Value> {
        (self.func)(value, arg)
    }
}

impl std::fmt::Debug for FnTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A parsed transform spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSpec<'a> {
    pub name: &'a str,
    pub arg: Option<&'a str>,
}

impl<'a> TransformSpec<'a> {
    /// Split a spec on its first `:`; `None` for a missing or blank spec
    #[must_use]
    pub fn parse(spec: Option<&'a str>) -> Option<Self> {
        let spec = spec?;
        if spec.trim().is_empty() {
            return None;
        }
        Some(match spec.split_once(':') {
            Some((name, arg)) => Self {
                name,
                arg: Some(arg),
            },
            None => Self {
                name: spec,
                arg: None,
            },
        })
    }
}

/// Lookup table of named transforms
///
/// Unknown names are a silent no-op: the value passes through unchanged.
#[derive(Clone)]
pub struct TransformRegistry {
    functions: HashMap<String, Arc<dyn TransformFunction>>,
}

impl TransformRegistry {
    /// Create a registry with no functions
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Create a registry with the built-in transforms
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register(Trim)
            .register(Upper)
            .register(DateFormat)
            .register(First)
            .register(Sum)
            .register(Join);
        registry
    }

    /// Add or replace a function under its own name
    pub fn register(&mut self, function: impl TransformFunction + 'static) -> &mut Self {
        self.register_arc(Arc::new(function))
    }

    /// Add or replace an already shared function
    pub fn register_arc(&mut self, function: Arc<dyn TransformFunction>) -> &mut Self {
        let name = function.name().to_string();
        debug!(transform = %name, "Registered transform");
        self.functions.insert(name, function);
        self
    }

    /// Check if a function is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Apply a transform spec to a value
    ///
    /// # Errors
    ///
    /// Returns an error only when a registered function rejects the value.
    pub fn apply(&self, spec: Option<&str>, value: Value) -> crate::Result<Value> {
        let Some(spec) = TransformSpec::parse(spec) else {
            return Ok(value);
        };

        match self.functions.get(spec.name) {
            Some(function) => function.apply(&value, spec.arg),
            None => {
                trace!(transform = spec.name, "Unknown transform, passing value through");
                Ok(value)
            }
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
