//! Lexical scopes.
//!
//! An [`Environment`] is a cheap, cloneable handle to one scope. Scopes link to
//! their parent, and a closure keeps the scope it was created in alive for as long
//! as the closure itself is reachable. Cloning a handle never copies bindings:
//! every clone observes `def` and `set` performed through any other clone.
//!
//! Handles are `!Send`. One interpreter instance belongs to one thread; hosts that
//! need several threads create one root environment per thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::ast::Value;
use crate::builtinops::Arity;
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};

/// Coarse category of a binding, for presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BindingKind {
    NativeFunction,
    Macro,
    Other,
}

/// One visible binding, as reported by [`Environment::get_all_bindings`]
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub value: Value,
    pub kind: BindingKind,
}

struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Shared handle to a scope in the environment chain
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create an empty root scope (no builtins; see
    /// [`crate::evaluator::create_global_env`] for a populated one)
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: None,
        })))
    }

    /// Create an empty child scope of `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Bind `name` in this scope, replacing any binding it already has here.
    /// Returns the value.
    pub fn define(&self, name: impl Into<String>, value: Value) -> Value {
        self.0.borrow_mut().bindings.insert(name.into(), value.clone());
        value
    }

    /// Replace the binding of `name` in the nearest scope that has one
    pub fn set(&self, name: &str, value: Value) -> Result<Value, Error> {
        let mut current = self.clone();
        loop {
            let parent = {
                let mut scope = current.0.borrow_mut();
                if let Some(slot) = scope.bindings.get_mut(name) {
                    *slot = value.clone();
                    return Ok(value);
                }
                scope.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return Err(Error::UnboundSymbol(name.to_owned())),
            }
        }
    }

    /// Look up `name`, walking outward from this scope
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        self.lookup(name)
            .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    /// Whether `name` is bound in this scope or any enclosing one
    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let parent = {
                let scope = current.0.borrow();
                if let Some(value) = scope.bindings.get(name) {
                    return Some(value.clone());
                }
                scope.parent.clone()
            };
            current = parent?;
        }
    }

    /// Whether two handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a builtin that works directly on its argument slice.
    ///
    /// # Example
    /// ```
    /// use nexis::ast::Value;
    /// use nexis::{Error, create_global_env};
    ///
    /// fn argc(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Number(args.len() as f64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("argc", argc);
    /// // Now [argc 1 2 3] evaluates to 3
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.bind_builtin(name, Arity::Any, wrapped);
    }

    /// Register a strongly-typed Rust function as a builtin, with automatic
    /// argument conversion and result wrapping.
    ///
    /// ```rust,ignore
    /// fn hypot(a: f64, b: f64) -> f64 { (a * a + b * b).sqrt() }
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// ```
    ///
    /// Supported parameter types: `f64` (number), `bool`, `&str`, `String`,
    /// `Value` (any value, moved), and the list iterators `ValueIter<'_>`,
    /// `NumIter<'_>`, `StringIter<'_>` (a list argument, element-typed).
    /// Supported return types: `Value`, `f64`, `bool`, `String`, or
    /// `Result<_, Error>` of one of those.
    ///
    /// Arity is derived from the signature. Conversion failures are `TypeMismatch`.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        self.bind_builtin(name, Arity::Any, func.into_operation());
    }

    /// Register a builtin whose last parameter receives all remaining arguments
    /// as one of the iterator types (`ValueIter<'_>`, `NumIter<'_>`, `StringIter<'_>`),
    /// optionally after a fixed prefix of typed parameters.
    ///
    /// The argument count is checked against `arity` before each call, since
    /// a rest parameter alone does not determine the minimum.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        self.bind_builtin(name, arity, func.into_variadic_operation());
    }

    fn bind_builtin(&self, name: &str, arity: Arity, func: Arc<OperationFn>) {
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                arity,
                func,
            },
        );
    }

    /// All bindings visible from this scope, inner bindings shadowing outer
    /// ones, sorted by name
    pub fn get_all_bindings(&self) -> Vec<Binding> {
        let mut visible: HashMap<String, Value> = HashMap::new();
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let scope = env.0.borrow();
            for (name, value) in &scope.bindings {
                visible
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            current = scope.parent.clone();
        }

        let mut result: Vec<Binding> = visible
            .into_iter()
            .map(|(name, value)| {
                let kind = match &value {
                    Value::BuiltinFunction { .. } => BindingKind::NativeFunction,
                    Value::Macro(_) => BindingKind::Macro,
                    _ => BindingKind::Other,
                };
                Binding { name, value, kind }
            })
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Names only: values may hold closures that point back at this scope.
        let scope = self.0.borrow();
        let mut names: Vec<&String> = scope.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}
