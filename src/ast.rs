//! This module defines the core value type of the interpreter. [`Value`] is both the
//! parsed program (numbers, strings, booleans, `null`, symbols and lists produced by
//! the reader) and the runtime value space, which adds closures, builtin functions
//! and macros. Ergonomic helpers such as [`val`], [`sym`] and [`nil`] build values in
//! code and tests, and `From` conversions cover common Rust literals, arrays and vectors.
//!
//! Lists are reference counted. Cloning a list value shares the same allocation, which
//! is what the `=` builtin uses for its identity comparison of lists.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::builtinops::Arity;
use crate::environment::Environment;
use crate::evaluator::intooperation::OperationFn;
use crate::macros::Pattern;

/// Type alias for number values in interpreter
pub(crate) type NumberType = f64;

/// Core value type in interpreter
///
/// To build values, use the ergonomic helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for the empty list
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Numbers (double precision)
    Number(NumberType),
    /// String literals
    String(String),
    /// Boolean values
    Bool(bool),
    /// The `null` value
    Nil,
    /// Symbols (identifiers)
    Symbol(String),
    /// Lists, shared by reference
    List(Rc<Vec<Value>>),
    /// User-defined functions created by `fn`
    Closure(Rc<Closure>),
    /// Native functions registered in the root environment or by the host
    BuiltinFunction {
        id: String,
        arity: Arity,
        func: Arc<OperationFn>,
    },
    /// Macros created by `macro`
    Macro(Rc<Macro>),
}

/// A function value: parameter names, body, and the scope it was created in
pub struct Closure {
    pub params: Vec<String>,
    /// Name bound to the list of surplus arguments (`& rest`)
    pub rest: Option<String>,
    pub body: Value,
    pub env: Environment,
}

/// A macro value. Macros hold no environment: their expansion is evaluated in the
/// caller's scope.
#[derive(Debug)]
pub struct Macro {
    pub name: String,
    pub params: Pattern,
    pub body: Value,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The captured environment is omitted: it commonly contains this closure.
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Nil => write!(f, "Nil"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Closure(closure) => write!(f, "{closure:?}"),
            Value::BuiltinFunction { id, arity, .. } => {
                write!(f, "BuiltinFunction({id}, {arity})")
            }
            Value::Macro(mac) => write!(f, "Macro({})", mac.name),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(Into::into).collect())
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
pub fn nil() -> Value {
    Value::list(Vec::new())
}

impl Value {
    /// Wrap a vector as a fresh list value
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    /// Build the two-element form `(head arg)`, used for quote and unquote shorthands
    pub(crate) fn form(head: &str, arg: Value) -> Value {
        Value::list(vec![sym(head), arg])
    }

    /// Borrow the elements if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// `false` and `null` are falsy; every other value is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    /// Short tag name used in type mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "null",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Closure(_) => "function",
            Value::BuiltinFunction { .. } => "builtin",
            Value::Macro(_) => "macro",
        }
    }

    /// Equality as seen by the `=` builtin: atoms by value, lists and callables by
    /// identity. Values of different tags are never identical.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltinFunction { func: a, .. }, Value::BuiltinFunction { func: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    /// Render the value the way `print` and `cat` show it: strings without quotes,
    /// lists as `[elem elem ...]` with elements rendered the same way.
    pub fn to_print_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_print_string).collect();
                format!("[{}]", parts.join(" "))
            }
            other => other.to_string(),
        }
    }
}

/// Structural equality, used by tests and by pattern keyword matching. The `=`
/// builtin uses [`Value::identical`] instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Closure(_), Value::Closure(_))
            | (Value::Macro(_), Value::Macro(_))
            | (Value::BuiltinFunction { .. }, Value::BuiltinFunction { .. }) => {
                self.identical(other)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => write!(f, "null"),
            Value::List(elements) => {
                write!(f, "[")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
            Value::Closure(_) => write!(f, "#<function>"),
            Value::BuiltinFunction { id, .. } => write!(f, "#<builtin:{id}>"),
            Value::Macro(_) => write!(f, "#<macro>"),
        }
    }
}
