//! Built-in operations registry.
//!
//! Every name the evaluator knows natively lives in one table: ordinary builtin
//! functions, which are bound into the root environment, and special forms, which
//! the evaluator recognizes by exact symbol match before any call handling.
//!
//! ```text
//! [+ 1 2 3]            ; arithmetic, left fold over one or more numbers
//! [= a b c]            ; a = b and b = c; lists compare by identity
//! [append [list 1] 2]  ; [1 2]
//! [if test then else]  ; special form, only one branch is evaluated
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: evaluate all arguments left to right, then apply
//!   (e.g. `+`, `not`, `first`). They are values and can be passed around.
//! - **Special Forms**: receive their argument forms unevaluated and control
//!   evaluation themselves (e.g. `if`, `let`, `macro`). They are not values.
//!
//! ## Error Handling
//!
//! - **Arity**: checked against each entry's [`Arity`] before the call. Functions
//!   report `ArityError`; special forms report `MalformedSpecialForm`.
//! - **Types**: numeric builtins reject non-numbers, list builtins reject
//!   non-lists, both with `TypeMismatch`. Nothing is coerced.
//! - **Truthiness**: `not`, `and` and `or` follow the evaluator (`false` and `null`
//!   are falsy) and always return a boolean.
//!
//! ## Adding New Operations
//!
//! 1. Write a typed Rust function using the parameter types from
//!    [`crate::evaluator::intooperation`] (`NumberType`, `Value`, `&str`, `NumIter`, ...)
//! 2. Add an entry to `BUILTIN_OPS` with its identifier and arity
//! 3. Add table-driven test cases below

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::environment::Environment;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, NumIter, OperationFn, ValueIter,
};
use crate::evaluator::{
    EvalDepth, eval_cond, eval_define, eval_do, eval_fn, eval_if, eval_let, eval_macro,
    eval_quote, eval_set, eval_while,
};
use crate::output::PrintSink;

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// This many or more
    AtLeast(usize),
    /// Between the two bounds, inclusive
    Range(usize, usize),
    /// Any number, including none
    Any,
}

impl Arity {
    /// Check an argument count, producing an unnamed `ArityError` on violation
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => (min..=max).contains(&got),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(*self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "between {min} and {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Signature shared by all special form handlers: the unevaluated argument forms,
/// the scope of the form, and the current nesting depth.
pub(crate) type SpecialFormFn = fn(&[Value], &Environment, EvalDepth) -> Result<Value, Error>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Regular function that takes evaluated arguments and returns a value
    Function(Arc<OperationFn>),
    /// Special form that controls evaluation of its own argument forms
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The identifier the operation is bound to
    pub id: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub(crate) fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Wrap a function entry as a value for binding into an environment
    pub(crate) fn to_value(&self) -> Option<Value> {
        match &self.op_kind {
            OpKind::Function(func) => Some(Value::BuiltinFunction {
                id: self.id.to_owned(),
                arity: self.arity,
                func: Arc::clone(func),
            }),
            OpKind::SpecialForm(_) => None,
        }
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc + n)
}

fn builtin_sub(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc - n)
}

fn builtin_mul(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc * n)
}

// Float division: dividing by zero yields an infinity or NaN, not an error.
fn builtin_div(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc / n)
}

fn builtin_mod(a: NumberType, b: NumberType) -> NumberType {
    a % b
}

macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> bool {
            a $op b
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

/// Adjacent-pair chain: every argument must be identical to the one before it
fn builtin_eq(first: Value, rest: ValueIter<'_>) -> bool {
    let mut prev = &first;
    for current in rest {
        if !prev.identical(current) {
            return false;
        }
        prev = current;
    }
    true
}

fn builtin_ne(first: Value, rest: ValueIter<'_>) -> bool {
    !builtin_eq(first, rest)
}

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

fn builtin_and(mut args: ValueIter<'_>) -> bool {
    args.all(Value::is_truthy)
}

fn builtin_or(mut args: ValueIter<'_>) -> bool {
    args.any(Value::is_truthy)
}

macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(value: Value) -> bool {
            matches!(value, $pattern)
        }
    };
}

type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_string, Value::String(_));
type_predicate!(builtin_is_list, Value::List(_));
type_predicate!(builtin_is_boolean, Value::Bool(_));
type_predicate!(builtin_is_symbol, Value::Symbol(_));

fn builtin_is_null(value: Value) -> bool {
    match value {
        Value::Nil => true,
        Value::List(items) => items.is_empty(),
        _ => false,
    }
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::list(args.cloned().collect())
}

fn builtin_cons(head: Value, tail: ValueIter<'_>) -> Value {
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(head);
    items.extend(tail.cloned());
    Value::list(items)
}

fn builtin_first(mut list: ValueIter<'_>) -> Value {
    list.next().cloned().unwrap_or(Value::Nil)
}

fn builtin_rest(list: ValueIter<'_>) -> Value {
    Value::list(list.skip(1).cloned().collect())
}

fn builtin_len(value: Value) -> Result<NumberType, Error> {
    let len = match &value {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(Error::TypeMismatch(format!(
                "expected list or string, got {} {other}",
                other.type_name()
            )));
        }
    };
    Ok(len as NumberType)
}

/// Flattens one level: list arguments contribute their elements, anything else
/// contributes itself
fn builtin_append(args: ValueIter<'_>) -> Value {
    let mut items = Vec::new();
    for arg in args {
        match arg {
            Value::List(inner) => items.extend(inner.iter().cloned()),
            other => items.push(other.clone()),
        }
    }
    Value::list(items)
}

fn builtin_reverse(list: ValueIter<'_>) -> Value {
    Value::list(list.rev().cloned().collect())
}

fn builtin_cat(args: ValueIter<'_>) -> String {
    args.map(Value::to_print_string).collect()
}

fn format_print_line(args: ValueIter<'_>) -> String {
    let parts: Vec<String> = args.map(Value::to_print_string).collect();
    parts.join(" ")
}

/// Build the `print` builtin bound to one output sink. Each call writes the
/// space-joined print forms of its arguments as one line and returns that line.
pub(crate) fn make_print(sink: PrintSink) -> Value {
    let func: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
        let line = ValueIter::new(&args).map(format_print_line)?;
        sink.println(&line);
        Ok(Value::String(line))
    });
    Value::BuiltinFunction {
        id: "print".to_owned(),
        arity: Arity::Any,
        func,
    }
}

/// Global registry of all built-in operations.
///
/// Function entries are wired through the same adapter layer hosts use for
/// custom builtins. This is done once at initialization time via a `LazyLock`.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn function(id: &'static str, arity: Arity, func: Arc<OperationFn>) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::Function(func),
            arity,
        }
    }

    fn special_form(id: &'static str, arity: Arity, form: SpecialFormFn) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::SpecialForm(form),
            arity,
        }
    }

    type Fold = (NumberType, NumIter<'static>);
    type Binary = (NumberType, NumberType);
    type Unary = (NumberType,);
    type Chain = (Value, ValueIter<'static>);
    type OneValue = (Value,);
    type AllValues = (ValueIter<'static>,);
    type OneList = (ValueIter<'static>,);

    vec![
        // Arithmetic operations
        function("+", Arity::AtLeast(1), builtin_variadic::<Fold, _>(builtin_add)),
        function("-", Arity::AtLeast(1), builtin_variadic::<Fold, _>(builtin_sub)),
        function("*", Arity::AtLeast(1), builtin_variadic::<Fold, _>(builtin_mul)),
        function("/", Arity::AtLeast(1), builtin_variadic::<Fold, _>(builtin_div)),
        function("mod", Arity::Exact(2), builtin_fixed::<Binary, _>(builtin_mod)),
        // Comparison operations
        function("=", Arity::AtLeast(1), builtin_variadic::<Chain, _>(builtin_eq)),
        function("!=", Arity::AtLeast(1), builtin_variadic::<Chain, _>(builtin_ne)),
        function(">", Arity::Exact(2), builtin_fixed::<Binary, _>(builtin_gt)),
        function("<", Arity::Exact(2), builtin_fixed::<Binary, _>(builtin_lt)),
        function(">=", Arity::Exact(2), builtin_fixed::<Binary, _>(builtin_ge)),
        function("<=", Arity::Exact(2), builtin_fixed::<Binary, _>(builtin_le)),
        // Logical operations
        function("not", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_not)),
        function("and", Arity::Any, builtin_variadic::<AllValues, _>(builtin_and)),
        function("or", Arity::Any, builtin_variadic::<AllValues, _>(builtin_or)),
        // Math operations
        function("sqrt", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::sqrt)),
        function("abs", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::abs)),
        function("sin", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::sin)),
        function("cos", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::cos)),
        function("tan", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::tan)),
        function("log", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::ln)),
        function("exp", Arity::Exact(1), builtin_fixed::<Unary, _>(NumberType::exp)),
        function("pow", Arity::Exact(2), builtin_fixed::<Binary, _>(NumberType::powf)),
        // Type predicates
        function("number?", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_is_number)),
        function("string?", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_is_string)),
        function("list?", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_is_list)),
        function("boolean?", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_is_boolean)),
        function("symbol?", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_is_symbol)),
        function("null?", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_is_null)),
        // List operations
        function("list", Arity::Any, builtin_variadic::<AllValues, _>(builtin_list)),
        function("cons", Arity::Exact(2), builtin_fixed::<(Value, ValueIter<'static>), _>(builtin_cons)),
        function("first", Arity::Exact(1), builtin_fixed::<OneList, _>(builtin_first)),
        function("rest", Arity::Exact(1), builtin_fixed::<OneList, _>(builtin_rest)),
        function("len", Arity::Exact(1), builtin_fixed::<OneValue, _>(builtin_len)),
        function("append", Arity::Any, builtin_variadic::<AllValues, _>(builtin_append)),
        function("reverse", Arity::Exact(1), builtin_fixed::<OneList, _>(builtin_reverse)),
        // String operations
        function("cat", Arity::Any, builtin_variadic::<AllValues, _>(builtin_cat)),
        // Special forms
        special_form("quote", Arity::Exact(1), eval_quote),
        special_form("q", Arity::Exact(1), eval_quote),
        special_form("def", Arity::Exact(2), eval_define),
        special_form("set", Arity::Exact(2), eval_set),
        special_form("fn", Arity::AtLeast(2), eval_fn),
        special_form("if", Arity::Exact(3), eval_if),
        special_form("cond", Arity::Any, eval_cond),
        special_form("do", Arity::Any, eval_do),
        special_form("let", Arity::AtLeast(1), eval_let),
        special_form("while", Arity::AtLeast(1), eval_while),
        special_form("macro", Arity::Exact(3), eval_macro),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub(crate) fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Find a special form by its identifier
pub(crate) fn find_special_form(id: &str) -> Option<&'static BuiltinOp> {
    find_op(id).filter(|op| op.is_special_form())
}
