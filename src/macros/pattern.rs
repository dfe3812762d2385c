// Macro parameter patterns: compiled once when `macro` is evaluated, matched against
// the unevaluated argument forms of every call.
//
// Pattern language:
// - a bindable symbol binds the argument at its position, whatever it is
// - a nested list destructures a list argument of the same shape
// - the reserved symbols `else`, `in`, `unquote` and `unquote-splice`, and non-symbol
//   atoms, are keywords that must equal the argument exactly
// - `& name` as the final two elements of a list binds all remaining arguments

use std::collections::HashMap;

use tracing::trace;

use crate::Error;
use crate::ast::Value;
use crate::stack::ensure_sufficient_stack;

use super::is_reserved;

/// Compiled macro parameter pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Binds the matched form to this name
    Variable(String),
    /// Requires the matched form to equal this value
    Literal(Value),
    /// Destructures a list positionally. `rest` receives the unconsumed tail.
    List {
        items: Vec<Pattern>,
        rest: Option<String>,
    },
}

/// Values bound by a successful match, keyed by pattern variable
pub type Bindings = HashMap<String, Value>;

const VARIADIC_MARKER: &str = "&";

/// Compile a macro parameter form. The top-level form must be a list.
pub(crate) fn compile_pattern(params: &Value) -> Result<Pattern, Error> {
    match params {
        Value::List(_) => compile_element(params),
        other => Err(Error::malformed(
            "macro",
            format!("parameters must be a list, got {other}"),
        )),
    }
}

fn compile_element(form: &Value) -> Result<Pattern, Error> {
    match form {
        Value::Symbol(name) if name == VARIADIC_MARKER => Err(Error::malformed(
            "macro",
            "'&' may only appear inside a parameter list",
        )),
        Value::Symbol(name) if is_reserved(name) => Ok(Pattern::Literal(form.clone())),
        Value::Symbol(name) => Ok(Pattern::Variable(name.clone())),
        Value::List(elements) => ensure_sufficient_stack(|| compile_list(elements)),
        atom => Ok(Pattern::Literal(atom.clone())),
    }
}

fn compile_list(elements: &[Value]) -> Result<Pattern, Error> {
    let marker = elements
        .iter()
        .position(|e| e.as_symbol() == Some(VARIADIC_MARKER));

    let (fixed, rest) = match marker {
        None => (elements, None),
        Some(index) => match &elements[index + 1..] {
            [Value::Symbol(name)] if name != VARIADIC_MARKER && !is_reserved(name) => {
                (&elements[..index], Some(name.clone()))
            }
            _ => {
                return Err(Error::malformed(
                    "macro",
                    "'&' must be followed by exactly one parameter name",
                ));
            }
        },
    };

    let items = fixed
        .iter()
        .map(compile_element)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pattern::List { items, rest })
}

/// Match the argument forms of a call against the top-level parameter pattern
pub(crate) fn bind(pattern: &Pattern, args: &[Value]) -> Result<Bindings, Error> {
    let mut bindings = Bindings::new();
    match pattern {
        Pattern::List { items, rest } => bind_list(items, rest.as_deref(), args, &mut bindings)?,
        single => bind_one(single, &Value::list(args.to_vec()), &mut bindings)?,
    }
    Ok(bindings)
}

fn bind_list(
    items: &[Pattern],
    rest: Option<&str>,
    values: &[Value],
    bindings: &mut Bindings,
) -> Result<(), Error> {
    let shape_ok = match rest {
        Some(_) => values.len() >= items.len(),
        None => values.len() == items.len(),
    };
    if !shape_ok {
        let expected = match rest {
            Some(_) => format!("at least {}", items.len()),
            None => items.len().to_string(),
        };
        return Err(Error::PatternMismatch(format!(
            "expected {expected} forms, got {}",
            values.len()
        )));
    }

    for (item, value) in items.iter().zip(values) {
        bind_one(item, value, bindings)?;
    }

    if let Some(name) = rest {
        let tail = Value::list(values[items.len()..].to_vec());
        trace!(name, tail = %tail, "bound variadic tail");
        bindings.insert(name.to_owned(), tail);
    }
    Ok(())
}

fn bind_one(pattern: &Pattern, value: &Value, bindings: &mut Bindings) -> Result<(), Error> {
    match pattern {
        Pattern::Variable(name) => {
            bindings.insert(name.clone(), value.clone());
            Ok(())
        }
        Pattern::Literal(expected) if expected == value => Ok(()),
        Pattern::Literal(expected) => Err(Error::PatternMismatch(format!(
            "expected keyword {expected}, found {value}"
        ))),
        Pattern::List { items, rest } => match value {
            Value::List(elements) => {
                ensure_sufficient_stack(|| bind_list(items, rest.as_deref(), elements, bindings))
            }
            other => Err(Error::PatternMismatch(format!(
                "expected a list form, found {other}"
            ))),
        },
    }
}
