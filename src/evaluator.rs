pub mod intooperation;

use std::rc::Rc;

use tracing::debug;

use crate::ast::{Closure, Macro, Value, sym};
use crate::builtinops::{OpKind, find_special_form, get_builtin_ops, make_print};
use crate::environment::Environment;
use crate::macros::{self, compile_pattern};
use crate::output::PrintSink;
use crate::stack::ensure_sufficient_stack;
use crate::{Error, MAX_EVAL_DEPTH};

/// Evaluation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nested evaluation frames before [`Error::StackOverflow`]
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Current nesting of an evaluation, threaded through every recursive call
#[derive(Debug, Clone, Copy)]
pub(crate) struct EvalDepth {
    current: usize,
    limit: usize,
}

impl EvalDepth {
    fn root(config: &EvalConfig) -> Self {
        EvalDepth {
            current: 0,
            limit: config.max_depth,
        }
    }

    fn deeper(self) -> Result<Self, Error> {
        let current = self.current + 1;
        if current > self.limit {
            return Err(Error::StackOverflow { limit: self.limit });
        }
        Ok(EvalDepth { current, ..self })
    }
}

/// Evaluate an expression (public API)
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_config(expr, env, &EvalConfig::default())
}

/// Evaluate an expression with explicit limits
pub fn eval_with_config(expr: &Value, env: &Environment, config: &EvalConfig) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, EvalDepth::root(config))
}

/// Parse `input` and evaluate the result in `env`. Several top-level forms run in
/// order, as if wrapped in `do`.
#[cfg(feature = "reader")]
pub fn eval_source(input: &str, env: &Environment) -> Result<Value, Error> {
    let expr = crate::reader::parse(input)?;
    eval(&expr, env)
}

/// Evaluate an expression with depth tracking to prevent stack overflow
pub(crate) fn eval_with_depth_tracking(
    expr: &Value,
    env: &Environment,
    depth: EvalDepth,
) -> Result<Value, Error> {
    let depth = depth.deeper()?;
    ensure_sufficient_stack(|| match expr {
        Value::Symbol(name) => env.get(name),
        Value::List(elements) => match elements.split_first() {
            // The empty list is its own value, so identity survives evaluation
            None => Ok(expr.clone()),
            Some((head, args)) => {
                eval_list(head, args, env, depth).map_err(|err| add_context(err, expr))
            }
        },
        // Atoms, callables and null evaluate to themselves
        Value::Number(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::Nil
        | Value::Closure(_)
        | Value::BuiltinFunction { .. }
        | Value::Macro(_) => Ok(expr.clone()),
    })
}

/// Attach the innermost failing form to type errors
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::TypeMismatch(msg) if !msg.contains("while evaluating:") => {
            Error::TypeMismatch(format!("{msg}\n  while evaluating: {expr}"))
        }
        other => other,
    }
}

fn eval_args(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth))
        .collect()
}

/// Evaluate a list: special form, macro call or function application
fn eval_list(
    head: &Value,
    args: &[Value],
    env: &Environment,
    depth: EvalDepth,
) -> Result<Value, Error> {
    if let Value::Symbol(name) = head
        && let Some(op) = find_special_form(name)
        && let OpKind::SpecialForm(special_form) = &op.op_kind
    {
        op.arity.validate(args.len()).map_err(|_| {
            Error::malformed(
                op.id,
                format!("expected {} arguments, got {}", op.arity, args.len()),
            )
        })?;
        return special_form(args, env, depth);
    }

    let callee = eval_with_depth_tracking(head, env, depth)?;
    match &callee {
        Value::Macro(mac) => {
            let expansion = macros::expand(mac, args)?;
            eval_with_depth_tracking(&expansion, env, depth)
        }
        Value::BuiltinFunction { id, arity, func } => {
            let args = eval_args(args, env, depth)?;
            arity
                .validate(args.len())
                .map_err(|err| err.with_callee(id))?;
            func(args).map_err(|err| err.with_callee(id))
        }
        Value::Closure(closure) => {
            let args = eval_args(args, env, depth)?;
            apply_closure(closure, args, depth)
        }
        other => Err(Error::NotCallable(other.to_string())),
    }
}

/// Bind arguments positionally in a fresh child of the captured scope. Missing
/// arguments bind to null and surplus ones go to the rest parameter, if any.
fn apply_closure(closure: &Closure, args: Vec<Value>, depth: EvalDepth) -> Result<Value, Error> {
    let scope = Environment::with_parent(&closure.env);
    let mut args = args.into_iter();
    for param in &closure.params {
        scope.define(param.as_str(), args.next().unwrap_or(Value::Nil));
    }
    if let Some(rest) = &closure.rest {
        scope.define(rest.as_str(), Value::list(args.collect()));
    }
    eval_with_depth_tracking(&closure.body, &scope, depth)
}

fn eval_sequence(forms: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for form in forms {
        result = eval_with_depth_tracking(form, env, depth)?;
    }
    Ok(result)
}

fn expect_symbol<'a>(form: &str, value: &'a Value, what: &str) -> Result<&'a str, Error> {
    value
        .as_symbol()
        .ok_or_else(|| Error::malformed(form, format!("{what} must be a symbol, got {value}")))
}

/// Evaluate quote special form
pub(crate) fn eval_quote(args: &[Value], _env: &Environment, _depth: EvalDepth) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::malformed("quote", "expected exactly one form")),
    }
}

/// Evaluate def special form
pub(crate) fn eval_define(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    let [target, expr] = args else {
        return Err(Error::malformed("def", "expected a name and a value"));
    };
    let name = expect_symbol("def", target, "name")?;
    let value = eval_with_depth_tracking(expr, env, depth)?;
    debug!(name, value = %value, "def");
    Ok(env.define(name, value))
}

/// Evaluate set special form
pub(crate) fn eval_set(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    let [target, expr] = args else {
        return Err(Error::malformed("set", "expected a name and a value"));
    };
    let name = expect_symbol("set", target, "name")?;
    let value = eval_with_depth_tracking(expr, env, depth)?;
    env.set(name, value)
}

/// Evaluate fn special form: `[fn [a b & rest] body...]`
pub(crate) fn eval_fn(args: &[Value], env: &Environment, _depth: EvalDepth) -> Result<Value, Error> {
    let [param_form, body @ ..] = args else {
        return Err(Error::malformed("fn", "expected a parameter list and a body"));
    };
    let Some(param_list) = param_form.as_list() else {
        return Err(Error::malformed(
            "fn",
            format!("parameters must be a list, got {param_form}"),
        ));
    };

    let mut params: Vec<String> = Vec::new();
    let mut rest = None;
    let mut iter = param_list.iter();
    while let Some(param) = iter.next() {
        let name = expect_symbol("fn", param, "parameter")?;
        if name == "&" {
            let rest_name = match (iter.next(), iter.next()) {
                (Some(next), None) if next.as_symbol() != Some("&") => {
                    expect_symbol("fn", next, "rest parameter")?
                }
                _ => {
                    return Err(Error::malformed(
                        "fn",
                        "'&' must be followed by exactly one parameter name",
                    ));
                }
            };
            rest = Some(rest_name.to_owned());
            break;
        }
        params.push(name.to_owned());
    }

    let mut seen: Vec<&str> = params.iter().map(String::as_str).collect();
    seen.extend(rest.as_deref());
    for (i, name) in seen.iter().enumerate() {
        if seen[..i].contains(name) {
            return Err(Error::malformed(
                "fn",
                format!("duplicate parameter name: {name}"),
            ));
        }
    }

    let body = match body {
        [single] => single.clone(),
        many => {
            let mut forms = Vec::with_capacity(many.len() + 1);
            forms.push(sym("do"));
            forms.extend(many.iter().cloned());
            Value::list(forms)
        }
    };

    debug!(params = ?params, rest = ?rest, "fn");
    Ok(Value::Closure(Rc::new(Closure {
        params,
        rest,
        body,
        env: env.clone(),
    })))
}

/// Evaluate if special form. Only `false` and `null` are falsy.
pub(crate) fn eval_if(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    let [test, consequent, alternative] = args else {
        return Err(Error::malformed("if", "expected a test and two branches"));
    };
    if eval_with_depth_tracking(test, env, depth)?.is_truthy() {
        eval_with_depth_tracking(consequent, env, depth)
    } else {
        eval_with_depth_tracking(alternative, env, depth)
    }
}

/// Evaluate cond special form: `[cond [test expr...] ... [else expr...]]`
pub(crate) fn eval_cond(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    for clause in args {
        let Some([test, body @ ..]) = clause.as_list() else {
            return Err(Error::malformed(
                "cond",
                format!("each clause must be a non-empty list, got {clause}"),
            ));
        };

        let test_value = match test.as_symbol() {
            Some("else") => Value::Bool(true),
            _ => eval_with_depth_tracking(test, env, depth)?,
        };
        if test_value.is_truthy() {
            if body.is_empty() {
                return Ok(test_value);
            }
            return eval_sequence(body, env, depth);
        }
    }
    Ok(Value::Nil)
}

/// Evaluate do special form
pub(crate) fn eval_do(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    eval_sequence(args, env, depth)
}

/// Evaluate let special form. Bindings are defined one at a time in a single
/// new scope, so later ones see earlier ones. The body shares that scope.
pub(crate) fn eval_let(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    let [binding_form, body @ ..] = args else {
        return Err(Error::malformed("let", "expected a binding list"));
    };
    let Some(bindings) = binding_form.as_list() else {
        return Err(Error::malformed(
            "let",
            format!("bindings must be a list, got {binding_form}"),
        ));
    };

    let scope = Environment::with_parent(env);
    for binding in bindings {
        let Some([target, expr]) = binding.as_list() else {
            return Err(Error::malformed(
                "let",
                format!("each binding must be [name value], got {binding}"),
            ));
        };
        let name = expect_symbol("let", target, "binding name")?;
        let value = eval_with_depth_tracking(expr, &scope, depth)?;
        scope.define(name, value);
    }
    eval_sequence(body, &scope, depth)
}

/// Evaluate while special form. The body runs in the enclosing scope.
pub(crate) fn eval_while(args: &[Value], env: &Environment, depth: EvalDepth) -> Result<Value, Error> {
    let [test, body @ ..] = args else {
        return Err(Error::malformed("while", "expected a test"));
    };
    let mut result = Value::Nil;
    while eval_with_depth_tracking(test, env, depth)?.is_truthy() {
        result = eval_sequence(body, env, depth)?;
    }
    Ok(result)
}

/// Evaluate macro special form: `[macro name params body]`
pub(crate) fn eval_macro(args: &[Value], env: &Environment, _depth: EvalDepth) -> Result<Value, Error> {
    let [target, params, body] = args else {
        return Err(Error::malformed("macro", "expected a name, parameters and a body"));
    };
    let name = expect_symbol("macro", target, "name")?;
    let mac = Macro {
        name: name.to_owned(),
        params: compile_pattern(params)?,
        body: body.clone(),
    };
    debug!(name, params = %params, "macro");
    Ok(env.define(name, Value::Macro(Rc::new(mac))))
}

/// Create a root environment with every builtin bound, printing to stdout
pub fn create_global_env() -> Environment {
    create_global_env_with_output(PrintSink::Stdout)
}

/// Create a root environment with every builtin bound; `print` writes to `sink`
pub fn create_global_env_with_output(sink: PrintSink) -> Environment {
    let env = Environment::new();
    for builtin_op in get_builtin_ops() {
        if let Some(value) = builtin_op.to_value() {
            env.define(builtin_op.id, value);
        }
    }
    env.define("print", make_print(sink));
    env
}
