// Quasiquote template substitution. Pure tree-to-tree: nothing here evaluates.

use crate::ast::Value;
use crate::stack::ensure_sufficient_stack;

use super::pattern::Bindings;

pub(crate) const UNQUOTE: &str = "unquote";
pub(crate) const UNQUOTE_SPLICE: &str = "unquote-splice";

/// Substitute `bindings` into a macro body.
///
/// A body of the form `(quote X)` or `(q X)` delimits the template: the result is
/// `X` with substitutions applied. Any other body is substituted as is.
pub(crate) fn expand_template(body: &Value, bindings: &Bindings) -> Value {
    let template = match body.as_list() {
        Some([Value::Symbol(head), inner]) if head == "quote" || head == "q" => inner,
        _ => body,
    };

    // A root splice has no enclosing list to splice into.
    if let Some(value) = marker_argument(template, UNQUOTE_SPLICE).and_then(|arg| resolve(arg, bindings)) {
        return value;
    }
    substitute(template, bindings)
}

/// If `form` is `(marker arg)`, return `arg`
fn marker_argument<'a>(form: &'a Value, marker: &str) -> Option<&'a Value> {
    match form.as_list() {
        Some([Value::Symbol(head), arg]) if head == marker => Some(arg),
        _ => None,
    }
}

/// Bound value for an unquoted symbol. Anything else stays unresolved.
fn resolve(arg: &Value, bindings: &Bindings) -> Option<Value> {
    arg.as_symbol().and_then(|name| bindings.get(name)).cloned()
}

fn substitute(template: &Value, bindings: &Bindings) -> Value {
    let Value::List(items) = template else {
        return template.clone();
    };

    if let Some(arg) = marker_argument(template, UNQUOTE) {
        return resolve(arg, bindings).unwrap_or_else(|| template.clone());
    }

    let mut expanded = Vec::with_capacity(items.len());
    for item in items.iter() {
        match marker_argument(item, UNQUOTE_SPLICE).map(|arg| resolve(arg, bindings)) {
            Some(Some(Value::List(spliced))) => expanded.extend(spliced.iter().cloned()),
            Some(Some(single)) => expanded.push(single),
            Some(None) => expanded.push(item.clone()),
            None => expanded.push(ensure_sufficient_stack(|| substitute(item, bindings))),
        }
    }
    Value::list(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};

    fn unquote(name: &str) -> Value {
        Value::form(UNQUOTE, sym(name))
    }

    fn splice(name: &str) -> Value {
        Value::form(UNQUOTE_SPLICE, sym(name))
    }

    fn bindings() -> Bindings {
        Bindings::from([
            ("cond".to_owned(), val(vec![sym(">"), val(3), val(1)])),
            ("body".to_owned(), val([1, 2, 3])),
            ("x".to_owned(), sym("n")),
            ("one".to_owned(), val(42)),
            ("empty".to_owned(), nil()),
        ])
    }

    #[test]
    fn test_expand_template_cases() {
        let b = bindings();
        let cases = vec![
            // root quote is the template delimiter
            (
                Value::form(
                    "q",
                    val(vec![
                        sym("if"),
                        unquote("cond"),
                        val(vec![sym("do"), splice("body")]),
                        Value::Nil,
                    ]),
                ),
                val(vec![
                    sym("if"),
                    val(vec![sym(">"), val(3), val(1)]),
                    val(vec![sym("do"), val(1), val(2), val(3)]),
                    Value::Nil,
                ]),
            ),
            // the long-form quote works the same way
            (Value::form("quote", unquote("x")), sym("n")),
            // splicing a non-list inserts one element
            (
                val(vec![sym("list"), splice("one"), val(0)]),
                val(vec![sym("list"), val(42), val(0)]),
            ),
            // splicing an empty list inserts nothing
            (val(vec![sym("f"), splice("empty")]), val(vec![sym("f")])),
            // unbound names stay as literal forms
            (
                val(vec![sym("f"), unquote("later"), splice("later")]),
                val(vec![sym("f"), unquote("later"), splice("later")]),
            ),
            // nested quotes keep their wrapper and are substituted through
            (
                val(vec![sym("g"), Value::form("quote", val(vec![unquote("x"), splice("body")]))]),
                val(vec![
                    sym("g"),
                    Value::form("quote", val(vec![sym("n"), val(1), val(2), val(3)])),
                ]),
            ),
            // a root splice behaves like unquote
            (Value::form("q", splice("body")), val([1, 2, 3])),
            // atoms and unmarked symbols are copied
            (val(7), val(7)),
            (sym("free"), sym("free")),
        ];

        for (template, expected) in cases {
            assert_eq!(expand_template(&template, &b), expected, "template {template}");
        }
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let b = Bindings::from([
            ("code".to_owned(), val(vec![sym("unquote"), sym("x")])),
            ("x".to_owned(), val(1)),
        ]);
        let template = val(vec![sym("h"), unquote("code")]);
        assert_eq!(
            expand_template(&template, &b),
            val(vec![sym("h"), val(vec![sym("unquote"), sym("x")])])
        );
    }
}
