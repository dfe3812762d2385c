#![cfg(feature = "reader")]
#![expect(clippy::unwrap_used)] // test code OK

use nexis::ast::{Value, nil, sym, val};
use nexis::builtinops::Arity;
use nexis::reader::{ParseConfig, parse, parse_all, parse_with_config};
use nexis::{
    BindingKind, Environment, Error, ParseErrorKind, PrintSink, create_global_env_with_output,
    eval, eval_source,
};
use pretty_assertions::assert_eq;

fn quiet_env() -> Environment {
    create_global_env_with_output(PrintSink::Silent)
}

fn run(source: &str) -> Result<Value, Error> {
    eval_source(source, &quiet_env())
}

#[test]
fn arithmetic_folds_and_requires_an_argument() {
    assert_eq!(run("[+ 1 2 3 4]").unwrap(), val(10));
    assert_eq!(run("[- 10 1 2]").unwrap(), val(7));
    assert_eq!(run("[- 5]").unwrap(), val(5));
    assert_eq!(run("[/ 7 2]").unwrap(), val(3.5));
    assert_eq!(
        run("[+]").unwrap_err(),
        Error::ArityError {
            name: Some("+".into()),
            expected: Arity::AtLeast(1),
            got: 0,
        }
    );
}

#[test]
fn top_level_forms_share_the_root_scope() {
    let env = quiet_env();
    assert_eq!(
        eval_source("[def square [fn [x] [* x x]]] [square 5]", &env).unwrap(),
        val(25)
    );
    // and later inputs still see earlier definitions
    assert_eq!(eval_source("[square 6]", &env).unwrap(), val(36));
}

#[test]
fn equality_compares_lists_by_identity() {
    assert_eq!(run("[= [list 1 2] [list 1 2]]").unwrap(), val(false));
    assert_eq!(run("[= 1 1 1]").unwrap(), val(true));
    assert_eq!(run("[= 1 2]").unwrap(), val(false));
    assert_eq!(run("[= 1 1 2]").unwrap(), val(false));
    assert_eq!(run("[def xs [list 1 2]] [= xs xs]").unwrap(), val(true));
    assert_eq!(run("[!= [list 1] [list 1]]").unwrap(), val(true));
    assert_eq!(run("[= \"a\" \"a\"]").unwrap(), val(true));
    assert_eq!(run("[= 1 \"1\"]").unwrap(), val(false));
}

#[test]
fn when_macro_expands_at_the_call_site() {
    let env = quiet_env();
    eval_source(
        "[macro when [cond & body] [q [if ~cond [do ~@body] null]]]",
        &env,
    )
    .unwrap();

    assert_eq!(eval_source("[when [> 3 1] 1 2 3]", &env).unwrap(), val(3));
    assert_eq!(eval_source("[when [> 1 3] 1 2 3]", &env).unwrap(), Value::Nil);
}

#[test]
fn nested_pattern_macro_binds_and_rejects_keyword_mismatch() {
    let (sink, output) = PrintSink::buffer();
    let env = create_global_env_with_output(sink);

    // The body quotes its bindings back so the test can inspect them.
    eval_source(
        "[macro inspect [[x in seq] & body] [q [list '~x '~seq '~body]]]",
        &env,
    )
    .unwrap();
    let bound = eval_source("[inspect [n in [list 1 2 3]] [print n]]", &env).unwrap();
    assert_eq!(
        bound,
        val(vec![
            sym("n"),
            val(vec![sym("list"), val(1), val(2), val(3)]),
            val(vec![val(vec![sym("print"), sym("n")])]),
        ])
    );

    for keyword in ["on", "of", "1", "\"in\""] {
        let source = format!("[inspect [n {keyword} [list 1 2 3]] [print n]]");
        let err = eval_source(&source, &env).unwrap_err();
        assert!(matches!(err, Error::PatternMismatch(_)), "{source}: {err:?}");
    }

    // a loop macro built on the same pattern shape
    eval_source(
        "[macro for [[x in seq] & body]
           [q [let [[__xs ~seq]]
                [while [not [null? __xs]]
                  [let [[~x [first __xs]]] ~@body]
                  [set __xs [rest __xs]]]]]]",
        &env,
    )
    .unwrap();
    eval_source("[for [n in [list 1 2 3]] [print n]]", &env).unwrap();
    assert_eq!(output.lock().as_str(), "1\n2\n3\n");
}

#[test]
fn let_shadowing_restores_the_outer_binding() {
    assert_eq!(run("[let [[x 1]] [let [[x 2]] x]]").unwrap(), val(2));
    assert_eq!(run("[let [[x 1]] [let [[x 2]] x] x]").unwrap(), val(1));

    let env = quiet_env();
    eval_source("[def x 1]", &env).unwrap();
    eval_source("[let [[x 2]] [set x 3] x]", &env).unwrap();
    assert_eq!(env.get("x").unwrap(), val(1));
}

#[test]
fn unbound_reference_names_the_symbol() {
    let err = run("[foo]").unwrap_err();
    assert_eq!(err, Error::UnboundSymbol("foo".into()));
    assert!(err.to_string().contains("foo"));
}

fn category(error: &Error) -> &'static str {
    match error {
        Error::ParseError(_) => "parse",
        Error::UnboundSymbol(_) => "unbound",
        Error::ArityError { .. } => "arity",
        Error::TypeMismatch(_) => "type",
        Error::PatternMismatch(_) => "pattern",
        Error::NotCallable(_) => "not-callable",
        Error::MalformedSpecialForm { .. } => "malformed",
        Error::StackOverflow { .. } => "overflow",
    }
}

#[test]
fn error_taxonomy() {
    let cases = vec![
        ("[1 2]", "not-callable"),
        ("[first 5]", "type"),
        ("[sqrt \"x\"]", "type"),
        ("[if true]", "malformed"),
        ("[set nowhere 1]", "unbound"),
        ("[mod 1 2 3]", "arity"),
        ("[let [[x 1]]", "parse"),
        ("[macro m [a b] a] [m 1]", "pattern"),
    ];
    for (source, expected) in cases {
        let err = run(source).unwrap_err();
        assert_eq!(category(&err), expected, "{source}: {err:?}");
    }
}

#[test]
fn closures_capture_and_share_their_scope() {
    let env = quiet_env();
    eval_source(
        "[def make-counter [fn []
           [let [[count 0]]
             [fn [] [set count [+ count 1]]]]]]
         [def c1 [make-counter]]
         [def c2 [make-counter]]",
        &env,
    )
    .unwrap();
    assert_eq!(eval_source("[c1] [c1] [c1]", &env).unwrap(), val(3));
    assert_eq!(eval_source("[c2]", &env).unwrap(), val(1));
}

#[test]
fn builtin_library_spot_checks() {
    let cases = vec![
        ("[list 1 \"a\" true null]", val(vec![val(1), val("a"), val(true), Value::Nil])),
        ("[cons 0 [list 1 2]]", val([0, 1, 2])),
        ("[first [list 7 8]]", val(7)),
        ("[rest [list 7 8]]", val([8])),
        ("[rest [list]]", nil()),
        ("[len [list 1 2 3]]", val(3)),
        ("[len \"héllo\"]", val(5)),
        ("[append [list 1] [list 2 3] 4]", val([1, 2, 3, 4])),
        ("[reverse [list 1 2 3]]", val([3, 2, 1])),
        ("[null? null]", val(true)),
        ("[null? [list]]", val(true)),
        ("[symbol? 'a]", val(true)),
        ("[symbol? \"a\"]", val(false)),
        ("[and 1 \"x\" true]", val(true)),
        ("[or false null]", val(false)),
        ("[not null]", val(true)),
        ("[pow 2 10]", val(1024)),
        ("[abs -3]", val(3)),
        ("[mod 7 3]", val(1)),
        ("[cat \"a\" 1 [list 2 \"b\"]]", val("a1[2 b]")),
    ];
    for (source, expected) in cases {
        assert_eq!(run(source).unwrap(), expected, "{source}");
    }
}

#[test]
fn print_returns_and_emits_the_formatted_line() {
    let (sink, _) = PrintSink::buffer();
    let env = create_global_env_with_output(sink.clone());
    let line = eval_source("[print \"sum:\" [+ 1 2] [list \"a\" [list 1]]]", &env).unwrap();
    assert_eq!(line, val("sum: 3 [a [1]]"));
    eval_source("[print]", &env).unwrap();
    // clones of a buffer sink share one buffer
    assert_eq!(sink.get_output(), "sum: 3 [a [1]]\n\n");
}

#[test]
fn reader_packages_multiple_forms_as_do() {
    assert_eq!(parse("").unwrap(), Value::Nil);
    assert_eq!(parse("42").unwrap(), val(42));
    assert_eq!(
        parse("1 'x").unwrap(),
        val(vec![sym("do"), val(1), val(vec![sym("quote"), sym("x")])])
    );
    assert_eq!(parse_all("1 2 ; three").unwrap(), vec![val(1), val(2)]);
}

#[test]
fn reader_error_kinds() {
    let kind_of = |input: &str| match parse(input).unwrap_err() {
        Error::ParseError(e) => e.kind,
        other => panic!("{input}: expected a parse error, got {other:?}"),
    };
    assert_eq!(kind_of("[1 2"), ParseErrorKind::Incomplete);
    assert_eq!(kind_of("\"open"), ParseErrorKind::Incomplete);
    assert_eq!(kind_of("[1] ]"), ParseErrorKind::TrailingContent);
    assert_eq!(kind_of("(+ 1 2)"), ParseErrorKind::InvalidSyntax);

    let shallow = ParseConfig { max_depth: 3 };
    assert!(parse_with_config("[[1]]", &shallow).is_ok());
    match parse_with_config("[[[[1]]]]", &shallow).unwrap_err() {
        Error::ParseError(e) => assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn deep_recursion_reports_stack_overflow() {
    let env = quiet_env();
    eval_source("[def loop-forever [fn [n] [+ 1 [loop-forever n]]]]", &env).unwrap();
    let err = eval_source("[loop-forever 0]", &env).unwrap_err();
    assert!(matches!(err, Error::StackOverflow { .. }), "{err:?}");

    // the environment is still usable afterwards
    assert_eq!(eval_source("[+ 1 1]", &env).unwrap(), val(2));
}

#[test]
fn introspection_reports_binding_kinds() {
    let env = quiet_env();
    eval_source("[def answer 42] [macro ident [x] [q ~x]]", &env).unwrap();
    let bindings = env.get_all_bindings();

    let kind = |name: &str| {
        bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.kind)
            .unwrap()
    };
    assert_eq!(kind("+"), BindingKind::NativeFunction);
    assert_eq!(kind("print"), BindingKind::NativeFunction);
    assert_eq!(kind("ident"), BindingKind::Macro);
    assert_eq!(kind("answer"), BindingKind::Other);
}

#[test]
fn host_can_evaluate_constructed_trees() {
    let env = quiet_env();
    let expr = val(vec![sym("*"), val(6), val(7)]);
    assert_eq!(eval(&expr, &env).unwrap(), val(42));

    // quoted data evaluates to the same tree the host would build
    let data = eval(&parse("'[a [1 \"b\"]]").unwrap(), &env).unwrap();
    assert_eq!(data, val(vec![sym("a"), val(vec![val(1), val("b")])]));
}

#[test]
fn closures_hold_the_scope_they_were_created_in() {
    let env = quiet_env();
    eval_source(
        "[def top [fn [] 1]]
         [def inner [let [[n 1]] [fn [] n]]]",
        &env,
    )
    .unwrap();

    let captured = |name: &str| match env.get(name).unwrap() {
        Value::Closure(closure) => closure.env.clone(),
        other => panic!("{name}: expected a closure, got {other:?}"),
    };
    assert!(captured("top").ptr_eq(&env));
    assert!(!captured("inner").ptr_eq(&env));
    // a clone of the handle is the same scope, not a copy
    assert!(env.clone().ptr_eq(&env));
}
