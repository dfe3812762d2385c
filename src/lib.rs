//! Nexis - a small bracketed Lisp with runtime structural macros
//!
//! This crate provides a tree-walking interpreter for a Lisp-family language written
//! with square brackets, together with a non-hygienic macro system whose parameters
//! are structural patterns and whose bodies are quasiquote templates.
//!
//! ```text
//! [def square [fn [x] [* x x]]]
//! [square 5]                                        ; 25
//! [macro when [cond & body] [q [if ~cond [do ~@body] null]]]
//! [when [> 3 1] 1 2 3]                              ; 3
//! [let [[x 1]] [let [[x 2]] x]]                     ; 2
//! ```
//!
//! ## Evaluation model
//!
//! - Code and data share one representation, [`ast::Value`]. The reader produces
//!   numbers, strings, booleans, `null`, symbols and lists; evaluation adds closures,
//!   builtin functions and macros.
//! - Scopes are shared, mutable [`environment::Environment`] handles. Closures keep
//!   their defining scope alive.
//! - Special forms (`quote`/`q`, `def`, `set`, `fn`, `if`, `cond`, `do`, `let`,
//!   `while`, `macro`) are recognized by exact symbol match before call handling.
//! - Macro calls receive their arguments unevaluated, bind them against the macro's
//!   parameter pattern, substitute into the template, and the expansion is evaluated
//!   once in the caller's scope.
//!
//! ## Modules
//!
//! - `reader`: surface syntax to [`ast::Value`] (feature `reader`)
//! - `evaluator`: the evaluation engine and global environment construction
//! - `environment`: scope chain, binding introspection, host builtin registration
//! - `builtinops`: builtin functions and special forms registry
//! - `macros`: parameter pattern compilation, binding and template expansion
//! - `output`: destinations for the `print` builtin

use std::fmt;

use crate::builtinops::Arity;

/// Maximum list/quote nesting accepted by the reader by default
pub const MAX_PARSE_DEPTH: usize = 256;

/// Default maximum evaluation nesting before evaluation fails with
/// [`Error::StackOverflow`]. The native stack grows on demand, so this limit is
/// what bounds deep non-tail recursion.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (unterminated string, unclosed bracket)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after complete expressions (a stray closing bracket)
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with a context snippet extracted from `input` around
    /// `error_offset` (a byte offset), and the offending token if known.
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let char_offset = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();
        let context_start = char_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
///
/// Any error aborts the current top-level evaluation. Bindings created or mutated
/// before the failure point stay in effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),

    #[error("Unbound symbol: {0}")]
    UnboundSymbol(String),

    #[error("ArityError: {}expected {expected} arguments, got {got}", .name.as_ref().map(|n| format!("{n}: ")).unwrap_or_default())]
    ArityError {
        name: Option<String>,
        expected: Arity,
        got: usize,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Pattern mismatch: {0}")]
    PatternMismatch(String),

    #[error("Not callable: {0}")]
    NotCallable(String),

    #[error("Malformed special form '{form}': {reason}")]
    MalformedSpecialForm { form: String, reason: String },

    #[error("Stack overflow: evaluation nested deeper than {limit} frames")]
    StackOverflow { limit: usize },
}

impl Error {
    /// Create an ArityError without a function name
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            name: None,
            expected,
            got,
        }
    }

    /// Attach the callee name to an ArityError that does not carry one yet
    pub(crate) fn with_callee(self, callee: &str) -> Self {
        match self {
            Error::ArityError {
                name: None,
                expected,
                got,
            } => Error::ArityError {
                name: Some(callee.to_owned()),
                expected,
                got,
            },
            other => other,
        }
    }

    pub(crate) fn malformed(form: &str, reason: impl Into<String>) -> Self {
        Error::MalformedSpecialForm {
            form: form.to_owned(),
            reason: reason.into(),
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod macros;
pub mod output;

mod stack;

#[cfg(feature = "reader")]
pub mod reader;

pub use ast::Value;
pub use environment::{Binding, BindingKind, Environment};
pub use evaluator::{EvalConfig, create_global_env, create_global_env_with_output, eval};
pub use output::PrintSink;

#[cfg(feature = "reader")]
pub use evaluator::eval_source;
