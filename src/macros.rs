//! Runtime macros: structural parameter patterns and quasiquote templates.
//!
//! A macro call binds its **unevaluated** argument forms against the macro's
//! [`Pattern`], then substitutes the bindings into the macro body:
//!
//! ```text
//! [macro when [cond & body] [q [if ~cond [do ~@body] null]]]
//! [when [> 3 1] 1 2 3]
//! ; binds   cond = [> 3 1], body = [1 2 3]
//! ; expands [if [> 3 1] [do 1 2 3] null]
//! ```
//!
//! Expansion is unhygienic and never evaluates anything. The evaluator runs the
//! expansion exactly once, in the caller's scope.

mod pattern;
mod template;

pub use pattern::{Bindings, Pattern};
pub(crate) use pattern::compile_pattern;

use tracing::trace;

use crate::Error;
use crate::ast::{Macro, Value};

/// Symbols a pattern never binds. In a pattern they are keywords.
///
/// Special-form names are ordinary parameter names here: `[macro when [cond & body] ...]`
/// binds `cond`.
const RESERVED_WORDS: &[&str] = &["else", "in", template::UNQUOTE, template::UNQUOTE_SPLICE];

pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Expand one call of `mac` with the given argument forms
#[tracing::instrument(level = "trace", skip_all, fields(name = %mac.name))]
pub fn expand(mac: &Macro, args: &[Value]) -> Result<Value, Error> {
    let bindings = pattern::bind(&mac.params, args)
        .map_err(|err| match err {
            Error::PatternMismatch(msg) => {
                Error::PatternMismatch(format!("in call to macro {}: {msg}", mac.name))
            }
            other => other,
        })?;
    let expansion = template::expand_template(&mac.body, &bindings);
    trace!(expansion = %expansion, "expanded macro");
    Ok(expansion)
}
