//! Native stack growth for deep recursion in the evaluator, the reader and the
//! macro expander.
//!
//! Recursive calls wrapped in [`ensure_sufficient_stack`] grow the stack on demand,
//! so deep nesting is bounded by the configured evaluation depth and not by the
//! size of the host thread's stack.

/// If less than this remains, the stack is grown before recursing (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
