//! Thompson's construction over the expression forest produced by
//! `tokspec`: every non-terminal becomes an automaton with a single start
//! and a single accepting state, and the per-name automata are unioned into
//! one master NFA. See "Engineering a Compiler", section 2.4.2.
//!
//! All states, edges, and automata live in one arena and are addressed by
//! index; the combinators mutate automata through the arena so that every
//! holder of a handle observes the rewritten endpoints.

pub mod compile;
pub mod graph;
pub mod nfa;

#[cfg(test)]
mod testutil;

pub use compile::CompiledNfa;
pub use nfa::{NfaArena, NfaHandle};
