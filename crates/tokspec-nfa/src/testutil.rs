//! Helpers for checking the languages and shapes of built automata.

use std::collections::HashSet;

use crate::nfa::{NfaArena, NfaHandle, StateHandle, StateKind, EPSILON};

pub(crate) fn reachable_states(arena: &NfaArena, nfa: NfaHandle) -> Vec<StateHandle> {
    let start = arena.nfa(nfa).start;
    let mut seen = HashSet::from([start]);
    let mut stack = vec![start];
    let mut out = Vec::new();

    while let Some(state) = stack.pop() {
        out.push(state);
        for &edge in &arena.state(state).edges {
            let target = arena.edge(edge).target;
            if seen.insert(target) {
                stack.push(target);
            }
        }
    }
    out
}

/// Counts the `Start` and `Accepting` states reachable from the automaton's
/// start; a well-formed automaton has exactly one of each.
pub(crate) fn reachable_endpoint_kinds(arena: &NfaArena, nfa: NfaHandle) -> (usize, usize) {
    let mut starts = 0;
    let mut accepting = 0;
    for state in reachable_states(arena, nfa) {
        match arena.state(state).kind {
            StateKind::Start => starts += 1,
            StateKind::Accepting => accepting += 1,
            StateKind::Internal => {}
        }
    }
    (starts, accepting)
}

fn eps_close(arena: &NfaArena, set: &mut HashSet<StateHandle>) {
    let mut stack: Vec<StateHandle> = set.iter().copied().collect();
    while let Some(state) = stack.pop() {
        for &edge in &arena.state(state).edges {
            let edge = arena.edge(edge);
            if edge.symbol == EPSILON && set.insert(edge.target) {
                stack.push(edge.target);
            }
        }
    }
}

/// A straightforward ε-closure simulation of the automaton on `input`.
pub(crate) fn accepts(arena: &NfaArena, nfa: NfaHandle, input: &[u8]) -> bool {
    let nfa = arena.nfa(nfa);
    let mut current = HashSet::from([nfa.start]);
    eps_close(arena, &mut current);

    for &byte in input {
        let mut next = HashSet::new();
        for &state in &current {
            for &edge in &arena.state(state).edges {
                let edge = arena.edge(edge);
                if edge.symbol == byte {
                    next.insert(edge.target);
                }
            }
        }
        eps_close(arena, &mut next);
        current = next;
    }

    current.contains(&nfa.accepting)
}
