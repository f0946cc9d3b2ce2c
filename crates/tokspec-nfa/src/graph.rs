use std::fmt::Write;

use cranelift_entity::{EntityRef, EntitySet};

use crate::nfa::{NfaArena, NfaHandle, StateHandle, StateKind, EPSILON};

/// Writes a DOT dump of one automaton. Start and accepting states get filled
/// box declarations, internal states are left implicit, and ε-edges carry
/// the literal label `eps`.
pub fn write_graphviz(
    buf: &mut dyn Write,
    arena: &NfaArena,
    nfa: Option<NfaHandle>,
) -> std::fmt::Result {
    writeln!(buf, "digraph NFA {{")?;
    if let Some(nfa) = nfa {
        let mut visited = EntitySet::new();
        write_state(buf, arena, arena.nfa(nfa).start, &mut visited)?;
    }
    writeln!(buf, "}}")
}

fn write_state(
    buf: &mut dyn Write,
    arena: &NfaArena,
    state: StateHandle,
    visited: &mut EntitySet<StateHandle>,
) -> std::fmt::Result {
    if visited.contains(state) {
        return Ok(());
    }
    visited.insert(state);

    match arena.state(state).kind {
        StateKind::Start => writeln!(
            buf,
            "\tS{} [shape=box,style=filled,color=green];",
            state.index()
        )?,
        StateKind::Internal => {}
        StateKind::Accepting => writeln!(
            buf,
            "\tS{} [shape=box,style=filled,color=red];",
            state.index()
        )?,
    }

    for &edge in &arena.state(state).edges {
        let edge = arena.edge(edge);
        if edge.symbol == EPSILON {
            writeln!(
                buf,
                "\tS{} -> S{} [label=\"eps\"];",
                state.index(),
                edge.target.index()
            )?;
        } else {
            writeln!(
                buf,
                "\tS{} -> S{} [label=\"{}\"];",
                state.index(),
                edge.target.index(),
                edge.symbol as char
            )?;
        }
    }

    for &edge in &arena.state(state).edges {
        write_state(buf, arena, arena.edge(edge).target, visited)?;
    }

    Ok(())
}
