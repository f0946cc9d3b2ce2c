use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};

use tokspec::Limits;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StateHandle(u32);
entity_impl! { StateHandle }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EdgeHandle(u32);
entity_impl! { EdgeHandle }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NfaHandle(u32);
entity_impl! { NfaHandle }

/// The zero byte on an edge stands for the empty-string transition, which is
/// also why a terminal can never contain it.
pub const EPSILON: u8 = 0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StateKind {
    Start,
    Internal,
    Accepting,
}

#[derive(Clone, Debug)]
pub struct State {
    pub edges: Vec<EdgeHandle>,
    pub kind: StateKind,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Edge {
    pub target: StateHandle,
    pub symbol: u8,
}

/// One automaton inside the shared state arena. Combinators rewrite these
/// fields in place, which is what keeps every alias of the handle current.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Nfa {
    pub start: StateHandle,
    pub accepting: StateHandle,
}

#[derive(Clone, Copy, Debug)]
pub struct CapacityError(pub &'static str);

/// Append-only pools for states, edges, and automata. Nothing is ever freed;
/// combinators abandon the states of absorbed operands where they lie.
#[derive(Debug)]
pub struct NfaArena {
    states: PrimaryMap<StateHandle, State>,
    edges: PrimaryMap<EdgeHandle, Edge>,
    nfas: PrimaryMap<NfaHandle, Nfa>,
    limits: Limits,
}

impl NfaArena {
    pub fn new(limits: &Limits) -> NfaArena {
        Self {
            states: PrimaryMap::new(),
            edges: PrimaryMap::new(),
            nfas: PrimaryMap::new(),
            limits: limits.clone(),
        }
    }

    pub fn nfa(&self, handle: NfaHandle) -> Nfa {
        self.nfas[handle]
    }

    pub fn state(&self, handle: StateHandle) -> &State {
        &self.states[handle]
    }

    pub fn edge(&self, handle: EdgeHandle) -> Edge {
        self.edges[handle]
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.values().copied()
    }

    pub fn new_state(&mut self, kind: StateKind) -> Result<StateHandle, CapacityError> {
        if self.states.len() >= self.limits.max_states {
            return Err(CapacityError("the NFA state pool is out of memory"));
        }
        Ok(self.states.push(State {
            edges: Vec::new(),
            kind,
        }))
    }

    pub fn new_edge(&mut self, target: StateHandle, symbol: u8) -> Result<EdgeHandle, CapacityError> {
        if self.edges.len() >= self.limits.max_edges {
            return Err(CapacityError("the NFA edge pool is out of memory"));
        }
        Ok(self.edges.push(Edge { target, symbol }))
    }

    /// Allocates a fresh start/accepting pair and an automaton over them.
    pub fn new_nfa(&mut self) -> Result<NfaHandle, CapacityError> {
        let start = self.new_state(StateKind::Start)?;
        let accepting = self.new_state(StateKind::Accepting)?;
        self.push_nfa(start, accepting)
    }

    pub fn push_nfa(
        &mut self,
        start: StateHandle,
        accepting: StateHandle,
    ) -> Result<NfaHandle, CapacityError> {
        if self.nfas.len() >= self.limits.max_nfas {
            return Err(CapacityError("the NFA pool is out of memory"));
        }
        Ok(self.nfas.push(Nfa { start, accepting }))
    }

    pub fn set_kind(&mut self, state: StateHandle, kind: StateKind) {
        self.states[state].kind = kind;
    }

    /// Adds an edge `from -symbol-> target`.
    pub fn connect(
        &mut self,
        from: StateHandle,
        target: StateHandle,
        symbol: u8,
    ) -> Result<(), CapacityError> {
        if self.states[from].edges.len() >= self.limits.max_edges_per_state {
            return Err(CapacityError("too many edges out of one NFA state"));
        }
        let edge = self.new_edge(target, symbol)?;
        self.states[from].edges.push(edge);
        Ok(())
    }

    /// A two-state automaton accepting exactly the one-byte string `symbol`.
    pub fn single_symbol(&mut self, symbol: u8) -> Result<NfaHandle, CapacityError> {
        let nfa = self.new_nfa()?;
        let Nfa { start, accepting } = self.nfas[nfa];
        self.connect(start, accepting, symbol)?;
        Ok(nfa)
    }

    /// A chain automaton accepting exactly `bytes`, one state per byte.
    pub fn terminal_chain(&mut self, bytes: &[u8]) -> Result<NfaHandle, CapacityError> {
        assert!(!bytes.is_empty(), "cannot build an NFA for an empty terminal");

        let start = self.new_state(StateKind::Start)?;
        let mut prev = start;
        for &byte in bytes {
            let state = self.new_state(StateKind::Internal)?;
            self.connect(prev, state, byte)?;
            prev = state;
        }
        self.set_kind(prev, StateKind::Accepting);
        self.push_nfa(start, prev)
    }

    /// Concatenates `b` onto `a`. `a` becomes the combined automaton; `b` is
    /// abandoned in place.
    pub fn concat(&mut self, a: NfaHandle, b: NfaHandle) -> Result<(), CapacityError> {
        assert_ne!(a, b, "cannot concatenate an NFA to itself");

        let Nfa {
            start: b_start,
            accepting: b_accepting,
        } = self.nfas[b];
        let a_accepting = self.nfas[a].accepting;

        self.set_kind(a_accepting, StateKind::Internal);
        self.connect(a_accepting, b_start, EPSILON)?;
        self.set_kind(b_start, StateKind::Internal);

        self.nfas[a].accepting = b_accepting;
        Ok(())
    }

    /// Alternates `a` and `b` into `a` behind a fresh start/accepting pair;
    /// `b` is abandoned in place.
    pub fn or(&mut self, a: NfaHandle, b: NfaHandle) -> Result<(), CapacityError> {
        assert_ne!(a, b, "cannot alternate an NFA with itself");

        let new_start = self.new_state(StateKind::Start)?;
        let new_accepting = self.new_state(StateKind::Accepting)?;

        let Nfa {
            start: a_start,
            accepting: a_accepting,
        } = self.nfas[a];
        let Nfa {
            start: b_start,
            accepting: b_accepting,
        } = self.nfas[b];

        self.set_kind(a_start, StateKind::Internal);
        self.set_kind(a_accepting, StateKind::Internal);
        self.set_kind(b_start, StateKind::Internal);
        self.set_kind(b_accepting, StateKind::Internal);

        self.connect(new_start, a_start, EPSILON)?;
        self.connect(new_start, b_start, EPSILON)?;
        self.connect(a_accepting, new_accepting, EPSILON)?;
        self.connect(b_accepting, new_accepting, EPSILON)?;

        self.nfas[a] = Nfa {
            start: new_start,
            accepting: new_accepting,
        };
        Ok(())
    }

    /// Wraps `a` into its Kleene closure behind a fresh start/accepting pair.
    pub fn closure(&mut self, a: NfaHandle) -> Result<(), CapacityError> {
        let new_start = self.new_state(StateKind::Start)?;
        let new_accepting = self.new_state(StateKind::Accepting)?;

        let Nfa {
            start: a_start,
            accepting: a_accepting,
        } = self.nfas[a];

        self.set_kind(a_start, StateKind::Internal);
        self.set_kind(a_accepting, StateKind::Internal);

        self.connect(new_start, a_start, EPSILON)?;
        self.connect(new_start, new_accepting, EPSILON)?;
        self.connect(a_accepting, a_start, EPSILON)?;
        self.connect(a_accepting, new_accepting, EPSILON)?;

        self.nfas[a] = Nfa {
            start: new_start,
            accepting: new_accepting,
        };
        Ok(())
    }

    /// Copies the reachable subgraph of an automaton into fresh states.
    ///
    /// The combinators consume their operands, so an automaton that is used
    /// more than once has to be handed out as a copy.
    pub fn clone_nfa(&mut self, src: NfaHandle) -> Result<NfaHandle, CapacityError> {
        let Nfa { start, accepting } = self.nfas[src];

        let mut map: SecondaryMap<StateHandle, Option<StateHandle>> = SecondaryMap::new();
        let copied_start = self.new_state(self.states[start].kind)?;
        map[start] = Some(copied_start);

        let mut stack = vec![start];
        while let Some(state) = stack.pop() {
            let copied = map[state].unwrap();
            let edges = self.states[state].edges.clone();
            for edge in edges {
                let Edge { target, symbol } = self.edges[edge];
                let copied_target = match map[target] {
                    Some(t) => t,
                    None => {
                        let t = self.new_state(self.states[target].kind)?;
                        map[target] = Some(t);
                        stack.push(target);
                        t
                    }
                };
                self.connect(copied, copied_target, symbol)?;
            }
        }

        // the accepting state is reachable from the start in every automaton
        // the combinators produce
        self.push_nfa(copied_start, map[accepting].unwrap())
    }
}
