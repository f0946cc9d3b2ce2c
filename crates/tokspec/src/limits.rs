/// Capacity bounds for the pools of a single run. Crossing any of them is a
/// fatal `CapacityExceeded`.
///
/// The defaults keep the generated automata small enough for eyeballing the
/// Graphviz dump; tests shrink them to exercise the overflow paths.
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_nonterms: usize,
    pub max_name_len: usize,
    pub max_term_bytes: usize,
    pub max_exprs: usize,
    pub max_line_len: usize,
    pub max_states: usize,
    pub max_edges_per_state: usize,
    pub max_nfas: usize,
    pub max_edges: usize,
}

impl Default for Limits {
    fn default() -> Limits {
        let max_nonterms = 256;
        // an average of 4 expression nodes per non-terminal is plenty
        let max_exprs = 4 * max_nonterms;
        Limits {
            max_nonterms,
            max_name_len: 64,
            max_term_bytes: 8192,
            max_exprs,
            max_line_len: 1024,
            max_states: 1024,
            max_edges_per_state: 128,
            max_nfas: 1024 / 4,
            // each combinator adds at most 4 epsilon edges, the headroom on
            // top of that covers multi-byte terminals expanding into chains
            max_edges: 10 * (max_exprs + max_nonterms),
        }
    }
}
