use cranelift_entity::SecondaryMap;

use tokspec::{
    grammar::{ExprHandle, NonTermHandle, Op, Operand},
    span::Span,
    ErrorKind, Limits, SpecError, SpecFile,
};

use crate::nfa::{CapacityError, NfaArena, NfaHandle};

/// The result of compiling a specification: every non-terminal's automaton
/// plus their union, all living in one arena.
#[derive(Debug)]
pub struct CompiledNfa {
    pub arena: NfaArena,
    /// The union of all per-name automata, `None` for an empty specification.
    pub master: Option<NfaHandle>,
    pub nonterm_to_nfa: SecondaryMap<NonTermHandle, Option<NfaHandle>>,
}

impl CompiledNfa {
    pub fn new(spec: &SpecFile, limits: &Limits) -> Result<CompiledNfa, SpecError> {
        // a name that only ever appeared as a reference has nothing to build
        for (_, nonterm) in spec.nonterms.iter() {
            if !nonterm.complete {
                return Err(SpecError::new(
                    nonterm.span,
                    ErrorKind::UndefinedNonTerminal(nonterm.name.clone()),
                ));
            }
        }

        let mut builder = Builder {
            spec,
            arena: NfaArena::new(limits),
            nonterm_to_nfa: SecondaryMap::new(),
            building: SecondaryMap::new(),
            current: Span::empty(),
        };

        for &handle in &spec.definition_order {
            let built = builder.build_nonterm(handle)?;
            builder.nonterm_to_nfa[handle] = Some(built);
        }

        let mut definitions = spec.definition_order.iter().copied();
        let mut master = None;
        if let Some(first) = definitions.next() {
            let target = builder.nonterm_to_nfa[first].unwrap();
            for handle in definitions {
                builder.current = spec.nonterms[handle].span;
                let next = builder.nonterm_to_nfa[handle].unwrap();
                builder.arena.or(target, next).map_err(|e| builder.cap(e))?;
            }
            master = Some(target);
        }

        Ok(CompiledNfa {
            arena: builder.arena,
            master,
            nonterm_to_nfa: builder.nonterm_to_nfa,
        })
    }
}

struct Builder<'a> {
    spec: &'a SpecFile,
    arena: NfaArena,
    /// Memoises built automata; references always receive a copy because the
    /// combinators consume their operands.
    nonterm_to_nfa: SecondaryMap<NonTermHandle, Option<NfaHandle>>,
    building: SecondaryMap<NonTermHandle, bool>,
    /// Name span of the non-terminal currently being built, for diagnostics.
    current: Span,
}

impl<'a> Builder<'a> {
    fn cap(&self, err: CapacityError) -> SpecError {
        SpecError::new(self.current, ErrorKind::CapacityExceeded(err.0))
    }

    /// Builds a non-terminal's automaton from its expression chain.
    fn build_nonterm(&mut self, handle: NonTermHandle) -> Result<NfaHandle, SpecError> {
        let spec = self.spec;
        let nonterm = &spec.nonterms[handle];
        let expr = match nonterm.expr {
            Some(expr) => expr,
            None => {
                return Err(SpecError::new(
                    nonterm.span,
                    ErrorKind::UndefinedNonTerminal(nonterm.name.clone()),
                ))
            }
        };

        let saved = self.current;
        self.current = nonterm.span;
        self.building[handle] = true;

        let built = self.build_expr(expr)?;

        self.building[handle] = false;
        self.current = saved;
        Ok(built)
    }

    /// Resolves a `$name` operand: a memoised automaton is copied out, a miss
    /// builds the definition first.
    fn build_reference(&mut self, handle: NonTermHandle) -> Result<NfaHandle, SpecError> {
        let spec = self.spec;
        if self.building[handle] {
            let nonterm = &spec.nonterms[handle];
            return Err(SpecError::new(
                nonterm.span,
                ErrorKind::RecursiveNonTerminal(nonterm.name.clone()),
            ));
        }

        let master = match self.nonterm_to_nfa[handle] {
            Some(master) => master,
            None => {
                let built = self.build_nonterm(handle)?;
                self.nonterm_to_nfa[handle] = Some(built);
                built
            }
        };

        self.arena.clone_nfa(master).map_err(|e| self.cap(e))
    }

    fn build_expr(&mut self, handle: ExprHandle) -> Result<NfaHandle, SpecError> {
        let expr = self.spec.exprs[handle];
        let op1 = self.build_operand(expr.op1)?;

        match expr.op {
            Op::NoOp => Ok(op1),
            Op::ZeroOrMore => {
                self.arena.closure(op1).map_err(|e| self.cap(e))?;
                Ok(op1)
            }
            Op::Or | Op::And => {
                let Some(op2) = expr.op2 else {
                    unreachable!("a binary node always continues the chain")
                };
                let op2 = self.build_operand(op2)?;
                match expr.op {
                    Op::Or => self.arena.or(op1, op2),
                    _ => self.arena.concat(op1, op2),
                }
                .map_err(|e| self.cap(e))?;
                Ok(op1)
            }
        }
    }

    fn build_operand(&mut self, operand: Operand) -> Result<NfaHandle, SpecError> {
        match operand {
            Operand::Expr(expr) => self.build_expr(expr),
            Operand::NonTerm(nonterm) => self.build_reference(nonterm),
            Operand::Term(term) => {
                let bytes = self.spec.terms.resolve(term);
                self.arena.terminal_chain(bytes).map_err(|e| self.cap(e))
            }
        }
    }
}
