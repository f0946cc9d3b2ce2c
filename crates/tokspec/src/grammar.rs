use std::collections::{hash_map::Entry, HashMap};
use std::fmt;

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::{
    error::{Diagnostics, ErrorKind, SpecError},
    lexer::Lexer,
    limits::Limits,
    literal,
    span::Span,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NonTermHandle(u32);
entity_impl! { NonTermHandle }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ExprHandle(u32);
entity_impl! { ExprHandle }

/// Offset at which a terminal's decoded bytes begin in the terminal pool.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TermHandle(u32);

impl TermHandle {
    pub fn offset(self) -> usize {
        self.0 as usize
    }
}

/// Backing storage for all decoded terminals. Each terminal is stored as its
/// bytes followed by a NUL; the pool is append-only.
#[derive(Default, Debug)]
pub struct TermPool {
    bytes: Vec<u8>,
}

impl TermPool {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn resolve(&self, handle: TermHandle) -> &[u8] {
        let start = handle.offset();
        let len = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len() - start);
        &self.bytes[start..start + len]
    }

    fn intern(
        &mut self,
        decoded: &[u8],
        span: Span,
        limits: &Limits,
    ) -> Result<TermHandle, SpecError> {
        if self.bytes.len() + decoded.len() + 1 > limits.max_term_bytes {
            return Err(SpecError::new(
                span,
                ErrorKind::CapacityExceeded("the terminal pool is out of memory"),
            ));
        }
        let handle = TermHandle(self.bytes.len() as u32);
        self.bytes.extend_from_slice(decoded);
        self.bytes.push(0);
        Ok(handle)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    NoOp,
    Or,
    And,
    ZeroOrMore,
}

/// One operand slot of an expression node, tagged with the pool it lives in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Expr(ExprHandle),
    NonTerm(NonTermHandle),
    Term(TermHandle),
}

/// One node of a right-descending expression chain. The body of a
/// non-terminal is threaded through `op2`: `op1` is a leaf or a closure
/// wrapper, `op2` continues the chain or ends it with `None`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Expr {
    pub op: Op,
    pub op1: Operand,
    pub op2: Option<Operand>,
}

#[derive(Debug)]
pub struct NonTerm {
    /// The name without its `$` sigil.
    pub name: String,
    /// Name span of the definition, or of the first reference for stubs.
    pub span: Span,
    pub expr: Option<ExprHandle>,
    /// False while the entry is a forward-reference stub.
    pub complete: bool,
}

/// The parsed specification: the non-terminal table, the expression forest,
/// and the terminal pool. Read-only once `new` returns.
#[derive(Debug)]
pub struct SpecFile {
    pub nonterms: PrimaryMap<NonTermHandle, NonTerm>,
    pub exprs: PrimaryMap<ExprHandle, Expr>,
    pub terms: TermPool,
    pub name_to_nonterm: HashMap<String, NonTermHandle>,
    /// Completed definitions in the order their headers were parsed.
    pub definition_order: Vec<NonTermHandle>,
}

impl SpecFile {
    pub fn new(src: &str, diag: &Diagnostics, limits: &Limits) -> Result<SpecFile, SpecError> {
        let mut parser = Parser {
            src,
            lexer: Lexer::new(src.as_bytes()),
            diag,
            limits,
            file: SpecFile {
                nonterms: PrimaryMap::new(),
                exprs: PrimaryMap::new(),
                terms: TermPool::default(),
                name_to_nonterm: HashMap::new(),
                definition_order: Vec::new(),
            },
        };
        parser.parse()?;
        Ok(parser.file)
    }

    /// Prints an expression chain in its `(a & ((b*) & (c)))` shape.
    pub fn display_expr(&self, buf: &mut dyn fmt::Write, handle: ExprHandle) -> fmt::Result {
        let expr = self.exprs[handle];
        buf.write_str("(")?;
        self.display_operand(buf, expr.op1)?;
        match expr.op {
            Op::NoOp => {}
            Op::Or => buf.write_str(" | ")?,
            Op::And => buf.write_str(" & ")?,
            Op::ZeroOrMore => buf.write_str("*")?,
        }
        if let Some(op2) = expr.op2 {
            self.display_operand(buf, op2)?;
        }
        buf.write_str(")")
    }

    fn display_operand(&self, buf: &mut dyn fmt::Write, operand: Operand) -> fmt::Result {
        match operand {
            Operand::Expr(e) => self.display_expr(buf, e),
            Operand::NonTerm(n) => write!(buf, "${}", self.nonterms[n].name),
            Operand::Term(t) => {
                for &b in self.terms.resolve(t) {
                    write!(buf, "{}", std::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

struct Parser<'a, 'b> {
    src: &'a str,
    lexer: Lexer<'a>,
    diag: &'b Diagnostics,
    limits: &'b Limits,
    file: SpecFile,
}

impl<'a, 'b> Parser<'a, 'b> {
    fn parse(&mut self) -> Result<(), SpecError> {
        while !self.lexer.is_empty() {
            self.check_line_length()?;
            self.parse_line()?;
            self.lexer.consume(b'\n');
        }
        Ok(())
    }

    fn check_line_length(&self) -> Result<(), SpecError> {
        let start = self.lexer.pos();
        let rest = self.lexer.remaining();
        let len = rest
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(rest.len());
        if len > self.limits.max_line_len {
            return Err(SpecError::new(
                Span::at(start),
                ErrorKind::CapacityExceeded("the input line is too long"),
            ));
        }
        Ok(())
    }

    fn parse_line(&mut self) -> Result<(), SpecError> {
        self.skip_space();
        match self.lexer.peek() {
            None | Some(b'\n') => return Ok(()),
            Some(b'!') => {
                self.skip_to_eol();
                return Ok(());
            }
            Some(_) => {}
        }

        let handle = self.parse_header()?;
        let expr = self.parse_body()?;

        let nonterm = &mut self.file.nonterms[handle];
        nonterm.expr = Some(expr);
        nonterm.complete = true;
        self.file.definition_order.push(handle);
        Ok(())
    }

    fn parse_header(&mut self) -> Result<NonTermHandle, SpecError> {
        let src = self.src;
        let start = self.lexer.pos();
        if !self.lexer.consume(b'$') {
            return Err(SpecError::new(Span::at(start), ErrorKind::MalformedHeader));
        }

        let name_span = self.lexer.consume_while(|c| !c.is_ascii_whitespace());
        if name_span.is_empty() {
            return Err(SpecError::new(
                self.lexer.span_since(start),
                ErrorKind::EmptyName,
            ));
        }
        let name = name_span.as_str(src);

        let handle = self.lookup_or_insert(name, name_span)?;
        let nonterm = &mut self.file.nonterms[handle];
        if nonterm.complete {
            return Err(SpecError::new(
                name_span,
                ErrorKind::Redefinition(name.to_owned()),
            ));
        }
        // a stub keeps the span of its first reference until it is defined
        nonterm.span = name_span;

        self.skip_space();
        let assign = self.lexer.pos();
        if !(self.lexer.consume(b':') && self.lexer.consume(b'=')) {
            return Err(SpecError::new(
                Span::at(assign),
                ErrorKind::MissingDefinition,
            ));
        }

        self.skip_space();
        if self.at_eol() {
            return Err(SpecError::new(
                Span::at(self.lexer.pos()),
                ErrorKind::MissingDefinition,
            ));
        }

        Ok(handle)
    }

    fn parse_body(&mut self) -> Result<ExprHandle, SpecError> {
        let mut head = None;
        let mut prev: Option<ExprHandle> = None;

        while let Some(op1) = self.parse_operand()? {
            let op = self.parse_operator();
            let mut node = self.push_expr(Expr { op, op1, op2: None })?;

            // `X*` stands alone in its node, a fresh wrapper carries the
            // operator that follows it and continues the chain
            if op == Op::ZeroOrMore {
                loop {
                    let following = self.parse_operator();
                    node = self.push_expr(Expr {
                        op: following,
                        op1: Operand::Expr(node),
                        op2: None,
                    })?;
                    if following != Op::ZeroOrMore {
                        break;
                    }
                }
            }

            match prev {
                Some(p) => self.file.exprs[p].op2 = Some(Operand::Expr(node)),
                None => head = Some(node),
            }
            prev = Some(node);
        }

        // the header guarantees at least one operand on the line
        debug_assert!(head.is_some());
        head.ok_or_else(|| {
            SpecError::new(Span::at(self.lexer.pos()), ErrorKind::MissingDefinition)
        })
    }

    fn parse_operand(&mut self) -> Result<Option<Operand>, SpecError> {
        let src = self.src;
        self.skip_space();

        let start = self.lexer.pos();
        let first = match self.lexer.peek() {
            None | Some(b'\n') => return Ok(None),
            Some(b) => b,
        };

        if first == b'|' || first == b'*' {
            return Err(SpecError::new(
                Span::at(start),
                ErrorKind::DanglingOperator(first as char),
            ));
        }

        let mut run = self.lexer.consume_while(|c| !c.is_ascii_whitespace());
        let bytes = run.as_bytes(src.as_bytes());

        // a `*` ending the run is the closure operator, not part of the
        // operand, unless the byte before it is the escape character; only
        // one star is ever pushed back
        if bytes.len() >= 2 && bytes[bytes.len() - 1] == b'*' && bytes[bytes.len() - 2] != b'@' {
            self.lexer.restore_pos(run.end() - 1);
            run = Span::new(run.start(), run.end() - 1);
        }
        let bytes = run.as_bytes(src.as_bytes());

        if bytes[0] == b'$' {
            if bytes.len() == 1 {
                return Err(SpecError::new(run, ErrorKind::EmptyName));
            }
            let name_span = Span::new(run.start() + 1, run.end());
            let handle = self.lookup_or_insert(name_span.as_str(src), name_span)?;
            Ok(Some(Operand::NonTerm(handle)))
        } else {
            let decoded = literal::decode_terminal(bytes, run, self.diag)?;
            let handle = self.file.terms.intern(&decoded, run, self.limits)?;
            Ok(Some(Operand::Term(handle)))
        }
    }

    fn parse_operator(&mut self) -> Op {
        self.skip_space();
        match self.lexer.peek() {
            None | Some(b'\n') => Op::NoOp,
            Some(b'|') => {
                self.lexer.next();
                Op::Or
            }
            Some(b'*') => {
                self.lexer.next();
                Op::ZeroOrMore
            }
            // the next operand starts here, leave it in place
            Some(_) => Op::And,
        }
    }

    /// Probes the non-terminal table, inserting a forward-reference stub on a
    /// miss.
    fn lookup_or_insert(&mut self, name: &str, span: Span) -> Result<NonTermHandle, SpecError> {
        if name.len() > self.limits.max_name_len {
            return Err(SpecError::new(
                span,
                ErrorKind::CapacityExceeded("the non-terminal name is too long"),
            ));
        }

        let SpecFile {
            nonterms,
            name_to_nonterm,
            ..
        } = &mut self.file;

        match name_to_nonterm.entry(name.to_owned()) {
            Entry::Occupied(o) => Ok(*o.get()),
            Entry::Vacant(v) => {
                if nonterms.len() >= self.limits.max_nonterms {
                    return Err(SpecError::new(
                        span,
                        ErrorKind::CapacityExceeded("the non-terminal table is full"),
                    ));
                }
                let handle = nonterms.push(NonTerm {
                    name: name.to_owned(),
                    span,
                    expr: None,
                    complete: false,
                });
                v.insert(handle);
                Ok(handle)
            }
        }
    }

    fn push_expr(&mut self, expr: Expr) -> Result<ExprHandle, SpecError> {
        if self.file.exprs.len() >= self.limits.max_exprs {
            return Err(SpecError::new(
                Span::at(self.lexer.pos()),
                ErrorKind::CapacityExceeded("the expression pool is out of memory"),
            ));
        }
        Ok(self.file.exprs.push(expr))
    }

    fn skip_space(&mut self) {
        self.lexer
            .consume_while(|c| c.is_ascii_whitespace() && c != b'\n');
    }

    fn skip_to_eol(&mut self) {
        self.lexer.consume_while(|c| c != b'\n');
    }

    fn at_eol(&self) -> bool {
        matches!(self.lexer.peek(), None | Some(b'\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SpecFile {
        SpecFile::new(src, &Diagnostics::new(), &Limits::default()).unwrap()
    }

    fn parse_err(src: &str) -> SpecError {
        SpecFile::new(src, &Diagnostics::new(), &Limits::default()).unwrap_err()
    }

    fn body(file: &SpecFile, name: &str) -> String {
        let handle = file.name_to_nonterm[name];
        let expr = file.nonterms[handle].expr.unwrap();
        let mut buf = String::new();
        file.display_expr(&mut buf, expr).unwrap();
        buf
    }

    #[test]
    fn single_terminal() {
        let file = parse("$x := a");
        assert_eq!(file.nonterms.len(), 1);
        assert_eq!(file.definition_order.len(), 1);

        let x = &file.nonterms[file.name_to_nonterm["x"]];
        assert!(x.complete);

        let expr = file.exprs[x.expr.unwrap()];
        assert_eq!(expr.op, Op::NoOp);
        assert_eq!(expr.op2, None);
        let Operand::Term(term) = expr.op1 else {
            panic!("expected a terminal operand");
        };
        assert_eq!(file.terms.resolve(term), b"a");
    }

    #[test]
    fn alternation() {
        let file = parse("$x := a | b");
        assert_eq!(body(&file, "x"), "(a | (b))");
    }

    #[test]
    fn closure_binds_to_one_operand() {
        let file = parse("$x := a b* c");
        assert_eq!(body(&file, "x"), "(a & ((b*) & (c)))");
    }

    #[test]
    fn multi_byte_terminal() {
        let file = parse("$kw := while");
        let expr = file.exprs[file.nonterms[file.name_to_nonterm["kw"]].expr.unwrap()];
        let Operand::Term(term) = expr.op1 else {
            panic!("expected a terminal operand");
        };
        assert_eq!(file.terms.resolve(term), b"while");
    }

    #[test]
    fn forward_reference() {
        let file = parse("$x := $y\n$y := z");
        let x = file.name_to_nonterm["x"];
        let y = file.name_to_nonterm["y"];
        assert!(file.nonterms[x].complete);
        assert!(file.nonterms[y].complete);

        let expr = file.exprs[file.nonterms[x].expr.unwrap()];
        assert_eq!(expr.op1, Operand::NonTerm(y));
        assert_eq!(file.definition_order, vec![x, y]);
    }

    #[test]
    fn unresolved_reference_stays_incomplete() {
        let file = parse("$x := $y");
        let y = &file.nonterms[file.name_to_nonterm["y"]];
        assert!(!y.complete);
        assert_eq!(y.expr, None);
        assert_eq!(file.definition_order.len(), 1);
    }

    #[test]
    fn comments_and_blank_lines() {
        let file = parse("! comment\n\n   ! indented comment\n$x := a\n");
        assert_eq!(file.nonterms.len(), 1);
    }

    #[test]
    fn escapes_decode() {
        let file = parse("$x := @_ | @@");
        assert_eq!(body(&file, "x"), "(  | (@))");

        let expr = file.exprs[file.nonterms[file.name_to_nonterm["x"]].expr.unwrap()];
        let Operand::Term(space) = expr.op1 else {
            panic!()
        };
        assert_eq!(file.terms.resolve(space), b" ");
    }

    #[test]
    fn escaped_star_is_not_closure() {
        // `@*` at the end of a run suppresses the star pushback
        let file = parse("$x := a@*");
        let expr = file.exprs[file.nonterms[file.name_to_nonterm["x"]].expr.unwrap()];
        assert_eq!(expr.op, Op::NoOp);
        let Operand::Term(term) = expr.op1 else {
            panic!()
        };
        assert_eq!(file.terms.resolve(term), b"a*");
    }

    #[test]
    fn double_escape_before_star_still_suppresses_pushback() {
        // the scanner only looks at the byte before the `*`, so `@@*` is the
        // terminal `@*` and no closure applies
        let file = parse("$x := @@*");
        let expr = file.exprs[file.nonterms[file.name_to_nonterm["x"]].expr.unwrap()];
        assert_eq!(expr.op, Op::NoOp);
        let Operand::Term(term) = expr.op1 else {
            panic!()
        };
        assert_eq!(file.terms.resolve(term), b"@*");
    }

    #[test]
    fn only_one_star_is_pushed_back() {
        // the run `a**` loses exactly one star, leaving the terminal `a*`
        // under a closure
        let file = parse("$x := a**");
        assert_eq!(body(&file, "x"), "((a**))");

        let head = file.exprs[file.nonterms[file.name_to_nonterm["x"]].expr.unwrap()];
        let Operand::Expr(closure) = head.op1 else {
            panic!("expected a closure wrapper");
        };
        let closure = file.exprs[closure];
        assert_eq!(closure.op, Op::ZeroOrMore);
        let Operand::Term(term) = closure.op1 else {
            panic!()
        };
        assert_eq!(file.terms.resolve(term), b"a*");
    }

    #[test]
    fn star_after_closure_continues_the_chain() {
        let file = parse("$x := a* * b");
        assert_eq!(body(&file, "x"), "(((a*)*) & (b))");
    }

    #[test]
    fn chain_invariant() {
        let file = parse("$x := a b* c | d\n$y := $x e*");
        for expr in file.exprs.values() {
            let terminates = matches!(expr.op, Op::NoOp | Op::ZeroOrMore);
            assert_eq!(expr.op2.is_none(), terminates, "{expr:?}");
        }
    }

    #[test]
    fn terminal_pool_is_nul_terminated() {
        let file = parse("$x := ab cd");
        assert_eq!(file.terms.bytes(), b"ab\0cd\0");
    }

    #[test]
    fn reordering_independent_definitions() {
        let one = parse("$a := x y\n$b := z*");
        let two = parse("$b := z*\n$a := x y");

        let mut names_one: Vec<_> = one.name_to_nonterm.keys().cloned().collect();
        let mut names_two: Vec<_> = two.name_to_nonterm.keys().cloned().collect();
        names_one.sort();
        names_two.sort();
        assert_eq!(names_one, names_two);

        for name in &names_one {
            assert_eq!(body(&one, name), body(&two, name));
        }
    }

    #[test]
    fn malformed_header() {
        let err = parse_err("x := a");
        assert_eq!(err.kind, ErrorKind::MalformedHeader);
        assert_eq!(err.span, Span::at(0));
    }

    #[test]
    fn empty_header_name() {
        assert_eq!(parse_err("$ := a").kind, ErrorKind::EmptyName);
        assert_eq!(parse_err("$x := $ y").kind, ErrorKind::EmptyName);
    }

    #[test]
    fn missing_definition() {
        assert_eq!(parse_err("$x").kind, ErrorKind::MissingDefinition);
        assert_eq!(parse_err("$x :=").kind, ErrorKind::MissingDefinition);
        assert_eq!(parse_err("$x a").kind, ErrorKind::MissingDefinition);
        assert_eq!(parse_err("$x := \n").kind, ErrorKind::MissingDefinition);
    }

    #[test]
    fn redefinition() {
        let err = parse_err("$x := a\n$x := b");
        assert_eq!(err.kind, ErrorKind::Redefinition("x".to_owned()));
    }

    #[test]
    fn redefining_a_stub_is_allowed() {
        let file = parse("$x := $y\n$y := a");
        assert!(file.nonterms[file.name_to_nonterm["y"]].complete);
    }

    #[test]
    fn dangling_operator() {
        assert_eq!(parse_err("$x := | a").kind, ErrorKind::DanglingOperator('|'));
        assert_eq!(parse_err("$x := * a").kind, ErrorKind::DanglingOperator('*'));
        assert_eq!(parse_err("$x := a | | b").kind, ErrorKind::DanglingOperator('|'));
    }

    #[test]
    fn incomplete_escape_points_at_the_escape() {
        let err = parse_err("$x := a @");
        assert_eq!(err.kind, ErrorKind::IncompleteEscape);
        assert_eq!(err.span, Span::at(8));
    }

    #[test]
    fn unknown_escape_warns_and_continues() {
        let diag = Diagnostics::new();
        let file = SpecFile::new("$x := @q", &diag, &Limits::default()).unwrap();
        assert_eq!(diag.get().len(), 1);

        let expr = file.exprs[file.nonterms[file.name_to_nonterm["x"]].expr.unwrap()];
        let Operand::Term(term) = expr.op1 else {
            panic!()
        };
        assert_eq!(file.terms.resolve(term), b"q");
    }

    #[test]
    fn nonterm_table_capacity() {
        let limits = Limits {
            max_nonterms: 1,
            ..Limits::default()
        };
        let err = SpecFile::new("$x := a\n$y := b", &Diagnostics::new(), &limits).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::CapacityExceeded("the non-terminal table is full")
        );
    }

    #[test]
    fn terminal_pool_capacity() {
        let limits = Limits {
            max_term_bytes: 4,
            ..Limits::default()
        };
        let err = SpecFile::new("$x := abcd", &Diagnostics::new(), &limits).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::CapacityExceeded("the terminal pool is out of memory")
        );
    }

    #[test]
    fn line_length_capacity() {
        let limits = Limits {
            max_line_len: 8,
            ..Limits::default()
        };
        let err = SpecFile::new("$x := abcdefgh", &Diagnostics::new(), &limits).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::CapacityExceeded("the input line is too long")
        );
    }

    #[test]
    fn name_length_capacity() {
        let long = "n".repeat(65);
        let err = parse_err(&format!("${long} := a"));
        assert_eq!(
            err.kind,
            ErrorKind::CapacityExceeded("the non-terminal name is too long")
        );
    }
}
