use std::{cell::RefCell, fmt::Display};

use crate::span::{Span, Spanned};

/// What went wrong. Every kind aborts the run; the span on [`SpecError`]
/// points at the byte where it was detected.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    MalformedHeader,
    EmptyName,
    MissingDefinition,
    Redefinition(String),
    DanglingOperator(char),
    IncompleteEscape,
    CapacityExceeded(&'static str),
    UndefinedNonTerminal(String),
    RecursiveNonTerminal(String),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedHeader => {
                f.write_str("each line must define a non-terminal: `$name := ...`")
            }
            ErrorKind::EmptyName => f.write_str("empty non-terminal name"),
            ErrorKind::MissingDefinition => f.write_str("missing definition of a non-terminal"),
            ErrorKind::Redefinition(name) => {
                write!(f, "re-definition of a non-terminal: ${name}")
            }
            ErrorKind::DanglingOperator(op) => {
                write!(f, "an operator `{op}` without an operand")
            }
            ErrorKind::IncompleteEscape => {
                f.write_str("an incomplete escape sequence at the end of an operand")
            }
            ErrorKind::CapacityExceeded(what) => f.write_str(what),
            ErrorKind::UndefinedNonTerminal(name) => {
                write!(f, "non-terminal ${name} is referenced but never defined")
            }
            ErrorKind::RecursiveNonTerminal(name) => {
                write!(f, "non-terminal ${name} is defined in terms of itself")
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SpecError {
    pub span: Span,
    pub kind: ErrorKind,
}

impl SpecError {
    pub fn new(span: Span, kind: ErrorKind) -> SpecError {
        Self { span, kind }
    }
}

impl Display for SpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for SpecError {}

/// Collects non-fatal warnings during a run. Fatal problems travel as
/// [`SpecError`] values instead.
#[derive(Default)]
pub struct Diagnostics {
    warnings: RefCell<Vec<Spanned<String>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn warning(&self, span: Span, message: impl ToString) {
        self.warnings
            .borrow_mut()
            .push(Spanned::new(message.to_string(), span));
    }
    pub fn get(&self) -> std::cell::Ref<'_, Vec<Spanned<String>>> {
        self.warnings.borrow()
    }
    pub fn clear(&self) {
        self.warnings.borrow_mut().clear();
    }
}
