//! The front half of a lexer generator: parses a line-oriented token
//! specification into a table of named regular expressions.
//!
//! Each input line defines one non-terminal:
//!
//! ```text
//! ! numbers and a keyword
//! $digit  := 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9
//! $number := $digit $digit*
//! $kw_if  := if
//! ```
//!
//! Bodies combine terminals and `$`-prefixed non-terminal references with
//! alternation (`|`), juxtaposition (concatenation), and postfix closure
//! (`*`). The escape character is `@` (`@_` is a space). Non-terminals may be
//! referenced before they are defined.
//!
//! [`SpecFile::new`] produces the expression forest consumed by the
//! `tokspec-nfa` crate, which compiles it into a single Thompson NFA.

pub mod error;
pub mod grammar;
pub mod lexer;
pub mod limits;
mod literal;
pub mod span;

pub use error::{Diagnostics, ErrorKind, SpecError};
pub use grammar::SpecFile;
pub use limits::Limits;
