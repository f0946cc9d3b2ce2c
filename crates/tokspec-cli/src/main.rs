use std::{
    env::args,
    io::Read,
    path::{Path, PathBuf},
};

use linemap::{LineMap, Utf8Pos};
use tokspec::{Diagnostics, Limits, SpecError, SpecFile};
use tokspec_nfa::{graph, CompiledNfa};

trait IoError<T> {
    fn pretty_error(self, path: &Path, message: &str) -> Result<T, ()>;
}

impl<T> IoError<T> for std::io::Result<T> {
    fn pretty_error(self, path: &Path, message: &str) -> Result<T, ()> {
        self.map_err(|e| {
            let path = path.display();
            eprintln!("{message} `{path}`\n  {e}");
        })
    }
}

fn main() {
    if run().is_err() {
        std::process::exit(1);
    }
}

struct StdoutSink;

impl std::fmt::Write for StdoutSink {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        use std::io::Write as _;
        std::io::stdout()
            .write_all(s.as_bytes())
            .map_err(|_| std::fmt::Error)
    }
}

fn run() -> Result<(), ()> {
    let args = args().skip(1).collect::<Vec<_>>();

    let mut do_exprs = false;
    let mut files = Vec::new();

    for arg in args.iter().map(String::as_str) {
        match arg {
            "--exprs" => do_exprs = true,
            _ => files.push(arg),
        }
    }

    if files.len() > 1 {
        eprintln!("Only one file may be provided");
        return Err(());
    }

    let src = match files.pop() {
        Some(file) => {
            let path = PathBuf::from(file);
            std::fs::read_to_string(&path).pretty_error(&path, "Failed to read")?
        }
        None => {
            let mut src = String::new();
            std::io::stdin()
                .read_to_string(&mut src)
                .map_err(|e| eprintln!("Failed to read stdin\n  {e}"))?;
            src
        }
    };

    let linemap = LineMap::new(&src);
    let report = |error: &SpecError| {
        let Utf8Pos { line, character } = linemap.offset_to_utf8(&src, error.span.start());
        eprintln!("Error {}:{}: {}", line + 1, character + 1, error);
    };

    let diag = Diagnostics::new();
    let limits = Limits::default();

    let parsed = SpecFile::new(&src, &diag, &limits);

    for warning in diag.get().iter() {
        let Utf8Pos { line, character } = linemap.offset_to_utf8(&src, warning.span.start());
        eprintln!("Warning {}:{}: {}", line + 1, character + 1, warning.inner);
    }

    let spec = parsed.map_err(|e| report(&e))?;

    if do_exprs {
        for &handle in &spec.definition_order {
            let nonterm = &spec.nonterms[handle];
            let mut body = String::new();
            if let Some(expr) = nonterm.expr {
                _ = spec.display_expr(&mut body, expr);
            }
            println!("${} := {body}", nonterm.name);
        }
    }

    let compiled = CompiledNfa::new(&spec, &limits).map_err(|e| report(&e))?;

    graph::write_graphviz(&mut StdoutSink, &compiled.arena, compiled.master)
        .map_err(|_| eprintln!("Failed to write to stdout"))?;

    Ok(())
}
