use crate::{
    error::{Diagnostics, ErrorKind, SpecError},
    span::Span,
};

/// Decodes the bytes of a terminal operand, expanding `@` escape sequences.
///
/// Unknown sequences warn and copy the escaped byte through; a lone `@` at
/// the end of the operand is fatal, pointed at the `@` itself.
pub(crate) fn decode_terminal(
    bytes: &[u8],
    span: Span,
    diag: &Diagnostics,
) -> Result<Vec<u8>, SpecError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied().enumerate();

    while let Some((i, b)) = iter.next() {
        if b != b'@' {
            out.push(b);
            continue;
        }

        let at = Span::at(span.start() + i as u32);
        match iter.next() {
            Some((_, b'_')) => out.push(b' '),
            Some((_, b'@')) => out.push(b'@'),
            Some((_, b'|')) => out.push(b'|'),
            Some((_, b'*')) => out.push(b'*'),
            Some((_, b'$')) => out.push(b'$'),
            Some((_, other)) => {
                diag.warning(
                    at,
                    format!(
                        "unknown escape sequence `@{}`",
                        std::ascii::escape_default(other)
                    ),
                );
                out.push(other);
            }
            None => return Err(SpecError::new(at, ErrorKind::IncompleteEscape)),
        }
    }

    Ok(out)
}
