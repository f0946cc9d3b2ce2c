/// The type of a byte offset in a string
pub type Offset = u32;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Utf8Pos {
    /// zero-based line index
    pub line: u32,
    /// zero-based column offset relative to the start of the line, UTF-8 code units - u8
    pub character: u32,
}

impl Utf8Pos {
    pub const fn new(line: u32, character: u32) -> Utf8Pos {
        Self { line, character }
    }
}

impl From<(u32, u32)> for Utf8Pos {
    fn from((line, character): (u32, u32)) -> Self {
        Utf8Pos { line, character }
    }
}

#[derive(Clone, Copy)]
pub struct LineInfo {
    /// index of the line within the file
    pub line: u32,
    /// byte offset of the start of the line
    pub line_start: Offset,
}

pub struct LineMap {
    lines: Vec<Offset>,
}

impl LineMap {
    pub fn new(src: &str) -> Self {
        assert!(src.len() <= Offset::MAX as usize);
        let mut lines = Vec::new();

        let mut prev_end = 0;
        let mut bytes = src.bytes().enumerate();

        while let Some((mut i, b)) = bytes.next() {
            // we recognize \r\n  \n  \r as newlines
            match b {
                b'\n' | b'\r' => {
                    if b == b'\r' {
                        if let Some((new_i, b'\n')) = bytes.clone().next() {
                            bytes.next();
                            i = new_i;
                        }
                    }
                    lines.push(prev_end);
                    prev_end = i as Offset + 1;
                }
                _ => {}
            }
        }

        lines.push(prev_end);

        Self { lines }
    }
    /// Returns zero-based Line and Column offset in utf8 code units (u8). Offset is clamped to the end of `src`
    pub fn offset_to_utf8(&self, src: &str, offset: Offset) -> Utf8Pos {
        let offset = Offset::min(offset, src.len() as Offset);

        let LineInfo { line, line_start } = self.offset_to_line(offset);

        let len = self.line_length(src, line);
        let character = (offset - line_start).min(len);

        Utf8Pos { line, character }
    }
    /// Find the line which contains the offset. Offset is clamped to the end of `src`
    pub fn offset_to_line(&self, byte_offset: Offset) -> LineInfo {
        let index = self.lines.binary_search(&byte_offset);
        let line = match index {
            Ok(a) => a,
            Err(a) => a - 1,
        };
        let line_start = self.lines[line];
        debug_assert!(line_start <= byte_offset);

        LineInfo {
            line: line.try_into().unwrap(),
            line_start,
        }
    }
    pub fn line_length(&self, src: &str, line: u32) -> Offset {
        let start = self.line_start(line);
        let end = self.line_end(src, line);
        end - start
    }
    pub fn line_start(&self, line: u32) -> Offset {
        self.lines[line as usize]
    }
    /// Returns the offset one past the last character of the line, excluding the line break
    pub fn line_end(&self, src: &str, line: u32) -> Offset {
        let next = line as usize + 1;
        let end = match self.lines.get(next) {
            // the previous line ends before the linebreak which is at most 2 bytes long ("\r\n")
            Some(&next_start) => {
                let mut end = next_start;
                let bytes = src.as_bytes();
                if end > 0 && matches!(bytes.get(end as usize - 1), Some(b'\n')) {
                    end -= 1;
                }
                if end > 0 && matches!(bytes.get(end as usize - 1), Some(b'\r')) {
                    end -= 1;
                }
                end
            }
            None => src.len() as Offset,
        };
        end
    }
}
