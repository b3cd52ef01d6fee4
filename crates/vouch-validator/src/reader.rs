//! Line-by-line streaming over a decoded submission file.

use std::io::{self, BufRead};

use bytes::BytesMut;

pub const FIELD_SEPARATOR: u8 = b'\t';

/// One line of a file, without its terminator.
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    /// 1-based; the header is line 1.
    pub number: u64,
    pub content: &'a [u8],
    /// False only for a last line that ends without `\n`.
    pub terminated: bool,
}

impl<'a> Line<'a> {
    pub fn fields(&self) -> impl Iterator<Item = &'a [u8]> {
        self.content.split(|b| *b == FIELD_SEPARATOR)
    }

    pub fn field_count(&self) -> usize {
        self.content.iter().filter(|b| **b == FIELD_SEPARATOR).count() + 1
    }

    pub fn is_blank(&self) -> bool {
        self.content.iter().all(u8::is_ascii_whitespace)
    }
}

/// Accumulates bytes until a `\n` without assuming the file fits in memory.
///
/// A trailing `\r` is stripped so CR-LF files read like LF files.
pub struct LineReader<R> {
    inner: R,
    buffer: BytesMut,
    line_number: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(4096),
            line_number: 0,
        }
    }

    /// Number of lines returned so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn next_line(&mut self) -> io::Result<Option<Line<'_>>> {
        self.buffer.clear();
        let mut terminated = false;

        loop {
            let available = self.inner.fill_buf()?;
            if available.is_empty() {
                break;
            }
            if let Some(end) = available.iter().position(|b| *b == b'\n') {
                self.buffer.extend_from_slice(&available[..end]);
                self.inner.consume(end + 1);
                terminated = true;
                break;
            }
            let consumed = available.len();
            self.buffer.extend_from_slice(available);
            self.inner.consume(consumed);
        }

        if !terminated && self.buffer.is_empty() {
            return Ok(None);
        }
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.truncate(self.buffer.len() - 1);
        }

        self.line_number += 1;
        Ok(Some(Line {
            number: self.line_number,
            content: &self.buffer,
            terminated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn collect(input: &[u8]) -> Vec<(u64, String, bool)> {
        let mut reader = LineReader::new(Cursor::new(input.to_vec()));
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            lines.push((
                line.number,
                String::from_utf8(line.content.to_vec()).unwrap(),
                line.terminated,
            ));
        }
        lines
    }

    #[test]
    fn reads_terminated_lines() {
        assert_eq!(
            collect(b"a\tb\nc\td\n"),
            vec![(1, "a\tb".into(), true), (2, "c\td".into(), true)]
        );
    }

    #[test]
    fn flags_missing_terminator() {
        assert_eq!(
            collect(b"a\nb"),
            vec![(1, "a".into(), true), (2, "b".into(), false)]
        );
    }

    #[test]
    fn strips_carriage_returns() {
        assert_eq!(
            collect(b"a\r\nb\r\n"),
            vec![(1, "a".into(), true), (2, "b".into(), true)]
        );
    }

    #[test]
    fn keeps_empty_lines() {
        assert_eq!(
            collect(b"a\n\nb\n"),
            vec![
                (1, "a".into(), true),
                (2, String::new(), true),
                (3, "b".into(), true)
            ]
        );
    }

    #[test]
    fn empty_input_has_no_lines() {
        assert!(collect(b"").is_empty());
    }

    #[test]
    fn lines_longer_than_the_read_buffer() {
        let long = "x".repeat(20_000);
        let input = format!("{long}\nshort\n");
        let mut reader = LineReader::new(std::io::BufReader::with_capacity(
            64,
            Cursor::new(input.into_bytes()),
        ));

        let first = reader.next_line().unwrap().unwrap();
        assert_eq!(first.content.len(), 20_000);
        let second = reader.next_line().unwrap().unwrap();
        assert_eq!(second.content, b"short");
    }

    #[test]
    fn fields_split_on_tabs() {
        let line = Line {
            number: 2,
            content: b"DO1\t\tmale",
            terminated: true,
        };
        let fields: Vec<&[u8]> = line.fields().collect();
        assert_eq!(fields, vec![&b"DO1"[..], &b""[..], &b"male"[..]]);
        assert_eq!(line.field_count(), 3);
    }
}
