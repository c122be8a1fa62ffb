//! Cursor scanner for one tracking datagram's ASCII text.
//!
//! The wire format is line-oriented: a label word followed by space-separated
//! scalars and `[v1 v2 ...]` blocks of typed values. The scanner walks one
//! packet with a byte cursor and never allocates except for parsed blocks.
//!
//! Failures are packet-local: a malformed block advances the cursor to the
//! next `]` (bounded skip) and reports an error with the cursor offset, so
//! the caller can log it and abort the current packet without affecting the
//! process.

use std::fmt;
use tracing::warn;

/// Scan failure with enough context for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanError {
    /// Byte offset into the packet text where scanning gave up.
    pub offset: usize,
    /// Shape that was expected at the offset.
    pub expected: &'static str,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} at offset {}", self.expected, self.offset)
    }
}

/// Values parsed out of one `[...]` block, in format-string order.
///
/// Integers and doubles are kept in separate sequences, each indexed by
/// their position among values of the same type (mirroring the `i`/`d`
/// codes of the format string).
#[derive(Debug, Default)]
pub(crate) struct Block {
    ints: Vec<i64>,
    floats: Vec<f64>,
}

impl Block {
    pub fn int(&self, index: usize) -> i64 {
        self.ints[index]
    }

    pub fn float(&self, index: usize) -> f64 {
        self.floats[index]
    }

    pub fn ints(&self) -> &[i64] {
        &self.ints
    }

    pub fn floats(&self) -> &[f64] {
        &self.floats
    }
}

/// Character-cursor scanner over one packet's text.
pub(crate) struct Scanner<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text: text.as_bytes(), pos: 0 }
    }

    /// Current byte offset into the packet.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Advance past the current line's terminator and any following blank
    /// space. Returns `false` at end of input.
    pub fn next_line(&mut self) -> bool {
        while self.pos < self.text.len() && !matches!(self.text[self.pos], b'\r' | b'\n') {
            self.pos += 1;
        }
        while self.pos < self.text.len() && matches!(self.text[self.pos], b'\r' | b'\n' | b' ') {
            self.pos += 1;
        }
        self.pos < self.text.len()
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    /// Next ASCII word, delimited by space or line end.
    pub fn next_word(&mut self) -> Result<&'a str, ScanError> {
        self.skip_spaces();

        let start = self.pos;
        while self.pos < self.text.len() && !matches!(self.text[self.pos], b' ' | b'\r' | b'\n') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(ScanError { offset: self.pos, expected: "word" });
        }

        // The input is ASCII by protocol; the cursor only stops on ASCII
        // delimiters, so the slice boundaries are valid UTF-8.
        Ok(std::str::from_utf8(&self.text[start..self.pos])
            .map_err(|_| ScanError { offset: start, expected: "ascii word" })?)
    }

    /// Next integer value; accepts a leading `-`, requires at least one digit.
    pub fn next_int(&mut self) -> Result<i64, ScanError> {
        self.skip_spaces();

        let mut neg = false;
        if self.pos < self.text.len() && self.text[self.pos] == b'-' {
            neg = true;
            self.pos += 1;
        }

        let start = self.pos;
        let mut val: i64 = 0;
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_digit() {
            val = val.saturating_mul(10).saturating_add((self.text[self.pos] - b'0') as i64);
            self.pos += 1;
        }
        if self.pos == start {
            return Err(ScanError { offset: self.pos, expected: "integer" });
        }

        Ok(if neg { -val } else { val })
    }

    /// Next double value, delimited by space, `]` or line end.
    ///
    /// Parsed with the host's shortest-accurate decimal parser; the decimal
    /// point is `.` regardless of locale.
    pub fn next_double(&mut self) -> Result<f64, ScanError> {
        self.skip_spaces();

        let start = self.pos;
        while self.pos < self.text.len()
            && !matches!(self.text[self.pos], b' ' | b']' | b'\r' | b'\n')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(ScanError { offset: self.pos, expected: "double" });
        }

        std::str::from_utf8(&self.text[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or(ScanError { offset: start, expected: "double" })
    }

    /// Advance to the next `]` without consuming it (failure recovery).
    fn skip_to_block_end(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos] != b']' {
            self.pos += 1;
        }
    }

    /// Parse a `[...]` block whose member types are declared by a format
    /// string of `i` (integer) and `d` (double) codes in order.
    ///
    /// On any missing `[`, missing value or wrong type the cursor is still
    /// advanced to the next `]` and an error is returned; the failure is
    /// local to the current packet.
    pub fn parse_block(&mut self, format: &str) -> Result<Block, ScanError> {
        self.skip_spaces();

        if self.pos >= self.text.len() || self.text[self.pos] != b'[' {
            let offset = self.pos;
            self.skip_to_block_end();
            warn!(offset, "skipped block (no square bracket found)");
            return Err(ScanError { offset, expected: "block" });
        }
        self.pos += 1;

        let mut block = Block::default();
        for code in format.chars() {
            match code {
                'i' => match self.next_int() {
                    Ok(v) => block.ints.push(v),
                    Err(e) => {
                        self.skip_to_block_end();
                        warn!(offset = e.offset, "skipped block (int not found)");
                        return Err(e);
                    }
                },
                'd' => match self.next_double() {
                    Ok(v) => block.floats.push(v),
                    Err(e) => {
                        self.skip_to_block_end();
                        warn!(offset = e.offset, "skipped block (double not found)");
                        return Err(e);
                    }
                },
                _ => {
                    let offset = self.pos;
                    self.skip_to_block_end();
                    warn!(code = %code, "skipped block (undefined format code)");
                    return Err(ScanError { offset, expected: "format code" });
                }
            }
        }

        self.skip_to_block_end();
        if self.pos < self.text.len() {
            self.pos += 1; // consume ']'
        }

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn words_and_lines() {
        let mut scan = Scanner::new("fr 42\r\nts 1.5\r\n");
        assert_eq!(scan.next_word().unwrap(), "fr");
        assert_eq!(scan.next_int().unwrap(), 42);
        assert!(scan.next_line());
        assert_eq!(scan.next_word().unwrap(), "ts");
        assert!((scan.next_double().unwrap() - 1.5).abs() < f64::EPSILON);
        assert!(!scan.next_line());
    }

    #[test]
    fn tokens_at_end_of_input_succeed() {
        // Packets are not required to carry a trailing line terminator.
        let mut scan = Scanner::new("ts 1.5");
        assert_eq!(scan.next_word().unwrap(), "ts");
        assert_eq!(scan.next_double().unwrap(), 1.5);

        let mut scan = Scanner::new("fr 42");
        assert_eq!(scan.next_word().unwrap(), "fr");
        assert_eq!(scan.next_int().unwrap(), 42);
    }

    #[test]
    fn empty_input_fails_observably() {
        let mut scan = Scanner::new("");
        let err = scan.next_word().unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(!scan.next_line());
    }

    #[test]
    fn negative_integers() {
        let mut scan = Scanner::new("-17");
        assert_eq!(scan.next_int().unwrap(), -17);
    }

    #[test]
    fn missing_digits_fail() {
        let mut scan = Scanner::new("abc");
        assert!(scan.next_int().is_err());
    }

    #[test]
    fn block_with_mixed_format() {
        let mut scan = Scanner::new("[3 -0.57 12.25]");
        let block = scan.parse_block("idd").unwrap();
        assert_eq!(block.int(0), 3);
        assert_eq!(block.float(0), -0.57);
        assert_eq!(block.float(1), 12.25);
    }

    #[test]
    fn block_without_bracket_skips_to_close() {
        let mut scan = Scanner::new("1 2] [5 0.5]");
        assert!(scan.parse_block("id").is_err());
        // Cursor sits on the `]`; the enclosing line decoder aborts the
        // packet, so only the skip bound matters here.
        assert_eq!(scan.offset(), 3);
    }

    #[test]
    fn block_with_wrong_type_skips_to_close() {
        let mut scan = Scanner::new("[x 1.0] trailing");
        assert!(scan.parse_block("id").is_err());
        assert_eq!(scan.offset(), 6);
    }

    #[test]
    fn consecutive_blocks() {
        let mut scan = Scanner::new("[0 1.0] [10.0 20.0 30.0]");
        let b1 = scan.parse_block("id").unwrap();
        let b2 = scan.parse_block("ddd").unwrap();
        assert_eq!(b1.int(0), 0);
        assert_eq!(b2.floats(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn value_flush_against_bracket() {
        let mut scan = Scanner::new("[7 0.25]");
        let block = scan.parse_block("id").unwrap();
        assert_eq!(block.int(0), 7);
        assert_eq!(block.float(0), 0.25);
    }

    proptest! {
        #[test]
        fn int_roundtrip(v in -1_000_000i64..1_000_000i64) {
            let text = v.to_string();
            let mut scan = Scanner::new(&text);
            prop_assert_eq!(scan.next_int().unwrap(), v);
        }

        #[test]
        fn double_roundtrip(v in -1e9f64..1e9f64) {
            let text = format!("{v:.6}");
            let mut scan = Scanner::new(&text);
            let parsed = scan.next_double().unwrap();
            prop_assert!((parsed - text.parse::<f64>().unwrap()).abs() < f64::EPSILON);
        }

        #[test]
        fn block_roundtrip(ints in prop::collection::vec(-1000i64..1000i64, 0..6),
                           floats in prop::collection::vec(-1e3f64..1e3f64, 0..6)) {
            let mut format = String::new();
            let mut body = Vec::new();
            for v in &ints {
                format.push('i');
                body.push(v.to_string());
            }
            for v in &floats {
                format.push('d');
                body.push(format!("{v:.4}"));
            }
            let text = format!("[{}]", body.join(" "));
            let mut scan = Scanner::new(&text);
            let block = scan.parse_block(&format).unwrap();
            prop_assert_eq!(block.ints(), ints.as_slice());
            for (parsed, original) in block.floats().iter().zip(&floats) {
                prop_assert!((parsed - original).abs() < 1e-3);
            }
        }
    }
}
