//! detectors/scanner.rs
//!
//! Line-oriented quote tracking.
//!
//! This is a parity heuristic, not a lexer: each line toggles a region's
//! state when it holds an odd number of unescaped delimiters. A line with an
//! odd count split across several logical strings can desynchronize it.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    pub in_single_quote: bool,
    pub in_double_quote: bool,
    pub in_backtick: bool,
    pub backtick_depth: usize,
}

impl ScanState {
    pub fn in_string(&self) -> bool {
        self.in_single_quote || self.in_double_quote || self.in_backtick
    }
}

/// What the scanner knew about the start of a line before consuming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineScan {
    pub started_in_string: bool,
    pub started_in_backtick: bool,
}

#[derive(Debug, Default)]
pub struct QuoteScanner {
    state: ScanState,
}

impl QuoteScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn advance(&mut self, line: &str) -> LineScan {
        let before = self.state;

        for _ in 0..count_unescaped(line, '`') {
            if !self.state.in_backtick {
                self.state.backtick_depth += 1;
                self.state.in_backtick = true;
            } else {
                self.state.backtick_depth = self.state.backtick_depth.saturating_sub(1);
                self.state.in_backtick = self.state.backtick_depth > 0;
            }
        }

        // Template bodies may hold bare ' and " freely.
        if !self.state.in_backtick {
            if count_unescaped(line, '\'') % 2 == 1 {
                self.state.in_single_quote = !self.state.in_single_quote;
            }
            if count_unescaped(line, '"') % 2 == 1 {
                self.state.in_double_quote = !self.state.in_double_quote;
            }
        }

        LineScan {
            started_in_string: before.in_string(),
            started_in_backtick: before.in_backtick,
        }
    }
}

/// Occurrences of `delim` not immediately preceded by a backslash.
pub fn count_unescaped(line: &str, delim: char) -> usize {
    let mut prev = None;
    let mut count = 0;
    for c in line.chars() {
        if c == delim && prev != Some('\\') {
            count += 1;
        }
        prev = Some(c);
    }
    count
}

/// Byte index of the first `delim` not immediately preceded by a backslash.
pub fn first_unescaped(line: &str, delim: char) -> Option<usize> {
    let mut prev = None;
    for (i, c) in line.char_indices() {
        if c == delim && prev != Some('\\') {
            return Some(i);
        }
        prev = Some(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_unescaped_skips_escaped_ones() {
        assert_eq!(first_unescaped(r"a \` b ` c", '`'), Some(7));
        assert_eq!(first_unescaped("none here", '`'), None);
    }

    #[test]
    fn escaped_delimiters_are_not_counted() {
        assert_eq!(count_unescaped(r#"a \" b " c"#, '"'), 1);
        assert_eq!(count_unescaped(r"\`x\`", '`'), 0);
        assert_eq!(count_unescaped("'a' 'b'", '\''), 4);
    }

    #[test]
    fn template_spanning_lines_marks_following_lines() {
        let mut s = QuoteScanner::new();
        assert!(!s.advance("const one = `").started_in_string);
        let inner = s.advance("import {foo} from 'lodash'");
        assert!(inner.started_in_string);
        assert!(inner.started_in_backtick);
        assert!(s.advance("`").started_in_backtick);
        assert!(!s.advance("next()").started_in_string);
    }

    #[test]
    fn quotes_inside_template_do_not_toggle() {
        let mut s = QuoteScanner::new();
        s.advance("const a = `");
        s.advance("it's a trap \"");
        s.advance("`");
        assert_eq!(s.state(), ScanState::default());
    }

    #[test]
    fn balanced_lines_leave_state_untouched() {
        let mut s = QuoteScanner::new();
        s.advance("test('one', () => {");
        s.advance(r#"  assert.is("a", `b`)"#);
        assert!(!s.state().in_string());
    }

    #[test]
    fn odd_quote_count_flips_state() {
        let mut s = QuoteScanner::new();
        s.advance("const x = 'unterminated");
        assert!(s.state().in_single_quote);
        assert!(s.advance("rest'").started_in_string);
        assert!(!s.state().in_single_quote);
    }
}
