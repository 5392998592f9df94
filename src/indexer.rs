// src/indexer.rs
//
// Test declaration indexing.
//
// Guarantees:
// - Output order is file order, then line order, then column order
// - A file that cannot be read contributes no tests
// - The same lexer drives isolation, so descriptions agree byte-for-byte
//

use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, warn};

use crate::detectors::module_format::{classify, FormatProbe};
use crate::detectors::scanner::{first_unescaped, QuoteScanner};
use crate::logger;
use crate::state::{ModuleFormat, QuoteStyle, TestRecord};

/// One `callee(<literal>` occurrence on a physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Byte range of the callee identifier within its line.
    pub callee: Range<usize>,
    /// Raw literal text between the delimiters; escapes are kept as written.
    pub description: String,
    pub quote_style: QuoteStyle,
    /// False when the literal runs past the end of the line.
    pub closed: bool,
}

/* ============================================================
   Public entry
   ============================================================ */

pub fn index_files(
    files: &[PathBuf],
    callees: &[String],
    probe: &dyn FormatProbe,
) -> Vec<TestRecord> {
    if files.is_empty() {
        return Vec::new();
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(files.len());
    let chunk = files.len().div_ceil(workers);

    let mut records: Vec<TestRecord> = thread::scope(|s| {
        let handles: Vec<_> = files
            .chunks(chunk)
            .map(|batch| {
                s.spawn(move || {
                    batch
                        .iter()
                        .flat_map(|f| index_file(f, callees, probe))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_default())
            .collect()
    });

    records.sort_by(|a, b| a.file.cmp(&b.file).then(a.line_number.cmp(&b.line_number)));
    records
}

pub fn index_file(path: &Path, callees: &[String], probe: &dyn FormatProbe) -> Vec<TestRecord> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(target: logger::PROCESSOR, file = %path.display(), "skipping unreadable file: {e}");
            return Vec::new();
        }
    };

    let format = classify(path, &content, probe);
    let records = index_content(path, &content, format, callees);
    debug!(target: logger::PROCESSOR, file = %path.display(), tests = records.len(), %format, "indexed");
    records
}

pub fn index_content(
    path: &Path,
    content: &str,
    format: ModuleFormat,
    callees: &[String],
) -> Vec<TestRecord> {
    declarations(content, callees)
        .into_iter()
        .filter(|(_, d)| !d.description.is_empty())
        .map(|(line_idx, d)| TestRecord {
            file: path.to_path_buf(),
            description: d.description,
            quote_style: d.quote_style,
            line_number: line_idx + 1,
            module_format: format,
        })
        .collect()
}

/// Keeps the first record of every (file, description) pair.
pub fn dedupe(records: Vec<TestRecord>) -> Vec<TestRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.file.clone(), r.description.clone())))
        .collect()
}

/* ============================================================
   Declaration lexer
   ============================================================ */

/// Every declaration in `content`, keyed by 0-based line index.
pub fn declarations(content: &str, callees: &[String]) -> Vec<(usize, Declaration)> {
    let mut lexer = DeclarationLexer::new(callees);
    let mut out = Vec::new();

    for (idx, line) in content.split('\n').enumerate() {
        out.extend(lexer.next_line(line).into_iter().map(|d| (idx, d)));
    }

    out
}

/// Line-by-line declaration lexing with template state carried across lines.
/// Indexing and isolation both go through this, so they agree on every call.
pub struct DeclarationLexer<'a> {
    scanner: QuoteScanner,
    callees: &'a [String],
}

impl<'a> DeclarationLexer<'a> {
    pub fn new(callees: &'a [String]) -> Self {
        Self {
            scanner: QuoteScanner::new(),
            callees,
        }
    }

    /// Declarations on the next physical line. Callee ranges index into
    /// `line` itself.
    ///
    /// Only templates can span lines in JS, so ' and " state is not
    /// consulted. A line that starts inside a template is lexed from just
    /// after the backtick that closes it, or not at all if it stays open.
    pub fn next_line(&mut self, line: &str) -> Vec<Declaration> {
        let scan = self.scanner.advance(line);
        if !scan.started_in_backtick {
            return line_declarations(line, self.callees);
        }
        if self.scanner.state().in_backtick {
            return Vec::new();
        }

        let Some(close) = first_unescaped(line, '`') else {
            return Vec::new();
        };
        let offset = close + 1;
        line_declarations(&line[offset..], self.callees)
            .into_iter()
            .map(|mut d| {
                d.callee = d.callee.start + offset..d.callee.end + offset;
                d
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Lex {
    Code,
    Quoted(char),
    BlockComment,
}

pub fn line_declarations(line: &str, callees: &[String]) -> Vec<Declaration> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let byte = |i: usize| chars.get(i).map(|&(b, _)| b).unwrap_or(line.len());

    let mut found = Vec::new();
    let mut mode = Lex::Code;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;
        match mode {
            Lex::Quoted(q) => {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q {
                    mode = Lex::Code;
                }
                i += 1;
            }
            Lex::BlockComment => {
                if c == '*' && at(i + 1) == Some('/') {
                    mode = Lex::Code;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            Lex::Code => {
                if c == '/' && at(i + 1) == Some('/') {
                    break;
                }
                if c == '/' && at(i + 1) == Some('*') {
                    mode = Lex::BlockComment;
                    i += 2;
                    continue;
                }
                if QuoteStyle::from_char(c).is_some() {
                    mode = Lex::Quoted(c);
                    i += 1;
                    continue;
                }
                if !is_ident_start(c) {
                    i += 1;
                    continue;
                }

                let start = i;
                while at(i).is_some_and(is_ident_char) {
                    i += 1;
                }
                let ident = &line[byte(start)..byte(i)];
                let member = start > 0 && at(start - 1) == Some('.');
                if member || !callees.iter().any(|c| c == ident) {
                    continue;
                }

                if let Some((decl, next)) = call_literal(line, &chars, start, i) {
                    found.push(decl);
                    i = next;
                }
            }
        }
    }

    found
}

/// Parses `\s*(\s*<quote>literal` after a callee ending at char index `end`.
fn call_literal(
    line: &str,
    chars: &[(usize, char)],
    start: usize,
    end: usize,
) -> Option<(Declaration, usize)> {
    let byte = |i: usize| chars.get(i).map(|&(b, _)| b).unwrap_or(line.len());
    let skip_ws = |mut i: usize| {
        while chars.get(i).is_some_and(|&(_, c)| c.is_whitespace()) {
            i += 1;
        }
        i
    };

    let mut i = skip_ws(end);
    if chars.get(i).map(|&(_, c)| c) != Some('(') {
        return None;
    }
    i = skip_ws(i + 1);

    let quote = chars.get(i).map(|&(_, c)| c)?;
    let style = QuoteStyle::from_char(quote)?;
    let body = i + 1;

    let mut k = body;
    while k < chars.len() {
        match chars[k].1 {
            '\\' => k += 2,
            c if c == quote => {
                let decl = Declaration {
                    callee: byte(start)..byte(end),
                    description: line[byte(body)..byte(k)].to_string(),
                    quote_style: style,
                    closed: true,
                };
                return Some((decl, k + 1));
            }
            _ => k += 1,
        }
    }

    // Literal continues on the next line: keep the rest of this one.
    let decl = Declaration {
        callee: byte(start)..byte(end),
        description: line[byte(body).min(line.len())..].trim_end().to_string(),
        quote_style: style,
        closed: false,
    };
    Some((decl, chars.len()))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
