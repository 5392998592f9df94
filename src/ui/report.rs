//! ui/report.rs
//!
//! Plain terminal output: run banners, listings and the final summary.

use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use crossterm::style::{Color, Stylize};
use serde::Serialize;

use crate::config::Config;
use crate::executor::batch::BatchSummary;
use crate::executor::diagnostics;
use crate::state::{MatchResult, ModuleFormat, QuoteStyle, TestRecord};

const DIAGNOSTIC_LINES: usize = 6;

#[derive(Debug, Serialize)]
struct ListingEntry<'a> {
    file: String,
    line: usize,
    description: &'a str,
    quote_style: QuoteStyle,
    module_format: ModuleFormat,
    score: f64,
    exact: bool,
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    generated_at: String,
    query: Option<&'a str>,
    tests: Vec<ListingEntry<'a>>,
}

pub struct Reporter {
    color: bool,
    editor_scheme: Option<String>,
    cwd: PathBuf,
}

impl Reporter {
    pub fn new(color: bool, editor_scheme: Option<String>) -> Self {
        Self {
            color,
            editor_scheme,
            cwd: env::current_dir().unwrap_or_default(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.color, cfg.editor_scheme.clone())
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// `./relative/path` when under the working directory.
    pub fn nice_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.cwd) {
            Ok(rel) => format!("./{}", rel.display()),
            Err(_) => path.display().to_string(),
        }
    }

    /// `path:line`, wrapped in an editor hyperlink when a scheme is set.
    pub fn location(&self, record: &TestRecord) -> String {
        let display = format!("{}:{}", self.nice_path(&record.file), record.line_number);
        let Some(scheme) = &self.editor_scheme else {
            return display;
        };

        let abs = if record.file.is_absolute() {
            record.file.clone()
        } else {
            self.cwd.join(&record.file)
        };
        let url = format!("{scheme}://file{}:{}:1", abs.display(), record.line_number);
        format!("\x1b]8;;{url}\x1b\\{}\x1b]8;;\x1b\\", self.paint(&display, Color::Cyan))
    }

    pub fn choice_title(&self, record: &TestRecord) -> String {
        format!("{}  {}:{}", record.description, self.nice_path(&record.file), record.line_number)
    }

    pub fn running(&self, record: &TestRecord) -> String {
        format!(
            "Running test: \"{}\" in {}",
            self.paint(&record.description, Color::Yellow),
            self.nice_path(&record.file)
        )
    }

    pub fn listing(&self, matches: &[MatchResult]) -> String {
        matches
            .iter()
            .map(|m| {
                format!(
                    "{}  {}  [{}]",
                    self.location(&m.record),
                    m.record.description,
                    m.record.module_format
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn listing_json(&self, query: Option<&str>, matches: &[MatchResult]) -> serde_json::Result<String> {
        let listing = Listing {
            generated_at: Utc::now().to_rfc3339(),
            query,
            tests: matches
                .iter()
                .map(|m| ListingEntry {
                    file: self.nice_path(&m.record.file),
                    line: m.record.line_number,
                    description: &m.record.description,
                    quote_style: m.record.quote_style,
                    module_format: m.record.module_format,
                    score: m.score,
                    exact: m.is_exact_match,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&listing)
    }

    pub fn summary(&self, batch: &BatchSummary) -> String {
        let passed = batch.passed();
        let failed = batch.entries.len() - passed;
        let mut out = vec![format!(
            "{}  {}",
            self.paint(&format!("✔ {passed} passed"), Color::Green),
            if failed > 0 {
                self.paint(&format!("✘ {failed} failed"), Color::Red)
            } else {
                format!("✘ {failed} failed")
            }
        )];

        if failed > 0 {
            out.push(String::new());
            out.push(self.paint("Failed tests:", Color::Red));
        }

        for entry in batch.failures() {
            let kind = entry
                .outcome
                .failure_kind
                .as_ref()
                .map(|k| k.to_string())
                .unwrap_or_else(|| format!("exit {}", entry.outcome.exit_code));
            out.push(format!(
                "  {}  \"{}\"  ({kind})",
                self.location(&entry.record),
                entry.record.description
            ));

            for line in diagnostics::tail(&entry.outcome.stderr, DIAGNOSTIC_LINES) {
                out.push(format!("      {line}"));
            }
            if let Some(first) = &entry.outcome.carried_diagnostic {
                out.push("      first attempt:".to_string());
                for line in diagnostics::tail(first, DIAGNOSTIC_LINES) {
                    out.push(format!("      {line}"));
                }
            }
        }

        if let Some(fatal) = &batch.fatal {
            out.push(String::new());
            out.push(self.paint(&format!("Stopped: {fatal}"), Color::Red));
        }

        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::batch::BatchEntry;
    use crate::state::{ExecutionOutcome, FailureKind};

    fn record(file: &str, line: usize) -> TestRecord {
        TestRecord {
            file: PathBuf::from(file),
            description: "login works".into(),
            quote_style: QuoteStyle::Single,
            line_number: line,
            module_format: ModuleFormat::Script,
        }
    }

    #[test]
    fn paths_are_shown_relative_to_cwd() {
        let r = Reporter::new(false, None).with_cwd("/repo");
        assert_eq!(r.nice_path(Path::new("/repo/tests/a.test.js")), "./tests/a.test.js");
        assert_eq!(r.nice_path(Path::new("/elsewhere/a.test.js")), "/elsewhere/a.test.js");
    }

    #[test]
    fn location_is_line_addressed() {
        let r = Reporter::new(false, None).with_cwd("/repo");
        assert_eq!(r.location(&record("/repo/a.test.js", 7)), "./a.test.js:7");
    }

    #[test]
    fn editor_scheme_wraps_in_hyperlink() {
        let r = Reporter::new(false, Some("cursor".into())).with_cwd("/repo");
        let link = r.location(&record("/repo/a.test.js", 7));
        assert!(link.starts_with("\x1b]8;;cursor://file/repo/a.test.js:7:1\x1b\\"));
        assert_eq!(diagnostics::strip_ansi(&link), "./a.test.js:7");
    }

    #[test]
    fn summary_lists_failures_with_locations() {
        let r = Reporter::new(false, None).with_cwd("/repo");
        let batch = BatchSummary {
            entries: vec![BatchEntry {
                record: record("/repo/a.test.js", 3),
                outcome: ExecutionOutcome::failed(
                    1,
                    String::new(),
                    "AssertionError: nope\n".into(),
                    FailureKind::TestFailure { exit_code: 1 },
                ),
            }],
            fatal: None,
            exit_code: 1,
        };

        let text = r.summary(&batch);
        assert!(text.contains("✔ 0 passed"));
        assert!(text.contains("✘ 1 failed"));
        assert!(text.contains("./a.test.js:3  \"login works\"  (test failed (exit 1))"));
        assert!(text.contains("AssertionError: nope"));
    }

    #[test]
    fn json_listing_is_parseable() {
        let r = Reporter::new(false, None).with_cwd("/repo");
        let m = MatchResult {
            record: record("/repo/a.test.js", 2),
            score: 0.0,
            is_exact_match: true,
            has_prefix_collision: false,
        };
        let raw = r.listing_json(Some("login works"), &[m]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["tests"][0]["line"], 2);
        assert_eq!(v["tests"][0]["module_format"], "script");
        assert_eq!(v["query"], "login works");
    }
}
