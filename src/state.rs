use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/* ---------- discovery ---------- */

/// Delimiter that wrapped a test description in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    Single,
    Double,
    Backtick,
}

impl QuoteStyle {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '\'' => Some(QuoteStyle::Single),
            '"' => Some(QuoteStyle::Double),
            '`' => Some(QuoteStyle::Backtick),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFormat {
    Esm,
    Script,
}

impl ModuleFormat {
    pub fn from_esm(esm: bool) -> Self {
        if esm {
            ModuleFormat::Esm
        } else {
            ModuleFormat::Script
        }
    }

    /// Extension that forces the runtime into this module system.
    pub fn extension(self) -> &'static str {
        match self {
            ModuleFormat::Esm => "mjs",
            ModuleFormat::Script => "cjs",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ModuleFormat::Esm => ModuleFormat::Script,
            ModuleFormat::Script => ModuleFormat::Esm,
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleFormat::Esm => "esm",
            ModuleFormat::Script => "script",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    pub file: PathBuf,
    pub description: String,
    pub quote_style: QuoteStyle,
    /// 1-based.
    pub line_number: usize,
    pub module_format: ModuleFormat,
}

/* ---------- matching ---------- */

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub record: TestRecord,
    /// Lower is better.
    pub score: f64,
    pub is_exact_match: bool,
    pub has_prefix_collision: bool,
}

/* ---------- execution ---------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    ModuleFormatMismatch,
    ModuleNotFound { name: String },
    TestFailure { exit_code: i32 },
    SpawnError { message: String },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotFound => f.write_str("file not found"),
            FailureKind::ModuleFormatMismatch => f.write_str("module format mismatch"),
            FailureKind::ModuleNotFound { name } => write!(f, "cannot find module '{name}'"),
            FailureKind::TestFailure { exit_code } => write!(f, "test failed (exit {exit_code})"),
            FailureKind::SpawnError { message } => write!(f, "could not start runtime: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub failure_kind: Option<FailureKind>,
    /// stderr of an earlier attempt, kept when a retry failed as well.
    pub carried_diagnostic: Option<String>,
    pub attempts: usize,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.success
    }

    pub fn failed(exit_code: i32, stdout: String, stderr: String, kind: FailureKind) -> Self {
        Self {
            exit_code,
            success: false,
            stdout,
            stderr,
            failure_kind: Some(kind),
            carried_diagnostic: None,
            attempts: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: ModuleFormat,
    pub owner_file: PathBuf,
}
