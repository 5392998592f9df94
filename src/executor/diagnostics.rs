//! executor/diagnostics.rs
//!
//! Reads the runtime's own error text to decide what went wrong.

use std::sync::LazyLock;

use regex::Regex;

use crate::state::FailureKind;

/// Runtime messages that mean "wrong module system", not "broken test".
const FORMAT_MISMATCH: &[&str] = &[
    "Cannot use import statement outside a module",
    "require is not defined in ES module scope",
    "exports is not defined in ES module scope",
    "module is not defined in ES module scope",
    "__dirname is not defined in ES module scope",
    "__filename is not defined in ES module scope",
    "ERR_REQUIRE_ESM",
    "Unexpected token 'export'",
    "Cannot use 'import.meta' outside a module",
];

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").expect("valid regex")
});

static MISSING_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Cannot find (?:module|package) '([^']+)'").expect("valid regex")
});

static TEST_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AssertionError|ERR_ASSERTION|Assertion failed|\bFAIL\b|✘").expect("valid regex")
});

/// Removes colour codes and terminal hyperlink wrappers, keeping link text.
pub fn strip_ansi(s: &str) -> String {
    ANSI.replace_all(s, "").into_owned()
}

pub fn is_format_mismatch(stderr: &str) -> bool {
    let clean = strip_ansi(stderr);
    FORMAT_MISMATCH.iter().any(|sig| clean.contains(sig))
}

pub fn missing_module(stderr: &str) -> Option<String> {
    let clean = strip_ansi(stderr);
    if let Some(name) = MISSING_MODULE.captures(&clean).and_then(|c| c.get(1)) {
        return Some(name.as_str().to_string());
    }
    // Bare error code with no quoted name.
    clean
        .contains("ERR_MODULE_NOT_FOUND")
        .then(|| "unknown".to_string())
}

/// Evidence that the test itself ran and failed.
pub fn has_test_failure(stdout: &str, stderr: &str) -> bool {
    TEST_FAILURE.is_match(&strip_ansi(stderr)) || TEST_FAILURE.is_match(&strip_ansi(stdout))
}

pub fn classify(exit_code: i32, stderr: &str) -> Option<FailureKind> {
    if exit_code == 0 {
        return None;
    }
    if is_format_mismatch(stderr) {
        return Some(FailureKind::ModuleFormatMismatch);
    }
    if let Some(name) = missing_module(stderr) {
        return Some(FailureKind::ModuleNotFound { name });
    }
    Some(FailureKind::TestFailure { exit_code })
}

/// Last `n` non-empty lines, for compact summaries.
pub fn tail(text: &str, n: usize) -> Vec<String> {
    let clean = strip_ansi(text);
    let lines: Vec<&str> = clean.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_failure() {
        assert_eq!(classify(0, "ExperimentalWarning: something"), None);
    }

    #[test]
    fn import_in_script_mode_is_mismatch() {
        let err = "/x/a.test.temp-1.cjs:1\nimport { test } from 'uvu'\n^^^^^^\n\nSyntaxError: Cannot use import statement outside a module\n";
        assert_eq!(classify(1, err), Some(FailureKind::ModuleFormatMismatch));
    }

    #[test]
    fn require_in_module_mode_is_mismatch() {
        let err = "ReferenceError: require is not defined in ES module scope, you can use import instead";
        assert_eq!(classify(1, err), Some(FailureKind::ModuleFormatMismatch));
    }

    #[test]
    fn missing_dependency_names_the_module() {
        let err = "Error: Cannot find module 'uvu/assert'\nRequire stack:\n- /x/a.test.js";
        assert_eq!(
            classify(1, err),
            Some(FailureKind::ModuleNotFound {
                name: "uvu/assert".into()
            })
        );

        let esm = "Error [ERR_MODULE_NOT_FOUND]: Cannot find package 'uvu' imported from /x/a.mjs";
        assert_eq!(missing_module(esm).as_deref(), Some("uvu"));
        assert_eq!(missing_module("code: 'ERR_MODULE_NOT_FOUND'").as_deref(), Some("unknown"));
    }

    #[test]
    fn anything_else_is_a_test_failure() {
        assert_eq!(
            classify(3, "AssertionError: expected 11 to equal 1"),
            Some(FailureKind::TestFailure { exit_code: 3 })
        );
    }

    #[test]
    fn colour_codes_do_not_hide_signatures() {
        let err = "\x1b[31mSyntaxError\x1b[39m: Cannot use import \x1b[1m\x1b[22mstatement outside a module";
        assert!(is_format_mismatch(err));
        assert_eq!(strip_ansi("\x1b]8;;cursor://file/a:1:1\x1b\\a:1\x1b]8;;\x1b\\"), "a:1");
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\n\nb\nc\n", 2), vec!["b", "c"]);
    }
}
