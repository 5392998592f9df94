use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ExecError;
use crate::indexer::DeclarationLexer;
use crate::lifecycle::ArtifactTracker;
use crate::logger;
use crate::state::{Artifact, ModuleFormat};

const EXCLUSIVE_SUFFIX: &str = ".only";

/// Builds single-test copies of a source file.
#[derive(Debug, Clone)]
pub struct Isolator {
    callees: Vec<String>,
    temp_marker: String,
}

impl Isolator {
    pub fn new(callees: Vec<String>, temp_marker: impl Into<String>) -> Self {
        Self {
            callees,
            temp_marker: temp_marker.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.callees.clone(), cfg.temp_marker.clone())
    }

    /// Switches every declaration titled `description` to its exclusive
    /// form. Everything else is copied through untouched.
    pub fn isolate(&self, content: &str, description: &str) -> String {
        let mut lexer = DeclarationLexer::new(&self.callees);
        let mut lines = Vec::new();

        for line in content.split('\n') {
            let hits: Vec<_> = lexer
                .next_line(line)
                .into_iter()
                .filter(|d| d.description == description)
                .collect();

            if hits.is_empty() {
                lines.push(line.to_string());
                continue;
            }

            let mut rewritten = String::with_capacity(line.len() + hits.len() * EXCLUSIVE_SUFFIX.len());
            let mut last = 0;
            for d in hits {
                rewritten.push_str(&line[last..d.callee.end]);
                rewritten.push_str(EXCLUSIVE_SUFFIX);
                last = d.callee.end;
            }
            rewritten.push_str(&line[last..]);
            lines.push(rewritten);
        }

        lines.join("\n")
    }

    /// `<stem><marker>-<id>.<ext>` next to `source`, fresh per call.
    pub fn artifact_path(&self, source: &Path, format: ModuleFormat) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("test");
        let id = Uuid::new_v4().simple().to_string();
        let name = format!("{stem}{}-{}.{}", self.temp_marker, &id[..8], format.extension());
        source.with_file_name(name)
    }

    /// Writes `content` as a tracked artifact. The file is never on disk
    /// untracked, and a failed write is cleaned up before the error returns.
    pub fn write_artifact(
        &self,
        source: &Path,
        content: &str,
        format: ModuleFormat,
        tracker: &ArtifactTracker,
    ) -> Result<Artifact, ExecError> {
        let artifact = Artifact {
            path: self.artifact_path(source, format),
            format,
            owner_file: source.to_path_buf(),
        };

        debug!(target: logger::PROCESSOR, path = %artifact.path.display(), "creating temporary file");
        tracker
            .create(&artifact, |path| fs::write(path, content))
            .map_err(|source| ExecError::Io {
                path: artifact.path.clone(),
                source,
            })?;

        Ok(artifact)
    }
}

impl Default for Isolator {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Isolation with the default `test` callee.
pub fn isolate(content: &str, description: &str) -> String {
    Isolator::default().isolate(content, description)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "const { test } = require('uvu')\n\ntest('test one', () => {})\ntest(\"test two\", () => {})\ntest(`test three`, () => {})\n\ntest.run()\n";

    #[test]
    fn only_the_target_is_made_exclusive() {
        let out = isolate(SRC, "test two");
        assert!(out.contains("test.only(\"test two\""));
        assert!(out.contains("test('test one'"));
        assert!(out.contains("test(`test three`"));
        assert_eq!(out.matches(".only(").count(), 1);
    }

    #[test]
    fn every_quote_style_is_recognised() {
        assert!(isolate(SRC, "test one").contains("test.only('test one'"));
        assert!(isolate(SRC, "test three").contains("test.only(`test three`"));
    }

    #[test]
    fn unknown_description_is_a_no_op() {
        assert_eq!(isolate(SRC, "missing"), SRC);
    }

    #[test]
    fn repeatable_and_stable_on_its_own_output() {
        let once = isolate(SRC, "test one");
        assert_eq!(once, isolate(SRC, "test one"));
        assert_eq!(isolate(&once, "test one"), once);
    }

    #[test]
    fn prefix_titles_are_not_confused() {
        let src = "test('login', f)\ntest('login twice', g)\n";
        let out = isolate(src, "login");
        assert_eq!(out, "test.only('login', f)\ntest('login twice', g)\n");
    }

    #[test]
    fn declaration_after_a_closing_template_is_isolated() {
        let src = "const fixture = `\ntest('inside', f)\n`; test('real one', f)\n";
        let out = isolate(src, "real one");
        assert_eq!(out, "const fixture = `\ntest('inside', f)\n`; test.only('real one', f)\n");
        assert_eq!(isolate(src, "inside"), src);
    }

    #[test]
    fn crlf_lines_survive() {
        let src = "test('a', f)\r\ntest('b', g)\r\n";
        assert_eq!(isolate(src, "b"), "test('a', f)\r\ntest.only('b', g)\r\n");
    }

    #[test]
    fn artifact_name_keeps_stem_and_marker() {
        let iso = Isolator::default();
        let p = iso.artifact_path(Path::new("/x/login.test.js"), ModuleFormat::Script);
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("login.test.temp-"));
        assert!(name.ends_with(".cjs"));
        assert_eq!(p.parent(), Some(Path::new("/x")));

        let esm = iso.artifact_path(Path::new("/x/login.test.js"), ModuleFormat::Esm);
        assert!(esm.to_str().unwrap().ends_with(".mjs"));
        assert_ne!(p, iso.artifact_path(Path::new("/x/login.test.js"), ModuleFormat::Script));
    }
}
