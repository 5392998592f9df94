//! detectors/module_format.rs
//!
//! Decides whether a test file runs as an ES module or a classic script.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::scanner::QuoteScanner;
use crate::logger;
use crate::state::ModuleFormat;

static HAS_IMPORT_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:import|export)\b").expect("valid regex"));

/// First opinion on a file's module system. May be wrong in either
/// direction; a negative answer is always re-checked against the content.
pub trait FormatProbe: Sync {
    fn is_esm(&self, path: &Path) -> bool;
}

/// Extension first, then the nearest `package.json` `"type"` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageJsonProbe;

impl FormatProbe for PackageJsonProbe {
    fn is_esm(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjs") => return true,
            Some("cjs") => return false,
            _ => {}
        }

        for dir in path.ancestors().skip(1) {
            let manifest = dir.join("package.json");
            let Ok(raw) = fs::read_to_string(&manifest) else {
                continue;
            };
            let Ok(pkg) = serde_json::from_str::<Value>(&raw) else {
                return false;
            };
            return pkg.get("type").and_then(Value::as_str) == Some("module");
        }

        false
    }
}

pub fn classify(path: &Path, content: &str, probe: &dyn FormatProbe) -> ModuleFormat {
    if probe.is_esm(path) {
        debug!(target: logger::PROCESSOR, file = %path.display(), "probe reports esm");
        return ModuleFormat::Esm;
    }

    let esm = content_is_esm(content);
    debug!(target: logger::PROCESSOR, file = %path.display(), esm, "content scan");
    ModuleFormat::from_esm(esm)
}

/// True when some line outside every string region starts with an
/// `import ` or `export ` statement.
pub fn content_is_esm(content: &str) -> bool {
    if !HAS_IMPORT_EXPORT.is_match(content) {
        return false;
    }

    let mut scanner = QuoteScanner::new();
    for line in content.lines() {
        if scanner.advance(line).started_in_string {
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("import ") || trimmed.starts_with("export ") {
            return true;
        }
    }

    false
}
