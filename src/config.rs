use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const PROJECT_FILE: &str = ".tt.toml";

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub runtime: String,
    pub patterns: Vec<String>,
    pub ignore_dirs: Vec<String>,
    pub callees: Vec<String>,
    pub temp_marker: String,
    pub threshold: f64,
    pub color: bool,
    pub editor_scheme: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: "node".into(),
            patterns: vec!["*.test.js".into(), "*.test.mjs".into(), "*.test.cjs".into()],
            ignore_dirs: vec!["node_modules".into(), ".git".into()],
            callees: vec!["test".into()],
            temp_marker: ".temp".into(),
            threshold: 0.4,
            color: true,
            editor_scheme: None,
        }
    }
}

/// On-disk shape; every key optional so layers can be stacked.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    runtime: Option<String>,
    patterns: Option<Vec<String>>,
    ignore_dirs: Option<Vec<String>>,
    callees: Option<Vec<String>>,
    temp_marker: Option<String>,
    threshold: Option<f64>,
    color: Option<bool>,
    editor_scheme: Option<String>,
}

impl Config {
    /// User config, then `<root>/.tt.toml`, then environment.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(path) = user_config_path() {
            if let Some(file) = read_layer(&path)? {
                cfg.apply(file);
            }
        }
        if let Some(file) = read_layer(&root.join(PROJECT_FILE))? {
            cfg.apply(file);
        }

        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(v) = file.runtime {
            self.runtime = v;
        }
        if let Some(v) = file.patterns {
            self.patterns = v;
        }
        if let Some(v) = file.ignore_dirs {
            self.ignore_dirs = v;
        }
        if let Some(v) = file.callees {
            self.callees = v;
        }
        if let Some(v) = file.temp_marker {
            self.temp_marker = v;
        }
        if let Some(v) = file.threshold {
            self.threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = file.color {
            self.color = v;
        }
        if let Some(v) = file.editor_scheme {
            self.editor_scheme = Some(v);
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(runtime) = var("TT_RUNTIME").filter(|v| !v.trim().is_empty()) {
            self.runtime = runtime;
        }
        if var("NO_COLOR").is_some() || var("NO_COLORS").is_some() {
            self.color = false;
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    let mut dir = dirs::config_dir()?;
    dir.push("targeted-test");
    dir.push("config.toml");
    Some(dir)
}

fn read_layer(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PROJECT_FILE),
            "runtime = \"bun\"\ncallees = [\"test\", \"it\"]\nthreshold = 2.0\n",
        )
        .unwrap();

        let mut cfg = Config::default();
        cfg.apply(read_layer(&dir.path().join(PROJECT_FILE)).unwrap().unwrap());

        assert_eq!(cfg.runtime, "bun");
        assert_eq!(cfg.callees, vec!["test", "it"]);
        assert_eq!(cfg.threshold, 1.0);
        assert_eq!(cfg.temp_marker, ".temp");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_layer(&dir.path().join("nope.toml")).unwrap().is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, "runtim = \"node\"\n").unwrap();
        assert!(matches!(read_layer(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn env_disables_color_and_sets_runtime() {
        let mut cfg = Config::default();
        cfg.apply_env(|key| match key {
            "NO_COLORS" => Some("1".into()),
            "TT_RUNTIME" => Some("deno".into()),
            _ => None,
        });
        assert!(!cfg.color);
        assert_eq!(cfg.runtime, "deno");
    }
}
