//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--mode`, `--full-load`, `--ignore`, etc.)
//! 2. Explicit `--config <file>`
//! 3. `$MDASM_CONFIG` environment variable (path to config file)
//! 4. Project-local `.mdasm.toml` in the current working directory
//! 5. Global `~/.config/mdasm/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::output::{
    OutputMode, OutputOptions, DEFAULT_LARGE_FILE_BYTES, DEFAULT_LARGE_FILE_LINES,
    DEFAULT_YIELD_EVERY,
};

// ── Section configs ──────────────────────────────────────────────────────────

/// Tree building settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Enumerate collapsed directories during the initial walk.
    pub full_load: Option<bool>,
    /// Read `.gitignore` from the root.
    pub use_gitignore: Option<bool>,
    /// Extra ignore patterns, appended after `.gitignore` patterns.
    pub ignore: Option<Vec<String>>,
}

/// Output settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// "minimal", "compact" or "full".
    pub mode: Option<String>,
    /// Processed files between cooperative yields.
    pub yield_every: Option<usize>,
    /// Full mode warns above this many lines.
    pub large_file_lines: Option<usize>,
    /// Full mode warns above this many bytes.
    pub large_file_bytes: Option<u64>,
    /// Directory that receives `<root>_context.md`.
    pub directory: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub tree: TreeConfig,
    pub output: OutputConfig,
}

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("MDASM_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".mdasm.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("mdasm").join("config.toml"));
    }

    paths
}

/// Read and parse a TOML config file.
fn parse_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str::<AppConfig>(&content)
        .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
}

/// Try to load a candidate config file. Returns `None` if the file doesn't
/// exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    if !path.is_file() {
        return None;
    }
    match parse_file(path) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!("skipping config file: {}", e);
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            tree: TreeConfig {
                full_load: other.tree.full_load.or(self.tree.full_load),
                use_gitignore: other.tree.use_gitignore.or(self.tree.use_gitignore),
                ignore: other.tree.ignore.clone().or(self.tree.ignore),
            },
            output: OutputConfig {
                mode: other.output.mode.clone().or(self.output.mode),
                yield_every: other.output.yield_every.or(self.output.yield_every),
                large_file_lines: other
                    .output
                    .large_file_lines
                    .or(self.output.large_file_lines),
                large_file_bytes: other
                    .output
                    .large_file_bytes
                    .or(self.output.large_file_bytes),
                directory: other.output.directory.clone().or(self.output.directory),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`; it
    /// must exist and parse. `cli_overrides` are partial overrides derived
    /// from CLI flags.
    pub fn load(
        cli_config_path: Option<&Path>,
        cli_overrides: Option<&AppConfig>,
    ) -> Result<AppConfig> {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            let file_cfg = parse_file(cli_path).map_err(|e| match e {
                AppError::Io(io) => AppError::Config(format!("{}: {}", cli_path.display(), io)),
                other => other,
            })?;
            config = config.merge(&file_cfg);
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        Ok(config)
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn full_load(&self) -> bool {
        self.tree.full_load.unwrap_or(false)
    }

    pub fn use_gitignore(&self) -> bool {
        self.tree.use_gitignore.unwrap_or(true)
    }

    pub fn extra_ignore(&self) -> &[String] {
        self.tree.ignore.as_deref().unwrap_or(&[])
    }

    /// Output mode; an unknown name falls back to Full with a warning.
    pub fn mode(&self) -> OutputMode {
        match self.output.mode.as_deref() {
            None => OutputMode::default(),
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!("{}; using full", e);
                OutputMode::Full
            }),
        }
    }

    /// Yield cadence; `0` is raised to `1` with a warning.
    pub fn yield_every(&self) -> usize {
        match self.output.yield_every {
            Some(0) => {
                warn!("output.yield_every must be at least 1; using 1");
                1
            }
            Some(n) => n,
            None => DEFAULT_YIELD_EVERY,
        }
    }

    pub fn large_file_lines(&self) -> usize {
        self.output
            .large_file_lines
            .unwrap_or(DEFAULT_LARGE_FILE_LINES)
    }

    pub fn large_file_bytes(&self) -> u64 {
        self.output
            .large_file_bytes
            .unwrap_or(DEFAULT_LARGE_FILE_BYTES)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.output.directory.as_deref().unwrap_or("."))
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            yield_every: self.yield_every(),
            large_file_lines: self.large_file_lines(),
            large_file_bytes: self.large_file_bytes(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert!(!cfg.full_load());
        assert!(cfg.use_gitignore());
        assert!(cfg.extra_ignore().is_empty());
        assert_eq!(cfg.mode(), OutputMode::Full);
        assert_eq!(cfg.yield_every(), 5);
        assert_eq!(cfg.large_file_lines(), 1000);
        assert_eq!(cfg.large_file_bytes(), 102_400);
        assert_eq!(cfg.output_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[tree]
full_load = true
use_gitignore = false
ignore = ["*.snap", "fixtures/"]

[output]
mode = "compact"
yield_every = 10
large_file_lines = 500
large_file_bytes = 50_000
directory = "/tmp/out"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert!(cfg.full_load());
        assert!(!cfg.use_gitignore());
        assert_eq!(cfg.extra_ignore(), ["*.snap", "fixtures/"]);
        assert_eq!(cfg.mode(), OutputMode::Compact);
        assert_eq!(cfg.yield_every(), 10);
        assert_eq!(cfg.large_file_lines(), 500);
        assert_eq!(cfg.large_file_bytes(), 50_000);
        assert_eq!(cfg.output_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_toml_parsing_partial() {
        let toml = r#"
[output]
mode = "minimal"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.mode(), OutputMode::Minimal);
        // Everything else should be defaults
        assert!(cfg.use_gitignore());
        assert_eq!(cfg.yield_every(), 5);
    }

    #[test]
    fn test_toml_parsing_empty() {
        let cfg: AppConfig = toml::from_str("").expect("parse failed");
        assert!(!cfg.full_load());
        assert_eq!(cfg.mode(), OutputMode::Full);
    }

    #[test]
    fn test_unknown_mode_falls_back_to_full() {
        let cfg: AppConfig = toml::from_str("[output]\nmode = \"verbose\"\n").expect("parse");
        assert_eq!(cfg.mode(), OutputMode::Full);
    }

    #[test]
    fn test_merge_overrides() {
        let base = AppConfig {
            tree: TreeConfig {
                full_load: Some(false),
                use_gitignore: Some(false),
                ..Default::default()
            },
            output: OutputConfig {
                yield_every: Some(5),
                large_file_lines: Some(2000),
                ..Default::default()
            },
        };

        let over = AppConfig {
            tree: TreeConfig {
                full_load: Some(true),
                // use_gitignore not set, should keep base
                ..Default::default()
            },
            output: OutputConfig {
                yield_every: Some(1),
                ..Default::default()
            },
        };

        let merged = base.merge(&over);
        assert!(merged.full_load()); // overridden
        assert!(!merged.use_gitignore()); // from base
        assert_eq!(merged.yield_every(), 1); // overridden
        assert_eq!(merged.large_file_lines(), 2000); // from base
    }

    #[test]
    fn test_merge_none_does_not_clear_some() {
        let base = AppConfig {
            tree: TreeConfig {
                ignore: Some(vec!["*.tmp".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let merged = base.merge(&AppConfig::default());
        assert_eq!(merged.extra_ignore(), ["*.tmp"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("test-config.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(
            f,
            r#"
[tree]
ignore = ["generated/"]

[output]
mode = "minimal"
"#
        )
        .expect("write");

        let cfg = load_file(&cfg_path).expect("load");
        assert_eq!(cfg.extra_ignore(), ["generated/"]);
        assert_eq!(cfg.mode(), OutputMode::Minimal);
        // Unset fields fall through to defaults
        assert_eq!(cfg.yield_every(), 5);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_file(Path::new("/nonexistent/config.toml")).is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "this is { not valid toml").expect("write");
        assert!(load_file(&cfg_path).is_none());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/mdasm.toml")), None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_explicit_config_must_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "[output\nmode = ").expect("write");
        let err = AppConfig::load(Some(&cfg_path), None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.toml");
        std::fs::write(
            &cfg_path,
            r#"
[tree]
full_load = true

[output]
mode = "compact"
"#,
        )
        .expect("write");

        let cli_overrides = AppConfig {
            output: OutputConfig {
                mode: Some("minimal".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = AppConfig::load(Some(&cfg_path), Some(&cli_overrides)).expect("load");
        // CLI override wins
        assert_eq!(cfg.mode(), OutputMode::Minimal);
        // File value preserved (not overridden by CLI)
        assert!(cfg.full_load());
    }

    #[test]
    fn test_output_options_reflect_config() {
        let cfg = AppConfig {
            output: OutputConfig {
                yield_every: Some(0),
                large_file_bytes: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let opts = cfg.output_options();
        assert_eq!(opts.yield_every, 1);
        assert_eq!(opts.large_file_bytes, 1);
        assert_eq!(opts.large_file_lines, 1000);
    }
}
