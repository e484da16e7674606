//! Ignore-pattern evaluation and the built-in noise lists.
//!
//! Supports the common `.gitignore` forms only: exact names or paths,
//! trailing-slash directory patterns anchored at the root, and `*` wildcards.
//! Negation (`!pattern`) and `**` are not supported; a `!` line is treated as
//! a literal pattern.

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use crate::fs::host::{FileBody, FileSystem, Handle};

/// Name of the ignore file read from the tree root.
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Directories that start collapsed and deselected.
pub const NOISE_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    ".nuxt",
    "dist",
    "build",
    "out",
    ".cache",
    "coverage",
    ".turbo",
    ".vercel",
    ".netlify",
    "__pycache__",
    "venv",
    ".venv",
    "vendor",
    "target",
    ".gradle",
    ".maven",
    ".idea",
    ".vscode",
    ".ds_store",
];

/// Dot-directories that are useful enough to load eagerly.
pub const ALLOWED_DOT_DIRECTORIES: &[&str] = &[".github", ".husky", ".storybook"];

/// Files that start deselected. `*X` means "name ends with X".
pub const DESELECTED_FILES: &[&str] = &[
    // lock files
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "composer.lock",
    "gemfile.lock",
    "poetry.lock",
    "cargo.lock",
    // logs
    "*.log",
    // OS metadata
    ".ds_store",
    "thumbs.db",
    "desktop.ini",
    // editor leftovers
    "*.swp",
    "*.swo",
    "*~",
    // build artifacts
    "*.map",
    "*.min.js",
    "*.min.css",
    // data
    "*.sqlite",
    "*.db",
    // images
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.svg",
    "*.webp",
    "*.bmp",
    // fonts
    "*.ttf",
    "*.otf",
    "*.woff",
    "*.woff2",
    "*.eot",
    // audio/video
    "*.mp4",
    "*.mp3",
    "*.wav",
    "*.avi",
    "*.mov",
    // documents
    "*.pdf",
    "*.doc",
    "*.docx",
];

/// Extensions whose content is never inlined.
pub const BINARY_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".ico", ".pdf", ".doc", ".docx", ".xls", ".xlsx",
    ".ppt", ".pptx", ".zip", ".rar", ".7z", ".tar", ".gz", ".exe", ".dll", ".so", ".dylib",
    ".mp3", ".mp4", ".avi", ".mov", ".wav", ".ttf", ".otf", ".woff", ".woff2", ".db", ".sqlite",
    ".bin",
];

/// Split ignore-file text into patterns, dropping blanks and `#` comments.
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// A single compiled ignore pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `dir/`: the directory and everything below it, anchored at the root.
    Directory(String),
    /// No wildcard: the whole path or its trailing segments.
    Exact(String),
    /// Contains `*`, compiled to `(^|/)...$`.
    Wildcard(Regex),
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.strip_prefix('/').unwrap_or(pattern);

        if let Some(dir) = pattern.strip_suffix('/') {
            return Pattern::Directory(dir.to_string());
        }
        if !pattern.contains('*') {
            return Pattern::Exact(pattern.to_string());
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        // Every literal run is escaped, so the expression always compiles.
        match Regex::new(&format!("(^|/){}$", body)) {
            Ok(re) => Pattern::Wildcard(re),
            Err(_) => Pattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.strip_prefix('/').unwrap_or(path);
        match self {
            Pattern::Directory(dir) => {
                path == dir
                    || path
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Pattern::Exact(exact) => {
                path == exact
                    || path
                        .strip_suffix(exact.as_str())
                        .is_some_and(|head| head.ends_with('/'))
            }
            Pattern::Wildcard(re) => re.is_match(path),
        }
    }
}

/// Check one path against one pattern string.
pub fn matches(path: &str, pattern: &str) -> bool {
    Pattern::new(pattern).matches(path)
}

/// Check a path against a list of pattern strings; the first match wins.
pub fn is_ignored(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| matches(path, p))
}

/// Pre-compiled pattern list used while walking a tree.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| Pattern::new(p)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Whether a directory should start collapsed (and, unless forced, unloaded).
    pub fn should_collapse(&self, path: &str, name: &str) -> bool {
        if self.is_ignored(path) {
            return true;
        }
        if name.starts_with('.') {
            return !ALLOWED_DOT_DIRECTORIES.contains(&name);
        }
        NOISE_DIRECTORIES.contains(&name.to_lowercase().as_str())
    }

    /// Whether a file should start deselected.
    pub fn should_auto_deselect(&self, path: &str, name: &str) -> bool {
        if self.is_ignored(path) {
            return true;
        }
        let lower = name.to_lowercase();
        DESELECTED_FILES
            .iter()
            .any(|rule| match rule.strip_prefix('*') {
                Some(suffix) => lower.ends_with(suffix),
                None => lower == *rule,
            })
    }
}

/// Read and parse `.gitignore` at the tree root. A missing or unreadable file
/// yields no patterns.
pub fn read_ignore_file<F: FileSystem>(fs: &F, root: &Handle) -> Vec<String> {
    match fs.read(&root.join(IGNORE_FILE_NAME)) {
        Ok(content) => match content.body {
            FileBody::Text(text) => {
                let patterns = parse(&text);
                info!(count = patterns.len(), "loaded {}", IGNORE_FILE_NAME);
                patterns
            }
            FileBody::Binary => {
                debug!("{} is binary; ignoring it", IGNORE_FILE_NAME);
                Vec::new()
            }
        },
        Err(e) => {
            debug!("no usable {}: {}", IGNORE_FILE_NAME, e);
            Vec::new()
        }
    }
}

/// Whether a file name has a known binary extension.
pub fn is_binary_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    BINARY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Lowercase extension used as the code fence tag; `txt` when there is none.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .or_else(|| {
            // `Path` treats a leading dot as part of the stem (`.gitignore`).
            name.strip_prefix('.')
                .filter(|rest| !rest.is_empty() && !rest.contains('.'))
                .map(str::to_lowercase)
        })
        .unwrap_or_else(|| "txt".to_string())
}
