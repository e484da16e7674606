use std::collections::BTreeMap;

use crate::fs::tree::SelectedFile;

/// Group label for files that sit directly under the root.
pub const ROOT_LABEL: &str = "root";

/// Format bytes into a short human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Anchor slug: lowercase, runs of anything outside `[a-z0-9]` collapse to a
/// single `-`, no leading or trailing `-`.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Number of `\n`-separated segments; a trailing newline counts as an
/// extra (empty) line.
pub fn count_lines(content: &str) -> usize {
    content.matches('\n').count() + 1
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Append a fenced code block whose body ends with exactly one newline.
pub fn push_fenced(out: &mut String, tag: &str, content: &str) {
    out.push_str("```");
    out.push_str(tag);
    out.push('\n');
    out.push_str(content.trim_end_matches('\n'));
    out.push_str("\n```\n");
}

/// Files sharing a containing directory.
#[derive(Debug)]
pub struct DirGroup<'a> {
    pub label: String,
    pub files: Vec<&'a SelectedFile>,
}

/// Group path-sorted files by containing directory.
///
/// The root group comes first, then directories in ascending path order;
/// files keep their input order within a group.
pub fn group_by_directory(files: &[SelectedFile]) -> Vec<DirGroup<'_>> {
    let mut root = Vec::new();
    let mut dirs: BTreeMap<&str, Vec<&SelectedFile>> = BTreeMap::new();

    for file in files {
        match file.path.rsplit_once('/') {
            Some((dir, _)) => dirs.entry(dir).or_default().push(file),
            None => root.push(file),
        }
    }

    let mut groups = Vec::with_capacity(dirs.len() + 1);
    if !root.is_empty() {
        groups.push(DirGroup {
            label: ROOT_LABEL.to_string(),
            files: root,
        });
    }
    groups.extend(dirs.into_iter().map(|(dir, files)| DirGroup {
        label: dir.to_string(),
        files,
    }));
    groups
}
