use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, Result};

/// Number of leading bytes scanned for NUL when sniffing binary content.
const BINARY_SNIFF_BYTES: usize = 8192;

/// Kind of a host filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Opaque reference to a host entry.
///
/// Only the `FileSystem` implementation that produced a handle knows how to
/// interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(PathBuf);

impl Handle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Host location backing this handle.
    pub fn location(&self) -> &Path {
        &self.0
    }

    /// Handle for a direct child of this entry.
    pub fn join(&self, name: &str) -> Self {
        Self(self.0.join(name))
    }

    /// Last path component, used as the display name of a root.
    pub fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.0.to_string_lossy().to_string())
    }
}

/// One entry returned by `FileSystem::list`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub handle: Handle,
}

/// Decoded body of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    Text(String),
    Binary,
}

/// Result of reading a file through the host.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub byte_len: u64,
    pub body: FileBody,
}

impl FileContent {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            byte_len: content.len() as u64,
            body: FileBody::Text(content),
        }
    }

    pub fn binary(byte_len: u64) -> Self {
        Self {
            byte_len,
            body: FileBody::Binary,
        }
    }

    /// Decode raw bytes: NUL in the leading window means binary, anything
    /// else is decoded as UTF-8 with replacement characters.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let byte_len = bytes.len() as u64;
        let window = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
        if window.contains(&0) {
            return Self::binary(byte_len);
        }
        let text = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Self {
            byte_len,
            body: FileBody::Text(text),
        }
    }
}

/// Host filesystem contract consumed by the tree builder and the generators.
pub trait FileSystem {
    /// Resolve the user-chosen root into a directory handle.
    ///
    /// Fails before any tree work when the host cannot serve the location.
    fn root(&self, path: &Path) -> Result<Handle>;

    /// List the immediate entries of a directory.
    fn list(&self, dir: &Handle) -> io::Result<Vec<DirEntry>>;

    /// Read a file's size and content.
    fn read(&self, file: &Handle) -> io::Result<FileContent>;

    /// Byte size of a file, without touching its content.
    fn size(&self, file: &Handle) -> io::Result<u64>;
}

/// `FileSystem` backed by the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn root(&self, path: &Path) -> Result<Handle> {
        let canonical = path
            .canonicalize()
            .map_err(|_| AppError::InvalidPath(format!("{} does not exist", path.display())))?;
        let metadata = fs::metadata(&canonical)?;
        if !metadata.is_dir() {
            return Err(AppError::UnsupportedEnvironment(format!(
                "{} is not a directory",
                canonical.display()
            )));
        }
        // A directory we cannot enumerate is as good as no directory support.
        fs::read_dir(&canonical).map_err(|e| {
            AppError::UnsupportedEnvironment(format!("{}: {}", canonical.display(), e))
        })?;
        Ok(Handle::new(canonical))
    }

    /// Broken symlinks and symlinked directories are skipped.
    fn list(&self, dir: &Handle) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir.location())? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };

            let kind = if file_type.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(m) if m.is_file() => EntryKind::File,
                    Ok(_) => {
                        debug!(path = %entry.path().display(), "skipping symlinked directory");
                        continue;
                    }
                    Err(_) => continue,
                }
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            entries.push(DirEntry {
                name,
                kind,
                handle: Handle::new(entry.path()),
            });
        }
        Ok(entries)
    }

    /// The leading window is sniffed first; binary files are never read
    /// past it.
    fn read(&self, file: &Handle) -> io::Result<FileContent> {
        let mut f = fs::File::open(file.location())?;
        let byte_len = f.metadata()?.len();

        let mut bytes = Vec::with_capacity(BINARY_SNIFF_BYTES);
        (&mut f)
            .take(BINARY_SNIFF_BYTES as u64)
            .read_to_end(&mut bytes)?;
        if bytes.contains(&0) {
            return Ok(FileContent::binary(byte_len));
        }

        f.read_to_end(&mut bytes)?;
        Ok(FileContent::from_bytes(bytes))
    }

    fn size(&self, file: &Handle) -> io::Result<u64> {
        Ok(fs::metadata(file.location())?.len())
    }
}
