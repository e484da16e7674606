use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::fs::host::{DirEntry, EntryKind, FileContent, FileSystem, Handle};

enum MemNode {
    Dir {
        entries: BTreeMap<String, EntryKind>,
        readable: bool,
    },
    /// `None` content simulates a read failure.
    File { content: Option<FileContent> },
}

/// In-memory `FileSystem` for test harnesses and batch callers that already
/// hold their content in memory.
///
/// Paths are slash-separated and relative to the root, e.g. `src/main.rs`.
/// Parent directories are created on demand.
pub struct MemoryFs {
    root: PathBuf,
    nodes: HashMap<PathBuf, MemNode>,
    list_calls: Cell<usize>,
    read_calls: Cell<usize>,
    size_calls: Cell<usize>,
}

impl MemoryFs {
    /// Create an empty filesystem whose root directory is called `root_name`.
    pub fn new(root_name: &str) -> Self {
        let root = PathBuf::from(root_name);
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            MemNode::Dir {
                entries: BTreeMap::new(),
                readable: true,
            },
        );
        Self {
            root,
            nodes,
            list_calls: Cell::new(0),
            read_calls: Cell::new(0),
            size_calls: Cell::new(0),
        }
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.insert(path, EntryKind::Directory);
        self
    }

    pub fn add_file(&mut self, path: &str, content: &str) -> &mut Self {
        let key = self.insert(path, EntryKind::File);
        self.nodes.insert(
            key,
            MemNode::File {
                content: Some(FileContent::text(content)),
            },
        );
        self
    }

    pub fn add_binary(&mut self, path: &str, byte_len: u64) -> &mut Self {
        let key = self.insert(path, EntryKind::File);
        self.nodes.insert(
            key,
            MemNode::File {
                content: Some(FileContent::binary(byte_len)),
            },
        );
        self
    }

    /// A file that is listed but fails every read.
    pub fn add_unreadable_file(&mut self, path: &str) -> &mut Self {
        let key = self.insert(path, EntryKind::File);
        self.nodes.insert(key, MemNode::File { content: None });
        self
    }

    /// A directory that is listed but fails every enumeration.
    pub fn add_unreadable_dir(&mut self, path: &str) -> &mut Self {
        let key = self.insert(path, EntryKind::Directory);
        if let Some(MemNode::Dir { readable, .. }) = self.nodes.get_mut(&key) {
            *readable = false;
        }
        self
    }

    /// Number of `list` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    /// Number of `read` calls served so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls.get()
    }

    /// Number of `size` calls served so far.
    pub fn size_calls(&self) -> usize {
        self.size_calls.get()
    }

    /// Handle for a path relative to the root.
    pub fn handle(&self, path: &str) -> Handle {
        Handle::new(self.key(path))
    }

    fn key(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Register `path` and all missing ancestors, returning its key.
    fn insert(&mut self, path: &str, kind: EntryKind) -> PathBuf {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = self.root.clone();
        for (i, part) in parts.iter().enumerate() {
            let is_last = i + 1 == parts.len();
            let part_kind = if is_last { kind } else { EntryKind::Directory };
            if let Some(MemNode::Dir { entries, .. }) = self.nodes.get_mut(&current) {
                entries.insert(part.to_string(), part_kind);
            }
            current = current.join(part);
            if part_kind == EntryKind::Directory && !self.nodes.contains_key(&current) {
                self.nodes.insert(
                    current.clone(),
                    MemNode::Dir {
                        entries: BTreeMap::new(),
                        readable: true,
                    },
                );
            }
        }
        current
    }
}

impl FileSystem for MemoryFs {
    fn root(&self, path: &Path) -> Result<Handle> {
        if path == self.root {
            Ok(Handle::new(self.root.clone()))
        } else {
            Err(AppError::InvalidPath(format!(
                "{} does not exist",
                path.display()
            )))
        }
    }

    fn list(&self, dir: &Handle) -> io::Result<Vec<DirEntry>> {
        self.list_calls.set(self.list_calls.get() + 1);
        match self.nodes.get(dir.location()) {
            Some(MemNode::Dir {
                entries,
                readable: true,
            }) => Ok(entries
                .iter()
                .map(|(name, kind)| DirEntry {
                    name: name.clone(),
                    kind: *kind,
                    handle: dir.join(name),
                })
                .collect()),
            Some(MemNode::Dir { readable: false, .. }) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{}: permission denied", dir.location().display()),
            )),
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not a directory", dir.location().display()),
            )),
        }
    }

    fn read(&self, file: &Handle) -> io::Result<FileContent> {
        self.read_calls.set(self.read_calls.get() + 1);
        self.file(file).cloned()
    }

    fn size(&self, file: &Handle) -> io::Result<u64> {
        self.size_calls.set(self.size_calls.get() + 1);
        self.file(file).map(|content| content.byte_len)
    }
}

impl MemoryFs {
    fn file(&self, handle: &Handle) -> io::Result<&FileContent> {
        match self.nodes.get(handle.location()) {
            Some(MemNode::File {
                content: Some(content),
            }) => Ok(content),
            Some(MemNode::File { content: None }) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            )),
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        }
    }
}
