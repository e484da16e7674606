use std::cell::Cell;
use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fs::host::{DirEntry, EntryKind, FileSystem, Handle};
use crate::fs::ignore::IgnoreSet;

/// Type of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

impl From<EntryKind> for NodeKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => NodeKind::File,
            EntryKind::Directory => NodeKind::Directory,
        }
    }
}

/// Aggregate selection state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Unchecked,
    Indeterminate,
}

impl CheckState {
    /// Listing marker: `[x]`, `[ ]` or `[~]`.
    pub fn marker(&self) -> &'static str {
        match self {
            CheckState::Checked => "[x]",
            CheckState::Unchecked => "[ ]",
            CheckState::Indeterminate => "[~]",
        }
    }
}

/// Index of a node inside its `Tree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A node in the selection tree.
#[derive(Debug)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    /// Slash-joined path relative to the root; empty for the root itself.
    pub path: String,
    pub selected: bool,
    /// Display hint only.
    pub expanded: bool,
    pub handle: Option<Handle>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Set once the directory has been enumerated successfully.
    pub(crate) materialized: bool,
    /// Last bulk selection that reached this node while it was unloaded.
    pub(crate) pending_selection: Option<bool>,
    pub(crate) check_cache: Cell<Option<CheckState>>,
}

impl TreeNode {
    fn new(name: String, kind: NodeKind, path: String, handle: Handle) -> Self {
        Self {
            name,
            kind,
            path,
            selected: true,
            expanded: true,
            handle: Some(handle),
            parent: None,
            children: Vec::new(),
            materialized: false,
            pending_selection: None,
            check_cache: Cell::new(None),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Directory whose entries have not been enumerated yet.
    pub fn is_deferred(&self) -> bool {
        self.is_dir() && !self.materialized
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Options for the initial walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Enumerate collapsed directories too instead of leaving stubs.
    pub full_load: bool,
}

/// Snapshot of a selected file, handed to the generators.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub path: String,
    pub handle: Handle,
}

/// Node counts of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub files: usize,
    pub folders: usize,
    /// Directories whose entries are still deferred.
    pub deferred: usize,
}

/// Arena of nodes built from a host filesystem.
///
/// Directories own their children through `NodeId` lists; the `parent` link
/// is only used to walk upwards when invalidating cached check states.
pub struct Tree {
    pub(crate) nodes: Vec<TreeNode>,
    root: NodeId,
    by_path: HashMap<String, NodeId>,
    ignore: IgnoreSet,
}

impl Tree {
    /// Walk `root` into a new tree.
    ///
    /// Collapsed directories become zero-child stubs unless
    /// `options.full_load` is set; enumeration errors degrade the affected
    /// directory to empty.
    pub fn build<F: FileSystem>(
        fs: &F,
        root: Handle,
        patterns: &[String],
        options: BuildOptions,
    ) -> Tree {
        let name = root.name();
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId(0),
            by_path: HashMap::new(),
            ignore: IgnoreSet::new(patterns),
        };
        let root_id = tree.push(TreeNode::new(
            name,
            NodeKind::Directory,
            String::new(),
            root,
        ));
        tree.root = root_id;
        tree.enumerate(fs, root_id, options.full_load, None);
        tree
    }

    /// Enumerate a deferred directory once.
    ///
    /// Returns `true` if entries were loaded; already materialized nodes,
    /// files and handle-less nodes are left untouched. Sub-directories stay
    /// lazy.
    pub fn materialize<F: FileSystem>(&mut self, fs: &F, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        if !node.is_deferred() || node.handle.is_none() {
            return false;
        }
        let inherit = node.pending_selection;
        if !self.enumerate(fs, id, false, inherit) {
            return false;
        }
        self.invalidate_upwards(id);
        info!(
            path = %self.nodes[id.0].path,
            count = self.nodes[id.0].children.len(),
            "loaded deferred directory"
        );
        true
    }

    /// Materialize the node registered at `path`.
    pub fn materialize_path<F: FileSystem>(&mut self, fs: &F, path: &str) -> Result<bool> {
        let id = self
            .lookup(path)
            .ok_or_else(|| AppError::NodeNotFound(path.to_string()))?;
        Ok(self.materialize(fs, id))
    }

    /// Load the directory at `path` if deferred, then expand it and every
    /// ancestor so the loaded entries show up in the listing.
    pub fn expand_path<F: FileSystem>(&mut self, fs: &F, path: &str) -> Result<bool> {
        let id = self
            .lookup(path)
            .ok_or_else(|| AppError::NodeNotFound(path.to_string()))?;
        let loaded = self.materialize(fs, id);
        let mut current = Some(id);
        while let Some(node) = current {
            self.nodes[node.0].expanded = true;
            current = self.nodes[node.0].parent;
        }
        Ok(loaded)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_name(&self) -> &str {
        &self.nodes[self.root.0].name
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Find a node by its root-relative path.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        let path = path.trim_matches('/');
        self.by_path.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        self.nodes[id.0].expanded = expanded;
    }

    /// Selected file nodes in tree order.
    pub fn collect_selected_files(&self) -> Vec<SelectedFile> {
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            match node.kind {
                NodeKind::File => {
                    if let (true, Some(handle)) = (node.selected, &node.handle) {
                        result.push(SelectedFile {
                            name: node.name.clone(),
                            path: node.path.clone(),
                            handle: handle.clone(),
                        });
                    }
                }
                NodeKind::Directory => stack.extend(node.children.iter().rev()),
            }
        }
        result
    }

    pub fn stats(&self) -> TreeStats {
        self.nodes
            .iter()
            .fold(TreeStats::default(), |mut stats, node| {
                match node.kind {
                    NodeKind::File => stats.files += 1,
                    NodeKind::Directory => {
                        stats.folders += 1;
                        if node.is_deferred() {
                            stats.deferred += 1;
                        }
                    }
                }
                stats
            })
    }

    /// Indented listing with check markers, one node per line.
    pub fn render_listing(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root, 0, &mut out);
        out
    }

    fn render_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id.0];
        let suffix = match node.kind {
            NodeKind::Directory if node.is_deferred() => "/ (not loaded)",
            NodeKind::Directory => "/",
            NodeKind::File => "",
        };
        out.push_str(&format!(
            "{}{} {}{}\n",
            "  ".repeat(depth),
            self.check_state(id).marker(),
            node.name,
            suffix
        ));
        if node.expanded {
            for &child in &node.children {
                self.render_node(child, depth + 1, out);
            }
        }
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.by_path.insert(node.path.clone(), id);
        self.nodes.push(node);
        id
    }

    fn child_path(parent: &str, name: &str) -> String {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent, name)
        }
    }

    /// List, sort and attach the entries of directory `id`, recursing into
    /// sub-directories that are not collapsed.
    ///
    /// `inherit` overrides the default selection of every created node.
    /// Returns `false` when the listing failed.
    fn enumerate<F: FileSystem>(
        &mut self,
        fs: &F,
        id: NodeId,
        full_load: bool,
        inherit: Option<bool>,
    ) -> bool {
        let Some(handle) = self.nodes[id.0].handle.clone() else {
            return false;
        };
        let mut entries = match fs.list(&handle) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.nodes[id.0].path, "failed to list directory: {}", e);
                return false;
            }
        };
        sort_entries(&mut entries);
        self.nodes[id.0].materialized = true;

        let parent_path = self.nodes[id.0].path.clone();
        for entry in entries {
            let path = Self::child_path(&parent_path, &entry.name);
            let child = match entry.kind {
                EntryKind::Directory => {
                    self.build_directory(fs, entry, path, full_load, inherit)
                }
                EntryKind::File => {
                    let mut node =
                        TreeNode::new(entry.name, NodeKind::File, path, entry.handle);
                    node.selected = match inherit {
                        Some(value) => value,
                        None => !self.ignore.should_auto_deselect(&node.path, &node.name),
                    };
                    self.push(node)
                }
            };
            self.nodes[child.0].parent = Some(id);
            self.nodes[id.0].children.push(child);
        }
        true
    }

    fn build_directory<F: FileSystem>(
        &mut self,
        fs: &F,
        entry: DirEntry,
        path: String,
        full_load: bool,
        inherit: Option<bool>,
    ) -> NodeId {
        let collapse = self.ignore.should_collapse(&path, &entry.name);
        let mut node = TreeNode::new(entry.name, NodeKind::Directory, path, entry.handle);
        if collapse {
            node.expanded = false;
            node.selected = false;
        }
        if let Some(value) = inherit {
            node.selected = value;
        }

        let deferred = collapse && !full_load;
        if deferred {
            node.pending_selection = inherit;
        }
        let id = self.push(node);

        if deferred {
            debug!(path = %self.nodes[id.0].path, "deferring collapsed directory");
        } else {
            self.enumerate(fs, id, full_load, inherit);
        }
        id
    }
}

/// Directories first, then by name.
fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| {
        let a_dir = a.kind == EntryKind::Directory;
        let b_dir = b.kind == EntryKind::Directory;
        b_dir.cmp(&a_dir).then_with(|| a.name.cmp(&b.name))
    });
}
